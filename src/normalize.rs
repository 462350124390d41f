//! Tolerant reshaping of server records whose field names vary by backend
//! revision. Unrecognized shapes degrade to defaults instead of erroring.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Course, EmployeeDetail, Enrollment, EnrollmentStatus, EvaluationSummary};

pub const UNTITLED_COURSE: &str = "Untitled course";
pub const UNNAMED: &str = "Unnamed";

/// Unwrap a response body into its record list. Some backends return a bare
/// array, others wrap paginated results in a `results` field.
pub fn records(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCourse {
    id: Option<Value>,
    course_id: Option<Value>,
    pk: Option<Value>,
    title: Option<Value>,
    name: Option<Value>,
    course_name: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnrollment {
    id: Option<Value>,
    enrollment_id: Option<Value>,
    employee: Option<Value>,
    user: Option<Value>,
    trainee: Option<Value>,
    employee_id: Option<Value>,
    emp_no: Option<Value>,
    name: Option<Value>,
    progress: Option<Value>,
    completion: Option<Value>,
    percent: Option<Value>,
    completed_ratio: Option<Value>,
    status: Option<Value>,
    state: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEmployee {
    id: Option<Value>,
    emp_no: Option<Value>,
    name: Option<Value>,
    dept: Option<Value>,
    department: Option<Value>,
    email: Option<Value>,
    phone: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvaluation {
    evaluation: Option<Value>,
    #[serde(rename = "motionName")]
    motion_name: Option<Value>,
    score: Option<Value>,
    detail: Option<Value>,
    message: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvaluationResult {
    evaluator_motion_name: Option<Value>,
    score: Option<Value>,
    normalized_distance: Option<Value>,
}

/// Read a record into its explicit-optional-field shape. A record that is
/// not an object degrades to the all-absent default.
fn shape<T: Default + for<'de> Deserialize<'de>>(record: &Value) -> T {
    serde_json::from_value(record.clone()).unwrap_or_default()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn first_text(candidates: &[&Option<Value>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.as_ref())
        .find_map(as_text)
}

fn first_number(candidates: &[&Option<Value>]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.as_ref())
        .find_map(as_number)
}

pub fn course_record(record: &Value) -> Course {
    let raw: RawCourse = shape(record);
    let id = first_text(&[&raw.id, &raw.course_id, &raw.pk])
        .or_else(|| first_text(&[&raw.title, &raw.name]))
        .unwrap_or_default();
    let title = first_text(&[&raw.title, &raw.name, &raw.course_name])
        .unwrap_or_else(|| UNTITLED_COURSE.to_string());
    Course { id, title }
}

pub fn enrollment_record(record: &Value) -> Enrollment {
    let raw: RawEnrollment = shape(record);
    let employee: RawEmployee = [&raw.employee, &raw.user, &raw.trainee]
        .into_iter()
        .find_map(|candidate| candidate.as_ref())
        .map(shape)
        .unwrap_or_default();

    let progress = first_number(&[&raw.progress, &raw.completion, &raw.percent])
        .or_else(|| {
            // completed_ratio is a 0..1 fraction and only honored when the
            // backend sends an actual number.
            raw.completed_ratio
                .as_ref()
                .and_then(Value::as_f64)
                .map(|ratio| ratio * 100.0)
        })
        .unwrap_or(0.0);

    let status_text = first_text(&[&raw.status, &raw.state]).unwrap_or_default();

    Enrollment {
        id: first_text(&[&raw.id, &raw.enrollment_id])
            .or_else(|| first_text(&[&employee.id, &employee.email]))
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        employee_ref: first_text(&[&employee.id, &raw.employee_id]),
        employee_number: first_text(&[&employee.emp_no, &raw.emp_no]),
        name: first_text(&[&employee.name, &raw.name]).unwrap_or_else(|| UNNAMED.to_string()),
        department: first_text(&[&employee.dept, &employee.department]).unwrap_or_default(),
        email: first_text(&[&employee.email]).unwrap_or_default(),
        progress,
        status: classify_status(progress, &status_text),
    }
}

/// Employee panel merge: prefer the fetched record, fall back to the
/// enrollment's own denormalized fields so the panel always renders.
pub fn employee_record(record: &Value, enrollment: &Enrollment) -> EmployeeDetail {
    let raw: RawEmployee = shape(record);
    EmployeeDetail {
        emp_no: first_text(&[&raw.emp_no]).or_else(|| enrollment.employee_number.clone()),
        name: first_text(&[&raw.name]).unwrap_or_else(|| enrollment.name.clone()),
        department: first_text(&[&raw.dept, &raw.department])
            .unwrap_or_else(|| enrollment.department.clone()),
        email: first_text(&[&raw.email]).unwrap_or_else(|| enrollment.email.clone()),
        phone: first_text(&[&raw.phone]),
    }
}

pub fn evaluation_body(body: &Value) -> EvaluationSummary {
    let raw: RawEvaluation = shape(body);
    let nested: RawEvaluationResult = raw.evaluation.as_ref().map(shape).unwrap_or_default();
    EvaluationSummary {
        motion_name: first_text(&[&nested.evaluator_motion_name, &raw.motion_name]),
        score: first_number(&[&nested.score, &raw.score]),
        detail: first_text(&[&raw.detail, &raw.message]),
        normalized_distance: nested.normalized_distance.as_ref().and_then(Value::as_f64),
    }
}

/// Tri-state status. An explicit textual status, when recognizable in either
/// language, always overrides the progress-derived value.
fn classify_status(progress: f64, status_text: &str) -> EnrollmentStatus {
    let derived = if progress >= 100.0 {
        EnrollmentStatus::Completed
    } else if progress > 0.0 {
        EnrollmentStatus::InProgress
    } else {
        EnrollmentStatus::NotStarted
    };

    let text = status_text.to_lowercase();
    if contains_any(&text, &["complete", "완료"]) {
        EnrollmentStatus::Completed
    } else if contains_any(&text, &["progress", "진행"]) {
        EnrollmentStatus::InProgress
    } else if contains_any(&text, &["미수강", "not"]) {
        EnrollmentStatus::NotStarted
    } else {
        derived
    }
}

fn contains_any(text: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| text.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_bare_array_results_field_and_unknown_shapes() {
        let bare = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(records(&bare).len(), 2);

        let wrapped = json!({"count": 2, "results": [{"id": 1}, {"id": 2}]});
        assert_eq!(records(&wrapped).len(), 2);

        assert!(records(&json!({})).is_empty());
        assert!(records(&json!({"results": "nope"})).is_empty());
        assert!(records(&json!("nope")).is_empty());
    }

    #[test]
    fn course_prefers_id_fields_in_order() {
        let course = course_record(&json!({"course_id": 7, "pk": 9, "title": "Fire Safety"}));
        assert_eq!(course.id, "7");
        assert_eq!(course.title, "Fire Safety");
    }

    #[test]
    fn course_without_id_fields_falls_back_to_stringified_title() {
        let course = course_record(&json!({"title": "Fire Safety"}));
        assert_eq!(course.id, "Fire Safety");

        let by_name = course_record(&json!({"name": "CPR Basics"}));
        assert_eq!(by_name.id, "CPR Basics");
        assert_eq!(by_name.title, "CPR Basics");
    }

    #[test]
    fn course_with_nothing_usable_gets_placeholder_title() {
        let course = course_record(&json!({}));
        assert_eq!(course.title, UNTITLED_COURSE);
        assert_eq!(course.id, "");

        let not_an_object = course_record(&json!("junk"));
        assert_eq!(not_an_object.title, UNTITLED_COURSE);
    }

    #[test]
    fn progress_alone_drives_classification() {
        let done = enrollment_record(&json!({"progress": 100}));
        assert_eq!(done.status, EnrollmentStatus::Completed);

        let midway = enrollment_record(&json!({"progress": 45}));
        assert_eq!(midway.status, EnrollmentStatus::InProgress);

        let untouched = enrollment_record(&json!({"progress": 0}));
        assert_eq!(untouched.status, EnrollmentStatus::NotStarted);
    }

    #[test]
    fn explicit_status_text_overrides_progress() {
        let korean = enrollment_record(&json!({"progress": 10, "status": "완료"}));
        assert_eq!(korean.status, EnrollmentStatus::Completed);

        let english = enrollment_record(&json!({"progress": 100, "state": "Not Started"}));
        assert_eq!(english.status, EnrollmentStatus::NotStarted);

        let in_progress = enrollment_record(&json!({"progress": 0, "status": "진행중"}));
        assert_eq!(in_progress.status, EnrollmentStatus::InProgress);
    }

    #[test]
    fn unrecognized_status_text_leaves_derived_status() {
        let enrollment = enrollment_record(&json!({"progress": 45, "status": "enrolled"}));
        assert_eq!(enrollment.status, EnrollmentStatus::InProgress);
    }

    #[test]
    fn completed_ratio_scales_to_percent() {
        let enrollment = enrollment_record(&json!({"completed_ratio": 0.5}));
        assert_eq!(enrollment.progress, 50.0);
        assert_eq!(enrollment.status, EnrollmentStatus::InProgress);
    }

    #[test]
    fn completed_ratio_must_be_numeric() {
        let enrollment = enrollment_record(&json!({"completed_ratio": "0.5"}));
        assert_eq!(enrollment.progress, 0.0);
    }

    #[test]
    fn numeric_strings_count_and_junk_falls_through() {
        let text = enrollment_record(&json!({"progress": "45"}));
        assert_eq!(text.progress, 45.0);

        let junk = enrollment_record(&json!({"progress": "n/a", "completion": 30}));
        assert_eq!(junk.progress, 30.0);
    }

    #[test]
    fn employee_fields_come_from_the_first_present_sub_record() {
        let enrollment = enrollment_record(&json!({
            "id": 11,
            "user": {"id": 5, "emp_no": "1042", "name": "Dana Park", "dept": "Safety", "email": "dana@example.com"},
        }));
        assert_eq!(enrollment.id, "11");
        assert_eq!(enrollment.employee_ref.as_deref(), Some("5"));
        assert_eq!(enrollment.employee_number.as_deref(), Some("1042"));
        assert_eq!(enrollment.name, "Dana Park");
        assert_eq!(enrollment.department, "Safety");
        assert_eq!(enrollment.email, "dana@example.com");
    }

    #[test]
    fn missing_identity_synthesizes_from_employee_then_random() {
        let from_email = enrollment_record(&json!({"employee": {"email": "lee@example.com"}}));
        assert_eq!(from_email.id, "lee@example.com");

        let random_a = enrollment_record(&json!({}));
        let random_b = enrollment_record(&json!({}));
        assert!(!random_a.id.is_empty());
        assert_ne!(random_a.id, random_b.id);
        assert_eq!(random_a.name, UNNAMED);
        assert_eq!(random_a.department, "");
        assert_eq!(random_a.email, "");
    }

    #[test]
    fn employee_panel_merges_with_enrollment_fallback() {
        let enrollment = enrollment_record(&json!({
            "emp_no": "1042",
            "name": "Dana Park",
            "employee": {"dept": "Safety", "email": "dana@example.com"},
        }));

        let fetched = employee_record(
            &json!({"name": "Dana K. Park", "department": "Plant Safety", "phone": "010-1234"}),
            &enrollment,
        );
        assert_eq!(fetched.name, "Dana K. Park");
        assert_eq!(fetched.department, "Plant Safety");
        assert_eq!(fetched.email, "dana@example.com");
        assert_eq!(fetched.emp_no.as_deref(), Some("1042"));
        assert_eq!(fetched.phone.as_deref(), Some("010-1234"));

        let synthetic = employee_record(&json!({}), &enrollment);
        assert_eq!(synthetic.name, "Dana Park");
        assert_eq!(synthetic.department, "Safety");
        assert!(synthetic.phone.is_none());
    }

    #[test]
    fn evaluation_prefers_nested_result_fields() {
        let nested = evaluation_body(&json!({
            "evaluation": {"evaluator_motion_name": "fire_extinguisher_lift", "score": 87.5, "normalized_distance": 0.12},
            "message": "ok",
        }));
        assert_eq!(nested.motion_name.as_deref(), Some("fire_extinguisher_lift"));
        assert_eq!(nested.score, Some(87.5));
        assert_eq!(nested.detail.as_deref(), Some("ok"));
        assert_eq!(nested.normalized_distance, Some(0.12));

        let flat = evaluation_body(&json!({"motionName": "squat", "score": 70, "detail": "good form"}));
        assert_eq!(flat.motion_name.as_deref(), Some("squat"));
        assert_eq!(flat.score, Some(70.0));
        assert_eq!(flat.detail.as_deref(), Some("good form"));
        assert!(flat.normalized_distance.is_none());
    }

    #[test]
    fn empty_strings_are_present_values() {
        let course = course_record(&json!({"title": "", "name": "CPR"}));
        assert_eq!(course.title, "");
        assert_eq!(course.id, "");
    }
}
