use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "Not started",
            EnrollmentStatus::InProgress => "In progress",
            EnrollmentStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: String,
    pub employee_ref: Option<String>,
    pub employee_number: Option<String>,
    pub name: String,
    pub department: String,
    pub email: String,
    pub progress: f64,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// Progress clamped for display; stored values are kept as fetched.
    pub fn display_progress(&self) -> f64 {
        self.progress.clamp(0.0, 100.0)
    }
}

/// Employee panel shown in the detail view, fetched or synthesized from the
/// enrollment's own denormalized fields.
#[derive(Debug, Clone)]
pub struct EmployeeDetail {
    pub emp_no: Option<String>,
    pub name: String,
    pub department: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub motion_name: Option<String>,
    pub score: Option<f64>,
    pub detail: Option<String>,
    pub normalized_distance: Option<f64>,
}

/// One row of a bulk enrollment write. Optional fields are omitted from the
/// payload entirely when absent.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRequest {
    pub employee_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
