use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{Course, Enrollment, EnrollmentStatus};

#[derive(Debug, Default)]
pub struct StatusGroups {
    pub not_started: Vec<Enrollment>,
    pub in_progress: Vec<Enrollment>,
    pub completed: Vec<Enrollment>,
}

impl StatusGroups {
    pub fn total(&self) -> usize {
        self.not_started.len() + self.in_progress.len() + self.completed.len()
    }
}

/// Partition enrollments into the three status buckets. Every enrollment
/// lands in exactly one bucket.
pub fn group_by_status(enrollments: &[Enrollment]) -> StatusGroups {
    let mut groups = StatusGroups::default();
    for enrollment in enrollments {
        match enrollment.status {
            EnrollmentStatus::NotStarted => groups.not_started.push(enrollment.clone()),
            EnrollmentStatus::InProgress => groups.in_progress.push(enrollment.clone()),
            EnrollmentStatus::Completed => groups.completed.push(enrollment.clone()),
        }
    }
    groups
}

pub fn average_progress(enrollments: &[Enrollment]) -> f64 {
    if enrollments.is_empty() {
        return 0.0;
    }
    let total: f64 = enrollments
        .iter()
        .map(|enrollment| enrollment.display_progress())
        .sum();
    total / enrollments.len() as f64
}

pub fn build_report(
    course: &Course,
    generated_on: NaiveDate,
    enrollments: &[Enrollment],
) -> String {
    let groups = group_by_status(enrollments);
    let total = groups.total();

    let mut output = String::new();
    let _ = writeln!(output, "# Course Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) on {}",
        course.title, course.id, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if total == 0 {
        let _ = writeln!(output, "No enrollments for this course.");
    } else {
        let completion = groups.completed.len() as f64 / total as f64 * 100.0;
        let _ = writeln!(output, "- enrolled: {total}");
        let _ = writeln!(
            output,
            "- completed: {} ({completion:.0}%)",
            groups.completed.len()
        );
        let _ = writeln!(output, "- in progress: {}", groups.in_progress.len());
        let _ = writeln!(output, "- not started: {}", groups.not_started.len());
        let _ = writeln!(
            output,
            "- average progress: {:.1}%",
            average_progress(enrollments)
        );
    }

    for (status, group) in [
        (EnrollmentStatus::Completed, &groups.completed),
        (EnrollmentStatus::InProgress, &groups.in_progress),
        (EnrollmentStatus::NotStarted, &groups.not_started),
    ] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", status.label());

        if group.is_empty() {
            let _ = writeln!(output, "None.");
        } else {
            for enrollment in group {
                let _ = writeln!(
                    output,
                    "- {} ({}, {}) {:.0}%",
                    enrollment.name,
                    enrollment.department,
                    enrollment.email,
                    enrollment.display_progress()
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(name: &str, progress: f64, status: EnrollmentStatus) -> Enrollment {
        Enrollment {
            id: name.to_string(),
            employee_ref: None,
            employee_number: None,
            name: name.to_string(),
            department: "Safety".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            progress,
            status,
        }
    }

    #[test]
    fn groups_partition_the_input_exactly() {
        let enrollments = vec![
            enrollment("Avery", 0.0, EnrollmentStatus::NotStarted),
            enrollment("Dana", 45.0, EnrollmentStatus::InProgress),
            enrollment("Jules", 100.0, EnrollmentStatus::Completed),
            enrollment("Kiara", 72.0, EnrollmentStatus::InProgress),
        ];

        let groups = group_by_status(&enrollments);
        assert_eq!(groups.total(), enrollments.len());
        assert_eq!(groups.not_started.len(), 1);
        assert_eq!(groups.in_progress.len(), 2);
        assert_eq!(groups.completed.len(), 1);
        assert!(groups
            .in_progress
            .iter()
            .all(|e| e.status == EnrollmentStatus::InProgress));
    }

    #[test]
    fn average_clamps_out_of_range_progress() {
        let enrollments = vec![
            enrollment("Avery", 150.0, EnrollmentStatus::Completed),
            enrollment("Dana", 50.0, EnrollmentStatus::InProgress),
        ];
        assert_eq!(average_progress(&enrollments), 75.0);
        assert_eq!(average_progress(&[]), 0.0);
    }

    #[test]
    fn report_lists_counts_and_sections() {
        let course = Course {
            id: "7".to_string(),
            title: "Fire Safety".to_string(),
        };
        let enrollments = vec![
            enrollment("Avery", 0.0, EnrollmentStatus::NotStarted),
            enrollment("Jules", 100.0, EnrollmentStatus::Completed),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();

        let report = build_report(&course, date, &enrollments);
        assert!(report.contains("# Course Progress Report"));
        assert!(report.contains("Generated for Fire Safety (7) on 2026-08-05"));
        assert!(report.contains("- enrolled: 2"));
        assert!(report.contains("- completed: 1 (50%)"));
        assert!(report.contains("## Completed"));
        assert!(report.contains("- Jules (Safety, jules@example.com) 100%"));
        assert!(report.contains("## Not started"));
    }

    #[test]
    fn empty_course_report_says_so() {
        let course = Course {
            id: "7".to_string(),
            title: "Fire Safety".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let report = build_report(&course, date, &[]);
        assert!(report.contains("No enrollments for this course."));
        assert!(report.contains("None."));
    }
}
