use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{debug, warn};

mod api;
mod models;
mod normalize;
mod report;
mod session;

use crate::api::ApiClient;
use crate::models::{Course, Enrollment, EnrollmentRequest};
use crate::session::{LiveProgress, ProgressSnapshot};

#[derive(Parser)]
#[command(name = "training-console")]
#[command(about = "Course enrollment administration console for GLife training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available courses
    Courses,
    /// Show enrollment progress for a course, grouped by status
    Progress {
        #[arg(long)]
        course: Option<String>,
    },
    /// Show one employee's profile and evaluation within a course
    #[command(group(
        ArgGroup::new("selector")
            .args(["emp_no", "email"])
            .required(true)
            .multiple(false)
    ))]
    Detail {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        emp_no: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Register employees into a course
    Enroll {
        #[arg(long)]
        course: String,
        /// Employee id or number; repeatable
        #[arg(long = "employee-id")]
        employee_ids: Vec<String>,
        /// Roster CSV with employee_id,name,dept,email columns
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a markdown progress report
    Report {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Periodically refresh a course's enrollment summary
    Watch {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        /// Stop after this many refreshes (0 runs until interrupted)
        #[arg(long, default_value_t = 0)]
        ticks: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_url = std::env::var("TRAINING_API_BASE_URL")
        .context("TRAINING_API_BASE_URL must point at the training backend")?;
    let token = std::env::var("TRAINING_API_TOKEN").ok();
    let api = ApiClient::new(&base_url, token)?;

    match cli.command {
        Commands::Courses => {
            let courses = api.list_courses().await?;
            if courses.is_empty() {
                println!("No courses available.");
                return Ok(());
            }
            for course in courses {
                println!("- {} ({})", course.title, course.id);
            }
        }
        Commands::Progress { course } => {
            let course = resolve_course(&api, course.as_deref()).await?;
            let enrollments = api.list_enrollments(&course.id).await?;
            print_progress(&course, &enrollments);
        }
        Commands::Detail {
            course,
            emp_no,
            email,
        } => {
            let course = resolve_course(&api, course.as_deref()).await?;
            let enrollments = api.list_enrollments(&course.id).await?;
            let selected = find_enrollment(&enrollments, emp_no.as_deref(), email.as_deref())?;
            let panel = api.fetch_detail(selected).await;
            print_detail(&course, selected, &panel);
        }
        Commands::Enroll {
            course,
            employee_ids,
            csv,
        } => {
            let mut rows: Vec<EnrollmentRequest> = employee_ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(|id| EnrollmentRequest {
                    employee_id: id.to_string(),
                    name: None,
                    dept: None,
                    email: None,
                })
                .collect();

            if let Some(path) = &csv {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                rows.extend(parse_roster(file)?);
            }

            if rows.is_empty() {
                bail!("at least one employee id is required (use --employee-id or --csv)");
            }

            let count = rows.len();
            api.enroll(&course, &rows).await?;
            println!("Registered {count} employee(s) into course {course}.");
        }
        Commands::Report { course, out } => {
            let course = resolve_course(&api, course.as_deref()).await?;
            let enrollments = api.list_enrollments(&course.id).await?;
            let report = report::build_report(&course, Utc::now().date_naive(), &enrollments);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch {
            course,
            interval_secs,
            ticks,
        } => {
            let course = resolve_course(&api, course.as_deref()).await?;
            watch(&api, &course, interval_secs, ticks).await;
        }
    }

    Ok(())
}

/// When no course is requested, the first listed course is the selection.
async fn resolve_course(api: &ApiClient, requested: Option<&str>) -> anyhow::Result<Course> {
    let courses = api.list_courses().await?;
    match requested {
        Some(id) => courses
            .into_iter()
            .find(|course| course.id == id)
            .ok_or_else(|| anyhow!("no course with id {id}")),
        None => courses
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no courses available")),
    }
}

fn find_enrollment<'a>(
    enrollments: &'a [Enrollment],
    emp_no: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<&'a Enrollment> {
    enrollments
        .iter()
        .find(|enrollment| match (emp_no, email) {
            (Some(number), _) => enrollment.employee_number.as_deref() == Some(number),
            (None, Some(address)) => enrollment.email.eq_ignore_ascii_case(address),
            (None, None) => false,
        })
        .ok_or_else(|| anyhow!("no enrollment matches that employee"))
}

fn print_progress(course: &Course, enrollments: &[Enrollment]) {
    println!("Enrollments for {} ({}):", course.title, course.id);
    if enrollments.is_empty() {
        println!("No enrollments for this course.");
        return;
    }

    for enrollment in enrollments {
        println!(
            "  {:<20} {:<16} {:<28} {} {:>3.0}%",
            enrollment.name,
            enrollment.department,
            enrollment.email,
            progress_bar(enrollment.display_progress()),
            enrollment.display_progress()
        );
    }

    let groups = report::group_by_status(enrollments);
    for (label, group) in [
        ("Not started", &groups.not_started),
        ("In progress", &groups.in_progress),
        ("Completed", &groups.completed),
    ] {
        println!();
        println!("{label} ({}):", group.len());
        if group.is_empty() {
            println!("  none");
        } else {
            for enrollment in group {
                let mut line = format!("  - {}", enrollment.name);
                if !enrollment.department.is_empty() {
                    line.push_str(&format!(" · {}", enrollment.department));
                }
                if !enrollment.email.is_empty() {
                    line.push_str(&format!(" · {}", enrollment.email));
                }
                println!("{line}");
            }
        }
    }
}

fn print_detail(course: &Course, enrollment: &Enrollment, panel: &api::DetailPanel) {
    println!("Enrollment detail for {} ({}):", course.title, course.id);
    if let Some(error) = &panel.error {
        println!("! {error}");
    }

    println!();
    println!("Employee");
    println!(
        "  emp no:     {}",
        panel.employee.emp_no.as_deref().unwrap_or("-")
    );
    println!("  name:       {}", panel.employee.name);
    println!(
        "  department: {}",
        display_or_dash(&panel.employee.department)
    );
    println!("  email:      {}", display_or_dash(&panel.employee.email));
    if let Some(phone) = &panel.employee.phone {
        println!("  phone:      {phone}");
    }
    println!(
        "  progress:   {:.0}% ({})",
        enrollment.display_progress(),
        enrollment.status.label()
    );

    println!();
    println!("Evaluation");
    match &panel.evaluation {
        Some(evaluation) => {
            println!(
                "  motion: {}",
                evaluation.motion_name.as_deref().unwrap_or("-")
            );
            match evaluation.score {
                Some(score) => println!("  score:  {score}"),
                None => println!("  score:  -"),
            }
            println!("  detail: {}", evaluation.detail.as_deref().unwrap_or("-"));
            if let Some(distance) = evaluation.normalized_distance {
                println!("  normalized distance: {distance}");
            }
        }
        None if enrollment.employee_number.is_none() => {
            println!("  No employee number on file; evaluation cannot be looked up.");
        }
        None => println!("  No evaluation data."),
    }
}

fn display_or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

fn progress_bar(progress: f64) -> String {
    const WIDTH: usize = 10;
    let filled = ((progress / 100.0) * WIDTH as f64).round() as usize;
    let filled = filled.min(WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

async fn watch(api: &ApiClient, course: &Course, interval_secs: u64, ticks: u64) {
    let live = LiveProgress::new();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut fired = 0u64;
    let mut last_task = None;

    println!(
        "Watching {} ({}); refreshing every {}s.",
        course.title,
        course.id,
        interval_secs.max(1)
    );

    loop {
        interval.tick().await;

        // Each tick supersedes whatever fetch is still in flight.
        let ticket = live.start_refresh();
        let api = api.clone();
        let live_handle = live.clone();
        let course_id = course.id.clone();
        last_task = Some(tokio::spawn(async move {
            match api.list_enrollments(&course_id).await {
                Ok(enrollments) => {
                    let snapshot = ProgressSnapshot {
                        course_id,
                        enrollments,
                        fetched_at: Utc::now(),
                    };
                    if live_handle.commit(&ticket, snapshot) {
                        if let Some(latest) = live_handle.latest() {
                            print_snapshot(&latest);
                        }
                    } else {
                        debug!("discarded a superseded enrollment fetch");
                    }
                }
                Err(error) => warn!("enrollment refresh failed: {error:#}"),
            }
        }));

        fired += 1;
        if ticks > 0 && fired >= ticks {
            break;
        }
    }

    if let Some(task) = last_task {
        let _ = task.await;
    }
}

fn print_snapshot(snapshot: &ProgressSnapshot) {
    let groups = report::group_by_status(&snapshot.enrollments);
    println!(
        "[{}] {} enrolled: {} completed, {} in progress, {} not started (avg {:.0}%)",
        snapshot.fetched_at.format("%H:%M:%S"),
        groups.total(),
        groups.completed.len(),
        groups.in_progress.len(),
        groups.not_started.len(),
        report::average_progress(&snapshot.enrollments)
    );
}

/// Roster CSV columns: employee_id,name,dept,email. Optional columns may be
/// blank; rows without an employee id are dropped.
fn parse_roster(input: impl std::io::Read) -> anyhow::Result<Vec<EnrollmentRequest>> {
    #[derive(serde::Deserialize)]
    struct RosterRow {
        employee_id: String,
        name: Option<String>,
        dept: Option<String>,
        email: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(input);
    let mut rows = Vec::new();

    for result in reader.deserialize::<RosterRow>() {
        let row = result?;
        let employee_id = row.employee_id.trim().to_string();
        if employee_id.is_empty() {
            continue;
        }
        rows.push(EnrollmentRequest {
            employee_id,
            name: non_blank(row.name),
            dept: non_blank(row.dept),
            email: non_blank(row.email),
        });
    }

    Ok(rows)
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnrollmentStatus;

    fn enrollment(name: &str, emp_no: Option<&str>, email: &str) -> Enrollment {
        Enrollment {
            id: name.to_string(),
            employee_ref: None,
            employee_number: emp_no.map(str::to_string),
            name: name.to_string(),
            department: String::new(),
            email: email.to_string(),
            progress: 0.0,
            status: EnrollmentStatus::NotStarted,
        }
    }

    #[test]
    fn roster_rows_without_an_employee_id_are_dropped() {
        let csv_text = "employee_id,name,dept,email\n\
                        1042,Dana Park,Safety,dana@example.com\n\
                        \" \",Skip Me,,\n\
                        2077,,,\n";
        let rows = parse_roster(csv_text.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].employee_id, "1042");
        assert_eq!(rows[0].name.as_deref(), Some("Dana Park"));
        assert_eq!(rows[0].dept.as_deref(), Some("Safety"));
        assert_eq!(rows[1].employee_id, "2077");
        assert!(rows[1].name.is_none());
        assert!(rows[1].email.is_none());
    }

    #[test]
    fn find_enrollment_matches_number_then_email() {
        let enrollments = vec![
            enrollment("Dana Park", Some("1042"), "dana@example.com"),
            enrollment("Jules Moreno", None, "jules@example.com"),
        ];

        let by_number = find_enrollment(&enrollments, Some("1042"), None).unwrap();
        assert_eq!(by_number.name, "Dana Park");

        let by_email = find_enrollment(&enrollments, None, Some("JULES@example.com")).unwrap();
        assert_eq!(by_email.name, "Jules Moreno");

        assert!(find_enrollment(&enrollments, Some("9999"), None).is_err());
    }

    #[test]
    fn progress_bar_is_bounded() {
        assert_eq!(progress_bar(0.0), "[----------]");
        assert_eq!(progress_bar(45.0), "[#####-----]");
        assert_eq!(progress_bar(100.0), "[##########]");
    }
}
