//! HTTP access to the training backend: authenticated requests, endpoint
//! fallback chains, and the per-enrollment detail lookup.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::warn;

use crate::models::{Course, EmployeeDetail, Enrollment, EnrollmentRequest, EvaluationSummary};
use crate::normalize;

/// Motion submitted when a backend only produces an evaluation on write.
const EVALUATION_MOTION: &str = "fire_extinguisher_lift";

pub type Candidate<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Await candidates in order, short-circuiting on the first success. Only
/// when every candidate fails is the last error surfaced, scoped to the
/// operation name.
pub async fn first_ok<T>(
    what: &str,
    candidates: Vec<(&'static str, Candidate<'_, T>)>,
) -> Result<T> {
    let mut last_error = None;
    for (label, candidate) in candidates {
        match candidate.await {
            Ok(value) => return Ok(value),
            Err(error) => {
                warn!("{what}: {label} failed: {error:#}");
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no candidates tried")))
        .with_context(|| format!("all endpoints failed for {what}"))
}

/// Per-enrollment detail panel. The employee profile is always populated,
/// falling back to the enrollment's own fields; the evaluation and the error
/// message are each optional.
#[derive(Debug)]
pub struct DetailPanel {
    pub employee: EmployeeDetail,
    pub evaluation: Option<EvaluationSummary>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        auth: bool,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if auth {
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("HTTP {status}: {text}");
        }
        response
            .json()
            .await
            .with_context(|| format!("invalid JSON from {url}"))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)], auth: bool) -> Result<Value> {
        self.request(Method::GET, path, query, None, auth).await
    }

    async fn post(&self, path: &str, body: &Value, auth: bool) -> Result<Value> {
        self.request(Method::POST, path, &[], Some(body), auth).await
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        let body = self
            .get("/courses/courses/", &[], true)
            .await
            .context("failed to load the course list")?;
        Ok(normalize::records(&body)
            .iter()
            .map(normalize::course_record)
            .collect())
    }

    pub async fn list_enrollments(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        let filter_query = [("course", course_id)];
        let nested_path = format!("/courses/courses/{course_id}/enrollments");
        let candidates: Vec<(&'static str, Candidate<'_, Value>)> = vec![
            (
                "enrollment filter",
                Box::pin(self.get("/enrollments/", &filter_query, true)),
            ),
            (
                "course nested list",
                Box::pin(self.get(&nested_path, &[], true)),
            ),
        ];

        let body = first_ok("the enrollment list", candidates).await?;
        Ok(normalize::records(&body)
            .iter()
            .map(normalize::enrollment_record)
            .collect())
    }

    async fn employee_by_ref(&self, reference: &str) -> Result<Value> {
        let path = format!("/organizations/employees/{reference}/");
        self.get(&path, &[], true).await
    }

    async fn employee_by_number(&self, emp_no: &str) -> Result<Option<Value>> {
        let query = [("emp_no", emp_no)];
        let body = self.get("/organizations/employees/", &query, true).await?;
        Ok(normalize::records(&body).into_iter().next())
    }

    /// Evaluation lookup is unauthenticated. The submit call is a
    /// compatibility shim for backends that only evaluate on write.
    pub async fn evaluation_by_number(&self, emp_no: &str) -> Result<EvaluationSummary> {
        let query = [("empNo", emp_no)];
        let submit = json!({
            "motionName": EVALUATION_MOTION,
            "empNo": emp_no,
            "sensorData": [],
        });
        let candidates: Vec<(&'static str, Candidate<'_, Value>)> = vec![
            (
                "evaluation lookup",
                Box::pin(self.get("/ai/evaluate/", &query, false)),
            ),
            (
                "evaluation submit",
                Box::pin(self.post("/ai/evaluate/", &submit, false)),
            ),
        ];

        let body = first_ok("the evaluation", candidates).await?;
        Ok(normalize::evaluation_body(&body))
    }

    pub async fn enroll(&self, course_id: &str, rows: &[EnrollmentRequest]) -> Result<()> {
        let path = format!("/courses/courses/{course_id}/enroll");
        self.post(&path, &enroll_payload(rows), true)
            .await
            .context("failed to register the enrollment roster")?;
        Ok(())
    }

    /// Resolve the detail panel for one enrollment. The employee and
    /// evaluation lookups fail independently; the first failure's message is
    /// kept and later failures do not overwrite it.
    pub async fn fetch_detail(&self, enrollment: &Enrollment) -> DetailPanel {
        let mut error: Option<String> = None;
        let mut fetched: Option<Value> = None;

        if let Some(reference) = &enrollment.employee_ref {
            match self.employee_by_ref(reference).await {
                Ok(body) => fetched = Some(body),
                Err(err) => {
                    warn!("employee lookup by reference failed: {err:#}");
                    error.get_or_insert_with(|| "Failed to load the employee profile.".to_string());
                }
            }
        } else if let Some(emp_no) = &enrollment.employee_number {
            match self.employee_by_number(emp_no).await {
                Ok(body) => fetched = body,
                Err(err) => {
                    warn!("employee lookup by number failed: {err:#}");
                    error.get_or_insert_with(|| "Failed to load the employee profile.".to_string());
                }
            }
        }

        let employee = match &fetched {
            Some(body) => normalize::employee_record(body, enrollment),
            None => normalize::employee_record(&Value::Null, enrollment),
        };

        let mut evaluation = None;
        if let Some(emp_no) = &enrollment.employee_number {
            match self.evaluation_by_number(emp_no).await {
                Ok(summary) => evaluation = Some(summary),
                Err(err) => {
                    warn!("evaluation lookup failed: {err:#}");
                    error.get_or_insert_with(|| {
                        "Failed to load the evaluation; the employee may not have one yet."
                            .to_string()
                    });
                }
            }
        }

        DetailPanel {
            employee,
            evaluation,
            error,
        }
    }
}

pub(crate) fn enroll_payload(rows: &[EnrollmentRequest]) -> Value {
    json!({
        "employee_ids": rows.iter().map(|row| row.employee_id.as_str()).collect::<Vec<_>>(),
        "employees": rows,
    })
}
