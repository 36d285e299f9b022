//! HTTP Route Handlers
//!
//! Implements the jobs endpoints on top of the in-memory [`StateStore`].

use crate::error::AgentError;
use crate::server::AgentConfig;
use crate::state::{StateStore, Table};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobsched_sdk::{
    EvalResponse, Job, JobListStub, RegisterJobRequest, HEADER_INDEX, HEADER_KNOWN_LEADER,
    HEADER_LAST_CONTACT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_WAIT: Duration = Duration::from_secs(300);
const MAX_WAIT: Duration = Duration::from_secs(600);
const MIN_PRIORITY: i32 = 1;
const MAX_PRIORITY: i32 = 100;

/// Query-string parameters shared by all endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RequestParams {
    pub region: Option<String>,
    pub stale: Option<String>,
    pub index: Option<u64>,
    pub wait: Option<String>,
}

/// Handler state with injected dependencies
#[derive(Debug)]
pub struct Agent {
    store: Arc<StateStore>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(store: Arc<StateStore>, config: AgentConfig) -> Self {
        Self { store, config }
    }

    fn check_region(&self, params: &RequestParams) -> Result<(), AgentError> {
        match params.region.as_deref() {
            None | Some("") => Ok(()),
            Some(region) if region == self.config.region => Ok(()),
            Some(_) => Err(AgentError::Internal("No path to region".to_string())),
        }
    }

    /// Hold a blocking query until `table` moves past `index` or the wait ends
    async fn block(&self, table: Table, params: &RequestParams) -> Result<(), AgentError> {
        let Some(min_index) = params.index.filter(|index| *index > 0) else {
            return Ok(());
        };
        let wait = match params.wait.as_deref() {
            Some(raw) => parse_wait(raw)?,
            None => DEFAULT_WAIT,
        };

        debug!(?table, min_index, wait_ms = wait.as_millis() as u64, "blocking query");
        self.store.wait_for_change(table, min_index, wait).await;
        Ok(())
    }

    fn query_response<T: Serialize>(&self, body: T, index: u64) -> Response {
        let mut response = Json(body).into_response();
        let headers = response.headers_mut();
        headers.insert(HeaderName::from_static(HEADER_INDEX), HeaderValue::from(index));
        headers.insert(
            HeaderName::from_static(HEADER_KNOWN_LEADER),
            HeaderValue::from_static(if self.config.known_leader { "true" } else { "false" }),
        );
        headers.insert(
            HeaderName::from_static(HEADER_LAST_CONTACT),
            HeaderValue::from(self.config.last_contact.as_millis() as u64),
        );
        response
    }

    fn write_response<T: Serialize>(&self, body: T, index: u64) -> Response {
        let mut response = Json(body).into_response();
        response
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_INDEX), HeaderValue::from(index));
        response
    }
}

/// Parse a `wait` value such as `"5000ms"`, `"5s"` or `"1m"`
pub fn parse_wait(raw: &str) -> Result<Duration, AgentError> {
    let invalid = || AgentError::BadRequest(format!("Invalid wait time: {}", raw));

    let (digits, millis_per_unit): (&str, u64) = if let Some(n) = raw.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = raw.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = raw.strip_suffix('m') {
        (n, 60_000)
    } else {
        return Err(invalid());
    };

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    Ok(Duration::from_millis(value.saturating_mul(millis_per_unit)).min(MAX_WAIT))
}

/// Reject jobs the store must not accept
pub fn validate_job(job: &Job) -> Result<(), AgentError> {
    if job.id.is_empty() {
        return Err(AgentError::BadRequest("Missing job ID".to_string()));
    }
    if job.id.contains(' ') {
        return Err(AgentError::BadRequest("Job ID contains a space".to_string()));
    }
    if job.name.is_empty() {
        return Err(AgentError::BadRequest("Missing job name".to_string()));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&job.priority) {
        return Err(AgentError::BadRequest(format!(
            "Job priority must be between [{}, {}]",
            MIN_PRIORITY, MAX_PRIORITY
        )));
    }
    for (i, constraint) in job.constraints.iter().enumerate() {
        if constraint.operand.is_empty() {
            return Err(AgentError::BadRequest(format!(
                "Constraint {} missing operand",
                i + 1
            )));
        }
    }
    Ok(())
}

/// GET /v1/jobs
pub async fn list_jobs(
    State(agent): State<Arc<Agent>>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;
    agent.block(Table::Jobs, &params).await?;

    let (jobs, index) = agent.store.jobs();
    let stubs: Vec<JobListStub> = jobs.iter().map(JobListStub::from).collect();
    Ok(agent.query_response(stubs, index))
}

/// PUT /v1/jobs
pub async fn register_job(
    State(agent): State<Arc<Agent>>,
    Query(params): Query<RequestParams>,
    body: Bytes,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;

    let request: RegisterJobRequest = serde_json::from_slice(&body)
        .map_err(|e| AgentError::BadRequest(format!("Failed to decode request body: {}", e)))?;
    validate_job(&request.job)?;

    let job_id = request.job.id.clone();
    let (eval_id, index) = agent.store.upsert_job(request.job);
    debug!(job_id = %job_id, eval_id = %eval_id, index, "job registered");

    Ok(agent.write_response(EvalResponse { eval_id }, index))
}

/// GET /v1/job/{job_id}
pub async fn job_info(
    State(agent): State<Arc<Agent>>,
    Path(job_id): Path<String>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;
    agent.block(Table::Jobs, &params).await?;

    match agent.store.job(&job_id) {
        (Some(job), index) => Ok(agent.query_response(job, index)),
        (None, _) => Err(AgentError::NotFound("job not found".to_string())),
    }
}

/// GET /v1/job/{job_id}/allocations
pub async fn job_allocations(
    State(agent): State<Arc<Agent>>,
    Path(job_id): Path<String>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;
    agent.block(Table::Allocs, &params).await?;

    let (allocs, index) = agent.store.allocs_by_job(&job_id);
    Ok(agent.query_response(allocs, index))
}

/// GET /v1/job/{job_id}/evaluations
pub async fn job_evaluations(
    State(agent): State<Arc<Agent>>,
    Path(job_id): Path<String>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;
    agent.block(Table::Evals, &params).await?;

    let (evals, index) = agent.store.evals_by_job(&job_id);
    Ok(agent.query_response(evals, index))
}

/// DELETE /v1/job/{job_id}
pub async fn deregister_job(
    State(agent): State<Arc<Agent>>,
    Path(job_id): Path<String>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;

    let index = agent.store.delete_job(&job_id);
    debug!(job_id = %job_id, index, "job deregistered");

    Ok(agent.write_response(serde_json::Value::Null, index))
}

/// PUT /v1/job/{job_id}/evaluate
pub async fn force_evaluate(
    State(agent): State<Arc<Agent>>,
    Path(job_id): Path<String>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AgentError> {
    agent.check_region(&params)?;

    // Lookup failures on this path come back through the generic error
    // route, like any other failed RPC.
    let (eval_id, index) = agent
        .store
        .force_evaluate(&job_id)
        .ok_or_else(|| AgentError::Internal("job not found".to_string()))?;

    Ok(agent.write_response(EvalResponse { eval_id }, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsched_sdk::Constraint;

    #[test]
    fn test_parse_wait_units() {
        assert_eq!(parse_wait("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_wait("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_wait("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_wait("99m").unwrap(), MAX_WAIT);
    }

    #[test]
    fn test_parse_wait_rejects_garbage() {
        assert!(parse_wait("soon").is_err());
        assert!(parse_wait("10").is_err());
        assert!(parse_wait("ms").is_err());
    }

    #[test]
    fn test_validate_job() {
        assert!(validate_job(&Job::new_batch("job1", "myjob", 5)).is_ok());

        let err = validate_job(&Job::new_batch("", "myjob", 5)).unwrap_err();
        assert!(err.to_string().contains("Missing job ID"));

        let err = validate_job(&Job::new_batch("job1", "myjob", 0)).unwrap_err();
        assert!(err.to_string().contains("priority"));

        let mut job = Job::new_batch("job1", "myjob", 5);
        job.constrain(Constraint::hard("kernel.name", "", "linux"));
        assert!(validate_job(&job).is_err());
    }
}
