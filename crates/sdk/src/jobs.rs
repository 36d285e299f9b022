//! Jobs endpoints
//!
//! Each method issues exactly one HTTP request. Nothing is cached or
//! retried; errors from the service are returned as-is.

use crate::client::Client;
use crate::error::Result;
use crate::options::{QueryMeta, QueryOptions, WriteMeta, WriteOptions};
use crate::types::{Allocation, EvalResponse, Evaluation, Job, JobListStub, RegisterJobRequest};
use tracing::debug;

/// Handle on the jobs endpoints, borrowed from a [`Client`]
#[derive(Debug, Clone, Copy)]
pub struct Jobs<'a> {
    client: &'a Client,
}

impl<'a> Jobs<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List all known jobs
    ///
    /// An empty store yields an empty list, not an error.
    pub async fn list(
        &self,
        opts: Option<&QueryOptions>,
    ) -> Result<(Vec<JobListStub>, QueryMeta)> {
        let (jobs, meta): (Option<Vec<JobListStub>>, _) =
            self.client.query(&["v1", "jobs"], opts).await?;
        Ok((jobs.unwrap_or_default(), meta))
    }

    /// Register (or update) a job
    ///
    /// Returns the ID of the evaluation created by the registration.
    /// A job the service rejects surfaces as [`SdkError::Validation`].
    ///
    /// [`SdkError::Validation`]: crate::SdkError::Validation
    pub async fn register(
        &self,
        job: &Job,
        opts: Option<&WriteOptions>,
    ) -> Result<(String, WriteMeta)> {
        let request = RegisterJobRequest { job: job.clone() };
        let (response, meta): (EvalResponse, _) = self
            .client
            .write(&["v1", "jobs"], Some(&request), opts)
            .await?;

        debug!(
            job_id = %job.id,
            eval_id = %response.eval_id,
            index = meta.last_index,
            "job registered"
        );
        Ok((response.eval_id, meta))
    }

    /// Look up a single job
    ///
    /// An unknown ID fails with [`SdkError::NotFound`].
    ///
    /// [`SdkError::NotFound`]: crate::SdkError::NotFound
    pub async fn info(
        &self,
        job_id: &str,
        opts: Option<&QueryOptions>,
    ) -> Result<(Job, QueryMeta)> {
        self.client.query(&["v1", "job", job_id], opts).await
    }

    /// Allocations placed for a job
    ///
    /// Unlike [`Jobs::info`], an unknown ID yields an empty list.
    pub async fn allocations(
        &self,
        job_id: &str,
        opts: Option<&QueryOptions>,
    ) -> Result<(Vec<Allocation>, QueryMeta)> {
        let (allocs, meta): (Option<Vec<Allocation>>, _) = self
            .client
            .query(&["v1", "job", job_id, "allocations"], opts)
            .await?;
        Ok((allocs.unwrap_or_default(), meta))
    }

    /// Evaluations of a job, in the order the service returns them
    ///
    /// An unknown ID yields an empty list.
    pub async fn evaluations(
        &self,
        job_id: &str,
        opts: Option<&QueryOptions>,
    ) -> Result<(Vec<Evaluation>, QueryMeta)> {
        let (evals, meta): (Option<Vec<Evaluation>>, _) = self
            .client
            .query(&["v1", "job", job_id, "evaluations"], opts)
            .await?;
        Ok((evals.unwrap_or_default(), meta))
    }

    /// Deregister a job. Deleting an unknown job succeeds.
    pub async fn delete(&self, job_id: &str, opts: Option<&WriteOptions>) -> Result<WriteMeta> {
        let meta = self.client.delete(&["v1", "job", job_id], opts).await?;

        debug!(job_id = %job_id, index = meta.last_index, "job deregistered");
        Ok(meta)
    }

    /// Create a new evaluation for an existing job without resubmitting it
    pub async fn force_evaluate(
        &self,
        job_id: &str,
        opts: Option<&WriteOptions>,
    ) -> Result<(String, WriteMeta)> {
        let (response, meta): (EvalResponse, _) = self
            .client
            .write::<(), _>(&["v1", "job", job_id, "evaluate"], None, opts)
            .await?;
        Ok((response.eval_id, meta))
    }
}
