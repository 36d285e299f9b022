//! Jobsched SDK - Rust Client Library
//!
//! Typed client for the job-scheduling service HTTP API: register, list,
//! inspect, delete and force-evaluate jobs, and read the evaluations and
//! allocations derived from them. Every call returns the store index the
//! answer reflects ([`QueryMeta`] for reads, [`WriteMeta`] for writes).
//!
//! # Example
//!
//! ```no_run
//! use jobsched_sdk::{Client, Config, Constraint, Job};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::from_env())?;
//!     let jobs = client.jobs();
//!
//!     let mut job = Job::new_service("web", "frontend", 50);
//!     job.set_meta("team", "edge")
//!         .constrain(Constraint::hard("kernel.name", "=", "linux"));
//!
//!     let (eval_id, _) = jobs.register(&job, None).await?;
//!     let (evals, meta) = jobs.evaluations("web", None).await?;
//!     assert!(evals.iter().any(|e| e.id == eval_id));
//!     println!("{} evaluations as of index {}", evals.len(), meta.last_index);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod jobs;
mod options;
mod types;

pub use client::{Client, Config, DEFAULT_ADDRESS};
pub use error::{Result, SdkError};
pub use jobs::Jobs;
pub use options::{
    QueryMeta, QueryOptions, WriteMeta, WriteOptions, HEADER_INDEX, HEADER_KNOWN_LEADER,
    HEADER_LAST_CONTACT,
};
pub use types::{
    Allocation, Constraint, EvalResponse, Evaluation, Job, JobId, JobListStub, JobType, Priority,
    RegisterJobRequest,
};
