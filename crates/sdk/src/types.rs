//! Jobs API Data Model
//!
//! Mirrors the JSON documents exchanged with the scheduling service.
//! Field names are PascalCase on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Job identifier (caller-supplied, unique per job)
pub type JobId = String;

/// Priority (higher number = higher priority)
pub type Priority = i32;

/// Decode `null` as the type's default (the service emits `null` for empty
/// maps and lists).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Job Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Batch,
    Service,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Batch => write!(f, "batch"),
            JobType::Service => write!(f, "service"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "batch" => Ok(JobType::Batch),
            "service" => Ok(JobType::Service),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

/// Placement restriction on a job.
///
/// Hard constraints must be satisfied; soft constraints only bias the
/// placement score by `weight`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Constraint {
    pub hard: bool,
    pub l_target: String,
    pub r_target: String,
    pub operand: String,
    #[serde(default)]
    pub weight: i32,
}

impl Constraint {
    /// Hard constraint (weight is always 0)
    pub fn hard(
        l_target: impl Into<String>,
        operand: impl Into<String>,
        r_target: impl Into<String>,
    ) -> Self {
        Self {
            hard: true,
            l_target: l_target.into(),
            r_target: r_target.into(),
            operand: operand.into(),
            weight: 0,
        }
    }

    /// Soft constraint carrying a scoring weight
    pub fn soft(
        l_target: impl Into<String>,
        operand: impl Into<String>,
        r_target: impl Into<String>,
        weight: i32,
    ) -> Self {
        Self {
            hard: false,
            l_target: l_target.into(),
            r_target: r_target.into(),
            operand: operand.into(),
            weight,
        }
    }
}

/// Job Entity
///
/// Built locally, mutated by the caller, then submitted with
/// [`Jobs::register`](crate::Jobs::register). The status and index fields
/// are filled in by the service and ignored on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(rename = "ID")]
    pub id: JobId,
    pub name: String,
    #[serde(rename = "Type")]
    pub job_type: JobType,
    pub priority: Priority,

    #[serde(default, deserialize_with = "null_as_default")]
    pub datacenters: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub constraints: Vec<Constraint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: HashMap<String, String>,

    // Server-populated
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

impl Job {
    fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        job_type: JobType,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            job_type,
            priority,
            datacenters: Vec::new(),
            constraints: Vec::new(),
            meta: HashMap::new(),
            status: String::new(),
            status_description: String::new(),
            create_index: 0,
            modify_index: 0,
        }
    }

    /// Create a batch job
    pub fn new_batch(id: impl Into<String>, name: impl Into<String>, priority: Priority) -> Self {
        Self::new(id, name, JobType::Batch, priority)
    }

    /// Create a service job
    pub fn new_service(id: impl Into<String>, name: impl Into<String>, priority: Priority) -> Self {
        Self::new(id, name, JobType::Service, priority)
    }

    /// Set a metadata pair. Existing pairs are kept; a repeated key is
    /// overwritten.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Append a placement constraint
    pub fn constrain(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a datacenter the job may be placed in
    pub fn add_datacenter(&mut self, datacenter: impl Into<String>) -> &mut Self {
        self.datacenters.push(datacenter.into());
        self
    }
}

/// Abbreviated job returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobListStub {
    #[serde(rename = "ID")]
    pub id: JobId,
    pub name: String,
    #[serde(rename = "Type")]
    pub job_type: JobType,
    pub priority: Priority,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

impl From<&Job> for JobListStub {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            job_type: job.job_type,
            priority: job.priority,
            status: job.status.clone(),
            status_description: job.status_description.clone(),
            create_index: job.create_index,
            modify_index: job.modify_index,
        }
    }
}

/// Server-generated record of a scheduling attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Evaluation {
    #[serde(rename = "ID")]
    pub id: String,
    pub priority: Priority,
    #[serde(rename = "Type")]
    pub eval_type: String,
    pub triggered_by: String,
    #[serde(rename = "JobID")]
    pub job_id: JobId,
    pub job_modify_index: u64,
    pub status: String,
    pub status_description: String,
    pub create_index: u64,
    pub modify_index: u64,
}

/// Server-generated record of a job instance placed on a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "EvalID")]
    pub eval_id: String,
    pub name: String,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(rename = "JobID")]
    pub job_id: JobId,
    pub task_group: String,
    pub desired_status: String,
    pub desired_description: String,
    pub client_status: String,
    pub client_description: String,
    pub create_index: u64,
    pub modify_index: u64,
}

/// Body of a job registration (`PUT /v1/jobs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterJobRequest {
    pub job: Job,
}

/// Response of register and force-evaluate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResponse {
    #[serde(rename = "EvalID")]
    pub eval_id: String,
}
