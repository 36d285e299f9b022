//! Jobsched CLI - Command-line interface for the job-scheduling service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use jobsched_sdk::{
    Allocation, Client, Config, Evaluation, Job, JobListStub, JobType, RegisterJobRequest,
    DEFAULT_ADDRESS,
};
use serde::Deserialize;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "jobsched")]
#[command(about = "Job scheduling service CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service address
    #[arg(long, env = "JOBSCHED_ADDR", default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Region to address (defaults to the server's own region)
    #[arg(long, env = "JOBSCHED_REGION")]
    region: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List jobs, or show one job
    Status {
        /// Job ID
        job_id: Option<String>,
    },

    /// Register a job from a JSON file
    Run {
        /// Job file (`{"Job": {...}}` or a bare job document)
        file: PathBuf,
    },

    /// Deregister a job
    Stop {
        /// Job ID
        job_id: String,
    },

    /// Force a new evaluation of a job
    Eval {
        /// Job ID
        job_id: String,
    },

    /// List allocations of a job
    Allocs {
        /// Job ID
        job_id: String,
    },

    /// List evaluations of a job
    Evals {
        /// Job ID
        job_id: String,
    },

    /// Print a skeleton job file
    Init {
        /// Job ID
        job_id: String,

        /// Job type (batch or service)
        #[arg(short = 't', long = "type", default_value = "batch")]
        job_type: JobType,

        /// Job name (defaults to the ID)
        #[arg(short, long)]
        name: Option<String>,

        /// Priority (1-100)
        #[arg(short, long, default_value = "50")]
        priority: i32,
    },
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    job_type: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<JobListStub> for JobRow {
    fn from(stub: JobListStub) -> Self {
        Self {
            id: stub.id,
            name: stub.name,
            job_type: stub.job_type.to_string(),
            priority: stub.priority,
            status: stub.status,
        }
    }
}

#[derive(Tabled)]
struct EvalRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Triggered By")]
    triggered_by: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Index")]
    modify_index: u64,
}

impl From<Evaluation> for EvalRow {
    fn from(eval: Evaluation) -> Self {
        Self {
            id: eval.id,
            triggered_by: eval.triggered_by,
            status: eval.status,
            modify_index: eval.modify_index,
        }
    }
}

#[derive(Tabled)]
struct AllocRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Node")]
    node_id: String,
    #[tabled(rename = "Task Group")]
    task_group: String,
    #[tabled(rename = "Desired")]
    desired_status: String,
    #[tabled(rename = "Status")]
    client_status: String,
}

impl From<Allocation> for AllocRow {
    fn from(alloc: Allocation) -> Self {
        Self {
            id: alloc.id,
            node_id: alloc.node_id,
            task_group: alloc.task_group,
            desired_status: alloc.desired_status,
            client_status: alloc.client_status,
        }
    }
}

/// A job file holds either the registration envelope or the bare job
#[derive(Deserialize)]
#[serde(untagged)]
enum JobFile {
    Envelope(RegisterJobRequest),
    Bare(Job),
}

fn parse_job_file(contents: &str) -> Result<Job> {
    let file: JobFile =
        serde_json::from_str(contents).context("File is not a valid job document")?;
    Ok(match file {
        JobFile::Envelope(request) => request.job,
        JobFile::Bare(job) => job,
    })
}

fn skeleton_job(job_id: &str, job_type: JobType, name: Option<&str>, priority: i32) -> Job {
    let name = name.unwrap_or(job_id);
    let mut job = match job_type {
        JobType::Batch => Job::new_batch(job_id, name, priority),
        JobType::Service => Job::new_service(job_id, name, priority),
    };
    job.add_datacenter("dc1");
    job
}

fn init_logging() {
    let log_format = std::env::var("JOBSCHED_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("jobsched=info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env().with_address(cli.address.clone());
    config.region = cli.region.clone();
    let client = Client::new(config).context("Invalid client configuration")?;
    let jobs = client.jobs();

    match cli.command {
        Commands::Status { job_id: None } => {
            let (stubs, meta) = jobs.list(None).await.context("Failed to list jobs")?;

            if stubs.is_empty() {
                println!("{}", "No running jobs".yellow());
            } else {
                let rows: Vec<JobRow> = stubs.into_iter().map(JobRow::from).collect();
                println!("{}", Table::new(rows));
            }
            info!(index = meta.last_index, "listed jobs");
        }

        Commands::Status {
            job_id: Some(job_id),
        } => {
            let (job, meta) = jobs
                .info(&job_id, None)
                .await
                .with_context(|| format!("Failed to read job {}", job_id))?;

            println!("{}", format!("Job {}", job.id).cyan().bold());
            println!();
            println!("  {} {}", "Name:".bold(), job.name);
            println!("  {} {}", "Type:".bold(), job.job_type);
            println!("  {} {}", "Priority:".bold(), job.priority);
            println!("  {} {}", "Status:".bold(), job.status);
            println!("  {} {}", "Datacenters:".bold(), job.datacenters.join(", "));

            if !job.meta.is_empty() {
                println!("  {}", "Meta:".bold());
                let mut pairs: Vec<_> = job.meta.iter().collect();
                pairs.sort();
                for (key, value) in pairs {
                    println!("    {} = {}", key, value);
                }
            }
            if !job.constraints.is_empty() {
                println!("  {}", "Constraints:".bold());
                for c in &job.constraints {
                    let kind = if c.hard {
                        "hard".to_string()
                    } else {
                        format!("soft, weight {}", c.weight)
                    };
                    println!("    {} {} {} ({})", c.l_target, c.operand, c.r_target, kind);
                }
            }
            info!(index = meta.last_index, known_leader = meta.known_leader, "read job");
        }

        Commands::Run { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let job = parse_job_file(&contents)?;

            let (eval_id, meta) = jobs
                .register(&job, None)
                .await
                .with_context(|| format!("Failed to register job {}", job.id))?;

            println!("{}", format!("✓ Job {} registered", job.id).green().bold());
            println!("  {} {}", "Evaluation:".bold(), eval_id);
            println!("  {} {}", "Index:".bold(), meta.last_index);
        }

        Commands::Stop { job_id } => {
            let meta = jobs
                .delete(&job_id, None)
                .await
                .with_context(|| format!("Failed to deregister job {}", job_id))?;

            println!("{}", format!("✓ Job {} deregistered", job_id).green().bold());
            println!("  {} {}", "Index:".bold(), meta.last_index);
        }

        Commands::Eval { job_id } => {
            let (eval_id, meta) = jobs
                .force_evaluate(&job_id, None)
                .await
                .with_context(|| format!("Failed to evaluate job {}", job_id))?;

            println!("{}", format!("✓ Evaluation {} created", eval_id).green().bold());
            println!("  {} {}", "Index:".bold(), meta.last_index);
        }

        Commands::Allocs { job_id } => {
            let (allocs, _) = jobs
                .allocations(&job_id, None)
                .await
                .with_context(|| format!("Failed to list allocations of {}", job_id))?;

            if allocs.is_empty() {
                println!("{}", "No allocations placed".yellow());
            } else {
                let rows: Vec<AllocRow> = allocs.into_iter().map(AllocRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Evals { job_id } => {
            let (evals, _) = jobs
                .evaluations(&job_id, None)
                .await
                .with_context(|| format!("Failed to list evaluations of {}", job_id))?;

            if evals.is_empty() {
                println!("{}", "No evaluations".yellow());
            } else {
                let rows: Vec<EvalRow> = evals.into_iter().map(EvalRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Init {
            job_id,
            job_type,
            name,
            priority,
        } => {
            let job = skeleton_job(&job_id, job_type, name.as_deref(), priority);
            let document = serde_json::to_string_pretty(&RegisterJobRequest { job })?;
            println!("{}", document);
        }
    }

    Ok(())
}
