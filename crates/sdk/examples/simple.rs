//! Simple SDK Example
//!
//! Registers a batch job, inspects it, forces a re-evaluation and
//! deregisters it again.
//!
//! # Usage
//!
//! ```bash
//! JOBSCHED_ADDR=http://127.0.0.1:4646 cargo run -p jobsched-sdk --example simple
//! ```

use jobsched_sdk::{Client, Config, Constraint, Job};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Jobsched SDK - Simple Example");
    println!("=============================\n");

    let client = Client::new(Config::from_env())?;
    let jobs = client.jobs();
    println!("1. Talking to {}\n", client.address());

    // 2. Build and register a job
    let mut job = Job::new_batch("example-report", "nightly-report", 50);
    job.add_datacenter("dc1")
        .set_meta("owner", "reporting")
        .constrain(Constraint::hard("kernel.name", "=", "linux"))
        .constrain(Constraint::soft("memory.totalbytes", ">=", "128000000", 2));

    let (eval_id, wm) = jobs.register(&job, None).await?;
    println!("2. Registered {} -> evaluation {}", job.id, eval_id);
    println!("   index: {}\n", wm.last_index);

    // 3. Read it back
    let (stored, qm) = jobs.info(&job.id, None).await?;
    println!("3. Job {} ({}, priority {})", stored.id, stored.job_type, stored.priority);
    println!("   known leader: {}, index: {}\n", qm.known_leader, qm.last_index);

    // 4. Force a re-evaluation and list evaluations
    let (forced, _) = jobs.force_evaluate(&job.id, None).await?;
    let (evals, _) = jobs.evaluations(&job.id, None).await?;
    println!("4. Forced evaluation {}", forced);
    for eval in &evals {
        println!("   - {} ({})", eval.id, eval.triggered_by);
    }
    println!();

    // 5. Deregister
    let wm = jobs.delete(&job.id, None).await?;
    println!("5. Deregistered at index {}", wm.last_index);

    Ok(())
}
