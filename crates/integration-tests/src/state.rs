//! In-memory state store
//!
//! Keeps jobs, evaluations and allocations behind one lock. Every write
//! advances a single raft-style index; each table remembers the index of its
//! last write so reads can report it and blocking queries can wait on it.

use jobsched_sdk::{Allocation, Evaluation, Job};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

pub const TRIGGER_JOB_REGISTER: &str = "job-register";
pub const TRIGGER_FORCE_EVAL: &str = "job-force-eval";

/// Table a read is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Jobs,
    Evals,
    Allocs,
}

#[derive(Debug, Default)]
struct Tables {
    index: u64,
    jobs: BTreeMap<String, Job>,
    evals: Vec<Evaluation>,
    allocs: Vec<Allocation>,
    jobs_index: u64,
    evals_index: u64,
    allocs_index: u64,
}

impl Tables {
    fn next_index(&mut self) -> u64 {
        self.index += 1;
        self.index
    }

    fn table_index(&self, table: Table) -> u64 {
        match table {
            Table::Jobs => self.jobs_index,
            Table::Evals => self.evals_index,
            Table::Allocs => self.allocs_index,
        }
    }

    fn create_eval(&mut self, job: &Job, triggered_by: &str, index: u64) -> String {
        let eval = Evaluation {
            id: uuid::Uuid::new_v4().to_string(),
            priority: job.priority,
            eval_type: job.job_type.to_string(),
            triggered_by: triggered_by.to_string(),
            job_id: job.id.clone(),
            job_modify_index: job.modify_index,
            status: "pending".to_string(),
            status_description: String::new(),
            create_index: index,
            modify_index: index,
        };
        let id = eval.id.clone();
        self.evals.push(eval);
        self.evals_index = index;
        id
    }
}

/// Shared store behind the agent's routes
#[derive(Debug)]
pub struct StateStore {
    tables: Mutex<Tables>,
    index_tx: watch::Sender<u64>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (index_tx, _) = watch::channel(0);
        Self {
            tables: Mutex::new(Tables::default()),
            index_tx,
        }
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // Mutations finish before the guard drops, so a poisoned lock still
        // holds consistent tables.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, index: u64) {
        self.index_tx.send_replace(index);
    }

    /// Latest index of `table` (0 if never written)
    pub fn table_index(&self, table: Table) -> u64 {
        self.tables().table_index(table)
    }

    /// Insert or update a job and create its registration evaluation.
    ///
    /// Returns `(eval_id, index)`.
    pub fn upsert_job(&self, mut job: Job) -> (String, u64) {
        let (eval_id, index) = {
            let mut tables = self.tables();
            let index = tables.next_index();

            job.create_index = tables
                .jobs
                .get(&job.id)
                .map(|existing| existing.create_index)
                .unwrap_or(index);
            job.modify_index = index;
            job.status = "pending".to_string();
            job.status_description = String::new();

            let eval_id = tables.create_eval(&job, TRIGGER_JOB_REGISTER, index);
            tables.jobs.insert(job.id.clone(), job);
            tables.jobs_index = index;
            (eval_id, index)
        };
        self.publish(index);
        (eval_id, index)
    }

    /// Remove a job; removing an unknown job is still a committed write.
    pub fn delete_job(&self, job_id: &str) -> u64 {
        let index = {
            let mut tables = self.tables();
            let index = tables.next_index();
            tables.jobs.remove(job_id);
            tables.jobs_index = index;
            index
        };
        self.publish(index);
        index
    }

    /// New evaluation for an existing job; `None` if the job is unknown.
    pub fn force_evaluate(&self, job_id: &str) -> Option<(String, u64)> {
        let (eval_id, index) = {
            let mut tables = self.tables();
            let job = tables.jobs.get(job_id)?.clone();
            let index = tables.next_index();
            let eval_id = tables.create_eval(&job, TRIGGER_FORCE_EVAL, index);
            (eval_id, index)
        };
        self.publish(index);
        Some((eval_id, index))
    }

    /// Place an allocation directly (there is no scheduler behind the agent)
    pub fn upsert_allocation(&self, mut alloc: Allocation) -> u64 {
        let index = {
            let mut tables = self.tables();
            let index = tables.next_index();
            if alloc.create_index == 0 {
                alloc.create_index = index;
            }
            alloc.modify_index = index;
            tables.allocs.retain(|existing| existing.id != alloc.id);
            tables.allocs.push(alloc);
            tables.allocs_index = index;
            index
        };
        self.publish(index);
        index
    }

    pub fn jobs(&self) -> (Vec<Job>, u64) {
        let tables = self.tables();
        (tables.jobs.values().cloned().collect(), tables.jobs_index)
    }

    pub fn job(&self, job_id: &str) -> (Option<Job>, u64) {
        let tables = self.tables();
        (tables.jobs.get(job_id).cloned(), tables.jobs_index)
    }

    /// Evaluations of a job in creation order
    pub fn evals_by_job(&self, job_id: &str) -> (Vec<Evaluation>, u64) {
        let tables = self.tables();
        let evals = tables
            .evals
            .iter()
            .filter(|eval| eval.job_id == job_id)
            .cloned()
            .collect();
        (evals, tables.evals_index)
    }

    pub fn allocs_by_job(&self, job_id: &str) -> (Vec<Allocation>, u64) {
        let tables = self.tables();
        let allocs = tables
            .allocs
            .iter()
            .filter(|alloc| alloc.job_id == job_id)
            .cloned()
            .collect();
        (allocs, tables.allocs_index)
    }

    /// Block until `table` moves past `min_index` or `wait` elapses
    pub async fn wait_for_change(&self, table: Table, min_index: u64, wait: Duration) {
        let deadline = tokio::time::Instant::now() + wait;
        // Subscribe before checking so a write in between still wakes us
        let mut rx = self.index_tx.subscribe();

        loop {
            if self.table_index(table) > min_index {
                return;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_creates_eval_and_advances_index() {
        let store = StateStore::new();
        assert_eq!(store.table_index(Table::Jobs), 0);

        let (eval_id, index) = store.upsert_job(Job::new_batch("job1", "myjob", 5));
        assert_eq!(index, 1);
        assert_eq!(store.table_index(Table::Jobs), 1);
        assert_eq!(store.table_index(Table::Evals), 1);

        let (evals, _) = store.evals_by_job("job1");
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].id, eval_id);
        assert_eq!(evals[0].triggered_by, TRIGGER_JOB_REGISTER);
    }

    #[test]
    fn test_reregister_keeps_create_index() {
        let store = StateStore::new();
        store.upsert_job(Job::new_batch("job1", "myjob", 5));
        store.upsert_job(Job::new_batch("job1", "renamed", 5));

        let (job, _) = store.job("job1");
        let job = job.unwrap();
        assert_eq!(job.name, "renamed");
        assert_eq!(job.create_index, 1);
        assert_eq!(job.modify_index, 2);
        assert_eq!(store.jobs().0.len(), 1);
    }

    #[test]
    fn test_delete_unknown_job_still_advances_index() {
        let store = StateStore::new();
        assert_eq!(store.delete_job("nope"), 1);
        assert_eq!(store.table_index(Table::Jobs), 1);
    }

    #[test]
    fn test_force_evaluate_unknown_job() {
        let store = StateStore::new();
        assert!(store.force_evaluate("job1").is_none());
        assert_eq!(store.table_index(Table::Evals), 0);
    }

    #[tokio::test]
    async fn test_wait_for_change_returns_on_write() {
        let store = std::sync::Arc::new(StateStore::new());

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer.upsert_job(Job::new_batch("job1", "myjob", 5));
        });

        store
            .wait_for_change(Table::Jobs, 0, Duration::from_secs(5))
            .await;
        assert_eq!(store.table_index(Table::Jobs), 1);
    }

    #[tokio::test]
    async fn test_wait_for_change_times_out() {
        let store = StateStore::new();
        let started = std::time::Instant::now();

        store
            .wait_for_change(Table::Allocs, 0, Duration::from_millis(100))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
