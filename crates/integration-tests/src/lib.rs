//! In-memory test agent for the jobs API
//!
//! Speaks the same HTTP contract as the scheduling service (routes, index
//! headers, blocking queries, region checks) without any scheduler behind
//! it, so the SDK can be exercised end to end.

pub mod error;
pub mod handler;
pub mod server;
pub mod state;

pub use server::{AgentConfig, TestAgent};
pub use state::{StateStore, Table};

use jobsched_sdk::Client;

/// Start an agent and a client pointing at it
pub async fn make_client() -> (Client, TestAgent) {
    let agent = TestAgent::start().await.expect("failed to start test agent");
    let client = agent.client().expect("failed to build client");
    (client, agent)
}
