//! Test Agent Server
//!
//! Serves the jobs endpoints over HTTP on an ephemeral localhost port.

use crate::handler::{self, Agent};
use crate::state::StateStore;
use axum::routing::get;
use axum::Router;
use jobsched_sdk::{Client, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

const DEFAULT_REGION: &str = "global";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Agent Configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The only region this agent answers for
    pub region: String,

    /// Reported in the known-leader header of every read
    pub known_leader: bool,

    /// Reported in the last-contact header of every read
    pub last_contact: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            known_leader: true,
            last_contact: Duration::ZERO,
        }
    }
}

/// Build the jobs router
pub fn router(agent: Arc<Agent>) -> Router {
    Router::new()
        .route(
            "/v1/jobs",
            get(handler::list_jobs)
                .put(handler::register_job)
                .post(handler::register_job),
        )
        .route(
            "/v1/job/{job_id}",
            get(handler::job_info).delete(handler::deregister_job),
        )
        .route("/v1/job/{job_id}/allocations", get(handler::job_allocations))
        .route("/v1/job/{job_id}/evaluations", get(handler::job_evaluations))
        .route(
            "/v1/job/{job_id}/evaluate",
            axum::routing::put(handler::force_evaluate).post(handler::force_evaluate),
        )
        .with_state(agent)
}

/// In-memory agent listening on `127.0.0.1:<ephemeral>`
pub struct TestAgent {
    addr: SocketAddr,
    store: Arc<StateStore>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestAgent {
    /// Start an agent with the default configuration
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(AgentConfig::default()).await
    }

    pub async fn start_with(config: AgentConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let store = Arc::new(StateStore::new());
        let app = router(Arc::new(Agent::new(store.clone(), config)));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "test agent failed");
            }
        });

        info!(addr = %addr, "test agent listening");

        Ok(Self {
            addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Direct access to the backing store (e.g. to place allocations)
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Client configuration pointing at this agent
    pub fn config(&self) -> Config {
        Config::default().with_address(self.url())
    }

    /// SDK client pointing at this agent
    pub fn client(&self) -> jobsched_sdk::Result<Client> {
        Client::new(self.config())
    }

    /// Stop accepting requests and wait for in-flight ones
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!(addr = %self.addr, "test agent did not stop in time");
            }
        }
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
