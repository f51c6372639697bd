//! Drives claimed transaction rows through the consensus engine: the
//! priority claim loop (`scheduler`), the panic-restart budget
//! (`supervisor`), and the `/health`/`/status` HTTP surface (`health`).
//! `config` centralizes every environment-tunable knob in one place.

pub mod config;
pub mod health;
pub mod scheduler;
pub mod supervisor;

use std::sync::Arc;

use qfx_consensus::ConsensusEngine;
use qfx_store::TransactionStore;
use tracing::info;

pub use config::WorkerConfig;
pub use health::HealthState;
pub use scheduler::{PollOutcome, Scheduler};
pub use supervisor::Supervisor;

/// A fully wired worker: the scheduler, its supervisor, and its health
/// surface. `run` blocks until `shutdown` is flipped to `true` (or forever,
/// if the caller never intends to stop it outside of process exit).
pub struct Worker {
    worker_id: String,
    supervisor: Supervisor,
    health: HealthState,
    cfg: WorkerConfig,
}

impl Worker {
    pub fn new(transactions: TransactionStore, engine: Arc<ConsensusEngine>, cfg: WorkerConfig) -> Self {
        let worker_id = format!("worker-{}", uuid::Uuid::new_v4());
        let health = HealthState::new(worker_id.clone(), cfg.genvm_failure_unhealthy_threshold);
        let scheduler =
            Arc::new(Scheduler::new(worker_id.clone(), transactions, engine, cfg.clone(), health.clone()));
        let supervisor = Supervisor::new(scheduler, cfg.clone(), health.clone());
        Self { worker_id, supervisor, health, cfg }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn health(&self) -> HealthState {
        self.health.clone()
    }

    /// Runs the health HTTP surface and the supervised claim loop
    /// concurrently until `shutdown` fires.
    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let router = health::router(self.health.clone(), self.cfg.clone());
        let listener = tokio::net::TcpListener::bind(&self.cfg.health_addr).await?;
        info!(worker_id = %self.worker_id, addr = %self.cfg.health_addr, "health surface listening");

        let mut http_shutdown = shutdown.clone();
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = http_shutdown.changed().await;
        });

        tokio::select! {
            result = serve => result,
            _ = self.supervisor.run(shutdown) => Ok(()),
        }
    }
}
