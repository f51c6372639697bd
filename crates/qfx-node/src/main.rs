//! qfx-node — the QuorumForge consensus node binary.
//!
//! Startup sequence:
//!   1. Connect the transaction store and contract store (Postgres)
//!   2. Connect the event bus (Redis pub/sub)
//!   3. Wire the executor and rollup-bridge HTTP clients
//!   4. Build the consensus engine and hand it to a supervised worker
//!   5. Run until SIGINT/SIGTERM, then drain in-flight work before exiting

mod collaborators;
mod http_bridge;
mod http_executor;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use collaborators::{DbAccountLedger, DbValidatorRegistry};
use http_bridge::HttpRollupBridge;
use http_executor::HttpExecutor;
use qfx_appeal::AppealCoordinator;
use qfx_consensus::ConsensusEngine;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use qfx_rollup::EventBus;
use qfx_store::{ContractStore, TransactionStore};
use qfx_worker::{Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "qfx-node", version, about = "QuorumForge consensus node")]
struct Args {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Redis connection string for the consensus/transaction/general event bus.
    #[arg(long, env = "REDIS_URL")]
    redis_url: String,

    /// Base URL of the external executor (GenVM) service.
    #[arg(long, env = "EXECUTOR_URL")]
    executor_url: String,

    /// Base URL of the rollup/chain submission service.
    #[arg(long, env = "ROLLUP_URL")]
    rollup_url: String,

    /// Per-call timeout when waiting on the executor.
    #[arg(long, env = "EXECUTOR_TIMEOUT_SECONDS", default_value_t = 900)]
    executor_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,qfx=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("qfx-node starting");

    // ── Persistence ───────────────────────────────────────────────────────
    // Built once, here, and shared (via `from_pool`) with the transaction
    // store, the contract store, and the two DB-backed collaborators below
    // — one pool, one pool-size knob, for the whole process.
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&args.database_url);
    let pool = Pool::builder().build(manager).await.context("building Postgres pool")?;
    let transactions = TransactionStore::from_pool(pool.clone());
    let contracts = ContractStore::new(pool.clone());

    // ── Event bus ─────────────────────────────────────────────────────────
    let worker_tag = format!("qfx-node-{}", uuid::Uuid::new_v4());
    let event_bus = EventBus::connect(&args.redis_url, worker_tag)
        .await
        .context("connecting event bus")?;

    // ── Collaborators ─────────────────────────────────────────────────────
    let registry = Arc::new(DbValidatorRegistry::new(pool.clone()));
    let ledger = Arc::new(DbAccountLedger::new(pool.clone()));
    let executor = Arc::new(HttpExecutor::new(
        args.executor_url.clone(),
        Duration::from_secs(args.executor_timeout_secs),
    ));
    let bridge = Arc::new(HttpRollupBridge::new(args.rollup_url.clone()));

    let appeal = AppealCoordinator::new(transactions.clone(), contracts.clone());

    let engine = Arc::new(ConsensusEngine::new(
        executor,
        bridge,
        registry,
        ledger,
        event_bus,
        transactions.clone(),
        contracts,
        appeal,
    ));

    // ── Worker ────────────────────────────────────────────────────────────
    let cfg = WorkerConfig::from_env();
    let worker = Worker::new(transactions, engine, cfg);
    info!(worker_id = worker.worker_id(), "worker assembled");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received, draining");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await.context("running worker")?;
    info!("qfx-node stopped");
    Ok(())
}
