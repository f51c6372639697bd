//! ─── Protocol defaults ──────────────────────────────────────────────────────
//!
//! Every constant here is overridable via the environment variable of the
//! same name (see `qfx_worker::config::WorkerConfig`); these are the
//! fallback values when the variable is unset.

// ── Executor timeouts ────────────────────────────────────────────────────────

/// Wall-clock budget for a single validator executor call. Doubles as the
/// worker row-lease window.
pub const CONSENSUS_VALIDATOR_EXEC_TIMEOUT_SECONDS: u64 = 900;

// ── Finality ──────────────────────────────────────────────────────────────────

/// Base finality window: seconds after `timestamp_awaiting_finalization`
/// during which a terminal transaction remains appealable.
pub const FINALITY_WINDOW_SECONDS: u64 = 60 * 60 * 24; // 24h

/// Exponential reduction applied to the finality window per prior failed
/// appeal: `window * (1 - reduction)^appeal_failed`.
pub const FINALITY_WINDOW_APPEAL_FAILED_REDUCTION: f64 = 0.2;

// ── Worker / scheduler ────────────────────────────────────────────────────────

pub const WORKER_POLL_INTERVAL_SECONDS: u64 = 2;
pub const TRANSACTION_TIMEOUT_MINUTES: u64 = 30;
pub const WORKER_MAX_RESTARTS: u32 = 10;
pub const WORKER_RESTART_WINDOW_SECONDS: u64 = 600;
pub const WORKER_RESTART_BACKOFF_SECONDS: u64 = 5;

/// Multiple of `WORKER_POLL_INTERVAL_SECONDS` between orphan-recovery sweeps.
pub const ORPHAN_RECOVERY_INTERVAL_MULTIPLE: u64 = 10;

// ── No-validators backoff ─────────────────────────────────────────────────────

pub const NO_VALIDATORS_MAX_RETRIES: u32 = 5;
pub const NO_VALIDATORS_BASE_BACKOFF_SECONDS: u64 = 10;

// ── Executor health ────────────────────────────────────────────────────────────

pub const GENVM_FAILURE_UNHEALTHY_THRESHOLD: u32 = 5;
pub const GENVM_MANAGER_HEALTH_PROBE_INTERVAL_SECONDS: u64 = 30;

// ── Committee concurrency ─────────────────────────────────────────────────────

/// Bound on concurrent validator executor calls within `Committing`.
pub const COMMITTEE_CONCURRENCY_LIMIT: usize = 8;

/// Maximum number of leader/validator replacements drawn for one attempt
/// after a fatal infrastructure error.
pub const MAX_IDLE_REPLACEMENTS: usize = 3;
