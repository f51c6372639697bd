use std::time::Duration;

use qfx_core::constants::{
    FINALITY_WINDOW_APPEAL_FAILED_REDUCTION, FINALITY_WINDOW_SECONDS,
    GENVM_FAILURE_UNHEALTHY_THRESHOLD, GENVM_MANAGER_HEALTH_PROBE_INTERVAL_SECONDS,
    NO_VALIDATORS_BASE_BACKOFF_SECONDS, NO_VALIDATORS_MAX_RETRIES, ORPHAN_RECOVERY_INTERVAL_MULTIPLE,
    TRANSACTION_TIMEOUT_MINUTES, WORKER_MAX_RESTARTS, WORKER_POLL_INTERVAL_SECONDS,
    WORKER_RESTART_BACKOFF_SECONDS, WORKER_RESTART_WINDOW_SECONDS,
};

/// Every tunable the worker needs, read from the environment once at
/// startup. Each field falls back to the protocol default in
/// `qfx_core::constants` when its variable is unset.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub lease_window: Duration,
    pub orphan_sweep_interval: Duration,
    pub worker_max_restarts: u32,
    pub worker_restart_window: Duration,
    pub worker_restart_backoff: Duration,
    pub no_validators_max_retries: u32,
    pub no_validators_base_backoff: Duration,
    pub finality_window: Duration,
    pub finality_window_appeal_failed_reduction: f64,
    pub genvm_failure_unhealthy_threshold: u32,
    pub genvm_health_probe_interval: Duration,
    pub health_addr: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(WORKER_POLL_INTERVAL_SECONDS),
            lease_window: Duration::from_secs(TRANSACTION_TIMEOUT_MINUTES * 60),
            orphan_sweep_interval: Duration::from_secs(
                WORKER_POLL_INTERVAL_SECONDS * ORPHAN_RECOVERY_INTERVAL_MULTIPLE,
            ),
            worker_max_restarts: WORKER_MAX_RESTARTS,
            worker_restart_window: Duration::from_secs(WORKER_RESTART_WINDOW_SECONDS),
            worker_restart_backoff: Duration::from_secs(WORKER_RESTART_BACKOFF_SECONDS),
            no_validators_max_retries: NO_VALIDATORS_MAX_RETRIES,
            no_validators_base_backoff: Duration::from_secs(NO_VALIDATORS_BASE_BACKOFF_SECONDS),
            finality_window: Duration::from_secs(FINALITY_WINDOW_SECONDS),
            finality_window_appeal_failed_reduction: FINALITY_WINDOW_APPEAL_FAILED_REDUCTION,
            genvm_failure_unhealthy_threshold: GENVM_FAILURE_UNHEALTHY_THRESHOLD,
            genvm_health_probe_interval: Duration::from_secs(GENVM_MANAGER_HEALTH_PROBE_INTERVAL_SECONDS),
            health_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Overlay environment variables onto the protocol defaults. Unset or
    /// unparseable variables are silently ignored in favor of the default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_secs("WORKER_POLL_INTERVAL_SECONDS") {
            cfg.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_secs("TRANSACTION_TIMEOUT_MINUTES") {
            cfg.lease_window = Duration::from_secs(v * 60);
        }
        if let Some(v) = env_u64("ORPHAN_RECOVERY_INTERVAL_MULTIPLE") {
            cfg.orphan_sweep_interval = cfg.poll_interval * v as u32;
        }
        if let Some(v) = env_u32("WORKER_MAX_RESTARTS") {
            cfg.worker_max_restarts = v;
        }
        if let Some(v) = env_secs("WORKER_RESTART_WINDOW_SECONDS") {
            cfg.worker_restart_window = Duration::from_secs(v);
        }
        if let Some(v) = env_secs("WORKER_RESTART_BACKOFF_SECONDS") {
            cfg.worker_restart_backoff = Duration::from_secs(v);
        }
        if let Some(v) = env_u32("NO_VALIDATORS_MAX_RETRIES") {
            cfg.no_validators_max_retries = v;
        }
        if let Some(v) = env_secs("NO_VALIDATORS_BASE_BACKOFF_SECONDS") {
            cfg.no_validators_base_backoff = Duration::from_secs(v);
        }
        if let Some(v) = env_secs("FINALITY_WINDOW_SECONDS") {
            cfg.finality_window = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("FINALITY_WINDOW_APPEAL_FAILED_REDUCTION") {
            if let Ok(parsed) = v.parse() {
                cfg.finality_window_appeal_failed_reduction = parsed;
            }
        }
        if let Some(v) = env_u32("GENVM_FAILURE_UNHEALTHY_THRESHOLD") {
            cfg.genvm_failure_unhealthy_threshold = v;
        }
        if let Some(v) = env_secs("GENVM_MANAGER_HEALTH_PROBE_INTERVAL_SECONDS") {
            cfg.genvm_health_probe_interval = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("WORKER_HEALTH_ADDR") {
            cfg.health_addr = v;
        }

        cfg
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_secs(name: &str) -> Option<u64> {
    env_u64(name)
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.worker_max_restarts, 10);
        assert_eq!(cfg.orphan_sweep_interval, Duration::from_secs(20));
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("WORKER_MAX_RESTARTS", "42");
        let cfg = WorkerConfig::from_env();
        assert_eq!(cfg.worker_max_restarts, 42);
        std::env::remove_var("WORKER_MAX_RESTARTS");
    }
}
