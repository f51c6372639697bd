use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::WorkerConfig;

/// Shared liveness bookkeeping, updated by the supervisor and the claim
/// loop, read by the `/health` and `/status` handlers. Cheap to clone:
/// every field is an atomic behind an `Arc`.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<Inner>,
}

struct Inner {
    worker_id: String,
    restart_count: AtomicU32,
    permanently_failed: AtomicBool,
    last_poll_at: AtomicI64,
    genvm_consecutive_failures: AtomicU32,
    genvm_unhealthy_threshold: u32,
}

impl HealthState {
    pub fn new(worker_id: String, genvm_unhealthy_threshold: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                worker_id,
                restart_count: AtomicU32::new(0),
                permanently_failed: AtomicBool::new(false),
                last_poll_at: AtomicI64::new(now()),
                genvm_consecutive_failures: AtomicU32::new(0),
                genvm_unhealthy_threshold,
            }),
        }
    }

    pub fn record_restart(&self) -> u32 {
        self.inner.restart_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.restart_count.load(Ordering::SeqCst)
    }

    pub fn mark_permanently_failed(&self) {
        self.inner.permanently_failed.store(true, Ordering::SeqCst);
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.inner.permanently_failed.load(Ordering::SeqCst)
    }

    pub fn record_poll(&self) {
        self.inner.last_poll_at.store(now(), Ordering::SeqCst);
    }

    pub fn record_executor_outcome(&self, fatal: bool) {
        if fatal {
            self.inner.genvm_consecutive_failures.fetch_add(1, Ordering::SeqCst);
        } else {
            self.inner.genvm_consecutive_failures.store(0, Ordering::SeqCst);
        }
    }

    fn genvm_unhealthy(&self) -> bool {
        self.inner.genvm_consecutive_failures.load(Ordering::SeqCst) >= self.inner.genvm_unhealthy_threshold
    }

    fn stalled(&self, stall_after_secs: i64) -> bool {
        now() - self.inner.last_poll_at.load(Ordering::SeqCst) > stall_after_secs
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    worker_id: String,
    restart_count: u32,
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    worker_id: String,
    restart_count: u32,
    permanently_failed: bool,
    last_poll_unix: i64,
    genvm_unhealthy: bool,
    poll_interval_secs: u64,
    worker_max_restarts: u32,
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let stall_after = 300;
    let healthy = !state.is_permanently_failed() && !state.genvm_unhealthy() && !state.stalled(stall_after);
    let body = HealthBody {
        status: if healthy { "ok" } else { "unhealthy" },
        worker_id: state.inner.worker_id.clone(),
        restart_count: state.restart_count(),
    };
    let code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body))
}

async fn status_handler(State((state, cfg)): State<(HealthState, WorkerConfig)>) -> impl IntoResponse {
    let stall_after = 300;
    let healthy = !state.is_permanently_failed() && !state.genvm_unhealthy() && !state.stalled(stall_after);
    let body = StatusBody {
        status: if healthy { "ok" } else { "unhealthy" },
        worker_id: state.inner.worker_id.clone(),
        restart_count: state.restart_count(),
        permanently_failed: state.is_permanently_failed(),
        last_poll_unix: state.inner.last_poll_at.load(Ordering::SeqCst),
        genvm_unhealthy: state.genvm_unhealthy(),
        poll_interval_secs: cfg.poll_interval.as_secs(),
        worker_max_restarts: cfg.worker_max_restarts,
    };
    let code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body))
}

pub fn router(state: HealthState, cfg: WorkerConfig) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);
    Router::new()
        .route("/health", get(health_handler).with_state(state.clone()))
        .route("/status", get(status_handler).with_state((state, cfg)))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_healthy() {
        let state = HealthState::new("w-1".into(), 5);
        assert!(!state.is_permanently_failed());
        assert!(!state.genvm_unhealthy());
    }

    #[test]
    fn genvm_failures_trip_unhealthy_at_threshold() {
        let state = HealthState::new("w-1".into(), 3);
        for _ in 0..3 {
            state.record_executor_outcome(true);
        }
        assert!(state.genvm_unhealthy());
        state.record_executor_outcome(false);
        assert!(!state.genvm_unhealthy());
    }

    #[test]
    fn restart_count_increments() {
        let state = HealthState::new("w-1".into(), 5);
        assert_eq!(state.record_restart(), 1);
        assert_eq!(state.record_restart(), 2);
        assert_eq!(state.restart_count(), 2);
    }

    #[test]
    fn permanently_failed_is_sticky() {
        let state = HealthState::new("w-1".into(), 5);
        state.mark_permanently_failed();
        assert!(state.is_permanently_failed());
    }
}
