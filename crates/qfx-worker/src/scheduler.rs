use std::sync::Arc;

use qfx_consensus::ConsensusEngine;
use qfx_core::transaction::{Transaction, TransactionStatus};
use qfx_core::types::TxHash;
use qfx_store::{ClaimClass, StoreError, TransactionStore};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::health::HealthState;

/// One iteration's outcome, used only for test assertions — the live loop
/// just logs and continues.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    Claimed(ClaimClass),
}

/// Drives one worker's poll cycle: try an appeal row, then a
/// finalization-eligible row, then an ordinary pending row, in that
/// priority order, claiming at most one row per cycle.
pub struct Scheduler {
    worker_id: String,
    transactions: TransactionStore,
    engine: Arc<ConsensusEngine>,
    cfg: WorkerConfig,
    health: HealthState,
}

impl Scheduler {
    pub fn new(
        worker_id: String,
        transactions: TransactionStore,
        engine: Arc<ConsensusEngine>,
        cfg: WorkerConfig,
        health: HealthState,
    ) -> Self {
        Self { worker_id, transactions, engine, cfg, health }
    }

    /// Run the claim/dispatch loop until `shutdown` flips to `true`. Never
    /// surfaces an error for ordinary transient failures — those are
    /// logged and retried next cycle; the supervisor only ever sees a
    /// panic unwinding out of this future.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticks_since_orphan_sweep = 0u64;
        let orphan_sweep_every = (self.cfg.orphan_sweep_interval.as_secs_f64()
            / self.cfg.poll_interval.as_secs_f64())
        .max(1.0) as u64;

        loop {
            if *shutdown.borrow() {
                return;
            }
            self.health.record_poll();

            ticks_since_orphan_sweep += 1;
            if ticks_since_orphan_sweep >= orphan_sweep_every {
                ticks_since_orphan_sweep = 0;
                if let Err(e) = self.sweep_orphans().await {
                    warn!(error = %e, "orphan recovery sweep failed");
                }
            }

            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "poll cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// One claim attempt across all three priority classes. Public for
    /// tests that want deterministic single-cycle behavior.
    pub async fn poll_once(&self) -> Result<PollOutcome, StoreError> {
        for class in [ClaimClass::Appeal, ClaimClass::Finalization, ClaimClass::Pending] {
            let now = now();
            let lease_secs = self.cfg.lease_window.as_secs() as i64;
            let Some(tx) = self.transactions.claim_next(class, &self.worker_id, now, lease_secs).await? else {
                continue;
            };

            if class == ClaimClass::Finalization {
                match self.finalization_eligible(&tx, now).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(hash = %tx.hash.as_str(), "claimed finalization row not yet eligible, releasing");
                        self.transactions.release_lease(&tx.hash).await?;
                        continue;
                    }
                    Err(e) => {
                        warn!(hash = %tx.hash.as_str(), error = %e, "finalization eligibility check failed");
                        self.transactions.release_lease(&tx.hash).await?;
                        continue;
                    }
                }
            }

            self.dispatch(class, tx).await;
            return Ok(PollOutcome::Claimed(class));
        }
        Ok(PollOutcome::Idle)
    }

    /// Checks the two conditions `ClaimClass::Finalization`'s coarse SQL
    /// predicate doesn't encode: the finality-window time formula, and that
    /// the previous transaction on the same contract (if any) is already
    /// `FINALIZED`.
    async fn finalization_eligible(&self, tx: &Transaction, now: i64) -> Result<bool, StoreError> {
        use qfx_core::transaction::ExecutionMode;

        if matches!(tx.execution_mode, ExecutionMode::LeaderOnly | ExecutionMode::LeaderSelfValidator) {
            return Ok(true);
        }

        let Some(awaiting_since) = tx.appeal.timestamp_awaiting_finalization else {
            return Ok(false);
        };
        let reduction = self.cfg.finality_window_appeal_failed_reduction;
        let window = self.cfg.finality_window.as_secs() as f64
            * (1.0 - reduction).powi(tx.appeal.appeal_failed as i32);
        let elapsed = (now - awaiting_since - tx.appeal.appeal_processing_time) as f64;
        if elapsed <= window {
            return Ok(false);
        }

        if let Some(to) = &tx.to_address {
            if let Some(prev) = self.transactions.get_previous_transaction(to, tx.created_at, false).await? {
                if prev.status != TransactionStatus::Finalized {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    async fn dispatch(&self, class: ClaimClass, tx: Transaction) {
        let hash = tx.hash.clone();

        if tx.status == TransactionStatus::Pending && class != ClaimClass::Finalization {
            if let Err(e) = self.check_no_validators_backoff(&tx).await {
                warn!(hash = %hash.as_str(), error = %e, "no-validators backoff check failed");
                let _ = self.transactions.release_lease(&hash).await;
                return;
            }
        }

        let result = if class == ClaimClass::Finalization {
            self.engine.finalize(tx).await
        } else {
            self.engine.run_attempt(tx).await
        };

        match result {
            Ok(updated) => {
                self.health.record_executor_outcome(false);
                if let Err(e) = self.transactions.clear_no_validators_backoff(&updated.hash).await {
                    debug!(hash = %hash.as_str(), error = %e, "clearing no-validators backoff failed");
                }
                info!(hash = %hash.as_str(), status = ?updated.status, "transaction advanced");
            }
            Err(qfx_consensus::ConsensusError::NoValidators) => {
                self.handle_no_validators(&hash).await;
            }
            Err(e @ qfx_consensus::ConsensusError::Executor(_)) => {
                self.health.record_executor_outcome(true);
                error!(hash = %hash.as_str(), error = %e, "attempt failed, releasing lease for retry");
                let _ = self.transactions.release_lease(&hash).await;
            }
            Err(e) => {
                error!(hash = %hash.as_str(), error = %e, "attempt failed, releasing lease for retry");
                let _ = self.transactions.release_lease(&hash).await;
            }
        }
    }

    async fn check_no_validators_backoff(&self, tx: &Transaction) -> Result<(), StoreError> {
        if let Some((count, last_attempt)) = self.transactions.get_no_validators_backoff(&tx.hash).await? {
            let backoff_secs = self.cfg.no_validators_base_backoff.as_secs() as i64 * (1i64 << count.min(20));
            if now() - last_attempt < backoff_secs {
                return Err(StoreError::Pool("no-validators backoff still active".into()));
            }
        }
        Ok(())
    }

    async fn handle_no_validators(&self, hash: &TxHash) {
        match self.transactions.record_no_validators_attempt(hash, now()).await {
            Ok(count) if count as u32 >= self.cfg.no_validators_max_retries => {
                warn!(hash = %hash.as_str(), count, "no validators available after max retries, canceling");
                if let Ok(Some(mut tx)) = self.transactions.get_transaction_by_hash(hash).await {
                    tx.status = TransactionStatus::Canceled;
                    let _ = self.transactions.save_transaction(&tx).await;
                    let _ = self.transactions.clear_no_validators_backoff(hash).await;
                }
            }
            Ok(_) => {
                let _ = self.transactions.release_lease(hash).await;
            }
            Err(e) => {
                warn!(hash = %hash.as_str(), error = %e, "recording no-validators attempt failed");
                let _ = self.transactions.release_lease(hash).await;
            }
        }
    }

    async fn sweep_orphans(&self) -> Result<(), StoreError> {
        let lease_secs = self.cfg.lease_window.as_secs() as i64;
        let orphans = self.transactions.find_orphans(now(), lease_secs).await?;
        for hash in orphans {
            info!(hash = %hash.as_str(), "resetting orphaned transaction");
            self.transactions.reset_orphan(&hash).await?;
        }
        Ok(())
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_sweep_cadence_is_at_least_one() {
        let cfg = WorkerConfig::default();
        let every = (cfg.orphan_sweep_interval.as_secs_f64() / cfg.poll_interval.as_secs_f64()).max(1.0) as u64;
        assert_eq!(every, 10);
    }
}
