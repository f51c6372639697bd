use qfx_core::transaction::{Transaction, TransactionStatus};
use qfx_store::{ContractStore, TransactionStore};

use crate::error::AppealError;

/// Coordinates the cross-store side effects of a successful validator
/// appeal. Capacity checks and validator draws are pure (`capacity`); this
/// is the one place appeal mechanics touch both stores at once.
#[derive(Clone)]
pub struct AppealCoordinator {
    transactions: TransactionStore,
    contracts: ContractStore,
}

impl AppealCoordinator {
    pub fn new(transactions: TransactionStore, contracts: ContractStore) -> Self {
        Self { transactions, contracts }
    }

    /// Roll back a successful validator appeal: restore the contract's
    /// `accepted` tree to the snapshot held on `tx`, then reset every
    /// transaction newer than `tx` on the same contract to `PENDING`,
    /// clearing its snapshot and lease so it re-executes from scratch.
    pub async fn rollback_validator_appeal(&self, tx: &Transaction) -> Result<(), AppealError> {
        let Some(to_address) = tx.to_address.clone() else {
            return Ok(());
        };
        if let Some(snapshot) = &tx.contract_snapshot {
            self.contracts.set_accepted(&to_address, snapshot).await?;
        }

        let newer = self.transactions.get_newer_transactions(&to_address, tx.created_at).await?;
        for mut later in newer {
            later.status = TransactionStatus::Pending;
            later.contract_snapshot = None;
            later.blocked_at = None;
            later.worker_id = None;
            self.transactions.save_transaction(&later).await?;
        }
        Ok(())
    }
}
