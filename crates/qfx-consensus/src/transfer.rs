use async_trait::async_trait;
use thiserror::Error;

use qfx_core::transaction::{ExecutionResult, Transaction, TransactionStatus};
use qfx_core::types::{Address, Balance};

/// The account ledger (`AccountsManager` in the source system) is an
/// out-of-scope external collaborator: consensus only ever needs a balance
/// read and an atomic transfer.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn balance_of(&self, address: &Address) -> Result<Balance, LedgerError>;
    async fn transfer(&self, from: &Address, to: &Address, amount: Balance) -> Result<(), LedgerError>;
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: need {need}, have {have}")]
    Insufficient { need: Balance, have: Balance },
    #[error("ledger error: {0}")]
    Other(String),
}

/// Execute a `SEND` transaction: no consensus rounds, no validator
/// involvement. Debits `from_address` if set (failing to `Undetermined` on
/// insufficient balance), credits `to_address` if set, and always
/// terminates in either `Finalized` or `Undetermined`.
pub async fn execute_native_transfer(
    ledger: &dyn AccountLedger,
    tx: &Transaction,
) -> (TransactionStatus, Option<ExecutionResult>) {
    if let Some(from) = &tx.from_address {
        match ledger.balance_of(from).await {
            Ok(have) if have >= tx.value => {}
            _ => return (TransactionStatus::Undetermined, Some(ExecutionResult::Error)),
        }
    }

    if let (Some(from), Some(to)) = (&tx.from_address, &tx.to_address) {
        if ledger.transfer(from, to, tx.value).await.is_err() {
            return (TransactionStatus::Undetermined, Some(ExecutionResult::Error));
        }
    }

    (TransactionStatus::Finalized, Some(ExecutionResult::Success))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{
        AppealState, ConsensusData, ExecutionMode, TransactionStatus, TransactionType,
    };
    use qfx_core::types::TxHash;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeLedger {
        balances: Mutex<HashMap<String, Balance>>,
    }

    #[async_trait]
    impl AccountLedger for FakeLedger {
        async fn balance_of(&self, address: &Address) -> Result<Balance, LedgerError> {
            Ok(*self.balances.lock().unwrap().get(address.as_str()).unwrap_or(&0))
        }

        async fn transfer(&self, from: &Address, to: &Address, amount: Balance) -> Result<(), LedgerError> {
            let mut balances = self.balances.lock().unwrap();
            let have = *balances.get(from.as_str()).unwrap_or(&0);
            if have < amount {
                return Err(LedgerError::Insufficient { need: amount, have });
            }
            *balances.entry(from.as_str().to_string()).or_insert(0) -= amount;
            *balances.entry(to.as_str().to_string()).or_insert(0) += amount;
            Ok(())
        }
    }

    fn sample_send(from: &str, to: &str, value: Balance) -> Transaction {
        Transaction {
            hash: TxHash::new("0xsend"),
            nonce: 0,
            created_at: 0,
            from_address: Some(Address::new(from)),
            to_address: Some(Address::new(to)),
            transaction_type: TransactionType::Send,
            data: vec![],
            value,
            status: qfx_core::transaction::TransactionStatus::Pending,
            num_of_initial_validators: 1,
            config_rotation_rounds: 0,
            execution_mode: ExecutionMode::Normal,
            consensus_data: ConsensusData::default(),
            consensus_history: vec![],
            appeal: AppealState::default(),
            contract_snapshot: None,
            triggered_by_hash: None,
            triggered_transactions: vec![],
            triggered_on: None,
            blocked_at: None,
            worker_id: None,
            rotation_count: 0,
            leader_timeout_validators: vec![],
            result: None,
        }
    }

    #[tokio::test]
    async fn sufficient_balance_finalizes_directly() {
        let ledger = FakeLedger { balances: Mutex::new(HashMap::from([("alice".to_string(), 100)])) };
        let tx = sample_send("alice", "bob", 40);
        let (status, result) = execute_native_transfer(&ledger, &tx).await;
        assert_eq!(status, TransactionStatus::Finalized);
        assert_eq!(result, Some(ExecutionResult::Success));
        assert_eq!(ledger.balance_of(&Address::new("bob")).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn insufficient_balance_goes_undetermined() {
        let ledger = FakeLedger { balances: Mutex::new(HashMap::from([("alice".to_string(), 10)])) };
        let tx = sample_send("alice", "bob", 40);
        let (status, result) = execute_native_transfer(&ledger, &tx).await;
        assert_eq!(status, TransactionStatus::Undetermined);
        assert_eq!(result, Some(ExecutionResult::Error));
    }
}
