use qfx_core::transaction::{Transaction, TransactionStatus};
use qfx_core::validator::ValidatorSnapshot;

use crate::capacity::{has_capacity, validator_draw};
use crate::selection::past_leaders;

/// Which appeal table a freshly submitted appeal falls under, derived from
/// the transaction's status at the moment it is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppealKind {
    /// Challenges the leader's receipt on an `Undetermined` transaction.
    Leader,
    /// Challenges a `LeaderTimeout` outcome.
    LeaderTimeout,
    /// Challenges the validator committee's vote on `Accepted` or
    /// `ValidatorsTimeout`.
    Validator,
}

/// Maps a transaction's current status to the appeal kind it accepts, or
/// `None` if the status has no appeal path (§4.6).
pub fn appeal_kind_for(status: TransactionStatus) -> Option<AppealKind> {
    match status {
        TransactionStatus::Undetermined => Some(AppealKind::Leader),
        TransactionStatus::LeaderTimeout => Some(AppealKind::LeaderTimeout),
        TransactionStatus::Accepted | TransactionStatus::ValidatorsTimeout => Some(AppealKind::Validator),
        _ => None,
    }
}

/// How many validators this appeal kind would involve in total, per the
/// §4.6 tables: the validator-draw table for a validator appeal, a flat
/// `n + 2` for the leader and leader-timeout tables.
fn validators_involved(kind: AppealKind, tx: &Transaction) -> u32 {
    let n = tx.num_of_initial_validators;
    match kind {
        AppealKind::Validator => validator_draw(tx.appeal.appeal_failed, n).total,
        AppealKind::Leader | AppealKind::LeaderTimeout => n + 2,
    }
}

/// §4.6/§8 capacity gate for appeal submission: admits the appeal only if
/// the validators it would involve, plus every address ever used as
/// leader, stay within the registry's total population.
pub fn admission_allowed(kind: AppealKind, tx: &Transaction, snapshot: &ValidatorSnapshot) -> bool {
    let used_leaders = past_leaders(tx).len() as u32;
    let involved = validators_involved(kind, tx);
    has_capacity(involved, used_leaders, snapshot.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{AppealState, ConsensusData, ExecutionMode, TransactionType};
    use qfx_core::types::{Address, TxHash};
    use qfx_core::validator::{LlmProviderConfig, Validator};
    use std::sync::Arc;

    fn validator(addr: &str) -> Validator {
        Validator {
            address: Address::new(addr),
            private_key: "unused".to_string(),
            stake: 1,
            llm_provider: LlmProviderConfig {
                provider: "test".to_string(),
                model: "test".to_string(),
                config: serde_json::json!({}),
                plugin_config: serde_json::json!({}),
            },
            fallback: None,
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            hash: TxHash::new("0xh"),
            nonce: 0,
            created_at: 0,
            from_address: None,
            to_address: Some(Address::new("0xc")),
            transaction_type: TransactionType::RunContract,
            data: vec![],
            value: 0,
            status: TransactionStatus::Accepted,
            num_of_initial_validators: 3,
            config_rotation_rounds: 1,
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

    #[test]
    fn status_maps_to_the_right_appeal_kind() {
        assert_eq!(appeal_kind_for(TransactionStatus::Undetermined), Some(AppealKind::Leader));
        assert_eq!(appeal_kind_for(TransactionStatus::LeaderTimeout), Some(AppealKind::LeaderTimeout));
        assert_eq!(appeal_kind_for(TransactionStatus::Accepted), Some(AppealKind::Validator));
        assert_eq!(appeal_kind_for(TransactionStatus::ValidatorsTimeout), Some(AppealKind::Validator));
        assert_eq!(appeal_kind_for(TransactionStatus::Pending), None);
    }

    #[test]
    fn validator_appeal_admitted_when_population_has_room() {
        let tx = sample_tx();
        let snapshot: ValidatorSnapshot = Arc::new((0..20).map(|i| validator(&format!("0xv{i}"))).collect());
        assert!(admission_allowed(AppealKind::Validator, &tx, &snapshot));
    }

    #[test]
    fn validator_appeal_rejected_when_population_exhausted() {
        let tx = sample_tx();
        let snapshot: ValidatorSnapshot = Arc::new((0..5).map(|i| validator(&format!("0xv{i}"))).collect());
        assert!(!admission_allowed(AppealKind::Validator, &tx, &snapshot));
    }
}
