use std::collections::HashSet;

use qfx_core::transaction::Transaction;
use qfx_core::types::Address;
use qfx_core::validator::{Validator, ValidatorSnapshot};

use crate::selection::{draw_random, past_leaders};

/// Add one fresh validator to `committee` for a leader-rotation retry,
/// excluding every address that has ever served as leader for this
/// transaction plus the current committee itself. Returns `None` if the
/// snapshot has no eligible validator left to draw.
pub fn rotate_leader(
    tx: &Transaction,
    committee: &[Validator],
    snapshot: &ValidatorSnapshot,
) -> Option<Vec<Validator>> {
    let mut exclude: HashSet<Address> = past_leaders(tx);
    exclude.extend(committee.iter().map(|v| v.address.clone()));
    let drawn = draw_random(snapshot, 1, &exclude);
    if drawn.is_empty() {
        return None;
    }
    let mut next = committee.to_vec();
    next.extend(drawn);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{AppealState, ConsensusData, ExecutionMode, TransactionStatus, TransactionType};
    use qfx_core::types::TxHash;
    use qfx_core::validator::LlmProviderConfig;
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
            status: TransactionStatus::Proposing,
            num_of_initial_validators: 3,
            config_rotation_rounds: 2,
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
    fn rotation_adds_exactly_one_validator() {
        let tx = sample_tx();
        let committee = vec![validator("0xv1"), validator("0xv2")];
        let snapshot: ValidatorSnapshot =
            Arc::new(vec![validator("0xv1"), validator("0xv2"), validator("0xv3"), validator("0xv4")]);
        let rotated = rotate_leader(&tx, &committee, &snapshot).expect("one eligible validator left");
        assert_eq!(rotated.len(), 3);
    }

    #[test]
    fn rotation_fails_when_pool_exhausted() {
        let tx = sample_tx();
        let committee = vec![validator("0xv1"), validator("0xv2")];
        let snapshot: ValidatorSnapshot = Arc::new(vec![validator("0xv1"), validator("0xv2")]);
        assert!(rotate_leader(&tx, &committee, &snapshot).is_none());
    }
}
