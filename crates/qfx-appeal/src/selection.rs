use std::collections::HashSet;

use rand::seq::SliceRandom;

use qfx_core::transaction::Transaction;
use qfx_core::types::Address;
use qfx_core::validator::{Validator, ValidatorSnapshot};

use crate::capacity::{draw_extra_validators, validator_draw};

/// Which branch of the `Pending` re-entry table governs validator selection
/// for this attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReentryKind {
    FirstTry,
    RolledBack,
    AppealedOrValidatorsTimeout,
    AppealUndetermined,
    AppealLeaderTimeout,
}

/// Classify which re-entry branch applies, based on the transaction's
/// current appeal flags and whether it already carries consensus data from
/// a prior attempt.
pub fn classify_reentry(tx: &Transaction) -> ReentryKind {
    if tx.appeal.appeal_leader_timeout {
        ReentryKind::AppealLeaderTimeout
    } else if tx.appeal.appeal_undetermined {
        ReentryKind::AppealUndetermined
    } else if tx.appeal.appealed || tx.appeal.appeal_validators_timeout {
        ReentryKind::AppealedOrValidatorsTimeout
    } else if tx.consensus_data.votes.is_empty() && tx.consensus_data.leader_receipt.is_empty() {
        ReentryKind::FirstTry
    } else {
        ReentryKind::RolledBack
    }
}

/// Every address that has ever acted as leader for this transaction:
/// the current attempt's leader (`leader_receipt[0]`) plus every leader
/// recorded in `consensus_history`.
pub fn past_leaders(tx: &Transaction) -> HashSet<Address> {
    let mut out = HashSet::new();
    if let Some(leader) = tx.consensus_data.leader_receipt.first() {
        out.insert(Address::new(leader.node_config.clone()));
    }
    for entry in &tx.consensus_history {
        if let Some(leader) = &entry.leader_result {
            out.insert(Address::new(leader.node_config.clone()));
        }
    }
    out
}

/// Select the validator list for one `Pending` attempt. `prior` is the
/// validator list assigned to the previous attempt (empty on `FirstTry`);
/// `leader_timeout_validators` is the committee saved by a `LeaderTimeout`
/// exit, reused by a leader-timeout appeal.
pub fn select_validators(
    kind: ReentryKind,
    tx: &Transaction,
    snapshot: &ValidatorSnapshot,
    prior: &[Validator],
    leader_timeout_validators: &[String],
) -> Vec<Validator> {
    match kind {
        ReentryKind::FirstTry => {
            draw_random(snapshot, tx.num_of_initial_validators as usize, &HashSet::new())
        }
        ReentryKind::RolledBack => {
            let still_present: Vec<Validator> = prior
                .iter()
                .filter(|v| snapshot.iter().any(|s| s.address == v.address))
                .cloned()
                .collect();
            if still_present.is_empty() {
                draw_random(snapshot, tx.num_of_initial_validators as usize, &HashSet::new())
            } else {
                still_present
            }
        }
        ReentryKind::AppealedOrValidatorsTimeout => {
            let excluded_leaders = past_leaders(tx);
            let selected: Vec<Validator> =
                prior.iter().filter(|v| !excluded_leaders.contains(&v.address)).cloned().collect();
            let draw = validator_draw(tx.appeal.appeal_failed, tx.num_of_initial_validators);
            let mut exclude: Vec<Address> = excluded_leaders.into_iter().collect();
            exclude.extend(selected.iter().map(|v| v.address.clone()));
            let mut out = selected;
            out.extend(draw_extra_validators(snapshot, draw, &exclude));
            out
        }
        ReentryKind::AppealUndetermined => {
            let excluded_leaders = past_leaders(tx);
            let extra = tx.num_of_initial_validators + 2;
            let selected: Vec<Validator> =
                prior.iter().filter(|v| !excluded_leaders.contains(&v.address)).cloned().collect();
            let mut exclude = excluded_leaders;
            exclude.extend(selected.iter().map(|v| v.address.clone()));
            let mut out = selected;
            out.extend(draw_random(snapshot, extra as usize, &exclude));
            out
        }
        ReentryKind::AppealLeaderTimeout => {
            let excluded_leaders = past_leaders(tx);
            let mut selected: Vec<Validator> = snapshot
                .iter()
                .filter(|v| leader_timeout_validators.iter().any(|a| a == v.address.as_str()))
                .cloned()
                .collect();
            let mut exclude = excluded_leaders;
            exclude.extend(selected.iter().map(|v| v.address.clone()));
            selected.extend(draw_random(snapshot, 1, &exclude));
            selected
        }
    }
}

/// Draw `count` validators from `snapshot`, excluding any address in
/// `exclude`, in random order.
pub(crate) fn draw_random(
    snapshot: &ValidatorSnapshot,
    count: usize,
    exclude: &HashSet<Address>,
) -> Vec<Validator> {
    let mut pool: Vec<Validator> =
        snapshot.iter().filter(|v| !exclude.contains(&v.address)).cloned().collect();
    pool.shuffle(&mut rand::thread_rng());
    pool.truncate(count);
    pool
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
            status: TransactionStatus::Pending,
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
    fn first_try_is_classified_when_no_consensus_data() {
        assert_eq!(classify_reentry(&sample_tx()), ReentryKind::FirstTry);
    }

    #[test]
    fn appealed_flag_takes_priority_over_rolled_back() {
        let mut tx = sample_tx();
        tx.appeal.appealed = true;
        tx.consensus_data.votes.insert(Address::new("0xv1"), qfx_core::transaction::Vote::Agree);
        assert_eq!(classify_reentry(&tx), ReentryKind::AppealedOrValidatorsTimeout);
    }

    #[test]
    fn first_try_draws_exactly_n_validators() {
        let tx = sample_tx();
        let snapshot: ValidatorSnapshot =
            Arc::new((0..10).map(|i| validator(&format!("0xv{i}"))).collect());
        let selected = select_validators(ReentryKind::FirstTry, &tx, &snapshot, &[], &[]);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn appeal_undetermined_excludes_past_leaders() {
        let mut tx = sample_tx();
        tx.appeal.appeal_undetermined = true;
        tx.consensus_data.leader_receipt.push(qfx_core::transaction::Receipt {
            result: vec![0],
            execution_result: qfx_core::transaction::ExecutionResult::Success,
            vote: qfx_core::transaction::Vote::Agree,
            node_config: "0xleader".to_string(),
            pending_transactions: vec![],
            contract_state: None,
            genvm_result: serde_json::json!({}),
        });
        let mut pool = vec![validator("0xleader")];
        pool.extend((0..6).map(|i| validator(&format!("0xv{i}"))));
        let snapshot: ValidatorSnapshot = Arc::new(pool);
        let selected = select_validators(ReentryKind::AppealUndetermined, &tx, &snapshot, &[], &[]);
        assert!(!selected.iter().any(|v| v.address.as_str() == "0xleader"));
        assert_eq!(selected.len(), 5); // n+2 = 5
    }

    #[test]
    fn validator_appeal_reuses_prior_and_draws_the_table_extra() {
        let mut tx = sample_tx();
        tx.appeal.appealed = true;
        tx.consensus_data.leader_receipt.push(qfx_core::transaction::Receipt {
            result: vec![0],
            execution_result: qfx_core::transaction::ExecutionResult::Success,
            vote: qfx_core::transaction::Vote::Agree,
            node_config: "0xleader".to_string(),
            pending_transactions: vec![],
            contract_state: None,
            genvm_result: serde_json::json!({}),
        });
        let prior = vec![validator("0xv0"), validator("0xv1"), validator("0xv2")];
        let mut pool = vec![validator("0xleader")];
        pool.extend(prior.iter().cloned());
        pool.extend((3..8).map(|i| validator(&format!("0xv{i}"))));
        let snapshot: ValidatorSnapshot = Arc::new(pool);

        let selected =
            select_validators(ReentryKind::AppealedOrValidatorsTimeout, &tx, &snapshot, &prior, &[]);

        assert!(!selected.iter().any(|v| v.address.as_str() == "0xleader"));
        assert!(prior.iter().all(|p| selected.iter().any(|v| v.address == p.address)));
        // appeal_failed == 0 draws n+2 new validators on top of the 3 reused.
        assert_eq!(selected.len(), 3 + 5);
    }
}
