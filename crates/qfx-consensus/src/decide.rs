//! Pure decision layer (§4.3 in the design notes this crate grew from):
//! every complex state has a `decide_<state>` function here that takes
//! scalar inputs and returns the ordered effects plus an outcome tag. The
//! state handler in `handlers` applies pre-effects, performs the one
//! impure action inherent to that state, then applies post-effects. None
//! of the functions in this module touch a store, an executor, or a clock.

use qfx_core::transaction::{ConsensusRound, ExecutionMode, TransactionStatus};
use qfx_core::types::Timestamp;
use qfx_rollup::RollupEventName;

use crate::effect::{BusChannel, Effect};
use crate::tally::TallyResult;

// ── Pending ──────────────────────────────────────────────────────────────────

pub struct PendingDecision {
    pub pre_effects: Vec<Effect>,
    pub post_effects: Vec<Effect>,
    /// `activate = !(appeal_undetermined || appeal_leader_timeout)`.
    pub activate: bool,
}

/// `any_appeal_active` suppresses the "executing" log on appeal re-entry;
/// `suppress_activation` is `appeal_undetermined || appeal_leader_timeout`.
pub fn decide_pending(any_appeal_active: bool, suppress_activation: bool) -> PendingDecision {
    let mut pre_effects = vec![Effect::ResetRotationCount];
    if !any_appeal_active {
        pre_effects.push(Effect::SendMessage {
            channel: BusChannel::Transaction,
            event: "transactionExecuting",
            data: serde_json::json!({}),
        });
    }
    PendingDecision {
        pre_effects,
        post_effects: vec![Effect::StatusUpdate(TransactionStatus::Proposing)],
        activate: !suppress_activation,
    }
}

// ── Proposing ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposingOutcome {
    LeaderTimeout,
    AcceptedLeaderOnly,
    Committing,
}

pub struct ProposingDecision {
    pub post_effects: Vec<Effect>,
    pub outcome: ProposingOutcome,
}

/// Called once the leader receipt is in hand. `is_vm_timeout` is
/// `receipt.is_vm_timeout()`.
pub fn decide_proposing(activate: bool, is_vm_timeout: bool, execution_mode: ExecutionMode) -> ProposingDecision {
    let mut post_effects = Vec::new();
    if activate {
        post_effects.push(Effect::EmitRollupEvent {
            name: RollupEventName::TransactionActivated,
            extras: serde_json::json!({}),
        });
    }
    post_effects.push(Effect::EmitRollupEvent {
        name: RollupEventName::TransactionReceiptProposed,
        extras: serde_json::json!({}),
    });

    if is_vm_timeout {
        post_effects.push(Effect::StatusUpdate(TransactionStatus::LeaderTimeout));
        return ProposingDecision { post_effects, outcome: ProposingOutcome::LeaderTimeout };
    }
    if execution_mode == ExecutionMode::LeaderOnly {
        post_effects.push(Effect::StatusUpdate(TransactionStatus::Accepted));
        return ProposingDecision { post_effects, outcome: ProposingOutcome::AcceptedLeaderOnly };
    }
    post_effects.push(Effect::StatusUpdate(TransactionStatus::Committing));
    ProposingDecision { post_effects, outcome: ProposingOutcome::Committing }
}

// ── Committing ───────────────────────────────────────────────────────────────

/// Emits one "vote committed" event per resolved committee receipt (the
/// last one flagged), then transitions to `Revealing`. The committee run
/// itself — concurrent executor calls, replacement draws, timeout
/// synthesis — is the impure action and lives in `handlers`.
pub fn decide_committing(receipt_count: usize) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(receipt_count + 1);
    for i in 0..receipt_count {
        effects.push(Effect::EmitRollupEvent {
            name: RollupEventName::VoteCommitted,
            extras: serde_json::json!({ "last": i + 1 == receipt_count }),
        });
    }
    effects.push(Effect::StatusUpdate(TransactionStatus::Revealing));
    effects
}

// ── Revealing ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealingOutcome {
    Accepted,
    AppealFailedAccepted,
    ValidatorsTimeout,
    AppealFailedValidatorsTimeout,
    AppealSucceeded,
    Rotate,
    Undetermined,
}

pub struct RevealingDecision {
    pub effects: Vec<Effect>,
    pub outcome: RevealingOutcome,
}

/// Decide the next step out of `Revealing` given the tally result and the
/// transaction's current appeal/rotation state. Vote-revealed events are
/// emitted per-validator by the handler (they need each validator's
/// address); this only decides the terminal bookkeeping.
pub fn decide_revealing(
    tally: TallyResult,
    appealed: bool,
    appeal_validators_timeout: bool,
    rotation_budget_remaining: bool,
) -> RevealingDecision {
    let mut effects = Vec::new();

    if appealed && tally == TallyResult::MajorityAgree {
        effects.push(Effect::IncrementAppealFailed);
        effects.push(Effect::StatusUpdate(TransactionStatus::Accepted));
        return RevealingDecision { effects, outcome: RevealingOutcome::AppealFailedAccepted };
    }
    if appeal_validators_timeout && tally == TallyResult::Timeout {
        effects.push(Effect::IncrementAppealFailed);
        effects.push(Effect::StatusUpdate(TransactionStatus::ValidatorsTimeout));
        return RevealingDecision { effects, outcome: RevealingOutcome::AppealFailedValidatorsTimeout };
    }
    if appealed || appeal_validators_timeout {
        effects.push(Effect::ResetAppealFailed);
        effects.push(Effect::SetAppealed(false));
        effects.push(Effect::SetAppealValidatorsTimeout(false));
        effects.push(Effect::UpdateConsensusHistory {
            round: ConsensusRound::ValidatorAppealSuccessful,
            leader_result: None,
            validator_results: Vec::new(),
            extra_status_change: None,
        });
        return RevealingDecision { effects, outcome: RevealingOutcome::AppealSucceeded };
    }

    match tally {
        TallyResult::MajorityAgree => {
            effects.push(Effect::StatusUpdate(TransactionStatus::Accepted));
            RevealingDecision { effects, outcome: RevealingOutcome::Accepted }
        }
        TallyResult::Timeout => {
            effects.push(Effect::StatusUpdate(TransactionStatus::ValidatorsTimeout));
            RevealingDecision { effects, outcome: RevealingOutcome::ValidatorsTimeout }
        }
        TallyResult::MajorityDisagree | TallyResult::NoMajority => {
            if rotation_budget_remaining {
                effects.push(Effect::IncreaseRotationCount);
                effects.push(Effect::UpdateConsensusHistory {
                    round: ConsensusRound::LeaderRotated,
                    leader_result: None,
                    validator_results: Vec::new(),
                    extra_status_change: None,
                });
                effects.push(Effect::StatusUpdate(TransactionStatus::Proposing));
                RevealingDecision { effects, outcome: RevealingOutcome::Rotate }
            } else {
                effects.push(Effect::StatusUpdate(TransactionStatus::Undetermined));
                RevealingDecision { effects, outcome: RevealingOutcome::Undetermined }
            }
        }
    }
}

// ── Accepted ─────────────────────────────────────────────────────────────────

pub struct AcceptedDecision {
    pub effects: Vec<Effect>,
    pub round: ConsensusRound,
    /// True on the validator-appeal-failure path: no contract write, no
    /// children, an empty "transaction accepted" event.
    pub is_appeal_failure_path: bool,
}

pub fn decide_accepted(appeal_undetermined: bool, appealed: bool, now: Timestamp) -> AcceptedDecision {
    let round = if appeal_undetermined {
        ConsensusRound::LeaderAppealSuccessful
    } else if appealed {
        ConsensusRound::ValidatorAppealFailed
    } else {
        ConsensusRound::Accepted
    };

    let mut effects = Vec::new();
    if appeal_undetermined {
        effects.push(Effect::ResetAppealFailed);
        effects.push(Effect::SetAppealUndetermined(false));
    } else if appealed {
        effects.push(Effect::IncrementAppealFailed);
    }

    let is_appeal_failure_path = appealed;
    if !is_appeal_failure_path {
        effects.push(Effect::SetTimestampAwaitingFinalization(Some(now)));
    }
    effects.push(Effect::StatusUpdate(TransactionStatus::Accepted));

    AcceptedDecision { effects, round, is_appeal_failure_path }
}

// ── Undetermined / LeaderTimeout / ValidatorsTimeout ────────────────────────

pub struct TerminalDecision {
    pub effects: Vec<Effect>,
    pub round: ConsensusRound,
}

/// Shared shape for the three non-accepted terminal states: publish
/// consensus failure, snapshot if not already snapshotted, set the
/// result, append history, and set `timestamp_awaiting_finalization`
/// unless this attempt was itself entered via appeal.
pub fn decide_terminal(
    status: TransactionStatus,
    entered_via_appeal: bool,
    now: Timestamp,
) -> TerminalDecision {
    let round = match status {
        TransactionStatus::Undetermined if entered_via_appeal => ConsensusRound::LeaderAppealFailed,
        TransactionStatus::Undetermined => ConsensusRound::Undetermined,
        TransactionStatus::LeaderTimeout => ConsensusRound::LeaderTimeout,
        TransactionStatus::ValidatorsTimeout => ConsensusRound::ValidatorsTimeout,
        other => unreachable!("decide_terminal called with non-terminal status {other:?}"),
    };

    let mut effects = vec![Effect::StatusUpdate(status)];
    if !entered_via_appeal {
        effects.push(Effect::SetTimestampAwaitingFinalization(Some(now)));
    }
    TerminalDecision { effects, round }
}

// ── Finalizing ───────────────────────────────────────────────────────────────

pub struct FinalizingDecision {
    pub effects: Vec<Effect>,
    /// False when this row never reached a successful acceptance — the
    /// finalization event carries no children, the contract promotion is
    /// skipped.
    pub promotes_contract: bool,
}

pub fn decide_finalizing(was_accepted_with_success: bool) -> FinalizingDecision {
    let mut effects = vec![Effect::StatusUpdate(TransactionStatus::Finalized)];
    if was_accepted_with_success {
        effects.push(Effect::PromoteContractToFinalized);
    }
    FinalizingDecision { effects, promotes_contract: was_accepted_with_success }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_suppresses_log_on_appeal_reentry() {
        let d = decide_pending(true, false);
        assert!(!d.pre_effects.iter().any(|e| matches!(e, Effect::SendMessage { .. })));
    }

    #[test]
    fn pending_logs_on_first_try() {
        let d = decide_pending(false, false);
        assert!(d.pre_effects.iter().any(|e| matches!(e, Effect::SendMessage { .. })));
        assert!(d.activate);
    }

    #[test]
    fn proposing_vm_timeout_short_circuits() {
        let d = decide_proposing(true, true, ExecutionMode::Normal);
        assert_eq!(d.outcome, ProposingOutcome::LeaderTimeout);
    }

    #[test]
    fn proposing_leader_only_skips_committing() {
        let d = decide_proposing(true, false, ExecutionMode::LeaderOnly);
        assert_eq!(d.outcome, ProposingOutcome::AcceptedLeaderOnly);
    }

    #[test]
    fn proposing_normal_mode_goes_to_committing() {
        let d = decide_proposing(true, false, ExecutionMode::Normal);
        assert_eq!(d.outcome, ProposingOutcome::Committing);
    }

    #[test]
    fn revealing_rotates_when_budget_remains() {
        let d = decide_revealing(TallyResult::NoMajority, false, false, true);
        assert_eq!(d.outcome, RevealingOutcome::Rotate);
    }

    #[test]
    fn revealing_goes_undetermined_when_rotations_exhausted() {
        let d = decide_revealing(TallyResult::MajorityDisagree, false, false, false);
        assert_eq!(d.outcome, RevealingOutcome::Undetermined);
    }

    #[test]
    fn revealing_appeal_failure_on_majority_agree() {
        let d = decide_revealing(TallyResult::MajorityAgree, true, false, false);
        assert_eq!(d.outcome, RevealingOutcome::AppealFailedAccepted);
    }

    #[test]
    fn revealing_appeal_succeeds_on_any_other_result() {
        let d = decide_revealing(TallyResult::MajorityDisagree, true, false, false);
        assert_eq!(d.outcome, RevealingOutcome::AppealSucceeded);
    }

    #[test]
    fn accepted_leader_appeal_success_resets_appeal_failed() {
        let d = decide_accepted(true, false, 100);
        assert!(d.effects.iter().any(|e| matches!(e, Effect::ResetAppealFailed)));
        assert!(!d.is_appeal_failure_path);
    }

    #[test]
    fn accepted_validator_appeal_failure_increments_appeal_failed() {
        let d = decide_accepted(false, true, 100);
        assert!(d.effects.iter().any(|e| matches!(e, Effect::IncrementAppealFailed)));
        assert!(d.is_appeal_failure_path);
        assert!(!d.effects.iter().any(|e| matches!(e, Effect::SetTimestampAwaitingFinalization(_))));
    }

    #[test]
    fn finalizing_promotes_contract_only_on_success() {
        assert!(decide_finalizing(true).promotes_contract);
        assert!(!decide_finalizing(false).promotes_contract);
    }
}
