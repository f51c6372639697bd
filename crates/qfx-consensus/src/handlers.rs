//! The effect runner: a thin interpreter over the pure decisions in
//! `decide`. Each public entry point corresponds to one pass through the
//! transaction state machine — it applies pre-effects, performs the one
//! impure action inherent to the state (executor call, validator-pool
//! draw, contract-state read), then applies post-effects, persisting the
//! row after every stage so a crash mid-attempt leaves a resumable row.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};

use qfx_core::constants::{
    COMMITTEE_CONCURRENCY_LIMIT, CONSENSUS_VALIDATOR_EXEC_TIMEOUT_SECONDS, MAX_IDLE_REPLACEMENTS,
};
use qfx_core::transaction::{
    ContractStateTree, ExecutionMode, ExecutionResult, Receipt, Transaction, TransactionStatus, TransactionType,
    TriggerPoint, Vote, RESULT_CODE_VM_ERROR_TIMEOUT,
};
use qfx_core::types::{Address, Timestamp, TxHash};
use qfx_core::validator::{Validator, ValidatorSnapshot};
use qfx_executor::{ExecMode, ExecRequest, Executor, InternalError};
use qfx_rollup::triggered::build_children;
use qfx_rollup::{EventBus, RollupBridge, RollupEventName};
use qfx_store::{ContractStore, TransactionStore};

use qfx_appeal::{
    admission_allowed, appeal_kind_for, classify_reentry, merge_validator_receipts, rotate_leader, select_validators,
    AppealCoordinator, AppealKind, ReentryKind,
};

use crate::decide::{
    decide_accepted, decide_committing, decide_finalizing, decide_pending, decide_proposing, decide_revealing,
    decide_terminal, ProposingOutcome, RevealingOutcome,
};
use crate::effect::{BusChannel, Effect};
use crate::error::ConsensusError;
use crate::registry::ValidatorRegistry;
use crate::tally::tally_votes;
use crate::transfer::{execute_native_transfer, AccountLedger};

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

fn vote_for_chain(vote: Vote) -> Vote {
    if vote == Vote::Idle {
        Vote::Timeout
    } else {
        vote
    }
}

/// The committee that actually runs as validators this round: `committee`
/// plus the leader itself when `execution_mode` is `LeaderSelfValidator`.
fn build_committee_to_run(
    committee: &[Validator],
    self_validate: bool,
    receipt: &Receipt,
    snapshot: &ValidatorSnapshot,
) -> Vec<Validator> {
    let mut out = committee.to_vec();
    if self_validate {
        if let Some(leader_validator) = snapshot.iter().find(|v| v.address.as_str() == receipt.node_config) {
            out.push(leader_validator.clone());
        }
    }
    out
}

fn synthesize_receipt(code: u8, vote: Vote, validator: &Address) -> Receipt {
    Receipt {
        result: vec![code],
        execution_result: ExecutionResult::Error,
        vote,
        node_config: validator.as_str().to_string(),
        pending_transactions: Vec::new(),
        contract_state: None,
        genvm_result: serde_json::json!({}),
    }
}

/// Wires together every external collaborator the state machine depends
/// on: the remote executor, the rollup bridge, the validator registry, the
/// account ledger, the event bus, and the two stores. Holds no per-attempt
/// state of its own.
pub struct ConsensusEngine {
    executor: Arc<dyn Executor>,
    bridge: Arc<dyn RollupBridge>,
    registry: Arc<dyn ValidatorRegistry>,
    ledger: Arc<dyn AccountLedger>,
    event_bus: EventBus,
    transactions: TransactionStore,
    contracts: ContractStore,
    appeal: AppealCoordinator,
}

impl ConsensusEngine {
    pub fn new(
        executor: Arc<dyn Executor>,
        bridge: Arc<dyn RollupBridge>,
        registry: Arc<dyn ValidatorRegistry>,
        ledger: Arc<dyn AccountLedger>,
        event_bus: EventBus,
        transactions: TransactionStore,
        contracts: ContractStore,
        appeal: AppealCoordinator,
    ) -> Self {
        Self { executor, bridge, registry, ledger, event_bus, transactions, contracts, appeal }
    }

    async fn apply_effect(&self, tx: &mut Transaction, effect: Effect) -> Result<(), ConsensusError> {
        match effect {
            Effect::StatusUpdate(status) => tx.status = status,
            Effect::SendMessage { channel, event, data } => match channel {
                BusChannel::Consensus => {
                    self.event_bus.publish_consensus_event(event, data, Some(tx.hash.as_str().to_string())).await?
                }
                BusChannel::Transaction => {
                    self.event_bus.publish_transaction_event(event, data, tx.hash.as_str().to_string()).await?
                }
                BusChannel::General => self.event_bus.publish_general_event(event, data).await?,
            },
            Effect::EmitRollupEvent { name, extras } => {
                let to = tx.to_address.clone().unwrap_or_else(|| Address::new(""));
                self.bridge.emit_transaction_event(name, &to, tx.hash.as_str(), extras).await?;
            }
            Effect::SetTransactionResult(result) => tx.result = result,
            Effect::UpdateConsensusHistory { round, leader_result, validator_results, extra_status_change } => {
                self.transactions
                    .update_consensus_history(&tx.hash, round, leader_result, validator_results, extra_status_change, now())
                    .await?;
            }
            Effect::SetAppealed(v) => tx.appeal.appealed = v,
            Effect::SetAppealUndetermined(v) => tx.appeal.appeal_undetermined = v,
            Effect::SetAppealLeaderTimeout(v) => tx.appeal.appeal_leader_timeout = v,
            Effect::SetAppealValidatorsTimeout(v) => tx.appeal.appeal_validators_timeout = v,
            Effect::IncrementAppealFailed => tx.appeal.appeal_failed += 1,
            Effect::ResetAppealFailed => tx.appeal.appeal_failed = 0,
            Effect::SetContractSnapshot(snapshot) => tx.contract_snapshot = snapshot,
            Effect::SetLeaderTimeoutValidators(v) => tx.leader_timeout_validators = v,
            Effect::RegisterContract { accepted, finalized } => {
                if let Some(addr) = &tx.to_address {
                    self.contracts.register(addr, &accepted, &finalized).await?;
                }
            }
            Effect::UpdateContractState(state) => {
                if let Some(addr) = &tx.to_address {
                    self.contracts.set_accepted(addr, &state).await?;
                }
            }
            Effect::PromoteContractToFinalized => {
                if let Some(addr) = &tx.to_address {
                    self.contracts.promote_to_finalized(addr).await?;
                }
            }
            Effect::IncreaseRotationCount => tx.rotation_count += 1,
            Effect::ResetRotationCount => tx.rotation_count = 0,
            Effect::SetTimestampAppeal(v) => tx.appeal.timestamp_appeal = v,
            Effect::SetTimestampAwaitingFinalization(v) => tx.appeal.timestamp_awaiting_finalization = v,
        }
        Ok(())
    }

    async fn apply_all(&self, tx: &mut Transaction, effects: Vec<Effect>) -> Result<(), ConsensusError> {
        for effect in effects {
            self.apply_effect(tx, effect).await?;
        }
        Ok(())
    }

    /// Appeal-admission entry point (§4.6/§8): checks the capacity bound
    /// before anything else is mutated, then sets the appeal flag the
    /// transaction's current status admits, stamps `timestamp_appeal`, and
    /// emits `AppealStarted`. Returns `false` without changing the row
    /// (flag left unset, status unchanged) when the status has no appeal
    /// path or the validator population is already exhausted. The row
    /// becomes claimable by `ClaimClass::Appeal` the moment the flag is
    /// saved — no separate status transition is needed.
    pub async fn submit_appeal(&self, hash: &TxHash) -> Result<bool, ConsensusError> {
        let Some(mut tx) = self.transactions.get_transaction_by_hash(hash).await? else {
            return Ok(false);
        };
        let Some(kind) = appeal_kind_for(tx.status) else {
            return Ok(false);
        };

        let snapshot = self.registry.snapshot().await;
        if !admission_allowed(kind, &tx, &snapshot) {
            tracing::warn!(hash = %tx.hash.as_str(), ?kind, "appeal rejected: validator capacity exhausted");
            return Ok(false);
        }

        match kind {
            AppealKind::Leader => tx.appeal.appeal_undetermined = true,
            AppealKind::LeaderTimeout => tx.appeal.appeal_leader_timeout = true,
            AppealKind::Validator if tx.status == TransactionStatus::ValidatorsTimeout => {
                tx.appeal.appeal_validators_timeout = true
            }
            AppealKind::Validator => tx.appeal.appealed = true,
        }
        tx.appeal.timestamp_appeal = Some(now());
        self.transactions.save_transaction(&tx).await?;

        let to = tx.to_address.clone().unwrap_or_else(|| Address::new(""));
        self.bridge
            .emit_transaction_event(RollupEventName::AppealStarted, &to, hash.as_str(), serde_json::json!({}))
            .await?;

        Ok(true)
    }

    /// Drive one claimed row through the state machine until it reaches a
    /// terminal or awaiting-finalization status. Re-entrant: a `Pending`
    /// row with existing `consensus_data`/appeal flags resumes from the
    /// appropriate branch of the re-entry table.
    pub async fn run_attempt(&self, mut tx: Transaction) -> Result<Transaction, ConsensusError> {
        if tx.transaction_type == TransactionType::Send {
            let (status, result) = execute_native_transfer(self.ledger.as_ref(), &tx).await;
            tx.status = status;
            tx.result = result;
            self.transactions.save_transaction(&tx).await?;
            return Ok(tx);
        }

        let snapshot = self.registry.snapshot().await;
        if snapshot.is_empty() {
            return Err(ConsensusError::NoValidators);
        }

        let kind = classify_reentry(&tx);
        let suppress_activation =
            matches!(kind, ReentryKind::AppealUndetermined | ReentryKind::AppealLeaderTimeout);
        let pending = decide_pending(tx.appeal.any_active(), suppress_activation);
        self.apply_all(&mut tx, pending.pre_effects).await?;

        let prior: Vec<Validator> = snapshot
            .iter()
            .filter(|v| tx.consensus_data.votes.contains_key(&v.address))
            .cloned()
            .collect();
        let leader_timeout_validators = tx.leader_timeout_validators.clone();
        let mut committee = select_validators(kind, &tx, &snapshot, &prior, &leader_timeout_validators);
        if committee.is_empty() {
            return Err(ConsensusError::NoValidators);
        }

        self.apply_all(&mut tx, pending.post_effects).await?;
        self.transactions.save_transaction(&tx).await?;

        // A validator appeal (and its validators-timeout sibling) begins
        // from Committing directly: the standing leader receipt stands,
        // and the drawn committee above is the validator group to run —
        // no leader is popped, `run_leader` is never called (§4.6).
        let validator_appeal_fastpath = matches!(kind, ReentryKind::AppealedOrValidatorsTimeout);

        let mut activate = pending.activate;
        loop {
            let (receipt, committee_to_run) = if validator_appeal_fastpath {
                let receipt = tx
                    .consensus_data
                    .leader_receipt
                    .first()
                    .cloned()
                    .ok_or(ConsensusError::NoValidators)?;
                let self_validate = matches!(tx.execution_mode, ExecutionMode::LeaderSelfValidator);
                let committee_to_run = build_committee_to_run(&committee, self_validate, &receipt, &snapshot);
                (receipt, committee_to_run)
            } else {
                let to_address = tx.to_address.clone();
                let contract_state =
                    if let Some(addr) = &to_address { self.contracts.get_accepted(addr).await? } else { None };

                let leader = committee.remove(0);
                let receipt = self.run_leader(&tx, leader, &mut committee, contract_state.as_ref(), &snapshot).await?;
                tx.consensus_data.leader_receipt = vec![receipt.clone()];
                tx.consensus_data.votes.insert(
                    Address::new(receipt.node_config.clone()),
                    if receipt.is_vm_timeout() { Vote::Timeout } else { receipt.vote },
                );

                let proposing = decide_proposing(activate, receipt.is_vm_timeout(), tx.execution_mode);
                self.apply_all(&mut tx, proposing.post_effects).await?;
                self.transactions.save_transaction(&tx).await?;
                activate = false;

                match proposing.outcome {
                    ProposingOutcome::LeaderTimeout => {
                        tx.leader_timeout_validators =
                            committee.iter().map(|v| v.address.as_str().to_string()).collect();
                        let terminal =
                            decide_terminal(TransactionStatus::LeaderTimeout, tx.appeal.any_active(), now());
                        self.apply_all(&mut tx, terminal.effects).await?;
                        self.transactions
                            .update_consensus_history(&tx.hash, terminal.round, Some(receipt), Vec::new(), None, now())
                            .await?;
                        self.transactions.save_transaction(&tx).await?;
                        return Ok(tx);
                    }
                    ProposingOutcome::AcceptedLeaderOnly => {
                        return self.finish_accepted(tx, receipt, Vec::new()).await;
                    }
                    ProposingOutcome::Committing => {
                        let self_validate = matches!(tx.execution_mode, ExecutionMode::LeaderSelfValidator);
                        let committee_to_run = build_committee_to_run(&committee, self_validate, &receipt, &snapshot);
                        (receipt, committee_to_run)
                    }
                }
            };

            let self_validate = matches!(tx.execution_mode, ExecutionMode::LeaderSelfValidator);
            let validator_receipts = self.run_committee(&tx, &committee_to_run, &receipt, &snapshot).await;

            let commit_effects = decide_committing(validator_receipts.len());
            self.apply_all(&mut tx, commit_effects).await?;

            for (addr, vreceipt) in &validator_receipts {
                tx.consensus_data.votes.insert(addr.clone(), vreceipt.vote);
            }
            // Captured before this round's votes overwrite `validators` and
            // before `apply_all` below can reset `appeal_failed` — both are
            // needed by the `AppealSucceeded` merge further down.
            let prior_validator_receipts = tx.consensus_data.validators.clone();
            let appeal_failed_before_round = tx.appeal.appeal_failed;
            tx.consensus_data.validators = validator_receipts.iter().map(|(_, r)| r.clone()).collect();
            if self_validate {
                if let Some((_, leader_validation)) =
                    validator_receipts.iter().find(|(a, _)| a.as_str() == receipt.node_config)
                {
                    tx.consensus_data.leader_receipt.push(leader_validation.clone());
                }
            }
            self.transactions.save_transaction(&tx).await?;

            if tx.consensus_data.votes.values().all(|v| *v == Vote::Idle) {
                return Err(ConsensusError::AllIdle);
            }

            let total = validator_receipts.len();
            for (i, (addr, vreceipt)) in validator_receipts.iter().enumerate() {
                self.bridge
                    .emit_transaction_event(
                        RollupEventName::VoteRevealed,
                        tx.to_address.as_ref().unwrap_or(&Address::new("")),
                        tx.hash.as_str(),
                        serde_json::json!({
                            "validator": addr.as_str(),
                            "vote": format!("{:?}", vote_for_chain(vreceipt.vote)),
                            "last": i + 1 == total,
                        }),
                    )
                    .await?;
            }

            let tally = tally_votes(&tx.consensus_data.votes);
            let revealing = decide_revealing(
                tally,
                tx.appeal.appealed,
                tx.appeal.appeal_validators_timeout,
                tx.rotation_budget_remaining(),
            );
            self.apply_all(&mut tx, revealing.effects).await?;
            self.transactions.save_transaction(&tx).await?;

            match revealing.outcome {
                RevealingOutcome::Accepted | RevealingOutcome::AppealFailedAccepted => {
                    let validator_results = validator_receipts.into_iter().map(|(_, r)| r).collect();
                    return self.finish_accepted(tx, receipt, validator_results).await;
                }
                RevealingOutcome::ValidatorsTimeout | RevealingOutcome::AppealFailedValidatorsTimeout => {
                    let terminal = decide_terminal(
                        TransactionStatus::ValidatorsTimeout,
                        tx.is_appeal_of_accepted_or_timeout(),
                        now(),
                    );
                    self.apply_all(&mut tx, terminal.effects).await?;
                    self.transactions.save_transaction(&tx).await?;
                    return Ok(tx);
                }
                RevealingOutcome::AppealSucceeded => {
                    let merged = merge_validator_receipts(
                        appeal_failed_before_round,
                        prior_validator_receipts,
                        tx.consensus_data.validators.clone(),
                    );
                    tx.consensus_data.validators = merged;
                    self.appeal.rollback_validator_appeal(&tx).await?;
                    tx.contract_snapshot = None;
                    self.transactions.save_transaction(&tx).await?;
                    return Ok(tx);
                }
                RevealingOutcome::Rotate => {
                    committee = rotate_leader(&tx, &committee, &snapshot).ok_or(ConsensusError::NoValidators)?;
                    continue;
                }
                RevealingOutcome::Undetermined => {
                    let terminal = decide_terminal(TransactionStatus::Undetermined, tx.appeal.appealed, now());
                    self.apply_all(&mut tx, terminal.effects).await?;
                    self.transactions.save_transaction(&tx).await?;
                    return Ok(tx);
                }
            }
        }
    }

    /// Invoke the leader, replacing it with the next committee member on a
    /// fatal infrastructure error, up to `MAX_IDLE_REPLACEMENTS`.
    async fn run_leader(
        &self,
        tx: &Transaction,
        mut leader: Validator,
        committee: &mut Vec<Validator>,
        contract_state: Option<&ContractStateTree>,
        snapshot: &ValidatorSnapshot,
    ) -> Result<Receipt, ConsensusError> {
        let mut replacements = 0u32;
        let mut retries = 0u32;
        loop {
            let request = ExecRequest {
                transaction: tx,
                contract_state,
                validator: &leader,
                mode: ExecMode::Leader,
                leader_receipt: None,
                validators: snapshot.clone(),
            };
            match self.executor.exec_transaction(request).await {
                Ok(receipt) => return Ok(receipt),
                Err(InternalError { is_fatal: true, error_code, .. }) => {
                    replacements += 1;
                    if replacements as usize > MAX_IDLE_REPLACEMENTS || committee.is_empty() {
                        return Err(ConsensusError::Executor(error_code));
                    }
                    leader = committee.remove(0);
                }
                Err(InternalError { is_fatal: false, error_code, .. }) => {
                    retries += 1;
                    if retries as usize > MAX_IDLE_REPLACEMENTS {
                        return Err(ConsensusError::Executor(error_code));
                    }
                }
            }
        }
    }

    /// Run every committee validator concurrently, bounded by
    /// `COMMITTEE_CONCURRENCY_LIMIT`. Synthesizes a timeout/idle receipt for
    /// any validator whose call times out or whose replacement pool is
    /// exhausted; never returns an error itself — exhaustion is folded into
    /// the synthesized vote so `Revealing` always sees a full vote map.
    async fn run_committee(
        &self,
        tx: &Transaction,
        committee: &[Validator],
        leader_receipt: &Receipt,
        snapshot: &ValidatorSnapshot,
    ) -> Vec<(Address, Receipt)> {
        let replacement_pool: Mutex<Vec<Validator>> = Mutex::new(
            snapshot.iter().filter(|v| !committee.iter().any(|c| c.address == v.address)).cloned().collect(),
        );
        let executor = self.executor.as_ref();
        let pool = &replacement_pool;

        stream::iter(committee.to_vec())
            .map(|validator| run_one_committee_member(executor, tx, validator, leader_receipt, snapshot, pool))
            .buffer_unordered(COMMITTEE_CONCURRENCY_LIMIT)
            .collect::<Vec<_>>()
            .await
    }

    /// Shared tail of `Proposing::AcceptedLeaderOnly` and a successful
    /// `Revealing`: book-keeping, contract write, triggered-transaction
    /// fan-out, then the `TransactionAccepted` bridge event.
    async fn finish_accepted(
        &self,
        mut tx: Transaction,
        leader_receipt: Receipt,
        validator_results: Vec<Receipt>,
    ) -> Result<Transaction, ConsensusError> {
        let now_ts = now();
        let decision = decide_accepted(tx.appeal.appeal_undetermined, tx.appeal.appealed, now_ts);
        self.apply_all(&mut tx, decision.effects).await?;
        self.transactions
            .update_consensus_history(
                &tx.hash,
                decision.round,
                Some(leader_receipt.clone()),
                validator_results,
                None,
                now_ts,
            )
            .await?;

        let to = tx.to_address.clone().unwrap_or_else(|| Address::new(""));

        if !decision.is_appeal_failure_path {
            tx.contract_snapshot = Some(self.contracts.get_accepted(&to).await?.unwrap_or_default());

            if leader_receipt.execution_result == ExecutionResult::Success {
                if tx.transaction_type == TransactionType::DeployContract {
                    let accepted = leader_receipt.contract_state.clone().unwrap_or_default();
                    let mut finalized = ContractStateTree::new();
                    finalized.insert("code".to_string(), tx.data.clone());
                    if let Err(e) = self.contracts.register(&to, &accepted, &finalized).await {
                        tracing::warn!(error = %e, hash = %tx.hash, "duplicate contract registration");
                    }
                } else if let Some(state) = &leader_receipt.contract_state {
                    self.contracts.set_accepted(&to, state).await?;
                }
            }

            let assigned_hashes = if leader_receipt.pending_transactions.is_empty() {
                self.bridge
                    .emit_transaction_event(RollupEventName::TransactionAccepted, &to, tx.hash.as_str(), serde_json::json!({}))
                    .await?;
                Vec::new()
            } else {
                let extras = serde_json::json!({ "pending_transactions": leader_receipt.pending_transactions });
                let resp = self
                    .bridge
                    .emit_transaction_event(RollupEventName::TransactionAccepted, &to, tx.hash.as_str(), extras)
                    .await?;
                resp.tx_ids_hex.into_iter().map(TxHash::new).collect()
            };

            let mut next_nonce = tx.nonce + 1;
            let children = build_children(
                &tx,
                &leader_receipt.pending_transactions,
                TriggerPoint::Accepted,
                &mut next_nonce,
                &assigned_hashes,
            );
            for child in &children {
                self.transactions.insert_transaction(child).await?;
            }
            tx.triggered_transactions.extend(children.iter().map(|c| c.hash.clone()));
        } else {
            self.bridge
                .emit_transaction_event(RollupEventName::TransactionAccepted, &to, tx.hash.as_str(), serde_json::json!({}))
                .await?;
        }

        self.transactions.save_transaction(&tx).await?;
        Ok(tx)
    }

    /// Entry point for the finalization worker (§4.4): promotes `accepted`
    /// to `finalized` and fans out `on=finalized` children when the row
    /// reached `Accepted` with a successful execution; otherwise publishes
    /// an empty finalization event.
    pub async fn finalize(&self, mut tx: Transaction) -> Result<Transaction, ConsensusError> {
        let was_accepted_with_success =
            tx.status == TransactionStatus::Accepted && tx.result == Some(ExecutionResult::Success);
        let decision = decide_finalizing(was_accepted_with_success);
        self.apply_all(&mut tx, decision.effects).await?;

        let to = tx.to_address.clone();
        if decision.promotes_contract {
            let pending = tx
                .consensus_data
                .leader_receipt
                .first()
                .map(|r| r.pending_transactions.clone())
                .unwrap_or_default();
            if let Some(addr) = &to {
                if pending.is_empty() {
                    self.bridge
                        .emit_transaction_event(RollupEventName::TransactionFinalized, addr, tx.hash.as_str(), serde_json::json!({}))
                        .await?;
                } else {
                    let extras = serde_json::json!({ "pending_transactions": pending });
                    let resp = self
                        .bridge
                        .emit_transaction_event(RollupEventName::TransactionFinalized, addr, tx.hash.as_str(), extras)
                        .await?;
                    let assigned: Vec<TxHash> = resp.tx_ids_hex.into_iter().map(TxHash::new).collect();
                    let mut next_nonce = tx.nonce + 1;
                    let children = build_children(&tx, &pending, TriggerPoint::Finalized, &mut next_nonce, &assigned);
                    for child in &children {
                        self.transactions.insert_transaction(child).await?;
                    }
                    tx.triggered_transactions.extend(children.iter().map(|c| c.hash.clone()));
                }
            }
        } else if let Some(addr) = &to {
            self.bridge
                .emit_transaction_event(RollupEventName::TransactionFinalized, addr, tx.hash.as_str(), serde_json::json!({}))
                .await?;
        }

        self.transactions.save_transaction(&tx).await?;
        Ok(tx)
    }
}

async fn run_one_committee_member(
    executor: &dyn Executor,
    tx: &Transaction,
    mut validator: Validator,
    leader_receipt: &Receipt,
    snapshot: &ValidatorSnapshot,
    pool: &Mutex<Vec<Validator>>,
) -> (Address, Receipt) {
    let mut replacements = 0u32;
    let mut retries = 0u32;
    loop {
        let addr = validator.address.clone();
        let request = ExecRequest {
            transaction: tx,
            contract_state: None,
            validator: &validator,
            mode: ExecMode::Validator,
            leader_receipt: Some(leader_receipt),
            validators: snapshot.clone(),
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(CONSENSUS_VALIDATOR_EXEC_TIMEOUT_SECONDS),
            executor.exec_transaction(request),
        )
        .await;

        match outcome {
            Err(_elapsed) => return (addr, synthesize_receipt(RESULT_CODE_VM_ERROR_TIMEOUT, Vote::Idle, &addr)),
            Ok(Ok(receipt)) => return (addr, receipt),
            Ok(Err(InternalError { is_fatal: true, .. })) => {
                replacements += 1;
                if replacements as usize > MAX_IDLE_REPLACEMENTS {
                    return (addr, synthesize_receipt(RESULT_CODE_VM_ERROR_TIMEOUT, Vote::Idle, &addr));
                }
                match pool.lock().expect("replacement pool poisoned").pop() {
                    Some(replacement) => validator = replacement,
                    None => return (addr, synthesize_receipt(RESULT_CODE_VM_ERROR_TIMEOUT, Vote::Idle, &addr)),
                }
            }
            Ok(Err(InternalError { is_fatal: false, .. })) => {
                retries += 1;
                if retries as usize > MAX_IDLE_REPLACEMENTS {
                    return (addr, synthesize_receipt(RESULT_CODE_VM_ERROR_TIMEOUT, Vote::Idle, &addr));
                }
            }
        }
    }
}
