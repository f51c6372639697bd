use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance, Bytes, Nonce, Timestamp, TxHash};

// ── TransactionType / status ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Send,
    DeployContract,
    RunContract,
    UpgradeContract,
}

/// One state per protocol stage. `handle()` implementations in
/// `qfx-consensus` each correspond to one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Activated,
    Proposing,
    Committing,
    Revealing,
    Accepted,
    Undetermined,
    LeaderTimeout,
    ValidatorsTimeout,
    Finalizing,
    Finalized,
    Canceled,
}

impl TransactionStatus {
    /// Terminal states permit no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Finalized | TransactionStatus::Canceled)
    }

    /// Terminal-for-consensus but still eligible for appeal/finalization.
    pub fn is_awaiting_finalization_eligible(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Accepted
                | TransactionStatus::Undetermined
                | TransactionStatus::LeaderTimeout
                | TransactionStatus::ValidatorsTimeout
        )
    }
}

/// How a transaction's committee is assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Normal,
    LeaderOnly,
    LeaderSelfValidator,
}

// ── Vote / Receipt ─────────────────────────────────────────────────────────────

/// `Idle` denotes an infrastructure failure: the validator could not produce
/// a vote at all. It is treated as `Disagree` for tally purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    Agree,
    Disagree,
    Timeout,
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionResult {
    Success,
    Error,
}

/// A single contract-slot state tree: opaque slot name to opaque bytes.
pub type ContractStateTree = HashMap<String, Bytes>;

/// One child transaction emitted by a contract execution, destined for
/// fan-out on either acceptance or finalization of the parent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub on: TriggerPoint,
    pub transaction_type: TransactionType,
    pub to_address: Option<Address>,
    pub data: Bytes,
    pub value: Balance,
    /// `Some(0)` requests a randomly allocated address; `Some(n>0)` requests
    /// the deterministic create2-style derivation; `None` for non-deploy.
    pub salt_nonce: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerPoint {
    Accepted,
    Finalized,
}

/// Result of an executor invocation. `result`'s first byte is a
/// result code; the remainder is the payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receipt {
    pub result: Bytes,
    pub execution_result: ExecutionResult,
    pub vote: Vote,
    /// Identity of the producing validator (address string).
    pub node_config: String,
    pub pending_transactions: Vec<PendingTransaction>,
    pub contract_state: Option<ContractStateTree>,
    /// Free-form diagnostics; never published verbatim on the event bus.
    pub genvm_result: serde_json::Value,
}

impl Receipt {
    /// First byte of `result`, if present.
    pub fn result_code(&self) -> Option<u8> {
        self.result.first().copied()
    }

    pub fn is_vm_timeout(&self) -> bool {
        self.result_code() == Some(RESULT_CODE_VM_TIMEOUT)
    }
}

/// Result-code marker: the leader's VM hit its execution timeout. Recognized
/// by `Proposing` to short-circuit straight to `LeaderTimeout`.
pub const RESULT_CODE_VM_TIMEOUT: u8 = 0xF0;
/// Result-code marker for a synthesized timeout receipt produced by the
/// committee runner when a validator executor call exceeds its deadline.
pub const RESULT_CODE_VM_ERROR_TIMEOUT: u8 = 0xF1;

// ── Consensus working set ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConsensusData {
    pub votes: HashMap<Address, Vote>,
    /// `[0]` is the canonical leader receipt; `[1]`, if present, is the
    /// self-validator receipt.
    pub leader_receipt: Vec<Receipt>,
    pub validators: Vec<Receipt>,
}

/// Tags recorded in `consensus_history` and returned by state `handle()`
/// calls as the terminal marker for this attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusRound {
    Accepted,
    Undetermined,
    LeaderTimeout,
    ValidatorsTimeout,
    LeaderRotated,
    ValidatorAppealSuccessful,
    ValidatorAppealFailed,
    LeaderAppealSuccessful,
    LeaderAppealFailed,
    LeaderTimeoutAppealSuccessful,
}

/// One append-only entry in `consensus_history`. `contract_state` is always
/// stripped from stored receipts before appending (keeps history small and
/// avoids leaking state snapshots through the history surface).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusHistoryEntry {
    pub round: ConsensusRound,
    pub leader_result: Option<Receipt>,
    pub validator_results: Vec<Receipt>,
    pub recorded_at: Timestamp,
    pub extra_status_change: Option<String>,
}

// ── Appeal state ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppealState {
    pub appealed: bool,
    pub appeal_undetermined: bool,
    pub appeal_leader_timeout: bool,
    pub appeal_validators_timeout: bool,
    pub appeal_failed: u32,
    pub timestamp_appeal: Option<Timestamp>,
    pub timestamp_awaiting_finalization: Option<Timestamp>,
    pub appeal_processing_time: i64,
}

impl AppealState {
    /// True if any appeal flag is currently set.
    pub fn any_active(&self) -> bool {
        self.appealed || self.appeal_undetermined || self.appeal_leader_timeout || self.appeal_validators_timeout
    }

    pub fn clear_flags(&mut self) {
        self.appealed = false;
        self.appeal_undetermined = false;
        self.appeal_leader_timeout = false;
        self.appeal_validators_timeout = false;
    }
}

// ── Transaction ────────────────────────────────────────────────────────────────

/// A point-in-time copy of a contract's `accepted` state tree, stored on the
/// originating transaction row so rollback is O(1).
pub type ContractSnapshot = ContractStateTree;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    // ── Identity ──────────────────────────────────────────────────────────
    pub hash: TxHash,
    pub nonce: Nonce,
    pub created_at: Timestamp,

    // ── Routing ───────────────────────────────────────────────────────────
    pub from_address: Option<Address>,
    pub to_address: Option<Address>,
    pub transaction_type: TransactionType,

    // ── Payload ───────────────────────────────────────────────────────────
    pub data: Bytes,
    pub value: Balance,

    // ── Lifecycle ─────────────────────────────────────────────────────────
    pub status: TransactionStatus,

    // ── Consensus configuration ───────────────────────────────────────────
    pub num_of_initial_validators: u32,
    pub config_rotation_rounds: u32,
    pub execution_mode: ExecutionMode,

    // ── Consensus working set ─────────────────────────────────────────────
    pub consensus_data: ConsensusData,
    pub consensus_history: Vec<ConsensusHistoryEntry>,

    // ── Appeal state ──────────────────────────────────────────────────────
    pub appeal: AppealState,

    // ── Rollback anchor ───────────────────────────────────────────────────
    pub contract_snapshot: Option<ContractSnapshot>,

    // ── Parentage ─────────────────────────────────────────────────────────
    pub triggered_by_hash: Option<TxHash>,
    pub triggered_transactions: Vec<TxHash>,
    pub triggered_on: Option<TriggerPoint>,

    // ── Worker lease ──────────────────────────────────────────────────────
    pub blocked_at: Option<Timestamp>,
    pub worker_id: Option<String>,

    // ── Rotation ──────────────────────────────────────────────────────────
    pub rotation_count: u32,
    pub leader_timeout_validators: Vec<String>,

    /// Result code/execution result of this transaction's canonical receipt,
    /// surfaced cheaply without walking `consensus_data`.
    pub result: Option<ExecutionResult>,
}

impl Transaction {
    /// `rotation_count` never exceeds `config_rotation_rounds`.
    pub fn rotation_budget_remaining(&self) -> bool {
        self.rotation_count < self.config_rotation_rounds
    }

    pub fn is_appeal_of_accepted_or_timeout(&self) -> bool {
        self.appeal.appealed || self.appeal.appeal_validators_timeout
    }
}
