use qfx_core::transaction::{ConsensusRound, ContractStateTree, ExecutionResult, Receipt, TransactionStatus};
use qfx_core::types::Timestamp;
use qfx_rollup::RollupEventName;

/// Which of the three pub/sub channels (§6.4) a `SendMessage` effect
/// targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusChannel {
    Consensus,
    Transaction,
    General,
}

/// One observable write a `decide_<state>` function emits. The state
/// handler applies these in order; nothing here performs I/O by itself —
/// that's the effect runner's job (`handlers::apply_effect`).
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    StatusUpdate(TransactionStatus),
    SendMessage { channel: BusChannel, event: &'static str, data: serde_json::Value },
    EmitRollupEvent { name: RollupEventName, extras: serde_json::Value },
    SetTransactionResult(Option<ExecutionResult>),
    UpdateConsensusHistory {
        round: ConsensusRound,
        leader_result: Option<Receipt>,
        validator_results: Vec<Receipt>,
        extra_status_change: Option<String>,
    },
    SetAppealed(bool),
    SetAppealUndetermined(bool),
    SetAppealLeaderTimeout(bool),
    SetAppealValidatorsTimeout(bool),
    IncrementAppealFailed,
    ResetAppealFailed,
    SetContractSnapshot(Option<ContractStateTree>),
    SetLeaderTimeoutValidators(Vec<String>),
    RegisterContract { accepted: ContractStateTree, finalized: ContractStateTree },
    UpdateContractState(ContractStateTree),
    PromoteContractToFinalized,
    IncreaseRotationCount,
    ResetRotationCount,
    SetTimestampAppeal(Option<Timestamp>),
    SetTimestampAwaitingFinalization(Option<Timestamp>),
}
