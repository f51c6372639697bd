use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Store(#[from] qfx_store::StoreError),

    #[error(transparent)]
    Appeal(#[from] qfx_appeal::AppealError),

    #[error(transparent)]
    Bridge(#[from] qfx_rollup::RollupBridgeError),

    #[error(transparent)]
    EventBus(#[from] qfx_rollup::EventBusError),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("no validators available for this attempt")]
    NoValidators,

    #[error("all validators reported idle: systemic infrastructure failure")]
    AllIdle,

    #[error("ledger error: {0}")]
    Ledger(String),
}
