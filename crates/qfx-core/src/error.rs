use thiserror::Error;

/// Errors surfaced by the core data model: validation of scalar inputs
/// shared by the store, executor, and consensus crates.
#[derive(Debug, Error)]
pub enum QfxError {
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("self-transfer not allowed")]
    SelfTransfer,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}
