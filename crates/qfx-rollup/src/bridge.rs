use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use qfx_core::types::Address;

/// Every event the core can ask the rollup service to emit. Named after the
/// wire method the bridge calls on the other side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollupEventName {
    TransactionActivated,
    TransactionReceiptProposed,
    VoteCommitted,
    VoteRevealed,
    TransactionAccepted,
    TransactionFinalized,
    TransactionLeaderTimeout,
    TransactionLeaderRotated,
    AppealStarted,
}

impl RollupEventName {
    pub fn method_name(self) -> &'static str {
        use RollupEventName::*;
        match self {
            TransactionActivated => "emitTransactionActivated",
            TransactionReceiptProposed => "emitTransactionReceiptProposed",
            VoteCommitted => "emitVoteCommitted",
            VoteRevealed => "emitVoteRevealed",
            TransactionAccepted => "emitTransactionAccepted",
            TransactionFinalized => "emitTransactionFinalized",
            TransactionLeaderTimeout => "emitTransactionLeaderTimeout",
            TransactionLeaderRotated => "emitTransactionLeaderRotated",
            AppealStarted => "emitAppealStarted",
        }
    }
}

/// Response to a call that carried child-transaction payloads: the hashes
/// the rollup service assigned, to be used verbatim when inserting the
/// child rows.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChildTransactionIds {
    pub tx_ids_hex: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RollupBridgeError {
    #[error("rollup bridge transport error: {0}")]
    Transport(String),
    #[error("rollup bridge returned malformed response: {0}")]
    Malformed(String),
}

/// The rollup service, treated as a remote event sink. `extras` carries
/// whatever positional arguments a given event needs (vote maps, receipts,
/// child-transaction payloads); its shape is opaque to this crate.
#[async_trait]
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait RollupBridge: Send + Sync {
    async fn emit_transaction_event(
        &self,
        name: RollupEventName,
        account: &Address,
        tx_hash: &str,
        extras: Value,
    ) -> Result<ChildTransactionIds, RollupBridgeError>;
}
