//! Abstraction over the remote execution backend (the "Node"/GenVM runner)
//! that turns a pending transaction into a `Receipt`. The consensus state
//! machine depends only on this trait; `qfx-node` wires in a concrete
//! implementation that talks to the actual executor process over its own
//! transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qfx_core::transaction::{ContractStateTree, Receipt, Transaction};
use qfx_core::validator::{Validator, ValidatorSnapshot};

/// Which role the calling side plays for this invocation. The executor
/// applies side effects (balance transfer, pending-transaction scheduling)
/// only when invoked as `Leader`; a `Validator` call re-executes for
/// agreement without committing anything beyond its own receipt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    Leader,
    Validator,
}

/// Structured failure surfaced by an executor call. Distinguished from a
/// normal `Disagree`/`Timeout` vote: this is an infrastructure fault (the
/// executor process is unreachable, crashed, or returned malformed output),
/// not a verdict about the transaction's execution.
#[derive(Clone, Debug, Serialize, Deserialize, thiserror::Error)]
#[error("executor error {error_code}: {causes:?}")]
pub struct InternalError {
    pub error_code: String,
    pub causes: Vec<String>,
    pub ctx: serde_json::Value,
    /// Fatal errors exhaust the current leader/validator's participation
    /// for this attempt and trigger an idle-replacement draw; non-fatal
    /// ones are retried in place.
    pub is_fatal: bool,
    pub is_leader: bool,
}

/// One executor call's full input: the transaction to run, the snapshot of
/// contract state it should execute against, which validator is making the
/// call, the mode, and — when validating — the leader's receipt to compare
/// against.
pub struct ExecRequest<'a> {
    pub transaction: &'a Transaction,
    pub contract_state: Option<&'a ContractStateTree>,
    pub validator: &'a Validator,
    pub mode: ExecMode,
    /// Present only for `ExecMode::Validator`: the receipt the committee is
    /// validating agreement against.
    pub leader_receipt: Option<&'a Receipt>,
    /// Read-only view of the committee assembled for this attempt, passed
    /// through so non-deterministic executors can factor in peer identity
    /// (e.g. to select a different LLM fallback) without a second lookup.
    pub validators: ValidatorSnapshot,
}

/// Executes transactions against contract state. `qfx-consensus` depends
/// only on this trait, never on a concrete transport, so the state machine
/// can be exercised with a mock executor in tests.
#[async_trait]
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait Executor: Send + Sync {
    async fn exec_transaction(&self, request: ExecRequest<'_>) -> Result<Receipt, InternalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_validator() -> Validator {
        Validator {
            address: qfx_core::types::Address::new("0xvalidator"),
            private_key: "unused-in-tests".to_string(),
            stake: 0,
            llm_provider: qfx_core::validator::LlmProviderConfig {
                provider: "test".to_string(),
                model: "test-model".to_string(),
                config: serde_json::json!({}),
                plugin_config: serde_json::json!({}),
            },
            fallback: None,
        }
    }

    #[test]
    fn internal_error_display_includes_code() {
        let err = InternalError {
            error_code: "EXEC_TIMEOUT".to_string(),
            causes: vec!["deadline exceeded".to_string()],
            ctx: serde_json::json!({}),
            is_fatal: true,
            is_leader: true,
        };
        assert!(format!("{err}").contains("EXEC_TIMEOUT"));
    }

    #[test]
    fn exec_mode_eq() {
        assert_eq!(ExecMode::Leader, ExecMode::Leader);
        assert_ne!(ExecMode::Leader, ExecMode::Validator);
    }

    #[test]
    fn sample_validator_has_no_fallback() {
        assert!(sample_validator().fallback.is_none());
    }
}
