use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance};

/// Immutable validator identity drawn from a registry. `private_key`
/// and `llm_provider` carry sensitive fields — redaction before publishing
/// any `Validator` on the event bus or in history is the caller's
/// responsibility (see `qfx_rollup::redaction`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub private_key: String,
    pub stake: Balance,
    pub llm_provider: LlmProviderConfig,
    pub fallback: Option<Box<Validator>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub provider: String,
    pub model: String,
    /// Provider-specific configuration blob (API keys, endpoints). Redacted
    /// before ever leaving the process.
    pub config: serde_json::Value,
    pub plugin_config: serde_json::Value,
}

/// A frozen list of validators shared read-only across tasks for one
/// transaction attempt. Never mutated in place; a new attempt acquires a
/// fresh snapshot.
pub type ValidatorSnapshot = Arc<Vec<Validator>>;

pub fn empty_snapshot() -> ValidatorSnapshot {
    Arc::new(Vec::new())
}
