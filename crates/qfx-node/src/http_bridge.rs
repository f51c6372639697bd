//! HTTP transport to the rollup/chain submission service. Each consensus
//! event becomes one `POST {base_url}/{method}` call named after the wire
//! method the rollup side exposes (`emitTransactionAccepted`, and so on).

use async_trait::async_trait;
use serde::Serialize;

use qfx_core::types::Address;
use qfx_rollup::{ChildTransactionIds, RollupBridge, RollupBridgeError, RollupEventName};

#[derive(Serialize)]
struct EmitWireRequest<'a> {
    account: &'a str,
    tx_hash: &'a str,
    extras: serde_json::Value,
}

pub struct HttpRollupBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRollupBridge {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl RollupBridge for HttpRollupBridge {
    async fn emit_transaction_event(
        &self,
        name: RollupEventName,
        account: &Address,
        tx_hash: &str,
        extras: serde_json::Value,
    ) -> Result<ChildTransactionIds, RollupBridgeError> {
        let wire = EmitWireRequest { account: account.as_str(), tx_hash, extras };
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, name.method_name()))
            .json(&wire)
            .send()
            .await
            .map_err(|e| RollupBridgeError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RollupBridgeError::Transport(format!("http status {}", resp.status())));
        }

        resp.json::<ChildTransactionIds>()
            .await
            .map_err(|e| RollupBridgeError::Malformed(e.to_string()))
    }
}
