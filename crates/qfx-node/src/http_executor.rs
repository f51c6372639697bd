//! HTTP transport to the external executor process (the "Node"/GenVM
//! runner). Mirrors how the reference system's worker talks to its GenVM
//! manager over a plain JSON HTTP endpoint rather than embedding the VM
//! in-process. The wire shape here is this repo's own — the LLM provider
//! protocol and the on-chain contract ABI are owned by the executor side,
//! not by this client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qfx_core::transaction::{ContractStateTree, Receipt, Transaction};
use qfx_core::validator::Validator;
use qfx_executor::{ExecMode, ExecRequest, Executor, InternalError};

#[derive(Serialize)]
struct ExecWireRequest<'a> {
    transaction: &'a Transaction,
    contract_state: Option<&'a ContractStateTree>,
    validator: &'a Validator,
    mode: ExecMode,
    leader_receipt: Option<&'a Receipt>,
    validators: &'a [Validator],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExecWireResponse {
    Ok(Receipt),
    Err(InternalError),
}

/// Calls `POST {base_url}/exec` with the full request context and expects
/// either a `Receipt` or an `InternalError` back. Connection errors and
/// non-2xx responses are reported as fatal — there is no recovering from a
/// dead executor process mid-round beyond retrying the whole attempt.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("building reqwest client");
        Self { client, base_url: base_url.into() }
    }

    fn transport_error(is_leader: bool, detail: String) -> InternalError {
        InternalError {
            error_code: "EXECUTOR_TRANSPORT".to_string(),
            causes: vec![detail],
            ctx: serde_json::json!({}),
            is_fatal: true,
            is_leader,
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn exec_transaction(&self, request: ExecRequest<'_>) -> Result<Receipt, InternalError> {
        let is_leader = request.mode == ExecMode::Leader;
        let wire = ExecWireRequest {
            transaction: request.transaction,
            contract_state: request.contract_state,
            validator: request.validator,
            mode: request.mode,
            leader_receipt: request.leader_receipt,
            validators: request.validators.as_slice(),
        };

        let resp = self
            .client
            .post(format!("{}/exec", self.base_url))
            .json(&wire)
            .send()
            .await
            .map_err(|e| Self::transport_error(is_leader, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::transport_error(is_leader, format!("http status {}", resp.status())));
        }

        match resp
            .json::<ExecWireResponse>()
            .await
            .map_err(|e| Self::transport_error(is_leader, format!("decoding response: {e}")))?
        {
            ExecWireResponse::Ok(receipt) => Ok(receipt),
            ExecWireResponse::Err(err) => Err(err),
        }
    }
}

