use qfx_core::transaction::Receipt;
use qfx_core::validator::Validator;

/// Bound on calldata bytes echoed in an event/history payload before it's
/// replaced with a length marker.
const MAX_INLINE_CALLDATA_BYTES: usize = 256;

/// Redact a validator before it can reach the event bus or a history entry:
/// strip the private key and the LLM provider's `config`/`plugin_config`
/// blobs, which may carry API keys.
pub fn redact_validator(validator: &Validator) -> serde_json::Value {
    serde_json::json!({
        "address": validator.address.as_str(),
        "stake": validator.stake,
        "llm_provider": {
            "provider": validator.llm_provider.provider,
            "model": validator.llm_provider.model,
        },
    })
}

/// Redact a receipt for publication: drop `contract_state` (already
/// stripped separately before history append) and any oversized payload in
/// `result`.
pub fn redact_receipt(receipt: &Receipt) -> serde_json::Value {
    let result_summary = if receipt.result.len() > MAX_INLINE_CALLDATA_BYTES {
        serde_json::json!({ "truncated_bytes": receipt.result.len() })
    } else {
        serde_json::json!(hex::encode(&receipt.result))
    };
    serde_json::json!({
        "result": result_summary,
        "execution_result": format!("{:?}", receipt.execution_result),
        "vote": format!("{:?}", receipt.vote),
        "node_config": receipt.node_config,
    })
}

/// Truncate opaque calldata/contract code for inline logging; never used
/// for anything persisted as canonical state.
pub fn redact_calldata(data: &[u8]) -> String {
    if data.len() > MAX_INLINE_CALLDATA_BYTES {
        format!("<{} bytes>", data.len())
    } else {
        hex::encode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{ExecutionResult, Vote};
    use qfx_core::types::Address;
    use qfx_core::validator::LlmProviderConfig;

    fn sample_validator() -> Validator {
        Validator {
            address: Address::new("0xv1"),
            private_key: "super-secret".to_string(),
            stake: 100,
            llm_provider: LlmProviderConfig {
                provider: "openai".to_string(),
                model: "gpt".to_string(),
                config: serde_json::json!({"api_key": "sk-secret"}),
                plugin_config: serde_json::json!({}),
            },
            fallback: None,
        }
    }

    #[test]
    fn redact_validator_drops_private_key_and_provider_config() {
        let json = redact_validator(&sample_validator()).to_string();
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn redact_calldata_truncates_large_payloads() {
        let big = vec![0u8; MAX_INLINE_CALLDATA_BYTES + 1];
        assert!(redact_calldata(&big).starts_with('<'));
    }

    #[test]
    fn redact_receipt_truncates_large_results() {
        let receipt = Receipt {
            result: vec![0u8; MAX_INLINE_CALLDATA_BYTES + 10],
            execution_result: ExecutionResult::Success,
            vote: Vote::Agree,
            node_config: "0xv1".to_string(),
            pending_transactions: vec![],
            contract_state: None,
            genvm_result: serde_json::json!({}),
        };
        let json = redact_receipt(&receipt);
        assert!(json["result"]["truncated_bytes"].is_number());
    }
}
