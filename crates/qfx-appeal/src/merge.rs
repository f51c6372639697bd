use qfx_core::transaction::Receipt;

/// Merge prior and newly-collected validator receipts on a successful
/// appeal in `Revealing`. The keep-window over `prior` narrows as
/// `appeal_failed` grows, since later appeals draw a larger committee and
/// the oldest receipts carry proportionally less weight.
pub fn merge_validator_receipts(appeal_failed: u32, prior: Vec<Receipt>, new: Vec<Receipt>) -> Vec<Receipt> {
    match appeal_failed {
        0 => {
            let mut merged = prior;
            merged.extend(new);
            merged
        }
        1 => {
            let half = prior.len() / 2;
            let mut merged: Vec<Receipt> = prior.into_iter().take(half).collect();
            merged.extend(new);
            merged
        }
        _ => {
            let keep = new.len().saturating_sub(prior.len() + 1).saturating_sub(1);
            let mut merged: Vec<Receipt> = prior.into_iter().take(keep).collect();
            merged.extend(new);
            merged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{ExecutionResult, Vote};

    fn receipt(tag: &str) -> Receipt {
        Receipt {
            result: vec![1],
            execution_result: ExecutionResult::Success,
            vote: Vote::Agree,
            node_config: tag.to_string(),
            pending_transactions: vec![],
            contract_state: None,
            genvm_result: serde_json::json!({}),
        }
    }

    #[test]
    fn zero_failures_appends_new_after_prior() {
        let prior = vec![receipt("a"), receipt("b")];
        let new = vec![receipt("c")];
        let merged = merge_validator_receipts(0, prior, new);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].node_config, "c");
    }

    #[test]
    fn one_failure_keeps_first_half_of_prior() {
        let prior = vec![receipt("a"), receipt("b"), receipt("c"), receipt("d")];
        let new = vec![receipt("e")];
        let merged = merge_validator_receipts(1, prior, new);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].node_config, "a");
        assert_eq!(merged[1].node_config, "b");
    }

    #[test]
    fn merge_preserves_all_new_receipts() {
        let prior = vec![receipt("a"); 5];
        let new = vec![receipt("n1"), receipt("n2")];
        let merged = merge_validator_receipts(2, prior, new.clone());
        assert!(merged.iter().filter(|r| r.node_config.starts_with('n')).count() == new.len());
    }
}
