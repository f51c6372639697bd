use qfx_core::transaction::{PendingTransaction, Transaction, TransactionStatus, TransactionType, TriggerPoint};
use qfx_core::types::{Address, TxHash};
use qfx_crypto::{deterministic_child_address, random_child_address};

/// Build the unsaved child `Transaction` rows for one trigger point
/// (`accepted` or `finalized`) of a parent's receipt. The caller still has
/// to ask the rollup bridge for the batch of hashes and assign them before
/// inserting — this only resolves addresses and cascades configuration.
pub fn build_children(
    parent: &Transaction,
    pending: &[PendingTransaction],
    on: TriggerPoint,
    next_nonce: &mut u64,
    assigned_hashes: &[TxHash],
) -> Vec<Transaction> {
    pending
        .iter()
        .filter(|p| p.on == on)
        .zip(assigned_hashes.iter())
        .map(|(p, hash)| build_child(parent, p, hash.clone(), next_nonce))
        .collect()
}

fn build_child(
    parent: &Transaction,
    pending: &PendingTransaction,
    hash: TxHash,
    next_nonce: &mut u64,
) -> Transaction {
    let nonce = *next_nonce;
    *next_nonce += 1;

    let to_address = resolve_child_address(parent, pending);

    Transaction {
        hash,
        nonce,
        created_at: parent.created_at,
        from_address: parent.to_address.clone(),
        to_address,
        transaction_type: pending.transaction_type,
        data: pending.data.clone(),
        value: pending.value,
        status: TransactionStatus::Pending,
        num_of_initial_validators: parent.num_of_initial_validators,
        config_rotation_rounds: parent.config_rotation_rounds,
        execution_mode: parent.execution_mode,
        consensus_data: Default::default(),
        consensus_history: vec![],
        appeal: Default::default(),
        contract_snapshot: None,
        triggered_by_hash: Some(parent.hash.clone()),
        triggered_transactions: vec![],
        triggered_on: Some(pending.on),
        blocked_at: None,
        worker_id: None,
        rotation_count: 0,
        leader_timeout_validators: vec![],
        result: None,
    }
}

fn resolve_child_address(parent: &Transaction, pending: &PendingTransaction) -> Option<Address> {
    match pending.transaction_type {
        TransactionType::DeployContract => {
            let parent_addr = parent.to_address.clone().unwrap_or_else(|| Address::new(""));
            match pending.salt_nonce {
                Some(0) | None => Some(random_child_address()),
                Some(salt) => Some(deterministic_child_address(&parent_addr, salt, chain_id())),
            }
        }
        _ => pending.to_address.clone(),
    }
}

/// Chain id folded into the deterministic address preimage. Single-chain
/// deployment for now; becomes a parameter if multi-chain support lands.
fn chain_id() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{AppealState, ConsensusData, ExecutionMode};

    fn sample_parent() -> Transaction {
        Transaction {
            hash: TxHash::new("0xparenthash"),
            nonce: 0,
            created_at: 1,
            from_address: None,
            to_address: Some(Address::new("0xcontract")),
            transaction_type: TransactionType::RunContract,
            data: vec![],
            value: 0,
            status: TransactionStatus::Accepted,
            num_of_initial_validators: 5,
            config_rotation_rounds: 2,
            execution_mode: ExecutionMode::Normal,
            consensus_data: ConsensusData::default(),
            consensus_history: vec![],
            appeal: AppealState::default(),
            contract_snapshot: None,
            triggered_by_hash: None,
            triggered_transactions: vec![],
            triggered_on: None,
            blocked_at: None,
            worker_id: None,
            rotation_count: 0,
            leader_timeout_validators: vec![],
            result: None,
        }
    }

    #[test]
    fn deploy_with_zero_salt_gets_a_random_address() {
        let parent = sample_parent();
        let pending = PendingTransaction {
            on: TriggerPoint::Accepted,
            transaction_type: TransactionType::DeployContract,
            to_address: None,
            data: vec![],
            value: 0,
            salt_nonce: Some(0),
        };
        let mut nonce = 7;
        let children = build_children(
            &parent,
            &[pending],
            TriggerPoint::Accepted,
            &mut nonce,
            &[TxHash::new("0xchild1")],
        );
        assert_eq!(children.len(), 1);
        assert!(children[0].to_address.is_some());
        assert_eq!(children[0].nonce, 7);
        assert_eq!(nonce, 8);
    }

    #[test]
    fn deploy_with_nonzero_salt_is_deterministic() {
        let parent = sample_parent();
        let pending = PendingTransaction {
            on: TriggerPoint::Accepted,
            transaction_type: TransactionType::DeployContract,
            to_address: None,
            data: vec![],
            value: 0,
            salt_nonce: Some(5),
        };
        let mut nonce = 0;
        let a = build_children(&parent, &[pending.clone()], TriggerPoint::Accepted, &mut nonce, &[TxHash::new("0xc")]);
        let mut nonce2 = 0;
        let b = build_children(&parent, &[pending], TriggerPoint::Accepted, &mut nonce2, &[TxHash::new("0xc")]);
        assert_eq!(a[0].to_address, b[0].to_address);
    }

    #[test]
    fn only_children_matching_trigger_point_are_built() {
        let parent = sample_parent();
        let pending = vec![
            PendingTransaction {
                on: TriggerPoint::Accepted,
                transaction_type: TransactionType::RunContract,
                to_address: Some(Address::new("0xa")),
                data: vec![],
                value: 1,
                salt_nonce: None,
            },
            PendingTransaction {
                on: TriggerPoint::Finalized,
                transaction_type: TransactionType::RunContract,
                to_address: Some(Address::new("0xb")),
                data: vec![],
                value: 1,
                salt_nonce: None,
            },
        ];
        let mut nonce = 0;
        let children = build_children(
            &parent,
            &pending,
            TriggerPoint::Accepted,
            &mut nonce,
            &[TxHash::new("0xonly")],
        );
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].to_address, Some(Address::new("0xa")));
    }
}
