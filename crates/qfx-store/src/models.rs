use diesel::prelude::*;

use qfx_core::error::QfxError;
use qfx_core::transaction::{
    AppealState, ConsensusData, ConsensusHistoryEntry, ContractSnapshot, ExecutionMode,
    ExecutionResult, Transaction, TransactionStatus, TransactionType, TriggerPoint,
};
use qfx_core::types::{Address, TxHash};

use crate::schema::transactions;

/// Row shape as it comes back from Postgres. Converted to/from the domain
/// `Transaction` at the repository boundary so nothing above this crate
/// depends on diesel types. `QueryableByName` lets the same struct deserialize
/// both ordinary query-builder results and the `RETURNING *` rows from the
/// raw-SQL claim queries.
#[derive(Queryable, QueryableByName, Identifiable, Debug, Clone)]
#[diesel(table_name = transactions, primary_key(hash))]
pub struct TransactionRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub hash: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub nonce: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub created_at: i64,

    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub from_address: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub to_address: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub transaction_type: String,

    #[diesel(sql_type = diesel::sql_types::Binary)]
    pub data: Vec<u8>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub value: String,

    #[diesel(sql_type = diesel::sql_types::Text)]
    pub status: String,

    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub num_of_initial_validators: i32,
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub config_rotation_rounds: i32,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub execution_mode: String,

    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub consensus_data: serde_json::Value,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub consensus_history: serde_json::Value,

    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub appealed: bool,
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub appeal_undetermined: bool,
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub appeal_leader_timeout: bool,
    #[diesel(sql_type = diesel::sql_types::Bool)]
    pub appeal_validators_timeout: bool,
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub appeal_failed: i32,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub timestamp_appeal: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub timestamp_awaiting_finalization: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub appeal_processing_time: i64,

    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Jsonb>)]
    pub contract_snapshot: Option<serde_json::Value>,

    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub triggered_by_hash: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub triggered_transactions: serde_json::Value,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub triggered_on: Option<String>,

    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub blocked_at: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub worker_id: Option<String>,

    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub rotation_count: i32,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub leader_timeout_validators: serde_json::Value,

    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub result: Option<String>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = transactions)]
pub struct NewTransactionRow {
    pub hash: String,
    pub nonce: i64,
    pub created_at: i64,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub transaction_type: String,
    pub data: Vec<u8>,
    pub value: String,
    pub status: String,
    pub num_of_initial_validators: i32,
    pub config_rotation_rounds: i32,
    pub execution_mode: String,
    pub consensus_data: serde_json::Value,
    pub consensus_history: serde_json::Value,
    pub appealed: bool,
    pub appeal_undetermined: bool,
    pub appeal_leader_timeout: bool,
    pub appeal_validators_timeout: bool,
    pub appeal_failed: i32,
    pub timestamp_appeal: Option<i64>,
    pub timestamp_awaiting_finalization: Option<i64>,
    pub appeal_processing_time: i64,
    pub contract_snapshot: Option<serde_json::Value>,
    pub triggered_by_hash: Option<String>,
    pub triggered_transactions: serde_json::Value,
    pub triggered_on: Option<String>,
    pub blocked_at: Option<i64>,
    pub worker_id: Option<String>,
    pub rotation_count: i32,
    pub leader_timeout_validators: serde_json::Value,
    pub result: Option<String>,
}

fn transaction_type_tag(t: TransactionType) -> &'static str {
    match t {
        TransactionType::Send => "SEND",
        TransactionType::DeployContract => "DEPLOY_CONTRACT",
        TransactionType::RunContract => "RUN_CONTRACT",
        TransactionType::UpgradeContract => "UPGRADE_CONTRACT",
    }
}

fn transaction_type_from_tag(tag: &str) -> Result<TransactionType, QfxError> {
    Ok(match tag {
        "SEND" => TransactionType::Send,
        "DEPLOY_CONTRACT" => TransactionType::DeployContract,
        "RUN_CONTRACT" => TransactionType::RunContract,
        "UPGRADE_CONTRACT" => TransactionType::UpgradeContract,
        other => return Err(QfxError::Serialization(format!("unknown transaction_type {other}"))),
    })
}

fn status_tag(s: TransactionStatus) -> &'static str {
    use TransactionStatus::*;
    match s {
        Pending => "PENDING",
        Activated => "ACTIVATED",
        Proposing => "PROPOSING",
        Committing => "COMMITTING",
        Revealing => "REVEALING",
        Accepted => "ACCEPTED",
        Undetermined => "UNDETERMINED",
        LeaderTimeout => "LEADER_TIMEOUT",
        ValidatorsTimeout => "VALIDATORS_TIMEOUT",
        Finalizing => "FINALIZING",
        Finalized => "FINALIZED",
        Canceled => "CANCELED",
    }
}

fn status_from_tag(tag: &str) -> Result<TransactionStatus, QfxError> {
    use TransactionStatus::*;
    Ok(match tag {
        "PENDING" => Pending,
        "ACTIVATED" => Activated,
        "PROPOSING" => Proposing,
        "COMMITTING" => Committing,
        "REVEALING" => Revealing,
        "ACCEPTED" => Accepted,
        "UNDETERMINED" => Undetermined,
        "LEADER_TIMEOUT" => LeaderTimeout,
        "VALIDATORS_TIMEOUT" => ValidatorsTimeout,
        "FINALIZING" => Finalizing,
        "FINALIZED" => Finalized,
        "CANCELED" => Canceled,
        other => return Err(QfxError::Serialization(format!("unknown status {other}"))),
    })
}

fn execution_mode_tag(m: ExecutionMode) -> &'static str {
    match m {
        ExecutionMode::Normal => "NORMAL",
        ExecutionMode::LeaderOnly => "LEADER_ONLY",
        ExecutionMode::LeaderSelfValidator => "LEADER_SELF_VALIDATOR",
    }
}

fn execution_mode_from_tag(tag: &str) -> Result<ExecutionMode, QfxError> {
    Ok(match tag {
        "NORMAL" => ExecutionMode::Normal,
        "LEADER_ONLY" => ExecutionMode::LeaderOnly,
        "LEADER_SELF_VALIDATOR" => ExecutionMode::LeaderSelfValidator,
        other => return Err(QfxError::Serialization(format!("unknown execution_mode {other}"))),
    })
}

fn trigger_point_tag(p: TriggerPoint) -> &'static str {
    match p {
        TriggerPoint::Accepted => "accepted",
        TriggerPoint::Finalized => "finalized",
    }
}

fn trigger_point_from_tag(tag: &str) -> Result<TriggerPoint, QfxError> {
    Ok(match tag {
        "accepted" => TriggerPoint::Accepted,
        "finalized" => TriggerPoint::Finalized,
        other => return Err(QfxError::Serialization(format!("unknown triggered_on {other}"))),
    })
}

impl NewTransactionRow {
    pub fn from_domain(tx: &Transaction) -> Result<Self, QfxError> {
        Ok(Self {
            hash: tx.hash.as_str().to_string(),
            nonce: tx.nonce as i64,
            created_at: tx.created_at,
            from_address: tx.from_address.as_ref().map(|a| a.as_str().to_string()),
            to_address: tx.to_address.as_ref().map(|a| a.as_str().to_string()),
            transaction_type: transaction_type_tag(tx.transaction_type).to_string(),
            data: tx.data.clone(),
            value: tx.value.to_string(),
            status: status_tag(tx.status).to_string(),
            num_of_initial_validators: tx.num_of_initial_validators as i32,
            config_rotation_rounds: tx.config_rotation_rounds as i32,
            execution_mode: execution_mode_tag(tx.execution_mode).to_string(),
            consensus_data: serde_json::to_value(&tx.consensus_data)?,
            consensus_history: serde_json::to_value(&tx.consensus_history)?,
            appealed: tx.appeal.appealed,
            appeal_undetermined: tx.appeal.appeal_undetermined,
            appeal_leader_timeout: tx.appeal.appeal_leader_timeout,
            appeal_validators_timeout: tx.appeal.appeal_validators_timeout,
            appeal_failed: tx.appeal.appeal_failed as i32,
            timestamp_appeal: tx.appeal.timestamp_appeal,
            timestamp_awaiting_finalization: tx.appeal.timestamp_awaiting_finalization,
            appeal_processing_time: tx.appeal.appeal_processing_time,
            contract_snapshot: tx
                .contract_snapshot
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            triggered_by_hash: tx.triggered_by_hash.as_ref().map(|h| h.as_str().to_string()),
            triggered_transactions: serde_json::to_value(
                tx.triggered_transactions
                    .iter()
                    .map(|h| h.as_str().to_string())
                    .collect::<Vec<_>>(),
            )?,
            triggered_on: tx.triggered_on.map(trigger_point_tag).map(str::to_string),
            blocked_at: tx.blocked_at,
            worker_id: tx.worker_id.clone(),
            rotation_count: tx.rotation_count as i32,
            leader_timeout_validators: serde_json::to_value(&tx.leader_timeout_validators)?,
            result: tx.result.map(|r| match r {
                ExecutionResult::Success => "SUCCESS".to_string(),
                ExecutionResult::Error => "ERROR".to_string(),
            }),
        })
    }
}

impl TransactionRow {
    pub fn into_domain(self) -> Result<Transaction, QfxError> {
        let triggered_transactions: Vec<String> =
            serde_json::from_value(self.triggered_transactions)?;
        let leader_timeout_validators: Vec<String> =
            serde_json::from_value(self.leader_timeout_validators)?;
        let consensus_data: ConsensusData = serde_json::from_value(self.consensus_data)?;
        let consensus_history: Vec<ConsensusHistoryEntry> =
            serde_json::from_value(self.consensus_history)?;
        let contract_snapshot: Option<ContractSnapshot> = self
            .contract_snapshot
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Transaction {
            hash: TxHash::new(self.hash),
            nonce: self.nonce as u64,
            created_at: self.created_at,
            from_address: self.from_address.map(Address::new),
            to_address: self.to_address.map(Address::new),
            transaction_type: transaction_type_from_tag(&self.transaction_type)?,
            data: self.data,
            value: self.value.parse().map_err(|_| {
                QfxError::Serialization(format!("invalid decimal value {}", self.value))
            })?,
            status: status_from_tag(&self.status)?,
            num_of_initial_validators: self.num_of_initial_validators as u32,
            config_rotation_rounds: self.config_rotation_rounds as u32,
            execution_mode: execution_mode_from_tag(&self.execution_mode)?,
            consensus_data,
            consensus_history,
            appeal: AppealState {
                appealed: self.appealed,
                appeal_undetermined: self.appeal_undetermined,
                appeal_leader_timeout: self.appeal_leader_timeout,
                appeal_validators_timeout: self.appeal_validators_timeout,
                appeal_failed: self.appeal_failed as u32,
                timestamp_appeal: self.timestamp_appeal,
                timestamp_awaiting_finalization: self.timestamp_awaiting_finalization,
                appeal_processing_time: self.appeal_processing_time,
            },
            contract_snapshot,
            triggered_by_hash: self.triggered_by_hash.map(TxHash::new),
            triggered_transactions: triggered_transactions.into_iter().map(TxHash::new).collect(),
            triggered_on: self.triggered_on.map(|t| trigger_point_from_tag(&t)).transpose()?,
            blocked_at: self.blocked_at,
            worker_id: self.worker_id,
            rotation_count: self.rotation_count as u32,
            leader_timeout_validators,
            result: self.result.map(|r| match r.as_str() {
                "ERROR" => ExecutionResult::Error,
                _ => ExecutionResult::Success,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfx_core::transaction::{ConsensusData, TransactionStatus};
    use std::collections::HashMap;

    fn sample_transaction() -> Transaction {
        Transaction {
            hash: TxHash::new("0xabc"),
            nonce: 3,
            created_at: 1_000,
            from_address: Some(Address::new("0xfrom")),
            to_address: Some(Address::new("0xto")),
            transaction_type: TransactionType::RunContract,
            data: vec![1, 2, 3],
            value: 42,
            status: TransactionStatus::Pending,
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
    fn new_row_round_trips_through_domain_conversion() {
        let tx = sample_transaction();
        let row = NewTransactionRow::from_domain(&tx).unwrap();
        assert_eq!(row.hash, "0xabc");
        assert_eq!(row.status, "PENDING");
        assert_eq!(row.transaction_type, "RUN_CONTRACT");
        assert_eq!(row.value, "42");
    }

    #[test]
    fn row_into_domain_preserves_contract_state_map() {
        let tx = sample_transaction();
        let row = TransactionRow {
            hash: tx.hash.as_str().to_string(),
            nonce: tx.nonce as i64,
            created_at: tx.created_at,
            from_address: tx.from_address.as_ref().map(|a| a.as_str().to_string()),
            to_address: tx.to_address.as_ref().map(|a| a.as_str().to_string()),
            transaction_type: transaction_type_tag(tx.transaction_type).to_string(),
            data: tx.data.clone(),
            value: tx.value.to_string(),
            status: status_tag(tx.status).to_string(),
            num_of_initial_validators: tx.num_of_initial_validators as i32,
            config_rotation_rounds: tx.config_rotation_rounds as i32,
            execution_mode: execution_mode_tag(tx.execution_mode).to_string(),
            consensus_data: serde_json::to_value(&tx.consensus_data).unwrap(),
            consensus_history: serde_json::to_value(&tx.consensus_history).unwrap(),
            appealed: false,
            appeal_undetermined: false,
            appeal_leader_timeout: false,
            appeal_validators_timeout: false,
            appeal_failed: 0,
            timestamp_appeal: None,
            timestamp_awaiting_finalization: None,
            appeal_processing_time: 0,
            contract_snapshot: Some(
                serde_json::to_value(HashMap::from([("slot".to_string(), vec![9u8, 9])])).unwrap(),
            ),
            triggered_by_hash: None,
            triggered_transactions: serde_json::json!([]),
            triggered_on: None,
            blocked_at: None,
            worker_id: None,
            rotation_count: 0,
            leader_timeout_validators: serde_json::json!([]),
            result: None,
        };
        let domain = row.into_domain().unwrap();
        assert_eq!(domain.contract_snapshot.unwrap().get("slot"), Some(&vec![9u8, 9]));
    }
}
