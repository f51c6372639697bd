use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHANNEL_CONSENSUS: &str = "consensus:events";
pub const CHANNEL_TRANSACTION: &str = "transaction:events";
pub const CHANNEL_GENERAL: &str = "general:events";

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wire shape for every message published on the bus. `transaction_hash` is
/// omitted for events that aren't about a specific transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BusMessage {
    pub worker_id: String,
    pub event: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

/// Publishes structured events on the three channels workers write to.
/// Delivery is best-effort — redis pub/sub drops messages with no
/// subscriber listening, and subscribers must already tolerate duplicates,
/// so publish failures here are logged, not retried.
#[derive(Clone)]
pub struct EventBus {
    conn: ConnectionManager,
    worker_id: String,
}

impl EventBus {
    pub async fn connect(redis_url: &str, worker_id: impl Into<String>) -> Result<Self, EventBusError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, worker_id: worker_id.into() })
    }

    async fn publish(
        &self,
        channel: &str,
        event: &str,
        data: serde_json::Value,
        transaction_hash: Option<String>,
    ) -> Result<(), EventBusError> {
        let msg = BusMessage {
            worker_id: self.worker_id.clone(),
            event: event.to_string(),
            data,
            transaction_hash,
        };
        let payload = serde_json::to_string(&msg)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    pub async fn publish_consensus_event(
        &self,
        event: &str,
        data: serde_json::Value,
        transaction_hash: Option<String>,
    ) -> Result<(), EventBusError> {
        self.publish(CHANNEL_CONSENSUS, event, data, transaction_hash).await
    }

    pub async fn publish_transaction_event(
        &self,
        event: &str,
        data: serde_json::Value,
        transaction_hash: String,
    ) -> Result<(), EventBusError> {
        self.publish(CHANNEL_TRANSACTION, event, data, Some(transaction_hash)).await
    }

    pub async fn publish_general_event(
        &self,
        event: &str,
        data: serde_json::Value,
    ) -> Result<(), EventBusError> {
        self.publish(CHANNEL_GENERAL, event, data, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_message_omits_absent_transaction_hash() {
        let msg = BusMessage {
            worker_id: "w1".to_string(),
            event: "emitTransactionAccepted".to_string(),
            data: serde_json::json!({}),
            transaction_hash: None,
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(!encoded.contains("transaction_hash"));
    }
}
