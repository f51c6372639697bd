use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use qfx_core::transaction::{ConsensusHistoryEntry, ConsensusRound, Receipt, Transaction};
use qfx_core::types::{Address, TxHash};

use crate::error::StoreError;
use crate::models::{NewTransactionRow, TransactionRow};
use crate::schema::transactions;

pub type DbPool = Pool<AsyncPgConnection>;

/// Which priority class a claim draws from. The worker issues all three in
/// order every poll cycle: appeals first, then finalization-ready rows,
/// then ordinary pending work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimClass {
    Appeal,
    Finalization,
    Pending,
}

impl ClaimClass {
    /// Extra `WHERE` predicate appended to the shared claim template,
    /// selecting which rows are eligible for this priority class.
    fn predicate(self) -> &'static str {
        match self {
            ClaimClass::Appeal => {
                "(appealed OR appeal_undetermined OR appeal_leader_timeout OR appeal_validators_timeout)"
            }
            ClaimClass::Finalization => {
                "status IN ('ACCEPTED', 'UNDETERMINED', 'LEADER_TIMEOUT', 'VALIDATORS_TIMEOUT') \
                 AND NOT (appealed OR appeal_undetermined OR appeal_leader_timeout OR appeal_validators_timeout) \
                 AND timestamp_awaiting_finalization IS NOT NULL"
            }
            ClaimClass::Pending => "status = 'PENDING'",
        }
    }
}

/// Thin wrapper around a connection pool implementing every DB operation
/// the consensus core needs. Mirrors the one-struct-many-methods shape of
/// a key/row store: no query builder state leaks past this module.
#[derive(Clone)]
pub struct TransactionStore {
    pool: DbPool,
}

impl TransactionStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, StoreError>
    {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }

    // ── Claim / lease ────────────────────────────────────────────────────────

    /// Atomically claim one eligible row: oldest row per contract, then
    /// globally oldest among those, skipping rows already leased or whose
    /// contract has another row currently leased. Sets `blocked_at`/
    /// `worker_id` and returns the claimed row, or `None` if nothing is
    /// eligible.
    pub async fn claim_next(
        &self,
        class: ClaimClass,
        worker_id: &str,
        now: i64,
        lease_window_secs: i64,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.conn().await?;
        let sql = format!(
            "WITH oldest_per_contract AS ( \
                SELECT hash, row_number() OVER ( \
                    PARTITION BY to_address ORDER BY created_at ASC \
                ) AS rn \
                FROM transactions \
                WHERE {predicate} \
                  AND (blocked_at IS NULL OR blocked_at < $1) \
                  AND (to_address IS NULL OR to_address NOT IN ( \
                      SELECT to_address FROM transactions \
                      WHERE to_address IS NOT NULL \
                        AND blocked_at IS NOT NULL \
                        AND blocked_at >= $1 \
                  )) \
            ), \
            candidate AS ( \
                SELECT t.hash FROM transactions t \
                JOIN oldest_per_contract o ON o.hash = t.hash AND o.rn = 1 \
                ORDER BY t.created_at ASC \
                LIMIT 1 \
                FOR UPDATE OF t SKIP LOCKED \
            ) \
            UPDATE transactions SET blocked_at = $2, worker_id = $3 \
            WHERE hash IN (SELECT hash FROM candidate) \
            RETURNING *",
            predicate = class.predicate(),
        );

        let lease_floor = now - lease_window_secs;
        let row: Option<TransactionRow> = diesel::sql_query(sql)
            .bind::<BigInt, _>(lease_floor)
            .bind::<BigInt, _>(now)
            .bind::<Text, _>(worker_id)
            .get_result(&mut conn)
            .await
            .optional()?;

        row.map(|r| r.into_domain()).transpose().map_err(|e| StoreError::Pool(e.to_string()))
    }

    /// Release a row's lease without changing its status (used on a
    /// transient error or a no-validators backoff).
    pub async fn release_lease(&self, hash: &TxHash) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::update(transactions::table.find(hash.as_str()))
            .set((
                transactions::blocked_at.eq(None::<i64>),
                transactions::worker_id.eq(None::<String>),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Reset an orphaned row back to `PENDING`, clearing its consensus
    /// working set and lease. Used by the orphan-recovery sweep for rows
    /// whose lease expired, or that sit mid-flight with no lease at all.
    pub async fn reset_orphan(&self, hash: &TxHash) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::update(transactions::table.find(hash.as_str()))
            .set((
                transactions::blocked_at.eq(None::<i64>),
                transactions::worker_id.eq(None::<String>),
                transactions::status.eq("PENDING"),
                transactions::consensus_data.eq(serde_json::json!({
                    "votes": {}, "leader_receipt": [], "validators": []
                })),
                transactions::consensus_history.eq(serde_json::json!([])),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn find_orphans(
        &self,
        now: i64,
        lease_window_secs: i64,
    ) -> Result<Vec<TxHash>, StoreError> {
        #[derive(QueryableByName)]
        struct HashOnly {
            #[diesel(sql_type = Text)]
            hash: String,
        }

        let mut conn = self.conn().await?;
        let lease_floor = now - lease_window_secs;
        let rows: Vec<HashOnly> = diesel::sql_query(
            "SELECT hash FROM transactions \
             WHERE (blocked_at IS NOT NULL AND blocked_at < $1) \
                OR (blocked_at IS NULL AND status IN ('PROPOSING', 'COMMITTING', 'REVEALING'))",
        )
        .bind::<BigInt, _>(lease_floor)
        .get_results(&mut conn)
        .await?;
        Ok(rows.into_iter().map(|r| TxHash::new(r.hash)).collect())
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    pub async fn get_transaction_by_hash(
        &self,
        hash: &TxHash,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<TransactionRow> = transactions::table
            .find(hash.as_str())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(|r| r.into_domain()).transpose().map_err(|e| StoreError::Pool(e.to_string()))
    }

    /// Most recent transaction on `to_address` created strictly before
    /// `before_created_at`. When `finalized_only` is set, only rows already
    /// `FINALIZED` are considered (used by the finalization worker's
    /// per-contract ordering check).
    pub async fn get_previous_transaction(
        &self,
        to_address: &Address,
        before_created_at: i64,
        finalized_only: bool,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.conn().await?;
        let mut query = transactions::table
            .filter(transactions::to_address.eq(to_address.as_str()))
            .filter(transactions::created_at.lt(before_created_at))
            .into_boxed();
        if finalized_only {
            query = query.filter(transactions::status.eq("FINALIZED"));
        }
        let row: Option<TransactionRow> = query
            .order(transactions::created_at.desc())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(|r| r.into_domain()).transpose().map_err(|e| StoreError::Pool(e.to_string()))
    }

    /// All transactions on `to_address` created strictly after `after_created_at`,
    /// oldest first. Used for the validator-appeal rollback sweep.
    pub async fn get_newer_transactions(
        &self,
        to_address: &Address,
        after_created_at: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<TransactionRow> = transactions::table
            .filter(transactions::to_address.eq(to_address.as_str()))
            .filter(transactions::created_at.gt(after_created_at))
            .order(transactions::created_at.asc())
            .load(&mut conn)
            .await?;
        rows.into_iter()
            .map(|r| r.into_domain())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Pool(e.to_string()))
    }

    pub async fn get_transaction_count(&self, address: &Address) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let count = transactions::table
            .filter(
                transactions::from_address
                    .eq(address.as_str())
                    .or(transactions::to_address.eq(address.as_str())),
            )
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }

    // ── Writers ──────────────────────────────────────────────────────────────

    pub async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let row = NewTransactionRow::from_domain(tx).map_err(|e| StoreError::Pool(e.to_string()))?;
        // Duplicate child-transaction hashes are a silent no-op, not an error.
        diesel::insert_into(transactions::table)
            .values(&row)
            .on_conflict(transactions::hash)
            .do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Full-row upsert. Every state-handler effect that mutates a
    /// transaction goes through this single writer so each transition is
    /// committed atomically.
    pub async fn save_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let row = NewTransactionRow::from_domain(tx).map_err(|e| StoreError::Pool(e.to_string()))?;
        diesel::insert_into(transactions::table)
            .values(&row)
            .on_conflict(transactions::hash)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Append one entry to `consensus_history`, stripping `contract_state`
    /// from every receipt first so history rows stay small and never leak a
    /// state snapshot through the history surface.
    pub async fn update_consensus_history(
        &self,
        hash: &TxHash,
        round: ConsensusRound,
        leader_result: Option<Receipt>,
        validator_results: Vec<Receipt>,
        extra_status_change: Option<String>,
        recorded_at: i64,
    ) -> Result<(), StoreError> {
        let strip = |mut r: Receipt| {
            r.contract_state = None;
            r
        };
        let entry = ConsensusHistoryEntry {
            round,
            leader_result: leader_result.map(strip),
            validator_results: validator_results.into_iter().map(strip).collect(),
            recorded_at,
            extra_status_change,
        };

        let mut conn = self.conn().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            Box::pin(async move {
                let current: TransactionRow = transactions::table
                    .find(hash.as_str())
                    .first(conn)
                    .await?;
                let mut history: Vec<ConsensusHistoryEntry> =
                    serde_json::from_value(current.consensus_history).unwrap_or_default();
                history.push(entry);
                let value = serde_json::to_value(&history)
                    .expect("ConsensusHistoryEntry always serializes");
                diesel::update(transactions::table.find(hash.as_str()))
                    .set(transactions::consensus_history.eq(value))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await?;
        Ok(())
    }

    // ── No-validators backoff bookkeeping ────────────────────────────────────

    pub async fn get_no_validators_backoff(
        &self,
        hash: &TxHash,
    ) -> Result<Option<(i32, i64)>, StoreError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = diesel::sql_types::Integer)]
            count: i32,
            #[diesel(sql_type = BigInt)]
            last_attempt: i64,
        }

        let mut conn = self.conn().await?;
        let row: Option<Row> = diesel::sql_query(
            "SELECT count, last_attempt FROM no_validator_backoffs WHERE transaction_hash = $1",
        )
        .bind::<Text, _>(hash.as_str())
        .get_result(&mut conn)
        .await
        .optional()?;
        Ok(row.map(|r| (r.count, r.last_attempt)))
    }

    pub async fn record_no_validators_attempt(
        &self,
        hash: &TxHash,
        now: i64,
    ) -> Result<i32, StoreError> {
        #[derive(QueryableByName)]
        struct Row {
            #[diesel(sql_type = diesel::sql_types::Integer)]
            count: i32,
        }

        let mut conn = self.conn().await?;
        let row: Row = diesel::sql_query(
            "INSERT INTO no_validator_backoffs (transaction_hash, count, last_attempt) \
             VALUES ($1, 1, $2) \
             ON CONFLICT (transaction_hash) DO UPDATE \
             SET count = no_validator_backoffs.count + 1, last_attempt = $2 \
             RETURNING count",
        )
        .bind::<Text, _>(hash.as_str())
        .bind::<BigInt, _>(now)
        .get_result(&mut conn)
        .await?;
        Ok(row.count)
    }

    pub async fn clear_no_validators_backoff(&self, hash: &TxHash) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::sql_query("DELETE FROM no_validator_backoffs WHERE transaction_hash = $1")
            .bind::<Text, _>(hash.as_str())
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
