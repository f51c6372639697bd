//! Concrete, Postgres-backed collaborators the consensus engine depends on
//! as trait objects: the validator registry and the native-token ledger.
//! Both are internal to this system (unlike the executor and the rollup
//! bridge, which talk to processes this repo doesn't own), so unlike those
//! two seams this module ships a real implementation rather than leaving
//! the trait unimplemented.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use qfx_consensus::{AccountLedger, LedgerError, ValidatorRegistry};
use qfx_core::types::{Address, Balance};
use qfx_core::validator::{LlmProviderConfig, Validator, ValidatorSnapshot};
use qfx_store::schema::{accounts, validators};
use qfx_store::{DbPool, StoreError};

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = validators, primary_key(address))]
struct ValidatorRow {
    address: String,
    private_key: String,
    stake: String,
    llm_provider: serde_json::Value,
    fallback: Option<serde_json::Value>,
}

impl ValidatorRow {
    fn into_domain(self) -> Result<Validator, serde_json::Error> {
        Ok(Validator {
            address: Address::new(self.address),
            private_key: self.private_key,
            stake: self.stake.parse().unwrap_or(0),
            llm_provider: serde_json::from_value::<LlmProviderConfig>(self.llm_provider)?,
            fallback: self.fallback.map(serde_json::from_value::<Box<Validator>>).transpose()?,
        })
    }
}

/// Reads the full active validator set out of the `validators` table on
/// every call. No caching: a frozen snapshot lives only for the duration
/// of one consensus attempt, and the table is small enough that a fresh
/// read per attempt is cheap relative to an LLM-backed execution round.
#[derive(Clone)]
pub struct DbValidatorRegistry {
    pool: DbPool,
}

impl DbValidatorRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, StoreError>
    {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl ValidatorRegistry for DbValidatorRegistry {
    /// Infallible by trait contract: a transient DB error here degrades to
    /// an empty snapshot (surfaced upstream as `ConsensusError::NoValidators`)
    /// rather than panicking the claim loop over what the worker already
    /// treats as a retryable condition.
    async fn snapshot(&self) -> ValidatorSnapshot {
        let rows: Vec<ValidatorRow> = match self.conn().await {
            Ok(mut conn) => validators::table.load(&mut conn).await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "loading validator set");
                Vec::new()
            }),
            Err(e) => {
                tracing::error!(error = %e, "acquiring connection for validator snapshot");
                Vec::new()
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_domain() {
                Ok(v) => out.push(v),
                Err(e) => tracing::error!(error = %e, "decoding validator row, skipping"),
            }
        }
        Arc::new(out)
    }
}

#[derive(Queryable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = accounts, primary_key(address))]
struct AccountRow {
    address: String,
    balance: String,
}

/// Native-token balances keyed by address. Transfers run inside a single
/// transaction so a crash between debit and credit can never leave the
/// ledger unbalanced.
#[derive(Clone)]
pub struct DbAccountLedger {
    pool: DbPool,
}

impl DbAccountLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, LedgerError>
    {
        self.pool.get().await.map_err(|e| LedgerError::Other(e.to_string()))
    }

    async fn read_balance(
        conn: &mut AsyncPgConnection,
        address: &Address,
    ) -> Result<Balance, LedgerError> {
        let row: Option<AccountRow> = accounts::table
            .find(address.as_str())
            .first(conn)
            .await
            .optional()
            .map_err(|e| LedgerError::Other(e.to_string()))?;
        Ok(row.map(|r| r.balance.parse().unwrap_or(0)).unwrap_or(0))
    }
}

#[async_trait]
impl AccountLedger for DbAccountLedger {
    async fn balance_of(&self, address: &Address) -> Result<Balance, LedgerError> {
        let mut conn = self.conn().await?;
        Self::read_balance(&mut conn, address).await
    }

    async fn transfer(&self, from: &Address, to: &Address, amount: Balance) -> Result<(), LedgerError> {
        let mut conn = self.conn().await?;
        let from = from.clone();
        let to = to.clone();
        let observed_balance = Arc::new(std::sync::Mutex::new(0u128));
        let observed_balance_in_closure = Arc::clone(&observed_balance);
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            Box::pin(async move {
                let have = Self::read_balance(conn, &from).await.map_err(|e| {
                    diesel::result::Error::QueryBuilderError(e.to_string().into())
                })?;
                *observed_balance_in_closure.lock().unwrap() = have;
                if have < amount {
                    // Signalled back out via a sentinel error code the
                    // caller below translates to `LedgerError::Insufficient`.
                    return Err(diesel::result::Error::RollbackTransaction);
                }
                let new_from_balance = have - amount;
                diesel::insert_into(accounts::table)
                    .values(AccountRow { address: from.as_str().to_string(), balance: new_from_balance.to_string() })
                    .on_conflict(accounts::address)
                    .do_update()
                    .set(accounts::balance.eq(new_from_balance.to_string()))
                    .execute(conn)
                    .await?;

                let to_have = Self::read_balance(conn, &to).await.map_err(|e| {
                    diesel::result::Error::QueryBuilderError(e.to_string().into())
                })?;
                let new_to_balance = to_have + amount;
                diesel::insert_into(accounts::table)
                    .values(AccountRow { address: to.as_str().to_string(), balance: new_to_balance.to_string() })
                    .on_conflict(accounts::address)
                    .do_update()
                    .set(accounts::balance.eq(new_to_balance.to_string()))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            diesel::result::Error::RollbackTransaction => {
                LedgerError::Insufficient { need: amount, have: *observed_balance.lock().unwrap() }
            }
            other => LedgerError::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> ValidatorRow {
        ValidatorRow {
            address: "0xvalidator".to_string(),
            private_key: "unused-in-tests".to_string(),
            stake: "500".to_string(),
            llm_provider: serde_json::json!({
                "provider": "openai",
                "model": "gpt-4",
                "config": {},
                "plugin_config": {},
            }),
            fallback: None,
        }
    }

    #[test]
    fn validator_row_round_trips_into_domain() {
        let validator = sample_row().into_domain().unwrap();
        assert_eq!(validator.address.as_str(), "0xvalidator");
        assert_eq!(validator.stake, 500);
        assert_eq!(validator.llm_provider.model, "gpt-4");
        assert!(validator.fallback.is_none());
    }

    #[test]
    fn validator_row_with_unparseable_stake_defaults_to_zero() {
        let mut row = sample_row();
        row.stake = "not-a-number".to_string();
        let validator = row.into_domain().unwrap();
        assert_eq!(validator.stake, 0);
    }

    #[test]
    fn validator_row_rejects_malformed_llm_provider() {
        let mut row = sample_row();
        row.llm_provider = serde_json::json!({"unexpected": true});
        assert!(row.into_domain().is_err());
    }
}
