use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use qfx_core::transaction::ContractStateTree;
use qfx_core::types::Address;

use crate::error::StoreError;
use crate::repository::DbPool;
use crate::schema::contract_states;

#[derive(Queryable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = contract_states, primary_key(to_address))]
struct ContractStateRow {
    to_address: String,
    accepted: serde_json::Value,
    finalized: serde_json::Value,
}

/// Per-contract state: the `accepted` tree (latest acceptance) and the
/// `finalized` tree (post finality-window). Registration and every
/// sub-tree overwrite goes through this store.
#[derive(Clone)]
pub struct ContractStore {
    pool: DbPool,
}

impl ContractStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, StoreError>
    {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }

    /// Register a brand-new contract. Duplicate registration (an address
    /// already on file) is swallowed as a no-op, matching the source's
    /// warning-only handling of a repeated `DEPLOY_CONTRACT`.
    pub async fn register(
        &self,
        address: &Address,
        accepted: &ContractStateTree,
        finalized: &ContractStateTree,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let row = ContractStateRow {
            to_address: address.as_str().to_string(),
            accepted: serde_json::to_value(accepted)?,
            finalized: serde_json::to_value(finalized)?,
        };
        diesel::insert_into(contract_states::table)
            .values(&row)
            .on_conflict(contract_states::to_address)
            .do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get_accepted(
        &self,
        address: &Address,
    ) -> Result<Option<ContractStateTree>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<ContractStateRow> = contract_states::table
            .find(address.as_str())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(|r| serde_json::from_value(r.accepted))
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn get_finalized(
        &self,
        address: &Address,
    ) -> Result<Option<ContractStateTree>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<ContractStateRow> = contract_states::table
            .find(address.as_str())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(|r| serde_json::from_value(r.finalized))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Overwrite the `accepted` sub-tree. Used by the `Accepted` handler and
    /// by validator-appeal rollback (restoring a prior snapshot).
    pub async fn set_accepted(
        &self,
        address: &Address,
        accepted: &ContractStateTree,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::update(contract_states::table.find(address.as_str()))
            .set(contract_states::accepted.eq(serde_json::to_value(accepted)?))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Promote `accepted` to `finalized`, used by the `Finalizing` handler.
    pub async fn promote_to_finalized(&self, address: &Address) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let row: ContractStateRow = contract_states::table
            .find(address.as_str())
            .first(&mut conn)
            .await?;
        diesel::update(contract_states::table.find(address.as_str()))
            .set(contract_states::finalized.eq(row.accepted))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
