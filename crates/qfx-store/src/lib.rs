pub mod contract_store;
pub mod error;
pub mod models;
pub mod repository;
pub mod schema;

pub use contract_store::ContractStore;
pub use error::StoreError;
pub use repository::{ClaimClass, DbPool, TransactionStore};
