pub mod constants;
pub mod error;
pub mod transaction;
pub mod types;
pub mod validator;

pub use constants::*;
pub use error::QfxError;
pub use transaction::*;
pub use types::*;
pub use validator::{LlmProviderConfig, Validator, ValidatorSnapshot};
