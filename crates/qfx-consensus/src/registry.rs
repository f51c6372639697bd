use async_trait::async_trait;

use qfx_core::validator::ValidatorSnapshot;

/// The validator registry lives outside this crate: consensus only ever
/// needs one frozen snapshot per transaction attempt.
#[async_trait]
pub trait ValidatorRegistry: Send + Sync {
    async fn snapshot(&self) -> ValidatorSnapshot;
}
