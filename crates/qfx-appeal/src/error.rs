use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppealError {
    #[error(transparent)]
    Store(#[from] qfx_store::StoreError),
}
