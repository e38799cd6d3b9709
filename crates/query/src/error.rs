use thiserror::Error;

/// Errors from the read side. Missing or foreign orders are not errors
/// here; lookups return `None` for those.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
