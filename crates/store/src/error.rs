use common::BookId;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value collided with an existing record on a unique field.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// The targeted record does not exist (or is soft-deleted).
    #[error("record not found")]
    NotFound,

    /// A stock decrement would have driven the counter negative.
    #[error("stock conflict for book {book_id}")]
    StockConflict { book_id: BookId },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
