//! Domain error types.

use common::{BookId, GenreId};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the reservation engine.
///
/// The closed set lets the HTTP layer map status codes with a total,
/// exhaustive match instead of message inspection. `BookNotFound` and
/// `InsufficientStock` are client errors, not retryable unchanged;
/// `CommitFailed` is transient and safe to retry as-is.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// One or more requested ids do not resolve to an active book.
    #[error("one or more books not found")]
    BookNotFound { missing: Vec<BookId> },

    /// A book's aggregate demand exceeds its available stock.
    #[error(
        "insufficient stock for book \"{title}\": available {available}, requested {requested}"
    )]
    InsufficientStock {
        book_id: BookId,
        title: String,
        available: u32,
        requested: u64,
    },

    /// The cart contained no lines.
    #[error("cart must contain at least one item")]
    EmptyCart,

    /// A cart line carried a zero quantity.
    #[error("quantity must be greater than zero for book {book_id}")]
    InvalidQuantity { book_id: BookId },

    /// The order total does not fit the ledger's price representation.
    #[error("order total exceeds the representable amount")]
    OrderTooLarge,

    /// A store-level fault or lost isolation race aborted the unit of
    /// work; nothing was committed.
    #[error("order could not be committed: {reason}")]
    CommitFailed { reason: String },
}

/// Errors surfaced by the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("genre not found: {0}")]
    GenreNotFound(GenreId),

    #[error("book not found: {0}")]
    BookNotFound(BookId),

    #[error("book with this title already exists: {0}")]
    DuplicateTitle(String),

    #[error("genre with this name already exists: {0}")]
    DuplicateGenreName(String),

    #[error("cannot delete genre {genre_id}: {book_count} book(s) still reference it")]
    GenreHasBooks { genre_id: GenreId, book_count: u64 },

    #[error("title must not be empty")]
    InvalidTitle,

    #[error("writer must not be empty")]
    InvalidWriter,

    #[error("publisher must not be empty")]
    InvalidPublisher,

    #[error("invalid publication year")]
    InvalidPublicationYear,

    #[error("genre name must be at least 2 characters")]
    InvalidName,

    #[error("price must be greater than zero")]
    InvalidPrice,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
