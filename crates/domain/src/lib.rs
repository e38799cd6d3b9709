//! Domain layer: the stock reservation engine and catalog rules.
//!
//! The reservation engine converts a cart into a committed order plus
//! stock decrements inside one atomic unit of work; the catalog service
//! carries the conventional create/update/soft-delete rules for books
//! and genres. Both are stateless and take their store at construction.

pub mod catalog;
pub mod engine;
pub mod error;

pub use catalog::CatalogService;
pub use engine::{CartItem, OrderSummary, ReservationEngine};
pub use error::{CatalogError, ReservationError};
