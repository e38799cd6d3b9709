//! Read side of the order ledger.
//!
//! Everything in this crate is a pure read over the store: order
//! listings, order detail views, and per-user purchasing statistics.
//! Nothing here ever touches stock or writes an order.

pub mod error;
pub mod service;

pub use error::{QueryError, Result};
pub use service::{
    GenreSales, OrderDetailView, OrderLineView, OrderQueryService, OrderSummaryView,
    UserStatistics,
};
