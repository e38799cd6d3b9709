//! Storage layer for the bookstore backend.
//!
//! Exposes the catalog store and order ledger behind a single [`Store`]
//! trait, with the atomic unit of work modelled as a [`StoreTx`] handle:
//! `begin` opens it, `commit` publishes every write at once, and dropping
//! the handle aborts with no observable effects. Two implementations are
//! provided: [`MemoryStore`] for tests and single-process deployments,
//! and [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BookId, GenreId, Money, OrderId, UserId};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use model::{
    Book, BookPatch, Genre, LineItemDetail, NewBook, Order, OrderLineItem, OrderWithItems,
};
pub use postgres::PostgresStore;
pub use store::{BookFilter, BookSortKey, GenreSortKey, Page, SortDir, Store, StoreTx};
