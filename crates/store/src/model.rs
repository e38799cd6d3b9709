//! Record types owned by the catalog store and order ledger.

use chrono::{DateTime, Utc};
use common::{BookId, GenreId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

/// A book in the catalog.
///
/// `deleted_at` marks a soft delete: a non-null value makes the book
/// invisible to new orders and default listings. `stock_quantity` never
/// goes negative; the store enforces this on every decrement path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub writer: String,
    pub publisher: String,
    pub publication_year: i32,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub genre_id: GenreId,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Returns true if the book is visible to new orders and listings.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Fields required to create a book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub writer: String,
    pub publisher: String,
    pub publication_year: i32,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub genre_id: GenreId,
}

/// Partial update of a book; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub writer: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<u32>,
    pub genre_id: Option<GenreId>,
}

impl BookPatch {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.writer.is_none()
            && self.publisher.is_none()
            && self.publication_year.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
            && self.genre_id.is_none()
    }
}

/// A genre in the catalog. Soft-deletable like books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Genre {
    /// Returns true if the genre has not been soft-deleted.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// An order header in the ledger. Immutable once committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A line item belonging to an order.
///
/// `unit_price` is the book's price captured at order time; later catalog
/// price changes do not affect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub order_id: OrderId,
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLineItem {
    /// Returns `unit_price * quantity` for this line.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A line item joined with catalog names, for the read side.
#[derive(Debug, Clone, Serialize)]
pub struct LineItemDetail {
    pub book_id: BookId,
    pub book_title: String,
    pub genre_id: GenreId,
    pub genre_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItemDetail {
    /// Returns `unit_price * quantity` for this line.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order with its line items, in the caller's original line order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<LineItemDetail>,
}

impl OrderWithItems {
    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of all line subtotals, from the price snapshots.
    pub fn total_price(&self) -> Money {
        self.items
            .iter()
            .fold(Money::zero(), |acc, i| acc + i.subtotal())
    }
}
