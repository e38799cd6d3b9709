use async_trait::async_trait;
use common::{BookId, GenreId, Money, OrderId, UserId};

use crate::model::{Book, BookPatch, Genre, NewBook, Order, OrderLineItem, OrderWithItems};
use crate::Result;

/// Pagination window. Pages are 1-based; the limit is clamped to 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a page, clamping out-of-range values.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Sort key for book listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSortKey {
    #[default]
    CreatedAt,
    Title,
    Price,
}

/// Sort key for genre listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreSortKey {
    #[default]
    CreatedAt,
    Name,
}

/// Filters for book listings. `search` matches title, writer, or
/// publisher, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub search: Option<String>,
    pub genre_id: Option<GenreId>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub sort_key: BookSortKey,
    pub sort_dir: SortDir,
}

/// Unified storage boundary: catalog store, order ledger, and the
/// transactional envelope.
///
/// All implementations must be thread-safe. Reads exclude soft-deleted
/// records unless noted; uniqueness lookups (`find_book_by_title`,
/// `find_genre_by_name`) include soft-deleted records, since unique
/// fields stay reserved after a soft delete.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    /// Opens an atomic unit of work.
    ///
    /// Writes made through the returned handle become visible only when
    /// `commit` succeeds; dropping the handle aborts them all. Units of
    /// work touching the same books are serializable with respect to
    /// each other.
    async fn begin(&self) -> Result<Self::Tx>;

    // -- genres --

    async fn insert_genre(&self, name: &str) -> Result<Genre>;
    async fn find_genre(&self, id: GenreId) -> Result<Option<Genre>>;
    async fn find_genre_by_name(&self, name: &str) -> Result<Option<Genre>>;
    async fn list_genres(
        &self,
        search: Option<&str>,
        sort_key: GenreSortKey,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<Genre>, u64)>;
    async fn update_genre_name(&self, id: GenreId, name: &str) -> Result<Genre>;
    async fn soft_delete_genre(&self, id: GenreId) -> Result<()>;
    /// Number of non-deleted books referencing the genre.
    async fn count_active_books_in_genre(&self, id: GenreId) -> Result<u64>;

    // -- books --

    async fn insert_book(&self, book: NewBook) -> Result<Book>;
    async fn find_book(&self, id: BookId) -> Result<Option<Book>>;
    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>>;
    async fn list_books(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)>;
    async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book>;
    async fn soft_delete_book(&self, id: BookId) -> Result<()>;

    // -- order reads (query side; default read isolation) --

    async fn list_orders_for_user(
        &self,
        user_id: UserId,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<OrderWithItems>, u64)>;
    async fn find_order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>>;
    async fn orders_with_items_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>>;
}

/// Handle over one atomic unit of work.
///
/// The reservation flow is: batch-read the touched books, write the
/// order, its line items, and the stock decrements, then `commit`. No
/// write is observable before `commit` returns `Ok`.
#[async_trait]
pub trait StoreTx: Send {
    /// Batch read of non-soft-deleted books, locked for the life of the
    /// unit of work. Callers must pass `ids` sorted and deduplicated so
    /// lock acquisition follows one canonical order.
    async fn find_books_for_update(&mut self, ids: &[BookId]) -> Result<Vec<Book>>;

    /// Appends an order header to the ledger.
    async fn create_order(&mut self, user_id: UserId) -> Result<Order>;

    /// Appends a line item under an order created in this unit of work.
    async fn create_line_item(
        &mut self,
        order_id: OrderId,
        book_id: BookId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<OrderLineItem>;

    /// Decrements a book's stock, failing with `StockConflict` rather
    /// than ever letting the counter go negative.
    async fn decrement_stock(&mut self, book_id: BookId, amount: u32) -> Result<()>;

    /// Publishes every write of this unit of work atomically.
    async fn commit(self) -> Result<()>;
}
