use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, GenreId, Money, OrderId, UserId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::error::{Result, StoreError};
use crate::model::{
    Book, BookPatch, Genre, LineItemDetail, NewBook, Order, OrderLineItem, OrderWithItems,
};
use crate::store::{BookFilter, BookSortKey, GenreSortKey, Page, SortDir, Store, StoreTx};

#[derive(Default)]
struct MemoryState {
    genres: HashMap<GenreId, Genre>,
    books: HashMap<BookId, Book>,
    orders: Vec<Order>,
    line_items: Vec<OrderLineItem>,
}

impl MemoryState {
    fn join_items(&self, order: &Order) -> OrderWithItems {
        let items = self
            .line_items
            .iter()
            .filter(|li| li.order_id == order.id)
            .map(|li| {
                // Soft-deleted books still resolve: order history outlives
                // catalog removals.
                let book = &self.books[&li.book_id];
                let genre_name = self
                    .genres
                    .get(&book.genre_id)
                    .map(|g| g.name.clone())
                    .unwrap_or_default();
                LineItemDetail {
                    book_id: li.book_id,
                    book_title: book.title.clone(),
                    genre_id: book.genre_id,
                    genre_name,
                    quantity: li.quantity,
                    unit_price: li.unit_price,
                }
            })
            .collect();
        OrderWithItems {
            order: order.clone(),
            items,
        }
    }

    fn user_orders(&self, user_id: UserId, sort_dir: SortDir) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            match sort_dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        orders
    }
}

/// In-memory store implementation.
///
/// Provides the same interface and atomicity contract as the PostgreSQL
/// implementation. Units of work hold the write lock for their whole
/// lifetime and stage writes until commit, so concurrent reservations
/// are fully serialized and an aborted unit of work leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed orders, across all users.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Total number of committed line items, across all orders.
    pub async fn line_item_count(&self) -> usize {
        self.state.read().await.line_items.len()
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let paged = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (paged, total)
}

fn matches_search(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().write_owned().await;
        Ok(MemoryTx {
            guard,
            staged_orders: Vec::new(),
            staged_items: Vec::new(),
            staged_decrements: HashMap::new(),
        })
    }

    async fn insert_genre(&self, name: &str) -> Result<Genre> {
        let mut state = self.state.write().await;
        if state.genres.values().any(|g| g.name == name) {
            return Err(StoreError::Duplicate {
                field: "name",
                value: name.to_string(),
            });
        }
        let genre = Genre {
            id: GenreId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }

    async fn find_genre(&self, id: GenreId) -> Result<Option<Genre>> {
        let state = self.state.read().await;
        Ok(state.genres.get(&id).filter(|g| g.is_active()).cloned())
    }

    async fn find_genre_by_name(&self, name: &str) -> Result<Option<Genre>> {
        let state = self.state.read().await;
        Ok(state.genres.values().find(|g| g.name == name).cloned())
    }

    async fn list_genres(
        &self,
        search: Option<&str>,
        sort_key: GenreSortKey,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<Genre>, u64)> {
        let state = self.state.read().await;
        let mut genres: Vec<Genre> = state
            .genres
            .values()
            .filter(|g| g.is_active())
            .filter(|g| search.is_none_or(|s| matches_search(&g.name, s)))
            .cloned()
            .collect();
        genres.sort_by(|a, b| {
            let ord = match sort_key {
                GenreSortKey::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
                GenreSortKey::Name => a.name.cmp(&b.name),
            };
            match sort_dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        Ok(paginate(genres, page))
    }

    async fn update_genre_name(&self, id: GenreId, name: &str) -> Result<Genre> {
        let mut state = self.state.write().await;
        if state
            .genres
            .values()
            .any(|g| g.id != id && g.name == name)
        {
            return Err(StoreError::Duplicate {
                field: "name",
                value: name.to_string(),
            });
        }
        let genre = state
            .genres
            .get_mut(&id)
            .filter(|g| g.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        genre.name = name.to_string();
        Ok(genre.clone())
    }

    async fn soft_delete_genre(&self, id: GenreId) -> Result<()> {
        let mut state = self.state.write().await;
        let genre = state
            .genres
            .get_mut(&id)
            .filter(|g| g.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        genre.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn count_active_books_in_genre(&self, id: GenreId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.genre_id == id && b.is_active())
            .count() as u64)
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let mut state = self.state.write().await;
        if state.books.values().any(|b| b.title == book.title) {
            return Err(StoreError::Duplicate {
                field: "title",
                value: book.title,
            });
        }
        let book = Book {
            id: BookId::new(),
            title: book.title,
            writer: book.writer,
            publisher: book.publisher,
            publication_year: book.publication_year,
            description: book.description,
            price: book.price,
            stock_quantity: book.stock_quantity,
            genre_id: book.genre_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.books.get(&id).filter(|b| b.is_active()).cloned())
    }

    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.books.values().find(|b| b.title == title).cloned())
    }

    async fn list_books(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)> {
        let state = self.state.read().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.is_active())
            .filter(|b| {
                filter.search.as_deref().is_none_or(|s| {
                    matches_search(&b.title, s)
                        || matches_search(&b.writer, s)
                        || matches_search(&b.publisher, s)
                })
            })
            .filter(|b| filter.genre_id.is_none_or(|g| b.genre_id == g))
            .filter(|b| filter.min_price.is_none_or(|min| b.price >= min))
            .filter(|b| filter.max_price.is_none_or(|max| b.price <= max))
            .cloned()
            .collect();
        books.sort_by(|a, b| {
            let ord = match filter.sort_key {
                BookSortKey::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
                BookSortKey::Title => a.title.cmp(&b.title),
                BookSortKey::Price => a.price.cmp(&b.price).then(a.title.cmp(&b.title)),
            };
            match filter.sort_dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        Ok(paginate(books, page))
    }

    async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book> {
        let mut state = self.state.write().await;
        if let Some(ref title) = patch.title {
            if state
                .books
                .values()
                .any(|b| b.id != id && b.title == *title)
            {
                return Err(StoreError::Duplicate {
                    field: "title",
                    value: title.clone(),
                });
            }
        }
        let book = state
            .books
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(writer) = patch.writer {
            book.writer = writer;
        }
        if let Some(publisher) = patch.publisher {
            book.publisher = publisher;
        }
        if let Some(year) = patch.publication_year {
            book.publication_year = year;
        }
        if let Some(description) = patch.description {
            book.description = Some(description);
        }
        if let Some(price) = patch.price {
            book.price = price;
        }
        if let Some(stock) = patch.stock_quantity {
            book.stock_quantity = stock;
        }
        if let Some(genre_id) = patch.genre_id {
            book.genre_id = genre_id;
        }
        Ok(book.clone())
    }

    async fn soft_delete_book(&self, id: BookId) -> Result<()> {
        let mut state = self.state.write().await;
        let book = state
            .books
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        book.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn list_orders_for_user(
        &self,
        user_id: UserId,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<OrderWithItems>, u64)> {
        let state = self.state.read().await;
        let orders = state.user_orders(user_id, sort_dir);
        let total = orders.len() as u64;
        let paged = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|o| state.join_items(o))
            .collect();
        Ok((paged, total))
    }

    async fn find_order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .map(|o| state.join_items(o)))
    }

    async fn orders_with_items_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let state = self.state.read().await;
        Ok(state
            .user_orders(user_id, SortDir::Asc)
            .into_iter()
            .map(|o| state.join_items(o))
            .collect())
    }
}

/// Unit of work over the in-memory store.
///
/// Holds the exclusive write guard for its whole lifetime and stages
/// writes locally; `commit` applies them in one step, and dropping the
/// handle discards them.
pub struct MemoryTx {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    staged_orders: Vec<Order>,
    staged_items: Vec<OrderLineItem>,
    staged_decrements: HashMap<BookId, u32>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_books_for_update(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.guard.books.get(id))
            .filter(|b| b.is_active())
            .map(|b| {
                let mut book = b.clone();
                // Reflect decrements already staged in this unit of work.
                let staged = self.staged_decrements.get(&book.id).copied().unwrap_or(0);
                book.stock_quantity -= staged.min(book.stock_quantity);
                book
            })
            .collect())
    }

    async fn create_order(&mut self, user_id: UserId) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            user_id,
            created_at: Utc::now(),
        };
        self.staged_orders.push(order.clone());
        Ok(order)
    }

    async fn create_line_item(
        &mut self,
        order_id: OrderId,
        book_id: BookId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<OrderLineItem> {
        let item = OrderLineItem {
            order_id,
            book_id,
            quantity,
            unit_price,
        };
        self.staged_items.push(item.clone());
        Ok(item)
    }

    async fn decrement_stock(&mut self, book_id: BookId, amount: u32) -> Result<()> {
        let book = self
            .guard
            .books
            .get(&book_id)
            .filter(|b| b.is_active())
            .ok_or(StoreError::NotFound)?;
        let staged = self.staged_decrements.get(&book_id).copied().unwrap_or(0);
        let available = book.stock_quantity.saturating_sub(staged);
        if amount > available {
            return Err(StoreError::StockConflict { book_id });
        }
        *self.staged_decrements.entry(book_id).or_insert(0) += amount;
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        // Validated at staging time under the exclusive guard, so the
        // subtraction cannot underflow here.
        for (book_id, amount) in &self.staged_decrements {
            let book = self
                .guard
                .books
                .get_mut(book_id)
                .ok_or(StoreError::NotFound)?;
            book.stock_quantity = book
                .stock_quantity
                .checked_sub(*amount)
                .ok_or(StoreError::StockConflict { book_id: *book_id })?;
        }
        self.guard.orders.append(&mut self.staged_orders);
        self.guard.line_items.append(&mut self.staged_items);
        Ok(())
    }
}
