use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookId, GenreId, Money, OrderId, UserId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::model::{
    Book, BookPatch, Genre, LineItemDetail, NewBook, Order, OrderLineItem, OrderWithItems,
};
use crate::store::{BookFilter, BookSortKey, GenreSortKey, Page, SortDir, Store, StoreTx};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pooled store to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running database migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_genre(row: PgRow) -> Result<Genre> {
        Ok(Genre {
            id: GenreId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_book(row: PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            writer: row.try_get("writer")?,
            publisher: row.try_get("publisher")?,
            publication_year: row.try_get("publication_year")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: row.try_get::<i64, _>("stock_quantity")? as u32,
            genre_id: GenreId::from_uuid(row.try_get::<Uuid, _>("genre_id")?),
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    /// Loads the line items for a set of orders and assembles the read
    /// models, preserving the given order sequence.
    async fn attach_items(&self, orders: Vec<Order>) -> Result<Vec<OrderWithItems>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT oi.order_id, oi.book_id, oi.quantity, oi.unit_price_cents,
                   b.title AS book_title, b.genre_id, g.name AS genre_name
            FROM order_items oi
            JOIN books b ON b.id = oi.book_id
            JOIN genres g ON g.id = b.genre_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.order_id, oi.line_no
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<LineItemDetail>> = HashMap::new();
        for row in rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?);
            items_by_order
                .entry(order_id)
                .or_default()
                .push(LineItemDetail {
                    book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
                    book_title: row.try_get("book_title")?,
                    genre_id: GenreId::from_uuid(row.try_get::<Uuid, _>("genre_id")?),
                    genre_name: row.try_get("genre_name")?,
                    quantity: row.try_get::<i64, _>("quantity")? as u32,
                    unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                });
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

fn translate_unique(e: sqlx::Error, field: &'static str, value: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Duplicate {
            field,
            value: value.to_string(),
        };
    }
    StoreError::Database(e)
}

fn dir_sql(dir: SortDir) -> &'static str {
    match dir {
        SortDir::Asc => "ASC",
        SortDir::Desc => "DESC",
    }
}

fn book_sort_sql(key: BookSortKey) -> &'static str {
    match key {
        BookSortKey::CreatedAt => "created_at",
        BookSortKey::Title => "title",
        BookSortKey::Price => "price_cents",
    }
}

fn genre_sort_sql(key: GenreSortKey) -> &'static str {
    match key {
        GenreSortKey::CreatedAt => "created_at",
        GenreSortKey::Name => "name",
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx, next_line_no: 0 })
    }

    async fn insert_genre(&self, name: &str) -> Result<Genre> {
        let genre = Genre {
            id: GenreId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        sqlx::query("INSERT INTO genres (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(genre.id.as_uuid())
            .bind(&genre.name)
            .bind(genre.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| translate_unique(e, "name", name))?;
        Ok(genre)
    }

    async fn find_genre(&self, id: GenreId) -> Result<Option<Genre>> {
        let row = sqlx::query(
            "SELECT id, name, created_at, deleted_at FROM genres \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_genre).transpose()
    }

    async fn find_genre_by_name(&self, name: &str) -> Result<Option<Genre>> {
        let row = sqlx::query("SELECT id, name, created_at, deleted_at FROM genres WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_genre).transpose()
    }

    async fn list_genres(
        &self,
        search: Option<&str>,
        sort_key: GenreSortKey,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<Genre>, u64)> {
        let mut where_sql = String::from("deleted_at IS NULL");
        if search.is_some() {
            where_sql.push_str(" AND name ILIKE $1");
        }
        let pattern = search.map(|s| format!("%{s}%"));

        let count_sql = format!("SELECT COUNT(*) FROM genres WHERE {where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref p) = pattern {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let next = if pattern.is_some() { 2 } else { 1 };
        let select_sql = format!(
            "SELECT id, name, created_at, deleted_at FROM genres WHERE {where_sql} \
             ORDER BY {} {}, id LIMIT ${next} OFFSET ${}",
            genre_sort_sql(sort_key),
            dir_sql(sort_dir),
            next + 1,
        );
        let mut query = sqlx::query(&select_sql);
        if let Some(ref p) = pattern {
            query = query.bind(p);
        }
        let rows = query
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let genres = rows
            .into_iter()
            .map(Self::row_to_genre)
            .collect::<Result<Vec<_>>>()?;
        Ok((genres, total as u64))
    }

    async fn update_genre_name(&self, id: GenreId, name: &str) -> Result<Genre> {
        let row = sqlx::query(
            "UPDATE genres SET name = $2 WHERE id = $1 AND deleted_at IS NULL \
             RETURNING id, name, created_at, deleted_at",
        )
        .bind(id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| translate_unique(e, "name", name))?;
        row.map(Self::row_to_genre)
            .transpose()?
            .ok_or(StoreError::NotFound)
    }

    async fn soft_delete_genre(&self, id: GenreId) -> Result<()> {
        let result =
            sqlx::query("UPDATE genres SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_active_books_in_genre(&self, id: GenreId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE genre_id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let record = Book {
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
        sqlx::query(
            "INSERT INTO books (id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id.as_uuid())
        .bind(&record.title)
        .bind(&record.writer)
        .bind(&record.publisher)
        .bind(record.publication_year)
        .bind(&record.description)
        .bind(record.price.cents())
        .bind(i64::from(record.stock_quantity))
        .bind(record.genre_id.as_uuid())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| translate_unique(e, "title", &record.title))?;
        Ok(record)
    }

    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at, deleted_at \
             FROM books WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_book).transpose()
    }

    async fn find_book_by_title(&self, title: &str) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at, deleted_at \
             FROM books WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_book).transpose()
    }

    async fn list_books(&self, filter: &BookFilter, page: Page) -> Result<(Vec<Book>, u64)> {
        // Build the WHERE clause dynamically; the same conditions feed
        // both the count and the select.
        let mut where_sql = String::from("deleted_at IS NULL");
        let mut param_count = 0;
        let pattern = filter.search.as_deref().map(|s| format!("%{s}%"));

        if pattern.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(
                " AND (title ILIKE ${p} OR writer ILIKE ${p} OR publisher ILIKE ${p})",
                p = param_count,
            ));
        }
        if filter.genre_id.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND genre_id = ${param_count}"));
        }
        if filter.min_price.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if filter.max_price.is_some() {
            param_count += 1;
            where_sql.push_str(&format!(" AND price_cents <= ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM books WHERE {where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref p) = pattern {
            count_query = count_query.bind(p);
        }
        if let Some(genre_id) = filter.genre_id {
            count_query = count_query.bind(genre_id.as_uuid());
        }
        if let Some(min) = filter.min_price {
            count_query = count_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            count_query = count_query.bind(max.cents());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let select_sql = format!(
            "SELECT id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at, deleted_at \
             FROM books WHERE {where_sql} ORDER BY {} {}, id LIMIT ${} OFFSET ${}",
            book_sort_sql(filter.sort_key),
            dir_sql(filter.sort_dir),
            param_count + 1,
            param_count + 2,
        );
        let mut query = sqlx::query(&select_sql);
        if let Some(ref p) = pattern {
            query = query.bind(p);
        }
        if let Some(genre_id) = filter.genre_id {
            query = query.bind(genre_id.as_uuid());
        }
        if let Some(min) = filter.min_price {
            query = query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            query = query.bind(max.cents());
        }
        let rows = query
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let books = rows
            .into_iter()
            .map(Self::row_to_book)
            .collect::<Result<Vec<_>>>()?;
        Ok((books, total as u64))
    }

    async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book> {
        if patch.is_empty() {
            return self.find_book(id).await?.ok_or(StoreError::NotFound);
        }

        let mut sets = Vec::new();
        let mut param_count = 1; // $1 is the id
        if patch.title.is_some() {
            param_count += 1;
            sets.push(format!("title = ${param_count}"));
        }
        if patch.writer.is_some() {
            param_count += 1;
            sets.push(format!("writer = ${param_count}"));
        }
        if patch.publisher.is_some() {
            param_count += 1;
            sets.push(format!("publisher = ${param_count}"));
        }
        if patch.publication_year.is_some() {
            param_count += 1;
            sets.push(format!("publication_year = ${param_count}"));
        }
        if patch.description.is_some() {
            param_count += 1;
            sets.push(format!("description = ${param_count}"));
        }
        if patch.price.is_some() {
            param_count += 1;
            sets.push(format!("price_cents = ${param_count}"));
        }
        if patch.stock_quantity.is_some() {
            param_count += 1;
            sets.push(format!("stock_quantity = ${param_count}"));
        }
        if patch.genre_id.is_some() {
            param_count += 1;
            sets.push(format!("genre_id = ${param_count}"));
        }

        let sql = format!(
            "UPDATE books SET {} WHERE id = $1 AND deleted_at IS NULL \
             RETURNING id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at, deleted_at",
            sets.join(", "),
        );
        let mut query = sqlx::query(&sql).bind(id.as_uuid());
        if let Some(ref title) = patch.title {
            query = query.bind(title);
        }
        if let Some(ref writer) = patch.writer {
            query = query.bind(writer);
        }
        if let Some(ref publisher) = patch.publisher {
            query = query.bind(publisher);
        }
        if let Some(year) = patch.publication_year {
            query = query.bind(year);
        }
        if let Some(ref description) = patch.description {
            query = query.bind(description);
        }
        if let Some(price) = patch.price {
            query = query.bind(price.cents());
        }
        if let Some(stock) = patch.stock_quantity {
            query = query.bind(i64::from(stock));
        }
        if let Some(genre_id) = patch.genre_id {
            query = query.bind(genre_id.as_uuid());
        }

        let title_for_err = patch.title.clone().unwrap_or_default();
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| translate_unique(e, "title", &title_for_err))?;
        row.map(Self::row_to_book)
            .transpose()?
            .ok_or(StoreError::NotFound)
    }

    async fn soft_delete_book(&self, id: BookId) -> Result<()> {
        let result =
            sqlx::query("UPDATE books SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_orders_for_user(
        &self,
        user_id: UserId,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<OrderWithItems>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT id, user_id, created_at FROM orders WHERE user_id = $1 \
             ORDER BY created_at {dir}, id {dir} LIMIT $2 OFFSET $3",
            dir = dir_sql(sort_dir),
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(i64::from(page.limit()))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;

        Ok((self.attach_items(orders).await?, total as u64))
    }

    async fn find_order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithItems>> {
        let row = sqlx::query(
            "SELECT id, user_id, created_at FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let order = Self::row_to_order(row)?;
                Ok(self.attach_items(vec![order]).await?.pop())
            }
            None => Ok(None),
        }
    }

    async fn orders_with_items_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>> {
        let rows = sqlx::query(
            "SELECT id, user_id, created_at FROM orders WHERE user_id = $1 \
             ORDER BY created_at, id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(orders).await
    }
}

/// Unit of work over the PostgreSQL store: one SQL transaction.
///
/// Book rows are locked with `SELECT ... FOR UPDATE` in sorted id order,
/// so overlapping reservations never deadlock; the decrement is guarded
/// by `stock_quantity >= amount` so the counter can never go negative
/// even if a caller skips the batch read.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    next_line_no: i64,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn find_books_for_update(&mut self, ids: &[BookId]) -> Result<Vec<Book>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, title, writer, publisher, publication_year, description, \
             price_cents, stock_quantity, genre_id, created_at, deleted_at \
             FROM books WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY id FOR UPDATE",
        )
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(PostgresStore::row_to_book).collect()
    }

    async fn create_order(&mut self, user_id: UserId) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            user_id,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO orders (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(order.id.as_uuid())
            .bind(order.user_id.as_uuid())
            .bind(order.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn create_line_item(
        &mut self,
        order_id: OrderId,
        book_id: BookId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<OrderLineItem> {
        self.next_line_no += 1;
        sqlx::query(
            "INSERT INTO order_items (order_id, line_no, book_id, quantity, unit_price_cents) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id.as_uuid())
        .bind(self.next_line_no)
        .bind(book_id.as_uuid())
        .bind(i64::from(quantity))
        .bind(unit_price.cents())
        .execute(&mut *self.tx)
        .await?;
        Ok(OrderLineItem {
            order_id,
            book_id,
            quantity,
            unit_price,
        })
    }

    async fn decrement_stock(&mut self, book_id: BookId, amount: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE books SET stock_quantity = stock_quantity - $2 \
             WHERE id = $1 AND deleted_at IS NULL AND stock_quantity >= $2",
        )
        .bind(book_id.as_uuid())
        .bind(i64::from(amount))
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(book_id = %book_id, amount, "guarded stock decrement refused");
            return Err(StoreError::StockConflict { book_id });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
