//! Book CRUD and genre-scoped listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{BookId, GenreId, Money};
use serde::{Deserialize, Serialize};
use store::{Book, BookFilter, BookPatch, BookSortKey, NewBook, Store};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::response::{self, Envelope};
use crate::routes::ListParams;
use crate::routes::genres::GenreResponse;

#[derive(Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub writer: String,
    pub publisher: String,
    pub publication_year: i32,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: u32,
    pub genre_id: uuid::Uuid,
}

#[derive(Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub writer: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock_quantity: Option<u32>,
    pub genre_id: Option<uuid::Uuid>,
}

#[derive(Serialize)]
pub struct BookResponse {
    pub id: BookId,
    pub title: String,
    pub writer: String,
    pub publisher: String,
    pub publication_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: u32,
    pub genre_id: GenreId,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            writer: book.writer,
            publisher: book.publisher,
            publication_year: book.publication_year,
            description: book.description,
            price_cents: book.price.cents(),
            stock_quantity: book.stock_quantity,
            genre_id: book.genre_id,
            created_at: book.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct GenreBooksResponse {
    pub genre: GenreResponse,
    pub books: Vec<BookResponse>,
}

fn sort_key(params: &ListParams) -> Result<BookSortKey, ApiError> {
    match params.sort.as_deref() {
        None | Some("created_at") => Ok(BookSortKey::CreatedAt),
        Some("title") => Ok(BookSortKey::Title),
        Some("price") => Ok(BookSortKey::Price),
        Some(other) => Err(ApiError::BadRequest(format!("invalid sort key: {other}"))),
    }
}

fn filter_from(params: &ListParams) -> Result<BookFilter, ApiError> {
    Ok(BookFilter {
        search: params.search.clone(),
        genre_id: None,
        min_price: params.min_price_cents.map(Money::from_cents),
        max_price: params.max_price_cents.map(Money::from_cents),
        sort_key: sort_key(params)?,
        sort_dir: params.sort_dir()?,
    })
}

/// POST /books — add a book to the catalog.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Envelope<BookResponse>>), ApiError> {
    let book = state
        .catalog
        .create_book(NewBook {
            title: req.title,
            writer: req.writer,
            publisher: req.publisher,
            publication_year: req.publication_year,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            stock_quantity: req.stock_quantity,
            genre_id: GenreId::from_uuid(req.genre_id),
        })
        .await?;
    Ok(response::created("Book created", book.into()))
}

/// GET /books — list books with search, price range, sort and pagination.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<BookResponse>>>, ApiError> {
    let page = params.page();
    let filter = filter_from(&params)?;
    let (books, total) = state.catalog.list_books(&filter, page).await?;
    let data = books.into_iter().map(BookResponse::from).collect();
    Ok(response::ok_list("Books retrieved", data, page, total))
}

/// GET /books/{id} — fetch one book.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Envelope<BookResponse>>, ApiError> {
    let book = state.catalog.get_book(BookId::from_uuid(id)).await?;
    Ok(response::ok("Book retrieved", book.into()))
}

/// GET /books/genre/{genre_id} — list one genre's books.
#[tracing::instrument(skip(state))]
pub async fn by_genre<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(genre_id): Path<uuid::Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<GenreBooksResponse>>, ApiError> {
    let page = params.page();
    let filter = filter_from(&params)?;
    let (genre, books, total) = state
        .catalog
        .list_books_in_genre(GenreId::from_uuid(genre_id), filter, page)
        .await?;
    let data = GenreBooksResponse {
        genre: genre.into(),
        books: books.into_iter().map(BookResponse::from).collect(),
    };
    Ok(response::ok_list("Books retrieved", data, page, total))
}

/// PATCH /books/{id} — partially update a book.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Envelope<BookResponse>>, ApiError> {
    let patch = BookPatch {
        title: req.title,
        writer: req.writer,
        publisher: req.publisher,
        publication_year: req.publication_year,
        description: req.description,
        price: req.price_cents.map(Money::from_cents),
        stock_quantity: req.stock_quantity,
        genre_id: req.genre_id.map(GenreId::from_uuid),
    };
    if patch.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".to_string()));
    }
    let book = state.catalog.update_book(BookId::from_uuid(id), patch).await?;
    Ok(response::ok("Book updated", book.into()))
}

/// DELETE /books/{id} — soft-delete a book.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.catalog.delete_book(BookId::from_uuid(id)).await?;
    Ok(response::ok_empty("Book deleted"))
}
