//! Genre CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::GenreId;
use serde::{Deserialize, Serialize};
use store::{Genre, GenreSortKey, Store};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::response::{self, Envelope};
use crate::routes::ListParams;

#[derive(Deserialize)]
pub struct GenreRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct GenreResponse {
    pub id: GenreId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Genre> for GenreResponse {
    fn from(genre: Genre) -> Self {
        Self {
            id: genre.id,
            name: genre.name,
            created_at: genre.created_at,
        }
    }
}

fn sort_key(params: &ListParams) -> Result<GenreSortKey, ApiError> {
    match params.sort.as_deref() {
        None | Some("created_at") => Ok(GenreSortKey::CreatedAt),
        Some("name") => Ok(GenreSortKey::Name),
        Some(other) => Err(ApiError::BadRequest(format!("invalid sort key: {other}"))),
    }
}

/// POST /genres — create a genre.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Json(req): Json<GenreRequest>,
) -> Result<(StatusCode, Json<Envelope<GenreResponse>>), ApiError> {
    let genre = state.catalog.create_genre(&req.name).await?;
    Ok(response::created("Genre created", genre.into()))
}

/// GET /genres — list genres with search, sort and pagination.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<GenreResponse>>>, ApiError> {
    let page = params.page();
    let (genres, total) = state
        .catalog
        .list_genres(
            params.search.as_deref(),
            sort_key(&params)?,
            params.sort_dir()?,
            page,
        )
        .await?;
    let data = genres.into_iter().map(GenreResponse::from).collect();
    Ok(response::ok_list("Genres retrieved", data, page, total))
}

/// GET /genres/{id} — fetch one genre.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Envelope<GenreResponse>>, ApiError> {
    let genre = state.catalog.get_genre(GenreId::from_uuid(id)).await?;
    Ok(response::ok("Genre retrieved", genre.into()))
}

/// PATCH /genres/{id} — rename a genre.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<GenreRequest>,
) -> Result<Json<Envelope<GenreResponse>>, ApiError> {
    let genre = state
        .catalog
        .update_genre(GenreId::from_uuid(id), &req.name)
        .await?;
    Ok(response::ok("Genre updated", genre.into()))
}

/// DELETE /genres/{id} — soft-delete a genre with no active books.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.catalog.delete_genre(GenreId::from_uuid(id)).await?;
    Ok(response::ok_empty("Genre deleted"))
}
