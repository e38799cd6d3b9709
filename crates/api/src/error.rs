//! API error types with HTTP response mapping.
//!
//! Every error renders as the `{success: false, message}` envelope the
//! rest of the API uses. Status codes come from a total match over the
//! closed domain error enums, never from message inspection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CatalogError, ReservationError};
use query::QueryError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or malformed `Authorization` header.
    Unauthorized(String),
    /// Reservation engine error.
    Reservation(ReservationError),
    /// Catalog service error.
    Catalog(CatalogError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Reservation(err) => reservation_error_to_response(err),
            ApiError::Catalog(err) => catalog_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reservation_error_to_response(err: ReservationError) -> (StatusCode, String) {
    let status = match &err {
        ReservationError::BookNotFound { .. } => StatusCode::NOT_FOUND,
        ReservationError::InsufficientStock { .. }
        | ReservationError::EmptyCart
        | ReservationError::InvalidQuantity { .. }
        | ReservationError::OrderTooLarge => StatusCode::BAD_REQUEST,
        ReservationError::CommitFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "order commit failed");
    }
    (status, err.to_string())
}

fn catalog_error_to_response(err: CatalogError) -> (StatusCode, String) {
    let status = match &err {
        CatalogError::GenreNotFound(_) | CatalogError::BookNotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::DuplicateTitle(_)
        | CatalogError::DuplicateGenreName(_)
        | CatalogError::GenreHasBooks { .. }
        | CatalogError::InvalidTitle
        | CatalogError::InvalidWriter
        | CatalogError::InvalidPublisher
        | CatalogError::InvalidPublicationYear
        | CatalogError::InvalidName
        | CatalogError::InvalidPrice => StatusCode::BAD_REQUEST,
        CatalogError::Store(store_err) => {
            tracing::error!(error = %store_err, "store error behind catalog call");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        ApiError::Reservation(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
