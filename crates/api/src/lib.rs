//! HTTP API server for the bookstore catalog and ordering backend.
//!
//! REST endpoints over the catalog, the reservation engine, and the
//! order query service, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use domain::{CatalogService, ReservationEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use query::OrderQueryService;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub engine: ReservationEngine<S>,
    pub queries: OrderQueryService<S>,
}

/// Builds the application state; each service holds its own handle to
/// the store.
pub fn create_state<S: Store + Clone>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        catalog: CatalogService::new(store.clone()),
        engine: ReservationEngine::new(store.clone()),
        queries: OrderQueryService::new(store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/genres", post(routes::genres::create::<S>))
        .route("/genres", get(routes::genres::list::<S>))
        .route("/genres/{id}", get(routes::genres::get::<S>))
        .route("/genres/{id}", patch(routes::genres::update::<S>))
        .route("/genres/{id}", delete(routes::genres::delete::<S>))
        .route("/books", post(routes::books::create::<S>))
        .route("/books", get(routes::books::list::<S>))
        .route("/books/genre/{genre_id}", get(routes::books::by_genre::<S>))
        .route("/books/{id}", get(routes::books::get::<S>))
        .route("/books/{id}", patch(routes::books::update::<S>))
        .route("/books/{id}", delete(routes::books::delete::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/statistics", get(routes::orders::statistics::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
