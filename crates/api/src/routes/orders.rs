//! Order placement, listing, detail, and statistics endpoints.
//!
//! Every route here requires an authenticated caller, and reads are
//! always scoped to that caller's own orders.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::CartItem;
use query::{OrderDetailView, OrderSummaryView, UserStatistics};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::response::{self, Envelope};
use crate::routes::ListParams;

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub book_id: uuid::Uuid,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: OrderId,
    pub total_quantity: u64,
    pub total_price_cents: i64,
}

/// POST /orders — atomically reserve stock and place an order.
#[tracing::instrument(skip(state, req), fields(user = %user.0))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderPlacedResponse>>), ApiError> {
    let cart: Vec<CartItem> = req
        .items
        .iter()
        .map(|item| CartItem {
            book_id: common::BookId::from_uuid(item.book_id),
            quantity: item.quantity,
        })
        .collect();

    let summary = state.engine.place_order(user.0, &cart).await?;
    Ok(response::created(
        "Order placed",
        OrderPlacedResponse {
            order_id: summary.order_id,
            total_quantity: summary.total_quantity,
            total_price_cents: summary.total_price.cents(),
        },
    ))
}

/// GET /orders — the caller's order history, newest first by default.
#[tracing::instrument(skip(state), fields(user = %user.0))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Vec<OrderSummaryView>>>, ApiError> {
    let page = params.page();
    let (orders, total) = state
        .queries
        .list_orders(user.0, params.sort_dir()?, page)
        .await?;
    Ok(response::ok_list("Orders retrieved", orders, page, total))
}

/// GET /orders/statistics — the caller's purchasing statistics.
#[tracing::instrument(skip(state), fields(user = %user.0))]
pub async fn statistics<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Envelope<UserStatistics>>, ApiError> {
    let stats = state.queries.statistics(user.0).await?;
    Ok(response::ok("Statistics retrieved", stats))
}

/// GET /orders/{id} — one order with line items and totals.
#[tracing::instrument(skip(state), fields(user = %user.0))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Envelope<OrderDetailView>>, ApiError> {
    let order_id = OrderId::from_uuid(id);
    let detail = state
        .queries
        .order_detail(user.0, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;
    Ok(response::ok("Order retrieved", detail))
}
