//! Stock reservation engine.
//!
//! Converts a cart of `(book_id, quantity)` demands into a committed
//! order, its line items, and the matching stock decrements, or commits
//! nothing at all. Holds no state between requests; every invocation is
//! one unit of work against the injected store.

use std::collections::{HashMap, HashSet};

use common::{BookId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};
use store::{Store, StoreError, StoreTx};

use crate::error::ReservationError;

/// One line of a checkout cart. Duplicate `book_id` lines are allowed;
/// their quantities accumulate toward the sufficiency check but each
/// line yields its own line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub book_id: BookId,
    pub quantity: u32,
}

/// Result of a successful reservation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub total_quantity: u64,
    pub total_price: Money,
}

/// The reservation engine. Cheap to clone; the store handle is the only
/// field.
#[derive(Clone)]
pub struct ReservationEngine<S: Store> {
    store: S,
}

impl<S: Store> ReservationEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Atomically validates the cart against current stock and commits
    /// the order with its line items and stock decrements, or fails
    /// without any observable effect.
    ///
    /// Checks run against a consistent snapshot: the touched books are
    /// locked (in sorted id order, so overlapping carts cannot
    /// deadlock) for the life of the unit of work, which guarantees two
    /// concurrent carts can never both consume the same last unit of
    /// stock.
    #[tracing::instrument(skip(self, cart), fields(user = %user_id, lines = cart.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        cart: &[CartItem],
    ) -> Result<OrderSummary, ReservationError> {
        // The HTTP layer validates request shape, but carts can reach
        // the engine from other callers; re-verify defensively.
        if cart.is_empty() {
            metrics::counter!("orders_rejected_total").increment(1);
            return Err(ReservationError::EmptyCart);
        }
        if let Some(line) = cart.iter().find(|l| l.quantity == 0) {
            metrics::counter!("orders_rejected_total").increment(1);
            return Err(ReservationError::InvalidQuantity {
                book_id: line.book_id,
            });
        }

        let mut distinct: Vec<BookId> = cart.iter().map(|l| l.book_id).collect();
        distinct.sort_unstable();
        distinct.dedup();

        let mut tx = self.store.begin().await.map_err(commit_failed)?;
        let books = tx
            .find_books_for_update(&distinct)
            .await
            .map_err(commit_failed)?;

        if books.len() < distinct.len() {
            let found: HashSet<BookId> = books.iter().map(|b| b.id).collect();
            let missing: Vec<BookId> = distinct
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            metrics::counter!("orders_rejected_total").increment(1);
            return Err(ReservationError::BookNotFound { missing });
        }

        let by_id: HashMap<BookId, &store::Book> = books.iter().map(|b| (b.id, b)).collect();

        // Aggregate demand per book across duplicate cart lines.
        let mut demand: HashMap<BookId, u64> = HashMap::new();
        for line in cart {
            *demand.entry(line.book_id).or_insert(0) += u64::from(line.quantity);
        }
        for (&book_id, &requested) in &demand {
            let book = by_id[&book_id];
            if requested > u64::from(book.stock_quantity) {
                metrics::counter!("orders_rejected_total").increment(1);
                return Err(ReservationError::InsufficientStock {
                    book_id,
                    title: book.title.clone(),
                    available: book.stock_quantity,
                    requested,
                });
            }
        }

        // Totals are accumulated in wide integers so a pathological cart
        // cannot overflow the ledger's i64 price representation.
        let mut total_quantity: u64 = 0;
        let mut total_cents: i128 = 0;
        for (&book_id, &requested) in &demand {
            total_quantity += requested;
            total_cents += i128::from(by_id[&book_id].price.cents()) * i128::from(requested);
        }
        let total_price = match i64::try_from(total_cents) {
            Ok(cents) => Money::from_cents(cents),
            Err(_) => {
                metrics::counter!("orders_rejected_total").increment(1);
                return Err(ReservationError::OrderTooLarge);
            }
        };

        // All checks passed: write the order, one line item per original
        // cart line (the caller's granularity, not the aggregated view),
        // and the decrements, then commit as one unit.
        let order = tx.create_order(user_id).await.map_err(commit_failed)?;
        for line in cart {
            let book = by_id[&line.book_id];
            tx.create_line_item(order.id, line.book_id, line.quantity, book.price)
                .await
                .map_err(commit_failed)?;
            tx.decrement_stock(line.book_id, line.quantity)
                .await
                .map_err(commit_failed)?;
        }
        tx.commit().await.map_err(commit_failed)?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, total_quantity, "order committed");

        Ok(OrderSummary {
            order_id: order.id,
            total_quantity,
            total_price,
        })
    }
}

fn commit_failed(e: StoreError) -> ReservationError {
    ReservationError::CommitFailed {
        reason: e.to_string(),
    }
}
