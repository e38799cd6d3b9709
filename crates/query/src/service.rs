//! Order listings, detail views, and per-user statistics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{BookId, GenreId, Money, OrderId, UserId};
use serde::Serialize;
use store::{OrderWithItems, Page, SortDir, Store};

use crate::Result;

/// One row in a user's order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummaryView {
    pub order_id: OrderId,
    pub total_quantity: u64,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

/// One line of an order detail view, priced from the snapshot taken at
/// order time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLineView {
    pub book_id: BookId,
    pub book_title: String,
    pub genre_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Full view of one order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetailView {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineView>,
    pub total_quantity: u64,
    pub total_price: Money,
}

/// Cumulative sales of one genre across a user's orders.
#[derive(Debug, Clone, Serialize)]
pub struct GenreSales {
    pub genre_id: GenreId,
    pub genre_name: String,
    pub quantity_sold: u64,
}

/// Purchasing statistics for one user.
///
/// Genre ranking is by cumulative quantity sold, and amounts come from
/// the line-item price snapshots rather than current catalog prices.
/// Both genre fields are `None` when the user has no orders.
#[derive(Debug, Clone, Serialize)]
pub struct UserStatistics {
    pub total_orders: u64,
    pub average_order_value: Money,
    pub most_sold_genre: Option<GenreSales>,
    pub least_sold_genre: Option<GenreSales>,
}

/// Read-only query service over the order ledger.
#[derive(Clone)]
pub struct OrderQueryService<S: Store> {
    store: S,
}

impl<S: Store> OrderQueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Paginated order summaries for the owner. Other users' orders are
    /// never visible here.
    pub async fn list_orders(
        &self,
        user_id: UserId,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<OrderSummaryView>, u64)> {
        let (orders, total) = self
            .store
            .list_orders_for_user(user_id, sort_dir, page)
            .await?;
        let summaries = orders.iter().map(summarize).collect();
        Ok((summaries, total))
    }

    /// Detail view of one order; `None` when the order is missing or
    /// belongs to another user (the two cases are indistinguishable to
    /// the caller).
    pub async fn order_detail(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderDetailView>> {
        let Some(order) = self.store.find_order_for_user(order_id, user_id).await? else {
            return Ok(None);
        };
        let items = order
            .items
            .iter()
            .map(|item| OrderLineView {
                book_id: item.book_id,
                book_title: item.book_title.clone(),
                genre_name: item.genre_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal(),
            })
            .collect();
        Ok(Some(OrderDetailView {
            order_id: order.order.id,
            created_at: order.order.created_at,
            items,
            total_quantity: order.total_quantity(),
            total_price: order.total_price(),
        }))
    }

    /// Aggregates a user's whole order history.
    #[tracing::instrument(skip(self), fields(user = %user_id))]
    pub async fn statistics(&self, user_id: UserId) -> Result<UserStatistics> {
        let orders = self.store.orders_with_items_for_user(user_id).await?;
        if orders.is_empty() {
            return Ok(UserStatistics {
                total_orders: 0,
                average_order_value: Money::zero(),
                most_sold_genre: None,
                least_sold_genre: None,
            });
        }

        let total_orders = orders.len() as u64;
        let total_cents: i64 = orders.iter().map(|o| o.total_price().cents()).sum();
        let average_order_value = Money::from_cents(total_cents / total_orders as i64);

        let mut by_genre: HashMap<GenreId, GenreSales> = HashMap::new();
        for order in &orders {
            for item in &order.items {
                by_genre
                    .entry(item.genre_id)
                    .or_insert_with(|| GenreSales {
                        genre_id: item.genre_id,
                        genre_name: item.genre_name.clone(),
                        quantity_sold: 0,
                    })
                    .quantity_sold += u64::from(item.quantity);
            }
        }

        let most_sold_genre = by_genre
            .values()
            .max_by_key(|g| g.quantity_sold)
            .cloned();
        let least_sold_genre = by_genre
            .values()
            .min_by_key(|g| g.quantity_sold)
            .cloned();

        Ok(UserStatistics {
            total_orders,
            average_order_value,
            most_sold_genre,
            least_sold_genre,
        })
    }
}

fn summarize(order: &OrderWithItems) -> OrderSummaryView {
    OrderSummaryView {
        order_id: order.order.id,
        total_quantity: order.total_quantity(),
        total_price: order.total_price(),
        created_at: order.order.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{MemoryStore, NewBook, StoreTx};

    struct Fixture {
        store: MemoryStore,
        horror: BookId,
        romance: BookId,
    }

    /// Two genres, one book each: Horror/"It" at $15, Romance/"Outlander"
    /// at $20.
    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let horror = store.insert_genre("Horror").await.unwrap();
        let romance = store.insert_genre("Romance").await.unwrap();
        let it = store
            .insert_book(NewBook {
                title: "It".to_string(),
                writer: "Stephen King".to_string(),
                publisher: "Viking Press".to_string(),
                publication_year: 1986,
                description: None,
                price: Money::from_cents(1500),
                stock_quantity: 100,
                genre_id: horror.id,
            })
            .await
            .unwrap();
        let outlander = store
            .insert_book(NewBook {
                title: "Outlander".to_string(),
                writer: "Diana Gabaldon".to_string(),
                publisher: "Delacorte Books".to_string(),
                publication_year: 1991,
                description: None,
                price: Money::from_cents(2000),
                stock_quantity: 100,
                genre_id: romance.id,
            })
            .await
            .unwrap();
        Fixture {
            store,
            horror: it.id,
            romance: outlander.id,
        }
    }

    async fn place(store: &MemoryStore, user: UserId, lines: &[(BookId, u32, i64)]) -> OrderId {
        let mut tx = store.begin().await.unwrap();
        let order = tx.create_order(user).await.unwrap();
        for &(book_id, quantity, cents) in lines {
            tx.create_line_item(order.id, book_id, quantity, Money::from_cents(cents))
                .await
                .unwrap();
            tx.decrement_stock(book_id, quantity).await.unwrap();
        }
        tx.commit().await.unwrap();
        order.id
    }

    #[tokio::test]
    async fn list_orders_summarizes_and_scopes_to_owner() {
        let fx = fixture().await;
        let alice = UserId::new();
        let bob = UserId::new();

        place(&fx.store, alice, &[(fx.horror, 2, 1500)]).await;
        place(&fx.store, bob, &[(fx.romance, 1, 2000)]).await;

        let svc = OrderQueryService::new(fx.store);
        let (orders, total) = svc
            .list_orders(alice, SortDir::Desc, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(orders[0].total_quantity, 2);
        assert_eq!(orders[0].total_price, Money::from_cents(3000));
    }

    #[tokio::test]
    async fn order_detail_hides_other_users_orders() {
        let fx = fixture().await;
        let alice = UserId::new();
        let bob = UserId::new();
        let order_id = place(&fx.store, alice, &[(fx.horror, 1, 1500)]).await;

        let svc = OrderQueryService::new(fx.store);
        assert!(svc.order_detail(bob, order_id).await.unwrap().is_none());
        assert!(svc.order_detail(alice, OrderId::new()).await.unwrap().is_none());

        let detail = svc.order_detail(alice, order_id).await.unwrap().unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].book_title, "It");
        assert_eq!(detail.items[0].subtotal, Money::from_cents(1500));
        assert_eq!(detail.total_price, Money::from_cents(1500));
    }

    #[tokio::test]
    async fn statistics_empty_history() {
        let fx = fixture().await;
        let svc = OrderQueryService::new(fx.store);
        let stats = svc.statistics(UserId::new()).await.unwrap();
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.average_order_value, Money::zero());
        assert!(stats.most_sold_genre.is_none());
        assert!(stats.least_sold_genre.is_none());
    }

    #[tokio::test]
    async fn statistics_rank_genres_by_quantity_not_revenue() {
        let fx = fixture().await;
        let alice = UserId::new();

        // Horror: 5 copies at $15 = $75. Romance: 2 copies at $20 = $40.
        // Quantity ranking puts Horror first even though a revenue
        // ranking over pricier Romance orders could differ.
        place(&fx.store, alice, &[(fx.horror, 5, 1500)]).await;
        place(&fx.store, alice, &[(fx.romance, 2, 2000)]).await;

        let svc = OrderQueryService::new(fx.store);
        let stats = svc.statistics(alice).await.unwrap();

        assert_eq!(stats.total_orders, 2);
        // (7500 + 4000) / 2 orders, integer division.
        assert_eq!(stats.average_order_value, Money::from_cents(5750));

        let most = stats.most_sold_genre.unwrap();
        assert_eq!(most.genre_name, "Horror");
        assert_eq!(most.quantity_sold, 5);
        let least = stats.least_sold_genre.unwrap();
        assert_eq!(least.genre_name, "Romance");
        assert_eq!(least.quantity_sold, 2);
    }

    #[tokio::test]
    async fn statistics_use_price_snapshots() {
        let fx = fixture().await;
        let alice = UserId::new();
        // Line recorded at $15 even though we then bump the catalog
        // price to $99.
        place(&fx.store, alice, &[(fx.horror, 1, 1500)]).await;
        fx.store
            .update_book(
                fx.horror,
                store::BookPatch {
                    price: Some(Money::from_cents(9900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let svc = OrderQueryService::new(fx.store);
        let stats = svc.statistics(alice).await.unwrap();
        assert_eq!(stats.average_order_value, Money::from_cents(1500));
    }

    #[tokio::test]
    async fn statistics_single_genre_is_both_most_and_least() {
        let fx = fixture().await;
        let alice = UserId::new();
        place(&fx.store, alice, &[(fx.horror, 3, 1500)]).await;

        let svc = OrderQueryService::new(fx.store);
        let stats = svc.statistics(alice).await.unwrap();
        let most = stats.most_sold_genre.unwrap();
        let least = stats.least_sold_genre.unwrap();
        assert_eq!(most.genre_id, least.genre_id);
        assert_eq!(most.quantity_sold, 3);
    }
}
