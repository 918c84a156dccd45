//! Creation Service: persist a new order transactionally, then warm the
//! cache with the resulting snapshot.

use std::sync::Arc;

use orders_cache::OrderCache;
use orders_schemas::{NewOrder, Order, OrderId, OrderStatus};
use sqlx::PgPool;

use crate::ServiceError;

#[derive(Clone)]
pub struct CreationService {
    pool: PgPool,
    cache: Arc<OrderCache>,
}

impl CreationService {
    pub fn new(pool: PgPool, cache: Arc<OrderCache>) -> Self {
        Self { pool, cache }
    }

    /// Persist a new order (with its transactional outbox row) and warm the
    /// cache with the completed snapshot. No event emission happens here —
    /// the outbox row the Store wrote is sufficient; the Relay delivers it.
    pub async fn create(&self, new_order: NewOrder) -> Result<OrderId, ServiceError> {
        let order_id = orders_db::create_order(&self.pool, &new_order).await?;

        let order = Order {
            order_id,
            user_id: new_order.user_id,
            payment_kind: new_order.payment_kind,
            status: OrderStatus::Created,
            points_redeemed: new_order.points_redeemed,
            products: new_order.products,
        };

        let evicted = self.cache.add(order_id, order).await;
        if evicted {
            tracing::info!(order_id = %order_id, "cache eviction on create; non-fatal");
        }

        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orders_schemas::{PaymentKind, ProductId, ProductLine, UserId};
    use uuid::Uuid;

    fn sample_new_order() -> NewOrder {
        NewOrder {
            user_id: UserId(Uuid::new_v4()),
            payment_kind: PaymentKind::Card,
            points_redeemed: 0,
            products: vec![
                ProductLine { product_id: ProductId(Uuid::new_v4()), amount: 350 },
                ProductLine { product_id: ProductId(Uuid::new_v4()), amount: 1000 },
            ],
        }
    }

    #[test]
    fn new_order_total_amount_sums_product_lines() {
        assert_eq!(sample_new_order().total_amount(), 1350);
    }
}
