//! Cancellation Service: an exhaustive match over the order status table.
//!
//! The post-cancel cache write-back must use the order snapshot *after*
//! its status was mutated to `Cancelled`, never the snapshot captured
//! before the Store call. This service always writes back after mutating,
//! on the hit path and the miss path alike, so there is no branch where a
//! stale snapshot is cached.

use std::sync::Arc;

use orders_cache::OrderCache;
use orders_db::StoreError;
use orders_schemas::{OrderId, OrderStatus};
use sqlx::PgPool;

use crate::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum CancelOutcome {
    #[error("order not found")]
    NotFound,
    #[error("order already cancelled")]
    AlreadyCancelled,
    #[error("order already delivered")]
    AlreadyDelivered,
    #[error("order is not in a cancellable status")]
    IllegalStatus,
    #[error(transparent)]
    Storage(#[from] ServiceError),
}

#[derive(Clone)]
pub struct CancellationService {
    pool: PgPool,
    cache: Arc<OrderCache>,
}

impl CancellationService {
    pub fn new(pool: PgPool, cache: Arc<OrderCache>) -> Self {
        Self { pool, cache }
    }

    pub async fn cancel(&self, order_id: OrderId) -> Result<(), CancelOutcome> {
        let mut order = match self.cache.get(order_id).await {
            Some(order) => order,
            None => orders_db::get_order_by_id(&self.pool, order_id)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound => CancelOutcome::NotFound,
                    other => CancelOutcome::Storage(other.into()),
                })?,
        };

        match order.status {
            OrderStatus::Created | OrderStatus::Paid => {
                orders_db::cancel_order(&self.pool, order_id)
                    .await
                    .map_err(|e| match e {
                        StoreError::NotFound => CancelOutcome::NotFound,
                        other => CancelOutcome::Storage(other.into()),
                    })?;

                order.status = OrderStatus::Cancelled;
                let evicted = self.cache.add(order_id, order).await;
                if evicted {
                    tracing::info!(order_id = %order_id, "cache eviction on cancel write-back; non-fatal");
                }
                Ok(())
            }
            OrderStatus::Cancelled => Err(CancelOutcome::AlreadyCancelled),
            OrderStatus::Delivered => Err(CancelOutcome::AlreadyDelivered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_outcome_display_matches_taxonomy() {
        assert_eq!(CancelOutcome::NotFound.to_string(), "order not found");
        assert_eq!(CancelOutcome::AlreadyCancelled.to_string(), "order already cancelled");
        assert_eq!(CancelOutcome::AlreadyDelivered.to_string(), "order already delivered");
    }
}
