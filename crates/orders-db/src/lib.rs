use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use orders_schemas::{
    NewOrder, Order, OrderId, OrderStatus, OutboxEventKind, OutboxPayload, PaymentKind,
    ProductId, ProductLine, UserId,
};

pub const ENV_DB_URL: &str = "ORDERS_DATABASE_URL";

/// Errors surfaced by the Store. Deliberately typed (not `anyhow::Error`)
/// because the HTTP boundary classifies these into distinct status codes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    #[error("transaction could not be serialized after retrying")]
    Conflict,
}

/// Connect to Postgres using ORDERS_DATABASE_URL.
pub async fn connect_from_env() -> anyhow::Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Test helper: connect using ORDERS_DATABASE_URL and ensure migrations are applied.
pub async fn testkit_db_pool() -> anyhow::Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub outbox_id: i64,
    pub event_type: String,
    pub order_uuid: Uuid,
    pub payload: Value,
    pub processed: bool,
    pub created_at_utc: DateTime<Utc>,
    pub processed_at_utc: Option<DateTime<Utc>>,
}

const MAX_SERIALIZATION_RETRIES: u32 = 3;
const SERIALIZATION_FAILURE_SQLSTATE: &str = "40001";

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(SERIALIZATION_FAILURE_SQLSTATE))
}

/// Create an order and enqueue its `ORDER_CREATED` outbox event atomically,
/// at `SERIALIZABLE` isolation. Retries on serialization conflict up to
/// `MAX_SERIALIZATION_RETRIES` times before surfacing `StoreError::Conflict`.
pub async fn create_order(pool: &PgPool, new_order: &NewOrder) -> Result<OrderId, StoreError> {
    for attempt in 0..MAX_SERIALIZATION_RETRIES {
        match try_create_order(pool, new_order).await {
            Ok(id) => return Ok(id),
            Err(e) if is_serialization_failure(&e) => {
                tracing::warn!(attempt, "create_order serialization conflict, retrying");
                continue;
            }
            Err(e) => return Err(StoreError::StorageUnavailable(e)),
        }
    }
    Err(StoreError::Conflict)
}

async fn try_create_order(pool: &PgPool, new_order: &NewOrder) -> Result<OrderId, sqlx::Error> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    sqlx::query("set transaction isolation level serializable")
        .execute(&mut *tx)
        .await?;

    let order_uuid: Uuid = sqlx::query(
        r#"
        insert into orders (user_uuid, payment_kind, status, points_redeemed)
        values ($1, $2, $3, $4)
        returning order_uuid
        "#,
    )
    .bind(new_order.user_id.0)
    .bind(new_order.payment_kind.as_i16())
    .bind(OrderStatus::Created.as_i16())
    .bind(new_order.points_redeemed as i64)
    .fetch_one(&mut *tx)
    .await?
    .try_get("order_uuid")?;

    if !new_order.products.is_empty() {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("insert into order_products (order_uuid, product_uuid, amount) ");
        qb.push_values(&new_order.products, |mut b, line| {
            b.push_bind(order_uuid)
                .push_bind(line.product_id.0)
                .push_bind(line.amount as i64);
        });
        qb.build().execute(&mut *tx).await?;
    }

    let payload = serde_json::to_value(OutboxPayload { order_uuid })
        .expect("OutboxPayload serialization cannot fail");
    sqlx::query(
        r#"
        insert into outbox (event_type, order_uuid, payload)
        values ($1, $2, $3)
        on conflict (event_type, order_uuid) do nothing
        "#,
    )
    .bind(OutboxEventKind::OrderCreated.as_str())
    .bind(order_uuid)
    .bind(payload)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(OrderId(order_uuid))
}

/// Cancel an order if it is `Created` or `Paid`, enqueueing `ORDER_CANCELLED`.
/// The status guard is enforced in the UPDATE itself: a concurrent cancel of
/// an already-terminal order matches zero rows rather than racing a
/// read-then-write check.
pub async fn cancel_order(pool: &PgPool, order_id: OrderId) -> Result<(), StoreError> {
    for attempt in 0..MAX_SERIALIZATION_RETRIES {
        match try_cancel_order(pool, order_id).await {
            Ok(updated) if updated => return Ok(()),
            Ok(false) => return Err(StoreError::NotFound),
            Err(e) if is_serialization_failure(&e) => {
                tracing::warn!(attempt, "cancel_order serialization conflict, retrying");
                continue;
            }
            Err(e) => return Err(StoreError::StorageUnavailable(e)),
        }
    }
    Err(StoreError::Conflict)
}

async fn try_cancel_order(pool: &PgPool, order_id: OrderId) -> Result<bool, sqlx::Error> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;
    sqlx::query("set transaction isolation level serializable")
        .execute(&mut *tx)
        .await?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        update orders
           set status = $1
         where order_uuid = $2
           and status in ($3, $4)
        returning order_uuid
        "#,
    )
    .bind(OrderStatus::Cancelled.as_i16())
    .bind(order_id.0)
    .bind(OrderStatus::Created.as_i16())
    .bind(OrderStatus::Paid.as_i16())
    .fetch_optional(&mut *tx)
    .await?;

    let Some((order_uuid,)) = row else {
        tx.rollback().await?;
        return Ok(false);
    };

    let payload = serde_json::to_value(OutboxPayload { order_uuid })
        .expect("OutboxPayload serialization cannot fail");
    sqlx::query(
        r#"
        insert into outbox (event_type, order_uuid, payload)
        values ($1, $2, $3)
        on conflict (event_type, order_uuid) do nothing
        "#,
    )
    .bind(OutboxEventKind::OrderCancelled.as_str())
    .bind(order_uuid)
    .bind(payload)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Fetch every order in `ids` along with its product lines. Orders absent
/// from the result set are simply not found — callers decide whether that
/// is an error.
pub async fn get_orders_by_ids(
    pool: &PgPool,
    ids: &[OrderId],
) -> Result<HashMap<OrderId, Order>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(|i| i.0).collect();

    let order_rows = sqlx::query(
        r#"
        select order_uuid, user_uuid, payment_kind, status, points_redeemed
        from orders
        where order_uuid = any($1)
        "#,
    )
    .bind(&uuids)
    .fetch_all(pool)
    .await?;

    let mut orders: HashMap<OrderId, Order> = HashMap::with_capacity(order_rows.len());
    for row in order_rows {
        let order_uuid: Uuid = row.try_get("order_uuid")?;
        let payment_kind: i16 = row.try_get("payment_kind")?;
        let status: i16 = row.try_get("status")?;
        let points_redeemed: i64 = row.try_get("points_redeemed")?;
        orders.insert(
            OrderId(order_uuid),
            Order {
                order_id: OrderId(order_uuid),
                user_id: UserId(row.try_get("user_uuid")?),
                payment_kind: PaymentKind::from_i16(payment_kind)
                    .ok_or_else(|| sqlx::Error::Decode("unknown payment_kind".into()))?,
                status: OrderStatus::from_i16(status)
                    .ok_or_else(|| sqlx::Error::Decode("unknown status".into()))?,
                points_redeemed: points_redeemed as u64,
                products: Vec::new(),
            },
        );
    }

    let product_rows = sqlx::query(
        r#"
        select order_uuid, product_uuid, amount
        from order_products
        where order_uuid = any($1)
        "#,
    )
    .bind(&uuids)
    .fetch_all(pool)
    .await?;

    for row in product_rows {
        let order_uuid: Uuid = row.try_get("order_uuid")?;
        let amount: i64 = row.try_get("amount")?;
        if let Some(order) = orders.get_mut(&OrderId(order_uuid)) {
            order.products.push(ProductLine {
                product_id: ProductId(row.try_get("product_uuid")?),
                amount: amount as u64,
            });
        }
    }

    Ok(orders)
}

/// Fetch a single order. `StoreError::NotFound` if it does not exist.
pub async fn get_order_by_id(pool: &PgPool, order_id: OrderId) -> Result<Order, StoreError> {
    let mut orders = get_orders_by_ids(pool, &[order_id]).await?;
    orders.remove(&order_id).ok_or(StoreError::NotFound)
}

/// Fetch only an order's status, without its product lines.
pub async fn get_order_status(pool: &PgPool, order_id: OrderId) -> Result<OrderStatus, StoreError> {
    let row: Option<(i16,)> = sqlx::query_as("select status from orders where order_uuid = $1")
        .bind(order_id.0)
        .fetch_optional(pool)
        .await?;
    let (status,) = row.ok_or(StoreError::NotFound)?;
    OrderStatus::from_i16(status).ok_or_else(|| {
        StoreError::StorageUnavailable(sqlx::Error::Decode("unknown status".into()))
    })
}

/// Fetch up to `limit` unprocessed outbox rows, oldest first. Does not claim
/// them; the Relay is the sole consumer and runs with concurrency 1 per the
/// design note, so no `FOR UPDATE SKIP LOCKED` is required here — the Relay
/// itself wraps fetch+mark+publish in one transaction (see `orders-relay`).
pub async fn fetch_unprocessed_outbox(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<OutboxRow>, StoreError> {
    fetch_unprocessed_outbox_tx(pool, limit).await.map_err(StoreError::StorageUnavailable)
}

async fn fetch_unprocessed_outbox_tx<'e, E>(executor: E, limit: i64) -> Result<Vec<OutboxRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    // `outbox_id` is a `bigserial`, so ordering by it is equivalent to
    // ordering by `created_at_utc` ascending (oldest first) but gives a
    // strict, collision-free tiebreak when two rows share the same
    // timestamp — `created_at_utc`'s own resolution cannot do that.
    let rows = sqlx::query(
        r#"
        select outbox_id, event_type, order_uuid, payload, processed,
               created_at_utc, processed_at_utc
        from outbox
        where not processed
        order by outbox_id asc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(OutboxRow {
            outbox_id: row.try_get("outbox_id")?,
            event_type: row.try_get("event_type")?,
            order_uuid: row.try_get("order_uuid")?,
            payload: row.try_get("payload")?,
            processed: row.try_get("processed")?,
            created_at_utc: row.try_get("created_at_utc")?,
            processed_at_utc: row.try_get("processed_at_utc")?,
        });
    }
    Ok(out)
}

/// Fetch every outbox row for one order, processed or not. Exposed for
/// tests that need to assert on the `processed` flag directly rather than
/// inferring it from the unprocessed backlog count.
pub async fn get_outbox_rows_for_order(
    pool: &PgPool,
    order_uuid: Uuid,
) -> Result<Vec<OutboxRow>, StoreError> {
    let rows = sqlx::query(
        r#"
        select outbox_id, event_type, order_uuid, payload, processed,
               created_at_utc, processed_at_utc
        from outbox
        where order_uuid = $1
        order by outbox_id asc
        "#,
    )
    .bind(order_uuid)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(OutboxRow {
            outbox_id: row.try_get("outbox_id")?,
            event_type: row.try_get("event_type")?,
            order_uuid: row.try_get("order_uuid")?,
            payload: row.try_get("payload")?,
            processed: row.try_get("processed")?,
            created_at_utc: row.try_get("created_at_utc")?,
            processed_at_utc: row.try_get("processed_at_utc")?,
        });
    }
    Ok(out)
}

/// Count unprocessed outbox rows, used by the `/status` operator endpoint
/// to surface the relay backlog.
pub async fn count_unprocessed_outbox(pool: &PgPool) -> Result<i64, StoreError> {
    let (n,): (i64,) = sqlx::query_as("select count(*)::bigint from outbox where not processed")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Mark a batch of outbox rows processed. Exposed for the Relay to call
/// within its own transaction via `fetch_and_mark_unprocessed_outbox`, and
/// standalone for tests and recovery tooling.
pub async fn mark_outbox_processed(pool: &PgPool, ids: &[i64]) -> Result<(), StoreError> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("update outbox set processed = true, processed_at_utc = now() where outbox_id = any($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(())
}

/// Claim a batch of unprocessed outbox rows and mark them processed, all
/// inside the caller-owned transaction `tx`. The Relay calls this, attempts
/// to publish the returned rows, and then commits (on publish success) or
/// rolls back (on publish failure) — the mark-before-send ordering is
/// required for crash safety.
pub async fn fetch_and_mark_unprocessed_outbox(
    tx: &mut Transaction<'_, Postgres>,
    limit: i64,
) -> Result<Vec<OutboxRow>, sqlx::Error> {
    let rows = fetch_unprocessed_outbox_tx(&mut **tx, limit).await?;
    if rows.is_empty() {
        return Ok(rows);
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.outbox_id).collect();
    sqlx::query("update outbox set processed = true, processed_at_utc = now() where outbox_id = any($1)")
        .bind(&ids)
        .execute(&mut **tx)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failure_detection_matches_sqlstate_40001() {
        // Constructing a real sqlx::Error::Database requires a live driver error;
        // this only pins the SQLSTATE constant against accidental edits.
        assert_eq!(SERIALIZATION_FAILURE_SQLSTATE, "40001");
    }
}
