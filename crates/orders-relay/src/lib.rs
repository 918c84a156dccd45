//! The Outbox Relay: drains unprocessed outbox rows and publishes them to
//! the bus, one batch per tick.
//!
//! Marking processed happens inside the open transaction, before the bus
//! send, so a failed send rolls the mark back too. Ordering is load-bearing,
//! not stylistic: sending after commit risks a silent drop if the process
//! dies between commit and publish; marking after sending risks
//! re-publishing on a commit failure, which is tolerable under
//! at-least-once but marking-before-commit keeps the failure mode a
//! duplicate, never a loss.

use std::time::Duration;

use std::sync::Arc;

use orders_bus::{BusError, OutboxMessage, Publisher};
use orders_schemas::OutboxEventKind;
use sqlx::PgPool;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub batch_size: i64,
    pub tick_interval: Duration,
    pub dispatcher_id: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            tick_interval: Duration::from_secs(1),
            dispatcher_id: "orders-relay".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayOutcome {
    pub claimed: usize,
    pub published: usize,
    pub backlog_remaining: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("outbox row had an unparseable event_type {0:?}")]
    UnknownEventKind(String),
}

/// Run a single relay tick to completion:
/// 1. begin a serializable transaction,
/// 2. fetch + mark up to `cfg.batch_size` unprocessed rows inside it,
/// 3. publish the batch,
/// 4. commit on publish success, roll back on any failure.
///
/// Infrastructure failures here are never surfaced outside the caller's
/// tick loop — `spawn` logs and retries next tick. `run_once` itself
/// returns `Err` so tests can observe the failure directly.
pub async fn run_once(
    pool: &PgPool,
    bus: &dyn Publisher,
    cfg: &RelayConfig,
) -> Result<RelayOutcome, RelayError> {
    let mut tx = pool.begin().await?;
    sqlx::query("set transaction isolation level serializable")
        .execute(&mut *tx)
        .await?;

    let rows = match orders_db::fetch_and_mark_unprocessed_outbox(&mut tx, cfg.batch_size).await {
        Ok(rows) => rows,
        Err(e) => {
            let _ = tx.rollback().await;
            return Err(e.into());
        }
    };

    if rows.is_empty() {
        tx.commit().await?;
        return Ok(RelayOutcome::default());
    }

    let mut messages = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(kind) = OutboxEventKind::parse(&row.event_type) else {
            let _ = tx.rollback().await;
            return Err(RelayError::UnknownEventKind(row.event_type.clone()));
        };
        messages.push(OutboxMessage {
            event_kind: kind,
            order_uuid: row.order_uuid,
            payload_json: row.payload.to_string(),
        });
    }

    match bus.publish(&messages).await {
        Ok(()) => {
            tx.commit().await?;
            let backlog = orders_db::count_unprocessed_outbox(pool).await.unwrap_or(-1);
            Ok(RelayOutcome {
                claimed: rows.len(),
                published: messages.len(),
                backlog_remaining: backlog,
            })
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                batch_size = rows.len(),
                dispatcher_id = %cfg.dispatcher_id,
                "outbox relay bus publish failed, rolling back batch"
            );
            let _ = tx.rollback().await;
            Err(e.into())
        }
    }
}

/// Spawn the relay as a single long-lived task ticking every
/// `cfg.tick_interval`. Infrastructure errors never escape the loop; they
/// are logged at `warn` and the same unprocessed backlog is retried next
/// tick.
pub fn spawn(pool: PgPool, bus: Arc<dyn Publisher>, cfg: RelayConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.tick_interval);
        loop {
            ticker.tick().await;
            match run_once(&pool, bus.as_ref(), &cfg).await {
                Ok(outcome) if outcome.claimed > 0 => {
                    tracing::info!(
                        claimed = outcome.claimed,
                        published = outcome.published,
                        backlog_remaining = outcome.backlog_remaining,
                        "outbox relay tick drained batch"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "outbox relay tick failed; rolled back, will retry next tick");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_relay_config_matches_spec_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
    }
}
