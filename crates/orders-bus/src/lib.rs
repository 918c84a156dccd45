//! Thin adapter over the message bus.
//!
//! `BusPublisher` is the synchronous batch path the Outbox Relay uses:
//! every message in a batch must be acknowledged or the whole call fails.
//! `async_publisher` is a weaker channel-fanout alternative wiring kept for
//! callers that want fire-and-forget publication with backpressure instead;
//! new call sites should use `BusPublisher` alone.

use std::time::Duration;

use orders_schemas::{OutboxEventKind, OutboxPayload};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use uuid::Uuid;

pub mod async_publisher;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("partial publication failure: {failed}/{total} messages not acknowledged")]
    PartialFailure { failed: usize, total: usize },
    #[error("async publisher input channel timed out after {0:?}")]
    ChannelTimeout(Duration),
    #[error("async publisher input channel closed")]
    ChannelClosed,
}

/// One outbox record translated into wire form, ready to hand to the bus.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub event_kind: OutboxEventKind,
    pub order_uuid: Uuid,
    /// JSON-encoded `OutboxPayload` (or a richer payload the Store carried).
    pub payload_json: String,
}

impl OutboxMessage {
    pub fn for_order_created(order_uuid: Uuid) -> Self {
        Self::new(OutboxEventKind::OrderCreated, order_uuid)
    }

    pub fn for_order_cancelled(order_uuid: Uuid) -> Self {
        Self::new(OutboxEventKind::OrderCancelled, order_uuid)
    }

    fn new(event_kind: OutboxEventKind, order_uuid: Uuid) -> Self {
        let payload_json = serde_json::to_string(&OutboxPayload { order_uuid })
            .expect("OutboxPayload serialization cannot fail");
        Self { event_kind, order_uuid, payload_json }
    }
}

/// Pluggable bus-publication port. `orders-relay` depends on this trait,
/// not on `BusPublisher` directly, so scenario tests can exercise the
/// at-least-once retry behavior under a bus flap with a fake in place of a
/// live broker.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, batch: &[OutboxMessage]) -> Result<(), BusError>;
}

/// `ORDER_CREATED` events go to `order_topic`, `ORDER_CANCELLED` events to
/// `status_topic`; deployments may set both to the same topic name.
#[derive(Clone)]
pub struct BusPublisher {
    producer: FutureProducer,
    order_topic: String,
    status_topic: String,
}

impl BusPublisher {
    pub fn new(brokers: &str, order_topic: impl Into<String>, status_topic: impl Into<String>) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            order_topic: order_topic.into(),
            status_topic: status_topic.into(),
        })
    }

    fn topic_for(&self, kind: OutboxEventKind) -> &str {
        match kind {
            OutboxEventKind::OrderCreated => &self.order_topic,
            OutboxEventKind::OrderCancelled => &self.status_topic,
        }
    }

    /// Publish every message in `batch`. Returns `Ok(())` only if every
    /// message was acknowledged; a single unacknowledged message fails the
    /// whole call (`BusError::PartialFailure` if some succeeded,
    /// `BusError::Unavailable` if none did) — the Relay treats both
    /// identically and rolls back the whole batch. No internal retry.
    pub async fn publish(&self, batch: &[OutboxMessage]) -> Result<(), BusError> {
        if batch.is_empty() {
            return Ok(());
        }

        let sends = batch.iter().map(|msg| self.send_one(msg));
        let results = futures_util::future::join_all(sends).await;

        let total = results.len();
        let failed = results.iter().filter(|r| r.is_err()).count();

        if failed == 0 {
            return Ok(());
        }
        if failed == total {
            let first_err = results.into_iter().find_map(Result::err).unwrap_or_default();
            return Err(BusError::Unavailable(first_err));
        }
        Err(BusError::PartialFailure { failed, total })
    }

    async fn send_one(&self, msg: &OutboxMessage) -> Result<(), String> {
        let key = msg.order_uuid.to_string();
        let record = FutureRecord::to(self.topic_for(msg.event_kind))
            .key(&key)
            .payload(&msg.payload_json);

        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _)| e.to_string())
    }
}

#[async_trait::async_trait]
impl Publisher for BusPublisher {
    async fn publish(&self, batch: &[OutboxMessage]) -> Result<(), BusError> {
        BusPublisher::publish(self, batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_message_payload_roundtrips_order_uuid() {
        let uuid = Uuid::new_v4();
        let msg = OutboxMessage::for_order_created(uuid);
        let payload: OutboxPayload = serde_json::from_str(&msg.payload_json).unwrap();
        assert_eq!(payload.order_uuid, uuid);
        assert_eq!(msg.event_kind, OutboxEventKind::OrderCreated);
    }

    #[test]
    fn publish_of_empty_batch_is_trivially_ok() {
        // No producer required: the empty-batch short circuit never touches rdkafka.
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let publisher = BusPublisher::new("localhost:9092", "orders", "order-status").unwrap();
        rt.block_on(async {
            assert!(publisher.publish(&[]).await.is_ok());
        });
    }
}
