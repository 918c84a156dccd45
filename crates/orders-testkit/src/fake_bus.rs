//! A `Publisher` double for exercising the relay's at-least-once behavior
//! under a bus flap, without a live Kafka broker.
//!
//! A shared, lock-protected call log plus a scripted failure count.

use orders_bus::{BusError, OutboxMessage, Publisher};
use tokio::sync::Mutex;

struct Inner {
    calls: usize,
    fail_first_n: usize,
    received: Vec<Vec<OutboxMessage>>,
}

/// Records every `publish` call it receives and fails the first
/// `fail_first_n` of them with `BusError::Unavailable`, succeeding
/// afterward.
pub struct FakeBus {
    inner: Mutex<Inner>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    /// A bus that fails its first `n` publish calls, then succeeds.
    pub fn failing_first(n: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { calls: 0, fail_first_n: n, received: Vec::new() }),
        }
    }

    /// Total number of `publish` calls observed so far.
    pub async fn call_count(&self) -> usize {
        self.inner.lock().await.calls
    }

    /// The batches passed to `publish`, in call order, including failed
    /// attempts (the relay rolls those back in the store, but the bus
    /// still saw the batch).
    pub async fn received_batches(&self) -> Vec<Vec<OutboxMessage>> {
        self.inner.lock().await.received.clone()
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Publisher for FakeBus {
    async fn publish(&self, batch: &[OutboxMessage]) -> Result<(), BusError> {
        let mut inner = self.inner.lock().await;
        inner.calls += 1;
        inner.received.push(batch.to_vec());
        if inner.calls <= inner.fail_first_n {
            return Err(BusError::Unavailable("fake bus flap".to_string()));
        }
        Ok(())
    }
}
