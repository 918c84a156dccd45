//! Asynchronous channel-fanout publisher variant, kept for historical
//! wiring. Strictly weaker than the outbox path (no crash-safety) and not
//! wired into the default daemon binary. New call sites should use
//! `BusPublisher::publish` directly.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{BusError, BusPublisher, OutboxMessage};

const CHANNEL_SEND_DEADLINE: Duration = Duration::from_secs(5);

/// Handle to a running async publisher worker. `send` feeds the input
/// channel; `successes`/`failures` are drained by the caller to observe
/// outcomes. Dropping every clone of the handle's sender closes the input
/// channel, which is the worker's sole termination signal — it then drains
/// to completion and its output channels close in turn.
pub struct AsyncPublisherHandle {
    input_tx: mpsc::Sender<OutboxMessage>,
    successes_rx: mpsc::Receiver<Uuid>,
    failures_rx: mpsc::Receiver<(Uuid, BusError)>,
    worker: JoinHandle<()>,
}

impl AsyncPublisherHandle {
    /// Submit a message to the worker. Bounded by a 5-second deadline —
    /// exceeding it (because the buffer is full and the worker has stalled)
    /// surfaces `BusError::ChannelTimeout` without blocking the caller
    /// indefinitely.
    pub async fn send(&self, msg: OutboxMessage) -> Result<(), BusError> {
        match tokio::time::timeout(CHANNEL_SEND_DEADLINE, self.input_tx.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(BusError::ChannelClosed),
            Err(_) => Err(BusError::ChannelTimeout(CHANNEL_SEND_DEADLINE)),
        }
    }

    /// Receive the next published order id, or `None` once the worker has
    /// drained and exited.
    pub async fn recv_success(&mut self) -> Option<Uuid> {
        self.successes_rx.recv().await
    }

    /// Receive the next publish failure, or `None` once the worker has
    /// drained and exited.
    pub async fn recv_failure(&mut self) -> Option<(Uuid, BusError)> {
        self.failures_rx.recv().await
    }

    /// Drop the input sender (closing it) and wait for the worker to finish
    /// draining in-flight messages. Used by cancellation paths.
    pub async fn close_and_join(self) {
        drop(self.input_tx);
        let _ = self.worker.await;
    }
}

/// Spawn the worker task. `buffer` bounds the input channel's capacity.
pub fn spawn(bus: BusPublisher, buffer: usize) -> AsyncPublisherHandle {
    let (input_tx, mut input_rx) = mpsc::channel::<OutboxMessage>(buffer);
    let (successes_tx, successes_rx) = mpsc::channel::<Uuid>(buffer);
    let (failures_tx, failures_rx) = mpsc::channel::<(Uuid, BusError)>(buffer);

    let worker = tokio::spawn(async move {
        while let Some(msg) = input_rx.recv().await {
            let order_uuid = msg.order_uuid;
            match bus.publish(&[msg]).await {
                Ok(()) => {
                    if successes_tx.send(order_uuid).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if failures_tx.send((order_uuid, e)).await.is_err() {
                        break;
                    }
                }
            }
        }
        // input_rx dropped here; successes_tx/failures_tx drop with it,
        // closing both output channels so callers' drain loops terminate.
    });

    AsyncPublisherHandle {
        input_tx,
        successes_rx,
        failures_rx,
        worker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_send_deadline_is_five_seconds() {
        assert_eq!(CHANNEL_SEND_DEADLINE, Duration::from_secs(5));
    }
}
