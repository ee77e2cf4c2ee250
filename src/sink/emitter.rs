use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::counter::{CountEvent, SinkError};
use crate::sink::EventSink;

/// Delivery settings of the emitter worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Events waiting for delivery before new ones get dropped. Default: 256
    pub queue_capacity: usize,
    /// Per-attempt timeout. Default: 1500
    pub timeout_ms: u64,
    /// Extra attempts after the first failure. Default: 2
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on every next one. Default: 200
    pub retry_backoff_ms: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            timeout_ms: 1500,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

/// Fire-and-forget front of an asynchronous delivery worker.
///
/// Local counting never waits for the sink and never learns about delivery failures.
/// Dropping the emitter closes the queue; the worker delivers what is queued and stops.
pub struct EventEmitter {
    tx: mpsc::Sender<CountEvent>,
}

impl EventEmitter {
    /// Starts the worker on the current tokio runtime
    pub fn spawn(sink: Arc<dyn EventSink>, config: EmitterConfig) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<CountEvent>(config.queue_capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                deliver_with_retry(sink.as_ref(), &event, &config).await;
            }
            debug!(sink = sink.name(), "emitter queue closed");
        });
        (EventEmitter { tx }, handle)
    }
    /// Queues `event` without blocking. Returns false when the event was dropped.
    pub fn emit(&self, event: CountEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    event_id = %event.event_id,
                    track_id = event.track_id,
                    "emitter queue full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    event_id = %event.event_id,
                    error = %SinkError::Closed,
                    "event dropped"
                );
                false
            }
        }
    }
}

/// Delivers one event, retrying with exponential backoff. Returns whether it got through.
pub async fn deliver_with_retry(
    sink: &dyn EventSink,
    event: &CountEvent,
    config: &EmitterConfig,
) -> bool {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut backoff = Duration::from_millis(config.retry_backoff_ms);
    let attempts = config.max_retries + 1;
    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(timeout, sink.deliver(event)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(config.timeout_ms)),
        };
        match result {
            Ok(()) => {
                debug!(event_id = %event.event_id, sink = sink.name(), attempt, "event delivered");
                return true;
            }
            Err(err) if attempt < attempts => {
                debug!(event_id = %event.event_id, attempt, error = %err, "delivery failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => {
                warn!(
                    event_id = %event.event_id,
                    sink = sink.name(),
                    attempts,
                    error = %err,
                    "giving up on event delivery"
                );
            }
        }
    }
    false
}
