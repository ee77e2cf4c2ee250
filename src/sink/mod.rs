//! Delivery of count events to downstream collaborators
mod emitter;
mod http;
pub mod relay;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::counter::{CountEvent, SinkError};

pub use self::{emitter::*, http::*};

/// Receiver of count events. Durable storage is its concern, not the counter's.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, event: &CountEvent) -> Result<(), SinkError>;
}

/// Keeps delivered events in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<CountEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<CountEvent> {
        self.events.lock().clone()
    }
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }
    async fn deliver(&self, event: &CountEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Prints every event as one JSON line on stdout and keeps nothing
#[derive(Default)]
pub struct StdoutSink;

#[async_trait]
impl EventSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }
    async fn deliver(&self, event: &CountEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)
            .map_err(|err| SinkError::Rejected(err.to_string()))?;
        println!("{}", line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{CountSignal, Direction};

    #[tokio::test]
    async fn test_stdout_sink_delivers() {
        let event = CountEvent::new("CAM-T", 1, 7, 0, 1.0, CountSignal::new(Direction::In));
        assert!(StdoutSink.deliver(&event).await.is_ok());
        assert_eq!(StdoutSink.name(), "stdout");
    }
}
