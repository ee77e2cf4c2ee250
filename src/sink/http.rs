use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::BackendConfig;
use crate::counter::{CountEvent, Direction, SinkError};
use crate::sink::EventSink;

/// Body of `POST /events` of the ingestion API
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub camera_id: String,
    pub direction: Direction,
    pub count_delta: i32,
    pub meta: Map<String, Value>,
}

impl From<&CountEvent> for EventPayload {
    fn from(event: &CountEvent) -> Self {
        let mut meta = Map::new();
        meta.insert("track_id".to_string(), Value::from(event.track_id));
        meta.insert("person_id".to_string(), Value::from(event.person_id));
        meta.insert("track_epoch".to_string(), Value::from(event.epoch));
        meta.insert("event_id".to_string(), Value::from(event.event_id.to_string()));
        meta.insert("ts".to_string(), Value::from(event.timestamp));
        for (key, value) in event.metadata.iter() {
            meta.insert(key.clone(), value.clone());
        }
        EventPayload {
            camera_id: event.camera_id.clone(),
            direction: event.direction,
            count_delta: event.count_delta,
            meta,
        }
    }
}

/// Posts count events to the ingestion API as JSON
pub struct HttpEventSink {
    url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpEventSink {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, SinkError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpEventSink {
            url: format!("{}/events", base_url.trim_end_matches('/')),
            api_key,
            http_client,
        })
    }
    pub fn from_config(config: &BackendConfig, timeout: Duration) -> Result<Self, SinkError> {
        Self::new(&config.url, config.api_key.clone(), timeout)
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    fn name(&self) -> &str {
        "http"
    }
    async fn deliver(&self, event: &CountEvent) -> Result<(), SinkError> {
        let mut request = self
            .http_client
            .post(&self.url)
            .json(&EventPayload::from(event));
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CountSignal;

    #[test]
    fn test_payload_shape() {
        let signal = CountSignal::new(Direction::Out)
            .with_meta("event", "unique_once_per_person")
            .with_meta("snapshot", Value::Null);
        let event = CountEvent::new("CAM-PC-01", 3, 7, 1, 42.0, signal);
        let payload = serde_json::to_value(EventPayload::from(&event)).unwrap();
        assert_eq!(payload["camera_id"], "CAM-PC-01");
        assert_eq!(payload["direction"], "out");
        assert_eq!(payload["count_delta"], 1);
        assert_eq!(payload["meta"]["track_id"], 7);
        assert_eq!(payload["meta"]["person_id"], 3);
        assert_eq!(payload["meta"]["track_epoch"], 1);
        assert_eq!(payload["meta"]["event"], "unique_once_per_person");
        assert!(payload["meta"]["snapshot"].is_null());
    }

    #[test]
    fn test_url_is_normalized() {
        let sink = HttpEventSink::new("http://127.0.0.1:8000/", None, Duration::from_millis(1500)).unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:8000/events");
    }
}
