use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::counter::TrackId;

/// Direction label attached to a count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a strategy reports when an observation should be counted.
/// Identity fields are stamped later by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSignal {
    pub direction: Direction,
    pub metadata: Map<String, Value>,
}

impl CountSignal {
    pub fn new(direction: Direction) -> Self {
        CountSignal {
            direction,
            metadata: Map::new(),
        }
    }
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Count that left the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEvent {
    pub event_id: Uuid,
    pub camera_id: String,
    pub direction: Direction,
    /// Display-only number of the counted presence
    pub person_id: u64,
    pub track_id: TrackId,
    pub epoch: u32,
    pub timestamp: f64,
    pub count_delta: i32,
    pub metadata: Map<String, Value>,
}

impl CountEvent {
    pub fn new(
        camera_id: &str,
        person_id: u64,
        track_id: TrackId,
        epoch: u32,
        timestamp: f64,
        signal: CountSignal,
    ) -> Self {
        CountEvent {
            event_id: Uuid::new_v4(),
            camera_id: camera_id.to_string(),
            direction: signal.direction,
            person_id,
            track_id,
            epoch,
            timestamp,
            count_delta: 1,
            metadata: signal.metadata,
        }
    }
    /// Reference to a stored picture of the counted person
    pub fn with_snapshot(mut self, snapshot: &str) -> Self {
        self.metadata
            .insert("snapshot".to_string(), Value::from(snapshot));
        self
    }
    pub fn key(&self) -> (TrackId, u32) {
        (self.track_id, self.epoch)
    }
}

/// Running totals per direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountTotals {
    pub total_in: u64,
    pub total_out: u64,
    pub total_unknown: u64,
}

impl CountTotals {
    pub fn add(&mut self, direction: Direction) {
        match direction {
            Direction::In => self.total_in += 1,
            Direction::Out => self.total_out += 1,
            Direction::Unknown => self.total_unknown += 1,
        }
    }
    pub fn total(&self) -> u64 {
        self.total_in + self.total_out + self.total_unknown
    }
}

impl fmt::Display for CountTotals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IN: {}  OUT: {}", self.total_in, self.total_out)?;
        if self.total_unknown > 0 {
            write!(f, "  TOTAL: {}", self.total())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::In).unwrap(), "\"in\"");
        let parsed: Direction = serde_json::from_str("\"out\"").unwrap();
        assert_eq!(parsed, Direction::Out);
    }

    #[test]
    fn test_event_from_signal() {
        let signal = CountSignal::new(Direction::Out).with_meta("strategy", "line");
        let event = CountEvent::new("CAM-01", 4, 7, 1, 12.5, signal).with_snapshot("a.jpg");
        assert_eq!(event.key(), (7, 1));
        assert_eq!(event.count_delta, 1);
        assert_eq!(event.metadata["strategy"], "line");
        assert_eq!(event.metadata["snapshot"], "a.jpg");
    }

    #[test]
    fn test_totals() {
        let mut totals = CountTotals::default();
        totals.add(Direction::In);
        totals.add(Direction::In);
        totals.add(Direction::Out);
        assert_eq!(totals.to_string(), "IN: 2  OUT: 1");
        totals.add(Direction::Unknown);
        assert_eq!(totals.total(), 4);
    }
}
