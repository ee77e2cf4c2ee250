use serde::{Deserialize, Serialize};

use crate::counter::CounterError;
use crate::utils::BBox;

/// Identifier handed out by the upstream tracker. Small integers get recycled.
pub type TrackId = u64;

/// One tracked box of one frame, as reported by the detector/tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObservation {
    pub track_id: TrackId,
    pub bbox: BBox,
    /// Seconds. Inside a `FrameBatch` the frame timestamp takes precedence.
    #[serde(default)]
    pub timestamp: f64,
}

impl TrackObservation {
    pub fn new(_track_id: TrackId, _bbox: BBox, _timestamp: f64) -> Self {
        TrackObservation {
            track_id: _track_id,
            bbox: _bbox,
            timestamp: _timestamp,
        }
    }
    pub fn validate(&self) -> Result<(), CounterError> {
        if self.bbox.is_degenerate() {
            return Err(CounterError::DegenerateBox(format!(
                "track {} has box {}",
                self.track_id, self.bbox
            )));
        }
        Ok(())
    }
}

/// Detections of a single frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameBatch {
    pub timestamp: f64,
    /// Width of the picture the boxes were detected on (before rotation)
    pub frame_width: u32,
    /// Height of the picture the boxes were detected on (before rotation)
    pub frame_height: u32,
    #[serde(default)]
    pub observations: Vec<TrackObservation>,
}

impl FrameBatch {
    pub fn new(_timestamp: f64, _frame_width: u32, _frame_height: u32) -> Self {
        FrameBatch {
            timestamp: _timestamp,
            frame_width: _frame_width,
            frame_height: _frame_height,
            observations: Vec::new(),
        }
    }
    /// Adds box of `track_id` stamped with the frame timestamp
    pub fn with_track(mut self, track_id: TrackId, bbox: BBox) -> Self {
        self.observations
            .push(TrackObservation::new(track_id, bbox, self.timestamp));
        self
    }
}
