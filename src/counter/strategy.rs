use crate::counter::{CountSignal, TrackId, TrackObservation, TrackState};

/// Common interface of counting policies.
/// Enables strategy-agnostic pipeline: `CameraPipeline` holds a `Box<dyn CountingStrategy>`
///
/// Implementations:
/// - `CrossingStrategy` - counts crossings of a vertical line, once per (track, epoch)
/// - `DwellZoneStrategy` - counts leaving a region after dwelling in it, with per-track cooldown
pub trait CountingStrategy: Send {
    fn name(&self) -> &'static str;
    /// Frame width is needed when the geometry is given as a fraction of the picture
    fn set_frame_width(&mut self, _width: u32) {}
    /// Policy filter applied before the observation reaches the registry
    fn accepts(&self, _observation: &TrackObservation) -> bool {
        true
    }
    /// Whether the presence `(track_id, epoch)` is already counted for good.
    /// Policies without per-presence dedup never claim anything.
    fn is_claimed(&self, _track_id: TrackId, _epoch: u32) -> bool {
        false
    }
    /// Decides whether this observation produces a count.
    /// `track` has already been updated with the observation's timestamp and epoch.
    fn evaluate(
        &mut self,
        track: &mut TrackState,
        observation: &TrackObservation,
    ) -> Option<CountSignal>;
}
