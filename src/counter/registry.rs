use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counter::TrackId;

/// Side of the count line a track was last confidently seen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmSide::Left => "L",
            ArmSide::Right => "R",
        }
    }
}

/// Everything the counter remembers about one track identifier
#[derive(Debug, Clone)]
pub struct TrackState {
    track_id: TrackId,
    last_seen_at: f64,
    epoch: u32,
    dwell_frames: u32,
    in_service: bool,
    armed_side: Option<ArmSide>,
    last_counted_at: Option<f64>,
}

impl TrackState {
    fn new(_track_id: TrackId, _timestamp: f64, _epoch: u32) -> Self {
        TrackState {
            track_id: _track_id,
            last_seen_at: _timestamp,
            epoch: _epoch,
            dwell_frames: 0,
            in_service: false,
            armed_side: None,
            last_counted_at: None,
        }
    }
    pub fn get_track_id(&self) -> TrackId {
        self.track_id
    }
    pub fn get_last_seen_at(&self) -> f64 {
        self.last_seen_at
    }
    pub fn get_epoch(&self) -> u32 {
        self.epoch
    }
    /* Line crossing */
    pub fn get_armed_side(&self) -> Option<ArmSide> {
        self.armed_side
    }
    pub fn arm(&mut self, side: ArmSide) {
        self.armed_side = Some(side)
    }
    pub fn disarm(&mut self) {
        self.armed_side = None
    }
    /* Dwell zone */
    pub fn get_dwell_frames(&self) -> u32 {
        self.dwell_frames
    }
    pub fn inc_dwell(&mut self) -> u32 {
        self.dwell_frames += 1;
        self.dwell_frames
    }
    pub fn reset_dwell(&mut self) {
        self.dwell_frames = 0
    }
    pub fn is_in_service(&self) -> bool {
        self.in_service
    }
    pub fn set_in_service(&mut self, in_service: bool) {
        self.in_service = in_service
    }
    /* Cooldown */
    pub fn get_last_counted_at(&self) -> Option<f64> {
        self.last_counted_at
    }
    pub fn mark_counted(&mut self, timestamp: f64) {
        self.last_counted_at = Some(timestamp)
    }
    // Forget per-person state when the identifier now belongs to someone else.
    // Cooldown is per identifier and survives.
    fn start_epoch(&mut self, epoch: u32) {
        self.epoch = epoch;
        self.armed_side = None;
        self.dwell_frames = 0;
        self.in_service = false;
    }
}

// What is left of a pruned track: enough to keep epochs monotonic and cooldown alive
#[derive(Debug, Clone, Copy)]
struct Retired {
    epoch: u32,
    last_counted_at: Option<f64>,
}

/// Owner of per-track state with identity-reuse (epoch) detection
pub struct TrackRegistry {
    // Seconds of absence after which identifier is considered to be someone else. Default is 25.0
    ttl: f64,
    // Storage
    tracks: HashMap<TrackId, TrackState>,
    // Pruned identifiers
    retired: HashMap<TrackId, Retired>,
}

impl Default for TrackRegistry {
    fn default() -> Self {
        TrackRegistry::new(25.0)
    }
}

impl TrackRegistry {
    /// Creates new instance of TrackRegistry
    ///
    /// Basic usage:
    ///
    /// ```
    /// use people_counter_rs::counter::TrackRegistry;
    /// let mut registry = TrackRegistry::new(25.0);
    /// assert_eq!(registry.observe(7, 0.0), (0, false));
    /// assert_eq!(registry.observe(7, 30.0), (1, true));
    /// ```
    pub fn new(_ttl: f64) -> Self {
        TrackRegistry {
            ttl: _ttl,
            tracks: HashMap::new(),
            retired: HashMap::new(),
        }
    }
    pub fn ttl(&self) -> f64 {
        self.ttl
    }
    /// Registers sighting of `track_id` at `timestamp`.
    ///
    /// Returns current epoch of the identifier and whether that epoch has just started
    /// because the identifier had been absent longer than TTL.
    pub fn observe(&mut self, track_id: TrackId, timestamp: f64) -> (u32, bool) {
        if let Some(state) = self.tracks.get_mut(&track_id) {
            let absent_for = timestamp - state.last_seen_at;
            let mut is_new_epoch = false;
            if absent_for > self.ttl {
                let next = state.epoch + 1;
                state.start_epoch(next);
                is_new_epoch = true;
                debug!(track_id, epoch = next, absent_for, "track identifier reused");
            }
            state.last_seen_at = timestamp;
            return (state.epoch, is_new_epoch);
        }
        let (state, is_new_epoch) = match self.retired.remove(&track_id) {
            Some(retired) => {
                let mut state = TrackState::new(track_id, timestamp, retired.epoch + 1);
                state.last_counted_at = retired.last_counted_at;
                debug!(track_id, epoch = state.epoch, "pruned track identifier reappeared");
                (state, true)
            }
            None => (TrackState::new(track_id, timestamp, 0), false),
        };
        let epoch = state.epoch;
        self.tracks.insert(track_id, state);
        (epoch, is_new_epoch)
    }
    /// Removes every track not seen for more than TTL. Returns number of removed tracks.
    pub fn prune(&mut self, now: f64) -> usize {
        let ttl = self.ttl;
        let before = self.tracks.len();
        let retired = &mut self.retired;
        self.tracks.retain(|track_id, state| {
            let delete = now - state.last_seen_at > ttl;
            if delete {
                retired.insert(
                    *track_id,
                    Retired {
                        epoch: state.epoch,
                        last_counted_at: state.last_counted_at,
                    },
                );
            }
            !delete // <- keep the ones seen recently
        });
        before - self.tracks.len()
    }
    pub fn get(&self, track_id: TrackId) -> Option<&TrackState> {
        self.tracks.get(&track_id)
    }
    pub fn get_mut(&mut self, track_id: TrackId) -> Option<&mut TrackState> {
        self.tracks.get_mut(&track_id)
    }
    pub fn contains(&self, track_id: TrackId) -> bool {
        self.tracks.contains_key(&track_id)
    }
    /// Number of live (not pruned) tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl fmt::Display for TrackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TTL: {}\n\tLive tracks: {}\n\tRetired identifiers: {}",
            self.ttl,
            self.tracks.len(),
            self.retired.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_starts_epoch_zero() {
        let mut registry = TrackRegistry::new(25.0);
        assert_eq!(registry.observe(3, 10.0), (0, false));
        assert_eq!(registry.observe(3, 11.0), (0, false));
        assert_eq!(registry.get(3).unwrap().get_last_seen_at(), 11.0);
    }

    #[test]
    fn test_reuse_after_ttl_bumps_epoch_and_clears_state() {
        let mut registry = TrackRegistry::new(25.0);
        registry.observe(7, 0.0);
        {
            let state = registry.get_mut(7).unwrap();
            state.arm(ArmSide::Left);
            state.inc_dwell();
            state.set_in_service(true);
            state.mark_counted(0.0);
        }
        // Exactly TTL is still the same person
        assert_eq!(registry.observe(7, 25.0), (0, false));
        assert_eq!(registry.observe(7, 50.5), (1, true));
        let state = registry.get(7).unwrap();
        assert_eq!(state.get_armed_side(), None);
        assert_eq!(state.get_dwell_frames(), 0);
        assert!(!state.is_in_service());
        assert_eq!(state.get_last_counted_at(), Some(0.0));
    }

    #[test]
    fn test_prune_removes_stale_only() {
        let mut registry = TrackRegistry::new(25.0);
        registry.observe(1, 0.0);
        registry.observe(2, 20.0);
        assert_eq!(registry.prune(25.1), 1);
        assert!(!registry.contains(1));
        assert!(registry.contains(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_epoch_survives_pruning() {
        let mut registry = TrackRegistry::new(25.0);
        registry.observe(7, 0.0);
        registry.observe(7, 30.0);
        registry.get_mut(7).unwrap().mark_counted(30.0);
        assert_eq!(registry.prune(60.0), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.observe(7, 61.0), (2, true));
        assert_eq!(registry.get(7).unwrap().get_last_counted_at(), Some(30.0));
    }
}
