use std::fmt;

use tracing::debug;

use crate::counter::{
    ArmSide, CountSignal, CountingStrategy, Direction, EventDeduplicator, TrackId,
    TrackObservation, TrackState,
};

/// Geometry and labels of the count line
#[derive(Debug, Clone)]
pub struct CrossingConfig {
    /// Line position as a fraction of the (rotated) frame width. Default: 0.5
    pub line_pos: f32,
    /// Distance from the line (px) beyond which a side is confidently armed. Default: 80
    pub arm_distance: f32,
    /// Distance from the line (px) within which a crossing is recognized. Default: 18
    pub cross_tolerance: f32,
    /// Boxes lower than this (px) are too far away to trust. Default: 110
    pub min_box_height: f32,
    /// Label for tracks armed on the left side. Default: In
    pub dir_left_to_right: Direction,
    /// Label for tracks armed on the right side. Default: Out
    pub dir_right_to_left: Direction,
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            line_pos: 0.5,
            arm_distance: 80.0,
            cross_tolerance: 18.0,
            min_box_height: 110.0,
            dir_left_to_right: Direction::In,
            dir_right_to_left: Direction::Out,
        }
    }
}

/// Hysteresis-based vertical line crossing counter.
///
/// Tracks arm on the side they are confidently on and fire once their head point
/// comes within `cross_tolerance` of the line. Each (track, epoch) fires at most once.
pub struct CrossingStrategy {
    config: CrossingConfig,
    line_x: f32,
    dedup: EventDeduplicator,
}

impl CrossingStrategy {
    /// Creates new instance of CrossingStrategy
    ///
    /// Basic usage:
    ///
    /// ```
    /// use people_counter_rs::counter::{CrossingConfig, CrossingStrategy};
    /// let mut strategy = CrossingStrategy::new(CrossingConfig::default());
    /// ```
    pub fn new(_config: CrossingConfig) -> Self {
        CrossingStrategy {
            config: _config,
            line_x: 0.0,
            dedup: EventDeduplicator::new(),
        }
    }
    pub fn line_x(&self) -> f32 {
        self.line_x
    }
    pub fn config(&self) -> &CrossingConfig {
        &self.config
    }
    pub fn deduplicator(&self) -> &EventDeduplicator {
        &self.dedup
    }
    /// Signed horizontal distance of the head point from the line. Negative is left.
    pub fn signed_distance(&self, observation: &TrackObservation) -> f32 {
        observation.bbox.head_point().x - self.line_x
    }
    fn direction_for(&self, side: ArmSide) -> Direction {
        match side {
            ArmSide::Left => self.config.dir_left_to_right,
            ArmSide::Right => self.config.dir_right_to_left,
        }
    }
}

impl CountingStrategy for CrossingStrategy {
    fn name(&self) -> &'static str {
        "line"
    }
    fn set_frame_width(&mut self, width: u32) {
        self.line_x = (width as f32 * self.config.line_pos).floor();
    }
    fn accepts(&self, observation: &TrackObservation) -> bool {
        observation.bbox.height() >= self.config.min_box_height
    }
    fn is_claimed(&self, track_id: TrackId, epoch: u32) -> bool {
        self.dedup.contains(track_id, epoch)
    }
    fn evaluate(
        &mut self,
        track: &mut TrackState,
        observation: &TrackObservation,
    ) -> Option<CountSignal> {
        let d = self.signed_distance(observation);
        let side_of = |d: f32| if d < 0.0 { ArmSide::Left } else { ArmSide::Right };

        // Auto-arm tracks first seen between the tolerance band and the arm distance
        if track.get_armed_side().is_none() && d.abs() > self.config.cross_tolerance {
            track.arm(side_of(d));
        }
        // Hysteresis
        if d <= -self.config.arm_distance {
            track.arm(ArmSide::Left);
        } else if d >= self.config.arm_distance {
            track.arm(ArmSide::Right);
        }

        if d.abs() > self.config.cross_tolerance {
            return None;
        }
        let side = track.get_armed_side()?;
        // Disarm regardless of the claim, jitter near the line must not re-fire
        track.disarm();

        let track_id = track.get_track_id();
        let epoch = track.get_epoch();
        if !self.dedup.try_claim(track_id, epoch) {
            debug!(track_id, epoch, "crossing already counted for this presence");
            return None;
        }
        let signal = CountSignal::new(self.direction_for(side))
            .with_meta("strategy", self.name())
            .with_meta("event", "unique_once_per_person")
            .with_meta("armed_side", side.as_str())
            .with_meta("line_x", self.line_x)
            .with_meta("distance", d);
        Some(signal)
    }
}

impl fmt::Display for CrossingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Line position: {} (x = {})\n\tArm distance: {}\n\tCross tolerance: {}\n\tMin box height: {}",
            self.config.line_pos,
            self.line_x,
            self.config.arm_distance,
            self.config.cross_tolerance,
            self.config.min_box_height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::TrackRegistry;
    use crate::utils::BBox;

    // Box whose head point lands at x, tall enough to pass the height filter
    fn person_at(track_id: u64, x: f32, timestamp: f64) -> TrackObservation {
        TrackObservation::new(
            track_id,
            BBox::new(x - 30.0, 100.0, x + 30.0, 300.0),
            timestamp,
        )
    }

    fn run(
        strategy: &mut CrossingStrategy,
        registry: &mut TrackRegistry,
        observation: &TrackObservation,
    ) -> Option<CountSignal> {
        if !strategy.accepts(observation) {
            return None;
        }
        registry.observe(observation.track_id, observation.timestamp);
        let track = registry.get_mut(observation.track_id).unwrap();
        strategy.evaluate(track, observation)
    }

    fn strategy() -> CrossingStrategy {
        let mut strategy = CrossingStrategy::new(CrossingConfig::default());
        strategy.set_frame_width(1000);
        strategy
    }

    #[test]
    fn test_line_from_fraction() {
        let mut strategy = strategy();
        assert_eq!(strategy.line_x(), 500.0);
        strategy.set_frame_width(641);
        assert_eq!(strategy.line_x(), 320.0);
    }

    #[test]
    fn test_left_to_right_fires_once() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let xs = [300.0, 350.0, 400.0, 450.0, 490.0, 500.0, 510.0, 530.0, 600.0];
        let mut fired = vec![];
        for (i, x) in xs.iter().enumerate() {
            if let Some(signal) = run(&mut strategy, &mut registry, &person_at(1, *x, i as f64)) {
                fired.push(signal);
            }
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].direction, Direction::In);
        assert_eq!(fired[0].metadata["armed_side"], "L");
    }

    #[test]
    fn test_right_side_fires_out() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        assert!(run(&mut strategy, &mut registry, &person_at(2, 700.0, 0.0)).is_none());
        let signal = run(&mut strategy, &mut registry, &person_at(2, 510.0, 0.1)).unwrap();
        assert_eq!(signal.direction, Direction::Out);
    }

    #[test]
    fn test_jitter_never_fires() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let xs = [482.0, 518.0, 500.0, 490.0, 511.0, 483.0, 517.0];
        for (i, x) in xs.iter().enumerate() {
            assert!(run(&mut strategy, &mut registry, &person_at(3, *x, i as f64)).is_none());
        }
        assert_eq!(registry.get(3).unwrap().get_armed_side(), None);
        assert!(strategy.deduplicator().is_empty());
    }

    #[test]
    fn test_rearm_does_not_count_twice_in_one_epoch() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let xs = [380.0, 495.0, 620.0, 505.0, 380.0, 495.0];
        let fired = xs
            .iter()
            .enumerate()
            .filter_map(|(i, x)| run(&mut strategy, &mut registry, &person_at(4, *x, i as f64)))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_claim_survives_pruning() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        assert!(run(&mut strategy, &mut registry, &person_at(7, 380.0, 0.0)).is_none());
        assert!(run(&mut strategy, &mut registry, &person_at(7, 495.0, 0.1)).is_some());

        assert_eq!(registry.prune(0.1 + 25.5), 1);
        assert!(!registry.contains(7));
        assert!(strategy.is_claimed(7, 0));
        assert_eq!(strategy.deduplicator().len(), 1);

        // Same identifier back later is a new presence and is not blocked by the old claim
        assert!(run(&mut strategy, &mut registry, &person_at(7, 380.0, 26.0)).is_none());
        assert_eq!(registry.get(7).map(|t| t.get_epoch()), Some(1));
        assert!(run(&mut strategy, &mut registry, &person_at(7, 495.0, 26.1)).is_some());
        assert!(strategy.is_claimed(7, 0));
        assert!(strategy.is_claimed(7, 1));
    }

    #[test]
    fn test_small_boxes_rejected() {
        let strategy = strategy();
        let small = TrackObservation::new(5, BBox::new(480.0, 100.0, 520.0, 200.0), 0.0);
        assert!(!strategy.accepts(&small));
        assert!(strategy.accepts(&person_at(5, 500.0, 0.0)));
    }
}
