use std::fmt;

use tracing::debug;

use crate::counter::{CountSignal, CountingStrategy, Direction, TrackObservation, TrackState};
use crate::utils::BBox;

#[derive(Debug, Clone)]
pub struct DwellConfig {
    /// Service region in (rotated) frame pixels
    pub region: BBox,
    /// Consecutive frames inside the region before the track is "in service". Default: 8
    pub dwell_frames: u32,
    /// Minimum seconds between two counts of the same track identifier. Default: 10
    pub cooldown_seconds: f64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            region: BBox::new(0.0, 0.0, 0.0, 0.0),
            dwell_frames: 8,
            cooldown_seconds: 10.0,
        }
    }
}

/// Counts tracks that stayed in a region long enough and then left it.
///
/// Cooldown is kept per track identifier, not per epoch, so a person stepping in and out
/// of the region cannot produce several counts within `cooldown_seconds`.
pub struct DwellZoneStrategy {
    config: DwellConfig,
}

impl DwellZoneStrategy {
    /// Creates new instance of DwellZoneStrategy
    ///
    /// Basic usage:
    ///
    /// ```
    /// use people_counter_rs::counter::{DwellConfig, DwellZoneStrategy};
    /// use people_counter_rs::utils::BBox;
    /// let strategy = DwellZoneStrategy::new(DwellConfig {
    ///     region: BBox::new(200.0, 100.0, 600.0, 400.0),
    ///     dwell_frames: 8,
    ///     cooldown_seconds: 10.0,
    /// });
    /// ```
    pub fn new(_config: DwellConfig) -> Self {
        DwellZoneStrategy { config: _config }
    }
    pub fn config(&self) -> &DwellConfig {
        &self.config
    }
    fn cooled_down(&self, track: &TrackState, now: f64) -> bool {
        match track.get_last_counted_at() {
            Some(last) => now - last >= self.config.cooldown_seconds,
            None => true,
        }
    }
}

impl CountingStrategy for DwellZoneStrategy {
    fn name(&self) -> &'static str {
        "dwell"
    }
    fn evaluate(
        &mut self,
        track: &mut TrackState,
        observation: &TrackObservation,
    ) -> Option<CountSignal> {
        let head = observation.bbox.head_point();
        if self.config.region.contains(&head) {
            if track.inc_dwell() >= self.config.dwell_frames {
                track.set_in_service(true);
            }
            return None;
        }

        let mut signal = None;
        if track.is_in_service() {
            let now = observation.timestamp;
            if self.cooled_down(track, now) {
                track.mark_counted(now);
                let region = &self.config.region;
                signal = Some(
                    CountSignal::new(Direction::Unknown)
                        .with_meta("strategy", self.name())
                        .with_meta("event", "ticket_pass")
                        .with_meta(
                            "roi",
                            serde_json::json!({
                                "x1": region.x1,
                                "y1": region.y1,
                                "x2": region.x2,
                                "y2": region.y2,
                            }),
                        ),
                );
            } else {
                debug!(
                    track_id = track.get_track_id(),
                    "left service region within cooldown"
                );
            }
            // Unmark even when suppressed by cooldown
            track.set_in_service(false);
        }
        track.reset_dwell();
        signal
    }
}

impl fmt::Display for DwellZoneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Region: {}\n\tDwell frames: {}\n\tCooldown: {}s",
            self.config.region, self.config.dwell_frames, self.config.cooldown_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::TrackRegistry;

    fn strategy() -> DwellZoneStrategy {
        DwellZoneStrategy::new(DwellConfig {
            region: BBox::new(200.0, 100.0, 600.0, 400.0),
            dwell_frames: 3,
            cooldown_seconds: 10.0,
        })
    }

    // Head point of this box is (x, 130): inside the region for 200 <= x <= 600
    fn person_at(x: f32, timestamp: f64) -> TrackObservation {
        TrackObservation::new(9, BBox::new(x - 20.0, 100.0, x + 20.0, 300.0), timestamp)
    }

    fn feed(
        strategy: &mut DwellZoneStrategy,
        registry: &mut TrackRegistry,
        xs: &[(f32, f64)],
    ) -> usize {
        let mut fired = 0;
        for (x, ts) in xs {
            let observation = person_at(*x, *ts);
            registry.observe(observation.track_id, observation.timestamp);
            let track = registry.get_mut(observation.track_id).unwrap();
            if strategy.evaluate(track, &observation).is_some() {
                fired += 1;
            }
        }
        fired
    }

    #[test]
    fn test_short_visit_does_not_count() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let fired = feed(
            &mut strategy,
            &mut registry,
            &[(400.0, 0.0), (400.0, 0.1), (100.0, 0.2)],
        );
        assert_eq!(fired, 0);
        assert_eq!(registry.get(9).unwrap().get_dwell_frames(), 0);
    }

    #[test]
    fn test_dwell_then_exit_counts_once() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let fired = feed(
            &mut strategy,
            &mut registry,
            &[(400.0, 0.0), (400.0, 0.1), (400.0, 0.2), (100.0, 0.3), (90.0, 0.4)],
        );
        assert_eq!(fired, 1);
        assert_eq!(registry.get(9).unwrap().get_last_counted_at(), Some(0.3));
    }

    #[test]
    fn test_cooldown_suppresses_then_allows() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let visit = |start: f64| {
            vec![
                (400.0, start),
                (400.0, start + 0.1),
                (400.0, start + 0.2),
                (100.0, start + 0.3),
            ]
        };
        assert_eq!(feed(&mut strategy, &mut registry, &visit(0.0)), 1);
        // Second exit comes 5s after the first count
        assert_eq!(feed(&mut strategy, &mut registry, &visit(5.0)), 0);
        // Cooldown elapsed
        assert_eq!(feed(&mut strategy, &mut registry, &visit(11.0)), 1);
    }

    #[test]
    fn test_signal_carries_region() {
        let mut strategy = strategy();
        let mut registry = TrackRegistry::new(25.0);
        let mut last = None;
        for (x, ts) in [(400.0, 0.0), (400.0, 0.1), (400.0, 0.2), (100.0, 0.3)] {
            let observation = person_at(x, ts);
            registry.observe(9, ts);
            last = strategy.evaluate(registry.get_mut(9).unwrap(), &observation);
        }
        let signal = last.unwrap();
        assert_eq!(signal.direction, Direction::Unknown);
        assert_eq!(signal.metadata["event"], "ticket_pass");
        assert_eq!(signal.metadata["roi"]["x2"], 600.0);
    }
}
