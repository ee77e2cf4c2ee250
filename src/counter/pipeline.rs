use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{CounterConfig, StrategyKind};
use crate::counter::{
    CountEvent, CountTotals, CounterError, CountingStrategy, CrossingStrategy, DwellZoneStrategy,
    FrameBatch, GarbageCollector, PersonIds, TrackObservation, TrackRegistry,
};
use crate::utils::Rotation;

/// Pipeline shared between frame processing and the GC timer
pub type SharedPipeline = Arc<Mutex<CameraPipeline>>;

/// Per-camera orchestrator: registry, counting strategy and garbage collection.
///
/// Frames must be fed in arrival order. One instance per camera, nothing shared between them.
pub struct CameraPipeline {
    camera_id: String,
    rotation: Rotation,
    registry: TrackRegistry,
    strategy: Box<dyn CountingStrategy>,
    gc: GarbageCollector,
    person_ids: PersonIds,
    totals: CountTotals,
    // Timestamp of the latest frame and the moment it arrived
    last_frame: Option<(f64, Instant)>,
}

impl CameraPipeline {
    /// Creates new instance of CameraPipeline
    ///
    /// Basic usage:
    ///
    /// ```
    /// use people_counter_rs::counter::{
    ///     CameraPipeline, CrossingConfig, CrossingStrategy, FrameBatch, GarbageCollector, TrackRegistry,
    /// };
    /// use people_counter_rs::utils::{BBox, Rotation};
    /// let mut pipeline = CameraPipeline::new(
    ///     "CAM-01",
    ///     Box::new(CrossingStrategy::new(CrossingConfig::default())),
    ///     TrackRegistry::new(25.0),
    ///     GarbageCollector::new(1.0),
    ///     Rotation::Deg0,
    /// );
    /// let frame = FrameBatch::new(0.0, 1000, 720).with_track(7, BBox::new(350.0, 100.0, 410.0, 400.0));
    /// assert!(pipeline.process_frame(&frame).is_empty());
    /// let frame = FrameBatch::new(0.1, 1000, 720).with_track(7, BBox::new(465.0, 100.0, 525.0, 400.0));
    /// assert_eq!(pipeline.process_frame(&frame).len(), 1);
    /// ```
    pub fn new(
        camera_id: &str,
        strategy: Box<dyn CountingStrategy>,
        registry: TrackRegistry,
        gc: GarbageCollector,
        rotation: Rotation,
    ) -> Self {
        CameraPipeline {
            camera_id: camera_id.to_string(),
            rotation,
            registry,
            strategy,
            gc,
            person_ids: PersonIds::new(),
            totals: CountTotals::default(),
            last_frame: None,
        }
    }
    /// Builds pipeline from validated configuration. Bad geometry is fatal here.
    pub fn from_config(config: &CounterConfig) -> Result<Self, CounterError> {
        config.validate()?;
        let rotation = Rotation::try_from(config.rotate_deg)?;
        let strategy: Box<dyn CountingStrategy> = match config.strategy {
            StrategyKind::Line => Box::new(CrossingStrategy::new(config.line.to_crossing_config())),
            StrategyKind::Dwell => Box::new(DwellZoneStrategy::new(config.dwell.to_dwell_config())),
        };
        Ok(CameraPipeline::new(
            &config.camera_id,
            strategy,
            TrackRegistry::new(config.unique.track_ttl_seconds),
            GarbageCollector::new(config.unique.gc_interval_seconds),
            rotation,
        ))
    }
    pub fn into_shared(self) -> SharedPipeline {
        Arc::new(Mutex::new(self))
    }
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }
    pub fn totals(&self) -> CountTotals {
        self.totals
    }
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
    /// Person number shown for a counted presence, if it was counted
    pub fn person_id(&self, track_id: u64, epoch: u32) -> Option<u64> {
        self.person_ids.get(&(track_id, epoch))
    }
    /// Current time on the frame clock: latest frame timestamp plus the time elapsed since it arrived.
    /// None until the first frame.
    pub fn frame_clock_now(&self) -> Option<f64> {
        self.last_frame
            .map(|(timestamp, arrived)| timestamp + arrived.elapsed().as_secs_f64())
    }
    /// Feeds one frame of detections. Returns the counts it produced, in observation order.
    ///
    /// Every observation is stamped with the frame timestamp.
    pub fn process_frame(&mut self, batch: &FrameBatch) -> Vec<CountEvent> {
        self.last_frame = Some((batch.timestamp, Instant::now()));
        let (width, _) = self
            .rotation
            .rotated_size(batch.frame_width, batch.frame_height);
        self.strategy.set_frame_width(width);

        let mut events = vec![];
        for raw in batch.observations.iter() {
            let observation = TrackObservation::new(
                raw.track_id,
                self.rotation
                    .transform_bbox(&raw.bbox, batch.frame_width, batch.frame_height),
                batch.timestamp,
            );
            if let Some(event) = self.process_observation(&observation) {
                events.push(event);
            }
        }
        self.gc.maybe_collect(&mut self.registry, batch.timestamp);
        events
    }
    /// Sweeps stale tracks if the GC interval has passed. `now` is on the frame clock.
    pub fn collect_garbage(&mut self, now: f64) -> Option<usize> {
        self.gc.maybe_collect(&mut self.registry, now)
    }
    /// Sweeps at `frame_clock_now`. Does nothing before the first frame.
    pub fn collect_garbage_on_frame_clock(&mut self) -> Option<usize> {
        let now = self.frame_clock_now()?;
        self.collect_garbage(now)
    }
    /// Whether `(track_id, epoch)` has already been counted
    pub fn is_counted(&self, track_id: u64, epoch: u32) -> bool {
        self.strategy.is_claimed(track_id, epoch)
    }
    fn process_observation(&mut self, observation: &TrackObservation) -> Option<CountEvent> {
        if let Err(err) = observation.validate() {
            debug!(%err, "dropping observation");
            return None;
        }
        if !self.strategy.accepts(observation) {
            return None;
        }
        let track_id = observation.track_id;
        let (epoch, _) = self.registry.observe(track_id, observation.timestamp);
        let track = self.registry.get_mut(track_id)?;
        let signal = self.strategy.evaluate(track, observation)?;

        let person_id = self.person_ids.get_or_assign((track_id, epoch));
        let event = CountEvent::new(
            &self.camera_id,
            person_id,
            track_id,
            epoch,
            observation.timestamp,
            signal,
        );
        self.totals.add(event.direction);
        info!(
            camera_id = %self.camera_id,
            track_id,
            epoch,
            person_id,
            direction = %event.direction,
            totals = %self.totals,
            "count"
        );
        Some(event)
    }
}

impl fmt::Display for CameraPipeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Camera: {}\n\tStrategy: {}\n\tRotation: {}\n\t{}",
            self.camera_id,
            self.strategy.name(),
            self.rotation.degrees(),
            self.totals
        )
    }
}
