use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::counter::{SharedPipeline, TrackRegistry};

/// Interval-gated sweep of stale tracks.
///
/// Claimed (track, epoch) keys live in the crossing strategy and are never touched here.
#[derive(Debug, Clone)]
pub struct GarbageCollector {
    // Minimum seconds between two sweeps. Default is 1.0
    interval: f64,
    last_sweep: Option<f64>,
}

impl Default for GarbageCollector {
    fn default() -> Self {
        GarbageCollector::new(1.0)
    }
}

impl GarbageCollector {
    pub fn new(_interval: f64) -> Self {
        GarbageCollector {
            interval: _interval,
            last_sweep: None,
        }
    }
    pub fn interval(&self) -> f64 {
        self.interval
    }
    pub fn last_sweep(&self) -> Option<f64> {
        self.last_sweep
    }
    /// Prunes `registry` unless the previous sweep was less than `interval` seconds ago.
    /// Returns number of removed tracks when a sweep happened.
    pub fn maybe_collect(&mut self, registry: &mut TrackRegistry, now: f64) -> Option<usize> {
        if let Some(last) = self.last_sweep {
            if now - last <= self.interval {
                return None;
            }
        }
        self.last_sweep = Some(now);
        let removed = registry.prune(now);
        if removed > 0 {
            info!(removed, live = registry.len(), "pruned stale tracks");
        }
        Some(removed)
    }
}

/// Runs garbage collection of `pipeline` every `period`, independently of whether frames keep arriving.
///
/// Time is read from the pipeline's frame clock, so a timer tick never ages a track
/// faster than the frames do. Takes the same lock frame processing does. Abort the handle to stop it.
pub fn spawn_gc_timer(pipeline: SharedPipeline, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let swept = pipeline.lock().collect_garbage_on_frame_clock();
            debug!(?swept, "gc tick");
        }
    })
}
