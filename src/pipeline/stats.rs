use std::time::{Duration, Instant};

/// Processed frames between two rate readouts.
pub const RATE_INTERVAL: u64 = 10;

/// Counters for the processing-rate readout.
///
/// The rate is `processed_frames / elapsed` since the run started: a coarse
/// cumulative figure, not a sliding window.
#[derive(Clone, Debug)]
pub struct ThroughputStats {
    processed_frames: u64,
    started: Instant,
}

impl ThroughputStats {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Self {
        Self {
            processed_frames: 0,
            started,
        }
    }

    pub fn processed_frames(&self) -> u64 {
        self.processed_frames
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count one processed frame. Every `RATE_INTERVAL`th frame returns the rate.
    pub fn record_frame(&mut self) -> Option<f64> {
        self.record_frame_at(Instant::now())
    }

    pub fn record_frame_at(&mut self, now: Instant) -> Option<f64> {
        self.processed_frames += 1;
        if self.processed_frames % RATE_INTERVAL == 0 {
            Some(self.rate_at(now))
        } else {
            None
        }
    }

    /// Frames per second as of `now`; zero before any time has passed.
    pub fn rate_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed > 0.0 {
            self.processed_frames as f64 / elapsed
        } else {
            0.0
        }
    }
}
