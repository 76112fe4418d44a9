//! Telemetry freshness monitor
//!
//! The simulator streams telemetry continuously; a silent socket that is still
//! open usually means the simulation is paused or the scene was stopped.
//!
//! Timestamps are micros since the first call to [`monotonic_micros`], so they
//! are unaffected by wall clock adjustments and fit in an `AtomicU64`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic microseconds since process-wide anchor
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Tracks the time since the last applied telemetry record.
#[derive(Debug)]
pub struct ConnectionMonitor {
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// `timeout`: maximum silence before telemetry is considered stale
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_feedback: AtomicU64::new(monotonic_micros()),
            timeout,
        }
    }

    /// True while telemetry arrived within the timeout window
    pub fn check_connection(&self) -> bool {
        self.time_since_last_feedback() < self.timeout
    }

    /// Called by the decoder thread after each applied record
    pub fn register_feedback(&self) {
        self.last_feedback.store(monotonic_micros(), Ordering::Relaxed);
    }

    pub fn time_since_last_feedback(&self) -> Duration {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
