//! Simulation clocks.
//!
//! Stations and the production line never read wall time directly; they are
//! handed the current time by whoever drives them. The [`Clock`] trait lets
//! the scheduler run on real time while tests advance a [`ManualClock`]
//! deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic source of elapsed simulation time.
pub trait Clock: Send + Sync {
    /// Time elapsed since the simulation started.
    fn now(&self) -> Duration;
}

/// Real time, measured from construction.
#[derive(Debug)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A hand-driven clock for deterministic tests. Clone-cheap via `Arc`;
/// all clones observe the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward. Never backwards.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}
