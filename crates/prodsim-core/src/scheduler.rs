//! The scheduler: worker threads ticking stations and the line.
//!
//! One thread per station plus one for the line, each doing a single
//! bounded `update(clock.now())` and sleeping the tick period. Stations
//! never block on each other; all cross-station coordination goes through
//! storage state read at tick time. A worker that hits a fatal error logs
//! it and stops ticking; the rest keep running.

use crate::clock::Clock;
use crate::line::ProductionLine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

/// Owns the worker threads for one production line. Workers stop and join
/// on [`Scheduler::shutdown`] or drop.
pub struct Scheduler {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the line with the default 100ms tick period.
    pub fn start(line: Arc<ProductionLine>, clock: Arc<dyn Clock>) -> Self {
        Self::start_with_period(line, clock, DEFAULT_TICK_PERIOD)
    }

    /// Spawns one worker per station (unless the line drives its own
    /// stations) plus the line worker.
    pub fn start_with_period(
        line: Arc<ProductionLine>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::new();

        if !line.drives_stations() {
            for station in line.stations() {
                let station = Arc::clone(station);
                let clock = Arc::clone(&clock);
                let stop = Arc::clone(&stop);
                workers.push(std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        if let Err(e) = station.update(clock.now()) {
                            tracing::error!(
                                station = %station.id(), error = %e,
                                "fatal error, station worker stopping"
                            );
                            return;
                        }
                        std::thread::sleep(period);
                    }
                }));
            }
        }

        {
            let line = Arc::clone(&line);
            let stop = Arc::clone(&stop);
            workers.push(std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Err(e) = line.update(clock.now()) {
                        tracing::error!(error = %e, "fatal error, line worker stopping");
                        return;
                    }
                    std::thread::sleep(period);
                }
            }));
        }

        tracing::info!(workers = workers.len(), "scheduler started");
        Self { stop, workers }
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    /// Signal every worker and join them. Idempotent.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("scheduler worker panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::NullSink;
    use crate::station::constant_duration;

    fn empty_line() -> Arc<ProductionLine> {
        Arc::new(ProductionLine::new(
            constant_duration(Duration::from_secs(1)),
            false,
            Arc::new(NullSink),
        ))
    }

    #[test]
    fn shutdown_joins_workers() {
        let clock = Arc::new(ManualClock::new());
        let mut scheduler = Scheduler::start_with_period(
            empty_line(),
            clock,
            Duration::from_millis(1),
        );
        assert!(scheduler.is_running());
        scheduler.shutdown();
        assert!(!scheduler.is_running());
        assert!(scheduler.workers.is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let clock = Arc::new(ManualClock::new());
        let mut scheduler = Scheduler::start_with_period(
            empty_line(),
            clock,
            Duration::from_millis(1),
        );
        scheduler.shutdown();
        scheduler.shutdown();
    }
}
