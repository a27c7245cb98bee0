//! Scheduler smoke test: worker threads drive stations and the line off a
//! manual clock, and shut down cleanly.

use prodsim_core::clock::ManualClock;
use prodsim_core::event::{CollectingSink, EventKind};
use prodsim_core::line::ProductionLine;
use prodsim_core::scheduler::Scheduler;
use prodsim_core::station::constant_duration;
use prodsim_core::test_utils::{content, instant_station, sku};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn scheduler_drives_production_and_shuts_down() {
    let sink = CollectingSink::new();
    let clock = ManualClock::new();
    let raw = sku(100);
    let a = sku(0);

    let station = instant_station(0, raw, a, 2.0, 50, sink.clone());
    station.add_input(vec![content(raw, 1.0)]).unwrap();

    let mut line = ProductionLine::new(
        constant_duration(Duration::from_secs(1)),
        false,
        sink.clone(),
    );
    line.add_station(station.clone());
    let line = Arc::new(line);

    let mut scheduler = Scheduler::start_with_period(
        Arc::clone(&line),
        Arc::new(clock.clone()),
        Duration::from_millis(1),
    );

    clock.advance(Duration::from_secs(1));

    // Wait for the station worker to complete one run. The wall-clock
    // bound only caps how long we poll, not what we assert.
    let waited = Instant::now();
    while sink.count_of(EventKind::ProductionFinished) == 0 {
        assert!(
            waited.elapsed() < Duration::from_secs(5),
            "no production within the polling window"
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    scheduler.shutdown();
    assert!(!scheduler.is_running());
    assert_eq!(station.available_output()[&a], prodsim_core::qty::qty(2.0));
    assert!(sink.count_of(EventKind::ProductionStarted) >= 1);
}

#[test]
fn drop_stops_workers() {
    let sink = CollectingSink::new();
    let clock = Arc::new(ManualClock::new());
    let line = Arc::new(ProductionLine::new(
        constant_duration(Duration::from_secs(1)),
        false,
        sink,
    ));
    let scheduler = Scheduler::start_with_period(line, clock, Duration::from_millis(1));
    drop(scheduler);
}
