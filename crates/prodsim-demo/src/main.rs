//! A three-station facility driven end to end: two feeder stations produce
//! intermediates that flow to an assembler, while this process plays the
//! role of the outside world, trucking in raw material and hauling away
//! finished goods.

use prodsim_core::clock::{Clock, WallClock};
use prodsim_core::content::Content;
use prodsim_core::event::ChannelSink;
use prodsim_core::id::StationId;
use prodsim_core::qty::{qty_to_f64, Qty};
use prodsim_core::scheduler::Scheduler;
use prodsim_core::station::Station;
use prodsim_data::{build_facility, parse_manifest, DataError, Format, ManifestData};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MANIFEST: &str = r#"(
    transfer_secs: 2.0,
    resources: [
        (name: "sku_a", category: raw_material),
        (name: "sku_b", category: raw_material),
        (name: "sku_c", category: intermediate),
        (name: "sku_d", category: raw_material),
        (name: "sku_e", category: raw_material),
        (name: "sku_f", category: intermediate),
        (name: "sku_g", category: finished_good),
    ],
    stations: [
        (
            name: "dummy_1",
            inputs: [
                (resource: "sku_a", qty: 5.0, capacity: 10),
                (resource: "sku_b", qty: 1.0, capacity: 5),
            ],
            outputs: [(resource: "sku_c", qty: 3.0, capacity: 3)],
            duration_secs: 3.0,
        ),
        (
            name: "dummy_2",
            inputs: [
                (resource: "sku_d", qty: 5.0, capacity: 10),
                (resource: "sku_e", qty: 1.0, capacity: 5),
            ],
            outputs: [(resource: "sku_f", qty: 3.0, capacity: 3)],
            duration_secs: 3.0,
        ),
        (
            name: "dummy_3",
            inputs: [
                (resource: "sku_c", qty: 5.0, capacity: 10),
                (resource: "sku_f", qty: 1.0, capacity: 5),
            ],
            outputs: [(resource: "sku_g", qty: 3.0, capacity: 3)],
            duration_secs: 3.0,
        ),
    ],
    feeds: [
        (from: "dummy_1", to: "dummy_3", skus: ["sku_c"]),
        (from: "dummy_2", to: "dummy_3", skus: ["sku_f"]),
    ],
)"#;

const EPOCH: Duration = Duration::from_millis(500);
const EPOCHS: u32 = 120;
/// Raw material arrives this long after a shortage is first seen.
const RESUPPLY_DELAY: Duration = Duration::from_secs(4);
/// Finished goods are hauled away this long after output appears.
const DRAIN_DELAY: Duration = Duration::from_secs(3);

/// Tracks a delayed reaction: armed when a condition is first observed,
/// fires once the delay has elapsed.
struct DelayTimer {
    armed: Option<Instant>,
    delay: Duration,
}

impl DelayTimer {
    fn new(delay: Duration) -> Self {
        Self { armed: None, delay }
    }

    fn poll(&mut self, condition: bool) -> bool {
        match self.armed {
            None if condition => {
                self.armed = Some(Instant::now());
                false
            }
            Some(since) if since.elapsed() > self.delay => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

fn resupply(station: &Station, timer: &mut DelayTimer) {
    let shorts = station.short_inputs();
    if timer.poll(!shorts.is_empty()) {
        if let Err(e) = station.add_input(shorts) {
            tracing::warn!(station = %station.id(), error = %e, "resupply failed");
        }
    }
}

fn drain(station: &Station, timer: &mut DelayTimer) -> Qty {
    let available = station.available_output();
    if !timer.poll(!available.is_empty()) {
        return Qty::ZERO;
    }
    let requests: Vec<Content> = available
        .into_iter()
        .filter_map(|(sku, amount)| Content::new(sku, amount).ok())
        .collect();
    match station.remove_output(&requests) {
        Ok(removed) => removed.iter().map(Content::qty).sum(),
        Err(e) => {
            tracing::warn!(station = %station.id(), error = %e, "drain failed");
            Qty::ZERO
        }
    }
}

fn main() -> Result<(), DataError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (sink, events) = ChannelSink::bounded(256);
    std::thread::spawn(move || {
        for event in events {
            tracing::debug!(?event, "facility event");
        }
    });

    let manifest: ManifestData = parse_manifest(MANIFEST, Format::Ron)?;
    let facility = build_facility(&manifest, false, sink)?;
    let line = Arc::new(facility.line);

    let station = |name: &str| -> Arc<Station> {
        let id: StationId = facility.station_ids[name];
        Arc::clone(line.station(id).expect("id came from this line"))
    };
    let dummy_1 = station("dummy_1");
    let dummy_2 = station("dummy_2");
    let dummy_3 = station("dummy_3");

    let clock = Arc::new(WallClock::new());
    let mut scheduler = Scheduler::start(Arc::clone(&line), clock.clone());

    let mut s1_timer = DelayTimer::new(RESUPPLY_DELAY);
    let mut s2_timer = DelayTimer::new(RESUPPLY_DELAY);
    let mut s3_timer = DelayTimer::new(DRAIN_DELAY);
    let mut generated = Qty::ZERO;

    for _ in 0..EPOCHS {
        let now = clock.now();
        for station in [&dummy_1, &dummy_2, &dummy_3] {
            tracing::info!(
                station = %station.id(),
                progress = ?station.progress(now),
                status = ?station.status(),
            );
        }

        resupply(&dummy_1, &mut s1_timer);
        resupply(&dummy_2, &mut s2_timer);
        generated += drain(&dummy_3, &mut s3_timer);

        tracing::info!(generated = qty_to_f64(generated), "cumulative output");
        std::thread::sleep(EPOCH);
    }

    scheduler.shutdown();
    tracing::info!(generated = qty_to_f64(generated), "simulation finished");
    Ok(())
}
