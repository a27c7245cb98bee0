//! Shared builders for tests. Not part of the public API.

use crate::content::Content;
use crate::event::SharedSink;
use crate::expertise::ExpertiseCalculator;
use crate::id::{ResourceId, StationId, UomId};
use crate::qty::{qty, Qty};
use crate::registry::ResourceUom;
use crate::station::{
    constant_duration, ProductionStrategy, Station, StationResourceDefinition,
};
use std::sync::Arc;
use std::time::Duration;

pub const EACH: UomId = UomId(0);

pub fn sku(resource: u32) -> ResourceUom {
    ResourceUom::new(ResourceId(resource), EACH)
}

pub fn content(sku: ResourceUom, amount: f64) -> Content {
    Content::new(sku, qty(amount)).unwrap()
}

pub fn definition(sku: ResourceUom, per_run: f64, capacity: u32) -> StationResourceDefinition {
    StationResourceDefinition::new(content(sku, per_run), capacity)
}

/// A zero-duration station turning one `raw` into `yield_qty` of `product`.
/// Two updates at the same instant complete a full run.
pub fn instant_station(
    id: u32,
    raw: ResourceUom,
    product: ResourceUom,
    yield_qty: f64,
    output_capacity: u32,
    sink: SharedSink,
) -> Arc<Station> {
    Arc::new(Station::new(
        StationId(id),
        format!("station_{id}"),
        vec![definition(raw, 1.0, 100)],
        vec![definition(product, yield_qty, output_capacity)],
        constant_duration(Duration::ZERO),
        ProductionStrategy::RequireAllOutputsHaveSpace,
        ExpertiseCalculator::default_by_runs(),
        sink,
    ))
}

/// Feed one raw unit and run a full instant production cycle.
pub fn run_instant_cycle(station: &Station, raw: ResourceUom, at: Duration) {
    station.add_input(vec![content(raw, 1.0)]).unwrap();
    station.update(at).unwrap();
    station.update(at).unwrap();
}

/// Sum of a quantity map, for conservation assertions.
pub fn total(map: &std::collections::HashMap<ResourceUom, Qty>) -> Qty {
    map.values().copied().sum()
}
