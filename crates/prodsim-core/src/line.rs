//! The production line: a set of stations wired into a directed graph,
//! plus the in-flight transfers moving material between them.
//!
//! Each tick the line discovers replenishment opportunities along graph
//! edges and initiates timed transfers. Material is withdrawn from the
//! feeder at initiation, so the in-flight list is the sole account of
//! material in transit: summing it gives exact incoming supply per
//! destination with no double-reservation across ticks.

use crate::content::Content;
use crate::event::{Event, SharedSink};
use crate::graph::{GraphError, StationGraph};
use crate::id::{EdgeId, StationId};
use crate::qty::Qty;
use crate::registry::ResourceUom;
use crate::station::{DurationProvider, Station, StationError};
use crate::transfer::Transfer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineError {
    #[error("station {station} is not part of the line")]
    UnknownStation { station: StationId },

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Stations, their connectivity, and material in transit.
///
/// Topology is fixed before the line is shared: `add_station` and `connect`
/// take `&mut self`, while `update` and the queries work through `&self` so
/// the line can be driven from a scheduler thread behind an `Arc`.
pub struct ProductionLine {
    stations: HashMap<StationId, Arc<Station>>,
    graph: StationGraph,
    /// Allowed SKUs per edge. Kept here rather than in the graph so the
    /// graph stays a pure connectivity structure.
    edge_skus: HashMap<EdgeId, Vec<ResourceUom>>,
    transfers: Mutex<Vec<Transfer>>,
    transfer_time: DurationProvider,
    /// When false, station ticks are left to dedicated workers and
    /// `update` only manages transfers.
    drive_stations: bool,
    sink: SharedSink,
}

impl std::fmt::Debug for ProductionLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionLine")
            .field("stations", &self.stations.len())
            .field("edges", &self.graph.edge_count())
            .field("drive_stations", &self.drive_stations)
            .finish_non_exhaustive()
    }
}

impl ProductionLine {
    pub fn new(transfer_time: DurationProvider, drive_stations: bool, sink: SharedSink) -> Self {
        Self {
            stations: HashMap::new(),
            graph: StationGraph::new(),
            edge_skus: HashMap::new(),
            transfers: Mutex::new(Vec::new()),
            transfer_time,
            drive_stations,
            sink,
        }
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    pub fn add_station(&mut self, station: Arc<Station>) {
        let id = station.id();
        self.graph.add_node(id);
        if self.stations.insert(id, station).is_none() {
            self.sink.emit(Event::StationAdded { station: id });
            tracing::info!(station = %id, "station added to line");
        }
    }

    /// Declare that `from` feeds `to`, carrying the given SKUs.
    pub fn connect(
        &mut self,
        from: StationId,
        to: StationId,
        skus: Vec<ResourceUom>,
    ) -> Result<EdgeId, LineError> {
        for station in [from, to] {
            if !self.stations.contains_key(&station) {
                return Err(LineError::UnknownStation { station });
            }
        }
        let edge = self.graph.connect(from, to)?;
        self.edge_skus.insert(edge, skus);
        Ok(edge)
    }

    pub fn station(&self, id: StationId) -> Option<&Arc<Station>> {
        self.stations.get(&id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Arc<Station>> {
        self.stations.values()
    }

    /// Whether this line's own `update` ticks its stations.
    pub fn drives_stations(&self) -> bool {
        self.drive_stations
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// One line tick: drive stations (if owned here), start new transfers,
    /// land arrived ones. Only fatal internal-consistency errors propagate.
    pub fn update(&self, now: Duration) -> Result<(), LineError> {
        if self.drive_stations {
            self.check_update_stations(now)?;
        }
        self.check_create_transfers(now)?;
        self.check_handle_transfers(now)?;
        Ok(())
    }

    fn check_update_stations(&self, now: Duration) -> Result<(), LineError> {
        for station in self.stations.values() {
            station.update(now)?;
        }
        Ok(())
    }

    /// Walk every destination's inbound edges and start a transfer for each
    /// feeder/SKU pair with stock available and destination space left after
    /// subtracting material already in flight toward it.
    fn check_create_transfers(&self, now: Duration) -> Result<(), LineError> {
        let mut pending = Vec::new();
        {
            let mut transfers = self.transfers.lock();
            for (&dest_id, dest) in &self.stations {
                let node = self.graph.node_for(dest_id)?;
                let dest_space = dest.space_for_input();
                for &edge_id in self.graph.inbound_edges(node) {
                    let edge = self.graph.edge(edge_id)?;
                    let feeder_id = self.graph.station_at(edge.from)?;
                    let Some(feeder) = self.stations.get(&feeder_id) else {
                        return Err(LineError::UnknownStation { station: feeder_id });
                    };
                    let Some(skus) = self.edge_skus.get(&edge_id) else {
                        continue;
                    };
                    let available = feeder.available_output();
                    for &sku in skus {
                        let avail = available.get(&sku).copied().unwrap_or(Qty::ZERO);
                        if avail <= Qty::ZERO {
                            continue;
                        }
                        // Only SKUs the destination declares an input for.
                        let Some(&space) = dest_space.get(&sku) else {
                            continue;
                        };
                        let in_flight = Self::in_flight_toward(&transfers, dest_id, sku);
                        let space_remaining = space - in_flight;
                        if space_remaining <= Qty::ZERO {
                            continue;
                        }

                        let amount = avail.min(space_remaining);
                        // amount > 0 here, so construction cannot fail.
                        let Ok(request) = Content::new(sku, amount) else {
                            continue;
                        };
                        match feeder.remove_output(&[request]) {
                            Ok(mut removed) => {
                                let Some(content) = removed.pop() else {
                                    continue;
                                };
                                let transfer = Transfer::new(
                                    feeder_id,
                                    dest_id,
                                    edge_id,
                                    content,
                                    now,
                                    (self.transfer_time)(),
                                );
                                tracing::info!(transfer = %transfer.short_label(), "transfer started");
                                pending.push(Event::TransferStarted {
                                    transfer: transfer.clone(),
                                });
                                transfers.push(transfer);
                            }
                            Err(e) if e.is_recoverable() => {
                                tracing::warn!(
                                    feeder = %feeder_id, ?sku, error = %e,
                                    "transfer withdrawal failed"
                                );
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
        }
        for event in pending {
            self.sink.emit(event);
        }
        Ok(())
    }

    /// Land every arrived transfer. A deposit that fails recoverably keeps
    /// its transfer in flight and is retried next tick.
    fn check_handle_transfers(&self, now: Duration) -> Result<(), LineError> {
        let mut pending = Vec::new();
        {
            let mut transfers = self.transfers.lock();
            let mut i = 0;
            while i < transfers.len() {
                if !transfers[i].arrived(now) {
                    i += 1;
                    continue;
                }
                let dest_id = transfers[i].to;
                let Some(dest) = self.stations.get(&dest_id) else {
                    return Err(LineError::UnknownStation { station: dest_id });
                };
                match dest.add_input(vec![transfers[i].content.clone()]) {
                    Ok(()) => {
                        let transfer = transfers.remove(i);
                        tracing::info!(transfer = %transfer.short_label(), "transfer completed");
                        pending.push(Event::TransferCompleted { transfer });
                    }
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(
                            transfer = %transfers[i].short_label(), error = %e,
                            "transfer deposit failed, will retry"
                        );
                        i += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        for event in pending {
            self.sink.emit(event);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshot of the in-flight transfer list.
    pub fn transfers_in_flight(&self) -> Vec<Transfer> {
        self.transfers.lock().clone()
    }

    /// Quantity of one SKU currently in flight toward a destination.
    pub fn qty_in_flight(&self, dest: StationId, sku: ResourceUom) -> Qty {
        Self::in_flight_toward(&self.transfers.lock(), dest, sku)
    }

    fn in_flight_toward(transfers: &[Transfer], dest: StationId, sku: ResourceUom) -> Qty {
        transfers
            .iter()
            .filter(|t| t.to == dest && t.content.resource_uom() == sku)
            .map(|t| t.content.qty())
            .sum()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CollectingSink, EventKind};
    use crate::expertise::ExpertiseCalculator;
    use crate::id::{ResourceId, UomId};
    use crate::qty::qty;
    use crate::station::{
        constant_duration, ProductionStrategy, StationResourceDefinition,
    };

    fn each() -> UomId {
        UomId(0)
    }
    fn sku(n: u32) -> ResourceUom {
        ResourceUom::new(ResourceId(n), each())
    }

    fn def(sku: ResourceUom, per_run: f64, capacity: u32) -> StationResourceDefinition {
        StationResourceDefinition::new(Content::new(sku, qty(per_run)).unwrap(), capacity)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Instant-duration station turning `raw` into `product`.
    fn feeder(
        id: u32,
        raw: ResourceUom,
        product: ResourceUom,
        yield_qty: f64,
        output_cap: u32,
        sink: SharedSink,
    ) -> Arc<Station> {
        Arc::new(Station::new(
            StationId(id),
            format!("feeder_{id}"),
            vec![def(raw, 1.0, 100)],
            vec![def(product, yield_qty, output_cap)],
            constant_duration(Duration::ZERO),
            ProductionStrategy::RequireAllOutputsHaveSpace,
            ExpertiseCalculator::default_by_runs(),
            sink,
        ))
    }

    /// Run one instant production cycle so the feeder has stock.
    fn stock_feeder(station: &Station, raw: ResourceUom, at: Duration) {
        station
            .add_input(vec![Content::new(raw, qty(1.0)).unwrap()])
            .unwrap();
        station.update(at).unwrap();
        station.update(at).unwrap();
    }

    // -----------------------------------------------------------------------
    // Scenario C: two feeders, one destination
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_c_two_feeders_deliver_exact_quantities() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let (a, b, c) = (sku(0), sku(1), sku(2));

        let f1 = feeder(0, raw, a, 5.0, 10, sink.clone());
        let f2 = feeder(1, raw, b, 1.0, 5, sink.clone());
        let dest = Arc::new(Station::new(
            StationId(2),
            "assembler",
            vec![def(a, 5.0, 10), def(b, 1.0, 5)],
            vec![def(c, 3.0, 3)],
            constant_duration(secs(3)),
            ProductionStrategy::RequireAllOutputsHaveSpace,
            ExpertiseCalculator::default_by_runs(),
            sink.clone(),
        ));

        let mut line = ProductionLine::new(constant_duration(secs(2)), false, sink.clone());
        line.add_station(f1.clone());
        line.add_station(f2.clone());
        line.add_station(dest.clone());
        line.connect(StationId(0), StationId(2), vec![a]).unwrap();
        line.connect(StationId(1), StationId(2), vec![b]).unwrap();

        stock_feeder(&f1, raw, secs(0));
        stock_feeder(&f2, raw, secs(0));

        line.update(secs(1)).unwrap();
        let in_flight = line.transfers_in_flight();
        assert_eq!(in_flight.len(), 2);
        assert_eq!(line.qty_in_flight(StationId(2), a), qty(5.0));
        assert_eq!(line.qty_in_flight(StationId(2), b), qty(1.0));
        // Withdrawn at initiation: feeders hold nothing anymore.
        assert!(f1.available_output().is_empty());
        assert!(f2.available_output().is_empty());

        // Past the 2s travel time: both land.
        line.update(secs(4)).unwrap();
        assert!(line.transfers_in_flight().is_empty());
        let stored = dest.stored_inputs();
        assert_eq!(stored[&a], qty(5.0));
        assert_eq!(stored[&b], qty(1.0));
        assert_eq!(sink.count_of(EventKind::TransferStarted), 2);
        assert_eq!(sink.count_of(EventKind::TransferCompleted), 2);
    }

    // -----------------------------------------------------------------------
    // Scenario D: in-flight reservation blocks over-booking
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_d_in_flight_reservation_blocks_second_transfer() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let a = sku(0);

        let f1 = feeder(0, raw, a, 5.0, 20, sink.clone());
        let dest = Arc::new(Station::new(
            StationId(1),
            "narrow_input",
            vec![def(a, 5.0, 5)],
            vec![def(sku(2), 1.0, 10)],
            constant_duration(secs(60)),
            ProductionStrategy::RequireAllOutputsHaveSpace,
            ExpertiseCalculator::default_by_runs(),
            sink.clone(),
        ));

        let mut line = ProductionLine::new(constant_duration(secs(10)), false, sink.clone());
        line.add_station(f1.clone());
        line.add_station(dest.clone());
        line.connect(StationId(0), StationId(1), vec![a]).unwrap();

        stock_feeder(&f1, raw, secs(0));
        line.update(secs(1)).unwrap();
        assert_eq!(line.qty_in_flight(StationId(1), a), qty(5.0));

        // More stock at the feeder, but destination space (5) is fully
        // reserved by flight no. 1.
        stock_feeder(&f1, raw, secs(2));
        line.update(secs(3)).unwrap();
        assert_eq!(line.transfers_in_flight().len(), 1);
        assert_eq!(f1.available_output()[&a], qty(5.0));
    }

    #[test]
    fn transfer_sized_to_min_of_stock_and_space() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let a = sku(0);

        // Feeder yields 8 per run, destination input holds only 5.
        let f1 = feeder(0, raw, a, 8.0, 20, sink.clone());
        let dest = Arc::new(Station::new(
            StationId(1),
            "small_buffer",
            vec![def(a, 1.0, 5)],
            vec![def(sku(2), 1.0, 10)],
            constant_duration(secs(60)),
            ProductionStrategy::RequireAllOutputsHaveSpace,
            ExpertiseCalculator::default_by_runs(),
            sink.clone(),
        ));

        let mut line = ProductionLine::new(constant_duration(secs(1)), false, sink.clone());
        line.add_station(f1.clone());
        line.add_station(dest.clone());
        line.connect(StationId(0), StationId(1), vec![a]).unwrap();

        stock_feeder(&f1, raw, secs(0));
        line.update(secs(1)).unwrap();

        assert_eq!(line.qty_in_flight(StationId(1), a), qty(5.0));
        assert_eq!(f1.available_output()[&a], qty(3.0));
    }

    #[test]
    fn undeclared_sku_on_edge_is_not_transferred() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let a = sku(0);

        let f1 = feeder(0, raw, a, 5.0, 20, sink.clone());
        // Destination does not take `a` at all.
        let dest = Arc::new(Station::new(
            StationId(1),
            "other_inputs",
            vec![def(sku(7), 1.0, 10)],
            vec![def(sku(8), 1.0, 10)],
            constant_duration(secs(60)),
            ProductionStrategy::RequireAllOutputsHaveSpace,
            ExpertiseCalculator::default_by_runs(),
            sink.clone(),
        ));

        let mut line = ProductionLine::new(constant_duration(secs(1)), false, sink.clone());
        line.add_station(f1.clone());
        line.add_station(dest.clone());
        line.connect(StationId(0), StationId(1), vec![a]).unwrap();

        stock_feeder(&f1, raw, secs(0));
        line.update(secs(1)).unwrap();
        assert!(line.transfers_in_flight().is_empty());
        assert_eq!(f1.available_output()[&a], qty(5.0));
    }

    #[test]
    fn connect_requires_known_stations() {
        let sink = CollectingSink::new();
        let mut line = ProductionLine::new(constant_duration(secs(1)), false, sink);
        let err = line
            .connect(StationId(0), StationId(1), vec![sku(0)])
            .unwrap_err();
        assert!(matches!(err, LineError::UnknownStation { .. }));
    }

    #[test]
    fn drive_stations_ticks_members() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let a = sku(0);
        let f1 = feeder(0, raw, a, 5.0, 20, sink.clone());

        let mut line = ProductionLine::new(constant_duration(secs(1)), true, sink.clone());
        line.add_station(f1.clone());

        f1.add_input(vec![Content::new(raw, qty(1.0)).unwrap()])
            .unwrap();
        line.update(secs(0)).unwrap();
        line.update(secs(0)).unwrap();
        assert_eq!(f1.available_output()[&a], qty(5.0));
        assert_eq!(sink.count_of(EventKind::ProductionFinished), 1);
    }

    #[test]
    fn add_station_emits_once() {
        let sink = CollectingSink::new();
        let raw = sku(100);
        let f1 = feeder(0, raw, sku(0), 1.0, 10, sink.clone());
        let mut line = ProductionLine::new(constant_duration(secs(1)), false, sink.clone());
        line.add_station(f1.clone());
        line.add_station(f1);
        assert_eq!(sink.count_of(EventKind::StationAdded), 1);
    }
}
