//! Stations: production units converting input content into output content
//! over timed runs.
//!
//! A station owns an input storage and an output storage, one location per
//! declared requirement, each restricted to that requirement's resource.
//! The station's own tick (`update`) drives its idle -> producing -> idle
//! state machine; production precondition failures are recorded and retried
//! next tick, never propagated.

use crate::content::Content;
use crate::event::{Event, SharedSink};
use crate::expertise::ExpertiseCalculator;
use crate::id::{LocationId, StationId};
use crate::qty::Qty;
use crate::registry::ResourceUom;
use crate::storage::{Location, Storage, StorageError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Zero-argument provider of a base duration, called fresh per run.
pub type DurationProvider = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Fixed-rate provider.
pub fn constant_duration(d: Duration) -> DurationProvider {
    Arc::new(move || d)
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// One input requirement or output product line of a station: the content
/// template consumed/produced per run, and the storage capacity reserved
/// for it. Fixed at station construction.
#[derive(Debug, Clone)]
pub struct StationResourceDefinition {
    pub content: Content,
    pub storage_capacity: u32,
}

impl StationResourceDefinition {
    pub fn new(content: Content, storage_capacity: u32) -> Self {
        Self {
            content,
            storage_capacity,
        }
    }

    pub fn sku(&self) -> ResourceUom {
        self.content.resource_uom()
    }
}

/// When a run may start relative to output room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductionStrategy {
    /// Every declared output must have room for a full run's yield.
    #[default]
    RequireAllOutputsHaveSpace,
    /// At least one declared output must have strictly positive space.
    RequireAnyOutputHasSpace,
}

/// The production state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionState {
    Idle,
    Producing {
        started: Duration,
        deadline: Duration,
    },
}

/// Status tags reported by [`Station::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationStatus {
    Idle,
    Producing,
    /// At least one input requirement is short of a full run.
    Starved,
    /// At least one output lacks room for a full run's yield.
    Full,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Station failures. The production-precondition variants are recoverable
/// by design: the tick loop records them and retries next tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StationError {
    #[error("station {station}: already producing")]
    AtMaxCapacity { station: StationId },

    #[error("station {station}: output storage too full to produce")]
    OutputStorageTooFullToProduce { station: StationId },

    #[error("station {station}: not enough {sku:?} to produce ({have} of {need})")]
    NotEnoughInputToProduce {
        station: StationId,
        sku: ResourceUom,
        need: Qty,
        have: Qty,
    },

    #[error("station {station}: {sku:?} is not a declared input")]
    InvalidInputToAddToStation {
        station: StationId,
        sku: ResourceUom,
    },

    /// A storage operation failed; the payload carries the diagnostics.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Fatal: an input verified present by the precondition check could not
    /// be consumed. The single-writer-per-station discipline is broken.
    #[error("station {station}: input vanished during consumption: {source}")]
    InputConsumptionFailed {
        station: StationId,
        source: StorageError,
    },
}

impl StationError {
    /// Whether the tick loop may swallow this and retry next tick.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StationError::AtMaxCapacity { .. }
            | StationError::OutputStorageTooFullToProduce { .. }
            | StationError::NotEnoughInputToProduce { .. }
            | StationError::InvalidInputToAddToStation { .. } => true,
            StationError::Storage(e) => e.is_recoverable(),
            StationError::InputConsumptionFailed { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Everything needed to stamp out identical stations.
#[derive(Clone)]
pub struct StationTemplate {
    pub name: String,
    pub inputs: Vec<StationResourceDefinition>,
    pub outputs: Vec<StationResourceDefinition>,
    pub duration: DurationProvider,
    pub strategy: ProductionStrategy,
    pub expertise: crate::expertise::ExpertiseSpec,
}

impl std::fmt::Debug for StationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationTemplate")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

/// Mutable per-tick state, guarded by one lock. Storage has its own.
#[derive(Debug)]
struct StationState {
    production: ProductionState,
    current_exception: Option<StationError>,
    expertise: ExpertiseCalculator,
    /// Last time `update` observed the station producing; basis for the
    /// seconds-producing accumulation.
    last_observed: Option<Duration>,
}

/// A single production unit.
pub struct Station {
    id: StationId,
    name: String,
    input_reqs: Vec<StationResourceDefinition>,
    outputs: Vec<StationResourceDefinition>,
    input_storage: Storage,
    output_storage: Storage,
    duration: DurationProvider,
    strategy: ProductionStrategy,
    sink: SharedSink,
    state: Mutex<StationState>,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Station {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: StationId,
        name: impl Into<String>,
        input_reqs: Vec<StationResourceDefinition>,
        outputs: Vec<StationResourceDefinition>,
        duration: DurationProvider,
        strategy: ProductionStrategy,
        expertise: ExpertiseCalculator,
        sink: SharedSink,
    ) -> Self {
        let input_storage = Storage::new(Self::locations_for(&input_reqs));
        let output_storage = Storage::new(Self::locations_for(&outputs));
        Self {
            id,
            name: name.into(),
            input_reqs,
            outputs,
            input_storage,
            output_storage,
            duration,
            strategy,
            sink,
            state: Mutex::new(StationState {
                production: ProductionState::Idle,
                current_exception: None,
                expertise,
                last_observed: None,
            }),
        }
    }

    /// Stamp a station out of a template.
    pub fn from_template(template: &StationTemplate, id: StationId, sink: SharedSink) -> Self {
        Self::new(
            id,
            template.name.clone(),
            template.inputs.clone(),
            template.outputs.clone(),
            Arc::clone(&template.duration),
            template.strategy,
            template.expertise.build(),
            sink,
        )
    }

    /// One location per requirement, sized to its capacity and restricted
    /// to its resource.
    fn locations_for(defs: &[StationResourceDefinition]) -> Vec<Location> {
        defs.iter()
            .enumerate()
            .map(|(i, def)| {
                let sku = def.sku();
                Location::new(
                    LocationId(i as u32),
                    BTreeMap::from([(sku.uom, def.storage_capacity)]),
                )
                .with_resource_limitations(vec![sku.resource])
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_reqs(&self) -> &[StationResourceDefinition] {
        &self.input_reqs
    }

    pub fn outputs(&self) -> &[StationResourceDefinition] {
        &self.outputs
    }

    pub fn producing(&self) -> bool {
        matches!(self.state.lock().production, ProductionState::Producing { .. })
    }

    pub fn production_state(&self) -> ProductionState {
        self.state.lock().production
    }

    /// The last recorded non-fatal reason production could not start.
    /// Cleared by the next successful start.
    pub fn current_exception(&self) -> Option<StationError> {
        self.state.lock().current_exception.clone()
    }

    /// Fraction of the active run elapsed, if producing.
    pub fn progress(&self, now: Duration) -> Option<f64> {
        match self.state.lock().production {
            ProductionState::Idle => None,
            ProductionState::Producing { started, deadline } => {
                let total = deadline.saturating_sub(started);
                if total.is_zero() {
                    return Some(1.0);
                }
                let elapsed = now.saturating_sub(started);
                Some((elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0))
            }
        }
    }

    pub fn expertise_stats(&self) -> crate::expertise::ExpertiseStats {
        self.state.lock().expertise.stats()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// The per-tick driver. Recoverable start failures are recorded in the
    /// exception slot and retried next tick; only fatal internal errors
    /// propagate.
    pub fn update(&self, now: Duration) -> Result<(), StationError> {
        let mut pending = Vec::new();
        let result = {
            let mut state = self.state.lock();
            match state.production {
                ProductionState::Idle => match self.try_start(&mut state, now, &mut pending) {
                    Ok(()) => {
                        state.current_exception = None;
                        Ok(())
                    }
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(station = %self.id, error = %e, "production not started");
                        if let StationError::Storage(storage_err) = &e {
                            pending.push(Event::StorageFault {
                                storage: self.output_storage.id(),
                                error: storage_err.clone(),
                            });
                        }
                        state.current_exception = Some(e);
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                ProductionState::Producing { started, deadline } => {
                    if now >= deadline {
                        self.finalize(&mut state, &mut pending)
                    } else {
                        let since = state.last_observed.unwrap_or(started).max(started);
                        state
                            .expertise
                            .record_seconds_producing(now.saturating_sub(since).as_secs_f64());
                        tracing::trace!(station = %self.id, "producing");
                        Ok(())
                    }
                }
            }
            .map(|()| {
                state.last_observed = Some(now);
            })
        };
        for event in pending {
            self.sink.emit(event);
        }
        result
    }

    /// Ordered preconditions; first failure wins, with no side effects
    /// before all checks pass.
    fn try_start(
        &self,
        state: &mut StationState,
        now: Duration,
        pending: &mut Vec<Event>,
    ) -> Result<(), StationError> {
        if matches!(state.production, ProductionState::Producing { .. }) {
            return Err(StationError::AtMaxCapacity { station: self.id });
        }

        // Output room, by strategy.
        let output_skus: Vec<ResourceUom> = self.outputs.iter().map(|d| d.sku()).collect();
        let space = self.output_storage.space_for_resource_uom(&output_skus);
        let room_ok = match self.strategy {
            ProductionStrategy::RequireAllOutputsHaveSpace => self.outputs.iter().all(|def| {
                space.get(&def.sku()).copied().unwrap_or(Qty::ZERO) >= def.content.qty()
            }),
            ProductionStrategy::RequireAnyOutputHasSpace => self
                .outputs
                .iter()
                .any(|def| space.get(&def.sku()).copied().unwrap_or(Qty::ZERO) > Qty::ZERO),
        };
        if !room_ok {
            return Err(StationError::OutputStorageTooFullToProduce { station: self.id });
        }

        // Input sufficiency.
        for req in &self.input_reqs {
            let have = self.input_storage.qty_of(req.sku());
            if have < req.content.qty() {
                return Err(StationError::NotEnoughInputToProduce {
                    station: self.id,
                    sku: req.sku(),
                    need: req.content.qty(),
                    have,
                });
            }
        }

        // Consume. The checks above make failure here an internal
        // inconsistency, not a retryable condition.
        for req in &self.input_reqs {
            self.input_storage
                .remove_content(&req.content, None)
                .map_err(|source| StationError::InputConsumptionFailed {
                    station: self.id,
                    source,
                })?;
        }

        let base = (self.duration)();
        let run = base.mul_f64(1.0 - state.expertise.time_reduction());
        state.production = ProductionState::Producing {
            started: now,
            deadline: now + run,
        };
        pending.push(Event::ProductionStarted { station: self.id });
        tracing::info!(station = %self.id, name = %self.name, duration_s = run.as_secs_f64(), "production started");
        Ok(())
    }

    /// Deposit outputs and go idle. A full declared output is truncated to
    /// whatever space remains rather than failing the run.
    fn finalize(
        &self,
        state: &mut StationState,
        pending: &mut Vec<Event>,
    ) -> Result<(), StationError> {
        for def in &self.outputs {
            let sku = def.sku();
            let space = self
                .output_storage
                .space_for_resource_uom(&[sku])
                .get(&sku)
                .copied()
                .unwrap_or(Qty::ZERO);
            let deposit = def.content.qty().min(space);
            if deposit <= Qty::ZERO {
                tracing::warn!(station = %self.id, ?sku, "no output room, run yield discarded");
                continue;
            }
            match def.content.with_qty(deposit) {
                Ok(content) => match self.output_storage.add_content(content, None) {
                    Ok(_) => {}
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(station = %self.id, error = %e, "output deposit failed");
                        pending.push(Event::StorageFault {
                            storage: self.output_storage.id(),
                            error: e,
                        });
                    }
                    Err(e) => return Err(StationError::Storage(e)),
                },
                // deposit > 0 by the guard above; construction cannot fail.
                Err(_) => {}
            }
        }

        state.production = ProductionState::Idle;
        state.expertise.record_run();
        pending.push(Event::ProductionFinished { station: self.id });
        tracing::info!(station = %self.id, name = %self.name, "production finished");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Material exchange
    // -----------------------------------------------------------------------

    /// Add content to the input storage. Each unit's SKU must match one of
    /// the declared input requirements. Storage failures are forwarded to
    /// the event sink and returned to the caller.
    pub fn add_input(&self, inputs: Vec<Content>) -> Result<(), StationError> {
        for content in &inputs {
            if !self
                .input_reqs
                .iter()
                .any(|req| req.sku() == content.resource_uom())
            {
                return Err(StationError::InvalidInputToAddToStation {
                    station: self.id,
                    sku: content.resource_uom(),
                });
            }
        }
        for content in inputs {
            let sku = content.resource_uom();
            if let Err(e) = self.input_storage.add_content(content, None) {
                self.sink.emit(Event::StorageFault {
                    storage: self.input_storage.id(),
                    error: e.clone(),
                });
                return Err(StationError::Storage(e));
            }
            tracing::debug!(station = %self.id, ?sku, "input added");
        }
        Ok(())
    }

    /// Withdraw content from the output storage.
    pub fn remove_output(&self, requests: &[Content]) -> Result<Vec<Content>, StationError> {
        let mut removed = Vec::with_capacity(requests.len());
        for request in requests {
            match self.output_storage.remove_content(request, None) {
                Ok(content) => removed.push(content),
                Err(e) => {
                    self.sink.emit(Event::StorageFault {
                        storage: self.output_storage.id(),
                        error: e.clone(),
                    });
                    return Err(StationError::Storage(e));
                }
            }
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Derived queries
    // -----------------------------------------------------------------------

    /// Per-requirement deficits: required minus on-hand, where positive.
    pub fn short_inputs(&self) -> Vec<Content> {
        self.input_reqs
            .iter()
            .filter_map(|req| {
                let have = self.input_storage.qty_of(req.sku());
                let need = req.content.qty();
                if have < need {
                    req.content.with_qty(need - have).ok()
                } else {
                    None
                }
            })
            .collect()
    }

    /// Current output inventory by SKU.
    pub fn available_output(&self) -> HashMap<ResourceUom, Qty> {
        self.output_storage.inventory_by_resource_uom()
    }

    /// Free input space per declared input SKU.
    pub fn space_for_input(&self) -> HashMap<ResourceUom, Qty> {
        let skus: Vec<ResourceUom> = self.input_reqs.iter().map(|d| d.sku()).collect();
        self.input_storage.space_for_resource_uom(&skus)
    }

    /// Free output space per declared output SKU.
    pub fn space_for_output(&self) -> HashMap<ResourceUom, Qty> {
        let skus: Vec<ResourceUom> = self.outputs.iter().map(|d| d.sku()).collect();
        self.output_storage.space_for_resource_uom(&skus)
    }

    /// Held input quantity per declared input SKU.
    pub fn stored_inputs(&self) -> HashMap<ResourceUom, Qty> {
        let skus: Vec<ResourceUom> = self.input_reqs.iter().map(|d| d.sku()).collect();
        self.input_storage.qty_of_resource_uoms(&skus, None)
    }

    /// Status tags: producing/idle, plus starved and full markers.
    pub fn status(&self) -> Vec<StationStatus> {
        let mut tags = vec![if self.producing() {
            StationStatus::Producing
        } else {
            StationStatus::Idle
        }];
        if !self.short_inputs().is_empty() {
            tags.push(StationStatus::Starved);
        }
        let space = self.space_for_output();
        if self.outputs.iter().any(|def| {
            space.get(&def.sku()).copied().unwrap_or(Qty::ZERO) < def.content.qty()
        }) {
            tags.push(StationStatus::Full);
        }
        tags
    }
}

// ===========================================================================
// Tests
// ===========================================================================
