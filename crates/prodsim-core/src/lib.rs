//! Prodsim Core -- a production facility simulation engine.
//!
//! This crate provides the storage allocation engine, station state
//! machines, the production line with timed transfers, and the threaded
//! scheduler that drives them.
//!
//! # Tick Model
//!
//! Every station and the production line are ticked independently with the
//! current simulation time:
//!
//! 1. **Station tick** ([`station::Station::update`]) -- try to start a run
//!    (consuming inputs), finalize a finished run (depositing outputs), or
//!    accumulate producing time into the expertise curve.
//! 2. **Line tick** ([`line::ProductionLine::update`]) -- discover
//!    replenishment needs along graph edges, initiate transfers (withdrawn
//!    from the feeder at initiation), and land arrived transfers.
//!
//! Stations never call each other; all coordination goes through storage
//! state. Each [`storage::Storage`] serializes its own mutations behind one
//! lock, so quantity accounting stays exact under concurrent access.
//!
//! # Key Types
//!
//! - [`storage::Storage`] -- capacity-bounded, UoM-designated locations
//!   with exact add/remove/query semantics.
//! - [`station::Station`] -- one production unit: input and output storage,
//!   a timed idle/producing state machine, and an expertise curve.
//! - [`line::ProductionLine`] -- stations wired into a directed graph, plus
//!   the in-flight [`transfer::Transfer`] list.
//! - [`scheduler::Scheduler`] -- one worker thread per station plus one for
//!   the line, ~100ms tick cadence.
//! - [`registry::Registry`] -- immutable resource/UoM definitions (frozen
//!   at startup).
//! - [`event::EventSink`] -- injected observer port; every state transition
//!   emits an [`event::Event`].
//! - [`qty::Qty`] -- Q32.32 fixed-point quantity for exact accounting.

pub mod clock;
pub mod content;
pub mod event;
pub mod expertise;
pub mod graph;
pub mod id;
pub mod line;
pub mod qty;
pub mod registry;
pub mod scheduler;
pub mod station;
pub mod storage;
pub mod transfer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
