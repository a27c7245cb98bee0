//! Simulation events and the injected event sink.
//!
//! Delivery is synchronous, fire-and-forget, best-effort: an emitting
//! component never waits on a subscriber beyond the `emit` call itself.
//! The sink is injected at construction (no process-global bus), so
//! delivery order and subscriber lifetime are explicit.

use crate::id::{StationId, StorageId};
use crate::storage::StorageError;
use crate::transfer::Transfer;
use parking_lot::Mutex;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A simulation event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StationAdded {
        station: StationId,
    },
    /// Declared for observers; no removal flow emits it yet.
    StationRemoved {
        station: StationId,
    },
    ProductionStarted {
        station: StationId,
    },
    ProductionFinished {
        station: StationId,
    },
    TransferStarted {
        transfer: Transfer,
    },
    TransferCompleted {
        transfer: Transfer,
    },
    /// A storage operation failed. The typed error is the diagnostic
    /// payload (requested content, space available, designations).
    StorageFault {
        storage: StorageId,
        error: StorageError,
    },
}

/// Discriminant tag for event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StationAdded,
    StationRemoved,
    ProductionStarted,
    ProductionFinished,
    TransferStarted,
    TransferCompleted,
    StorageFault,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StationAdded { .. } => EventKind::StationAdded,
            Event::StationRemoved { .. } => EventKind::StationRemoved,
            Event::ProductionStarted { .. } => EventKind::ProductionStarted,
            Event::ProductionFinished { .. } => EventKind::ProductionFinished,
            Event::TransferStarted { .. } => EventKind::TransferStarted,
            Event::TransferCompleted { .. } => EventKind::TransferCompleted,
            Event::StorageFault { .. } => EventKind::StorageFault,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Outbound port for event delivery. Implementations must not block the
/// emitter; a slow or missing subscriber costs the caller nothing beyond
/// the call itself.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Shared handle to a sink, cloned into every component that emits.
pub type SharedSink = Arc<dyn EventSink>;

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Buffers every event in memory. The observer of choice for tests and
/// small demos.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything emitted so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Drain the buffer, returning everything emitted since the last take.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Forwards events over a bounded crossbeam channel. When the channel is
/// full or disconnected the event is dropped rather than blocking the
/// simulation.
#[derive(Debug)]
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<Event>,
}

impl ChannelSink {
    /// Create a sink and its receiving end.
    pub fn bounded(capacity: usize) -> (Arc<Self>, crossbeam_channel::Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        if let Err(err) = self.tx.try_send(event) {
            tracing::debug!(?err, "event dropped: channel full or disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_records_in_order() {
        let sink = CollectingSink::new();
        sink.emit(Event::StationAdded {
            station: StationId(0),
        });
        sink.emit(Event::ProductionStarted {
            station: StationId(0),
        });

        let events = sink.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), EventKind::StationAdded);
        assert_eq!(events[1].kind(), EventKind::ProductionStarted);
        assert_eq!(sink.count_of(EventKind::ProductionStarted), 1);
    }

    #[test]
    fn collecting_sink_take_drains() {
        let sink = CollectingSink::new();
        sink.emit(Event::StationAdded {
            station: StationId(1),
        });
        assert_eq!(sink.take().len(), 1);
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn channel_sink_delivers_and_drops_when_full() {
        let (sink, rx) = ChannelSink::bounded(1);
        sink.emit(Event::StationAdded {
            station: StationId(0),
        });
        // Second emit finds the channel full and is dropped, not blocked.
        sink.emit(Event::StationAdded {
            station: StationId(1),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::StationAdded {
                station: StationId(0)
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullSink;
        sink.emit(Event::StationRemoved {
            station: StationId(9),
        });
    }
}
