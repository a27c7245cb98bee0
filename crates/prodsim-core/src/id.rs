use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::sync::atomic::{AtomicU64, Ordering};

new_key_type! {
    /// Identifies a station's node in the line connectivity graph.
    pub struct NodeId;

    /// Identifies a feeder edge in the line connectivity graph.
    pub struct EdgeId;
}

/// Identifies a resource (SKU) in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

/// Identifies a unit of measure in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UomId(pub u32);

/// Identifies a station within a production line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub u32);

/// Identifies a storage slot (location) within one storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub u32);

/// Process-unique identity of one storage instance. Carried on storage
/// fault events so observers can tell which side of which station failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageId(pub u64);

/// Process-unique identity token of one content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub u64);

/// Process-unique identity of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub u64);

static NEXT_STORAGE: AtomicU64 = AtomicU64::new(0);
static NEXT_CONTENT: AtomicU64 = AtomicU64::new(0);
static NEXT_TRANSFER: AtomicU64 = AtomicU64::new(0);

impl StorageId {
    /// Allocate the next process-unique storage id.
    pub fn next() -> Self {
        Self(NEXT_STORAGE.fetch_add(1, Ordering::Relaxed))
    }
}

impl ContentId {
    /// Allocate the next process-unique content id. Identity is assigned
    /// here, atomically at creation, never patched in afterward.
    pub fn next() -> Self {
        Self(NEXT_CONTENT.fetch_add(1, Ordering::Relaxed))
    }
}

impl TransferId {
    /// Allocate the next process-unique transfer id.
    pub fn next() -> Self {
        Self(NEXT_TRANSFER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "station#{}", self.0)
    }
}

impl std::fmt::Display for StorageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage#{}", self.0)
    }
}
