//! The storage allocation engine.
//!
//! A [`Storage`] owns a fixed set of capacity-bounded [`Location`]s and the
//! [`Content`] physically held at each. Every mutating operation runs under
//! one mutex per storage instance, held for the whole
//! select-location-then-mutate sequence, so concurrent adds and removes can
//! never interleave their accounting.
//!
//! # Location designation
//!
//! A location holds only one unit of measure at a time. The first add stamps
//! the location with that UoM; the designation resets when the location
//! empties. A location locked to a different UoM offers zero space for any
//! other UoM, even when numerically under its raw capacity.

use crate::content::Content;
use crate::id::{LocationId, ResourceId, StorageId, UomId};
use crate::qty::Qty;
use crate::registry::ResourceUom;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Typed failures raised by the storage engine. The recoverable variants
/// double as diagnostic payloads for `StorageFault` events; the caller is
/// responsible for forwarding them to the event sink.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// No location accepts this SKU at all (wrong UoM or resource limits).
    #[error("{storage}: no location accepts {sku:?}")]
    NoLocationFound { storage: StorageId, sku: ResourceUom },

    /// Matching locations exist but none has room for the full quantity.
    /// Carries the total space available for the SKU and the current
    /// per-location designations for diagnostics.
    #[error("{storage}: no location with capacity for {qty} of {sku:?} ({space_available} available)")]
    NoLocationWithCapacity {
        storage: StorageId,
        sku: ResourceUom,
        qty: Qty,
        space_available: Qty,
        designations: Vec<(LocationId, Option<UomId>)>,
    },

    /// The location has no capacity entry for the content's UoM, or the
    /// content's resource is outside the location's resource limitations.
    #[error("{storage}: content {sku:?} does not match location {location:?}")]
    ContentDoesntMatchLocation {
        storage: StorageId,
        location: LocationId,
        sku: ResourceUom,
    },

    /// The location is currently designated to a different UoM.
    #[error("{storage}: location {location:?} is designated to {designated:?}")]
    ContentDoesntMatchLocationDesignation {
        storage: StorageId,
        location: LocationId,
        designated: UomId,
    },

    /// Adding the content would exceed the location's capacity.
    #[error("{storage}: no room at location {location:?} for {qty} of {sku:?}")]
    NoRoomAtLocation {
        storage: StorageId,
        location: LocationId,
        sku: ResourceUom,
        qty: Qty,
    },

    /// A referenced content unit is not present at the location.
    #[error("{storage}: content not found at location {location:?}")]
    MissingContent {
        storage: StorageId,
        location: LocationId,
    },

    /// No single location holds enough of the SKU to satisfy the removal.
    /// Removal never pools across locations.
    #[error("{storage}: no single location holds {qty} of {sku:?}")]
    NoLocationToRemoveContent {
        storage: StorageId,
        sku: ResourceUom,
        qty: Qty,
    },

    /// Fatal internal-consistency violation: the reconciled removal does not
    /// equal the requested quantity. Never retried, never downgraded.
    #[error("{storage}: removed {removed} but {requested} was requested")]
    QuantityMismatch {
        storage: StorageId,
        requested: Qty,
        removed: Qty,
    },

    /// An unknown location id was passed to an explicit-location operation.
    #[error("{storage}: unknown location {location:?}")]
    UnknownLocation {
        storage: StorageId,
        location: LocationId,
    },
}

impl StorageError {
    /// Whether the caller may retry after conditions change. The quantity
    /// mismatch is an internal invariant violation and must never be
    /// treated as retryable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StorageError::QuantityMismatch { .. })
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// One capacity-bounded storage slot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    /// Integer capacity per unit of measure this location can hold.
    pub uom_capacities: BTreeMap<UomId, u32>,
    /// Resources this location accepts. Empty means unrestricted.
    #[serde(default)]
    pub resource_limitations: Vec<ResourceId>,
}

impl Location {
    pub fn new(id: LocationId, uom_capacities: BTreeMap<UomId, u32>) -> Self {
        Self {
            id,
            uom_capacities,
            resource_limitations: Vec::new(),
        }
    }

    pub fn with_resource_limitations(mut self, resources: Vec<ResourceId>) -> Self {
        self.resource_limitations = resources;
        self
    }

    /// Capacity for a UoM, if this location can hold it at all.
    pub fn capacity_for(&self, uom: UomId) -> Option<u32> {
        self.uom_capacities.get(&uom).copied()
    }

    /// Whether the location's resource limitations admit this resource.
    pub fn accepts_resource(&self, resource: ResourceId) -> bool {
        self.resource_limitations.is_empty() || self.resource_limitations.contains(&resource)
    }
}

// ---------------------------------------------------------------------------
// Location queries
// ---------------------------------------------------------------------------

/// Filter for [`Storage::location_match`]. Every `Some` field must be
/// satisfied; `None` fields do not constrain the match.
#[derive(Debug, Clone, Default)]
pub struct LocationQuery {
    /// Location must currently hold content of at least one of these SKUs.
    pub holding_skus: Option<Vec<ResourceUom>>,
    /// Location's active designation must be one of these (`None` entries
    /// match undesignated locations).
    pub designations: Option<Vec<Option<UomId>>>,
    /// Every listed resource must pass the location's resource limitations.
    pub resource_limits: Option<Vec<ResourceId>>,
    /// Restrict candidates to this explicit subset.
    pub location_range: Option<Vec<LocationId>>,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// One location's live state: the immutable location description, the
/// content stored there, and the active UoM designation.
#[derive(Debug)]
struct Slot {
    location: Location,
    contents: Vec<Content>,
    designation: Option<UomId>,
}

impl Slot {
    /// Total quantity at this slot. All stored content shares the
    /// designated UoM, so this is the number the capacity bounds.
    fn total_qty(&self) -> Qty {
        self.contents.iter().map(Content::qty).sum()
    }

    /// Quantity of one SKU at this slot.
    fn qty_of(&self, sku: ResourceUom) -> Qty {
        self.contents
            .iter()
            .filter(|c| c.resource_uom() == sku)
            .map(Content::qty)
            .sum()
    }

    /// Free space for a UoM: zero when designated to a different UoM.
    fn space_for(&self, uom: UomId) -> Qty {
        match self.designation {
            Some(d) if d != uom => Qty::ZERO,
            _ => match self.location.capacity_for(uom) {
                Some(cap) => Qty::from_num(cap) - self.total_qty(),
                None => Qty::ZERO,
            },
        }
    }
}

/// A set of capacity-bounded locations with race-free quantity accounting.
///
/// The location set is fixed at construction. All mutation goes through
/// [`Storage::add_content`] and [`Storage::remove_content`]; queries take a
/// consistent snapshot within one call but not across calls.
#[derive(Debug)]
pub struct Storage {
    id: StorageId,
    slots: Mutex<Vec<Slot>>,
}

impl Storage {
    pub fn new(locations: Vec<Location>) -> Self {
        let slots = locations
            .into_iter()
            .map(|location| Slot {
                location,
                contents: Vec::new(),
                designation: None,
            })
            .collect();
        Self {
            id: StorageId::next(),
            slots: Mutex::new(slots),
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Place `content` into a location. With `location == None` the engine
    /// selects one via the open-location search. Same-SKU content at the
    /// chosen location is coalesced into one entry, so the stored entry
    /// count never grows unboundedly.
    pub fn add_content(
        &self,
        content: Content,
        location: Option<LocationId>,
    ) -> Result<LocationId, StorageError> {
        let mut slots = self.slots.lock();
        let idx = match location {
            Some(loc) => self.slot_index(&slots, loc)?,
            None => self.find_open_slot(&slots, &content)?,
        };
        self.add_to_slot(&mut slots, idx, content, true)?;
        Ok(slots[idx].location.id)
    }

    /// Select a location that can take `content` in full, without mutating.
    /// The mutating path re-runs this under the lock, so the result is only
    /// advisory for callers.
    pub fn find_open_location(&self, content: &Content) -> Result<LocationId, StorageError> {
        let slots = self.slots.lock();
        let idx = self.find_open_slot(&slots, content)?;
        Ok(slots[idx].location.id)
    }

    /// Remove exactly `request.qty()` of `request`'s SKU from one location.
    ///
    /// The first location (in construction order) holding at least the
    /// requested quantity is used; removal never pools across locations.
    /// Stored entries are popped in stored order until the accumulated
    /// quantity covers the request; any overshoot is split off and returned
    /// to the same location. The returned content's quantity always equals
    /// the request exactly, or the call fails.
    pub fn remove_content(
        &self,
        request: &Content,
        location: Option<LocationId>,
    ) -> Result<Content, StorageError> {
        let sku = request.resource_uom();
        let requested = request.qty();
        let mut slots = self.slots.lock();

        // Pick the single source location.
        let idx = match location {
            Some(loc) => {
                let idx = self.slot_index(&slots, loc)?;
                if slots[idx].qty_of(sku) < requested {
                    return Err(StorageError::NoLocationToRemoveContent {
                        storage: self.id,
                        sku,
                        qty: requested,
                    });
                }
                idx
            }
            None => slots
                .iter()
                .position(|s| s.qty_of(sku) >= requested)
                .ok_or(StorageError::NoLocationToRemoveContent {
                    storage: self.id,
                    sku,
                    qty: requested,
                })?,
        };

        // Pop matching entries in stored order until the request is covered.
        let mut removed: Vec<Content> = Vec::new();
        let mut accumulated = Qty::ZERO;
        while accumulated < requested {
            let slot = &mut slots[idx];
            let pos = slot
                .contents
                .iter()
                .position(|c| c.resource_uom() == sku)
                .ok_or(StorageError::MissingContent {
                    storage: self.id,
                    location: slot.location.id,
                })?;
            let popped = slot.contents.remove(pos);
            accumulated += popped.qty();
            removed.push(popped);
        }

        // Reconcile overshoot: split one accumulated entry and return the
        // surplus to the same location. The put-back bypasses capacity and
        // designation validation since it restores material to the slot it
        // just left.
        let delta = accumulated - requested;
        if delta > Qty::ZERO {
            let split_pos = removed
                .iter()
                .position(|c| c.qty() >= delta)
                .ok_or(StorageError::QuantityMismatch {
                    storage: self.id,
                    requested,
                    removed: accumulated,
                })?;
            let to_split = removed.remove(split_pos);
            if to_split.qty() == delta {
                self.restore_to_slot(&mut slots, idx, to_split);
            } else {
                let (kept, put_back) = to_split.split(to_split.qty() - delta).map_err(|_| {
                    StorageError::QuantityMismatch {
                        storage: self.id,
                        requested,
                        removed: accumulated,
                    }
                })?;
                removed.push(kept);
                self.restore_to_slot(&mut slots, idx, put_back);
            }
        }

        // An emptied location loses its designation and becomes eligible
        // for any UoM again.
        if slots[idx].contents.is_empty() {
            slots[idx].designation = None;
        }

        // Roll up and enforce the exact-quantity post-condition.
        let total: Qty = removed.iter().map(Content::qty).sum();
        if total != requested {
            return Err(StorageError::QuantityMismatch {
                storage: self.id,
                requested,
                removed: total,
            });
        }
        request
            .with_qty(total)
            .map_err(|_| StorageError::QuantityMismatch {
                storage: self.id,
                requested,
                removed: total,
            })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Free space per location for one UoM. A location designated to a
    /// different UoM reports zero.
    pub fn space_at_locations(
        &self,
        uom: UomId,
        locations: &[LocationId],
    ) -> HashMap<LocationId, Qty> {
        let slots = self.slots.lock();
        slots
            .iter()
            .filter(|s| locations.contains(&s.location.id))
            .map(|s| (s.location.id, s.space_for(uom)))
            .collect()
    }

    /// Locations satisfying every populated filter of the query.
    pub fn location_match(&self, query: &LocationQuery) -> Vec<LocationId> {
        let slots = self.slots.lock();
        slots
            .iter()
            .filter(|s| Self::slot_matches(s, query))
            .map(|s| s.location.id)
            .collect()
    }

    /// Held quantity per SKU across the (optionally restricted) location
    /// set. Every requested SKU appears in the result, zero-seeded.
    pub fn qty_of_resource_uoms(
        &self,
        skus: &[ResourceUom],
        location_range: Option<&[LocationId]>,
    ) -> HashMap<ResourceUom, Qty> {
        let slots = self.slots.lock();
        let mut totals: HashMap<ResourceUom, Qty> =
            skus.iter().map(|sku| (*sku, Qty::ZERO)).collect();

        for slot in slots.iter() {
            if let Some(range) = location_range
                && !range.contains(&slot.location.id)
            {
                continue;
            }
            for content in &slot.contents {
                let sku = content.resource_uom();
                if !skus.is_empty() && !skus.contains(&sku) {
                    continue;
                }
                *totals.entry(sku).or_insert(Qty::ZERO) += content.qty();
            }
        }
        totals
    }

    /// Convenience: held quantity of one SKU across all locations.
    pub fn qty_of(&self, sku: ResourceUom) -> Qty {
        self.qty_of_resource_uoms(&[sku], None)
            .get(&sku)
            .copied()
            .unwrap_or(Qty::ZERO)
    }

    /// Free space per SKU, summed over exactly the locations whose resource
    /// limitations admit the SKU's resource.
    pub fn space_for_resource_uom(&self, skus: &[ResourceUom]) -> HashMap<ResourceUom, Qty> {
        let slots = self.slots.lock();
        skus.iter()
            .map(|sku| {
                let space: Qty = slots
                    .iter()
                    .filter(|s| s.location.accepts_resource(sku.resource))
                    .map(|s| s.space_for(sku.uom))
                    .sum();
                (*sku, space)
            })
            .collect()
    }

    /// Full inventory rolled up by SKU. Only held SKUs appear.
    pub fn inventory_by_resource_uom(&self) -> HashMap<ResourceUom, Qty> {
        self.qty_of_resource_uoms(&[], None)
    }

    /// Snapshot of the content stored at one location.
    pub fn contents_at(&self, location: LocationId) -> Vec<Content> {
        let slots = self.slots.lock();
        slots
            .iter()
            .find(|s| s.location.id == location)
            .map(|s| s.contents.clone())
            .unwrap_or_default()
    }

    /// The active UoM designation of each location.
    pub fn designations(&self) -> Vec<(LocationId, Option<UomId>)> {
        let slots = self.slots.lock();
        slots
            .iter()
            .map(|s| (s.location.id, s.designation))
            .collect()
    }

    pub fn occupied_locations(&self) -> Vec<LocationId> {
        let slots = self.slots.lock();
        slots
            .iter()
            .filter(|s| !s.contents.is_empty())
            .map(|s| s.location.id)
            .collect()
    }

    pub fn empty_locations(&self) -> Vec<LocationId> {
        let slots = self.slots.lock();
        slots
            .iter()
            .filter(|s| s.contents.is_empty())
            .map(|s| s.location.id)
            .collect()
    }

    pub fn locations(&self) -> Vec<Location> {
        let slots = self.slots.lock();
        slots.iter().map(|s| s.location.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Internals (all callers hold the lock)
    // -----------------------------------------------------------------------

    fn slot_index(&self, slots: &[Slot], location: LocationId) -> Result<usize, StorageError> {
        slots
            .iter()
            .position(|s| s.location.id == location)
            .ok_or(StorageError::UnknownLocation {
                storage: self.id,
                location,
            })
    }

    fn slot_matches(slot: &Slot, query: &LocationQuery) -> bool {
        if let Some(range) = &query.location_range
            && !range.contains(&slot.location.id)
        {
            return false;
        }
        if let Some(designations) = &query.designations
            && !designations.contains(&slot.designation)
        {
            return false;
        }
        if let Some(skus) = &query.holding_skus
            && !slot.contents.iter().any(|c| skus.contains(&c.resource_uom()))
        {
            return false;
        }
        if let Some(resources) = &query.resource_limits
            && !resources.iter().all(|r| slot.location.accepts_resource(*r))
        {
            return false;
        }
        true
    }

    /// The open-location search: a location must have a capacity entry for
    /// the content's UoM, admit its resource, be undesignated or designated
    /// to the same UoM, and have room for the full quantity. The first
    /// qualifying location in construction order wins.
    fn find_open_slot(&self, slots: &[Slot], content: &Content) -> Result<usize, StorageError> {
        let sku = content.resource_uom();
        let eligible: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.location.capacity_for(sku.uom).is_some()
                    && s.location.accepts_resource(sku.resource)
                    && (s.designation.is_none() || s.designation == Some(sku.uom))
            })
            .map(|(i, _)| i)
            .collect();

        if eligible.is_empty() {
            return Err(StorageError::NoLocationFound {
                storage: self.id,
                sku,
            });
        }

        match eligible
            .iter()
            .find(|&&i| slots[i].space_for(sku.uom) >= content.qty())
        {
            Some(&i) => Ok(i),
            None => {
                let space_available: Qty =
                    eligible.iter().map(|&i| slots[i].space_for(sku.uom)).sum();
                Err(StorageError::NoLocationWithCapacity {
                    storage: self.id,
                    sku,
                    qty: content.qty(),
                    space_available,
                    designations: slots
                        .iter()
                        .map(|s| (s.location.id, s.designation))
                        .collect(),
                })
            }
        }
    }

    /// Validated insert at a known slot. With `validate` the full contract
    /// applies; the put-back path skips it via [`Self::restore_to_slot`].
    fn add_to_slot(
        &self,
        slots: &mut [Slot],
        idx: usize,
        content: Content,
        validate: bool,
    ) -> Result<(), StorageError> {
        let sku = content.resource_uom();
        let slot = &mut slots[idx];

        if validate {
            let capacity = match slot.location.capacity_for(sku.uom) {
                Some(cap) => cap,
                None => {
                    return Err(StorageError::ContentDoesntMatchLocation {
                        storage: self.id,
                        location: slot.location.id,
                        sku,
                    });
                }
            };
            if !slot.location.accepts_resource(sku.resource) {
                return Err(StorageError::ContentDoesntMatchLocation {
                    storage: self.id,
                    location: slot.location.id,
                    sku,
                });
            }
            if let Some(designated) = slot.designation
                && designated != sku.uom
            {
                return Err(StorageError::ContentDoesntMatchLocationDesignation {
                    storage: self.id,
                    location: slot.location.id,
                    designated,
                });
            }
            if slot.total_qty() + content.qty() > Qty::from_num(capacity) {
                return Err(StorageError::NoRoomAtLocation {
                    storage: self.id,
                    location: slot.location.id,
                    sku,
                    qty: content.qty(),
                });
            }
        }

        // Coalesce same-SKU content into one entry.
        match slot.contents.iter_mut().find(|c| c.resource_uom() == sku) {
            Some(existing) => existing.merge(content),
            None => slot.contents.push(content),
        }
        slot.designation = Some(sku.uom);
        Ok(())
    }

    /// Unvalidated re-insert used by the removal reconciliation. The
    /// material was just popped from this very slot, so space and
    /// designation are known good.
    fn restore_to_slot(&self, slots: &mut [Slot], idx: usize, content: Content) {
        // Cannot fail: validation is skipped.
        let _ = self.add_to_slot(slots, idx, content, false);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
