//! Immutable definitions of resources and units of measure.
//!
//! The registry is frozen before the simulation starts: register everything
//! through [`RegistryBuilder`], call [`RegistryBuilder::build`], and share the
//! result. Stations and storages only ever carry the cheap id pairs.

use crate::id::{ResourceId, UomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Broad classification of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    #[default]
    Default,
    RawMaterial,
    Intermediate,
    FinishedGood,
}

/// A kind of material. Value-equality, immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub description: String,
    pub category: ResourceCategory,
}

/// A measurement unit category (each, pallet, bottle, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    pub name: String,
}

/// The SKU key: a resource paired with the unit its quantity is expressed in.
/// Used as a map key everywhere quantities are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceUom {
    pub resource: ResourceId,
    pub uom: UomId,
}

impl ResourceUom {
    pub fn new(resource: ResourceId, uom: UomId) -> Self {
        Self { resource, uom }
    }
}

/// Builder for the immutable [`Registry`]. Register everything, then build.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: Vec<Resource>,
    resource_name_to_id: HashMap<String, ResourceId>,
    uoms: Vec<UnitOfMeasure>,
    uom_name_to_id: HashMap<String, UomId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Returns its id. Re-registering a name returns
    /// the existing id.
    pub fn register_resource(
        &mut self,
        name: &str,
        description: &str,
        category: ResourceCategory,
    ) -> ResourceId {
        if let Some(id) = self.resource_name_to_id.get(name) {
            return *id;
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(Resource {
            name: name.to_string(),
            description: description.to_string(),
            category,
        });
        self.resource_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Register a unit of measure. Returns its id.
    pub fn register_uom(&mut self, name: &str) -> UomId {
        if let Some(id) = self.uom_name_to_id.get(name) {
            return *id;
        }
        let id = UomId(self.uoms.len() as u32);
        self.uoms.push(UnitOfMeasure {
            name: name.to_string(),
        });
        self.uom_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Freeze into an immutable registry.
    pub fn build(self) -> Registry {
        Registry {
            resources: self.resources,
            resource_name_to_id: self.resource_name_to_id,
            uoms: self.uoms,
            uom_name_to_id: self.uom_name_to_id,
        }
    }
}

/// Immutable lookup of resource and UoM definitions, frozen at startup.
#[derive(Debug, Clone)]
pub struct Registry {
    resources: Vec<Resource>,
    resource_name_to_id: HashMap<String, ResourceId>,
    uoms: Vec<UnitOfMeasure>,
    uom_name_to_id: HashMap<String, UomId>,
}

impl Registry {
    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0 as usize)
    }

    pub fn uom(&self, id: UomId) -> Option<&UnitOfMeasure> {
        self.uoms.get(id.0 as usize)
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn uom_id(&self, name: &str) -> Option<UomId> {
        self.uom_name_to_id.get(name).copied()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn uom_count(&self) -> usize {
        self.uoms.len()
    }
}
