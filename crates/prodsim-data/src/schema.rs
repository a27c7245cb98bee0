//! Serde data file structs for facility manifests.
//!
//! These structs define the on-disk format for resources, units of measure,
//! station definitions, and feeder relationships. They are deserialized
//! from RON, JSON, or TOML manifests and then resolved into engine types by
//! the loader.

use prodsim_core::registry::ResourceCategory;
use serde::Deserialize;

// ===========================================================================
// Resources and units of measure
// ===========================================================================

/// A resource definition in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ResourceCategory,
}

/// A unit-of-measure definition in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct UomData {
    pub name: String,
}

/// The discrete-unit UoM every manifest gets for free.
pub const DEFAULT_UOM: &str = "each";

fn default_uom() -> String {
    DEFAULT_UOM.to_string()
}

/// A SKU reference, supporting both short resource-name form (UoM defaults
/// to `each`) and full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SkuData {
    /// Short form: a bare resource name.
    Short(String),
    /// Full form with an explicit unit of measure.
    Full {
        resource: String,
        #[serde(default = "default_uom")]
        uom: String,
    },
}

impl SkuData {
    pub fn resource(&self) -> &str {
        match self {
            SkuData::Short(name) => name,
            SkuData::Full { resource, .. } => resource,
        }
    }

    pub fn uom(&self) -> &str {
        match self {
            SkuData::Short(_) => DEFAULT_UOM,
            SkuData::Full { uom, .. } => uom,
        }
    }
}

// ===========================================================================
// Stations
// ===========================================================================

/// One input requirement or output product line of a station.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementData {
    pub resource: String,
    #[serde(default = "default_uom")]
    pub uom: String,
    pub qty: f64,
    pub capacity: u32,
}

/// Output-room policy for starting a run.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyData {
    #[default]
    RequireAll,
    RequireAny,
}

/// Expertise ramp parameters. Externally tagged so all three manifest
/// formats can express it.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseData {
    ByRuns {
        runs_until_expert: u64,
        max_time_reduction: f64,
    },
    ByTime {
        seconds_until_expert: f64,
        max_time_reduction: f64,
    },
}

/// A station definition in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct StationData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<RequirementData>,
    pub outputs: Vec<RequirementData>,
    pub duration_secs: f64,
    #[serde(default)]
    pub strategy: StrategyData,
    #[serde(default)]
    pub expertise: Option<ExpertiseData>,
}

// ===========================================================================
// Line topology
// ===========================================================================

/// A feeder relationship: `from`'s output supplies `to`, restricted to the
/// listed SKUs.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedData {
    pub from: String,
    pub to: String,
    pub skus: Vec<SkuData>,
}

fn default_transfer_secs() -> f64 {
    1.0
}

/// A complete facility manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestData {
    #[serde(default)]
    pub resources: Vec<ResourceData>,
    #[serde(default)]
    pub uoms: Vec<UomData>,
    pub stations: Vec<StationData>,
    #[serde(default)]
    pub feeds: Vec<FeedData>,
    /// Base travel time for every transfer, in seconds.
    #[serde(default = "default_transfer_secs")]
    pub transfer_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_short_form_defaults_uom() {
        let sku: SkuData = ron::from_str("\"sku_a\"").unwrap();
        assert_eq!(sku.resource(), "sku_a");
        assert_eq!(sku.uom(), DEFAULT_UOM);
    }

    #[test]
    fn sku_full_form_keeps_uom() {
        let sku: SkuData =
            serde_json::from_str(r#"{"resource": "sku_a", "uom": "pallet"}"#).unwrap();
        assert_eq!(sku.resource(), "sku_a");
        assert_eq!(sku.uom(), "pallet");
    }

    #[test]
    fn station_defaults_apply() {
        let station: StationData = ron::from_str(
            r#"(
                name: "source",
                outputs: [(resource: "sku_a", qty: 5.0, capacity: 10)],
                duration_secs: 3.0,
            )"#,
        )
        .unwrap();
        assert!(station.inputs.is_empty());
        assert!(matches!(station.strategy, StrategyData::RequireAll));
        assert!(station.expertise.is_none());
        assert_eq!(station.outputs[0].uom, DEFAULT_UOM);
    }

    #[test]
    fn manifest_parses_from_toml() {
        let manifest: ManifestData = toml::from_str(
            r#"
            transfer_secs = 2.0

            [[resources]]
            name = "sku_a"

            [[stations]]
            name = "source"
            duration_secs = 3.0

            [[stations.outputs]]
            resource = "sku_a"
            qty = 5.0
            capacity = 10
            "#,
        )
        .unwrap();
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.stations.len(), 1);
        assert!((manifest.transfer_secs - 2.0).abs() < 1e-9);
    }
}
