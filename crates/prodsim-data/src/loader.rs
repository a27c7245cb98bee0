//! Resolution pipeline: parse a manifest, resolve name references into
//! registry ids, and build the stations and production line it describes.

use crate::schema::{
    ExpertiseData, ManifestData, RequirementData, StationData, StrategyData, DEFAULT_UOM,
};
use prodsim_core::content::Content;
use prodsim_core::event::SharedSink;
use prodsim_core::expertise::ExpertiseSpec;
use prodsim_core::id::StationId;
use prodsim_core::line::{LineError, ProductionLine};
use prodsim_core::qty::qty;
use prodsim_core::registry::{Registry, RegistryBuilder, ResourceUom};
use prodsim_core::station::{
    constant_duration, ProductionStrategy, Station, StationResourceDefinition,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("manifest parse error: {detail}")]
    Parse { detail: String },

    /// A resource name was referenced but never declared.
    #[error("unknown resource '{name}' referenced by station '{station}'")]
    UnknownResource { station: String, name: String },

    /// A UoM name was referenced but never declared.
    #[error("unknown unit of measure '{name}' referenced by station '{station}'")]
    UnknownUom { station: String, name: String },

    /// A feed references a station name the manifest does not define.
    #[error("unknown station '{name}' in feed definition")]
    UnknownStation { name: String },

    /// Two stations share a name.
    #[error("duplicate station name '{name}'")]
    DuplicateStation { name: String },

    /// A requirement declares a zero or negative quantity.
    #[error("station '{station}' declares non-positive qty for '{resource}'")]
    NonPositiveQty { station: String, resource: String },

    /// Wiring the line failed.
    #[error(transparent)]
    Line(#[from] LineError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection and parsing
// ===========================================================================

/// Supported manifest formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Deserialize manifest text in the given format.
pub fn parse_manifest<T: DeserializeOwned>(text: &str, format: Format) -> Result<T, DataError> {
    match format {
        Format::Ron => ron::from_str(text).map_err(|e| DataError::Parse {
            detail: e.to_string(),
        }),
        Format::Toml => toml::from_str(text).map_err(|e| DataError::Parse {
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(text).map_err(|e| DataError::Parse {
            detail: e.to_string(),
        }),
    }
}

/// Read and parse a manifest file, detecting the format from its extension.
pub fn load_manifest(path: &Path) -> Result<ManifestData, DataError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    parse_manifest(&text, format)
}

// ===========================================================================
// Resolution
// ===========================================================================

/// A fully resolved facility: the frozen registry, the wired line, and a
/// name-to-id map for the stations.
#[derive(Debug)]
pub struct Facility {
    pub registry: Registry,
    pub line: ProductionLine,
    pub station_ids: HashMap<String, StationId>,
}

/// Resolve a manifest into a ready-to-run facility.
///
/// `drive_stations` selects whether the line's own tick updates its
/// stations or dedicated scheduler workers do.
pub fn build_facility(
    manifest: &ManifestData,
    drive_stations: bool,
    sink: SharedSink,
) -> Result<Facility, DataError> {
    let mut builder = RegistryBuilder::new();
    builder.register_uom(DEFAULT_UOM);
    for uom in &manifest.uoms {
        builder.register_uom(&uom.name);
    }
    for resource in &manifest.resources {
        builder.register_resource(&resource.name, &resource.description, resource.category);
    }
    let registry = builder.build();

    let mut line = ProductionLine::new(
        constant_duration(Duration::from_secs_f64(manifest.transfer_secs)),
        drive_stations,
        sink.clone(),
    );

    let mut station_ids = HashMap::new();
    for (index, data) in manifest.stations.iter().enumerate() {
        if station_ids.contains_key(&data.name) {
            return Err(DataError::DuplicateStation {
                name: data.name.clone(),
            });
        }
        let id = StationId(index as u32);
        let station = build_station(&registry, data, id, sink.clone())?;
        line.add_station(Arc::new(station));
        station_ids.insert(data.name.clone(), id);
    }

    for feed in &manifest.feeds {
        let from = resolve_station(&station_ids, &feed.from)?;
        let to = resolve_station(&station_ids, &feed.to)?;
        let skus = feed
            .skus
            .iter()
            .map(|sku| resolve_sku(&registry, &feed.from, sku.resource(), sku.uom()))
            .collect::<Result<Vec<_>, _>>()?;
        line.connect(from, to, skus)?;
    }

    Ok(Facility {
        registry,
        line,
        station_ids,
    })
}

fn build_station(
    registry: &Registry,
    data: &StationData,
    id: StationId,
    sink: SharedSink,
) -> Result<Station, DataError> {
    let inputs = resolve_requirements(registry, &data.name, &data.inputs)?;
    let outputs = resolve_requirements(registry, &data.name, &data.outputs)?;
    let strategy = match data.strategy {
        StrategyData::RequireAll => ProductionStrategy::RequireAllOutputsHaveSpace,
        StrategyData::RequireAny => ProductionStrategy::RequireAnyOutputHasSpace,
    };
    let expertise = match data.expertise {
        Some(ExpertiseData::ByRuns {
            runs_until_expert,
            max_time_reduction,
        }) => ExpertiseSpec::ByRuns {
            runs_until_expert,
            max_time_reduction,
        },
        Some(ExpertiseData::ByTime {
            seconds_until_expert,
            max_time_reduction,
        }) => ExpertiseSpec::ByTime {
            seconds_until_expert,
            max_time_reduction,
        },
        None => ExpertiseSpec::default(),
    };

    Ok(Station::new(
        id,
        data.name.clone(),
        inputs,
        outputs,
        constant_duration(Duration::from_secs_f64(data.duration_secs)),
        strategy,
        expertise.build(),
        sink,
    ))
}

fn resolve_requirements(
    registry: &Registry,
    station: &str,
    requirements: &[RequirementData],
) -> Result<Vec<StationResourceDefinition>, DataError> {
    requirements
        .iter()
        .map(|req| {
            let sku = resolve_sku(registry, station, &req.resource, &req.uom)?;
            let content =
                Content::new(sku, qty(req.qty)).map_err(|_| DataError::NonPositiveQty {
                    station: station.to_string(),
                    resource: req.resource.clone(),
                })?;
            Ok(StationResourceDefinition::new(content, req.capacity))
        })
        .collect()
}

fn resolve_sku(
    registry: &Registry,
    station: &str,
    resource: &str,
    uom: &str,
) -> Result<ResourceUom, DataError> {
    let resource_id = registry
        .resource_id(resource)
        .ok_or_else(|| DataError::UnknownResource {
            station: station.to_string(),
            name: resource.to_string(),
        })?;
    let uom_id = registry.uom_id(uom).ok_or_else(|| DataError::UnknownUom {
        station: station.to_string(),
        name: uom.to_string(),
    })?;
    Ok(ResourceUom::new(resource_id, uom_id))
}

fn resolve_station(
    station_ids: &HashMap<String, StationId>,
    name: &str,
) -> Result<StationId, DataError> {
    station_ids
        .get(name)
        .copied()
        .ok_or_else(|| DataError::UnknownStation {
            name: name.to_string(),
        })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prodsim_core::event::NullSink;
    use prodsim_core::qty::qty;

    const MANIFEST: &str = r#"(
        transfer_secs: 2.0,
        resources: [
            (name: "sku_a"),
            (name: "sku_b"),
            (name: "sku_c", category: finished_good),
        ],
        stations: [
            (
                name: "source_a",
                outputs: [(resource: "sku_a", qty: 5.0, capacity: 10)],
                duration_secs: 1.0,
            ),
            (
                name: "source_b",
                outputs: [(resource: "sku_b", qty: 1.0, capacity: 5)],
                duration_secs: 1.0,
            ),
            (
                name: "assembler",
                inputs: [
                    (resource: "sku_a", qty: 5.0, capacity: 10),
                    (resource: "sku_b", qty: 1.0, capacity: 5),
                ],
                outputs: [(resource: "sku_c", qty: 3.0, capacity: 3)],
                duration_secs: 3.0,
                expertise: Some(by_runs(runs_until_expert: 5, max_time_reduction: 0.4)),
            ),
        ],
        feeds: [
            (from: "source_a", to: "assembler", skus: ["sku_a"]),
            (from: "source_b", to: "assembler", skus: ["sku_b"]),
        ],
    )"#;

    fn load() -> Facility {
        let manifest: ManifestData = parse_manifest(MANIFEST, Format::Ron).unwrap();
        build_facility(&manifest, false, Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn manifest_resolves_stations_and_feeds() {
        let facility = load();
        assert_eq!(facility.station_ids.len(), 3);
        assert_eq!(facility.registry.resource_count(), 3);

        let assembler_id = facility.station_ids["assembler"];
        let assembler = facility.line.station(assembler_id).unwrap();
        assert_eq!(assembler.input_reqs().len(), 2);
        assert_eq!(assembler.outputs()[0].content.qty(), qty(3.0));
    }

    #[test]
    fn short_sku_form_resolves_against_default_uom() {
        let facility = load();
        let each = facility.registry.uom_id(DEFAULT_UOM).unwrap();
        let source_id = facility.station_ids["source_a"];
        let source = facility.line.station(source_id).unwrap();
        assert_eq!(source.outputs()[0].sku().uom, each);
    }

    #[test]
    fn unknown_resource_is_rejected() {
        let manifest: ManifestData = parse_manifest(
            r#"(
                stations: [(
                    name: "broken",
                    outputs: [(resource: "mystery", qty: 1.0, capacity: 1)],
                    duration_secs: 1.0,
                )],
            )"#,
            Format::Ron,
        )
        .unwrap();
        let err = build_facility(&manifest, false, Arc::new(NullSink)).unwrap_err();
        assert!(matches!(err, DataError::UnknownResource { .. }));
    }

    #[test]
    fn duplicate_station_name_is_rejected() {
        let manifest: ManifestData = parse_manifest(
            r#"(
                resources: [(name: "sku_a")],
                stations: [
                    (name: "twin", outputs: [(resource: "sku_a", qty: 1.0, capacity: 1)], duration_secs: 1.0),
                    (name: "twin", outputs: [(resource: "sku_a", qty: 1.0, capacity: 1)], duration_secs: 1.0),
                ],
            )"#,
            Format::Ron,
        )
        .unwrap();
        let err = build_facility(&manifest, false, Arc::new(NullSink)).unwrap_err();
        assert!(matches!(err, DataError::DuplicateStation { .. }));
    }

    #[test]
    fn feed_to_unknown_station_is_rejected() {
        let manifest: ManifestData = parse_manifest(
            r#"(
                resources: [(name: "sku_a")],
                stations: [
                    (name: "source", outputs: [(resource: "sku_a", qty: 1.0, capacity: 1)], duration_secs: 1.0),
                ],
                feeds: [(from: "source", to: "ghost", skus: ["sku_a"])],
            )"#,
            Format::Ron,
        )
        .unwrap();
        let err = build_facility(&manifest, false, Arc::new(NullSink)).unwrap_err();
        assert!(matches!(err, DataError::UnknownStation { .. }));
    }

    #[test]
    fn json_manifest_parses() {
        let manifest: ManifestData = parse_manifest(
            r#"{
                "resources": [{"name": "sku_a"}],
                "stations": [{
                    "name": "source",
                    "outputs": [{"resource": "sku_a", "qty": 5.0, "capacity": 10}],
                    "duration_secs": 1.0
                }]
            }"#,
            Format::Json,
        )
        .unwrap();
        assert_eq!(manifest.stations.len(), 1);
        assert!((manifest.transfer_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(detect_format(Path::new("m.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("m.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("m.json")).unwrap(), Format::Json);
        assert!(detect_format(Path::new("m.yaml")).is_err());
    }
}
