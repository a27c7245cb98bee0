//! Prodsim Data -- manifest formats and the facility loader.
//!
//! Facility manifests (resources, units of measure, station definitions,
//! feeder relationships) are declared in RON, JSON, or TOML, then resolved
//! against a frozen registry into ready-to-run stations and a wired
//! production line.

pub mod loader;
pub mod schema;

pub use loader::{build_facility, load_manifest, parse_manifest, DataError, Facility, Format};
pub use schema::ManifestData;
