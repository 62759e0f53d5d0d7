//! Direct dependency extraction from a manifest

use std::collections::BTreeSet;

use crate::error::Result;
use crate::graph::PackageRef;
use crate::registry::Manifest;

/// Scope that only publishes type declarations
const TYPES_SCOPE: &str = "@types/";

/// Path segment marking a type-only package, as in `@scope/types`
const TYPES_SEGMENT: &str = "types";

/// Whether a package only ships type declarations
pub fn is_type_package(name: &str) -> bool {
    name.starts_with(TYPES_SCOPE)
        || (name.contains('/') && name.split('/').any(|segment| segment == TYPES_SEGMENT))
}

/// Runtime and peer dependencies of the `latest` version, type packages removed
pub fn extract_dependencies(manifest: &Manifest) -> Result<BTreeSet<PackageRef>> {
    let latest = manifest.latest_version()?;

    Ok(latest
        .dependencies
        .into_iter()
        .chain(latest.peer_dependencies)
        .filter(|name| !is_type_package(name))
        .collect())
}
