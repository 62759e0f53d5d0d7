//! Popularity-gated creation of entities for undiscovered packages

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::GraphSchema;
use crate::error::Result;
use crate::graph::{Claim, EntityId, GraphStore, PackageRef, Value};
use crate::registry::Registry;

/// Edit summary recorded when an entity is created
pub const CREATE_SUMMARY: &str = "Creating item for missing npm package.";

/// Decides whether an unknown dependency earns an entity, and creates it
///
/// Owns the no-add cache: packages that failed the threshold once are never
/// asked about again within the same run.
#[derive(Debug)]
pub struct EntityMaterializer {
    threshold: u64,
    no_add_cache: HashSet<PackageRef>,
}

impl EntityMaterializer {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            no_add_cache: HashSet::new(),
        }
    }

    /// Whether `package` has already been rejected this run
    pub fn is_rejected(&self, package: &str) -> bool {
        self.no_add_cache.contains(package)
    }

    pub fn rejected_count(&self) -> usize {
        self.no_add_cache.len()
    }

    /// Gate on weekly downloads
    ///
    /// A rejection is cached. A failed download-count request is returned as
    /// an error and leaves the cache untouched.
    pub async fn should_create<R: Registry + ?Sized>(
        &mut self,
        registry: &R,
        package: &str,
    ) -> Result<bool> {
        if self.no_add_cache.contains(package) {
            return Ok(false);
        }

        let downloads = registry.fetch_weekly_downloads(package).await?;
        if downloads >= self.threshold {
            debug!(package, downloads, "Dependency passes popularity threshold");
            Ok(true)
        } else {
            debug!(
                package,
                downloads,
                threshold = self.threshold,
                "Dependency below popularity threshold"
            );
            self.no_add_cache.insert(package.to_string());
            Ok(false)
        }
    }

    /// Create an entity labelled `package` carrying its registry name
    ///
    /// Not idempotent. Check the identity map before calling.
    pub async fn create_entity<S: GraphStore + ?Sized>(
        &self,
        store: &S,
        schema: &GraphSchema,
        package: &str,
    ) -> Result<EntityId> {
        let seed = vec![Claim::new(
            schema.registry_name.as_str(),
            Value::String(package.to_string()),
        )];
        let id = store.create_entity(package, seed, CREATE_SUMMARY).await?;
        info!(package, entity = %id, "Made item for package");
        Ok(id)
    }
}
