//! Two-way lookup between registry package names and graph entity ids

use std::collections::HashMap;

use tracing::info;

use crate::error::{Error, Result};
use crate::graph::{EntityId, GraphStore, PackageRef};

/// Bijection `PackageRef <-> EntityId` with O(1) lookup in both directions
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    forward: HashMap<PackageRef, EntityId>,
    inverse: HashMap<EntityId, PackageRef>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from one bulk query against the store
    ///
    /// Any query failure is fatal for the run and reported as
    /// [`Error::IdentityLoad`].
    pub async fn load<S: GraphStore + ?Sized>(
        store: &S,
        registry_name_property: &str,
    ) -> Result<Self> {
        let pairs = store
            .registry_names(registry_name_property)
            .await
            .map_err(|e| match e {
                Error::IdentityLoad(msg) => Error::IdentityLoad(msg),
                other => Error::IdentityLoad(other.to_string()),
            })?;

        let map: Self = pairs.into_iter().map(|(id, name)| (name, id)).collect();
        info!(packages = map.len(), "Loaded identity map");
        Ok(map)
    }

    /// Map `package` to `id`, dropping any mapping either side had before
    pub fn put(&mut self, package: impl Into<PackageRef>, id: EntityId) {
        let package = package.into();
        if let Some(old_id) = self.forward.remove(&package) {
            self.inverse.remove(&old_id);
        }
        if let Some(old_package) = self.inverse.remove(&id) {
            self.forward.remove(&old_package);
        }
        self.forward.insert(package.clone(), id.clone());
        self.inverse.insert(id, package);
    }

    pub fn remove(&mut self, package: &str) -> Option<EntityId> {
        let id = self.forward.remove(package)?;
        self.inverse.remove(&id);
        Some(id)
    }

    pub fn get_id(&self, package: &str) -> Option<&EntityId> {
        self.forward.get(package)
    }

    pub fn get_ref(&self, id: &EntityId) -> Option<&PackageRef> {
        self.inverse.get(id)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.forward.contains_key(package)
    }

    /// All entity ids, sorted for a reproducible crawl order
    pub fn values(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.inverse.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl FromIterator<(PackageRef, EntityId)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (PackageRef, EntityId)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (package, id) in iter {
            map.put(package, id);
        }
        map
    }
}
