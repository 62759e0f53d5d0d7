//! In-memory graph store with JSON snapshot persistence
//!
//! Used by the CLI to crawl into a local snapshot file and by tests as the
//! store double. Writes are applied under a single lock, so an
//! [`EntityOutput`] is never half-applied.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::claim::{Claim, Value};
use super::entity::{EntityId, PackageRef};
use super::output::EntityOutput;
use super::store::GraphStore;

/// A stored entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub label: String,
    pub claims: Vec<Claim>,
    /// Number of writes applied, creation included
    pub revision: u64,
    pub last_summary: Option<String>,
}

impl StoredEntity {
    pub fn claims_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |c| c.property == property)
    }
}

/// Serializable contents of a [`MemoryGraphStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub next_id: u64,
    pub entities: BTreeMap<EntityId, StoredEntity>,
}

/// Graph store held in memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: RwLock<GraphSnapshot>,
}

impl MemoryGraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(mut snapshot: GraphSnapshot) -> Self {
        let highest = snapshot
            .entities
            .keys()
            .filter_map(|id| id.as_str().trim_start_matches('Q').parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        snapshot.next_id = snapshot.next_id.max(highest + 1);
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Load a snapshot file, or start empty if the file does not exist
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Snapshot not found, starting with an empty graph");
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a snapshot file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = {
            let state = self.read()?;
            serde_json::to_string_pretty(&*state)?
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }

    /// Insert an entity under a known id, replacing whatever was there
    pub fn insert(&self, id: EntityId, entity: StoredEntity) -> Result<()> {
        let mut state = self.write()?;
        if let Ok(n) = id.as_str().trim_start_matches('Q').parse::<u64>() {
            state.next_id = state.next_id.max(n + 1);
        }
        state.entities.insert(id, entity);
        Ok(())
    }

    pub fn entity(&self, id: &EntityId) -> Result<Option<StoredEntity>> {
        Ok(self.read()?.entities.get(id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entities.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, GraphSnapshot>> {
        self.state
            .read()
            .map_err(|_| Error::GraphStore("graph state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GraphSnapshot>> {
        self.state
            .write()
            .map_err(|_| Error::GraphStore("graph state lock poisoned".to_string()))
    }
}

/// Apply an output to an entity's claim list
fn apply_output(entity: &mut StoredEntity, output: EntityOutput) {
    entity
        .claims
        .retain(|c| !output.replace.contains(&c.property));

    for queued in output.claims {
        let claim = queued.claim;
        if let Some(existing) = entity.claims.iter_mut().find(|c| c.same_statement(&claim)) {
            existing.qualifiers = claim.qualifiers;
            existing.rank = claim.rank;
            for reference in claim.references {
                existing.add_reference(reference);
            }
            continue;
        }
        if queued.skip_if_conflicting && entity.claims.iter().any(|c| c.property == claim.property)
        {
            continue;
        }
        entity.claims.push(claim);
    }

    entity.revision += 1;
    entity.last_summary = Some(output.summary);
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn registry_names(&self, property: &str) -> Result<Vec<(EntityId, PackageRef)>> {
        let state = self.read()?;
        let pairs = state
            .entities
            .iter()
            .flat_map(|(id, entity)| {
                entity.claims_for(property).filter_map(move |c| match &c.value {
                    Value::String(name) => Some((id.clone(), name.clone())),
                    _ => None,
                })
            })
            .collect();
        Ok(pairs)
    }

    async fn create_entity(
        &self,
        label: &str,
        claims: Vec<Claim>,
        summary: &str,
    ) -> Result<EntityId> {
        let mut state = self.write()?;
        let id = EntityId::new(format!("Q{}", state.next_id.max(1)));
        state.next_id = state.next_id.max(1) + 1;
        state.entities.insert(
            id.clone(),
            StoredEntity {
                label: label.to_string(),
                claims,
                revision: 1,
                last_summary: Some(summary.to_string()),
            },
        );
        debug!(entity = %id, label, "Created entity");
        Ok(id)
    }

    async fn claims(&self, entity: &EntityId, property: &str) -> Result<Vec<Claim>> {
        let state = self.read()?;
        let stored = state
            .entities
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;
        Ok(stored.claims_for(property).cloned().collect())
    }

    async fn submit(&self, entity: &EntityId, output: EntityOutput) -> Result<()> {
        let mut state = self.write()?;
        let stored = state
            .entities
            .get_mut(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;
        let written = output.len();
        apply_output(stored, output);
        debug!(entity = %entity, claims = written, "Applied output");
        Ok(())
    }
}
