//! Store trait for knowledge graph persistence
//!
//! This module defines the trait the crawler uses to talk to the graph.
//! The trait abstracts over different backends (a live wiki, the in-memory
//! snapshot store, test doubles).

use async_trait::async_trait;

use crate::error::Result;

use super::claim::Claim;
use super::entity::{EntityId, PackageRef};
use super::output::EntityOutput;

/// Store trait for the knowledge graph
///
/// Provides the bulk identity query, entity creation, claim reads and the
/// batched per-entity write.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Every entity carrying `property`, paired with that property's string value
    async fn registry_names(&self, property: &str) -> Result<Vec<(EntityId, PackageRef)>>;

    /// Create a new entity with a label and seed claims, returning its id
    ///
    /// Not idempotent: two calls create two entities.
    async fn create_entity(&self, label: &str, claims: Vec<Claim>, summary: &str)
    -> Result<EntityId>;

    /// Claims of one property on an entity
    async fn claims(&self, entity: &EntityId, property: &str) -> Result<Vec<Claim>>;

    /// Apply a batched output to an entity as one atomic write
    async fn submit(&self, entity: &EntityId, output: EntityOutput) -> Result<()>;
}
