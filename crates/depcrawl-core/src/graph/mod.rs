//! Knowledge graph seam
//!
//! The crawler never talks to a concrete graph directly. It reads and writes
//! through [`GraphStore`], building [`Claim`]s and batching them per entity in
//! an [`EntityOutput`].
//!
//! - [`MemoryGraphStore`]: in-process store with JSON snapshots
//! - [`SparqlClient`]: bulk identity import from a query service

mod claim;
mod entity;
mod memory;
mod output;
pub mod sparql;
mod store;

pub use claim::{Claim, Rank, Reference, Snak, Value};
pub use entity::{EntityId, PackageRef};
pub use memory::{GraphSnapshot, MemoryGraphStore, StoredEntity};
pub use output::{EntityOutput, OutputClaim};
pub use sparql::SparqlClient;
pub use store::GraphStore;
