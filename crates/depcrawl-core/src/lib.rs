//! depcrawl Core Library
//!
//! This crate provides the core functionality for depcrawl, including:
//! - Identity map between npm package names and graph entities
//! - npm registry client (manifests, weekly download counts)
//! - Knowledge graph seam (claims, in-memory store, SPARQL identity import)
//! - Dependency crawl (extraction, entity materialization, scheduling)
//! - Version history reconciliation with bounded retention
//! - Configuration and error types

pub mod config;
pub mod crawl;
pub mod error;
pub mod graph;
pub mod identity;
pub mod registry;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, GraphSchema};
    pub use crate::crawl::{CrawlOptions, CrawlReport, CrawlScheduler};
    pub use crate::error::{Error, Result};
    pub use crate::graph::{EntityId, GraphStore, MemoryGraphStore};
    pub use crate::identity::IdentityMap;
    pub use crate::registry::{Registry, RegistryClient};
}
