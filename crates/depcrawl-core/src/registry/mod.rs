//! Package registry access
//!
//! Provides:
//! - The [`Registry`] trait the crawler depends on
//! - [`RegistryClient`], the HTTP implementation for npm
//! - Manifest types

mod client;
mod types;

pub use client::{RegistryClient, RegistryClientBuilder};
pub use types::{Dist, DistTags, DownloadCount, Manifest, VersionManifest};

use async_trait::async_trait;

use crate::error::Result;

/// Stateless request/response access to a package registry
#[async_trait]
pub trait Registry: Send + Sync {
    /// Public URL of a package manifest, cited as the source of written claims
    fn manifest_url(&self, package: &str) -> String;

    /// Fetch the full manifest of a package
    async fn fetch_manifest(&self, package: &str) -> Result<Manifest>;

    /// Fetch the number of downloads over the last week
    async fn fetch_weekly_downloads(&self, package: &str) -> Result<u64>;
}
