//! Dependency-graph crawl
//!
//! The [`CrawlScheduler`] pops entities off a work queue and, for each one,
//! fetches its manifest, links (and possibly creates) its dependencies,
//! reconciles its version history and writes everything back in one output.

pub mod dependencies;
pub mod materializer;
pub mod repository;
pub mod scheduler;
pub mod versions;

pub use dependencies::{extract_dependencies, is_type_package};
pub use materializer::{CREATE_SUMMARY, EntityMaterializer};
pub use repository::{normalize_repository_url, repository_claim};
pub use scheduler::{
    CrawlOptions, CrawlReport, CrawlScheduler, ItemFailure, ItemOutcome, UPDATE_SUMMARY,
};
pub use versions::{
    Maturity, VersionClaim, VersionReconciler, VersionReconciliation, VersionRecord,
    assign_preferred_rank, parse_timestamp, retain_bounded, sort_by_publication,
};
