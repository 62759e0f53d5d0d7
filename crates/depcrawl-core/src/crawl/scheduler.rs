//! Crawl scheduler: owns the work queue and drives the main loop

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{
    Config, DEFAULT_POPULARITY_THRESHOLD, DEFAULT_RETENTION_CAP, GraphSchema, Traversal,
};
use crate::error::{Error, Result};
use crate::graph::{Claim, EntityId, EntityOutput, GraphStore, PackageRef, Reference, Value};
use crate::identity::IdentityMap;
use crate::registry::Registry;

use super::dependencies::extract_dependencies;
use super::materializer::EntityMaterializer;
use super::repository::repository_claim;
use super::versions::VersionReconciler;

/// Edit summary recorded with each per-item write
pub const UPDATE_SUMMARY: &str = "Adding dependency information.";

/// Knobs for one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    pub traversal: Traversal,
    pub popularity_threshold: u64,
    pub retention_cap: usize,
    pub extract_repository_url: bool,
    /// Stop after this many items have been processed
    pub max_items: Option<usize>,
    /// Compute outputs without creating entities or writing claims
    pub dry_run: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            traversal: Traversal::default(),
            popularity_threshold: DEFAULT_POPULARITY_THRESHOLD,
            retention_cap: DEFAULT_RETENTION_CAP,
            extract_repository_url: false,
            max_items: None,
            dry_run: false,
        }
    }
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            traversal: config.crawl.traversal,
            popularity_threshold: config.crawl.popularity_threshold,
            retention_cap: config.crawl.retention_cap,
            extract_repository_url: config.crawl.extract_repository_url,
            ..Self::default()
        }
    }
}

/// One item that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub entity: EntityId,
    pub package: Option<PackageRef>,
    pub code: &'static str,
    pub message: String,
}

/// Summary of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Items whose output was computed (and submitted unless dry-run)
    pub processed: usize,
    pub failed: Vec<ItemFailure>,
    /// Entities created for newly discovered dependencies
    pub created: usize,
    /// Dependencies below the popularity threshold
    pub rejected: usize,
    /// Dependencies skipped because their download count could not be fetched
    pub skipped_dependencies: usize,
    /// The run stopped on cancellation before the queue drained
    pub cancelled: bool,
    /// The run stopped at `max_items` with work still queued
    pub truncated: bool,
}

impl CrawlReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// What processing one item produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub entity: EntityId,
    pub package: PackageRef,
    pub dependencies: usize,
    pub versions: usize,
    pub preferred_version: Option<String>,
    pub output: EntityOutput,
}

/// Single owner of the work queue, identity map and no-add cache
///
/// Generic over the registry and the store so tests can swap in fakes.
pub struct CrawlScheduler<R: Registry, S: GraphStore> {
    registry: Arc<R>,
    store: Arc<S>,
    schema: GraphSchema,
    options: CrawlOptions,
    identity: IdentityMap,
    queue: VecDeque<EntityId>,
    visited: HashSet<EntityId>,
    /// Dependencies a dry run would have created
    planned: HashSet<PackageRef>,
    materializer: EntityMaterializer,
    report: CrawlReport,
}

impl<R: Registry, S: GraphStore> CrawlScheduler<R, S> {
    /// Load the identity map from the store and queue every known entity
    ///
    /// Fails if the identity query fails; nothing can be crawled without it.
    pub async fn init(
        registry: Arc<R>,
        store: Arc<S>,
        schema: GraphSchema,
        options: CrawlOptions,
    ) -> Result<Self> {
        let identity = IdentityMap::load(store.as_ref(), &schema.registry_name).await?;
        let mut scheduler = Self::with_identity(registry, store, schema, options, identity);
        scheduler.queue = scheduler.identity.values().into();
        info!(queued = scheduler.queue.len(), "Crawl initialized");
        Ok(scheduler)
    }

    /// Build a scheduler around an already loaded identity map, with an empty queue
    pub fn with_identity(
        registry: Arc<R>,
        store: Arc<S>,
        schema: GraphSchema,
        options: CrawlOptions,
        identity: IdentityMap,
    ) -> Self {
        let materializer = EntityMaterializer::new(options.popularity_threshold);
        Self {
            registry,
            store,
            schema,
            options,
            identity,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            planned: HashSet::new(),
            materializer,
            report: CrawlReport::default(),
        }
    }

    /// Replace the queue with the given start packages
    ///
    /// Unknown packages get an entity without passing the popularity gate;
    /// an explicit start is taken as intent.
    pub async fn seed(&mut self, packages: &[PackageRef]) -> Result<()> {
        self.queue.clear();
        for package in packages {
            let id = match self.identity.get_id(package) {
                Some(id) => id.clone(),
                None if self.options.dry_run => {
                    return Err(Error::InvalidInput(format!(
                        "package '{package}' has no entity and dry-run cannot create one"
                    )));
                }
                None => {
                    let id = self
                        .materializer
                        .create_entity(self.store.as_ref(), &self.schema, package)
                        .await?;
                    self.identity.put(package.clone(), id.clone());
                    self.report.created += 1;
                    id
                }
            };
            self.queue.push_back(id);
        }
        info!(queued = self.queue.len(), "Seeded crawl from start packages");
        Ok(())
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Process queued items until the queue drains, `max_items` is reached
    /// or `cancel` fires
    ///
    /// Cancellation is only observed between items, so an item's write is
    /// never cut short.
    pub async fn run(&mut self, cancel: &CancellationToken) -> CrawlReport {
        info!(
            queued = self.queue.len(),
            traversal = %self.options.traversal,
            dry_run = self.options.dry_run,
            "Starting crawl"
        );

        while let Some(entity) = self.next_item() {
            if cancel.is_cancelled() {
                info!(remaining = self.queue.len() + 1, "Crawl cancelled");
                self.report.cancelled = true;
                break;
            }
            if let Some(max) = self.options.max_items
                && self.report.processed + self.report.failed.len() >= max
            {
                info!(max, remaining = self.queue.len() + 1, "Reached item limit");
                self.report.truncated = true;
                break;
            }
            if !self.visited.insert(entity.clone()) {
                debug!(entity = %entity, "Skipping already visited entity");
                continue;
            }

            match self.process_item(&entity).await {
                Ok(outcome) => {
                    self.report.processed += 1;
                    info!(
                        package = %outcome.package,
                        entity = %entity,
                        dependencies = outcome.dependencies,
                        versions = outcome.versions,
                        "Processed package"
                    );
                }
                Err(e) => {
                    let package = self.identity.get_ref(&entity).cloned();
                    if e.is_transient() {
                        warn!(entity = %entity, package = ?package, error = %e, "Failed to process package");
                    } else {
                        error!(entity = %entity, package = ?package, error = %e, "Failed to process package");
                    }
                    self.report.failed.push(ItemFailure {
                        entity: entity.clone(),
                        package,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.report.rejected = self.materializer.rejected_count();
        info!(
            processed = self.report.processed,
            failed = self.report.failed.len(),
            created = self.report.created,
            rejected = self.report.rejected,
            "Crawl finished"
        );
        self.report.clone()
    }

    fn next_item(&mut self) -> Option<EntityId> {
        match self.options.traversal {
            Traversal::BreadthFirst => self.queue.pop_front(),
            Traversal::DepthFirst => self.queue.pop_back(),
        }
    }

    /// Compute and submit the combined output for one entity
    pub async fn process_item(&mut self, entity: &EntityId) -> Result<ItemOutcome> {
        let package = self
            .identity
            .get_ref(entity)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;

        let manifest = self.registry.fetch_manifest(&package).await?;
        let dependencies = extract_dependencies(&manifest)?;

        let mut output = EntityOutput::new(UPDATE_SUMMARY);
        let mut linked = 0;
        for dependency in &dependencies {
            if let Some(id) = self.resolve_dependency(dependency).await? {
                output.add(Claim::new(self.schema.dependency.as_str(), Value::Item(id)));
                linked += 1;
            }
        }

        let existing = self
            .store
            .claims(entity, &self.schema.software_version)
            .await?;
        let reconciliation = VersionReconciler::new(&self.schema, self.options.retention_cap)
            .reconcile(&package, &manifest, existing);
        let versions = reconciliation.claims.len();
        output.replace_property(reconciliation.property.as_str());
        output.extend(reconciliation.claims);

        if self.options.extract_repository_url
            && let Some(claim) = repository_claim(&self.schema, &manifest)
        {
            output.add(claim);
        }

        self.add_classification(&mut output);

        let reference = self.provenance(&package);
        output.attach_reference(
            &reference,
            &[
                self.schema.dependency.as_str(),
                self.schema.software_version.as_str(),
                self.schema.source_code_repository.as_str(),
            ],
        );

        if self.options.dry_run {
            debug!(package = %package, claims = output.len(), "Dry run, not submitting");
        } else {
            self.store.submit(entity, output.clone()).await?;
        }

        Ok(ItemOutcome {
            entity: entity.clone(),
            package,
            dependencies: linked,
            versions,
            preferred_version: reconciliation.preferred,
            output,
        })
    }

    /// Entity id for a dependency, creating one if it passes the gate
    ///
    /// `None` means no dependency edge is written.
    async fn resolve_dependency(&mut self, dependency: &str) -> Result<Option<EntityId>> {
        if let Some(id) = self.identity.get_id(dependency) {
            return Ok(Some(id.clone()));
        }
        if self.planned.contains(dependency) {
            return Ok(None);
        }

        match self
            .materializer
            .should_create(self.registry.as_ref(), dependency)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                warn!(package = dependency, error = %e, "Could not fetch download count, skipping dependency");
                self.report.skipped_dependencies += 1;
                return Ok(None);
            }
        }

        if self.options.dry_run {
            info!(package = dependency, "Would create item for package");
            self.planned.insert(dependency.to_string());
            self.report.created += 1;
            return Ok(None);
        }

        let id = self
            .materializer
            .create_entity(self.store.as_ref(), &self.schema, dependency)
            .await?;
        self.report.created += 1;
        self.identity.put(dependency, id.clone());
        self.queue.push_front(id.clone());
        Ok(Some(id))
    }

    /// Static classification claims every package gets
    fn add_classification(&self, output: &mut EntityOutput) {
        let schema = &self.schema;
        output.add(Claim::new(
            schema.instance_of.as_str(),
            Value::item(schema.js_package.as_str()),
        ));
        output.add_unless_conflicting(Claim::new(
            schema.programmed_in.as_str(),
            Value::item(schema.javascript.as_str()),
        ));
        output.add_unless_conflicting(Claim::new(
            schema.operating_system.as_str(),
            Value::item(schema.cross_platform.as_str()),
        ));
    }

    /// Reference citing the registry manifest the claims were read from
    fn provenance(&self, package: &str) -> Reference {
        Reference::new()
            .with(
                self.schema.stated_in.as_str(),
                Value::item(self.schema.registry_item.as_str()),
            )
            .with(
                self.schema.reference_url.as_str(),
                Value::Url(self.registry.manifest_url(package)),
            )
            .with(self.schema.retrieved.as_str(), Value::Time(Utc::now()))
    }
}
