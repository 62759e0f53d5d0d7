//! depcrawl Core Integration Tests
//!
//! Drives full crawls against an in-memory registry and graph store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use depcrawl_core::{
    Error, Result,
    config::{GraphSchema, Traversal},
    crawl::{CrawlOptions, CrawlScheduler, UPDATE_SUMMARY},
    graph::{Claim, EntityId, GraphStore, MemoryGraphStore, Rank, Value},
    registry::{Manifest, Registry},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Registry double that records every manifest and download-count request
#[derive(Default)]
struct FakeRegistry {
    manifests: HashMap<String, String>,
    downloads: HashMap<String, u64>,
    manifest_calls: Mutex<Vec<String>>,
    download_calls: Mutex<Vec<String>>,
    /// Fires the token while this package's manifest is being fetched
    cancel_on: Option<(String, CancellationToken)>,
}

impl FakeRegistry {
    fn with_package(mut self, name: &str, deps: &[&str]) -> Self {
        let deps: serde_json::Map<String, serde_json::Value> =
            deps.iter().map(|d| (d.to_string(), json!("^1.0.0"))).collect();
        let body = json!({
            "name": name,
            "dist-tags": {"latest": "1.0.0"},
            "versions": {
                "1.0.0": {
                    "dependencies": deps,
                    "dist": {"tarball": format!("https://registry.test/{name}/-/{name}-1.0.0.tgz")}
                }
            },
            "time": {"1.0.0": "2021-06-01T10:00:00.000Z"}
        });
        self.manifests.insert(name.to_string(), body.to_string());
        self
    }

    fn with_raw_manifest(mut self, name: &str, body: &str) -> Self {
        self.manifests.insert(name.to_string(), body.to_string());
        self
    }

    fn with_downloads(mut self, name: &str, downloads: u64) -> Self {
        self.downloads.insert(name.to_string(), downloads);
        self
    }

    fn cancelling_on(mut self, name: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((name.to_string(), token));
        self
    }

    fn manifest_calls(&self) -> Vec<String> {
        self.manifest_calls.lock().unwrap().clone()
    }

    fn download_calls(&self) -> Vec<String> {
        self.download_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    fn manifest_url(&self, package: &str) -> String {
        format!("https://registry.test/{package}")
    }

    async fn fetch_manifest(&self, package: &str) -> Result<Manifest> {
        self.manifest_calls.lock().unwrap().push(package.to_string());
        if let Some((name, token)) = &self.cancel_on
            && name == package
        {
            token.cancel();
        }
        let body = self
            .manifests
            .get(package)
            .ok_or_else(|| Error::PackageNotFound(package.to_string()))?;
        Manifest::from_json(package, body)
    }

    async fn fetch_weekly_downloads(&self, package: &str) -> Result<u64> {
        self.download_calls.lock().unwrap().push(package.to_string());
        self.downloads
            .get(package)
            .copied()
            .ok_or_else(|| Error::PackageNotFound(package.to_string()))
    }
}

async fn seed_store(known: &[&str]) -> Arc<MemoryGraphStore> {
    let store = Arc::new(MemoryGraphStore::new());
    for name in known {
        store
            .create_entity(
                name,
                vec![Claim::new("P8262", Value::String(name.to_string()))],
                "seed",
            )
            .await
            .unwrap();
    }
    store
}

async fn crawl(
    registry: Arc<FakeRegistry>,
    store: Arc<MemoryGraphStore>,
    options: CrawlOptions,
) -> (CrawlScheduler<FakeRegistry, MemoryGraphStore>, depcrawl_core::crawl::CrawlReport) {
    let mut scheduler = CrawlScheduler::init(registry, store, GraphSchema::production(), options)
        .await
        .unwrap();
    let report = scheduler.run(&CancellationToken::new()).await;
    (scheduler, report)
}

fn dependency_targets(store: &MemoryGraphStore, id: &EntityId) -> Vec<EntityId> {
    store
        .entity(id)
        .unwrap()
        .unwrap()
        .claims_for("P1547")
        .filter_map(|c| c.value.as_item().cloned())
        .collect()
}

#[tokio::test]
async fn test_cycle_is_processed_once_per_entity() {
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("a", &["b"])
            .with_package("b", &["a"])
            .with_downloads("b", 250_000),
    );
    let store = seed_store(&["a"]).await;

    let (scheduler, report) = crawl(registry.clone(), store.clone(), CrawlOptions::default()).await;

    assert_eq!(report.processed, 2);
    assert_eq!(report.created, 1);
    assert!(report.failed.is_empty());

    let mut fetched = registry.manifest_calls();
    fetched.sort();
    assert_eq!(fetched, vec!["a", "b"]);

    let a = scheduler.identity().get_id("a").cloned().unwrap();
    let b = scheduler.identity().get_id("b").cloned().unwrap();
    assert_eq!(dependency_targets(&store, &a), vec![b.clone()]);
    assert_eq!(dependency_targets(&store, &b), vec![a]);
}

#[tokio::test]
async fn test_threshold_gate_across_two_parents() {
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("p1", &["popular", "niche"])
            .with_package("p2", &["popular", "niche"])
            .with_package("popular", &[])
            .with_downloads("popular", 100_000)
            .with_downloads("niche", 99_999),
    );
    let store = seed_store(&["p1", "p2"]).await;

    let (scheduler, report) = crawl(registry.clone(), store.clone(), CrawlOptions::default()).await;

    assert_eq!(report.created, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.processed, 3);

    // niche is asked about once and then served from the no-add cache
    let downloads = registry.download_calls();
    assert_eq!(downloads.iter().filter(|p| *p == "niche").count(), 1);
    assert_eq!(downloads.iter().filter(|p| *p == "popular").count(), 1);

    assert!(!scheduler.identity().contains("niche"));
    let popular = scheduler.identity().get_id("popular").cloned().unwrap();
    for parent in ["p1", "p2"] {
        let id = scheduler.identity().get_id(parent).cloned().unwrap();
        assert_eq!(dependency_targets(&store, &id), vec![popular.clone()]);
    }
    assert_eq!(store.len().unwrap(), 3);
}

#[tokio::test]
async fn test_failed_item_does_not_stop_the_crawl() {
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("good", &[])
            .with_raw_manifest("broken", r#"{"versions": {}}"#),
    );
    let store = seed_store(&["broken", "gone", "good"]).await;

    let (_, report) = crawl(registry, store.clone(), CrawlOptions::default()).await;

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed.len(), 2);

    let mut codes: Vec<&str> = report.failed.iter().map(|f| f.code).collect();
    codes.sort();
    // package not found, malformed manifest
    assert_eq!(codes, vec!["E102", "E103"]);
    assert!(
        report
            .failed
            .iter()
            .any(|f| f.package.as_deref() == Some("gone"))
    );

    // failed entities keep their prior state
    let snapshot = store.snapshot().unwrap();
    let untouched = snapshot
        .entities
        .values()
        .filter(|e| e.last_summary.as_deref() == Some("seed"))
        .count();
    assert_eq!(untouched, 2);
}

#[tokio::test]
async fn test_traversal_order() {
    // root discovers x, then y; both are created and pushed to the front
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("root", &["x", "y"])
            .with_package("tail", &[])
            .with_package("x", &[])
            .with_package("y", &[])
            .with_downloads("x", 1_000_000)
            .with_downloads("y", 1_000_000),
    );

    let store = seed_store(&["root", "tail"]).await;
    crawl(registry.clone(), store, CrawlOptions::default()).await;
    assert_eq!(registry.manifest_calls(), vec!["root", "y", "x", "tail"]);

    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("root", &["x", "y"])
            .with_package("tail", &[])
            .with_package("x", &[])
            .with_package("y", &[])
            .with_downloads("x", 1_000_000)
            .with_downloads("y", 1_000_000),
    );
    let store = seed_store(&["root", "tail"]).await;
    let options = CrawlOptions {
        traversal: Traversal::DepthFirst,
        ..CrawlOptions::default()
    };
    crawl(registry.clone(), store, options).await;
    assert_eq!(registry.manifest_calls(), vec!["tail", "root", "x", "y"]);
}

#[tokio::test]
async fn test_recrawl_is_stable() {
    let registry = Arc::new(FakeRegistry::default().with_package("solo", &[]));
    let store = seed_store(&["solo"]).await;

    crawl(registry.clone(), store.clone(), CrawlOptions::default()).await;
    let first = store.snapshot().unwrap();
    crawl(registry, store.clone(), CrawlOptions::default()).await;
    let second = store.snapshot().unwrap();

    let (id, entity) = second.entities.iter().next().unwrap();
    assert_eq!(entity.revision, 3);
    assert_eq!(entity.last_summary.as_deref(), Some(UPDATE_SUMMARY));

    let before = &first.entities[id];
    assert_eq!(before.claims.len(), entity.claims.len());
    let versions: Vec<&Claim> = entity.claims_for("P348").collect();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].rank, Rank::Preferred);
    assert_eq!(versions[0].references.len(), 1);
}

#[tokio::test]
async fn test_dry_run_counts_shared_dependency_once() {
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("p1", &["popular"])
            .with_package("p2", &["popular"])
            .with_downloads("popular", 500_000),
    );
    let store = seed_store(&["p1", "p2"]).await;
    let options = CrawlOptions {
        dry_run: true,
        ..CrawlOptions::default()
    };

    let (scheduler, report) = crawl(registry.clone(), store.clone(), options).await;

    assert_eq!(report.processed, 2);
    assert_eq!(report.created, 1);
    assert_eq!(registry.download_calls(), vec!["popular"]);
    assert!(!scheduler.identity().contains("popular"));
    assert_eq!(store.len().unwrap(), 2);
}

#[tokio::test]
async fn test_cancel_mid_run_finishes_current_item() {
    let cancel = CancellationToken::new();
    let registry = Arc::new(
        FakeRegistry::default()
            .with_package("a", &[])
            .with_package("b", &[])
            .with_package("c", &[])
            .cancelling_on("b", cancel.clone()),
    );
    let store = seed_store(&["a", "b", "c"]).await;

    let mut scheduler = CrawlScheduler::init(
        registry.clone(),
        store.clone(),
        GraphSchema::production(),
        CrawlOptions::default(),
    )
    .await
    .unwrap();
    let report = scheduler.run(&cancel).await;

    assert!(report.cancelled);
    assert!(!report.truncated);
    assert_eq!(report.processed, 2);
    assert_eq!(registry.manifest_calls(), vec!["a", "b"]);
    assert_eq!(scheduler.queue_len(), 0);

    // b's write landed even though the token fired during it; c was never touched
    let snapshot = store.snapshot().unwrap();
    let expected = [
        ("a", 2, UPDATE_SUMMARY),
        ("b", 2, UPDATE_SUMMARY),
        ("c", 1, "seed"),
    ];
    for (name, revision, summary) in expected {
        let id = scheduler.identity().get_id(name).cloned().unwrap();
        let entity = &snapshot.entities[&id];
        assert_eq!(entity.revision, revision, "{name}");
        assert_eq!(entity.last_summary.as_deref(), Some(summary), "{name}");
    }
}
