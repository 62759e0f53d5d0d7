//! CLI integration tests for depcrawl
//!
//! Tests the depcrawl CLI commands end-to-end using assert_cmd. Nothing here
//! reaches an outside host: crawls stop before fetching any manifest.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a command with an isolated config directory
#[allow(deprecated)]
fn depcrawl_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("depcrawl").unwrap();
    cmd.env("DEPCRAWL_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

const SNAPSHOT: &str = r#"{
  "next_id": 3,
  "entities": {
    "Q1": {
      "label": "react",
      "claims": [
        {"property": "P8262", "value": {"type": "string", "value": "react"}},
        {"property": "P1547", "value": {"type": "item", "value": "Q2"}},
        {"property": "P348", "value": {"type": "string", "value": "18.2.0"}, "rank": "preferred"}
      ],
      "revision": 2,
      "last_summary": "Adding dependency information."
    },
    "Q2": {
      "label": "loose-envify",
      "claims": [
        {"property": "P8262", "value": {"type": "string", "value": "loose-envify"}}
      ],
      "revision": 1,
      "last_summary": "Creating item for missing npm package."
    }
  }
}"#;

#[test]
fn test_help_lists_subcommands() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crawl"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_list_shows_defaults() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("crawl.popularity_threshold = 100000"))
        .stdout(predicate::str::contains("crawl.retention_cap = 300"))
        .stdout(predicate::str::contains("crawl.traversal = breadth-first"))
        .stdout(predicate::str::contains(
            "registry.registry_url = https://registry.npmjs.org",
        ));
}

#[test]
fn test_config_set_then_get() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["config", "set", "crawl.popularity_threshold", "5000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set crawl.popularity_threshold = 5000"));

    assert!(config_dir.path().join("config.toml").exists());

    depcrawl_cmd(&config_dir)
        .args(["config", "get", "crawl.popularity_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5000\n"));
}

#[test]
fn test_config_rejects_bad_values() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["config", "set", "crawl.traversal", "sideways"])
        .assert()
        .failure();

    depcrawl_cmd(&config_dir)
        .args(["config", "get", "crawl.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_reset_restores_defaults() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["config", "set", "graph.target", "sandbox"])
        .assert()
        .success();
    depcrawl_cmd(&config_dir)
        .args(["config", "reset"])
        .assert()
        .success();
    depcrawl_cmd(&config_dir)
        .args(["config", "get", "graph.target"])
        .assert()
        .success()
        .stdout(predicate::str::contains("production"));
}

#[test]
fn test_config_path_uses_override_dir() {
    let config_dir = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            config_dir.path().to_string_lossy().to_string(),
        ));
}

#[test]
fn test_inspect_by_package_name() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");
    std::fs::write(&snapshot, SNAPSHOT).unwrap();

    depcrawl_cmd(&config_dir)
        .args(["inspect", "react", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("react (Q1)"))
        .stdout(predicate::str::contains("P1547: Q2 (loose-envify)"))
        .stdout(predicate::str::contains("P348: 18.2.0 [preferred]"));
}

#[test]
fn test_inspect_json_by_entity_id() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");
    std::fs::write(&snapshot, SNAPSHOT).unwrap();

    let output = depcrawl_cmd(&config_dir)
        .args(["--format", "json", "inspect", "Q2", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();

    assert!(output.status.success());
    let entity: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entity["label"], "loose-envify");
    assert_eq!(entity["revision"], 1);
}

#[test]
fn test_inspect_unknown_package_fails() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");
    std::fs::write(&snapshot, SNAPSHOT).unwrap();

    depcrawl_cmd(&config_dir)
        .args(["inspect", "left-pad", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No entity for 'left-pad'"));
}

#[test]
fn test_inspect_missing_snapshot_fails() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["inspect", "react", "--snapshot"])
        .arg(work.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snapshot not found"));
}

#[test]
fn test_crawl_empty_graph_writes_snapshot() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");

    depcrawl_cmd(&config_dir)
        .args(["crawl", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed:  0"))
        .stdout(predicate::str::contains("Failed:     0"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert!(written["entities"].as_object().unwrap().is_empty());
}

#[test]
fn test_crawl_json_report() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");

    let output = depcrawl_cmd(&config_dir)
        .args(["--format", "json", "crawl", "--dry-run", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["processed"], 0);
    assert_eq!(report["cancelled"], false);
    // dry runs leave the snapshot untouched
    assert!(!snapshot.exists());
}

#[test]
fn test_crawl_rejects_zero_retention_cap() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    depcrawl_cmd(&config_dir)
        .args(["crawl", "--retention-cap", "0", "--snapshot"])
        .arg(work.path().join("graph.json"))
        .assert()
        .failure();
}

#[test]
fn test_import_network_failure_prints_hint() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let output = work.path().join("graph.json");

    // nothing listens on port 1, so the connection is refused
    depcrawl_cmd(&config_dir)
        .args(["import", "--endpoint", "http://127.0.0.1:1/sparql", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Identity query against"))
        .stderr(predicate::str::contains("Hint: Check internet connection"));

    assert!(!output.exists());
}

#[test]
fn test_crawl_max_items_reports_truncation() {
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let snapshot = work.path().join("graph.json");
    std::fs::write(&snapshot, SNAPSHOT).unwrap();

    // the limit is checked before any manifest is fetched
    let output = depcrawl_cmd(&config_dir)
        .args(["--format", "json", "crawl", "--max-items", "0", "--dry-run", "--snapshot"])
        .arg(&snapshot)
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["processed"], 0);
    assert_eq!(report["truncated"], true);
}
