//! Registry manifest types
//!
//! Only the fields that drive traversal and reconciliation are typed. Each
//! entry of `versions` is kept as raw JSON and read leniently through
//! [`VersionManifest`], so one malformed version never fails a whole manifest.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Keys of the `time` map that are not versions
const RESERVED_TIME_KEYS: [&str; 2] = ["created", "modified"];

/// A package manifest as served by `GET /{package}`
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags")]
    pub dist_tags: DistTags,
    pub versions: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub time: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub repository: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistTags {
    pub latest: String,
}

/// Lenient view of one entry of `versions`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionManifest {
    pub dependencies: Vec<String>,
    pub peer_dependencies: Vec<String>,
    pub dist: Option<Dist>,
    pub repository: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dist {
    pub tarball: String,
    #[serde(rename = "unpackedSize", default)]
    pub unpacked_size: Option<u64>,
}

/// Response of `GET /downloads/point/last-week/{package}`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadCount {
    pub downloads: u64,
    #[serde(default)]
    pub package: Option<String>,
}

impl Manifest {
    /// Parse a manifest body, naming the package in any error
    pub fn from_json(package: &str, body: &str) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(body).map_err(|e| Error::malformed(package, e.to_string()))?;
        if manifest.name.is_empty() {
            manifest.name = package.to_string();
        }
        Ok(manifest)
    }

    pub fn latest(&self) -> &str {
        &self.dist_tags.latest
    }

    /// Lenient view of one version, `None` if the registry does not list it
    pub fn version(&self, version: &str) -> Option<VersionManifest> {
        self.versions.get(version).map(VersionManifest::from_json)
    }

    /// The version tagged `latest`
    pub fn latest_version(&self) -> Result<VersionManifest> {
        self.version(self.latest()).ok_or_else(|| {
            Error::malformed(
                &self.name,
                format!("dist-tags.latest '{}' is not in versions", self.latest()),
            )
        })
    }

    /// Version to timestamp pairs, without `created`/`modified` and
    /// without entries whose value is not a string
    pub fn publication_times(&self) -> BTreeMap<&str, &str> {
        self.time
            .iter()
            .filter(|(k, _)| !RESERVED_TIME_KEYS.contains(&k.as_str()))
            .filter_map(|(k, v)| v.as_str().map(|t| (k.as_str(), t)))
            .collect()
    }
}

impl VersionManifest {
    pub fn from_json(raw: &JsonValue) -> Self {
        Self {
            dependencies: object_keys(raw.get("dependencies")),
            peer_dependencies: object_keys(raw.get("peerDependencies")),
            dist: raw
                .get("dist")
                .and_then(|d| serde_json::from_value(d.clone()).ok()),
            repository: raw.get("repository").cloned(),
        }
    }
}

fn object_keys(value: Option<&JsonValue>) -> Vec<String> {
    value
        .and_then(JsonValue::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "left-pad",
        "dist-tags": {"latest": "1.3.0"},
        "versions": {
            "1.3.0": {
                "dependencies": {"a": "^1.0.0"},
                "peerDependencies": {"b": "*"},
                "dist": {"tarball": "https://r/left-pad-1.3.0.tgz", "unpackedSize": 1234}
            },
            "1.2.0": {"dependencies": ["not", "a", "map"], "dist": {"shasum": "x"}}
        },
        "time": {
            "created": "2014-03-14T00:00:00.000Z",
            "modified": "2024-03-14T00:00:00.000Z",
            "1.3.0": "2018-04-09T00:00:00.000Z",
            "1.2.0": "2017-01-01T00:00:00.000Z",
            "unpublished": {"time": "2019-01-01"}
        }
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json("left-pad", MANIFEST).unwrap();
        assert_eq!(manifest.latest(), "1.3.0");
        assert_eq!(manifest.versions.len(), 2);

        let latest = manifest.latest_version().unwrap();
        assert_eq!(latest.dependencies, vec!["a"]);
        assert_eq!(latest.peer_dependencies, vec!["b"]);
        assert_eq!(latest.dist.unwrap().unpacked_size, Some(1234));
    }

    #[test]
    fn test_malformed_version_is_read_leniently() {
        let manifest = Manifest::from_json("left-pad", MANIFEST).unwrap();
        let old = manifest.version("1.2.0").unwrap();

        assert!(old.dependencies.is_empty());
        assert!(old.dist.is_none());
        assert!(manifest.version("0.0.1").is_none());
    }

    #[test]
    fn test_publication_times_drop_reserved_keys() {
        let manifest = Manifest::from_json("left-pad", MANIFEST).unwrap();
        let times = manifest.publication_times();

        assert_eq!(times.len(), 2);
        assert!(!times.contains_key("created"));
        assert!(!times.contains_key("modified"));
        assert!(!times.contains_key("unpublished"));
    }

    #[test]
    fn test_missing_required_fields_fail() {
        let err = Manifest::from_json("x", r#"{"versions": {}}"#).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed { .. }));

        let err = Manifest::from_json("x", r#"{"dist-tags": {"latest": "1.0.0"}}"#).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed { .. }));
    }

    #[test]
    fn test_latest_missing_from_versions() {
        let manifest = Manifest::from_json(
            "ghost",
            r#"{"dist-tags": {"latest": "2.0.0"}, "versions": {"1.0.0": {}}}"#,
        )
        .unwrap();
        assert!(manifest.latest_version().is_err());
    }
}
