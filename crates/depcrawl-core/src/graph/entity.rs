//! Identifiers shared between the registry and the graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry package name, e.g. `react` or `@babel/core`
pub type PackageRef = String;

/// Opaque identifier of an entity in the graph store, e.g. `Q28925578`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the id from a concept URI such as
    /// `http://www.wikidata.org/entity/Q42`
    pub fn from_uri(uri: &str) -> Option<Self> {
        let id = uri.trim_end_matches('/').rsplit('/').next()?;
        if id.is_empty() {
            None
        } else {
            Some(Self::new(id))
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
