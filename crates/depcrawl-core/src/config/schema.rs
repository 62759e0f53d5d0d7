//! Property and item identifiers used when writing to the graph
//!
//! A schema is chosen once at startup from the configured [`GraphTarget`]
//! (or read verbatim from the config file) and passed by reference to every
//! component that builds claims.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which graph instance the crawler writes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphTarget {
    /// www.wikidata.org
    #[default]
    Production,
    /// test.wikidata.org
    Sandbox,
}

impl GraphTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" | "wikidata" => Some(Self::Production),
            "sandbox" | "test" => Some(Self::Sandbox),
            _ => None,
        }
    }
}

impl fmt::Display for GraphTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of every property and item the crawler writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    // Crawl properties
    pub registry_name: String,
    pub dependency: String,
    pub instance_of: String,
    pub programmed_in: String,
    pub operating_system: String,

    // Provenance
    pub stated_in: String,
    pub reference_url: String,
    pub retrieved: String,

    // Version properties
    pub software_version: String,
    pub publication_date: String,
    pub version_type: String,
    pub distributed_by: String,
    pub described_at_url: String,
    pub download_url: String,
    pub data_size: String,
    pub source_code_repository: String,

    // Items
    pub registry_item: String,
    pub js_package: String,
    pub javascript: String,
    pub cross_platform: String,
    pub byte: String,
    pub stable_version: String,
    pub alpha_version: String,
    pub beta_version: String,
    pub release_candidate: String,
    pub pre_release: String,
    pub unstable_version: String,
}

impl GraphSchema {
    pub fn for_target(target: GraphTarget) -> Self {
        match target {
            GraphTarget::Production => Self::production(),
            GraphTarget::Sandbox => Self::sandbox(),
        }
    }

    /// Identifiers on www.wikidata.org
    pub fn production() -> Self {
        Self {
            registry_name: "P8262".to_string(),
            dependency: "P1547".to_string(),
            instance_of: "P31".to_string(),
            programmed_in: "P277".to_string(),
            operating_system: "P306".to_string(),

            stated_in: "P248".to_string(),
            reference_url: "P854".to_string(),
            retrieved: "P813".to_string(),

            software_version: "P348".to_string(),
            publication_date: "P577".to_string(),
            version_type: "P548".to_string(),
            distributed_by: "P750".to_string(),
            described_at_url: "P973".to_string(),
            download_url: "P4945".to_string(),
            data_size: "P3575".to_string(),
            source_code_repository: "P1324".to_string(),

            registry_item: "Q116058944".to_string(),
            js_package: "Q783866".to_string(),
            javascript: "Q2005".to_string(),
            cross_platform: "Q174666".to_string(),
            byte: "Q8799".to_string(),
            stable_version: "Q2804309".to_string(),
            alpha_version: "Q2122918".to_string(),
            beta_version: "Q3295609".to_string(),
            release_candidate: "Q1072356".to_string(),
            pre_release: "Q51930650".to_string(),
            unstable_version: "Q21727724".to_string(),
        }
    }

    /// Identifiers on test.wikidata.org
    ///
    /// Only the crawl and provenance properties exist on the test instance.
    /// Version properties keep their production ids and need a `[graph.schema]`
    /// override before version claims can be written there.
    pub fn sandbox() -> Self {
        Self {
            registry_name: "P97255".to_string(),
            dependency: "P97258".to_string(),
            instance_of: "P97259".to_string(),
            programmed_in: "P97260".to_string(),
            operating_system: "P97261".to_string(),

            stated_in: "P97256".to_string(),
            reference_url: "P97262".to_string(),
            retrieved: "P97263".to_string(),

            registry_item: "Q227502".to_string(),
            js_package: "Q227503".to_string(),
            javascript: "Q227504".to_string(),
            cross_platform: "Q227506".to_string(),
            ..Self::production()
        }
    }
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self::production()
    }
}
