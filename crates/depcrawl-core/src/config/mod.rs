//! Configuration management with file persistence

mod schema;

pub use schema::{GraphSchema, GraphTarget};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Weekly downloads a dependency needs before it earns its own entity
pub const DEFAULT_POPULARITY_THRESHOLD: u64 = 100_000;

/// Maximum number of version-identifier claims kept per entity
pub const DEFAULT_RETENTION_CAP: usize = 300;

/// depcrawl configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub crawl: CrawlConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub registry_url: String,
    pub downloads_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub popularity_threshold: u64,
    pub retention_cap: usize,
    pub traversal: Traversal,
    pub extract_repository_url: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub target: GraphTarget,
    pub sparql_endpoint: String,
    /// Replaces the preset selected by `target` when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<GraphSchema>,
}

/// Order in which queued entities are taken off the work queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Traversal {
    /// Pop from the front of the queue
    #[default]
    BreadthFirst,
    /// Pop from the back of the queue
    DepthFirst,
}

impl Traversal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth-first",
            Self::DepthFirst => "depth-first",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "breadth-first" | "bfs" | "fifo" => Some(Self::BreadthFirst),
            "depth-first" | "dfs" | "lifo" => Some(Self::DepthFirst),
            _ => None,
        }
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://registry.npmjs.org".to_string(),
            downloads_url: "https://api.npmjs.org".to_string(),
            user_agent: concat!("depcrawl/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            popularity_threshold: DEFAULT_POPULARITY_THRESHOLD,
            retention_cap: DEFAULT_RETENTION_CAP,
            traversal: Traversal::BreadthFirst,
            extract_repository_url: false,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            target: GraphTarget::Production,
            sparql_endpoint: "https://query.wikidata.org/sparql".to_string(),
            schema: None,
        }
    }
}

impl GraphConfig {
    /// Property and item identifiers for the configured target
    pub fn schema(&self) -> GraphSchema {
        self.schema
            .clone()
            .unwrap_or_else(|| GraphSchema::for_target(self.target))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("DEPCRAWL_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("depcrawl")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.registry.registry_url.trim().is_empty() {
            return Err(anyhow!("registry.registry_url must not be empty"));
        }
        if self.registry.downloads_url.trim().is_empty() {
            return Err(anyhow!("registry.downloads_url must not be empty"));
        }
        if self.registry.timeout_secs == 0 {
            return Err(anyhow!("registry.timeout_secs must be greater than zero"));
        }
        if self.crawl.retention_cap == 0 {
            return Err(anyhow!("crawl.retention_cap must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "registry.registry_url" => Ok(self.registry.registry_url.clone()),
            "registry.downloads_url" => Ok(self.registry.downloads_url.clone()),
            "registry.user_agent" => Ok(self.registry.user_agent.clone()),
            "registry.timeout_secs" => Ok(self.registry.timeout_secs.to_string()),
            "registry.max_retries" => Ok(self.registry.max_retries.to_string()),

            "crawl.popularity_threshold" => Ok(self.crawl.popularity_threshold.to_string()),
            "crawl.retention_cap" => Ok(self.crawl.retention_cap.to_string()),
            "crawl.traversal" => Ok(self.crawl.traversal.to_string()),
            "crawl.extract_repository_url" => Ok(self.crawl.extract_repository_url.to_string()),

            "graph.target" => Ok(self.graph.target.to_string()),
            "graph.sparql_endpoint" => Ok(self.graph.sparql_endpoint.clone()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `depcrawl config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "registry.registry_url" => {
                self.registry.registry_url = value.trim_end_matches('/').to_string();
            }
            "registry.downloads_url" => {
                self.registry.downloads_url = value.trim_end_matches('/').to_string();
            }
            "registry.user_agent" => {
                self.registry.user_agent = value.to_string();
            }
            "registry.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.registry.timeout_secs = secs;
            }
            "registry.max_retries" => {
                self.registry.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }

            "crawl.popularity_threshold" => {
                self.crawl.popularity_threshold = value
                    .parse()
                    .with_context(|| format!("Invalid popularity_threshold value: {}", value))?;
            }
            "crawl.retention_cap" => {
                let cap: usize = value
                    .parse()
                    .with_context(|| format!("Invalid retention_cap value: {}", value))?;
                if cap == 0 {
                    return Err(anyhow!("Retention cap must be greater than zero"));
                }
                self.crawl.retention_cap = cap;
            }
            "crawl.traversal" => {
                self.crawl.traversal = Traversal::parse(value).ok_or_else(|| {
                    anyhow!(
                        "Invalid traversal: {}. Valid options: breadth-first, depth-first",
                        value
                    )
                })?;
            }
            "crawl.extract_repository_url" => {
                self.crawl.extract_repository_url = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }

            "graph.target" => {
                self.graph.target = GraphTarget::parse(value).ok_or_else(|| {
                    anyhow!("Invalid graph target: {}. Valid options: production, sandbox", value)
                })?;
            }
            "graph.sparql_endpoint" => {
                self.graph.sparql_endpoint = value.to_string();
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `depcrawl config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "registry.registry_url",
            "registry.downloads_url",
            "registry.user_agent",
            "registry.timeout_secs",
            "registry.max_retries",
            "crawl.popularity_threshold",
            "crawl.retention_cap",
            "crawl.traversal",
            "crawl.extract_repository_url",
            "graph.target",
            "graph.sparql_endpoint",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
