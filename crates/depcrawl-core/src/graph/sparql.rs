//! Bulk identity import from a SPARQL endpoint

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::entity::{EntityId, PackageRef};

/// Read-only client for a Wikibase query service
#[derive(Debug, Clone)]
pub struct SparqlClient {
    http_client: HttpClient,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    item: Term,
    #[serde(rename = "packageName")]
    package_name: Term,
}

#[derive(Debug, Deserialize)]
struct Term {
    value: String,
}

impl SparqlClient {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    /// Query every entity carrying `property` together with its value
    pub async fn registry_names(&self, property: &str) -> Result<Vec<(EntityId, PackageRef)>> {
        let query = registry_name_query(property);
        debug!(endpoint = %self.endpoint, "Running identity query");

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("query", query.as_str())])
            .header("Accept", "application/sparql-results+json;charset=utf-8")
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::IdentityLoad(format!(
                "query service returned HTTP {}: {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(Error::NetworkError)?;
        let pairs = parse_bindings(&body)?;
        info!(entities = pairs.len(), "Loaded registry names from query service");
        Ok(pairs)
    }
}

pub fn registry_name_query(property: &str) -> String {
    format!(
        "SELECT ?item ?packageName WHERE {{ ?item wdt:{} ?packageName. }}",
        property
    )
}

/// Parse a SPARQL JSON result set into `(entity, package)` pairs
pub fn parse_bindings(body: &str) -> Result<Vec<(EntityId, PackageRef)>> {
    let response: SparqlResponse = serde_json::from_str(body)
        .map_err(|e| Error::IdentityLoad(format!("unreadable query result: {}", e)))?;

    response
        .results
        .bindings
        .into_iter()
        .map(|b| {
            let id = EntityId::from_uri(&b.item.value).ok_or_else(|| {
                Error::IdentityLoad(format!("unexpected item URI '{}'", b.item.value))
            })?;
            Ok((id, b.package_name.value))
        })
        .collect()
}
