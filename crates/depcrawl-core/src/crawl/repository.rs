//! Source repository extraction

use serde_json::Value as JsonValue;

use crate::config::GraphSchema;
use crate::graph::{Claim, Value};
use crate::registry::Manifest;

/// Normalize a `repository` URL as npm records it into a browsable https URL
///
/// Returns `None` for shorthands (`github:user/repo`, `user/repo`) and
/// anything else that does not look like a URL.
pub fn normalize_repository_url(raw: &str) -> Option<String> {
    let mut url = raw.trim();
    url = url.strip_prefix("git+").unwrap_or(url);

    let mut url = if let Some(rest) = url.strip_prefix("git://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ssh://git@") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("git@") {
        // scp-like syntax: git@github.com:user/repo.git
        format!("https://{}", rest.replacen(':', "/", 1))
    } else if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        return None;
    };

    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }
    let url = url.trim_end_matches('/').to_string();

    if url.len() <= "https://".len() {
        return None;
    }
    Some(url)
}

/// Raw URL of the `repository` field, which is either a string or `{url}`
fn repository_field_url(field: &JsonValue) -> Option<&str> {
    match field {
        JsonValue::String(s) => Some(s),
        JsonValue::Object(map) => map.get("url").and_then(JsonValue::as_str),
        _ => None,
    }
}

/// Repository of the latest version, falling back to the package-level field
pub fn repository_url(manifest: &Manifest) -> Option<String> {
    let latest = manifest.version(manifest.latest());
    latest
        .as_ref()
        .and_then(|v| v.repository.as_ref())
        .or(manifest.repository.as_ref())
        .and_then(repository_field_url)
        .and_then(normalize_repository_url)
}

/// Source-code-repository claim for a manifest, if it names a usable URL
pub fn repository_claim(schema: &GraphSchema, manifest: &Manifest) -> Option<Claim> {
    repository_url(manifest)
        .map(|url| Claim::new(schema.source_code_repository.as_str(), Value::Url(url)))
}
