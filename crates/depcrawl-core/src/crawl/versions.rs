//! Version history reconciliation
//!
//! Turns a manifest's `time`/`versions` maps into version-identifier claims
//! and merges them with the claims the entity already carries:
//!
//! 1. Build one [`VersionRecord`] per published version that still has a
//!    `dist` block.
//! 2. Merge with existing claims; fresh data wins for the same version.
//! 3. [`retain_bounded`]: keep at most `cap` claims, preferring stable and
//!    recent releases, never dropping the `latest` tag.
//! 4. [`assign_preferred_rank`]: exactly one claim is preferred.
//! 5. [`sort_by_publication`]: oldest first.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GraphSchema;
use crate::graph::{Claim, EntityId, Rank, Value};
use crate::registry::Manifest;

/// Human-readable package page on npmjs.com
const PACKAGE_PAGE_URL: &str = "https://www.npmjs.com/package";

/// Release maturity derived from a version string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maturity {
    Stable,
    Alpha,
    Beta,
    ReleaseCandidate,
    PreRelease,
    Unstable,
}

impl Maturity {
    /// Classify by substring, first match wins
    pub fn classify(version: &str) -> Self {
        let v = version.to_lowercase();
        if v.contains("alpha") {
            Self::Alpha
        } else if v.contains("beta") || v.contains("next") {
            Self::Beta
        } else if v.contains("rc") {
            Self::ReleaseCandidate
        } else if v.contains("pre") {
            Self::PreRelease
        } else if ["dev", "test", "snapshot", "nightly", "canary"]
            .iter()
            .any(|marker| v.contains(marker))
        {
            Self::Unstable
        } else {
            Self::Stable
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }

    /// Graph item describing this maturity
    pub fn item<'a>(&self, schema: &'a GraphSchema) -> &'a str {
        match self {
            Self::Stable => &schema.stable_version,
            Self::Alpha => &schema.alpha_version,
            Self::Beta => &schema.beta_version,
            Self::ReleaseCandidate => &schema.release_candidate,
            Self::PreRelease => &schema.pre_release,
            Self::Unstable => &schema.unstable_version,
        }
    }

    pub fn from_item(schema: &GraphSchema, item: &EntityId) -> Option<Self> {
        [
            Self::Stable,
            Self::Alpha,
            Self::Beta,
            Self::ReleaseCandidate,
            Self::PreRelease,
            Self::Unstable,
        ]
        .into_iter()
        .find(|m| m.item(schema) == item.as_str())
    }
}

/// Parse a registry timestamp
///
/// Tries fractional-second UTC, whole-second UTC, then a permissive set of
/// formats. Older packages carry timestamps with inconsistent precision.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// One published version, as read from the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: String,
    pub published: DateTime<Utc>,
    pub maturity: Maturity,
    /// Human-readable page for this version
    pub described_at: String,
    pub tarball: String,
    pub unpacked_size: Option<u64>,
}

impl VersionRecord {
    pub fn to_claim(&self, schema: &GraphSchema) -> Claim {
        let mut claim = Claim::new(
            schema.software_version.as_str(),
            Value::String(self.version.clone()),
        )
        .with_qualifier(schema.publication_date.as_str(), Value::Time(self.published))
        .with_qualifier(
            schema.version_type.as_str(),
            Value::item(self.maturity.item(schema)),
        )
        .with_qualifier(
            schema.distributed_by.as_str(),
            Value::item(schema.registry_item.as_str()),
        )
        .with_qualifier(
            schema.described_at_url.as_str(),
            Value::Url(self.described_at.clone()),
        )
        .with_qualifier(schema.download_url.as_str(), Value::Url(self.tarball.clone()));

        if let Some(size) = self.unpacked_size {
            claim = claim.with_qualifier(
                schema.data_size.as_str(),
                Value::Quantity {
                    amount: size,
                    unit: Some(EntityId::new(schema.byte.as_str())),
                },
            );
        }
        claim
    }
}

/// Build records for every version with a timestamp, a `versions` entry and a
/// `dist` block
pub fn version_records(package: &str, manifest: &Manifest) -> Vec<VersionRecord> {
    let mut records = Vec::new();

    for (version, raw_time) in manifest.publication_times() {
        let Some(published) = parse_timestamp(raw_time) else {
            debug!(package, version, raw_time, "Skipping version with unreadable timestamp");
            continue;
        };
        let Some(entry) = manifest.version(version) else {
            debug!(package, version, "Skipping unpublished version");
            continue;
        };
        let Some(dist) = entry.dist else {
            debug!(package, version, "Skipping version without dist");
            continue;
        };

        records.push(VersionRecord {
            version: version.to_string(),
            published,
            maturity: Maturity::classify(version),
            described_at: format!("{}/{}/v/{}", PACKAGE_PAGE_URL, package, version),
            tarball: dist.tarball,
            unpacked_size: dist.unpacked_size,
        });
    }
    records
}

/// A version-identifier claim with its ordering key extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionClaim {
    pub version: String,
    pub published: Option<DateTime<Utc>>,
    pub maturity: Maturity,
    pub claim: Claim,
}

impl VersionClaim {
    pub fn from_record(record: &VersionRecord, schema: &GraphSchema) -> Self {
        Self {
            version: record.version.clone(),
            published: Some(record.published),
            maturity: record.maturity,
            claim: record.to_claim(schema),
        }
    }

    /// Read an existing claim; `None` unless its value is a string
    pub fn from_existing(claim: Claim, schema: &GraphSchema) -> Option<Self> {
        let version = match &claim.value {
            Value::String(v) => v.clone(),
            _ => return None,
        };
        let published = claim
            .qualifier(&schema.publication_date)
            .and_then(Value::as_time);
        let maturity = claim
            .qualifier(&schema.version_type)
            .and_then(Value::as_item)
            .and_then(|item| Maturity::from_item(schema, item))
            .unwrap_or_else(|| Maturity::classify(&version));

        Some(Self {
            version,
            published,
            maturity,
            claim,
        })
    }

    /// Preference key: stable before non-stable, then newer before older
    pub fn preference_key(&self) -> (bool, Option<DateTime<Utc>>) {
        (self.maturity.is_stable(), self.published)
    }
}

/// Descending preference, ties broken by version string for a stable order
fn by_preference(a: &VersionClaim, b: &VersionClaim) -> Ordering {
    b.preference_key()
        .cmp(&a.preference_key())
        .then_with(|| b.version.cmp(&a.version))
}

/// Keep at most `cap` claims, most preferred first, and never drop `latest`
///
/// When `latest` falls outside the cap it takes the place of the least
/// preferred retained claim, so the result still has exactly `cap` entries.
pub fn retain_bounded(mut claims: Vec<VersionClaim>, cap: usize, latest: &str) -> Vec<VersionClaim> {
    if claims.len() <= cap {
        return claims;
    }

    claims.sort_by(by_preference);

    let latest_position = claims.iter().position(|c| c.version == latest);
    let cut_latest = match latest_position {
        Some(pos) if pos >= cap => Some(claims.swap_remove(pos)),
        _ => None,
    };

    claims.truncate(cap);
    if let Some(latest_claim) = cut_latest
        && cap > 0
    {
        claims.pop();
        claims.push(latest_claim);
    }
    claims
}

/// Mark the most preferred claim `Preferred` and every other one `Normal`
pub fn assign_preferred_rank(claims: &mut [VersionClaim]) {
    let preferred = claims
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| by_preference(a, b))
        .map(|(i, _)| i);

    for (i, claim) in claims.iter_mut().enumerate() {
        claim.claim.rank = if Some(i) == preferred {
            Rank::Preferred
        } else {
            Rank::Normal
        };
    }
}

/// Ascending publication time; claims without one come first
pub fn sort_by_publication(claims: &mut [VersionClaim]) {
    claims.sort_by(|a, b| {
        a.published
            .cmp(&b.published)
            .then_with(|| a.version.cmp(&b.version))
    });
}

/// Result of reconciling one entity's versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionReconciliation {
    /// Property whose claims `claims` replace
    pub property: String,
    pub claims: Vec<Claim>,
    /// The version carrying preferred rank, if any
    pub preferred: Option<String>,
    /// Claims removed by the retention cap
    pub dropped: usize,
}

/// Merges fresh version metadata into an entity's version claims
#[derive(Debug, Clone)]
pub struct VersionReconciler<'a> {
    schema: &'a GraphSchema,
    retention_cap: usize,
}

impl<'a> VersionReconciler<'a> {
    pub fn new(schema: &'a GraphSchema, retention_cap: usize) -> Self {
        Self {
            schema,
            retention_cap,
        }
    }

    pub fn reconcile(
        &self,
        package: &str,
        manifest: &Manifest,
        existing: Vec<Claim>,
    ) -> VersionReconciliation {
        let mut merged: BTreeMap<String, VersionClaim> = existing
            .into_iter()
            .filter(|c| c.property == self.schema.software_version)
            .filter_map(|c| VersionClaim::from_existing(c, self.schema))
            .map(|c| (c.version.clone(), c))
            .collect();

        for record in version_records(package, manifest) {
            let mut fresh = VersionClaim::from_record(&record, self.schema);
            if let Some(previous) = merged.remove(&record.version) {
                fresh.claim.references = previous.claim.references;
            }
            merged.insert(record.version, fresh);
        }

        let total = merged.len();
        let mut kept = retain_bounded(
            merged.into_values().collect(),
            self.retention_cap,
            manifest.latest(),
        );
        assign_preferred_rank(&mut kept);
        sort_by_publication(&mut kept);

        let preferred = kept
            .iter()
            .find(|c| c.claim.rank == Rank::Preferred)
            .map(|c| c.version.clone());

        debug!(
            package,
            versions = kept.len(),
            dropped = total - kept.len(),
            preferred = ?preferred,
            "Reconciled versions"
        );

        VersionReconciliation {
            property: self.schema.software_version.clone(),
            dropped: total - kept.len(),
            preferred,
            claims: kept.into_iter().map(|c| c.claim).collect(),
        }
    }
}
