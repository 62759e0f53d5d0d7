//! Claims: property-value assertions attached to an entity
//!
//! A [`Claim`] carries its main value, qualifiers (sub-attributes such as a
//! publication date) and references (provenance). Claims are plain values;
//! the store decides how they merge with what it already holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Value of a claim, qualifier or reference part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Item(EntityId),
    String(String),
    Url(String),
    Time(DateTime<Utc>),
    Quantity { amount: u64, unit: Option<EntityId> },
}

impl Value {
    pub fn item(id: impl Into<EntityId>) -> Self {
        Self::Item(id.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Url(s) => Some(s),
            Self::Item(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&EntityId> {
        match self {
            Self::Item(id) => Some(id),
            _ => None,
        }
    }
}

/// A single property-value pair inside a qualifier list or reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snak {
    pub property: String,
    pub value: Value,
}

impl Snak {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// Provenance block attached to a claim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub snaks: Vec<Snak>,
}

impl Reference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: impl Into<String>, value: Value) -> Self {
        self.snaks.push(Snak::new(property, value));
        self
    }

    /// References match when every non-time part matches
    ///
    /// Retrieval dates change on every crawl, so two references pointing at
    /// the same source on different days are the same reference.
    pub fn same_source(&self, other: &Reference) -> bool {
        let stable = |r: &Reference| -> Vec<Snak> {
            r.snaks
                .iter()
                .filter(|s| !matches!(s.value, Value::Time(_)))
                .cloned()
                .collect()
        };
        stable(self) == stable(other)
    }
}

/// Claim rank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

/// A property-value assertion on an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub property: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<Snak>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub rank: Rank,
}

impl Claim {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
            qualifiers: Vec::new(),
            references: Vec::new(),
            rank: Rank::Normal,
        }
    }

    pub fn with_qualifier(mut self, property: impl Into<String>, value: Value) -> Self {
        self.qualifiers.push(Snak::new(property, value));
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.add_reference(reference);
        self
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    /// First qualifier value for a property
    pub fn qualifier(&self, property: &str) -> Option<&Value> {
        self.qualifiers
            .iter()
            .find(|q| q.property == property)
            .map(|q| &q.value)
    }

    /// Add a reference unless one from the same source is already attached
    pub fn add_reference(&mut self, reference: Reference) {
        if let Some(existing) = self
            .references
            .iter_mut()
            .find(|r| r.same_source(&reference))
        {
            *existing = reference;
        } else {
            self.references.push(reference);
        }
    }

    /// Same property and same main value
    pub fn same_statement(&self, other: &Claim) -> bool {
        self.property == other.property && self.value == other.value
    }
}
