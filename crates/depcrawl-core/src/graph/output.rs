//! Batched write for one entity

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::claim::{Claim, Reference};

/// A claim queued for writing, with its merge policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputClaim {
    pub claim: Claim,
    /// Leave the entity untouched if it already has any value for this property
    #[serde(default)]
    pub skip_if_conflicting: bool,
}

/// Everything computed for one entity in one crawl pass
///
/// The store applies an output atomically: either every claim lands or none
/// does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOutput {
    /// Edit summary recorded with the write
    pub summary: String,
    pub claims: Vec<OutputClaim>,
    /// Properties whose existing claims are dropped before `claims` are applied
    pub replace: BTreeSet<String>,
}

impl EntityOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, claim: Claim) {
        self.claims.push(OutputClaim {
            claim,
            skip_if_conflicting: false,
        });
    }

    pub fn add_unless_conflicting(&mut self, claim: Claim) {
        self.claims.push(OutputClaim {
            claim,
            skip_if_conflicting: true,
        });
    }

    pub fn extend(&mut self, claims: impl IntoIterator<Item = Claim>) {
        for claim in claims {
            self.add(claim);
        }
    }

    /// Replace every existing claim of `property` with the ones in this output
    pub fn replace_property(&mut self, property: impl Into<String>) {
        self.replace.insert(property.into());
    }

    /// Attach `reference` to every queued claim whose property is in `properties`
    ///
    /// Returns the number of claims the reference was attached to.
    pub fn attach_reference(&mut self, reference: &Reference, properties: &[&str]) -> usize {
        let mut attached = 0;
        for output in &mut self.claims {
            if properties.contains(&output.claim.property.as_str()) {
                output.claim.add_reference(reference.clone());
                attached += 1;
            }
        }
        attached
    }

    pub fn claims_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims
            .iter()
            .map(|o| &o.claim)
            .filter(move |c| c.property == property)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;

    #[test]
    fn test_attach_reference_filters_by_property() {
        let mut output = EntityOutput::new("Adding dependency information.");
        output.add(Claim::new("P1547", Value::item("Q1")));
        output.add(Claim::new("P1547", Value::item("Q2")));
        output.add_unless_conflicting(Claim::new("P277", Value::item("Q2005")));

        let reference = Reference::new().with("P248", Value::item("Q116058944"));
        let attached = output.attach_reference(&reference, &["P1547"]);

        assert_eq!(attached, 2);
        assert!(output.claims_for("P1547").all(|c| c.references.len() == 1));
        assert!(output.claims_for("P277").all(|c| c.references.is_empty()));
        assert!(output.claims[2].skip_if_conflicting);
    }

    #[test]
    fn test_replace_property() {
        let mut output = EntityOutput::new("x");
        output.replace_property("P348");
        output.replace_property("P348");

        assert_eq!(output.replace.len(), 1);
        assert!(output.is_empty());
    }
}
