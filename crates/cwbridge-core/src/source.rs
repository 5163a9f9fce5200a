//! Source label resolution
//!
//! Every data point sent to the proxy carries one `source`. It is picked from
//! the metric's dimensions by walking an ordered precedence list; the first
//! entry that resolves wins. The dimension that supplied the source is not
//! repeated as a tag. A `Namespace` entry with no dimension of that name
//! resolves to the metric's namespace.

use crate::defaults::{FALLBACK_SOURCE, NAMESPACE_TAG, default_source_names};
use crate::identity::MetricIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the source precedence list.
///
/// In JSON a string names a dimension, a string starting with `=` is a
/// literal, and a non-negative integer is a 0-based dimension index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSourceName", into = "RawSourceName")]
pub enum SourceName {
    /// Value of the dimension with this key
    Dimension(String),
    /// Value of the dimension at this position
    Index(usize),
    /// Constant text
    Literal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSourceName {
    Index(usize),
    Name(String),
}

impl TryFrom<RawSourceName> for SourceName {
    type Error = String;

    fn try_from(raw: RawSourceName) -> Result<Self, Self::Error> {
        match raw {
            RawSourceName::Index(i) => Ok(Self::Index(i)),
            RawSourceName::Name(name) if name.is_empty() => {
                Err("source name cannot be empty".to_string())
            }
            RawSourceName::Name(name) => match name.strip_prefix('=') {
                Some(literal) => Ok(Self::Literal(literal.to_string())),
                None => Ok(Self::Dimension(name)),
            },
        }
    }
}

impl From<SourceName> for RawSourceName {
    fn from(name: SourceName) -> Self {
        match name {
            SourceName::Dimension(key) => Self::Name(key),
            SourceName::Index(i) => Self::Index(i),
            SourceName::Literal(text) => Self::Name(format!("={text}")),
        }
    }
}

/// Picks the source label for a metric from its dimensions
#[derive(Debug, Clone)]
pub struct SourceResolver {
    precedence: Vec<SourceName>,
    fallback: String,
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(default_source_names())
    }
}

impl SourceResolver {
    pub fn new(precedence: Vec<SourceName>) -> Self {
        Self {
            precedence,
            fallback: FALLBACK_SOURCE.to_string(),
        }
    }

    /// Same fallback, different precedence
    pub fn with_precedence(&self, precedence: Vec<SourceName>) -> Self {
        Self {
            precedence,
            fallback: self.fallback.clone(),
        }
    }

    /// Resolve the source label, or the fallback if nothing matches.
    pub fn resolve(&self, identity: &MetricIdentity) -> String {
        self.find(identity)
            .map(|(value, _)| value)
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Resolve the source label and return the remaining dimensions as tags.
    pub fn resolve_with_tags(&self, identity: &MetricIdentity) -> (String, BTreeMap<String, String>) {
        let (source, consumed) = match self.find(identity) {
            Some((value, consumed)) => (value, consumed),
            None => (self.fallback.clone(), None),
        };

        let tags = identity
            .dimensions()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != consumed)
            .map(|(_, d)| (d.name.clone(), d.value.clone()))
            .collect();

        (source, tags)
    }

    /// First resolving entry: the value and, for dimension-backed entries,
    /// the position of the dimension that supplied it.
    fn find(&self, identity: &MetricIdentity) -> Option<(String, Option<usize>)> {
        let dimensions = identity.dimensions();
        self.precedence.iter().find_map(|entry| match entry {
            SourceName::Dimension(key) => match dimensions.iter().position(|d| &d.name == key) {
                Some(i) => Some((dimensions[i].value.clone(), Some(i))),
                None if key == NAMESPACE_TAG => Some((identity.namespace().to_string(), None)),
                None => None,
            },
            SourceName::Index(i) => dimensions.get(*i).map(|d| (d.value.clone(), Some(*i))),
            SourceName::Literal(text) => Some((text.clone(), None)),
        })
    }
}
