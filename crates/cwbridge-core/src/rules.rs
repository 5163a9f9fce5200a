//! Pattern rules and priority resolution
//!
//! Rules are kept as an ordered list of (compiled pattern, rule) pairs in
//! declaration order. A pattern matches when it matches at the start of the
//! canonical name, ignoring case. When several rules match, the highest
//! priority wins and ties go to the rule declared first.

use crate::error::ConfigError;
use crate::identity::{CanonicalName, MetricIdentity};
use crate::source::SourceName;
use crate::stat::StatKind;
use regex::{Regex, RegexBuilder};

/// Which statistics to request for metrics matching `pattern`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub pattern: String,
    /// Requested statistics, in configuration order without duplicates.
    /// Empty means matching metrics are skipped.
    pub statistics: Vec<StatKind>,
    pub priority: i64,
    /// Overrides the default source precedence for matching metrics
    pub source_names: Option<Vec<SourceName>>,
}

impl MatchRule {
    pub fn new(pattern: impl Into<String>, statistics: impl IntoIterator<Item = StatKind>) -> Self {
        let mut unique = Vec::new();
        for stat in statistics {
            if !unique.contains(&stat) {
                unique.push(stat);
            }
        }
        Self {
            pattern: pattern.into(),
            statistics: unique,
            priority: 0,
            source_names: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source_names(mut self, names: Vec<SourceName>) -> Self {
        self.source_names = Some(names);
        self
    }
}

/// Compiled rule set, immutable for the duration of a run
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<(Regex, MatchRule)>,
}

impl RuleMatcher {
    /// Compile all rule patterns, failing on the first invalid one.
    pub fn new(rules: Vec<MatchRule>) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .map(|rule| compile(&rule.pattern).map(|re| (re, rule)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules matching `name`, in declaration order
    pub fn matching<'a, 'n>(
        &'a self,
        name: &'n CanonicalName,
    ) -> impl Iterator<Item = &'a MatchRule> + use<'a, 'n> {
        self.rules
            .iter()
            .filter(move |(re, _)| re.is_match(name.as_str()))
            .map(|(_, rule)| rule)
    }

    /// The winning rule for `name`, or `None` if no pattern matches.
    pub fn find(&self, name: &CanonicalName) -> Option<&MatchRule> {
        let mut best: Option<&MatchRule> = None;
        for rule in self.matching(name) {
            // Strictly greater: on a tie the earlier rule stays
            if best.is_none_or(|b| rule.priority > b.priority) {
                best = Some(rule);
            }
        }
        best
    }

    /// The winning rule for a metric identity
    pub fn find_for(&self, identity: &MetricIdentity) -> Option<&MatchRule> {
        self.find(identity.canonical_name())
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}
