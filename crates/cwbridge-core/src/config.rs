//! JSON configuration file
//!
//! Only `metrics` is required. It maps a pattern to the statistics wanted
//! for matching metrics and keeps the order the rules were written in, which
//! decides priority ties. Field validation is done via `garde::Validate`.

use crate::defaults::{
    MAX_MINUTES, default_concurrency, default_delay_minutes, default_fetch_retries,
    default_max_lookback_minutes, default_namespace_tag, default_period_secs, default_source_names,
};
use crate::error::ConfigError;
use crate::rules::{MatchRule, RuleMatcher};
use crate::source::{SourceName, SourceResolver};
use crate::stat::StatKind;
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display, EnumString};

/// What to do when fetching statistics for one metric fails
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FailurePolicy {
    /// Record the failure and keep going
    #[default]
    Skip,
    /// Abort the run without advancing the checkpoint
    Abort,
}

/// One entry of the `metrics` mapping
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleConfig {
    stats: Vec<StatKind>,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    source_names: Option<Vec<SourceName>>,
}

/// Loaded configuration file
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Pattern to rule settings, in declaration order
    #[garde(skip)]
    pub metrics: serde_json::Map<String, serde_json::Value>,

    /// Default source precedence
    #[serde(default = "default_source_names")]
    #[garde(skip)]
    pub source_names: Vec<SourceName>,

    /// Only enumerate this namespace (e.g. "AWS/ELB")
    #[serde(default)]
    #[garde(length(min = 1))]
    pub namespace: Option<String>,

    /// How far back the first run starts
    #[serde(default = "default_delay_minutes")]
    #[garde(range(min = 1, max = MAX_MINUTES))]
    pub delay_minutes: i64,

    /// Cap on the window length
    #[serde(default = "default_max_lookback_minutes")]
    #[garde(range(min = 1, max = MAX_MINUTES))]
    pub max_lookback_minutes: i64,

    #[serde(default = "default_period_secs")]
    #[garde(range(min = 1))]
    pub period_secs: i32,

    /// In-flight statistics requests
    #[serde(default = "default_concurrency")]
    #[garde(range(min = 1))]
    pub concurrency: usize,

    #[serde(default = "default_fetch_retries")]
    #[garde(skip)]
    pub fetch_retries: usize,

    #[serde(default)]
    #[garde(skip)]
    pub on_fetch_failure: FailurePolicy,

    /// Add the metric namespace as a tag
    #[serde(default = "default_namespace_tag")]
    #[garde(skip)]
    pub namespace_tag: bool,

    #[serde(default)]
    #[garde(skip)]
    pub checkpoint_path: Option<PathBuf>,
}

impl MetricsConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(&display, e))?;
        Self::parse(&content, &display)
    }

    /// Parse and validate configuration text; `origin` names it in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        config
            .validate()
            .map_err(|report| ConfigError::Validation(report.to_string().trim().to_string()))?;

        Ok(config)
    }

    /// Rules in declaration order
    pub fn rules(&self) -> Result<Vec<MatchRule>, ConfigError> {
        self.metrics
            .iter()
            .map(|(pattern, value)| {
                let rule: RuleConfig = serde_json::from_value(value.clone()).map_err(|e| {
                    ConfigError::InvalidRule {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    }
                })?;

                let mut built = MatchRule::new(pattern.clone(), rule.stats).with_priority(rule.priority);
                if let Some(names) = rule.source_names {
                    built = built.with_source_names(names);
                }
                Ok(built)
            })
            .collect()
    }

    /// Compile the rule set
    pub fn rule_matcher(&self) -> Result<RuleMatcher, ConfigError> {
        RuleMatcher::new(self.rules()?)
    }

    pub fn source_resolver(&self) -> SourceResolver {
        SourceResolver::new(self.source_names.clone())
    }

    pub fn max_lookback(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.max_lookback_minutes)
            .unwrap_or_else(|| chrono::Duration::minutes(MAX_MINUTES))
    }

    /// Checkpoint location: `checkpoint_path` if set, otherwise next to the
    /// configuration file with the extension `checkpoint.json`.
    pub fn checkpoint_path_for(&self, config_path: &Path) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| default_checkpoint_path(config_path))
    }
}

/// `aws-metrics.json` becomes `aws-metrics.checkpoint.json`
pub fn default_checkpoint_path(config_path: &Path) -> PathBuf {
    config_path.with_extension("checkpoint.json")
}
