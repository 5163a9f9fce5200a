//! Statistic kinds requested from CloudWatch
//!
//! The display form is the CloudWatch spelling (`Average`, `SampleCount`, ...)
//! and must stay stable: it is what the statistics API expects and what users
//! write in the configuration file.

use serde::{Deserialize, Serialize};

/// Aggregation computed by the upstream API over one period
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum StatKind {
    Average,
    Minimum,
    Maximum,
    Sum,
    SampleCount,
}

impl StatKind {
    /// Short name appended to the emitted metric name
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Minimum => "min",
            Self::Maximum => "max",
            Self::Sum => "sum",
            Self::SampleCount => "count",
        }
    }
}

impl TryFrom<String> for StatKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|_| {
            format!(
                "unknown statistic '{value}' (expected Average, Minimum, Maximum, Sum or SampleCount)"
            )
        })
    }
}

impl From<StatKind> for String {
    fn from(kind: StatKind) -> Self {
        kind.to_string()
    }
}
