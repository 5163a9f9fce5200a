//! Collaborator traits for the upstream monitoring API
//!
//! These traits abstract the two CloudWatch calls the pipeline needs so the
//! selection and windowing logic can be tested without hitting real AWS.
//! The `cwbridge` crate implements both for the SDK client.

use crate::error::FetchError;
use crate::identity::MetricIdentity;
use crate::stat::StatKind;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};

/// One page of an enumeration request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMetricsRequest {
    /// Only list metrics in this namespace
    pub namespace: Option<String>,
    /// Only list metrics that received data recently
    pub recently_active: bool,
    /// Token from the previous page
    pub next_token: Option<String>,
}

/// One page of enumeration results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricPage {
    pub metrics: Vec<MetricIdentity>,
    pub next_token: Option<String>,
}

/// Statistics request for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRequest {
    pub identity: MetricIdentity,
    pub statistics: Vec<StatKind>,
    pub window: TimeWindow,
    pub period_secs: i32,
}

/// One aggregated value returned by the statistics API
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub statistic: StatKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Metric enumeration (`ListMetrics`)
#[allow(async_fn_in_trait)] // Internal use only, the pipeline never spawns these futures
#[cfg_attr(test, mockall::automock)]
pub trait ListMetricsApi: Send + Sync {
    /// Fetch a single page of metrics
    async fn list_metrics(&self, request: ListMetricsRequest) -> Result<MetricPage, FetchError>;
}

/// Statistics retrieval (`GetMetricStatistics`)
#[allow(async_fn_in_trait)] // Internal use only, the pipeline never spawns these futures
#[cfg_attr(test, mockall::automock)]
pub trait StatisticsApi: Send + Sync {
    /// Fetch the requested statistics for one metric over one window
    async fn get_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Sample>, FetchError>;
}
