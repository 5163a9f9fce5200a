//! Scripted CloudWatch stand-in
//!
//! Serves a fixed list of pages to `ListMetrics` and per-metric canned
//! results to `GetMetricStatistics`, recording every request it receives.
//! Metrics registered as live series are answered the way CloudWatch does:
//! buckets start at the request start rounded down to the period, and only
//! data up to the request end exists yet.

use chrono::{DateTime, TimeZone, Utc};
use cwbridge_core::{
    Dimension, FetchError, ListMetricsApi, ListMetricsRequest, MetricIdentity, MetricPage, Sample,
    StatKind, StatisticsApi, StatisticsRequest,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Timestamp from epoch seconds
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// An `AWS/ELB` metric with a single `LoadBalancerName` dimension
pub fn elb_metric(name: &str, load_balancer: &str) -> MetricIdentity {
    MetricIdentity::new(
        "AWS/ELB",
        name,
        vec![Dimension::new("LoadBalancerName", load_balancer)],
    )
}

pub fn sample(statistic: StatKind, value: f64, secs: i64) -> Sample {
    Sample {
        statistic,
        value,
        timestamp: ts(secs),
    }
}

/// In-memory enumeration and statistics API
#[derive(Debug, Default)]
pub struct FakeCloudWatch {
    pages: Vec<Vec<MetricIdentity>>,
    failing_page: Option<usize>,
    results: HashMap<MetricIdentity, Result<Vec<Sample>, FetchError>>,
    live: HashMap<MetricIdentity, StatKind>,
    list_requests: Mutex<Vec<ListMetricsRequest>>,
    statistics_requests: Mutex<Vec<StatisticsRequest>>,
}

impl FakeCloudWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one enumeration page
    pub fn with_page(mut self, metrics: Vec<MetricIdentity>) -> Self {
        self.pages.push(metrics);
        self
    }

    /// Fail the enumeration request for page `index` (0-based)
    pub fn with_failing_page(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }

    /// Samples returned for `identity`, whatever statistics are requested
    pub fn with_samples(mut self, identity: &MetricIdentity, samples: Vec<Sample>) -> Self {
        self.results.insert(identity.clone(), Ok(samples));
        self
    }

    /// Answer `identity` with one `statistic` sample per period whose value is
    /// the number of seconds of data the period holds as of the request end
    pub fn with_live_series(mut self, identity: &MetricIdentity, statistic: StatKind) -> Self {
        self.live.insert(identity.clone(), statistic);
        self
    }

    /// Every statistics request for `identity` fails with `error`
    pub fn with_failure(mut self, identity: &MetricIdentity, error: FetchError) -> Self {
        self.results.insert(identity.clone(), Err(error));
        self
    }

    pub fn list_requests(&self) -> Vec<ListMetricsRequest> {
        self.list_requests.lock().unwrap().clone()
    }

    pub fn statistics_requests(&self) -> Vec<StatisticsRequest> {
        self.statistics_requests.lock().unwrap().clone()
    }

    /// Statistics requests for metrics with this canonical name
    pub fn requests_for(&self, canonical: &str) -> Vec<StatisticsRequest> {
        self.statistics_requests()
            .into_iter()
            .filter(|r| r.identity.canonical_name().as_str() == canonical)
            .collect()
    }
}

impl ListMetricsApi for FakeCloudWatch {
    async fn list_metrics(&self, request: ListMetricsRequest) -> Result<MetricPage, FetchError> {
        let index = match request.next_token.as_deref() {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| FetchError::api(format!("bad token {token}")))?,
        };
        self.list_requests.lock().unwrap().push(request);

        if self.failing_page == Some(index) {
            return Err(FetchError::Api {
                code: Some("InternalServiceFault".to_string()),
                message: format!("page {index} unavailable"),
            });
        }

        let metrics = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(MetricPage { metrics, next_token })
    }
}

impl StatisticsApi for FakeCloudWatch {
    async fn get_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Sample>, FetchError> {
        self.statistics_requests.lock().unwrap().push(request.clone());
        if let Some(statistic) = self.live.get(&request.identity) {
            return Ok(live_samples(request, *statistic));
        }
        self.results
            .get(&request.identity)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn live_samples(request: &StatisticsRequest, statistic: StatKind) -> Vec<Sample> {
    let period = i64::from(request.period_secs.max(1));
    let start = request.window.start().timestamp();
    let end = request.window.end().timestamp();
    let first = start - start.rem_euclid(period);

    (first..end)
        .step_by(usize::try_from(period).unwrap())
        .map(|bucket| sample(statistic, (end.min(bucket + period) - bucket) as f64, bucket))
        .collect()
}
