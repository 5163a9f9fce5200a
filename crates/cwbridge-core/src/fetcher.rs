//! Per-metric statistics retrieval
//!
//! Requests exactly the statistics the winning rule asked for. Throttling and
//! timeouts are retried with exponential backoff; anything else fails the
//! metric immediately.

use crate::api::{Sample, StatisticsApi, StatisticsRequest};
use crate::defaults::{DEFAULT_FETCH_RETRIES, DEFAULT_PERIOD_SECS};
use crate::error::FetchError;
use crate::identity::MetricIdentity;
use crate::stat::StatKind;
use crate::window::TimeWindow;
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches statistics for one metric at a time through a [`StatisticsApi`]
pub struct StatisticsFetcher<'a, S> {
    api: &'a S,
    period_secs: i32,
    retries: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl<'a, S: StatisticsApi> StatisticsFetcher<'a, S> {
    pub fn new(api: &'a S) -> Self {
        Self {
            api,
            period_secs: DEFAULT_PERIOD_SECS,
            retries: DEFAULT_FETCH_RETRIES,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn with_period(mut self, period_secs: i32) -> Self {
        self.period_secs = period_secs;
        self
    }

    /// Retries after the first attempt for retryable errors
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    /// Fetch `statistics` for `identity` over `window`.
    ///
    /// Samples for statistics that were not requested, or that fall outside
    /// the window, are dropped. An empty result is not an error.
    pub async fn fetch(
        &self,
        identity: &MetricIdentity,
        statistics: &[StatKind],
        window: &TimeWindow,
    ) -> Result<Vec<Sample>, FetchError> {
        if statistics.is_empty() || window.is_empty() {
            return Ok(Vec::new());
        }

        let request = StatisticsRequest {
            identity: identity.clone(),
            statistics: statistics.to_vec(),
            window: *window,
            period_secs: self.period_secs,
        };

        let samples = (|| async { self.api.get_statistics(&request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.min_delay)
                    .with_max_delay(self.max_delay)
                    .with_max_times(self.retries),
            )
            .when(FetchError::is_retryable)
            .notify(|e, dur| {
                warn!(
                    metric = %identity.canonical_name(),
                    delay = ?dur,
                    error = %e,
                    "Statistics request failed, retrying..."
                );
            })
            .await?;

        let received = samples.len();
        let mut kept: Vec<Sample> = samples
            .into_iter()
            .filter(|s| statistics.contains(&s.statistic) && window.contains(s.timestamp))
            .collect();
        kept.sort_by_key(|s| (s.timestamp, s.statistic));

        debug!(
            metric = %identity.canonical_name(),
            received,
            kept = kept.len(),
            "Fetched statistics"
        );
        Ok(kept)
    }
}
