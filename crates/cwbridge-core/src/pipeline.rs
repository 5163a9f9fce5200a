//! The run driver
//!
//! One run, in order:
//!
//! 1. Take the checkpoint lock
//! 2. Load the checkpoint and resolve the window
//! 3. Enumerate metrics lazily and pick a rule for each
//! 4. Fetch statistics for matched metrics with bounded concurrency
//! 5. Emit data points and flush the sink
//! 6. Save the window end as the new checkpoint
//!
//! Any fatal error before step 6 leaves the checkpoint where it was.

use crate::api::{ListMetricsApi, Sample, StatisticsApi};
use crate::catalog::MetricCatalog;
use crate::checkpoint::CheckpointStore;
use crate::config::{FailurePolicy, MetricsConfig};
use crate::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_FETCH_RETRIES, DEFAULT_MAX_LOOKBACK_MINUTES, DEFAULT_PERIOD_SECS,
    NAMESPACE_TAG,
};
use crate::emitter::{DataPoint, MetricEmitter, MetricNaming};
use crate::error::{FetchError, RunError};
use crate::fetcher::StatisticsFetcher;
use crate::identity::MetricIdentity;
use crate::report::{RunReport, SkipReason};
use crate::rules::{MatchRule, RuleMatcher};
use crate::sink::MetricSink;
use crate::source::SourceResolver;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub namespace: Option<String>,
    pub max_lookback: chrono::Duration,
    pub period_secs: i32,
    pub concurrency: usize,
    pub fetch_retries: usize,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub naming: MetricNaming,
    pub namespace_tag: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            max_lookback: chrono::Duration::minutes(DEFAULT_MAX_LOOKBACK_MINUTES),
            period_secs: DEFAULT_PERIOD_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_min_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
            failure_policy: FailurePolicy::default(),
            naming: MetricNaming::default(),
            namespace_tag: true,
        }
    }
}

impl PipelineOptions {
    /// Options from the configuration file; naming comes from the CLI.
    pub fn from_config(config: &MetricsConfig, naming: MetricNaming) -> Self {
        Self {
            namespace: config.namespace.clone(),
            max_lookback: config.max_lookback(),
            period_secs: config.period_secs,
            concurrency: config.concurrency,
            fetch_retries: config.fetch_retries,
            failure_policy: config.on_fetch_failure,
            naming,
            namespace_tag: config.namespace_tag,
            ..Self::default()
        }
    }
}

enum Outcome<'r> {
    Skipped(MetricIdentity, SkipReason),
    Fetched {
        identity: MetricIdentity,
        rule: &'r MatchRule,
        result: Result<Vec<Sample>, FetchError>,
    },
}

/// Drives one run against an API implementing enumeration and statistics
pub struct Pipeline<'a, A> {
    api: &'a A,
    matcher: &'a RuleMatcher,
    resolver: &'a SourceResolver,
    store: &'a CheckpointStore,
    options: PipelineOptions,
}

impl<'a, A> Pipeline<'a, A>
where
    A: ListMetricsApi + StatisticsApi,
{
    pub fn new(
        api: &'a A,
        matcher: &'a RuleMatcher,
        resolver: &'a SourceResolver,
        store: &'a CheckpointStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            api,
            matcher,
            resolver,
            store,
            options,
        }
    }

    /// Run once as of `now`, writing to `sink`.
    pub async fn run<K: MetricSink>(
        &self,
        sink: &mut K,
        now: DateTime<Utc>,
    ) -> Result<RunReport, RunError> {
        let _lock = self.store.lock()?;

        let checkpoint = self.store.load(now);
        let window = TimeWindow::resolve(
            &checkpoint,
            now,
            self.options.max_lookback,
            self.options.period_secs,
        );
        let mut report = RunReport::new(window);

        if window.is_empty() {
            info!(
                last_run_end = %checkpoint.last_run_end,
                "No complete period since the checkpoint, nothing to fetch"
            );
            return Ok(report);
        }

        info!(
            window = %window,
            rules = self.matcher.len(),
            concurrency = self.options.concurrency,
            "Starting run"
        );

        let fetcher = StatisticsFetcher::new(self.api)
            .with_period(self.options.period_secs)
            .with_retries(self.options.fetch_retries)
            .with_backoff(self.options.retry_min_delay, self.options.retry_max_delay);
        let fetcher = &fetcher;
        let window_ref = &window;
        let matcher = self.matcher;

        let catalog = MetricCatalog::new(self.api, self.options.namespace.clone());
        let outcomes = catalog
            .list(&window)
            .map_err(RunError::Enumeration)
            .map_ok(move |identity| {
                let selected = select(matcher, identity);
                async move {
                    let outcome = match selected {
                        Err((identity, reason)) => Outcome::Skipped(identity, reason),
                        Ok((identity, rule)) => {
                            let result = fetcher.fetch(&identity, &rule.statistics, window_ref).await;
                            Outcome::Fetched {
                                identity,
                                rule,
                                result,
                            }
                        }
                    };
                    Ok::<_, RunError>(outcome)
                }
            })
            .try_buffer_unordered(self.options.concurrency.max(1));
        futures::pin_mut!(outcomes);

        let mut emitter = MetricEmitter::new(sink);

        while let Some(outcome) = outcomes.try_next().await? {
            report.metrics_seen += 1;
            match outcome {
                Outcome::Skipped(identity, reason) => {
                    debug!(metric = %identity, reason = %reason, "Skipping metric");
                    report.skipped.push((identity, reason));
                }
                Outcome::Fetched {
                    identity,
                    rule,
                    result,
                } => {
                    report.metrics_matched += 1;
                    match result {
                        Ok(samples) => {
                            for point in self.points(&identity, rule, &samples) {
                                emitter.emit(&point).await?;
                            }
                        }
                        Err(e) => {
                            if self.options.failure_policy == FailurePolicy::Abort {
                                return Err(RunError::Fetch {
                                    metric: identity.to_string(),
                                    source: e,
                                });
                            }
                            warn!(metric = %identity, error = %e, "Failed to fetch statistics, skipping metric");
                            report.failures.push((identity, e.to_string()));
                        }
                    }
                }
            }
        }

        emitter.flush().await?;
        report.points_emitted = emitter.emitted();
        report.points_rejected = emitter.rejected();

        self.store.save(&window.next_checkpoint())?;
        report.checkpoint_saved = true;

        info!(
            metrics_seen = report.metrics_seen,
            metrics_matched = report.metrics_matched,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            points_emitted = report.points_emitted,
            points_rejected = report.points_rejected,
            next_start = %window.end(),
            "Run complete"
        );
        Ok(report)
    }

    /// Data points for one metric's samples
    fn points(&self, identity: &MetricIdentity, rule: &MatchRule, samples: &[Sample]) -> Vec<DataPoint> {
        let custom;
        let resolver = match &rule.source_names {
            Some(names) => {
                custom = self.resolver.with_precedence(names.clone());
                &custom
            }
            None => self.resolver,
        };

        let (source, mut tags) = resolver.resolve_with_tags(identity);
        if self.options.namespace_tag && identity.dimension(NAMESPACE_TAG).is_none() {
            tags.insert(NAMESPACE_TAG.to_string(), identity.namespace().to_string());
        }

        samples
            .iter()
            .map(|sample| DataPoint {
                metric: self.options.naming.name(
                    identity.canonical_name(),
                    sample.statistic,
                    rule.statistics.len(),
                ),
                statistic: sample.statistic,
                value: sample.value,
                timestamp: sample.timestamp,
                source: source.clone(),
                tags: tags.clone(),
            })
            .collect()
    }
}

/// Winning rule for a metric, or why it is skipped
fn select(
    matcher: &RuleMatcher,
    identity: MetricIdentity,
) -> Result<(MetricIdentity, &MatchRule), (MetricIdentity, SkipReason)> {
    match matcher.find_for(&identity) {
        None => Err((identity, SkipReason::NoMatchingRule)),
        Some(rule) if rule.statistics.is_empty() => Err((identity, SkipReason::NoStatistics)),
        Some(rule) => Ok((identity, rule)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ListMetricsRequest, MetricPage, StatisticsRequest};
    use crate::identity::Dimension;
    use crate::source::SourceName;
    use crate::stat::StatKind;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct NoApi;

    impl ListMetricsApi for NoApi {
        async fn list_metrics(&self, _request: ListMetricsRequest) -> Result<MetricPage, FetchError> {
            Ok(MetricPage::default())
        }
    }

    impl StatisticsApi for NoApi {
        async fn get_statistics(&self, _request: &StatisticsRequest) -> Result<Vec<Sample>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn identity(dimensions: &[(&str, &str)]) -> MetricIdentity {
        MetricIdentity::new(
            "AWS/ELB",
            "Latency",
            dimensions.iter().map(|(k, v)| Dimension::new(*k, *v)).collect(),
        )
    }

    fn sample(statistic: StatKind) -> Sample {
        Sample {
            statistic,
            value: 1.5,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_select_reasons() {
        let matcher = RuleMatcher::new(vec![
            MatchRule::new(r"aws\.elb\.latency", Vec::<StatKind>::new()),
            MatchRule::new(r"aws\.elb\.", [StatKind::Sum]),
        ])
        .unwrap();

        let skipped = select(&matcher, identity(&[("LoadBalancerName", "lb-a")])).unwrap_err();
        assert_eq!(skipped.1, SkipReason::NoStatistics);
        assert_eq!(skipped.0.dimension("LoadBalancerName"), Some("lb-a"));

        let other = MetricIdentity::new("AWS/EC2", "CPUUtilization", vec![]);
        assert_eq!(select(&matcher, other).unwrap_err().1, SkipReason::NoMatchingRule);

        let count = MetricIdentity::new("AWS/ELB", "RequestCount", vec![]);
        let (_, rule) = select(&matcher, count).unwrap();
        assert_eq!(rule.statistics, vec![StatKind::Sum]);
    }

    #[test]
    fn test_points_use_source_and_tags() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("cp.json"), 5);
        let matcher = RuleMatcher::new(vec![]).unwrap();
        let resolver = SourceResolver::default();
        let pipeline = Pipeline::new(&NoApi, &matcher, &resolver, &store, PipelineOptions::default());

        let rule = MatchRule::new("aws", [StatKind::Average, StatKind::Maximum]);
        let id = identity(&[("LoadBalancerName", "my-lb"), ("AvailabilityZone", "us-east-2a")]);
        let points = pipeline.points(&id, &rule, &[sample(StatKind::Average), sample(StatKind::Maximum)]);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metric, "aws.elb.latency.avg");
        assert_eq!(points[1].metric, "aws.elb.latency.max");
        assert_eq!(points[0].source, "my-lb");
        assert_eq!(points[0].tags.get("AvailabilityZone").map(String::as_str), Some("us-east-2a"));
        assert_eq!(points[0].tags.get("Namespace").map(String::as_str), Some("AWS/ELB"));
        assert!(!points[0].tags.contains_key("LoadBalancerName"));
    }

    #[test]
    fn test_rule_source_override_and_no_namespace_tag() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("cp.json"), 5);
        let matcher = RuleMatcher::new(vec![]).unwrap();
        let resolver = SourceResolver::default();
        let options = PipelineOptions {
            namespace_tag: false,
            naming: MetricNaming {
                prefix: "cw.".to_string(),
                no_suffix_for_single: true,
            },
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::new(&NoApi, &matcher, &resolver, &store, options);

        let rule = MatchRule::new("aws", [StatKind::Sum])
            .with_source_names(vec![SourceName::Literal("elb".to_string())]);
        let id = identity(&[("LoadBalancerName", "my-lb")]);
        let points = pipeline.points(&id, &rule, &[sample(StatKind::Sum)]);

        assert_eq!(points[0].metric, "cw.aws.elb.latency");
        assert_eq!(points[0].source, "elb");
        assert_eq!(points[0].tags.len(), 1);
        assert!(points[0].tags.contains_key("LoadBalancerName"));
    }

    #[tokio::test]
    async fn test_future_checkpoint_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("cp.json"), 5);
        let future = Utc.timestamp_opt(2_000_000_000, 0).unwrap();
        store.save(&crate::checkpoint::Checkpoint::new(future)).unwrap();

        let matcher = RuleMatcher::new(vec![MatchRule::new("aws", [StatKind::Sum])]).unwrap();
        let resolver = SourceResolver::default();
        let pipeline = Pipeline::new(&NoApi, &matcher, &resolver, &store, PipelineOptions::default());

        let mut sink = crate::sink::DryRunSink::new("localhost", 2878, Vec::new());
        let report = pipeline
            .run(&mut sink, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .await
            .unwrap();

        assert!(report.window.is_empty());
        assert!(!report.checkpoint_saved);
        assert_eq!(report.metrics_seen, 0);
        assert_eq!(store.try_load().unwrap().unwrap().last_run_end, future);
    }
}
