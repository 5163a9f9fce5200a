//! CloudWatch SDK adapter
//!
//! Implements the core [`ListMetricsApi`] and [`StatisticsApi`] traits on top
//! of `ListMetrics` and `GetMetricStatistics`.

use super::context::{AwsContext, FromAwsContext};
use super::error::classify_sdk_error;
use aws_sdk_cloudwatch::{
    Client,
    primitives::DateTime as AwsDateTime,
    types::{self, Datapoint, RecentlyActive, Statistic},
};
use chrono::{DateTime, Utc};
use cwbridge_core::{
    Dimension, FetchError, ListMetricsApi, ListMetricsRequest, MetricIdentity, MetricPage, Sample,
    StatKind, StatisticsApi, StatisticsRequest,
};
use tracing::{debug, warn};

/// CloudWatch client for enumeration and statistics
pub struct CloudWatchClient {
    client: Client,
}

impl FromAwsContext for CloudWatchClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudwatch_client(),
        }
    }
}

impl ListMetricsApi for CloudWatchClient {
    async fn list_metrics(&self, request: ListMetricsRequest) -> Result<MetricPage, FetchError> {
        let mut call = self
            .client
            .list_metrics()
            .set_namespace(request.namespace)
            .set_next_token(request.next_token);
        if request.recently_active {
            call = call.recently_active(RecentlyActive::Pt3H);
        }

        let output = call.send().await.map_err(|e| classify_sdk_error(&e))?;

        let metrics: Vec<MetricIdentity> = output.metrics().iter().filter_map(to_identity).collect();
        let dropped = output.metrics().len() - metrics.len();
        if dropped > 0 {
            warn!(dropped, "Ignoring metrics without a namespace or name");
        }
        debug!(count = metrics.len(), "Listed metrics page");

        Ok(MetricPage {
            metrics,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

impl StatisticsApi for CloudWatchClient {
    async fn get_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Sample>, FetchError> {
        let identity = &request.identity;
        let dimensions = identity
            .dimensions()
            .iter()
            .map(|d| types::Dimension::builder().name(&d.name).value(&d.value).build())
            .collect();

        let output = self
            .client
            .get_metric_statistics()
            .namespace(identity.namespace())
            .metric_name(identity.name())
            .set_dimensions(Some(dimensions))
            .start_time(to_aws_time(request.window.start()))
            .end_time(to_aws_time(request.window.end()))
            .period(request.period_secs)
            .set_statistics(Some(request.statistics.iter().copied().map(to_statistic).collect()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let samples = output
            .datapoints()
            .iter()
            .flat_map(|dp| samples_from(dp, &request.statistics))
            .collect();

        Ok(samples)
    }
}

/// Convert an SDK metric; metrics without a namespace or name are unusable.
fn to_identity(metric: &types::Metric) -> Option<MetricIdentity> {
    let namespace = metric.namespace()?;
    let name = metric.metric_name()?;
    let dimensions = metric
        .dimensions()
        .iter()
        .filter_map(|d| Some(Dimension::new(d.name()?, d.value()?)))
        .collect();
    Some(MetricIdentity::new(namespace, name, dimensions))
}

fn to_statistic(kind: StatKind) -> Statistic {
    match kind {
        StatKind::Average => Statistic::Average,
        StatKind::Minimum => Statistic::Minimum,
        StatKind::Maximum => Statistic::Maximum,
        StatKind::Sum => Statistic::Sum,
        StatKind::SampleCount => Statistic::SampleCount,
    }
}

fn to_aws_time(ts: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(ts.timestamp())
}

/// Split one datapoint into a sample per requested statistic it carries.
fn samples_from(dp: &Datapoint, statistics: &[StatKind]) -> Vec<Sample> {
    let Some(timestamp) = dp
        .timestamp()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
    else {
        return Vec::new();
    };

    statistics
        .iter()
        .filter_map(|&statistic| {
            let value = match statistic {
                StatKind::Average => dp.average(),
                StatKind::Minimum => dp.minimum(),
                StatKind::Maximum => dp.maximum(),
                StatKind::Sum => dp.sum(),
                StatKind::SampleCount => dp.sample_count(),
            }?;
            Some(Sample {
                statistic,
                value,
                timestamp,
            })
        })
        .collect()
}
