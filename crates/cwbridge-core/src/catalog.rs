//! Metric enumeration
//!
//! Turns the paginated `ListMetrics` API into one lazy stream of identities.
//! Pages are requested only as the stream is polled, and identities already
//! produced by an earlier page are dropped.

use crate::api::{ListMetricsApi, ListMetricsRequest};
use crate::defaults::RECENTLY_ACTIVE_MINUTES;
use crate::error::FetchError;
use crate::identity::MetricIdentity;
use crate::window::TimeWindow;
use chrono::Duration;
use futures::stream::{self, Stream, TryStreamExt};
use std::collections::HashSet;
use tracing::debug;

enum PageState {
    First,
    Next(String),
    Done,
}

/// Enumerates candidate metrics through a [`ListMetricsApi`]
pub struct MetricCatalog<'a, A> {
    api: &'a A,
    namespace: Option<String>,
}

impl<'a, A: ListMetricsApi> MetricCatalog<'a, A> {
    pub fn new(api: &'a A, namespace: Option<String>) -> Self {
        Self { api, namespace }
    }

    /// Enumerate metrics that can have data in `window`.
    ///
    /// The stream is finite and not restartable; call again to re-enumerate.
    /// A failed page ends the stream with that error.
    pub fn list(
        &self,
        window: &TimeWindow,
    ) -> impl Stream<Item = Result<MetricIdentity, FetchError>> + 'a {
        let api = self.api;
        let namespace = self.namespace.clone();
        let recently_active = window.duration() < Duration::minutes(RECENTLY_ACTIVE_MINUTES);

        let pages = stream::try_unfold((PageState::First, 0usize), move |(state, page_no)| {
            let namespace = namespace.clone();
            async move {
                let next_token = match state {
                    PageState::First => None,
                    PageState::Next(token) => Some(token),
                    PageState::Done => return Ok(None),
                };

                let page = api
                    .list_metrics(ListMetricsRequest {
                        namespace,
                        recently_active,
                        next_token,
                    })
                    .await?;

                debug!(
                    page = page_no,
                    metrics = page.metrics.len(),
                    has_next = page.next_token.is_some(),
                    "Listed metrics page"
                );

                let next = match page.next_token {
                    Some(token) if !token.is_empty() => PageState::Next(token),
                    _ => PageState::Done,
                };
                Ok::<_, FetchError>(Some((page.metrics, (next, page_no + 1))))
            }
        });

        let mut seen = HashSet::new();
        pages
            .map_ok(|metrics| stream::iter(metrics.into_iter().map(Ok)))
            .try_flatten()
            .try_filter(move |identity| std::future::ready(seen.insert(identity.clone())))
    }
}
