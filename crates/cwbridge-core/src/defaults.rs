//! Default configuration values
//!
//! These constants are used by the configuration file loader and the CLI so
//! both agree on what an omitted setting means.

use crate::source::SourceName;

/// Default Wavefront proxy host
pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";

/// Default Wavefront proxy port for the line protocol
pub const DEFAULT_PROXY_PORT: u16 = 2878;

/// Minutes of data requested on the first run (no checkpoint yet)
pub const DEFAULT_DELAY_MINUTES: i64 = 5;

/// Maximum window length in minutes (1 day)
pub const DEFAULT_MAX_LOOKBACK_MINUTES: i64 = 24 * 60;

/// Upper bound for minute settings (366 days)
pub const MAX_MINUTES: i64 = 366 * 24 * 60;

/// Statistics period in seconds
pub const DEFAULT_PERIOD_SECS: i32 = 60;

/// Maximum number of in-flight statistics requests
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Retries for throttled or timed-out statistics requests
pub const DEFAULT_FETCH_RETRIES: usize = 3;

/// Source label used when no precedence entry resolves
pub const FALLBACK_SOURCE: &str = "unknown";

/// Tag key carrying the metric namespace
pub const NAMESPACE_TAG: &str = "Namespace";

/// How far back the enumeration API tracks "recently active" metrics
pub const RECENTLY_ACTIVE_MINUTES: i64 = 3 * 60;

// Serde default functions for struct field defaults

pub fn default_delay_minutes() -> i64 {
    DEFAULT_DELAY_MINUTES
}

pub fn default_max_lookback_minutes() -> i64 {
    DEFAULT_MAX_LOOKBACK_MINUTES
}

pub fn default_period_secs() -> i32 {
    DEFAULT_PERIOD_SECS
}

pub fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

pub fn default_fetch_retries() -> usize {
    DEFAULT_FETCH_RETRIES
}

pub fn default_namespace_tag() -> bool {
    true
}

/// Default source precedence: `Service`, `LoadBalancerName`,
/// `AvailabilityZone`, the first dimension, the metric namespace, then the
/// literal `AWS`.
pub fn default_source_names() -> Vec<SourceName> {
    vec![
        SourceName::Dimension("Service".to_string()),
        SourceName::Dimension("LoadBalancerName".to_string()),
        SourceName::Dimension("AvailabilityZone".to_string()),
        SourceName::Index(0),
        SourceName::Dimension(NAMESPACE_TAG.to_string()),
        SourceName::Literal("AWS".to_string()),
    ]
}
