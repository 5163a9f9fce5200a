//! cwbridge-core - CloudWatch statistics selection and relay core
//!
//! This crate holds everything that decides what to fetch and what to emit,
//! without any AWS SDK dependencies. The `cwbridge` binary plugs the real
//! CloudWatch client in through the traits in [`api`].
//!
//! ## Modules
//!
//! - [`api`]: Collaborator traits for the enumeration and statistics APIs
//! - [`catalog`]: Paginated, deduplicated metric enumeration
//! - [`checkpoint`]: Persisted end-of-window checkpoint with file locking
//! - [`config`]: JSON configuration file loading and validation
//! - [`defaults`]: Default configuration values
//! - [`emitter`]: Data point naming and line protocol formatting
//! - [`error`]: Typed errors for each pipeline stage
//! - [`fetcher`]: Per-metric statistics requests with retry
//! - [`identity`]: Metric identities and canonical names
//! - [`pipeline`]: The run driver
//! - [`report`]: Run summary
//! - [`rules`]: Pattern rules and priority resolution
//! - [`sink`]: TCP proxy and dry-run sinks
//! - [`source`]: Source label resolution from dimensions
//! - [`stat`]: Statistic kinds
//! - [`window`]: Time window resolution

pub mod api;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod defaults;
pub mod emitter;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod sink;
pub mod source;
pub mod stat;
pub mod window;

// Re-export commonly used types
pub use api::{ListMetricsApi, ListMetricsRequest, MetricPage, Sample, StatisticsApi, StatisticsRequest};
pub use checkpoint::{Checkpoint, CheckpointLock, CheckpointStore};
pub use config::{FailurePolicy, MetricsConfig};
pub use emitter::{DataPoint, MetricEmitter, MetricNaming};
pub use error::{CheckpointError, ConfigError, EmitError, FetchError, FormatError, RunError};
pub use identity::{CanonicalName, Dimension, MetricIdentity};
pub use pipeline::{Pipeline, PipelineOptions};
pub use report::{RunReport, SkipReason};
pub use rules::{MatchRule, RuleMatcher};
pub use sink::{DryRunSink, MetricSink, ProxySink};
pub use source::{SourceName, SourceResolver};
pub use stat::StatKind;
pub use window::TimeWindow;
