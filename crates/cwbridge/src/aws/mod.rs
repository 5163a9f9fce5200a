//! AWS client modules
//!
//! - context: SDK configuration loaded once per run
//! - cloudwatch: `ListMetrics` and `GetMetricStatistics` behind the core traits
//! - error: SDK error classification into retryable and fatal failures

pub mod cloudwatch;
pub mod context;
pub mod error;

pub use cloudwatch::CloudWatchClient;
pub use context::{AwsContext, FromAwsContext};
pub use error::{classify_aws_error, classify_sdk_error};
