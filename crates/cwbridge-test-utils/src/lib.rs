//! Shared test utilities for cwbridge
//!
//! This crate provides in-memory stand-ins for CloudWatch and the proxy so
//! the pipeline can be exercised end to end without AWS or a network.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection for credentialed tests
//! - [`cloudwatch`]: Scripted enumeration and statistics API
//! - [`sink`]: Line-recording sink with injectable write failures

pub mod aws;
pub mod cloudwatch;
pub mod sink;

// Re-export commonly used items
pub use aws::get_test_region;
pub use cloudwatch::{FakeCloudWatch, elb_metric, sample, ts};
pub use sink::RecordingSink;
