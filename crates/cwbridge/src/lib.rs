//! cwbridge - relay CloudWatch statistics to a Wavefront proxy
//!
//! The binary wires the AWS SDK into the `cwbridge-core` pipeline.
//!
//! ## Modules
//!
//! - [`aws`]: CloudWatch client, shared SDK context and error classification
//! - [`config`]: Run configuration built from command-line arguments

pub mod aws;
pub mod config;
