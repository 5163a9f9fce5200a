//! Typed errors for each pipeline stage
//!
//! Configuration, lock and sink errors are fatal to a run. Per-metric
//! [`FetchError`]s are recorded and the run continues unless the failure
//! policy says otherwise. A corrupt checkpoint is recovered from.

use std::io;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse JSON configuration
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A rule pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule entry has the wrong shape
    #[error("Invalid rule '{pattern}': {message}")]
    InvalidRule { pattern: String, message: String },

    /// Field-level validation failed
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Checkpoint persistence errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Checkpoint file exists but could not be read
    #[error("Failed to read checkpoint '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Checkpoint file content is not a valid checkpoint
    #[error("Corrupt checkpoint '{path}': {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Checkpoint could not be written
    #[error("Failed to write checkpoint '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Another run holds the checkpoint lock
    #[error("Checkpoint '{path}' is locked by another run")]
    Locked { path: String },

    /// Lock file could not be opened
    #[error("Failed to lock checkpoint '{path}': {source}")]
    Lock {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Upstream enumeration or statistics failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded: {0}")]
    Throttled(String),

    /// Request timed out or the connection dropped (retryable)
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other API error
    #[error("API error{}: {message}", code_suffix(.code))]
    Api {
        code: Option<String>,
        message: String,
    },
}

impl FetchError {
    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Timeout(_))
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            code: None,
            message: message.into(),
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Telemetry sink errors
#[derive(Debug, Error)]
pub enum EmitError {
    /// Proxy is unreachable
    #[error("Failed to connect to proxy {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Writing or flushing a line failed
    #[error("Failed to write to proxy: {0}")]
    Write(#[from] io::Error),
}

/// A data point that cannot be represented on the wire
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormatError {
    #[error("Non-finite value {value} for {metric}")]
    NonFinite { metric: String, value: f64 },
}

/// Fatal run errors; the checkpoint is never advanced when one occurs
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Metric enumeration failed part way through
    #[error("Metric enumeration failed")]
    Enumeration(#[source] FetchError),

    /// Statistics fetch failed under the abort policy
    #[error("Statistics fetch for {metric} failed")]
    Fetch {
        metric: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Emit(#[from] EmitError),
}
