//! Run configuration for the binary
//!
//! Everything here comes from the command line; the metrics configuration
//! file itself is loaded by [`cwbridge_core::MetricsConfig`].

use cwbridge_core::MetricNaming;
use cwbridge_core::defaults::{DEFAULT_PROXY_HOST, DEFAULT_PROXY_PORT};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Wavefront proxy address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROXY_HOST.to_string(),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

impl std::fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyParseError {
    #[error("proxy address is empty")]
    Empty,
    #[error("invalid proxy port '{0}'")]
    InvalidPort(String),
    #[error("unterminated '[' in proxy address '{0}'")]
    UnterminatedBracket(String),
}

impl FromStr for ProxyConfig {
    type Err = ProxyParseError;

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// An unbracketed address with more than one `:` is a bare IPv6 host.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProxyParseError::Empty);
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| ProxyParseError::UnterminatedBracket(s.to_string()))?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => return Err(ProxyParseError::InvalidPort(after.to_string())),
                },
            }
        } else if s.matches(':').count() > 1 {
            (s, None)
        } else {
            match s.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(ProxyParseError::Empty);
        }
        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ProxyParseError::InvalidPort(p.to_string()))?,
            None => DEFAULT_PROXY_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// AWS connection settings
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    /// AWS region (falls back to the SDK's resolution chain)
    pub region: Option<String>,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Output behavior flags
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    /// Print lines to stdout instead of sending them
    pub dry_run: bool,
    /// Leave off the statistic suffix for single-statistic rules
    pub no_suffix_for_single: bool,
    /// Prefix for every emitted metric name
    pub prefix: String,
}

impl RunFlags {
    pub fn naming(&self) -> MetricNaming {
        MetricNaming {
            prefix: self.prefix.clone(),
            no_suffix_for_single: self.no_suffix_for_single,
        }
    }
}

/// Configuration for one `aws-metrics` run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub config_path: PathBuf,
    /// Checkpoint file override
    pub checkpoint: Option<PathBuf>,
    pub proxy: ProxyConfig,
    pub aws: AwsConfig,
    pub flags: RunFlags,
}

/// Default metrics configuration file in the user config directory
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cwbridge").map(|dirs| dirs.config_dir().join("aws-metrics.json"))
}
