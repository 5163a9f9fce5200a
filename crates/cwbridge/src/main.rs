//! cwbridge: relay CloudWatch statistics to a Wavefront proxy
//!
//! Each `aws-metrics` run enumerates CloudWatch metrics, fetches the
//! statistics selected by the configuration file for the window since the
//! last run, and writes them to the proxy in the Wavefront line protocol.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cwbridge::aws::{AwsContext, CloudWatchClient, FromAwsContext};
use cwbridge::config::{self, ProxyConfig, RunConfig};
use cwbridge_core::{
    CheckpointStore, DryRunSink, MetricSink, MetricsConfig, Pipeline, PipelineOptions, ProxySink,
    RunReport,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cwbridge")]
#[command(about = "Relay CloudWatch statistics to a Wavefront proxy")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Arguments for the aws-metrics command
#[derive(clap::Args, Debug)]
struct AwsMetricsArgs {
    /// Metrics configuration file
    /// (default: aws-metrics.json in the user config directory)
    #[arg(short, long, env = "CWBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Wavefront proxy address as host[:port]
    #[arg(long, default_value = "127.0.0.1:2878")]
    proxy: ProxyConfig,

    /// Print lines to stdout instead of sending them to the proxy
    #[arg(long)]
    dry_run: bool,

    /// Omit the statistic suffix when a rule selects a single statistic
    #[arg(long)]
    no_suffix_for_single: bool,

    /// Prefix for every emitted metric name
    #[arg(long, default_value = "")]
    prefix: String,

    /// Checkpoint file (overrides the configuration file)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// AWS region (default: resolved from the environment and AWS config)
    #[arg(long)]
    region: Option<String>,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,
}

impl AwsMetricsArgs {
    fn into_run_config(self) -> Result<RunConfig> {
        let config_path = match self.config.clone() {
            Some(path) => path,
            None => config::default_config_path()
                .context("Failed to get project directories; pass --config")?,
        };
        Ok(RunConfig {
            config_path,
            ..RunConfig::from(self)
        })
    }
}

impl From<AwsMetricsArgs> for RunConfig {
    fn from(args: AwsMetricsArgs) -> Self {
        Self {
            config_path: args.config.unwrap_or_default(),
            checkpoint: args.checkpoint,
            proxy: args.proxy,
            aws: config::AwsConfig {
                region: args.region,
                aws_profile: args.aws_profile,
            },
            flags: config::RunFlags {
                dry_run: args.dry_run,
                no_suffix_for_single: args.no_suffix_for_single,
                prefix: args.prefix,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay one window of CloudWatch statistics
    AwsMetrics(Box<AwsMetricsArgs>),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    // Only print backtrace hint if not already showing
    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Reduce noise from the AWS SDK (show only warnings and errors)
    let mut filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    for target in ["aws_config", "aws_smithy_runtime", "aws_sdk_cloudwatch", "hyper"] {
        filter = filter.add_directive(format!("{target}=warn").parse()?);
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    match args.command {
        Command::AwsMetrics(metrics_args) => {
            let config = metrics_args.into_run_config()?;
            let report = aws_metrics(config).await?;
            report.print_summary();
            if !report.is_clean() {
                warn!(
                    failed = report.failures.len(),
                    rejected = report.points_rejected,
                    "Run finished with fetch failures or rejected points"
                );
            }
        }
    }

    Ok(())
}

async fn aws_metrics(config: RunConfig) -> Result<RunReport> {
    let metrics = MetricsConfig::load(&config.config_path)?;
    let matcher = metrics.rule_matcher()?;
    let resolver = metrics.source_resolver();

    let checkpoint_path = config
        .checkpoint
        .clone()
        .unwrap_or_else(|| metrics.checkpoint_path_for(&config.config_path));
    let store = CheckpointStore::new(checkpoint_path, metrics.delay_minutes);

    if let Some(profile) = &config.aws.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::with_profile(config.aws.region.as_deref(), config.aws.aws_profile.as_deref())
        .await;
    let cloudwatch = CloudWatchClient::from_context(&aws);

    info!(
        config = %config.config_path.display(),
        checkpoint = %store.path().display(),
        region = ?aws.region(),
        rules = matcher.len(),
        proxy = %config.proxy,
        dry_run = config.flags.dry_run,
        "Starting aws-metrics run"
    );

    let options = PipelineOptions::from_config(&metrics, config.flags.naming());
    let pipeline = Pipeline::new(&cloudwatch, &matcher, &resolver, &store, options);

    if config.flags.dry_run {
        let mut sink = DryRunSink::stdout(&config.proxy.host, config.proxy.port);
        execute(&pipeline, &mut sink).await
    } else {
        let mut sink = ProxySink::new(config.proxy.host.as_str(), config.proxy.port);
        execute(&pipeline, &mut sink).await
    }
}

async fn execute<S: MetricSink>(
    pipeline: &Pipeline<'_, CloudWatchClient>,
    sink: &mut S,
) -> Result<RunReport> {
    let report = pipeline
        .run(sink, chrono::Utc::now())
        .await
        .context("aws-metrics run failed")?;
    Ok(report)
}
