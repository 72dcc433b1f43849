//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Distributor - routes form submissions to configured destinations
#[derive(Parser, Debug)]
#[command(
    name = "distributor",
    author,
    version,
    about = "Submission distribution engine",
    long_about = "Distributes submissions to configured outbound routes.\n\n\
                  Each route and pass becomes a job; jobs run right away or are \n\
                  stored for a later `work` sweep, depending on configuration."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DISTRIBUTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DISTRIBUTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (disabled when absent)
    #[arg(long, global = true, env = "DISTRIBUTOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Distribute one submission
    Submit(SubmitArgs),

    /// Run pending jobs of the durable queue
    Work(WorkArgs),

    /// Validate configuration files without distributing
    Validate(ValidateArgs),

    /// List configured end points
    Endpoints(EndpointsArgs),
}

/// Configuration documents, later files override earlier ones
#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to a configuration file (TOML or JSON), repeatable
    #[arg(
        short,
        long = "config",
        default_value = "config.toml",
        env = "DISTRIBUTOR_CONFIG",
        value_delimiter = ','
    )]
    pub configs: Vec<PathBuf>,
}

/// Arguments for the `submit` command
#[derive(Parser, Debug, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// JSON file with the submission fields
    #[arg(short, long)]
    pub data: PathBuf,

    /// Initial context entry (key=value), repeatable
    #[arg(long = "context", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    /// Submit through a configured end point instead of the configuration itself
    #[arg(long)]
    pub end_point: Option<String>,

    /// Durable queue directory
    #[arg(long, default_value = "queue", env = "DISTRIBUTOR_QUEUE_DIR")]
    pub queue_dir: PathBuf,
}

/// Arguments for the `work` command
#[derive(Parser, Debug, Clone)]
pub struct WorkArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Durable queue directory
    #[arg(long, default_value = "queue", env = "DISTRIBUTOR_QUEUE_DIR")]
    pub queue_dir: PathBuf,

    /// Maximum number of jobs to run
    #[arg(long, default_value = "100", env = "DISTRIBUTOR_WORK_LIMIT")]
    pub limit: usize,

    /// After the sweep, delete done and failed jobs older than this many seconds
    #[arg(long, value_name = "SECONDS", env = "DISTRIBUTOR_PRUNE_AFTER")]
    pub prune_after: Option<u64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `endpoints` command
#[derive(Parser, Debug)]
pub struct EndpointsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include disabled end points
    #[arg(long)]
    pub all: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit_args() {
        let cli = Cli::parse_from([
            "distributor",
            "-v",
            "submit",
            "--config",
            "base.toml",
            "--config",
            "site.toml",
            "--data",
            "data.json",
            "--context",
            "gdpr=yes",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Submit(args) = cli.command else {
            panic!("expected submit command");
        };
        assert_eq!(args.config.configs.len(), 2);
        assert_eq!(args.context, vec![("gdpr".to_string(), "yes".to_string())]);
    }

    #[test]
    fn test_parse_work_args() {
        let cli = Cli::parse_from([
            "distributor",
            "work",
            "--queue-dir",
            "jobs",
            "--prune-after",
            "86400",
        ]);
        let Commands::Work(args) = cli.command else {
            panic!("expected work command");
        };
        assert_eq!(args.queue_dir, PathBuf::from("jobs"));
        assert_eq!(args.limit, 100);
        assert_eq!(args.prune_after, Some(86400));
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
