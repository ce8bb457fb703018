use std::{path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;

use crate::{
    pipeline::PipelineOptions,
    processing::{IngestionSettings, MalformedPolicy},
    report::DEFAULT_TOP_N,
};

/// Aggregates traffic sensor records and reports the most congested lights.
#[derive(Parser, Debug)]
#[command(name = "traffic-aggregator", version)]
pub struct Cli {
    /// Record files (`timestamp,light,count` per line). Each file is read by its
    /// own ingestion thread.
    #[arg(env = "TRAFFIC_SOURCES", value_delimiter = ',', default_value = "traffic_data.txt")]
    pub sources: Vec<PathBuf>,

    /// Number of lights in the final ranking.
    #[arg(long, env = "TOP_N", default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// Simulated delay before each record is enqueued, in milliseconds.
    #[arg(long, env = "PRODUCER_DELAY_MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// How lines that do not parse are handled.
    #[arg(long, env = "MALFORMED_POLICY", value_enum, default_value_t = MalformedPolicy::Skip)]
    pub malformed: MalformedPolicy,

    /// Bound the shared queue. Unbounded when not set.
    #[arg(long, env = "QUEUE_CAPACITY")]
    pub capacity: Option<usize>,

    /// Number of aggregation threads.
    #[arg(long, env = "AGGREGATORS", default_value_t = 1)]
    pub aggregators: usize,

    /// Only print failures and the final ranking.
    #[arg(long, env = "QUIET")]
    pub quiet: bool,

    /// Also write the final ranking as JSON to this path.
    #[arg(long, env = "REPORT_JSON")]
    pub report_json: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one record source is required")]
    NoSources,
    #[error("at least one aggregation thread is required")]
    NoAggregators,
    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub sources: Vec<PathBuf>,
    pub pipeline: PipelineOptions,
    pub quiet: bool,
    pub report_json: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl Configuration {
    pub fn from_args() -> Result<Configuration, ConfigError> {
        Configuration::try_from(Cli::parse())
    }
}

impl TryFrom<Cli> for Configuration {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if cli.aggregators == 0 {
            return Err(ConfigError::NoAggregators);
        }
        if cli.capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(Configuration {
            sources: cli.sources,
            pipeline: PipelineOptions {
                top_n: cli.top_n,
                ingestion: IngestionSettings {
                    delay: Duration::from_millis(cli.delay_ms),
                    policy: cli.malformed,
                },
                capacity: cli.capacity,
                aggregators: cli.aggregators,
            },
            quiet: cli.quiet,
            report_json: cli.report_json,
            metrics_port: cli.metrics_port,
        })
    }
}

#[cfg(test)]
mod test {
    use std::{path::PathBuf, time::Duration};

    use clap::{CommandFactory, Parser};

    use crate::processing::MalformedPolicy;

    use super::{Cli, ConfigError, Configuration};

    fn cli() -> Cli {
        Cli {
            sources: vec![PathBuf::from("traffic_data.txt")],
            top_n: 5,
            delay_ms: 0,
            malformed: MalformedPolicy::Skip,
            capacity: None,
            aggregators: 1,
            quiet: false,
            report_json: None,
            metrics_port: None,
        }
    }

    fn default_value(id: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_default_values().first())
            .map(|value| value.to_string_lossy().into_owned())
    }

    #[test]
    fn test_declared_defaults() {
        assert_eq!(default_value("sources").as_deref(), Some("traffic_data.txt"));
        assert_eq!(default_value("top_n").as_deref(), Some("5"));
        assert_eq!(default_value("delay_ms").as_deref(), Some("0"));
        assert_eq!(default_value("malformed").as_deref(), Some("skip"));
        assert_eq!(default_value("aggregators").as_deref(), Some("1"));
        assert_eq!(default_value("capacity"), None);
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::try_from(cli()).unwrap();
        assert_eq!(config.sources, vec![PathBuf::from("traffic_data.txt")]);
        assert_eq!(config.pipeline.top_n, 5);
        assert_eq!(config.pipeline.aggregators, 1);
        assert_eq!(config.pipeline.capacity, None);
        assert_eq!(config.pipeline.ingestion.delay, Duration::ZERO);
        assert_eq!(config.pipeline.ingestion.policy, MalformedPolicy::Skip);
        assert!(!config.quiet);
    }

    #[test]
    fn test_explicit_arguments() {
        // Every asserted field is given on the command line, so environment
        // fallbacks cannot change the outcome.
        let cli = Cli::try_parse_from([
            "traffic-aggregator",
            "a.txt",
            "b.txt",
            "--top-n",
            "3",
            "--delay-ms",
            "250",
            "--malformed",
            "abort",
            "--capacity",
            "16",
            "--aggregators",
            "4",
            "--quiet",
        ])
        .unwrap();
        let config = Configuration::try_from(cli).unwrap();

        assert_eq!(
            config.sources,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
        assert_eq!(config.pipeline.top_n, 3);
        assert_eq!(config.pipeline.ingestion.delay, Duration::from_millis(250));
        assert_eq!(config.pipeline.ingestion.policy, MalformedPolicy::Abort);
        assert_eq!(config.pipeline.capacity, Some(16));
        assert_eq!(config.pipeline.aggregators, 4);
        assert!(config.quiet);
    }

    #[test]
    fn test_rejects_empty_sources() {
        let cli = Cli {
            sources: vec![],
            ..cli()
        };
        assert_eq!(
            Configuration::try_from(cli).unwrap_err(),
            ConfigError::NoSources
        );
    }

    #[test]
    fn test_rejects_zero_aggregators() {
        let cli = Cli {
            aggregators: 0,
            ..cli()
        };
        assert_eq!(
            Configuration::try_from(cli).unwrap_err(),
            ConfigError::NoAggregators
        );
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let cli = Cli {
            capacity: Some(0),
            ..cli()
        };
        assert_eq!(
            Configuration::try_from(cli).unwrap_err(),
            ConfigError::ZeroCapacity
        );
    }
}
