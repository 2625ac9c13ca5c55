//! CLI config for logging.

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global log subscriber is already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where log lines are written to.
///
/// Commands print their results on stdout, so logs default to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogDestination {
    Stdout,
    #[default]
    Stderr,
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable, single line
    #[default]
    Full,
    /// Human-readable, multi line
    Pretty,
    /// Machine-parseable
    Json,
}

/// CLI config for the logging related subset of options.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,pointstore_query=info` specifies debug logging for all modules
    /// except for the `pointstore_query` module which will only display info
    /// level logging.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", action)]
    pub log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub log_verbose_count: u8,

    /// Logs: destination
    #[clap(
        long = "log-destination",
        env = "LOG_DESTINATION",
        default_value_t = LogDestination::default(),
        value_enum,
        action
    )]
    pub log_destination: LogDestination,

    /// Logs: message format
    #[clap(
        long = "log-format",
        env = "LOG_FORMAT",
        default_value_t = LogFormat::default(),
        value_enum,
        action
    )]
    pub log_format: LogFormat,
}

impl LoggingConfig {
    pub const DEFAULT_LOG_FILTER: &'static str = "warn";

    /// The filter directive the subscriber is installed with
    pub fn filter_directive(&self, default: &str) -> String {
        match self.log_verbose_count {
            0 => self
                .log_filter
                .clone()
                .unwrap_or_else(|| default.to_owned()),
            1 => "info".to_owned(),
            2 => "debug".to_owned(),
            _ => "trace".to_owned(),
        }
    }

    /// Build the formatting layer, filtered by [`filter_directive`](Self::filter_directive)
    pub fn layer(&self, default: &str) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
        let filter = EnvFilter::try_new(self.filter_directive(default))?;
        let writer = match self.log_destination {
            LogDestination::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogDestination::Stderr => BoxMakeWriter::new(std::io::stderr),
        };
        let layer = tracing_subscriber::fmt::layer().with_writer(writer);
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.log_format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer.json().boxed(),
        };
        Ok(layer.with_filter(filter).boxed())
    }

    pub fn install_global_subscriber(&self, default: &str) -> Result<()> {
        tracing_subscriber::registry()
            .with(self.layer(default)?)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_log_verbose_count() {
        let cfg = LoggingConfig::try_parse_from(["cli"]).unwrap();
        assert_eq!(cfg.log_verbose_count, 0);
        assert_eq!(cfg.filter_directive("warn"), "warn");

        let cfg = LoggingConfig::try_parse_from(["cli", "-v"]).unwrap();
        assert_eq!(cfg.filter_directive("warn"), "info");

        let cfg = LoggingConfig::try_parse_from(["cli", "-vv", "--log-filter", "error"]).unwrap();
        assert_eq!(cfg.log_verbose_count, 2);
        assert_eq!(cfg.filter_directive("warn"), "debug");

        let cfg = LoggingConfig::try_parse_from(["cli", "-vvvv"]).unwrap();
        assert_eq!(cfg.filter_directive("warn"), "trace");
    }

    #[test]
    fn test_log_filter() {
        let cfg = LoggingConfig::try_parse_from([
            "cli",
            "--log-filter",
            "debug,pointstore_query=info",
        ])
        .unwrap();
        assert_eq!(cfg.filter_directive("warn"), "debug,pointstore_query=info");
    }

    #[test]
    fn test_destination_and_format() {
        let cfg = LoggingConfig::try_parse_from(["cli"]).unwrap();
        assert_eq!(cfg.log_destination, LogDestination::Stderr);
        assert_eq!(cfg.log_format, LogFormat::Full);

        let cfg = LoggingConfig::try_parse_from([
            "cli",
            "--log-destination",
            "stdout",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cfg.log_destination, LogDestination::Stdout);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.layer(LoggingConfig::DEFAULT_LOG_FILTER).is_ok());

        assert!(LoggingConfig::try_parse_from(["cli", "--log-format", "logfmt"]).is_err());
    }

    #[test]
    fn test_invalid_filter() {
        let cfg = LoggingConfig::try_parse_from(["cli", "--log-filter", "pointstore=loud"]).unwrap();
        assert!(matches!(cfg.layer("warn"), Err(Error::Filter(_))));
    }
}
