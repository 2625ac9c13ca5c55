//! CLI config for migrating series between backends.

use pointstore_migration::RetryBackoff;
use std::{num::NonZeroUsize, time::Duration};

/// CLI config for the series migration
#[derive(Debug, Clone, clap::Parser)]
pub struct MigrationConfig {
    /// Number of series copied concurrently.
    #[clap(
        long = "migration-threads",
        env = "POINTSTORE_MIGRATION_THREADS",
        default_value = "4",
        action
    )]
    pub worker_count: NonZeroUsize,

    /// Number of samples written to the primary backend in one write.
    #[clap(
        long = "migration-batch-size",
        env = "POINTSTORE_MIGRATION_BATCH_SIZE",
        default_value = "5000",
        action
    )]
    pub batch_size: NonZeroUsize,

    /// Delay before a series that failed to copy is retried.
    ///
    /// Doubles with every failed attempt of the series. `0s` retries immediately.
    #[clap(
        long = "migration-retry-backoff",
        env = "POINTSTORE_MIGRATION_RETRY_BACKOFF",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub retry_backoff: Duration,

    /// Upper bound of the retry delay.
    #[clap(
        long = "migration-retry-backoff-max",
        env = "POINTSTORE_MIGRATION_RETRY_BACKOFF_MAX",
        default_value = "1m",
        value_parser = humantime::parse_duration
    )]
    pub retry_backoff_max: Duration,

    /// How long a shutdown waits for in-flight series before abandoning them.
    #[clap(
        long = "migration-shutdown-timeout",
        env = "POINTSTORE_MIGRATION_SHUTDOWN_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub shutdown_timeout: Duration,

    /// How often migration progress is logged, `0s` disables progress logging.
    #[clap(
        long = "migration-progress-interval",
        env = "POINTSTORE_MIGRATION_PROGRESS_INTERVAL",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub progress_interval: Duration,
}

impl MigrationConfig {
    pub fn migration_config(&self) -> pointstore_migration::MigrationConfig {
        pointstore_migration::MigrationConfig {
            worker_count: self.worker_count.get(),
            batch_size: self.batch_size.get(),
            retry_backoff: RetryBackoff::new(self.retry_backoff, self.retry_backoff_max),
            shutdown_timeout: self.shutdown_timeout,
            progress_interval: (!self.progress_interval.is_zero()).then_some(self.progress_interval),
        }
    }
}
