use super::common::{FleetConfig, wait_for_signal};
use anyhow::{Context, bail};
use pointstore_backend::InMemoryBackend;
use pointstore_clap_blocks::{logging::LoggingConfig, migration::MigrationConfig};
use pointstore_migration::{MigratingStore, MigrationCoordinator};
use pointstore_types::{Sample, SeriesId, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    fleet: FleetConfig,

    #[clap(flatten)]
    migration_config: MigrationConfig,

    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,

    /// Rounds of live writes per second while the migration runs, every round writes one sample
    /// to every series. `0` disables live writes.
    #[clap(long = "write-rate", env = "POINTSTORE_WRITE_RATE", default_value = "10")]
    write_rate: u32,
}

pub(crate) async fn command(config: Config) -> anyhow::Result<()> {
    let fleet = config.fleet;
    let secondary = Arc::new(InMemoryBackend::new());
    let primary = Arc::new(InMemoryBackend::new());
    fleet
        .populate(secondary.as_ref())
        .context("generating the fleet")?;

    let mut handle = MigrationCoordinator::new(
        Arc::clone(&secondary) as _,
        Arc::clone(&primary) as _,
        Arc::new(fleet.registry()),
        config.migration_config.migration_config(),
    )
    .start()?;

    let stop = CancellationToken::new();
    let writer = (config.write_rate > 0).then(|| {
        let live = LiveWrites {
            store: handle.store(),
            series_ids: fleet.series_ids(),
            start: fleet.end(),
            period: Duration::from_secs(1) / config.write_rate,
            stop: stop.clone(),
        };
        tokio::task::spawn_blocking(move || live.run())
    });

    let interrupted = tokio::select! {
        _ = handle.wait_for_completion() => false,
        _ = wait_for_signal() => true,
    };
    stop.cancel();
    let written = match writer {
        Some(writer) => writer.await.context("live writer panicked")??,
        None => HashMap::new(),
    };
    let progress = handle.shutdown().await;

    if interrupted {
        warn!(
            remaining = progress.remaining(),
            "migration interrupted, unmigrated series stay on the secondary"
        );
    } else {
        let per_series = fleet.samples_per_series();
        for series_id in fleet.series_ids() {
            let expected = per_series + written.get(&series_id).copied().unwrap_or_default();
            let actual = primary.sample_count(series_id) as u64;
            if actual != expected {
                bail!("series {series_id} has {actual} samples on the primary, expected {expected}");
            }
        }
        info!(
            series = fleet.series,
            live_writes = written.values().sum::<u64>(),
            "verified migrated fleet"
        );
    }

    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}

/// Writes a new sample to every series on a fixed period until stopped
#[derive(Debug)]
struct LiveWrites {
    store: MigratingStore,
    series_ids: Vec<SeriesId>,
    /// Timestamp of the first written sample, one millisecond later every round
    start: Timestamp,
    period: Duration,
    stop: CancellationToken,
}

impl LiveWrites {
    fn run(self) -> pointstore_migration::Result<HashMap<SeriesId, u64>> {
        let mut written = HashMap::with_capacity(self.series_ids.len());
        let mut timestamp = self.start;
        while !self.stop.is_cancelled() {
            for &series_id in &self.series_ids {
                self.store
                    .save(series_id, Sample::new(series_id, timestamp, timestamp as f64))?;
                *written.entry(series_id).or_default() += 1;
            }
            timestamp += 1;
            std::thread::sleep(self.period);
        }
        Ok(written)
    }
}
