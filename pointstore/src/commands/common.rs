use clap::Parser;
use pointstore_backend::{SeriesInfo, SeriesWriter, StaticSeriesRegistry};
use pointstore_types::{Sample, SeriesId, Timestamp, ValueType};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1_000;

/// Shape of the synthetic fleet a command runs against
#[derive(Debug, Clone, Parser)]
pub(crate) struct FleetConfig {
    /// Number of series in the fleet, numbered from 1
    #[clap(long = "series", env = "POINTSTORE_FLEET_SERIES", default_value = "100")]
    pub(crate) series: u32,

    /// Days of history every series starts with
    #[clap(long = "days", env = "POINTSTORE_FLEET_DAYS", default_value = "1")]
    pub(crate) days: u32,

    /// Time between two samples of a series
    #[clap(
        long = "interval",
        env = "POINTSTORE_FLEET_INTERVAL",
        default_value = "5m",
        value_parser = humantime::parse_duration
    )]
    pub(crate) interval: Duration,

    /// Timestamp of the first sample, in milliseconds since the epoch
    #[clap(long = "start", env = "POINTSTORE_FLEET_START", default_value = "1704067200000")]
    pub(crate) start: Timestamp,

    /// Seed of the random walk the sample values follow
    #[clap(long = "seed", env = "POINTSTORE_FLEET_SEED", default_value = "0")]
    pub(crate) seed: u64,
}

impl FleetConfig {
    pub(crate) fn series_ids(&self) -> Vec<SeriesId> {
        (1..=self.series).map(SeriesId::new).collect()
    }

    pub(crate) fn interval_millis(&self) -> i64 {
        i64::try_from(self.interval.as_millis())
            .unwrap_or(i64::MAX)
            .max(1)
    }

    /// Exclusive end of the generated history
    pub(crate) fn end(&self) -> Timestamp {
        self.start
            .saturating_add(MILLIS_PER_DAY.saturating_mul(i64::from(self.days)))
    }

    pub(crate) fn samples_per_series(&self) -> u64 {
        let span = self.end() - self.start;
        let interval = self.interval_millis();
        ((span + interval - 1) / interval) as u64
    }

    /// Write the history of every series to `backend`, returning the number of samples written
    pub(crate) fn populate<W>(&self, backend: &W) -> pointstore_backend::Result<u64>
    where
        W: SeriesWriter + ?Sized,
    {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut written = 0;
        for series_id in self.series_ids() {
            let mut value: f64 = rng.gen_range(0.0..100.0);
            let samples = (self.start..self.end())
                .step_by(self.interval_millis() as usize)
                .map(|timestamp| {
                    value += rng.gen_range(-1.0..1.0);
                    Sample::new(series_id, timestamp, value)
                })
                .collect::<Vec<_>>();
            written += samples.len() as u64;
            backend.write_samples(series_id, samples)?;
        }
        info!(
            series = self.series,
            samples = written,
            "generated synthetic fleet"
        );
        Ok(written)
    }

    pub(crate) fn registry(&self) -> StaticSeriesRegistry {
        StaticSeriesRegistry::new(self.series_ids().into_iter().map(|series_id| SeriesInfo {
            series_id,
            name: format!("point-{series_id}"),
            value_type: ValueType::Numeric,
        }))
    }
}

/// A clap argument provided as a list of items separated by `SEPARATOR`, which by default is a ','
#[derive(Debug, Clone)]
pub(crate) struct SeparatedList<T, const SEPARATOR: char = ','>(pub(crate) Vec<T>);

impl<T, const SEPARATOR: char> FromStr for SeparatedList<T, SEPARATOR>
where
    T: FromStr<Err: Into<anyhow::Error>>,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            s.split(SEPARATOR)
                .map(|s| s.trim().parse::<T>().map_err(Into::into))
                .collect::<Result<Vec<T>, Self::Err>>()?,
        ))
    }
}

impl<T, const SEPARATOR: char> IntoIterator for SeparatedList<T, SEPARATOR> {
    type Item = T;

    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Wait for a SIGTERM or SIGINT to stop the process on UNIX systems
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).expect("failed to register signal handler");
    let mut int = signal(SignalKind::interrupt()).expect("failed to register signal handler");

    tokio::select! {
        _ = term.recv() => info!("Received SIGTERM"),
        _ = int.recv() => info!("Received SIGINT"),
    }
}

/// Wait for a `ctrl+c` to stop the process on Windows systems
#[cfg(windows)]
pub(crate) async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received SIGINT");
}
