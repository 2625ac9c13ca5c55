//! Fixtures shared by the test suites of the pointstore crates.

mod faulty;
mod fixture;

pub use faulty::FaultyBackend;
pub use fixture::FixtureReader;

use pointstore_backend::SeriesWriter;
use pointstore_types::{Sample, SeriesId, Timestamp};

/// Samples of a numeric series at the given timestamps, each valued with its own timestamp
pub fn numeric_samples(series_id: SeriesId, timestamps: &[Timestamp]) -> Vec<Sample> {
    timestamps
        .iter()
        .map(|t| Sample::new(series_id, *t, *t as f64))
        .collect()
}

/// Samples every `interval` from `start` (inclusive) to `end` (exclusive)
pub fn regular_samples(
    series_id: SeriesId,
    start: Timestamp,
    end: Timestamp,
    interval: Timestamp,
) -> Vec<Sample> {
    assert!(interval > 0, "interval must be positive");
    (0..)
        .map(|i| start + i * interval)
        .take_while(|t| *t < end)
        .map(|t| Sample::new(series_id, t, t as f64))
        .collect()
}

/// Write `timestamps` to a series, panicking on failure
pub fn seed_series<W>(writer: &W, series_id: SeriesId, timestamps: &[Timestamp])
where
    W: SeriesWriter + ?Sized,
{
    writer
        .write_samples(series_id, numeric_samples(series_id, timestamps))
        .expect("seeding a test series");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_samples_are_half_open() {
        let samples = regular_samples(SeriesId::new(1), 0, 20, 5);
        let ts: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![0, 5, 10, 15]);
    }
}
