use parking_lot::Mutex;
use pointstore_backend::{
    Error, InMemoryBackend, Result, SampleCursor, SeriesDirectory, SeriesReader, SeriesWriter,
};
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// An in-memory backend that fails on demand
///
/// Failures are armed per series and consumed one per call, so a series armed with two read
/// failures fails its next two seeks and then behaves normally.
#[derive(Debug, Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    read_failures: Mutex<HashMap<SeriesId, usize>>,
    write_failures: Mutex<HashMap<SeriesId, usize>>,
    seek_delay: Option<Duration>,
    seeks: AtomicU64,
    listed: Option<Vec<SeriesId>>,
}

impl FaultyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` on every seek, to keep copies in flight
    pub fn with_seek_delay(mut self, delay: Duration) -> Self {
        self.seek_delay = Some(delay);
        self
    }

    /// List `series_ids` from the directory instead of the series actually stored
    pub fn with_listed_series(mut self, series_ids: Vec<SeriesId>) -> Self {
        self.listed = Some(series_ids);
        self
    }

    /// Fail the next `times` seeks of the series
    pub fn fail_reads(&self, series_id: SeriesId, times: usize) {
        *self.read_failures.lock().entry(series_id).or_default() += times;
    }

    /// Fail the next `times` writes to the series
    pub fn fail_writes(&self, series_id: SeriesId, times: usize) {
        *self.write_failures.lock().entry(series_id).or_default() += times;
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Number of seeks served or failed so far
    pub fn seek_count(&self) -> u64 {
        self.seeks.load(Ordering::Relaxed)
    }

    fn take_failure(
        failures: &Mutex<HashMap<SeriesId, usize>>,
        series_id: SeriesId,
        op: &str,
    ) -> Result<()> {
        let mut failures = failures.lock();
        match failures.get_mut(&series_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                debug!(%series_id, op, remaining = *remaining, "injecting failure");
                Err(Error::unavailable(format!(
                    "injected {op} failure on series {series_id}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl SeriesReader for FaultyBackend {
    fn seek(
        &self,
        series_id: SeriesId,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Result<SampleCursor<'_>> {
        self.seeks.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.seek_delay {
            std::thread::sleep(delay);
        }
        Self::take_failure(&self.read_failures, series_id, "read")?;
        self.inner.seek(series_id, timestamp, direction)
    }
}

impl SeriesWriter for FaultyBackend {
    fn write_sample(&self, series_id: SeriesId, sample: Sample) -> Result<()> {
        Self::take_failure(&self.write_failures, series_id, "write")?;
        self.inner.write_sample(series_id, sample)
    }

    fn write_samples(&self, series_id: SeriesId, samples: Vec<Sample>) -> Result<()> {
        Self::take_failure(&self.write_failures, series_id, "write")?;
        self.inner.write_samples(series_id, samples)
    }

    fn delete_series(&self, series_id: SeriesId) -> Result<u64> {
        self.inner.delete_series(series_id)
    }
}

impl SeriesDirectory for FaultyBackend {
    fn list_series_ids(&self) -> Result<Vec<SeriesId>> {
        match &self.listed {
            Some(listed) => Ok(listed.clone()),
            None => self.inner.list_series_ids(),
        }
    }
}
