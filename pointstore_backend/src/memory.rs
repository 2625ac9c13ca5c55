//! A backend that keeps every series in memory.

use crate::{Result, SampleCursor, SeriesDirectory, SeriesReader, SeriesWriter, validate_sample};
use dashmap::DashMap;
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use tracing::debug;

const DEFAULT_READ_BATCH_SIZE: usize = 1_024;

/// Holds each series as a map ordered by timestamp
///
/// Cursors read the map in batches and do not hold any lock between batches, so a series may be
/// written to while it is being read. A cursor always continues strictly after the last sample it
/// yielded.
#[derive(Debug)]
pub struct InMemoryBackend {
    series: DashMap<SeriesId, BTreeMap<Timestamp, Sample>>,
    read_batch_size: usize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_read_batch_size(DEFAULT_READ_BATCH_SIZE)
    }

    /// Create a backend whose cursors fetch `read_batch_size` samples at a time
    pub fn with_read_batch_size(read_batch_size: usize) -> Self {
        Self {
            series: DashMap::new(),
            read_batch_size: read_batch_size.max(1),
        }
    }

    /// Number of samples held for the series
    pub fn sample_count(&self, series_id: SeriesId) -> usize {
        self.series.get(&series_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Every sample of the series, oldest first
    pub fn samples(&self, series_id: SeriesId) -> Vec<Sample> {
        self.series
            .get(&series_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl SeriesReader for InMemoryBackend {
    fn seek(
        &self,
        series_id: SeriesId,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Result<SampleCursor<'_>> {
        let position = match direction {
            Direction::Ascending => Bound::Included(timestamp),
            Direction::Descending => Bound::Excluded(timestamp),
        };
        Ok(Box::new(MemoryCursor {
            backend: self,
            series_id,
            direction,
            position,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }
}

impl SeriesWriter for InMemoryBackend {
    fn write_sample(&self, series_id: SeriesId, sample: Sample) -> Result<()> {
        validate_sample(series_id, &sample)?;
        self.series
            .entry(series_id)
            .or_default()
            .insert(sample.timestamp, sample);
        Ok(())
    }

    fn write_samples(&self, series_id: SeriesId, samples: Vec<Sample>) -> Result<()> {
        for sample in &samples {
            validate_sample(series_id, sample)?;
        }
        let mut series = self.series.entry(series_id).or_default();
        for sample in samples {
            series.insert(sample.timestamp, sample);
        }
        Ok(())
    }

    fn delete_series(&self, series_id: SeriesId) -> Result<u64> {
        let removed = self
            .series
            .remove(&series_id)
            .map(|(_, samples)| samples.len() as u64)
            .unwrap_or(0);
        debug!(%series_id, removed, "deleted series from memory");
        Ok(removed)
    }
}

impl SeriesDirectory for InMemoryBackend {
    fn list_series_ids(&self) -> Result<Vec<SeriesId>> {
        let mut ids: Vec<SeriesId> = self.series.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[derive(Debug)]
struct MemoryCursor<'a> {
    backend: &'a InMemoryBackend,
    series_id: SeriesId,
    direction: Direction,
    /// Where the next batch starts
    position: Bound<Timestamp>,
    buffer: VecDeque<Sample>,
    exhausted: bool,
}

impl MemoryCursor<'_> {
    fn refill(&mut self) {
        let Some(series) = self.backend.series.get(&self.series_id) else {
            self.exhausted = true;
            return;
        };
        let limit = self.backend.read_batch_size;
        let batch: Vec<Sample> = match self.direction {
            Direction::Ascending => series
                .range((self.position, Bound::Unbounded))
                .take(limit)
                .map(|(_, s)| s.clone())
                .collect(),
            Direction::Descending => series
                .range((Bound::Unbounded, self.position))
                .rev()
                .take(limit)
                .map(|(_, s)| s.clone())
                .collect(),
        };
        drop(series);

        if batch.len() < limit {
            self.exhausted = true;
        }
        if let Some(last) = batch.last() {
            self.position = Bound::Excluded(last.timestamp);
        }
        self.buffer.extend(batch);
    }
}

impl Iterator for MemoryCursor<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            self.refill();
        }
        self.buffer.pop_front().map(Ok)
    }
}
