use pointstore_backend::{Error, Result, SampleCursor, SeriesReader};
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::collections::HashMap;

/// A read only backend over hand written series
///
/// Unlike the in-memory backend this keeps samples that share a timestamp, in insertion order, so
/// tie handling can be tested. Series that were never added read as empty.
#[derive(Debug, Default, Clone)]
pub struct FixtureReader {
    series: HashMap<SeriesId, Vec<Sample>>,
    /// Cursors of these series fail after yielding the given number of samples
    fail_after: HashMap<SeriesId, usize>,
}

impl FixtureReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric series with one sample per timestamp, valued with its timestamp
    pub fn with_series(self, series_id: SeriesId, timestamps: &[Timestamp]) -> Self {
        self.with_samples(series_id, crate::numeric_samples(series_id, timestamps))
    }

    /// Add samples to a series
    pub fn with_samples(
        mut self,
        series_id: SeriesId,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Self {
        let series = self.series.entry(series_id).or_default();
        series.extend(samples);
        // stable, so equal timestamps keep insertion order
        series.sort_by_key(|s| s.timestamp);
        self
    }

    /// Make every cursor of the series fail once it yielded `samples` samples
    pub fn fail_after(mut self, series_id: SeriesId, samples: usize) -> Self {
        self.fail_after.insert(series_id, samples);
        self
    }
}

impl SeriesReader for FixtureReader {
    fn seek(
        &self,
        series_id: SeriesId,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Result<SampleCursor<'_>> {
        let samples = self.series.get(&series_id).map(Vec::as_slice).unwrap_or_default();
        let selected: Vec<Sample> = match direction {
            Direction::Ascending => samples
                .iter()
                .filter(|s| s.timestamp >= timestamp)
                .cloned()
                .collect(),
            Direction::Descending => samples
                .iter()
                .rev()
                .filter(|s| s.timestamp < timestamp)
                .cloned()
                .collect(),
        };

        let mut items: Vec<Result<Sample>> = selected.into_iter().map(Ok).collect();
        if let Some(&n) = self.fail_after.get(&series_id) {
            if n <= items.len() {
                items.truncate(n);
                items.push(Err(Error::unavailable(format!(
                    "injected read failure on series {series_id}"
                ))));
            }
        }
        Ok(Box::new(items.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_semantics() {
        let id = SeriesId::new(1);
        let reader = FixtureReader::new().with_series(id, &[30, 10, 20]);
        let asc: Vec<_> = reader
            .seek(id, 20, Direction::Ascending)
            .unwrap()
            .map(|s| s.unwrap().timestamp)
            .collect();
        assert_eq!(asc, vec![20, 30]);
        let desc: Vec<_> = reader
            .seek(id, 20, Direction::Descending)
            .unwrap()
            .map(|s| s.unwrap().timestamp)
            .collect();
        assert_eq!(desc, vec![10]);
    }

    #[test]
    fn injected_failure() {
        let id = SeriesId::new(1);
        let reader = FixtureReader::new().with_series(id, &[1, 2, 3]).fail_after(id, 1);
        let mut cursor = reader.seek(id, 0, Direction::Ascending).unwrap();
        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
    }
}
