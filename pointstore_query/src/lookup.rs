//! Single value lookups on one series.
//!
//! These answer the point questions asked around the range queries, e.g., "what was the value at
//! 08:00" or "when did this series start recording", by reading at most a handful of samples.

use crate::{Error, Result, TimeRange};
use pointstore_backend::SeriesReader;
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};

fn first<R>(
    reader: &R,
    series_id: SeriesId,
    timestamp: Timestamp,
    direction: Direction,
) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    reader
        .seek(series_id, timestamp, direction)
        .map_err(Error::backend(series_id))?
        .next()
        .transpose()
        .map_err(Error::backend(series_id))
}

/// The newest sample strictly before `timestamp`
pub fn value_before<R>(reader: &R, series_id: SeriesId, timestamp: Timestamp) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    first(reader, series_id, timestamp, Direction::Descending)
}

/// The sample at `timestamp`, or the newest one before it
pub fn value_at_or_before<R>(
    reader: &R,
    series_id: SeriesId,
    timestamp: Timestamp,
) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    match value_at(reader, series_id, timestamp)? {
        Some(sample) => Ok(Some(sample)),
        None => value_before(reader, series_id, timestamp),
    }
}

/// The sample recorded exactly at `timestamp`
pub fn value_at<R>(reader: &R, series_id: SeriesId, timestamp: Timestamp) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    Ok(value_after(reader, series_id, timestamp)?.filter(|s| s.timestamp == timestamp))
}

/// The oldest sample at or after `timestamp`
pub fn value_after<R>(reader: &R, series_id: SeriesId, timestamp: Timestamp) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    first(reader, series_id, timestamp, Direction::Ascending)
}

/// The newest sample of the series
pub fn latest_value<R>(reader: &R, series_id: SeriesId) -> Result<Option<Sample>>
where
    R: SeriesReader + ?Sized,
{
    // a descending cursor excludes its seek point, so i64::MAX itself is never returned
    match first(reader, series_id, Timestamp::MAX, Direction::Descending)? {
        Some(sample) => Ok(Some(sample)),
        None => value_at(reader, series_id, Timestamp::MAX),
    }
}

/// Number of samples of the series within `range`
pub fn count_in_range<R>(reader: &R, series_id: SeriesId, range: TimeRange) -> Result<u64>
where
    R: SeriesReader + ?Sized,
{
    let mut count = 0;
    for sample in reader
        .seek(series_id, range.from(), Direction::Ascending)
        .map_err(Error::backend(series_id))?
    {
        let sample = sample.map_err(Error::backend(series_id))?;
        if sample.timestamp >= range.to() {
            break;
        }
        count += 1;
    }
    Ok(count)
}

/// The timestamp of the oldest sample across all of the given series
pub fn inception_timestamp<R>(
    reader: &R,
    series_ids: impl IntoIterator<Item = SeriesId>,
) -> Result<Option<Timestamp>>
where
    R: SeriesReader + ?Sized,
{
    let mut earliest: Option<Timestamp> = None;
    for series_id in series_ids {
        if let Some(sample) = value_after(reader, series_id, Timestamp::MIN)? {
            earliest = Some(earliest.map_or(sample.timestamp, |e| e.min(sample.timestamp)));
        }
    }
    Ok(earliest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointstore_test_helpers::FixtureReader;

    const S: SeriesId = SeriesId::new(1);

    fn ts(sample: Option<Sample>) -> Option<i64> {
        sample.map(|s| s.timestamp)
    }

    #[test]
    fn point_lookups() {
        let reader = FixtureReader::new().with_series(S, &[10, 20, 30]);
        assert_eq!(ts(value_before(&reader, S, 20).unwrap()), Some(10));
        assert_eq!(ts(value_before(&reader, S, 10).unwrap()), None);
        assert_eq!(ts(value_at_or_before(&reader, S, 20).unwrap()), Some(20));
        assert_eq!(ts(value_at_or_before(&reader, S, 25).unwrap()), Some(20));
        assert_eq!(ts(value_at(&reader, S, 20).unwrap()), Some(20));
        assert_eq!(ts(value_at(&reader, S, 21).unwrap()), None);
        assert_eq!(ts(value_after(&reader, S, 21).unwrap()), Some(30));
        assert_eq!(ts(value_after(&reader, S, 31).unwrap()), None);
        assert_eq!(ts(latest_value(&reader, S).unwrap()), Some(30));
    }

    #[test]
    fn counts_and_inception() {
        let reader = FixtureReader::new()
            .with_series(S, &[10, 20, 30])
            .with_series(SeriesId::new(2), &[5, 40]);
        let range = TimeRange::new(10, 30).unwrap();
        assert_eq!(count_in_range(&reader, S, range).unwrap(), 2);
        assert_eq!(
            inception_timestamp(&reader, [S, SeriesId::new(2), SeriesId::new(3)]).unwrap(),
            Some(5)
        );
        assert_eq!(inception_timestamp(&reader, [SeriesId::new(3)]).unwrap(), None);
    }

    #[test]
    fn empty_series() {
        let reader = FixtureReader::new();
        assert!(latest_value(&reader, S).unwrap().is_none());
        assert_eq!(count_in_range(&reader, S, TimeRange::new(0, 100).unwrap()).unwrap(), 0);
    }
}
