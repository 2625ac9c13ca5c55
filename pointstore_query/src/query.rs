use crate::{Error, Result};
use indexmap::IndexSet;
use pointstore_types::{SeriesId, Timestamp};

/// The series a query reads, in the order results are grouped and ties are broken, along with how
/// rows are limited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSelection {
    series_ids: IndexSet<SeriesId>,
    order_by_series: bool,
    limit: Option<usize>,
}

impl SeriesSelection {
    /// Select `series_ids`; a repeated id keeps the position of its first occurrence
    ///
    /// With `order_by_series` the series are emitted one after the other and `limit` caps the rows
    /// of each series. Otherwise all series are merged by time and `limit` caps the total.
    pub fn new(
        series_ids: impl IntoIterator<Item = SeriesId>,
        order_by_series: bool,
        limit: Option<usize>,
    ) -> Result<Self> {
        let series_ids: IndexSet<SeriesId> = series_ids.into_iter().collect();
        if series_ids.is_empty() {
            return Err(Error::NoSeries);
        }
        Ok(Self {
            series_ids,
            order_by_series,
            limit,
        })
    }

    pub fn series_ids(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.series_ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.series_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series_ids.is_empty()
    }

    pub fn order_by_series(&self) -> bool {
        self.order_by_series
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// A span of time, inclusive of `from` and exclusive of `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    from: Timestamp,
    to: Timestamp,
}

impl TimeRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidTimeRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> Timestamp {
        self.from
    }

    pub fn to(&self) -> Timestamp {
        self.to
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.from <= timestamp && timestamp < self.to
    }
}

/// The newest samples strictly before `end_exclusive`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestQuery {
    pub(crate) selection: SeriesSelection,
    pub(crate) end_exclusive: Timestamp,
}

impl LatestQuery {
    pub fn new(
        series_ids: impl IntoIterator<Item = SeriesId>,
        end_exclusive: Timestamp,
        order_by_series: bool,
        limit: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            selection: SeriesSelection::new(series_ids, order_by_series, limit)?,
            end_exclusive,
        })
    }

    pub fn selection(&self) -> &SeriesSelection {
        &self.selection
    }

    pub fn end_exclusive(&self) -> Timestamp {
        self.end_exclusive
    }
}

/// The samples within a time range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub(crate) selection: SeriesSelection,
    pub(crate) range: TimeRange,
}

impl RangeQuery {
    pub fn new(
        series_ids: impl IntoIterator<Item = SeriesId>,
        from: Timestamp,
        to: Timestamp,
        order_by_series: bool,
        limit: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            selection: SeriesSelection::new(series_ids, order_by_series, limit)?,
            range: TimeRange::new(from, to)?,
        })
    }

    pub fn selection(&self) -> &SeriesSelection {
        &self.selection
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }
}

/// The samples within a time range together with the value of every series at both ends
///
/// The limit applies to the rows only, the boundary values are always delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookendQuery {
    pub(crate) selection: SeriesSelection,
    pub(crate) range: TimeRange,
}

impl BookendQuery {
    pub fn new(
        series_ids: impl IntoIterator<Item = SeriesId>,
        from: Timestamp,
        to: Timestamp,
        order_by_series: bool,
        limit: Option<usize>,
    ) -> Result<Self> {
        Ok(Self {
            selection: SeriesSelection::new(series_ids, order_by_series, limit)?,
            range: TimeRange::new(from, to)?,
        })
    }

    pub fn selection(&self) -> &SeriesSelection {
        &self.selection
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_is_rejected() {
        let err = LatestQuery::new(Vec::<SeriesId>::new(), 10, false, None).unwrap_err();
        assert!(matches!(err, Error::NoSeries));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = RangeQuery::new([SeriesId::new(1)], 10, 5, false, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTimeRange { from: 10, to: 5 }));
        assert!(BookendQuery::new([SeriesId::new(1)], 5, 5, false, None).is_ok());
    }

    #[test]
    fn duplicate_ids_keep_first_position() {
        let ids = [3, 1, 3, 2, 1].map(SeriesId::new);
        let selection = SeriesSelection::new(ids, true, Some(2)).unwrap();
        let ordered: Vec<_> = selection.series_ids().map(|s| s.as_u32()).collect();
        assert_eq!(ordered, vec![3, 1, 2]);
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn range_bounds() {
        let range = TimeRange::new(10, 20).unwrap();
        assert!(range.contains(10));
        assert!(range.contains(19));
        assert!(!range.contains(20));
    }
}
