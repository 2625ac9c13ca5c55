use crate::merge::{Lane, Merge, MergeStep};
use crate::{LatestQuery, RangeQuery, Result, SeriesSelection};
use pointstore_backend::SeriesReader;
use pointstore_types::{Direction, Sample};
use serde::Serialize;

/// A sample delivered by a latest or range query, with its position in the query's output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub index: u64,
    pub sample: Sample,
}

/// The rows of a latest or range query, in delivery order
///
/// The stream ends after the first error.
#[derive(Debug)]
pub struct RowStream<'a> {
    merge: Merge<'a>,
    next_index: u64,
    done: bool,
}

impl<'a> RowStream<'a> {
    fn new(merge: Merge<'a>) -> Self {
        Self {
            merge,
            next_index: 0,
            done: false,
        }
    }
}

impl Iterator for RowStream<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.merge.next_step() {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(MergeStep::Finished) => {
                    self.done = true;
                    return None;
                }
                Ok(MergeStep::LaneFinished { .. }) => continue,
                Ok(MergeStep::Row { sample, .. }) => {
                    let index = self.next_index;
                    self.next_index += 1;
                    return Some(Ok(Row { index, sample }));
                }
            }
        }
    }
}

fn open_lanes<'a, R>(
    reader: &'a R,
    selection: &SeriesSelection,
    seek: i64,
    direction: Direction,
    upper_bound: Option<i64>,
) -> Result<Vec<Lane<'a>>>
where
    R: SeriesReader + ?Sized,
{
    selection
        .series_ids()
        .map(|series_id| Lane::open(reader, series_id, seek, direction, upper_bound))
        .collect()
}

/// Stream the newest samples before the query's end time, newest first
pub fn latest<'a, R>(reader: &'a R, query: &LatestQuery) -> Result<RowStream<'a>>
where
    R: SeriesReader + ?Sized,
{
    let selection = &query.selection;
    let lanes = open_lanes(
        reader,
        selection,
        query.end_exclusive,
        Direction::Descending,
        None,
    )?;
    Ok(RowStream::new(Merge::new(
        lanes,
        Direction::Descending,
        selection.order_by_series(),
        selection.limit(),
    )))
}

/// Stream the samples within the query's time range, oldest first
pub fn range<'a, R>(reader: &'a R, query: &RangeQuery) -> Result<RowStream<'a>>
where
    R: SeriesReader + ?Sized,
{
    let selection = &query.selection;
    let lanes = open_lanes(
        reader,
        selection,
        query.range.from(),
        Direction::Ascending,
        Some(query.range.to()),
    )?;
    Ok(RowStream::new(Merge::new(
        lanes,
        Direction::Ascending,
        selection.order_by_series(),
        selection.limit(),
    )))
}
