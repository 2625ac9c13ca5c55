use crate::merge::{Lane, Merge, MergeStep};
use crate::{BookendQuery, Error, Result, TimeRange};
use pointstore_backend::SeriesReader;
use pointstore_types::{Direction, Sample, SeriesId};
use serde::Serialize;

/// An event of a bookend query
///
/// For every series exactly one `First` precedes its rows and exactly one `Last` follows them.
/// `is_bookend` is set when the sample was not recorded at the boundary timestamp itself but
/// stands in for the value in effect there.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookendEvent {
    First {
        index: u64,
        sample: Sample,
        is_bookend: bool,
    },
    Row {
        index: u64,
        sample: Sample,
    },
    Last {
        index: u64,
        sample: Sample,
        is_bookend: bool,
    },
}

impl BookendEvent {
    pub fn index(&self) -> u64 {
        match self {
            Self::First { index, .. } | Self::Row { index, .. } | Self::Last { index, .. } => *index,
        }
    }

    pub fn sample(&self) -> &Sample {
        match self {
            Self::First { sample, .. } | Self::Row { sample, .. } | Self::Last { sample, .. } => {
                sample
            }
        }
    }

    pub fn into_sample(self) -> Sample {
        match self {
            Self::First { sample, .. } | Self::Row { sample, .. } | Self::Last { sample, .. } => {
                sample
            }
        }
    }

    pub fn is_bookend(&self) -> bool {
        match self {
            Self::First { is_bookend, .. } | Self::Last { is_bookend, .. } => *is_bookend,
            Self::Row { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    First(usize),
    Rows,
    Last(usize),
    Done,
}

/// The events of a bookend query, in delivery order
///
/// All `First` events come first, in query order. When ordering by series, each series' rows are
/// followed by its `Last` event; otherwise the rows of all series are merged by time and the
/// `Last` events follow in query order.
#[derive(Debug)]
pub struct BookendStream<'a> {
    merge: Merge<'a>,
    /// Value at `from` per lane and whether it is a bookend
    firsts: Vec<(Sample, bool)>,
    range: TimeRange,
    order_by_series: bool,
    phase: Phase,
    next_index: u64,
}

impl BookendStream<'_> {
    fn next_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn first_event(&mut self, lane: usize) -> BookendEvent {
        let (sample, is_bookend) = self.firsts[lane].clone();
        BookendEvent::First {
            index: self.next_index(),
            sample,
            is_bookend,
        }
    }

    /// The value of a lane at `to`
    ///
    /// A lane cut short by the limit repeats the last row it delivered, as nothing is known about
    /// the samples that were not read. Otherwise a sample recorded exactly at `to` is used as is,
    /// and failing that the value in effect is carried forward to `to`.
    fn last_event(&mut self, lane: usize) -> BookendEvent {
        let to = self.range.to();
        let l = self.merge.lane(lane);
        let (sample, is_bookend) = match l.overflow() {
            Some(at_to) if !l.has_more() && at_to.timestamp == to => (at_to.clone(), false),
            _ => {
                let carried = l.last_emitted().unwrap_or(&self.firsts[lane].0);
                (carried.clone().with_timestamp(to), true)
            }
        };
        BookendEvent::Last {
            index: self.next_index(),
            sample,
            is_bookend,
        }
    }
}

impl Iterator for BookendStream<'_> {
    type Item = Result<BookendEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::First(lane) if lane < self.firsts.len() => {
                    self.phase = Phase::First(lane + 1);
                    return Some(Ok(self.first_event(lane)));
                }
                Phase::First(_) => self.phase = Phase::Rows,
                Phase::Rows => match self.merge.next_step() {
                    Err(e) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                    Ok(MergeStep::Row { sample, .. }) => {
                        return Some(Ok(BookendEvent::Row {
                            index: self.next_index(),
                            sample,
                        }));
                    }
                    Ok(MergeStep::LaneFinished { lane }) => {
                        return Some(Ok(self.last_event(lane)));
                    }
                    Ok(MergeStep::Finished) if self.order_by_series => self.phase = Phase::Done,
                    Ok(MergeStep::Finished) => self.phase = Phase::Last(0),
                },
                Phase::Last(lane) if lane < self.merge.lane_count() => {
                    self.phase = Phase::Last(lane + 1);
                    return Some(Ok(self.last_event(lane)));
                }
                Phase::Last(_) => self.phase = Phase::Done,
                Phase::Done => return None,
            }
        }
    }
}

/// Open the lane of one series positioned after `from`, and find its value at `from`
///
/// A sample recorded exactly at `from` is the first value itself and is not repeated as a row. If
/// several samples share that timestamp the first one the backend yields is used.
fn open_lane<'a, R>(
    reader: &'a R,
    series_id: SeriesId,
    range: TimeRange,
) -> Result<(Lane<'a>, (Sample, bool))>
where
    R: SeriesReader + ?Sized,
{
    let from = range.from();
    let cursor = reader
        .seek(series_id, from, Direction::Ascending)
        .map_err(Error::backend(series_id))?;
    let mut lane = Lane::new(series_id, cursor, Some(range.to()));

    let mut exact = None;
    while let Some(sample) = lane.pull()? {
        if sample.timestamp == from {
            exact.get_or_insert(sample);
        } else {
            lane.offer(sample);
            break;
        }
    }

    let first = match exact {
        Some(sample) => (sample, false),
        None => {
            let prior = reader
                .seek(series_id, from, Direction::Descending)
                .map_err(Error::backend(series_id))?
                .next()
                .transpose()
                .map_err(Error::backend(series_id))?;
            match prior {
                Some(sample) => (sample.with_timestamp(from), true),
                None => (Sample::null(series_id, from), true),
            }
        }
    };
    Ok((lane, first))
}

/// Stream the samples strictly inside the query's time range framed by the value of each series at
/// both ends
pub fn bookend<'a, R>(reader: &'a R, query: &BookendQuery) -> Result<BookendStream<'a>>
where
    R: SeriesReader + ?Sized,
{
    let selection = &query.selection;
    let (lanes, firsts): (Vec<_>, Vec<_>) = selection
        .series_ids()
        .map(|series_id| open_lane(reader, series_id, query.range))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .unzip();
    debug_assert!(lanes.iter().zip(selection.series_ids()).all(|(l, id)| l.series_id() == id));

    Ok(BookendStream {
        merge: Merge::new(
            lanes,
            Direction::Ascending,
            selection.order_by_series(),
            selection.limit(),
        ),
        firsts,
        range: query.range,
        order_by_series: selection.order_by_series(),
        phase: Phase::First(0),
        next_index: 0,
    })
}
