//! K-way merge over per-series cursors.

use crate::{Error, Result};
use pointstore_backend::{SampleCursor, SeriesReader};
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt::Debug;

/// The cursor of one series in a query, with a one sample lookahead
pub(crate) struct Lane<'a> {
    series_id: SeriesId,
    cursor: SampleCursor<'a>,
    /// Exclusive upper bound on timestamps, only used when reading in ascending order
    upper_bound: Option<Timestamp>,
    /// The next sample to emit
    head: Option<Sample>,
    /// The first sample read at or beyond `upper_bound`
    overflow: Option<Sample>,
    /// Error hit while reading ahead, surfaced after the preceding sample has been emitted
    error: Option<Error>,
    done: bool,
    emitted: usize,
    last_emitted: Option<Sample>,
}

impl Debug for Lane<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("series_id", &self.series_id)
            .field("upper_bound", &self.upper_bound)
            .field("head", &self.head)
            .field("overflow", &self.overflow)
            .field("done", &self.done)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl<'a> Lane<'a> {
    /// A lane whose cursor has not been read from yet
    pub(crate) fn new(
        series_id: SeriesId,
        cursor: SampleCursor<'a>,
        upper_bound: Option<Timestamp>,
    ) -> Self {
        Self {
            series_id,
            cursor,
            upper_bound,
            head: None,
            overflow: None,
            error: None,
            done: false,
            emitted: 0,
            last_emitted: None,
        }
    }

    /// Seek the series and read its first sample
    pub(crate) fn open<R>(
        reader: &'a R,
        series_id: SeriesId,
        seek: Timestamp,
        direction: Direction,
        upper_bound: Option<Timestamp>,
    ) -> Result<Self>
    where
        R: SeriesReader + ?Sized,
    {
        let cursor = reader
            .seek(series_id, seek, direction)
            .map_err(Error::backend(series_id))?;
        let mut lane = Self::new(series_id, cursor, upper_bound);
        lane.advance();
        match lane.error.take() {
            Some(e) => Err(e),
            None => Ok(lane),
        }
    }

    /// Read the next raw sample from the cursor, ignoring the upper bound
    pub(crate) fn pull(&mut self) -> Result<Option<Sample>> {
        if self.done {
            return Ok(None);
        }
        match self.cursor.next() {
            None => {
                self.done = true;
                Ok(None)
            }
            Some(Ok(sample)) => Ok(Some(sample)),
            Some(Err(source)) => {
                self.done = true;
                Err(Error::Backend {
                    series_id: self.series_id,
                    source,
                })
            }
        }
    }

    /// Make `sample` the next head, or park it as the overflow if it is out of bounds
    pub(crate) fn offer(&mut self, sample: Sample) {
        if self.upper_bound.is_some_and(|bound| sample.timestamp >= bound) {
            self.overflow = Some(sample);
            self.done = true;
        } else {
            self.head = Some(sample);
        }
    }

    fn advance(&mut self) {
        match self.pull() {
            Ok(Some(sample)) => self.offer(sample),
            Ok(None) => {}
            Err(e) => self.error = Some(e),
        }
    }

    /// Emit the head and read the next one
    fn take(&mut self) -> Option<Sample> {
        let sample = self.head.take()?;
        self.emitted += 1;
        self.last_emitted = Some(sample.clone());
        self.advance();
        Some(sample)
    }

    pub(crate) fn series_id(&self) -> SeriesId {
        self.series_id
    }

    /// Whether the lane still has samples in range that have not been emitted
    pub(crate) fn has_more(&self) -> bool {
        self.head.is_some()
    }

    pub(crate) fn overflow(&self) -> Option<&Sample> {
        self.overflow.as_ref()
    }

    pub(crate) fn last_emitted(&self) -> Option<&Sample> {
        self.last_emitted.as_ref()
    }
}

/// The outcome of one merge step
#[derive(Debug)]
pub(crate) enum MergeStep {
    Row { lane: usize, sample: Sample },
    /// All rows of a lane were emitted, only reported when ordering by series
    LaneFinished { lane: usize },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapKey {
    timestamp: Timestamp,
    lane: usize,
    direction: Direction,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_time = match self.direction {
            Direction::Ascending => self.timestamp.cmp(&other.timestamp),
            Direction::Descending => other.timestamp.cmp(&self.timestamp),
        };
        by_time.then_with(|| self.lane.cmp(&other.lane))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges lanes either interleaved by time, or one lane after the other
///
/// Interleaved merging pops the lane with the next timestamp from a min-heap holding one entry per
/// lane; equal timestamps go to the lane that comes first in the query. Each lane only ever has its
/// head in the heap, so samples of one series keep the order their cursor produced them in.
#[derive(Debug)]
pub(crate) struct Merge<'a> {
    lanes: Vec<Lane<'a>>,
    direction: Direction,
    order_by_series: bool,
    limit: Option<usize>,
    heap: Option<BinaryHeap<Reverse<HeapKey>>>,
    current: usize,
    emitted: usize,
    pending_error: Option<Error>,
    finished: bool,
}

impl<'a> Merge<'a> {
    pub(crate) fn new(
        lanes: Vec<Lane<'a>>,
        direction: Direction,
        order_by_series: bool,
        limit: Option<usize>,
    ) -> Self {
        Self {
            lanes,
            direction,
            order_by_series,
            limit,
            heap: None,
            current: 0,
            emitted: 0,
            pending_error: None,
            finished: false,
        }
    }

    pub(crate) fn lane(&self, lane: usize) -> &Lane<'a> {
        &self.lanes[lane]
    }

    pub(crate) fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub(crate) fn next_step(&mut self) -> Result<MergeStep> {
        if let Some(e) = self.pending_error.take() {
            self.finished = true;
            return Err(e);
        }
        if self.finished {
            return Ok(MergeStep::Finished);
        }
        let step = if self.order_by_series {
            self.next_grouped()
        } else {
            self.next_interleaved()
        };
        if matches!(step, MergeStep::Finished) {
            self.finished = true;
        }
        Ok(step)
    }

    fn next_interleaved(&mut self) -> MergeStep {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            return MergeStep::Finished;
        }
        let direction = self.direction;
        let lanes = &self.lanes;
        let heap = self.heap.get_or_insert_with(|| {
            lanes
                .iter()
                .enumerate()
                .filter_map(|(lane, l)| {
                    l.head.as_ref().map(|s| {
                        Reverse(HeapKey {
                            timestamp: s.timestamp,
                            lane,
                            direction,
                        })
                    })
                })
                .collect()
        });
        let Some(Reverse(key)) = heap.pop() else {
            return MergeStep::Finished;
        };

        let lane = &mut self.lanes[key.lane];
        let sample = lane
            .take()
            .expect("lane in the merge heap always has a head");
        if let Some(next) = &lane.head {
            heap.push(Reverse(HeapKey {
                timestamp: next.timestamp,
                lane: key.lane,
                direction,
            }));
        }
        if let Some(e) = lane.error.take() {
            self.pending_error = Some(e);
        }
        self.emitted += 1;
        MergeStep::Row {
            lane: key.lane,
            sample,
        }
    }

    fn next_grouped(&mut self) -> MergeStep {
        let index = self.current;
        let Some(lane) = self.lanes.get_mut(index) else {
            return MergeStep::Finished;
        };
        let limited = self.limit.is_some_and(|limit| lane.emitted >= limit);
        let Some(sample) = (!limited).then(|| lane.take()).flatten() else {
            self.current += 1;
            return MergeStep::LaneFinished { lane: index };
        };
        if let Some(e) = lane.error.take() {
            self.pending_error = Some(e);
        }
        MergeStep::Row {
            lane: index,
            sample,
        }
    }
}
