//! The multi-series query engine.
//!
//! Every backend only knows how to iterate the samples of one series in time order. This crate
//! merges those per-series cursors into a single, globally ordered stream for the three ways point
//! values are read:
//!
//! - [`latest`]: the newest samples before an end time, newest first.
//! - [`range`]: the samples in `[from, to)`, oldest first.
//! - [`bookend`]: the samples strictly inside `(from, to)`, framed per series by the value in
//!   effect at `from` and at `to`.
//!
//! Each mode is available as a pull based iterator, which is the primitive, and as a callback
//! driven function ([`query_latest`], [`query_range`], [`query_bookend`]) for callers that push
//! results somewhere else. A callback returning an error cancels the query: nothing more is
//! delivered and the error is handed back as [`Error::Cancelled`].
//!
//! Every delivered event carries an index that starts at zero and increases by one per event
//! across all series of the query.

mod bookend;
mod callback;
pub mod lookup;
mod merge;
mod query;
mod rows;

pub use bookend::{BookendEvent, BookendStream, bookend};
pub use callback::{query_bookend, query_latest, query_range};
pub use query::{BookendQuery, LatestQuery, RangeQuery, SeriesSelection, TimeRange};
pub use rows::{Row, RowStream, latest, range};

use pointstore_types::{SeriesId, Timestamp};
use thiserror::Error;

/// An error raised by a query callback
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("a query must select at least one series")]
    NoSeries,

    #[error("invalid time range: from ({from}) is after to ({to})")]
    InvalidTimeRange { from: Timestamp, to: Timestamp },

    #[error("error reading series {series_id}: {source}")]
    Backend {
        series_id: SeriesId,
        #[source]
        source: pointstore_backend::Error,
    },

    #[error("query cancelled by callback: {0}")]
    Cancelled(#[source] BoxError),
}

impl Error {
    pub(crate) fn backend(series_id: SeriesId) -> impl FnOnce(pointstore_backend::Error) -> Self {
        move |source| Self::Backend { series_id, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
