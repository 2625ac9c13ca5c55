//! The contract a storage backend fulfils to hold point values.
//!
//! A backend only has to provide ordered iteration over the samples of a single series (a
//! [`SampleCursor`]), plus writes and deletes. Everything that spans more than one series, such as
//! merging, limits and boundary values, is done by the query engine on top of these cursors, so a
//! relational, log-structured or columnar store can all satisfy the contract.

mod memory;
mod registry;

pub use memory::InMemoryBackend;
pub use registry::{SeriesInfo, SeriesRegistry, StaticSeriesRegistry};

use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sample for series {sample_series_id} cannot be written to series {series_id}")]
    SeriesMismatch {
        series_id: SeriesId,
        sample_series_id: SeriesId,
    },

    #[error("sample for series {series_id} at {timestamp} carries no value")]
    MissingValue {
        series_id: SeriesId,
        timestamp: Timestamp,
    },

    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A lazy, ordered iterator over the samples of a single series
///
/// Cursors are created per query and are never shared between queries.
pub type SampleCursor<'a> = Box<dyn Iterator<Item = Result<Sample>> + Send + 'a>;

/// Read side of a backend
pub trait SeriesReader: Debug + Send + Sync {
    /// Open a cursor over the samples of `series_id` starting from `timestamp`
    ///
    /// With [`Direction::Ascending`] the cursor yields every sample whose timestamp is greater than
    /// or equal to `timestamp`, oldest first. With [`Direction::Descending`] it yields every sample
    /// whose timestamp is strictly less than `timestamp`, newest first. A series with no samples
    /// yields an empty cursor.
    fn seek(
        &self,
        series_id: SeriesId,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Result<SampleCursor<'_>>;
}

/// Write side of a backend
///
/// Writing a sample at a timestamp that already holds a sample for the series replaces it, which
/// makes repeated copies of the same data idempotent.
pub trait SeriesWriter: Debug + Send + Sync {
    fn write_sample(&self, series_id: SeriesId, sample: Sample) -> Result<()>;

    fn write_samples(&self, series_id: SeriesId, samples: Vec<Sample>) -> Result<()> {
        for sample in samples {
            self.write_sample(series_id, sample)?;
        }
        Ok(())
    }

    /// Remove every sample of the series, returning how many were removed
    fn delete_series(&self, series_id: SeriesId) -> Result<u64>;
}

/// Enumerates the series a backend holds data for
pub trait SeriesDirectory: Debug + Send + Sync {
    fn list_series_ids(&self) -> Result<Vec<SeriesId>>;
}

/// A complete backend
pub trait Backend: SeriesReader + SeriesWriter + SeriesDirectory {}

impl<T> Backend for T where T: SeriesReader + SeriesWriter + SeriesDirectory {}

/// Check that a sample can be stored under `series_id`
pub fn validate_sample(series_id: SeriesId, sample: &Sample) -> Result<()> {
    if sample.series_id != series_id {
        return Err(Error::SeriesMismatch {
            series_id,
            sample_series_id: sample.series_id,
        });
    }
    if sample.value.is_none() {
        return Err(Error::MissingValue {
            series_id,
            timestamp: sample.timestamp,
        });
    }
    Ok(())
}
