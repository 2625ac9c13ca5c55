//! Online migration of a fleet of series from one backend to another.
//!
//! The [`MigrationCoordinator`] copies every series found in the *secondary* (old) backend into the
//! *primary* (new) backend using a pool of workers. While it runs, the [`MigratingStore`] serves
//! reads and writes, routing each one to the backend that is authoritative for the series:
//!
//! - series that are not migrated yet are read from the secondary and written to both backends,
//! - migrated series, and series created after the migration started, only use the primary,
//! - once every series is done, all traffic goes to the primary without consulting the per series
//!   state.
//!
//! Each series is copied with a catch-up double copy: a full copy, a second copy of whatever
//! arrived meanwhile, and a final copy performed while holding the series' state entry, which is
//! when the series flips to migrated. Routing decisions for that series wait for the flip, so no
//! write can land on the secondary only once the series has been handed over.
//!
//! Migration state lives in memory only; a restarted process enumerates and copies the whole fleet
//! again, which is safe because copies overwrite samples at equal timestamps.

mod coordinator;
mod copy;
mod progress;
mod queue;
mod routing;
mod status;
mod store;

pub use coordinator::{
    MigrationConfig, MigrationCoordinator, MigrationFilter, MigrationHandle, RetryBackoff,
};
pub use copy::{CopyOutcome, copy_series};
pub use progress::MigrationProgress;
pub use routing::{ReadRoute, WriteRoute};
pub use status::{MigrationStatus, SeriesState};
pub use store::MigratingStore;

use pointstore_types::SeriesId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("series {series_id} has not been migrated, deleting it is not supported")]
    DeleteUnsupported { series_id: SeriesId },

    #[error("error reading series {series_id} from the secondary backend: {source}")]
    Read {
        series_id: SeriesId,
        #[source]
        source: pointstore_backend::Error,
    },

    #[error("error writing series {series_id} to the {backend} backend: {source}")]
    Write {
        series_id: SeriesId,
        backend: &'static str,
        #[source]
        source: pointstore_backend::Error,
    },

    #[error("failed to enumerate the series to migrate: {0}")]
    Enumerate(#[source] pointstore_backend::Error),

    #[error(transparent)]
    Query(#[from] pointstore_query::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
