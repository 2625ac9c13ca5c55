use crate::routing::{ReadRoute, Router, WriteRoute};
use crate::{Error, MigrationProgress, Result, SeriesState};
use pointstore_backend::{Backend, SampleCursor, SeriesReader};
use pointstore_query::{
    BookendEvent, BookendQuery, BookendStream, BoxError, LatestQuery, RangeQuery, Row, RowStream,
};
use pointstore_types::{Direction, Sample, SeriesId, Timestamp};
use std::sync::Arc;
use tracing::debug;

/// Reads and writes point values while a migration runs
///
/// Every operation is sent to the backend that is authoritative for the series at that moment.
/// Queries route each series separately, so a query may read some series from the primary and
/// others from the secondary.
#[derive(Debug, Clone)]
pub struct MigratingStore {
    primary: Arc<dyn Backend>,
    secondary: Arc<dyn Backend>,
    router: Router,
}

impl MigratingStore {
    pub(crate) fn new(
        primary: Arc<dyn Backend>,
        secondary: Arc<dyn Backend>,
        router: Router,
    ) -> Self {
        Self {
            primary,
            secondary,
            router,
        }
    }

    pub fn read_route(&self, series_id: SeriesId) -> ReadRoute {
        self.router.read_route(series_id)
    }

    pub fn write_route(&self, series_id: SeriesId) -> WriteRoute {
        self.router.write_route(series_id)
    }

    /// Write a sample to the series
    ///
    /// While the series is not migrated the sample is written to the secondary and then to the
    /// primary; the first failure is returned.
    pub fn save(&self, series_id: SeriesId, sample: Sample) -> Result<()> {
        self.save_batch(series_id, vec![sample])
    }

    pub fn save_batch(&self, series_id: SeriesId, samples: Vec<Sample>) -> Result<()> {
        let write_error = |backend| {
            move |source| Error::Write {
                series_id,
                backend,
                source,
            }
        };
        self.router.with_write_route(series_id, |route| {
            if route == WriteRoute::Dual {
                self.secondary
                    .write_samples(series_id, samples.clone())
                    .map_err(write_error("secondary"))?;
            }
            self.primary
                .write_samples(series_id, samples)
                .map_err(write_error("primary"))
        })
    }

    /// Delete every sample of a migrated series, returning how many were removed
    ///
    /// Series that still have data on the secondary cannot be deleted.
    pub fn delete_series(&self, series_id: SeriesId) -> Result<u64> {
        self.router.with_write_route(series_id, |route| {
            if !route.is_primary_only() {
                return Err(Error::DeleteUnsupported { series_id });
            }
            let removed = self
                .primary
                .delete_series(series_id)
                .map_err(|source| Error::Write {
                    series_id,
                    backend: "primary",
                    source,
                })?;
            debug!(%series_id, removed, "deleted series");
            Ok(removed)
        })
    }

    pub fn latest(&self, query: &LatestQuery) -> Result<RowStream<'_>> {
        Ok(pointstore_query::latest(self, query)?)
    }

    pub fn range(&self, query: &RangeQuery) -> Result<RowStream<'_>> {
        Ok(pointstore_query::range(self, query)?)
    }

    pub fn bookend(&self, query: &BookendQuery) -> Result<BookendStream<'_>> {
        Ok(pointstore_query::bookend(self, query)?)
    }

    /// Run a latest query, see [`pointstore_query::query_latest`]
    pub fn query_latest<F, E>(&self, query: &LatestQuery, callback: F) -> Result<u64>
    where
        F: FnMut(Row) -> Result<(), E>,
        E: Into<BoxError>,
    {
        Ok(pointstore_query::query_latest(self, query, callback)?)
    }

    /// Run a range query, see [`pointstore_query::query_range`]
    pub fn query_range<F, E>(&self, query: &RangeQuery, callback: F) -> Result<u64>
    where
        F: FnMut(Row) -> Result<(), E>,
        E: Into<BoxError>,
    {
        Ok(pointstore_query::query_range(self, query, callback)?)
    }

    /// Run a bookend query, see [`pointstore_query::query_bookend`]
    pub fn query_bookend<F, E>(&self, query: &BookendQuery, callback: F) -> Result<u64>
    where
        F: FnMut(BookendEvent) -> Result<(), E>,
        E: Into<BoxError>,
    {
        Ok(pointstore_query::query_bookend(self, query, callback)?)
    }

    pub fn migration_progress(&self) -> MigrationProgress {
        self.router.progress()
    }

    /// The migration state of a series that was found when the migration started
    pub fn migration_status(&self, series_id: SeriesId) -> Option<SeriesState> {
        self.router.status(series_id)
    }
}

impl SeriesReader for MigratingStore {
    fn seek(
        &self,
        series_id: SeriesId,
        timestamp: Timestamp,
        direction: Direction,
    ) -> pointstore_backend::Result<SampleCursor<'_>> {
        self.router
            .with_read_route(series_id, |route| match route {
                ReadRoute::Primary => self.primary.seek(series_id, timestamp, direction),
                ReadRoute::Secondary => self.secondary.seek(series_id, timestamp, direction),
            })
    }
}
