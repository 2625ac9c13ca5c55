use crate::progress::MigrationProgress;
use crate::status::{MigrationState, MigrationStatus, SeriesState};
use pointstore_types::SeriesId;
use serde::Serialize;
use std::sync::Arc;

/// The backend a read of a series is served from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadRoute {
    Primary,
    Secondary,
}

/// The backends a write to a series goes to
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRoute {
    Primary,
    /// Secondary first, then primary
    Dual,
}

impl WriteRoute {
    pub fn is_primary_only(self) -> bool {
        matches!(self, Self::Primary)
    }
}

fn routes(status: Option<MigrationStatus>) -> (ReadRoute, WriteRoute) {
    match status {
        // created after the migration started
        None => (ReadRoute::Primary, WriteRoute::Primary),
        Some(status) if status.is_primary_only() => (ReadRoute::Primary, WriteRoute::Primary),
        Some(_) => (ReadRoute::Secondary, WriteRoute::Dual),
    }
}

/// Decides which backend is authoritative for a series
#[derive(Debug, Clone)]
pub(crate) struct Router {
    state: Arc<MigrationState>,
}

impl Router {
    pub(crate) fn new(state: Arc<MigrationState>) -> Self {
        Self { state }
    }

    /// Run `f` with the read route of the series
    ///
    /// The series' state cannot change while `f` runs. While the series runs its final copy this
    /// waits until the copy is done.
    pub(crate) fn with_read_route<T>(&self, series_id: SeriesId, f: impl FnOnce(ReadRoute) -> T) -> T {
        if self.state.all_migrated() {
            return f(ReadRoute::Primary);
        }
        self.state
            .statuses
            .with_status(series_id, |status| f(routes(status).0))
    }

    /// Run `f` with the write route of the series, see [`with_read_route`](Self::with_read_route)
    pub(crate) fn with_write_route<T>(
        &self,
        series_id: SeriesId,
        f: impl FnOnce(WriteRoute) -> T,
    ) -> T {
        if self.state.all_migrated() {
            return f(WriteRoute::Primary);
        }
        self.state
            .statuses
            .with_status(series_id, |status| f(routes(status).1))
    }

    pub(crate) fn read_route(&self, series_id: SeriesId) -> ReadRoute {
        self.with_read_route(series_id, |route| route)
    }

    pub(crate) fn write_route(&self, series_id: SeriesId) -> WriteRoute {
        self.with_write_route(series_id, |route| route)
    }

    pub(crate) fn progress(&self) -> MigrationProgress {
        self.state.counters.snapshot()
    }

    pub(crate) fn status(&self, series_id: SeriesId) -> Option<SeriesState> {
        self.state.statuses.get(series_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::CopyOutcome;

    const A: SeriesId = SeriesId::new(1);
    const B: SeriesId = SeriesId::new(2);
    const UNKNOWN: SeriesId = SeriesId::new(99);

    fn done() -> crate::Result<CopyOutcome> {
        Ok(CopyOutcome {
            samples: 0,
            last_timestamp: None,
        })
    }

    #[test]
    fn routes_follow_status() {
        let state = Arc::new(MigrationState::new(vec![A, B]));
        let router = Router::new(Arc::clone(&state));

        assert_eq!(router.read_route(A), ReadRoute::Secondary);
        assert_eq!(router.write_route(A), WriteRoute::Dual);
        assert_eq!(router.read_route(UNKNOWN), ReadRoute::Primary);
        assert_eq!(router.write_route(UNKNOWN), WriteRoute::Primary);

        state.statuses.claim(A);
        assert_eq!(router.read_route(A), ReadRoute::Secondary);
        state.statuses.complete_with(A, 0, done).unwrap();
        state.counters.inc_migrated();
        assert_eq!(router.read_route(A), ReadRoute::Primary);
        assert!(router.write_route(A).is_primary_only());

        state.statuses.claim(B);
        state.statuses.mark_skipped(B);
        state.counters.inc_skipped();
        state.check_complete();
        assert!(state.completed().is_cancelled());

        // a skipped series was never copied and stays on the secondary
        assert!(!state.all_migrated());
        assert_eq!(router.read_route(B), ReadRoute::Secondary);
        assert_eq!(router.write_route(B), WriteRoute::Dual);
        assert_eq!(router.read_route(A), ReadRoute::Primary);
    }

    #[test]
    fn fully_migrated_fleet_is_served_by_the_primary() {
        let state = Arc::new(MigrationState::new(vec![A]));
        let router = Router::new(Arc::clone(&state));
        state.statuses.claim(A);
        state.statuses.complete_with(A, 0, done).unwrap();
        state.counters.inc_migrated();
        state.check_complete();

        assert!(state.all_migrated());
        assert_eq!(router.read_route(A), ReadRoute::Primary);
        assert_eq!(router.write_route(UNKNOWN), WriteRoute::Primary);
    }
}
