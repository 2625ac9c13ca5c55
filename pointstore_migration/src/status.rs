//! Per series migration state.

use crate::Result;
use crate::copy::CopyOutcome;
use crate::progress::MigrationCounters;
use dashmap::DashMap;
use pointstore_types::SeriesId;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where a series is in its migration
///
/// A series moves `NotStarted -> Running -> Migrated | Skipped`, and back from `Running` to
/// `NotStarted` after a failed attempt. Any other transition is a bug and panics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotStarted,
    Running,
    Migrated,
    Skipped,
}

impl MigrationStatus {
    /// Whether the primary backend holds the authoritative copy of the series
    pub fn is_primary_only(self) -> bool {
        matches!(self, Self::Migrated)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Migrated | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesState {
    pub status: MigrationStatus,
    /// Number of times a worker picked up the series
    pub attempts: u32,
    /// Samples copied by the successful attempt
    pub samples_copied: u64,
}

impl SeriesState {
    fn new() -> Self {
        Self {
            status: MigrationStatus::NotStarted,
            attempts: 0,
            samples_copied: 0,
        }
    }
}

/// The state of every series known when the migration started
///
/// Every mutation is a single read-check-write on the series' entry.
#[derive(Debug, Default)]
pub(crate) struct StatusMap {
    series: DashMap<SeriesId, SeriesState>,
}

impl StatusMap {
    pub(crate) fn new(series_ids: impl IntoIterator<Item = SeriesId>) -> Self {
        Self {
            series: series_ids
                .into_iter()
                .map(|id| (id, SeriesState::new()))
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.series.len()
    }

    pub(crate) fn get(&self, series_id: SeriesId) -> Option<SeriesState> {
        self.series.get(&series_id).map(|s| s.clone())
    }

    /// Run `f` with the status of the series, holding its entry for the duration
    ///
    /// `None` is passed for a series that was not known when the migration started.
    pub(crate) fn with_status<T>(
        &self,
        series_id: SeriesId,
        f: impl FnOnce(Option<MigrationStatus>) -> T,
    ) -> T {
        let entry = self.series.get(&series_id);
        f(entry.as_ref().map(|s| s.status))
    }

    fn transition(
        &self,
        series_id: SeriesId,
        from: MigrationStatus,
        to: MigrationStatus,
    ) -> dashmap::mapref::one::RefMut<'_, SeriesId, SeriesState> {
        let Some(mut state) = self.series.get_mut(&series_id) else {
            panic!("series {series_id} is not part of the migration");
        };
        assert_eq!(
            state.status, from,
            "series {series_id} cannot move to {to:?} from {:?}",
            state.status
        );
        state.status = to;
        state
    }

    /// Mark the series as running, returning the attempt number starting at 1
    ///
    /// # Panics
    ///
    /// If the series is not `NotStarted`; a series is never worked on twice at the same time.
    pub(crate) fn claim(&self, series_id: SeriesId) -> u32 {
        let mut state = self.transition(
            series_id,
            MigrationStatus::NotStarted,
            MigrationStatus::Running,
        );
        state.attempts += 1;
        state.attempts
    }

    /// Put a failed series back so it can be claimed again
    pub(crate) fn release_for_retry(&self, series_id: SeriesId) {
        self.transition(
            series_id,
            MigrationStatus::Running,
            MigrationStatus::NotStarted,
        );
    }

    pub(crate) fn mark_skipped(&self, series_id: SeriesId) {
        self.transition(series_id, MigrationStatus::Running, MigrationStatus::Skipped);
    }

    /// Run the final copy of a series and flip it to migrated if it succeeds
    ///
    /// The entry is held while `copy` runs, so routing decisions for the series wait until it is
    /// either migrated or still running after a failure.
    pub(crate) fn complete_with(
        &self,
        series_id: SeriesId,
        copied_before: u64,
        copy: impl FnOnce() -> Result<CopyOutcome>,
    ) -> Result<CopyOutcome> {
        let Some(mut state) = self.series.get_mut(&series_id) else {
            panic!("series {series_id} is not part of the migration");
        };
        assert_eq!(
            state.status,
            MigrationStatus::Running,
            "series {series_id} completed while not running"
        );
        let outcome = copy()?;
        state.status = MigrationStatus::Migrated;
        state.samples_copied = copied_before + outcome.samples;
        Ok(outcome)
    }
}

/// Everything the workers and the routing layer share
#[derive(Debug)]
pub(crate) struct MigrationState {
    pub(crate) statuses: StatusMap,
    pub(crate) counters: MigrationCounters,
    all_migrated: AtomicBool,
    finished: AtomicBool,
    completed: CancellationToken,
}

impl MigrationState {
    pub(crate) fn new(series_ids: Vec<SeriesId>) -> Self {
        let statuses = StatusMap::new(series_ids);
        let counters = MigrationCounters::new(statuses.len() as u64);
        let state = Self {
            statuses,
            counters,
            all_migrated: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            completed: CancellationToken::new(),
        };
        state.check_complete();
        state
    }

    /// Whether every series is migrated, so that the primary alone serves the whole fleet
    ///
    /// Stays unset when a series was skipped, as skipped series keep living on the secondary.
    pub(crate) fn all_migrated(&self) -> bool {
        self.all_migrated.load(Ordering::Acquire)
    }

    /// Cancelled once every series is migrated or skipped
    pub(crate) fn completed(&self) -> &CancellationToken {
        &self.completed
    }

    /// Release the waiters once every series reached a terminal state
    pub(crate) fn check_complete(&self) {
        let progress = self.counters.snapshot();
        if !progress.is_complete() {
            return;
        }
        if progress.migrated_count == progress.migrated_total {
            self.all_migrated.store(true, Ordering::Release);
        }
        if !self.finished.swap(true, Ordering::AcqRel) {
            info!(
                migrated = progress.migrated_count,
                skipped = progress.skipped_count,
                retries = progress.retry_count,
                "migration complete"
            );
            self.completed.cancel();
        }
    }
}
