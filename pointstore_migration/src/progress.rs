use crate::status::MigrationState;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fleet wide migration counters
///
/// Set up once when the migration starts and only ever incremented by the workers.
#[derive(Debug)]
pub(crate) struct MigrationCounters {
    migrated_total: u64,
    migrated_count: AtomicU64,
    skipped_count: AtomicU64,
    retry_count: AtomicU64,
}

impl MigrationCounters {
    pub(crate) fn new(migrated_total: u64) -> Self {
        Self {
            migrated_total,
            migrated_count: AtomicU64::new(0),
            skipped_count: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn inc_migrated(&self) {
        self.migrated_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn inc_skipped(&self) {
        self.skipped_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn inc_retries(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MigrationProgress {
        MigrationProgress {
            migrated_total: self.migrated_total,
            migrated_count: self.migrated_count.load(Ordering::SeqCst),
            skipped_count: self.skipped_count.load(Ordering::SeqCst),
            retry_count: self.retry_count.load(Ordering::Relaxed),
        }
    }
}

/// A point in time view of the migration counters
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationProgress {
    /// Series found when the migration started
    pub migrated_total: u64,
    pub migrated_count: u64,
    pub skipped_count: u64,
    /// Failed attempts that were retried
    pub retry_count: u64,
}

impl MigrationProgress {
    /// Series that are neither migrated nor skipped
    pub fn remaining(&self) -> u64 {
        self.migrated_total
            .saturating_sub(self.migrated_count + self.skipped_count)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

/// Periodically logs migration progress along with the rate since the previous report
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    state: Arc<MigrationState>,
    interval: Duration,
}

impl ProgressReporter {
    pub(crate) fn new(state: Arc<MigrationState>, interval: Duration) -> Self {
        Self { state, interval }
    }

    /// Report until `stop` is cancelled or the migration completes
    pub(crate) async fn run(self, stop: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        interval.tick().await;

        let completed = self.state.completed().clone();
        let mut last = (Instant::now(), self.state.counters.snapshot().migrated_count);
        loop {
            tokio::select! {
                _ = stop.cancelled() => return,
                _ = completed.cancelled() => return,
                _ = interval.tick() => {}
            }
            let progress = self.state.counters.snapshot();
            let now = Instant::now();
            let elapsed = now.duration_since(last.0).as_secs_f64();
            let rate = if elapsed > 0.0 {
                (progress.migrated_count - last.1) as f64 / elapsed
            } else {
                0.0
            };
            info!(
                migrated = progress.migrated_count,
                skipped = progress.skipped_count,
                total = progress.migrated_total,
                remaining = progress.remaining(),
                retries = progress.retry_count,
                series_per_sec = format!("{rate:.1}"),
                "migration progress"
            );
            last = (now, progress.migrated_count);
        }
    }
}
