use crate::copy::copy_series;
use crate::progress::{MigrationProgress, ProgressReporter};
use crate::queue::WorkQueue;
use crate::routing::Router;
use crate::status::{MigrationState, SeriesState};
use crate::store::MigratingStore;
use crate::{Error, Result};
use pointstore_backend::{Backend, SeriesInfo, SeriesRegistry};
use pointstore_types::SeriesId;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a failed series waits before it is retried
///
/// The delay doubles with every failed attempt of the series, starting at `initial` and never
/// exceeding `max`. A zero `initial` retries immediately.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryBackoff {
    initial: Duration,
    max: Duration,
}

impl RetryBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Retry immediately
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// The delay after the given failed attempt, counting from 1
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Number of series migrated concurrently
    pub worker_count: usize,
    /// Samples written to the primary per write
    pub batch_size: usize,
    pub retry_backoff: RetryBackoff,
    /// How long [`MigrationHandle::shutdown`] waits for workers to finish their series
    pub shutdown_timeout: Duration,
    /// How often progress is logged, `None` to not log progress
    pub progress_interval: Option<Duration>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 5_000,
            retry_backoff: RetryBackoff::default(),
            shutdown_timeout: Duration::from_secs(30),
            progress_interval: Some(Duration::from_secs(10)),
        }
    }
}

/// Decides which series take part in the migration
///
/// Series the filter excludes are skipped: they are left on the secondary and never copied.
#[derive(Clone)]
pub struct MigrationFilter(Arc<dyn Fn(&SeriesInfo) -> bool + Send + Sync>);

impl MigrationFilter {
    pub fn new(f: impl Fn(&SeriesInfo) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Migrate every series
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn includes(&self, info: &SeriesInfo) -> bool {
        (self.0)(info)
    }
}

impl Default for MigrationFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl Debug for MigrationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MigrationFilter").finish_non_exhaustive()
    }
}

/// Moves every series of the secondary backend to the primary backend
#[derive(Debug)]
pub struct MigrationCoordinator {
    secondary: Arc<dyn Backend>,
    primary: Arc<dyn Backend>,
    registry: Arc<dyn SeriesRegistry>,
    filter: MigrationFilter,
    config: MigrationConfig,
}

impl MigrationCoordinator {
    pub fn new(
        secondary: Arc<dyn Backend>,
        primary: Arc<dyn Backend>,
        registry: Arc<dyn SeriesRegistry>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            secondary,
            primary,
            registry,
            filter: MigrationFilter::all(),
            config,
        }
    }

    pub fn with_filter(mut self, filter: MigrationFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Enumerate the series of the secondary backend and start migrating them
    ///
    /// Must be called from within a tokio runtime. The workers run until every series is migrated
    /// or skipped, or until [`MigrationHandle::shutdown`] is called. Dropping the handle aborts
    /// them.
    pub fn start(self) -> Result<MigrationHandle> {
        let series_ids = self
            .secondary
            .list_series_ids()
            .map_err(Error::Enumerate)?;
        let worker_count = self.config.worker_count.max(1);
        info!(
            series = series_ids.len(),
            workers = worker_count,
            batch_size = self.config.batch_size,
            "starting migration"
        );

        let state = Arc::new(MigrationState::new(series_ids.clone()));
        let queue = WorkQueue::new();
        for series_id in series_ids {
            queue.push(series_id);
        }
        let stop = CancellationToken::new();

        let ctx = Arc::new(WorkerContext {
            secondary: self.secondary,
            primary: self.primary,
            registry: self.registry,
            filter: self.filter,
            batch_size: self.config.batch_size,
            retry_backoff: self.config.retry_backoff,
            state: Arc::clone(&state),
            queue,
            stop: stop.clone(),
        });

        let mut workers = JoinSet::new();
        if !state.completed().is_cancelled() {
            for worker in 0..worker_count {
                workers.spawn(run_worker(worker, Arc::clone(&ctx)));
            }
        }
        let reporter = self
            .config
            .progress_interval
            .filter(|interval| !interval.is_zero())
            .map(|interval| {
                tokio::spawn(ProgressReporter::new(Arc::clone(&state), interval).run(stop.clone()))
            });

        Ok(MigrationHandle {
            ctx,
            workers,
            reporter,
            shutdown_timeout: self.config.shutdown_timeout,
        })
    }
}

#[derive(Debug)]
struct WorkerContext {
    secondary: Arc<dyn Backend>,
    primary: Arc<dyn Backend>,
    registry: Arc<dyn SeriesRegistry>,
    filter: MigrationFilter,
    batch_size: usize,
    retry_backoff: RetryBackoff,
    state: Arc<MigrationState>,
    queue: WorkQueue<SeriesId>,
    stop: CancellationToken,
}

impl WorkerContext {
    async fn migrate(self: &Arc<Self>, worker: usize, series_id: SeriesId) {
        let attempt = self.state.statuses.claim(series_id);

        let Some(info) = self.registry.series_info(series_id) else {
            info!(%series_id, "skipping series without a data point");
            self.skip(series_id);
            return;
        };
        if !self.filter.includes(&info) {
            info!(%series_id, name = %info.name, "skipping series excluded from migration");
            self.skip(series_id);
            return;
        }

        debug!(worker, %series_id, attempt, "migrating series");
        let ctx = Arc::clone(self);
        match tokio::task::spawn_blocking(move || ctx.copy(series_id)).await {
            Ok(Ok(samples)) => {
                debug!(worker, %series_id, samples, attempt, "migrated series");
            }
            Ok(Err(e)) => self.retry(series_id, attempt, e),
            Err(e) => {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                self.retry(series_id, attempt, e);
            }
        }
    }

    /// Copy the series with a catch-up double copy, returning the number of samples copied
    ///
    /// The first pass copies everything. The second copies what was written during the first. The
    /// last one runs while the series' state entry is held and flips it to migrated, so nothing
    /// can be written to the secondary alone after that.
    fn copy(&self, series_id: SeriesId) -> Result<u64> {
        let (secondary, primary) = (&*self.secondary, &*self.primary);
        let first = copy_series(secondary, primary, series_id, None, self.batch_size)?;
        let second = copy_series(
            secondary,
            primary,
            series_id,
            first.last_timestamp,
            self.batch_size,
        )?;
        let from = second.last_timestamp.or(first.last_timestamp);
        let copied = first.samples + second.samples;
        let last = self.state.statuses.complete_with(series_id, copied, || {
            copy_series(secondary, primary, series_id, from, self.batch_size)
        })?;

        self.state.counters.inc_migrated();
        self.state.check_complete();
        Ok(copied + last.samples)
    }

    fn skip(&self, series_id: SeriesId) {
        self.state.statuses.mark_skipped(series_id);
        self.state.counters.inc_skipped();
        self.state.check_complete();
    }

    fn retry(&self, series_id: SeriesId, attempt: u32, error: impl Display) {
        self.state.statuses.release_for_retry(series_id);
        self.state.counters.inc_retries();
        let delay = self.retry_backoff.delay(attempt);
        error!(
            %series_id,
            attempt,
            %error,
            retry_in = ?delay,
            "failed to migrate series"
        );
        self.queue.push_at(Instant::now() + delay, series_id);
    }
}

async fn run_worker(worker: usize, ctx: Arc<WorkerContext>) {
    debug!(worker, "migration worker started");
    let completed = ctx.state.completed().clone();
    loop {
        let series_id = tokio::select! {
            biased;
            _ = ctx.stop.cancelled() => break,
            _ = completed.cancelled() => break,
            series_id = ctx.queue.pop() => series_id,
        };
        ctx.migrate(worker, series_id).await;
    }
    debug!(worker, "migration worker stopped");
}

fn propagate_panic(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            std::panic::resume_unwind(e.into_panic());
        }
    }
}

/// A running migration
#[derive(Debug)]
pub struct MigrationHandle {
    ctx: Arc<WorkerContext>,
    workers: JoinSet<()>,
    reporter: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl MigrationHandle {
    pub fn progress(&self) -> MigrationProgress {
        self.ctx.state.counters.snapshot()
    }

    /// The state of a series that was found when the migration started
    pub fn status(&self, series_id: SeriesId) -> Option<SeriesState> {
        self.ctx.state.statuses.get(series_id)
    }

    /// Whether every series is migrated or skipped
    pub fn is_complete(&self) -> bool {
        self.ctx.state.completed().is_cancelled()
    }

    /// Completes once every series is migrated or skipped
    ///
    /// # Panics
    ///
    /// Re-raises the panic of a worker that hit a broken invariant, as the series it held would
    /// otherwise keep the migration from ever completing.
    pub async fn wait_for_completion(&mut self) {
        let completed = self.ctx.state.completed().clone();
        loop {
            tokio::select! {
                biased;
                _ = completed.cancelled() => return,
                Some(result) = self.workers.join_next() => propagate_panic(result),
            }
        }
    }

    /// A store routing reads and writes according to the progress of this migration
    pub fn store(&self) -> MigratingStore {
        MigratingStore::new(
            Arc::clone(&self.ctx.primary),
            Arc::clone(&self.ctx.secondary),
            Router::new(Arc::clone(&self.ctx.state)),
        )
    }

    /// Stop the migration
    ///
    /// Workers finish the series they are copying and exit. Workers still running after the
    /// shutdown timeout are aborted. Series that were not migrated stay on the secondary.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of a worker that hit a broken invariant.
    pub async fn shutdown(mut self) -> MigrationProgress {
        info!("stopping migration");
        self.ctx.stop.cancel();

        let workers = &mut self.workers;
        let joined = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(result) = workers.join_next().await {
                propagate_panic(result);
            }
        })
        .await;
        if joined.is_err() {
            warn!(
                remaining = self.workers.len(),
                timeout = ?self.shutdown_timeout,
                "migration workers did not stop in time, aborting them"
            );
            self.workers.abort_all();
            while let Some(result) = self.workers.join_next().await {
                propagate_panic(result);
            }
        }
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }

        let progress = self.progress();
        info!(
            migrated = progress.migrated_count,
            skipped = progress.skipped_count,
            remaining = progress.remaining(),
            queued = self.ctx.queue.len(),
            "migration stopped"
        );
        progress
    }
}
