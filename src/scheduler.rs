//! Refresh scheduler.
//!
//! Drives `Idle -> Fetching -> (Succeeded | Failed) -> Idle` on a fixed
//! interval. Every failure is absorbed into the snapshot store; the loop
//! only stops on shutdown.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auth::CredentialProvider;
use crate::certificates::{CertificateRecord, CertificateSource};
use crate::clock::Clock;
use crate::error::ExporterError;
use crate::observability::{CycleOutcome, ExporterMetrics};
use crate::shutdown::ShutdownSignal;
use crate::snapshot::SnapshotStore;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Waiting for the next tick
    Idle,
    /// A cycle is in flight
    Fetching,
    /// The last cycle published fresh records
    Succeeded,
    /// The last cycle recorded an error
    Failed,
}

impl CycleState {
    /// Returns the state name for logging
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Loop timing.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Time between cycle starts
    pub interval: Duration,
    /// Upper bound on one cycle, token acquisition included
    pub cycle_timeout: Duration,
    /// How long an in-flight cycle may run after shutdown is signalled
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(86_400),
            cycle_timeout: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Periodic certificate refresh.
pub struct RefreshScheduler {
    provider: Arc<CredentialProvider>,
    source: Arc<dyn CertificateSource>,
    store: Arc<SnapshotStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    metrics: Option<Arc<ExporterMetrics>>,
    state: Mutex<CycleState>,
    cycles: AtomicU64,
}

impl RefreshScheduler {
    /// Creates an idle scheduler.
    pub fn new(
        provider: Arc<CredentialProvider>,
        source: Arc<dyn CertificateSource>,
        store: Arc<SnapshotStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            source,
            store,
            clock,
            config,
            metrics: None,
            state: Mutex::new(CycleState::Idle),
            cycles: AtomicU64::new(0),
        }
    }

    /// Records cycle outcomes in the exporter self-metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ExporterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CycleState {
        *self.state.lock()
    }

    /// Number of cycles started so far.
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    fn transition(&self, to: CycleState) {
        let mut state = self.state.lock();
        if *state != to {
            debug!(from = state.as_str(), to = to.as_str(), "Scheduler state transition");
            *state = to;
        }
    }

    /// Runs one refresh cycle and publishes its outcome.
    ///
    /// Returns the number of records published. The error is returned for
    /// inspection only; it has already been recorded in the store.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the cycle.
    pub async fn run_cycle(&self) -> Result<usize, ExporterError> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.transition(CycleState::Fetching);
        let started = Instant::now();

        let result = match tokio::time::timeout(self.config.cycle_timeout, self.fetch_once()).await
        {
            Ok(result) => result,
            Err(_) => Err(ExporterError::timeout(self.config.cycle_timeout)),
        };
        let elapsed = started.elapsed().as_secs_f64();
        let now = self.clock.now();

        match result {
            Ok(records) => {
                let count = records.len();
                self.store.record_success(records, now);
                self.transition(CycleState::Succeeded);
                if let Some(metrics) = &self.metrics {
                    metrics.record_cycle(CycleOutcome::Success, elapsed);
                }
                info!(
                    cycle,
                    outcome = CycleOutcome::Success.as_str(),
                    records = count,
                    consecutive_failures = 0,
                    duration_secs = elapsed,
                    "Certificate refresh succeeded"
                );
                Ok(count)
            }
            Err(err) => {
                if err.invalidates_token() {
                    self.provider.invalidate();
                }
                let snapshot = self.store.record_failure(&err, now);
                self.transition(CycleState::Failed);
                if let Some(metrics) = &self.metrics {
                    metrics.record_cycle(CycleOutcome::Failure, elapsed);
                }
                warn!(
                    cycle,
                    outcome = CycleOutcome::Failure.as_str(),
                    kind = %err.kind(),
                    transient = err.is_transient(),
                    records = snapshot.records.len(),
                    consecutive_failures = snapshot.consecutive_failures,
                    error = %err,
                    "Certificate refresh failed, serving previous records"
                );
                Err(err)
            }
        }
    }

    async fn fetch_once(&self) -> Result<Vec<CertificateRecord>, ExporterError> {
        let token = self.provider.get_token().await?;
        self.source.fetch(&token).await
    }

    /// Runs cycles until `shutdown` fires.
    ///
    /// The first cycle starts immediately. Ticks that fall due while a cycle
    /// is running are dropped, never queued; the next cycle waits for the
    /// first interval boundary after the overrun. A cycle in flight when
    /// shutdown arrives gets the configured grace period and is then dropped.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let interval = self.config.interval;
        let origin = Instant::now();
        let mut ticker = tokio::time::interval_at(origin, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stop = shutdown.wait();
        tokio::pin!(stop);

        info!(interval_secs = interval.as_secs(), "Refresh scheduler started");

        loop {
            tokio::select! {
                biased;
                () = &mut stop => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let cycle = self.run_cycle();
            tokio::pin!(cycle);

            let interrupted = tokio::select! {
                _ = &mut cycle => false,
                () = &mut stop => true,
            };

            if interrupted {
                info!(
                    grace_secs = self.config.shutdown_grace.as_secs(),
                    "Shutdown requested during refresh cycle, waiting for it to finish"
                );
                if tokio::time::timeout(self.config.shutdown_grace, &mut cycle)
                    .await
                    .is_err()
                {
                    warn!("Refresh cycle abandoned at shutdown, nothing published");
                }
                break;
            }

            self.transition(CycleState::Idle);

            let skipped = missed_ticks(started.elapsed(), interval);
            if skipped > 0 {
                let now = Instant::now();
                let next = origin + next_boundary(now.duration_since(origin), interval);
                ticker.reset_at(next);
                warn!(
                    skipped,
                    next_in_secs = next.duration_since(now).as_secs_f64(),
                    "Refresh cycle overran the interval, skipping ticks"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_skipped(skipped);
                }
            }
        }

        self.transition(CycleState::Idle);
        info!("Refresh scheduler stopped");
    }
}

/// Ticks that fell due while a cycle that took `elapsed` was running.
#[must_use]
pub fn missed_ticks(elapsed: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    u64::try_from(elapsed.as_nanos() / interval.as_nanos()).unwrap_or(u64::MAX)
}

/// Offset of the first interval boundary strictly after `since_origin`.
#[must_use]
pub fn next_boundary(since_origin: Duration, interval: Duration) -> Duration {
    if interval.is_zero() {
        return since_origin;
    }
    let periods = since_origin.as_nanos() / interval.as_nanos() + 1;
    let nanos = periods.saturating_mul(interval.as_nanos());
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
