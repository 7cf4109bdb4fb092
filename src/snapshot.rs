//! Snapshot store shared between the refresh loop and metric scrapes.
//!
//! One writer (the scheduler) swaps in whole snapshots; any number of readers
//! load the current one without locking. A reader holding an old snapshot
//! keeps it alive until it is done rendering.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::certificates::CertificateRecord;
use crate::error::{ErrorKind, ExporterError};

/// Why the last cycle did not produce fresh data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    /// Error class
    pub kind: ErrorKind,
    /// Sanitized description
    pub message: String,
    /// When the error was recorded
    pub at: DateTime<Utc>,
}

/// Immutable view of the certificate inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Records of the most recent successful fetch
    pub records: Arc<Vec<CertificateRecord>>,
    /// When those records were fetched, `None` before the first success
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error of the latest cycle, `None` after a success
    pub last_error: Option<LastError>,
    /// Failed cycles since the last success
    pub consecutive_failures: u32,
}

impl Snapshot {
    /// The snapshot served before any cycle has completed.
    #[must_use]
    pub fn not_yet_fetched(at: DateTime<Utc>) -> Self {
        Self {
            records: Arc::new(Vec::new()),
            fetched_at: None,
            last_error: Some(LastError {
                kind: ErrorKind::NotYetFetched,
                message: "no refresh cycle has completed yet".to_string(),
                at,
            }),
            consecutive_failures: 0,
        }
    }

    /// A snapshot for a successful fetch.
    #[must_use]
    pub fn fetched(records: Vec<CertificateRecord>, at: DateTime<Utc>) -> Self {
        Self {
            records: Arc::new(records),
            fetched_at: Some(at),
            last_error: None,
            consecutive_failures: 0,
        }
    }

    /// Derives the snapshot after a failed cycle; records and `fetched_at`
    /// carry over unchanged.
    #[must_use]
    pub fn after_failure(&self, err: &ExporterError, at: DateTime<Utc>) -> Self {
        Self {
            records: Arc::clone(&self.records),
            fetched_at: self.fetched_at,
            last_error: Some(LastError {
                kind: err.kind(),
                message: err.to_string(),
                at,
            }),
            consecutive_failures: self.consecutive_failures.saturating_add(1),
        }
    }

    /// Whether at least one cycle has succeeded.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// Kind of the last error, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(|e| e.kind)
    }
}

/// Lock-free holder of the current [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    started_at: DateTime<Utc>,
}

impl SnapshotStore {
    /// Creates a store holding the not-yet-fetched snapshot.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::not_yet_fetched(started_at)),
            started_at,
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replaces the current snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Publishes the snapshot for a successful fetch.
    pub fn record_success(&self, records: Vec<CertificateRecord>, at: DateTime<Utc>) {
        self.publish(Snapshot::fetched(records, at));
    }

    /// Publishes the snapshot for a failed cycle, keeping the records.
    ///
    /// Only the refresh loop writes, so load-then-store does not race.
    pub fn record_failure(&self, err: &ExporterError, at: DateTime<Utc>) -> Arc<Snapshot> {
        let next = Arc::new(self.current.load().after_failure(err, at));
        self.current.store(Arc::clone(&next));
        next
    }

    /// When the store was created.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
