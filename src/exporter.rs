//! Prometheus rendering of the current snapshot.

use chrono::{DateTime, Utc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::observability::NAMESPACE;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Labels on every per-certificate series, after `environment`.
const CERTIFICATE_LABELS: &[&str] = &["name", "common_name", "product_guid", "location", "issuer"];

/// Every error kind, so `last_cycle_failed` always has a stable series set.
const ERROR_KINDS: [ErrorKind; 4] = [
    ErrorKind::NotYetFetched,
    ErrorKind::Auth,
    ErrorKind::Network,
    ErrorKind::Parse,
];

/// Renders snapshots in the Prometheus text exposition format.
pub struct MetricsExporter {
    store: Arc<SnapshotStore>,
    clock: Arc<dyn Clock>,
    environment: String,
    /// Long-lived self-metrics appended to every render
    shared: Option<Registry>,
}

impl MetricsExporter {
    /// Creates an exporter labelling every snapshot series with `environment`.
    pub fn new(store: Arc<SnapshotStore>, clock: Arc<dyn Clock>, environment: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            environment: environment.into(),
            shared: None,
        }
    }

    /// Appends the families of `registry` to every render.
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.shared = Some(registry);
        self
    }

    /// Renders the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be built or encoded.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let snapshot = self.store.current();
        let now = self.clock.now();

        let mut families = self.snapshot_families(&snapshot, now)?;
        if let Some(shared) = &self.shared {
            families.extend(shared.gather());
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Builds a throwaway registry for one snapshot.
    #[allow(clippy::cast_precision_loss)]
    fn snapshot_families(
        &self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<MetricFamily>, prometheus::Error> {
        let registry = Registry::new();

        if !snapshot.records.is_empty() {
            let expires_in = GaugeVec::new(
                self.opts(
                    "certificate_expires_in_seconds",
                    "Seconds until the certificate expires, negative once expired",
                ),
                CERTIFICATE_LABELS,
            )?;
            let valid_until = GaugeVec::new(
                self.opts(
                    "certificate_valid_until_timestamp_seconds",
                    "Certificate expiry as a Unix timestamp",
                ),
                CERTIFICATE_LABELS,
            )?;

            for record in snapshot.records.iter() {
                let labels = [
                    record.name.as_str(),
                    record.common_name.as_str(),
                    record.product_guid.as_str(),
                    record.location.as_str(),
                    record.issuer.as_str(),
                ];
                expires_in
                    .with_label_values(&labels)
                    .set(record.expires_in_seconds(now) as f64);
                valid_until
                    .with_label_values(&labels)
                    .set(record.valid_until.timestamp() as f64);
            }

            registry.register(Box::new(expires_in))?;
            registry.register(Box::new(valid_until))?;
        }

        let certificates = Gauge::with_opts(self.opts(
            "exporter_certificates",
            "Certificates in the current snapshot",
        ))?;
        certificates.set(snapshot.records.len() as f64);
        registry.register(Box::new(certificates))?;

        let since = snapshot.fetched_at.unwrap_or_else(|| self.store.started_at());
        let age = Gauge::with_opts(self.opts(
            "exporter_last_success_age_seconds",
            "Seconds since the last successful refresh, or since start when none succeeded",
        ))?;
        age.set(((now - since).num_milliseconds().max(0) as f64) / 1000.0);
        registry.register(Box::new(age))?;

        let failed = GaugeVec::new(
            self.opts(
                "exporter_last_cycle_failed",
                "1 for the kind of error the last cycle ended with, 0 otherwise",
            ),
            &["kind"],
        )?;
        let current = snapshot.error_kind();
        for kind in ERROR_KINDS {
            let value = if current == Some(kind) { 1.0 } else { 0.0 };
            failed.with_label_values(&[kind.as_str()]).set(value);
        }
        registry.register(Box::new(failed))?;

        let consecutive = Gauge::with_opts(self.opts(
            "exporter_consecutive_failures",
            "Failed refresh cycles since the last success",
        ))?;
        consecutive.set(f64::from(snapshot.consecutive_failures));
        registry.register(Box::new(consecutive))?;

        Ok(registry.gather())
    }

    fn opts(&self, name: &str, help: &str) -> Opts {
        Opts::new(name, help)
            .namespace(NAMESPACE)
            .const_label("environment", self.environment.as_str())
    }
}
