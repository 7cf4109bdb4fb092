//! Exporter self-metrics.
//!
//! Counters and histograms that accumulate across cycles live in a shared
//! [`Registry`]; snapshot-derived gauges are built per render by the
//! metrics exporter.

use prometheus::{CounterVec, Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Metric namespace shared by every series the exporter emits.
pub const NAMESPACE: &str = "opsman";

/// Outcome label of a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot published
    Success,
    /// Token acquisition or fetch failed
    Failure,
}

impl CycleOutcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Refresh loop and credential metrics
pub struct ExporterMetrics {
    /// Completed cycles by outcome
    pub cycles: CounterVec,
    /// Interval ticks skipped because a cycle overran
    pub skipped_ticks: IntCounter,
    /// UAA token exchanges by result
    pub token_exchanges: CounterVec,
    /// Cycle wall time
    pub cycle_duration: Histogram,
}

impl ExporterMetrics {
    /// Creates the metrics and registers them with `registry`.
    ///
    /// Every series carries `environment` as a const label, matching the
    /// snapshot gauges.
    pub fn new(registry: &Registry, environment: &str) -> Result<Self, prometheus::Error> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(NAMESPACE)
                .subsystem("exporter")
                .const_label("environment", environment)
        };

        let cycles = CounterVec::new(opts("cycles_total", "Refresh cycles by outcome"), &["outcome"])?;
        registry.register(Box::new(cycles.clone()))?;

        let skipped_ticks = IntCounter::with_opts(opts(
            "skipped_ticks_total",
            "Interval ticks skipped while a cycle was still running",
        ))?;
        registry.register(Box::new(skipped_ticks.clone()))?;

        let token_exchanges = CounterVec::new(
            opts("token_exchanges_total", "UAA token exchanges by result"),
            &["result"],
        )?;
        registry.register(Box::new(token_exchanges.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::from(opts(
                "cycle_duration_seconds",
                "Refresh cycle duration in seconds",
            ))
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        // Pre-create label combinations so they render as 0 before the first cycle.
        for outcome in [CycleOutcome::Success, CycleOutcome::Failure] {
            cycles.with_label_values(&[outcome.as_str()]);
        }
        for result in ["success", "failure"] {
            token_exchanges.with_label_values(&[result]);
        }

        Ok(Self {
            cycles,
            skipped_ticks,
            token_exchanges,
            cycle_duration,
        })
    }

    /// Records a finished cycle
    pub fn record_cycle(&self, outcome: CycleOutcome, duration_secs: f64) {
        self.cycles.with_label_values(&[outcome.as_str()]).inc();
        self.cycle_duration.observe(duration_secs);
    }

    /// Records skipped interval ticks
    pub fn record_skipped(&self, ticks: u64) {
        self.skipped_ticks.inc_by(ticks);
    }

    /// Records a token exchange
    pub fn record_token_exchange(&self, succeeded: bool) {
        let result = if succeeded { "success" } else { "failure" };
        self.token_exchanges.with_label_values(&[result]).inc();
    }
}
