//! Observability Module
//!
//! Structured logging setup and the exporter's own Prometheus metrics.

pub mod logging;
pub mod metrics;

pub use logging::{LoggingConfig, init_logging};
pub use metrics::{CycleOutcome, ExporterMetrics, NAMESPACE};
