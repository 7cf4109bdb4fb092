//! Ops Manager Certificate Exporter
//!
//! Periodically pulls the deployed certificate inventory from VMware Tanzu
//! Operations Manager and serves it as Prometheus gauges. Upstream failures
//! never clear known-good data; they surface as error gauges next to it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod auth;
pub mod certificates;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod exporter;
pub mod http;
pub mod observability;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod snapshot;

pub use app::App;
pub use auth::{BearerToken, Credential, CredentialProvider, Token, TokenExchange, UaaTokenExchange};
pub use certificates::{CertificateRecord, CertificateSource, OpsManClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use error::{ErrorKind, ExporterError, NetworkFailure};
pub use exporter::MetricsExporter;
pub use scheduler::{CycleState, RefreshScheduler, SchedulerConfig};
pub use snapshot::{LastError, Snapshot, SnapshotStore};
