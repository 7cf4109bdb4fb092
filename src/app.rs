//! Component wiring.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::{CredentialProvider, TokenExchange, UaaTokenExchange};
use crate::certificates::{CertificateSource, OpsManClient};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigError};
use crate::exporter::MetricsExporter;
use crate::http::{HttpConfig, build_http_client};
use crate::observability::ExporterMetrics;
use crate::scheduler::{RefreshScheduler, SchedulerConfig};
use crate::server;
use crate::shutdown::{ShutdownCoordinator, wait_for_signal};
use crate::snapshot::SnapshotStore;

/// The assembled exporter.
pub struct App {
    /// Refresh loop
    pub scheduler: Arc<RefreshScheduler>,
    /// Exposition renderer
    pub exporter: Arc<MetricsExporter>,
    /// Snapshot store shared by both
    pub store: Arc<SnapshotStore>,
    shutdown_timeout: Duration,
}

impl App {
    /// Builds every component from the validated configuration.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built or metrics cannot be registered.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let http = build_http_client(&HttpConfig::from_config(config))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let exchange = Arc::new(UaaTokenExchange::new(
            http.clone(),
            config.token_url(),
            config.credential.clone(),
        ));
        let source: Arc<dyn CertificateSource> =
            Arc::new(OpsManClient::new(http, config.certificates_url()));

        Self::assemble(config, exchange, source, clock)
    }

    /// Builds the app around an explicit exchange, source and clock.
    ///
    /// # Errors
    ///
    /// Fails if metrics cannot be registered.
    pub fn assemble(
        config: &Config,
        exchange: Arc<dyn TokenExchange>,
        source: Arc<dyn CertificateSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let registry = Registry::new();
        let metrics = Arc::new(
            ExporterMetrics::new(&registry, &config.environment)
                .map_err(|e| ConfigError::Metrics(e.to_string()))?,
        );

        let provider = Arc::new(
            CredentialProvider::new(exchange, config.token_refresh_margin, Arc::clone(&clock))
                .with_metrics(Arc::clone(&metrics)),
        );
        let store = Arc::new(SnapshotStore::new(clock.now()));

        let scheduler = RefreshScheduler::new(
            provider,
            source,
            Arc::clone(&store),
            Arc::clone(&clock),
            SchedulerConfig {
                interval: config.interval,
                cycle_timeout: config.cycle_timeout,
                shutdown_grace: config.shutdown_timeout,
            },
        )
        .with_metrics(metrics);

        let exporter = MetricsExporter::new(Arc::clone(&store), clock, config.environment.clone())
            .with_registry(registry);

        Ok(Self {
            scheduler: Arc::new(scheduler),
            exporter: Arc::new(exporter),
            store,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Runs the scheduler and the HTTP server until SIGINT/SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the server fails.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let mut coordinator = ShutdownCoordinator::new();

        let scheduler = Arc::clone(&self.scheduler);
        let signal = coordinator.subscribe();
        coordinator.spawn("refresh-scheduler", async move {
            scheduler.run(signal).await;
        });

        let server = server::serve(listener, Arc::clone(&self.exporter), coordinator.subscribe());
        tokio::pin!(server);

        let result = tokio::select! {
            result = &mut server => {
                if let Err(e) = &result {
                    error!(error = %e, "Metrics server stopped");
                }
                result
            }
            () = wait_for_signal() => {
                coordinator.trigger();
                server.await
            }
        };

        coordinator.shutdown(self.shutdown_timeout).await;
        info!("Exporter stopped");
        result
    }
}
