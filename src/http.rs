//! HTTP client configuration and building.
//!
//! One client is built at startup and shared by the credential exchange and
//! the certificate fetcher, so the TLS trust decision is made exactly once.

use reqwest::{Certificate, Client, ClientBuilder};
use std::time::Duration;

use crate::config::{Config, ConfigError, TlsTrust};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// TLS trust mode
    pub tls: TlsTrust,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: concat!("opsman-cert-exporter/", env!("CARGO_PKG_VERSION")).to_string(),
            tls: TlsTrust::SkipVerification,
        }
    }
}

impl HttpConfig {
    /// Derives the client settings from the exporter configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::default()
            .with_timeout(config.request_timeout)
            .with_tls(config.tls.clone())
    }

    /// Create a new HTTP config with custom timeout.
    ///
    /// The connect timeout never exceeds the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Create a new HTTP config with a TLS trust mode.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsTrust) -> Self {
        self.tls = tls;
        self
    }
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns an error if the CA bundle cannot be read or contains no usable
/// certificate, or if the TLS backend fails to initialize.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, ConfigError> {
    let builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    let builder = match &config.tls {
        TlsTrust::SkipVerification => builder.danger_accept_invalid_certs(true),
        TlsTrust::CaBundle(path) => {
            let pem = std::fs::read(path).map_err(|e| ConfigError::CaBundle {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let certs = Certificate::from_pem_bundle(&pem).map_err(|e| ConfigError::CaBundle {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            if certs.is_empty() {
                return Err(ConfigError::CaBundle {
                    path: path.clone(),
                    reason: "no PEM certificates found".to_string(),
                });
            }
            certs
                .into_iter()
                .fold(builder, ClientBuilder::add_root_certificate)
        }
    };

    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
