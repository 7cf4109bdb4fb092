//! Type-Safe Configuration with Validation
//!
//! The exporter is configured once at startup. [`crate::cli::Cli`] collects
//! flags and environment variables; [`Config::from_cli`] validates them into
//! an immutable value that is passed into every constructor.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::auth::Credential;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Offending option
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// A duration that must be positive was zero
    #[error("Invalid {0}: must be greater than 0")]
    ZeroDuration(&'static str),

    /// Missing required field
    #[error("{0} is a required flag and it's missing")]
    MissingRequired(String),

    /// Both credential schemes were supplied
    #[error("choose either username / password or client id / client secret, cannot have both of them together")]
    ConflictingCredentials,

    /// The CA bundle could not be loaded
    #[error("Failed to load CA bundle {path}: {reason}")]
    CaBundle {
        /// Bundle location
        path: PathBuf,
        /// Read or parse failure
        reason: String,
    },

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Self-metrics could not be registered
    #[error("Failed to register metrics: {0}")]
    Metrics(String),
}

/// How the exporter trusts the Ops Manager TLS certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsTrust {
    /// Accept any certificate (`--skip-ssl-validation`)
    SkipVerification,
    /// Trust only the certificates in this PEM bundle
    CaBundle(PathBuf),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Exporter configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the metrics endpoint
    pub host: String,
    /// Listen port (1-65535)
    pub port: u16,
    /// Ops Manager base URL (scheme, host and port only)
    pub opsman_url: Url,
    /// Foundation name attached to every series
    pub environment: String,
    /// Active credential variant
    pub credential: Credential,
    /// TLS trust mode for the Ops Manager client
    pub tls: TlsTrust,
    /// Time between refresh cycle starts
    pub interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Upper bound for a whole refresh cycle
    pub cycle_timeout: Duration,
    /// Tokens expiring within this margin are renewed
    pub token_refresh_margin: Duration,
    /// Grace period for in-flight work at shutdown
    pub shutdown_timeout: Duration,
    /// Verbose logging
    pub debug: bool,
    /// Log output format
    pub log_format: LogFormat,
}

impl Config {
    /// Validates parsed command line options into a configuration.
    pub fn from_cli(cli: crate::cli::Cli) -> Result<Self, ConfigError> {
        let opsman_url = normalize_opsman_url(&cli.opsman_address)?;

        let environment = cli.environment.trim().to_string();
        if environment.is_empty() {
            return Err(ConfigError::MissingRequired("Environment".to_string()));
        }

        let tls = match (cli.skip_ssl_validation, cli.ca_cert_file) {
            (true, _) => TlsTrust::SkipVerification,
            (false, Some(path)) => TlsTrust::CaBundle(path),
            (false, None) => {
                return Err(ConfigError::MissingRequired("CA cert file parameter".to_string()));
            }
        };

        let credential = select_credential(
            non_empty(cli.opsman_username),
            non_empty(cli.opsman_password),
            non_empty(cli.opsman_client_id),
            non_empty(cli.opsman_client_secret),
        )?;

        let config = Self {
            host: cli.host,
            port: cli.port,
            opsman_url,
            environment,
            credential,
            tls,
            interval: Duration::from_secs(cli.interval),
            request_timeout: Duration::from_secs(cli.request_timeout),
            cycle_timeout: Duration::from_secs(cli.cycle_timeout),
            token_refresh_margin: Duration::from_secs(cli.token_refresh_margin),
            shutdown_timeout: Duration::from_secs(cli.shutdown_timeout),
            debug: cli.debug,
            log_format: cli.log_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("interval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request timeout"));
        }
        if self.cycle_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("cycle timeout"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("shutdown timeout"));
        }
        Ok(())
    }

    /// Socket address string for the metrics listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// UAA token endpoint on the Ops Manager host.
    #[must_use]
    pub fn token_url(&self) -> Url {
        join(&self.opsman_url, "uaa/oauth/token")
    }

    /// Deployed certificates endpoint.
    #[must_use]
    pub fn certificates_url(&self) -> Url {
        join(&self.opsman_url, "api/v0/deployed/certificates")
    }
}

/// Picks the credential variant; exactly one must be fully populated.
fn select_credential(
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Credential, ConfigError> {
    match (username, password, client_id, client_secret) {
        (Some(_), _, Some(_), _) => Err(ConfigError::ConflictingCredentials),
        (Some(username), Some(password), None, _) => Ok(Credential::basic(username, password)),
        (Some(_), None, None, _) => Err(ConfigError::MissingRequired(
            "Operation manager password".to_string(),
        )),
        (None, _, Some(client_id), Some(secret)) => Ok(Credential::client(client_id, secret)),
        (None, _, Some(_), None) => Err(ConfigError::MissingRequired(
            "Operation manager client secret".to_string(),
        )),
        (None, _, None, _) => Err(ConfigError::MissingRequired(
            "Operation manager username or client ID".to_string(),
        )),
    }
}

/// Reduces the supplied address to `scheme://host[:port]/`.
fn normalize_opsman_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field: "OPSMAN_URL".to_string(),
        reason,
    };
    let parsed = Url::parse(raw.trim()).map_err(|e| invalid(format!("({raw}) {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid(format!("({raw}) has no host")))?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}/", parsed.scheme()),
        None => format!("{}://{host}/", parsed.scheme()),
    };
    Url::parse(&origin).map_err(|e| invalid(e.to_string()))
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
