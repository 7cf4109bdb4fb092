//! Command line options with environment variable fallbacks.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::LogFormat;

/// Default refresh interval: one day.
pub const DEFAULT_INTERVAL_SECS: u64 = 86_400;
/// Default metrics port.
pub const DEFAULT_PORT: u16 = 8080;

/// Command line options; each flag falls back to an environment variable.
#[allow(missing_docs)]
#[derive(Debug, Parser)]
#[command(
    name = "opsman-cert-exporter",
    about = "VMware Tanzu Certificate Exporter",
    long_about = "This application is designed to extract the certificate information from \
                  vmware tanzu operation manager and for prometheus to scrape.",
    version
)]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "DEBUG",
        action = ArgAction::SetTrue,
        help = "enable verbose or debug logging"
    )]
    pub debug: bool,

    #[arg(
        short = 'k',
        long = "skip-ssl-validation",
        env = "SKIP_SSL_VALIDATION",
        action = ArgAction::SetTrue,
        help = "skip validating certificate"
    )]
    pub skip_ssl_validation: bool,

    #[arg(
        short = 'i',
        long,
        env = "INTERVAL",
        default_value_t = DEFAULT_INTERVAL_SECS,
        help = "scrapping interval in seconds"
    )]
    pub interval: u64,

    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = DEFAULT_PORT,
        help = "port number to start the web server"
    )]
    pub port: u16,

    #[arg(
        long,
        env = "HOST",
        default_value = "0.0.0.0",
        help = "address to bind the web server to"
    )]
    pub host: String,

    #[arg(
        short = 'a',
        long = "opsman-address",
        env = "OPSMAN_URL",
        help = "[required] provide the hostname or IP address of the ops manager url"
    )]
    pub opsman_address: String,

    #[arg(
        short = 'u',
        long = "opsman-username",
        env = "OPSMAN_USERNAME",
        help = "[required if you have setup user using UAAC USER] provide the username to connect to ops manager"
    )]
    pub opsman_username: Option<String>,

    #[arg(
        short = 'w',
        long = "opsman-password",
        env = "OPSMAN_PASSWORD",
        hide_env_values = true,
        help = "[required if you have setup user using UAAC USER] provide the password to connect to ops manager"
    )]
    pub opsman_password: Option<String>,

    #[arg(
        short = 'n',
        long = "opsman-client-id",
        env = "OPSMAN_CLIENT_ID",
        help = "[required if you have setup user using UAAC CLIENT] provide the client id to connect to ops manager"
    )]
    pub opsman_client_id: Option<String>,

    #[arg(
        short = 's',
        long = "opsman-client-secret",
        env = "OPSMAN_CLIENT_SECRET",
        hide_env_values = true,
        help = "[required if you have setup user using UAAC CLIENT] provide the client secret to connect to ops manager"
    )]
    pub opsman_client_secret: Option<String>,

    #[arg(
        short = 'e',
        long,
        env = "ENVIRONMENT",
        help = "[required] provide the environment name for this foundation"
    )]
    pub environment: String,

    #[arg(
        short = 'c',
        long = "ca-cert-file",
        env = "CACERTFILE",
        help = "[required if skip ssl is false] provide the CA certificate bundle for the ops manager"
    )]
    pub ca_cert_file: Option<PathBuf>,

    #[arg(
        long = "request-timeout",
        env = "REQUEST_TIMEOUT",
        default_value_t = 30,
        help = "timeout in seconds for each request to ops manager"
    )]
    pub request_timeout: u64,

    #[arg(
        long = "cycle-timeout",
        env = "CYCLE_TIMEOUT",
        default_value_t = 120,
        help = "upper bound in seconds for one refresh cycle"
    )]
    pub cycle_timeout: u64,

    #[arg(
        long = "token-refresh-margin",
        env = "TOKEN_REFRESH_MARGIN",
        default_value_t = 60,
        help = "renew the UAA token when it expires within this many seconds"
    )]
    pub token_refresh_margin: u64,

    #[arg(
        long = "shutdown-timeout",
        env = "SHUTDOWN_TIMEOUT",
        default_value_t = 30,
        help = "grace period in seconds for in-flight work on shutdown"
    )]
    pub shutdown_timeout: u64,

    #[arg(
        long = "log-format",
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        help = "log output format"
    )]
    pub log_format: LogFormat,
}
