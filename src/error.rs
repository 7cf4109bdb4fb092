//! Error handling module for the refresh path.
//!
//! This module provides the runtime error taxonomy with:
//! - Structured variants carrying enough context to log and classify
//! - Transient vs persistent classification for network failures
//! - Automatic conversion from `reqwest` transport errors
//! - Sanitization of upstream messages before they are stored or logged
//!
//! Every variant is `Clone` so a single credential exchange can hand the same
//! result to all of its waiters.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Sensitive patterns that should never be echoed back from upstream bodies
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "access_token",
    "refresh_token",
    "bearer",
    "authorization",
    "private",
];

/// Longest upstream message kept in an error.
const MAX_MESSAGE_LEN: usize = 256;

/// Transport-level failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// Request or cycle deadline exceeded
    Timeout,
    /// Connection refused, reset, or DNS failure
    Connect,
    /// TLS handshake or certificate trust failure
    Tls,
    /// Upstream answered with a server-side or throttling status
    Status(u16),
    /// Any other transport failure
    Other,
}

impl NetworkFailure {
    /// Whether retrying on the next tick is likely to help.
    ///
    /// TLS trust failures come from startup configuration and will repeat
    /// until an operator fixes the CA bundle.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Tls)
    }
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Tls => write!(f, "tls"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Other => write!(f, "transport"),
        }
    }
}

/// Runtime errors raised while acquiring tokens or fetching certificates.
///
/// None of these terminate the process; the refresh scheduler records them
/// in the published snapshot.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExporterError {
    /// Credential exchange failed or the bearer token was rejected
    #[error("Authentication failed: {reason}")]
    Auth {
        /// Description of the failure
        reason: String,
        /// The upstream rejected the credentials or token itself
        rejected: bool,
    },

    /// Transport-level failure
    #[error("Network error ({failure}): {reason}")]
    Network {
        /// Failure class
        failure: NetworkFailure,
        /// Description of the failure
        reason: String,
    },

    /// Response did not match the expected schema
    #[error("Parse error: {reason}")]
    Parse {
        /// Description of the mismatch
        reason: String,
    },
}

/// Kind of the last error recorded in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No refresh cycle has completed yet
    NotYetFetched,
    /// Authentication failure
    Auth,
    /// Network failure
    Network,
    /// Schema failure
    Parse,
}

impl ErrorKind {
    /// Label value used in metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotYetFetched => "not_yet_fetched",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExporterError {
    /// Creates an authentication error for a rejected credential or token.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: sanitize_message(&reason.into()),
            rejected: true,
        }
    }

    /// Creates an authentication error that does not imply bad credentials.
    #[must_use]
    pub fn auth_unavailable(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: sanitize_message(&reason.into()),
            rejected: false,
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(failure: NetworkFailure, reason: impl Into<String>) -> Self {
        Self::Network {
            failure,
            reason: sanitize_message(&reason.into()),
        }
    }

    /// Creates a timeout error for an operation that ran for `after`.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Network {
            failure: NetworkFailure::Timeout,
            reason: format!("operation timed out after {after:?}"),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: sanitize_message(&reason.into()),
        }
    }

    /// Get the snapshot error kind for this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Network { .. } => ErrorKind::Network,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Check if the cached token must be discarded because of this error
    #[must_use]
    pub const fn invalidates_token(&self) -> bool {
        matches!(self, Self::Auth { rejected: true, .. })
    }

    /// Check if this error is expected to clear up on its own
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { failure, .. } => failure.is_transient(),
            Self::Auth { rejected, .. } => !*rejected,
            Self::Parse { .. } => false,
        }
    }

    /// Maps an unexpected HTTP status from the management API.
    ///
    /// 401/403 mean the credentials or token were rejected; 5xx and 429 are
    /// transient upstream trouble; anything else means we are talking to
    /// something that does not speak the expected API.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        match code {
            401 | 403 => Self::rejected(format!("status {status}: {}", truncate(body))),
            429 | 500..=599 => Self::network(
                NetworkFailure::Status(code),
                format!("status {status}: {}", truncate(body)),
            ),
            _ => Self::parse(format!("unexpected status {status}: {}", truncate(body))),
        }
    }
}

impl From<reqwest::Error> for ExporterError {
    fn from(err: reqwest::Error) -> Self {
        let failure = if err.is_timeout() {
            NetworkFailure::Timeout
        } else if is_tls_failure(&err) {
            NetworkFailure::Tls
        } else if err.is_connect() {
            NetworkFailure::Connect
        } else if err.is_decode() {
            return Self::parse(error_chain(&err));
        } else {
            NetworkFailure::Other
        };
        Self::network(failure, error_chain(&err))
    }
}

/// rustls failure fragments seen in reqwest source chains.
const TLS_MARKERS: &[&str] = &[
    "invalid peer certificate",
    "unknownissuer",
    "certificate verify failed",
    "received fatal alert",
    "tls handshake",
];

/// Walks the source chain looking for rustls certificate errors.
///
/// The top-level reqwest message embeds the request URL, so only the
/// sources are inspected.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if TLS_MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Joins an error and its sources into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

fn truncate(message: &str) -> &str {
    let trimmed = message.trim();
    if trimmed.len() <= MAX_MESSAGE_LEN {
        return trimmed;
    }
    let mut end = MAX_MESSAGE_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    &trimmed[..end]
}

/// Sanitize a message by removing sensitive information
fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "upstream response withheld (contains credential material)".to_string();
    }
    truncate(message).to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}
