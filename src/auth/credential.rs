//! Credential variants and the opaque bearer token handed to the fetcher.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Credentials for the Ops Manager UAA, decided once at startup.
#[derive(Debug, Clone)]
pub enum Credential {
    /// UAA user created with `uaac user add`
    Basic {
        /// Ops Manager username
        username: String,
        /// Ops Manager password
        password: SecretString,
    },
    /// UAA client created with `uaac client add`
    Client {
        /// UAA client id
        client_id: String,
        /// UAA client secret
        client_secret: SecretString,
    },
}

impl Credential {
    /// Creates a username/password credential.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Creates a client-credentials credential.
    #[must_use]
    pub fn client(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::Client {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Name of the grant used for this credential.
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "password",
            Self::Client { .. } => "client_credentials",
        }
    }

    /// Principal shown in logs (never the secret).
    #[must_use]
    pub fn principal(&self) -> &str {
        match self {
            Self::Basic { username, .. } => username,
            Self::Client { client_id, .. } => client_id,
        }
    }
}

/// Token returned by a credential exchange.
#[derive(Clone)]
pub struct Token {
    value: Arc<SecretString>,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token valid for `ttl` from `issued_at`.
    #[must_use]
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            value: Arc::new(SecretString::from(value.into())),
            expires_at: issued_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// When the token expires.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable at `now` with `margin` to spare.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
        match self.expires_at.checked_sub_signed(margin) {
            Some(deadline) => now < deadline,
            None => false,
        }
    }

    /// Bearer handle sharing this token's value.
    #[must_use]
    pub fn bearer(&self) -> BearerToken {
        BearerToken(Arc::clone(&self.value))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Opaque bearer value attached to outgoing requests.
#[derive(Clone)]
pub struct BearerToken(Arc<SecretString>);

impl BearerToken {
    /// Exposes the raw token for an `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether two bearer handles come from the same exchange.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}
