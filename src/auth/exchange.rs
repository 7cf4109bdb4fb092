//! UAA token grants against the Ops Manager host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::credential::{Credential, Token};
use crate::error::ExporterError;

/// Public UAA client Ops Manager registers for user logins.
const OPSMAN_LOGIN_CLIENT: &str = "opsman";

/// Lifetime assumed when UAA omits `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Performs one credential exchange.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchanges the configured credential for a token issued at `now`.
    async fn exchange(&self, now: DateTime<Utc>) -> Result<Token, ExporterError>;
}

/// UAA `/oauth/token` response body.
#[derive(Debug, Deserialize)]
struct UaaTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// UAA error body (`{"error":"invalid_grant", ...}`).
#[derive(Debug, Deserialize)]
struct UaaErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token exchange against the Ops Manager UAA.
pub struct UaaTokenExchange {
    http: Client,
    token_url: Url,
    credential: Credential,
}

impl UaaTokenExchange {
    /// Creates an exchange for `credential` posting to `token_url`.
    #[must_use]
    pub const fn new(http: Client, token_url: Url, credential: Credential) -> Self {
        Self {
            http,
            token_url,
            credential,
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.credential {
            Credential::Basic { username, password } => request
                .basic_auth(OPSMAN_LOGIN_CLIENT, Some(""))
                .form(&[
                    ("grant_type", self.credential.grant_type()),
                    ("username", username.as_str()),
                    ("password", password.expose_secret()),
                ]),
            Credential::Client {
                client_id,
                client_secret,
            } => request
                .basic_auth(client_id, Some(client_secret.expose_secret()))
                .form(&[("grant_type", self.credential.grant_type())]),
        }
    }
}

#[async_trait]
impl TokenExchange for UaaTokenExchange {
    #[instrument(skip(self, now), fields(grant = %self.credential.grant_type(), principal = %self.credential.principal()))]
    async fn exchange(&self, now: DateTime<Utc>) -> Result<Token, ExporterError> {
        let response = self.request().send().await.map_err(ExporterError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(ExporterError::from)?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let token: UaaTokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExporterError::parse(format!("invalid UAA token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(ExporterError::parse("UAA returned an empty access token"));
        }
        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(ExporterError::parse(format!("unsupported token type {kind}")));
            }
        }

        let ttl = token.expires_in.map_or(DEFAULT_TOKEN_TTL, Duration::from_secs);
        debug!(ttl_secs = ttl.as_secs(), "UAA token issued");
        Ok(Token::new(token.access_token, now, ttl))
    }
}

/// Maps a failed token response.
///
/// UAA answers bad usernames, passwords and client secrets with 400
/// `invalid_grant`/`invalid_client` or 401; those reject the credential
/// outright. Anything else is treated as the token endpoint being unwell.
fn classify_failure(status: StatusCode, body: &str) -> ExporterError {
    let uaa_error = serde_json::from_str::<UaaErrorResponse>(body).ok();
    let describe = |e: &UaaErrorResponse| match &e.error_description {
        Some(d) => format!("{}: {d}", e.error),
        None => e.error.clone(),
    };

    match (status.as_u16(), &uaa_error) {
        (401 | 403, Some(e)) => ExporterError::rejected(format!("UAA status {status}: {}", describe(e))),
        (401 | 403, None) => ExporterError::rejected(format!("UAA status {status}")),
        (400, Some(e)) if matches!(e.error.as_str(), "invalid_grant" | "invalid_client" | "unauthorized") => {
            ExporterError::rejected(format!("UAA status {status}: {}", describe(e)))
        }
        (_, Some(e)) => ExporterError::auth_unavailable(format!("UAA status {status}: {}", describe(e))),
        (_, None) => ExporterError::auth_unavailable(format!("UAA status {status}")),
    }
}
