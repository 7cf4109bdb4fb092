//! Ops Manager deployed-certificates client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use super::record::{CertificateRecord, DeployedCertificates, dedup_by_name};
use crate::auth::BearerToken;
use crate::error::ExporterError;

/// Source of certificate inventory.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Performs one authenticated fetch.
    ///
    /// # Errors
    ///
    /// - [`ExporterError::Auth`] when the token is rejected
    /// - [`ExporterError::Network`] on transport failures and 5xx/429
    /// - [`ExporterError::Parse`] on an unexpected body or status
    async fn fetch(&self, token: &BearerToken) -> Result<Vec<CertificateRecord>, ExporterError>;
}

/// Client for `GET /api/v0/deployed/certificates`.
pub struct OpsManClient {
    http: Client,
    certificates_url: Url,
}

impl OpsManClient {
    /// Creates a client fetching from `certificates_url`.
    #[must_use]
    pub const fn new(http: Client, certificates_url: Url) -> Self {
        Self {
            http,
            certificates_url,
        }
    }
}

#[async_trait]
impl CertificateSource for OpsManClient {
    #[instrument(skip_all, fields(url = %self.certificates_url))]
    async fn fetch(&self, token: &BearerToken) -> Result<Vec<CertificateRecord>, ExporterError> {
        let response = self
            .http
            .get(self.certificates_url.clone())
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExporterError::from_status(status, &body));
        }

        parse_certificates(&body)
    }
}

/// Parses a deployed-certificates body into unique records.
///
/// # Errors
///
/// Returns [`ExporterError::Parse`] if the body does not match the schema.
pub fn parse_certificates(body: &str) -> Result<Vec<CertificateRecord>, ExporterError> {
    let payload: DeployedCertificates = serde_json::from_str(body)
        .map_err(|e| ExporterError::parse(format!("invalid certificates response: {e}")))?;

    let total = payload.certificates.len();
    let records: Vec<CertificateRecord> = payload
        .certificates
        .into_iter()
        .filter_map(|entry| {
            let record = entry.into_record();
            if record.is_none() {
                warn!("Skipping certificate without variable_path or property_reference");
            }
            record
        })
        .collect();

    let records = dedup_by_name(records);
    debug!(received = total, kept = records.len(), "Parsed deployed certificates");
    Ok(records)
}
