//! Certificate records as published in snapshots.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// One certificate known to Ops Manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Purpose/location identifier, unique within a fetch
    pub name: String,
    /// Subject common name (empty when not reported)
    pub common_name: String,
    /// Start of validity
    pub valid_from: DateTime<Utc>,
    /// End of validity
    pub valid_until: DateTime<Utc>,
    /// Tile that owns the certificate
    pub product_guid: String,
    /// Where the certificate lives (`ops_manager`, `credhub`, ...)
    pub location: String,
    /// Issuer as reported upstream
    pub issuer: String,
    /// Whether this is a CA certificate
    pub is_ca: bool,
}

impl CertificateRecord {
    /// Seconds until expiry at `now`; negative once expired.
    #[must_use]
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.valid_until - now).num_seconds()
    }
}

/// `GET /api/v0/deployed/certificates` response.
#[derive(Debug, Deserialize)]
pub(crate) struct DeployedCertificates {
    pub certificates: Vec<DeployedCertificate>,
}

/// One entry of the deployed certificates listing.
#[derive(Debug, Deserialize)]
pub(crate) struct DeployedCertificate {
    #[serde(default)]
    pub variable_path: Option<String>,
    #[serde(default)]
    pub property_reference: Option<String>,
    #[serde(default)]
    pub product_guid: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub is_ca: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl DeployedCertificate {
    /// Maps the wire entry; entries with no usable name are dropped.
    pub(crate) fn into_record(self) -> Option<CertificateRecord> {
        let name = self
            .variable_path
            .filter(|s| !s.is_empty())
            .or(self.property_reference.filter(|s| !s.is_empty()))?;

        Some(CertificateRecord {
            name,
            common_name: self.common_name.unwrap_or_default(),
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            product_guid: self.product_guid.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            issuer: self.issuer.unwrap_or_default(),
            is_ca: self.is_ca,
        })
    }
}

/// Collapses duplicate names; the last record wins and keeps the slot of the
/// first occurrence.
#[must_use]
pub fn dedup_by_name(records: Vec<CertificateRecord>) -> Vec<CertificateRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<CertificateRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.name) {
            Some(&slot) => {
                warn!(name = %record.name, "Duplicate certificate name in upstream response, keeping the last one");
                unique[slot] = record;
            }
            None => {
                index.insert(record.name.clone(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}
