//! Certificate inventory: the record model and the Ops Manager fetcher.

pub mod client;
pub mod record;

pub use client::{CertificateSource, OpsManClient, parse_certificates};
pub use record::{CertificateRecord, dedup_by_name};
