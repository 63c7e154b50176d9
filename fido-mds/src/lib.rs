//! Fido Metadata Service entries and lookup for attestation verification.
//!
//! The metadata service describes authenticator models: which roots their attestation
//! certificates chain to, what attestation types they produce, and whether the model has been
//! revoked or compromised. Verification consumes this through the [MetadataService] trait,
//! so callers may back it by anything. [StaticMetadataService] is an in memory implementation
//! loaded from the JSON payload of the metadata BLOB.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

pub mod mds;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use openssl::x509::X509;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub use crate::mds::{AttestationType, AuthenticatorStatus, FidoDevice, FidoMds, StatusReport};

/// Errors raised while loading metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The payload is not valid JSON of the expected shape.
    #[error("Unable to parse metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A root certificate is not valid standard base64.
    #[error("Unable to decode base64 certificate: {0}")]
    Base64(#[from] base64::DecodeError),
    /// A root certificate is not valid DER.
    #[error("Unable to parse certificate: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),
    /// The entry does not identify an authenticator by AAGUID.
    #[error("The metadata entry has no aaguid")]
    AaguidMissing,
}

/// What verification needs to know about one authenticator model.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    /// The model this entry describes.
    pub aaguid: Uuid,
    /// Human readable description of the model.
    pub description: Option<String>,
    /// Trust anchors for attestation certificates of this model.
    pub attestation_root_certificates: Vec<X509>,
    /// The attestation types the model produces.
    pub attestation_types: Vec<AttestationType>,
    /// Status history of the model.
    pub status_reports: Vec<StatusReport>,
}

impl MetadataEntry {
    /// An entry with no roots, types or status reports.
    pub fn new(aaguid: Uuid) -> Self {
        MetadataEntry {
            aaguid,
            description: None,
            attestation_root_certificates: Vec::new(),
            attestation_types: Vec::new(),
            status_reports: Vec::new(),
        }
    }

    /// Does the model produce this attestation type?
    pub fn supports(&self, att_type: AttestationType) -> bool {
        self.attestation_types.contains(&att_type)
    }

    /// The first status report that means the model must not be trusted, if any.
    pub fn undesirable_status(&self) -> Option<AuthenticatorStatus> {
        self.status_reports
            .iter()
            .map(|sr| sr.status)
            .find(|status| status.is_undesirable())
    }
}

impl TryFrom<&FidoDevice> for MetadataEntry {
    type Error = MetadataError;

    fn try_from(device: &FidoDevice) -> Result<Self, Self::Error> {
        let aaguid = device.aaguid().ok_or(MetadataError::AaguidMissing)?;

        let attestation_root_certificates = device
            .metadata_statement
            .attestation_root_certificates
            .iter()
            .map(|b64| {
                let der = STANDARD.decode(b64)?;
                X509::from_der(&der).map_err(MetadataError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MetadataEntry {
            aaguid,
            description: device.metadata_statement.description.clone(),
            attestation_root_certificates,
            attestation_types: device.metadata_statement.attestation_types.clone(),
            status_reports: device.status_reports.clone(),
        })
    }
}

/// A source of authenticator metadata. Implementations own any caching, refresh and
/// timeouts; lookups are synchronous.
pub trait MetadataService: Send + Sync {
    /// The entry for an authenticator model, if one is known.
    fn get_entry(&self, aaguid: &Uuid) -> Option<MetadataEntry>;

    /// When true, authenticators without metadata are refused instead of skipped.
    fn conformance_testing(&self) -> bool {
        false
    }
}

/// An in memory [MetadataService].
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataService {
    entries: BTreeMap<Uuid, MetadataEntry>,
    conformance_testing: bool,
}

impl StaticMetadataService {
    /// An empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable conformance testing mode.
    pub fn with_conformance_testing(mut self, conformance_testing: bool) -> Self {
        self.conformance_testing = conformance_testing;
        self
    }

    /// Add or replace the entry for `entry.aaguid`.
    pub fn insert(&mut self, entry: MetadataEntry) {
        self.entries.insert(entry.aaguid, entry);
    }

    /// The number of known models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no models are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataService for StaticMetadataService {
    fn get_entry(&self, aaguid: &Uuid) -> Option<MetadataEntry> {
        let entry = self.entries.get(aaguid).cloned();
        trace!(%aaguid, found = entry.is_some(), "metadata lookup");
        entry
    }

    fn conformance_testing(&self) -> bool {
        self.conformance_testing
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataPayload {
    Blob(FidoMds),
    Entries(Vec<FidoDevice>),
}

impl FromStr for StaticMetadataService {
    type Err = MetadataError;

    /// Load from either the full BLOB payload object or a bare array of its entries.
    /// Entries that do not carry an AAGUID (U2F and UAF devices) are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let devices = match serde_json::from_str(s)? {
            MetadataPayload::Blob(mds) => mds.entries,
            MetadataPayload::Entries(entries) => entries,
        };

        let mut service = StaticMetadataService::new();
        for device in devices.iter() {
            match MetadataEntry::try_from(device) {
                Ok(entry) => service.insert(entry),
                Err(MetadataError::AaguidMissing) => {
                    debug!("skipping metadata entry without aaguid");
                }
                Err(e) => {
                    error!(?e, aaguid = ?device.aaguid(), "invalid metadata entry");
                    return Err(e);
                }
            }
        }

        debug!(entries = service.len(), "loaded metadata");
        Ok(service)
    }
}
