//! The serialised types of the fido metadata service payload as defined by
//! <https://fidoalliance.org/specs/mds/fido-metadata-service-v3.0-ps-20210518.html>
//!
//! Only the members needed to make attestation trust decisions are modelled. Unknown members
//! are ignored so that newer payloads still load.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// A type of attestation an authenticator model may produce.
pub enum AttestationType {
    /// basic_full
    #[serde(rename = "basic_full")]
    BasicFull,
    /// basic_surrogate
    #[serde(rename = "basic_surrogate")]
    BasicSurrogate,
    /// attca
    #[serde(rename = "attca")]
    AttCa,
    /// anonca
    #[serde(rename = "anonca")]
    AnonCa,
    /// ecdaa
    #[serde(rename = "ecdaa")]
    Ecdaa,
    /// none
    #[serde(rename = "none")]
    None,
}

/// The fido certification status of the device associated to this aaguid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuthenticatorStatus {
    /// The device is NOT fido certified
    #[serde(rename = "NOT_FIDO_CERTIFIED")]
    NotFidoCertified,
    /// The device is fido certified. Superseded by FIDO_CERTIFIED_L1.
    #[serde(rename = "FIDO_CERTIFIED")]
    FidoCertified,
    /// Malware is able to bypass the user verification of this authenticator.
    #[serde(rename = "USER_VERIFICATION_BYPASS")]
    UserVerificationBypass,
    /// An attestation key for this authenticator is known to be compromised.
    #[serde(rename = "ATTESTATION_KEY_COMPROMISE")]
    AttestationKeyCompromise,
    /// Weaknesses allow registered keys to be compromised remotely.
    #[serde(rename = "USER_KEY_REMOTE_COMPROMISE")]
    UserKeyRemoteCompromise,
    /// Keys can be extracted by an adversary in physical possession of the device.
    #[serde(rename = "USER_KEY_PHYSICAL_COMPROMISE")]
    UserKeyPhysicalCompromise,
    /// A software or firmware update is available for the device.
    #[serde(rename = "UPDATE_AVAILABLE")]
    UpdateAvailable,
    /// The FIDO Alliance has determined that this authenticator should not be trusted for any
    /// reason.
    #[serde(rename = "REVOKED")]
    Revoked,
    /// The vendor has submitted the self-certification checklist.
    #[serde(rename = "SELF_ASSERTION_SUBMITTED")]
    SelfAssertionSubmitted,
    /// This device is certified at level 1
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    /// This device is certified at level 1 plus
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    /// This device is certified at level 2
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    /// This device is certified at level 2 plus
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    /// This device is certified at level 3
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    /// This device is certified at level 3 plus
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
}

impl AuthenticatorStatus {
    /// A status that means new registrations of this model must be refused.
    pub fn is_undesirable(self) -> bool {
        matches!(
            self,
            AuthenticatorStatus::UserVerificationBypass
                | AuthenticatorStatus::AttestationKeyCompromise
                | AuthenticatorStatus::UserKeyRemoteCompromise
                | AuthenticatorStatus::UserKeyPhysicalCompromise
                | AuthenticatorStatus::Revoked
        )
    }
}

impl fmt::Display for AuthenticatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Contains an AuthenticatorStatus and additional data associated with it, if any.
///
/// The latest StatusReport entry reflects the "current" status.
pub struct StatusReport {
    /// The status of the authenticator.
    pub status: AuthenticatorStatus,
    /// ISO-8601 formatted date since when the status code was set, if applicable.
    pub effective_date: Option<String>,
    /// The authenticatorVersion that this status report relates to.
    pub authenticator_version: Option<u32>,
    /// Base64 (not base64url!) DER certificate related to the current status, if applicable.
    pub certificate: Option<String>,
    /// HTTPS URL where additional information may be found related to the current status.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// The members of a metadata statement used for attestation decisions.
pub struct MetadataStatement {
    /// The Authenticator Attestation GUID.
    pub aaguid: Option<Uuid>,
    /// A human-readable, short description of the authenticator, in English.
    pub description: Option<String>,
    /// The supported attestation type(s).
    #[serde(default)]
    pub attestation_types: Vec<AttestationType>,
    /// Base64 (not base64url!) DER trust anchors for the attestation certificates of this model.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One entry of the metadata payload.
pub struct FidoDevice {
    /// Set for FIDO2 devices. U2F and UAF devices use other identifiers and are skipped.
    pub aaguid: Option<Uuid>,
    /// The FIDOMetadataStatement pertaining to this device.
    pub metadata_statement: MetadataStatement,
    /// An array of status reports applicable to this authenticator.
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    /// ISO-8601 formatted date since when the status report array was set to the current value.
    pub time_of_last_status_change: Option<String>,
}

impl FidoDevice {
    /// The AAGUID of the device, from the entry or its metadata statement.
    pub fn aaguid(&self) -> Option<Uuid> {
        self.aaguid.or(self.metadata_statement.aaguid)
    }
}

impl fmt::Display for FidoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(f, "FidoDevice {s}")
    }
}

/// The decoded payload of the metadata BLOB. The signature over the BLOB is checked by
/// whoever fetched it; this is the JSON it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidoMds {
    /// The set of device metadata
    pub entries: Vec<FidoDevice>,
    /// legal header
    pub legal_header: Option<String>,
    /// ISO-8601 formatted date when the next update will be provided at latest.
    pub next_update: Option<String>,
    /// The serial number of this Metadata BLOB Payload.
    pub no: Option<u32>,
}
