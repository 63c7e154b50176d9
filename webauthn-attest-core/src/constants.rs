// Authenticator data flags
// https://www.w3.org/TR/webauthn-3/#authdata-flags
pub(crate) const FLAG_USER_PRESENT: u8 = 1 << 0;
pub(crate) const FLAG_USER_VERIFIED: u8 = 1 << 2;
pub(crate) const FLAG_BACKUP_ELIGIBLE: u8 = 1 << 3;
pub(crate) const FLAG_BACKUP_STATE: u8 = 1 << 4;
pub(crate) const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 1 << 6;
pub(crate) const FLAG_EXTENSION_DATA: u8 = 1 << 7;

pub(crate) const RP_ID_HASH_LEN: usize = 32;
pub(crate) const AAGUID_LEN: usize = 16;
pub(crate) const CLIENT_DATA_HASH_LEN: usize = 32;

// id-fido-gen-ce-aaguid
pub(crate) const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";
// Android key attestation KeyDescription
pub(crate) const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";
// Apple anonymous attestation nonce
pub(crate) const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

// TCG attributes carried in the AIK certificate SAN
pub(crate) const OID_TCG_AT_TPM_MANUFACTURER: &str = "2.23.133.2.1";
pub(crate) const OID_TCG_AT_TPM_MODEL: &str = "2.23.133.2.2";
pub(crate) const OID_TCG_AT_TPM_VERSION: &str = "2.23.133.2.3";
// tcg-kp-AIKCertificate
pub(crate) const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";

// Keymaster tags and values used by the android-key format.
pub(crate) const KM_TAG_PURPOSE: u32 = 1;
pub(crate) const KM_TAG_ALL_APPLICATIONS: u32 = 600;
pub(crate) const KM_TAG_ORIGIN: u32 = 702;
pub(crate) const KM_ORIGIN_GENERATED: u64 = 0;
pub(crate) const KM_PURPOSE_SIGN: u64 = 2;

pub(crate) const PACKED_ATTESTATION_OU: &str = "Authenticator Attestation";
