//! Possible errors that may occur during attestation verification

use der_parser::error::BerError;
use fido_mds::AuthenticatorStatus;
use thiserror::Error;
use uuid::Uuid;

/// A wrapper for `Result<T, AttestationError>`
pub type AttestationResult<T> = core::result::Result<T, AttestationError>;

/// Possible errors that may occur during attestation verification. Every error aborts
/// the verification, there is never a partially trusted result.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum AttestationError {
    #[error("The client data hash must be exactly 32 bytes")]
    ClientDataHashInvalid,

    #[error("Unable to decode CBOR: {0}")]
    ParseCBORFailure(#[from] serde_cbor_2::Error),

    #[error("A CBOR value was not of the expected type ({0})")]
    CBORTypeMismatch(&'static str),

    #[error("The attestation object is missing a required field ({0})")]
    AttestationObjectFieldMissing(&'static str),

    #[error("Unable to decode ASN.1: {0}")]
    ParseASN1Failure(#[from] BerError),

    #[error("Unable to parse a binary structure")]
    ParseNOMFailure,

    #[error("The authenticator data contains unexpected trailing bytes")]
    AuthenticatorDataTrailingBytes,

    #[error("The authenticator data does not contain attested credential data")]
    MissingAttestationCredentialData,

    #[error("The COSE key contains an invalid CBOR value")]
    COSEKeyInvalidCBORValue,

    #[error("The COSE key type is not supported, or does not match its algorithm")]
    COSEKeyInvalidType,

    #[error("The COSE algorithm is not supported")]
    COSEKeyInvalidAlgorithm,

    #[error("The COSE EC2 key curve is not supported, or does not match its algorithm")]
    COSEKeyECDSAInvalidCurve,

    #[error("The COSE EC2 key coordinates have an invalid length")]
    COSEKeyECDSAXYInvalid,

    #[error("The COSE RSA key modulus or exponent is invalid")]
    COSEKeyRSANEInvalid,

    #[error("The COSE OKP key curve is not supported")]
    COSEKeyEDDSAInvalidCurve,

    #[error("The COSE OKP key has an invalid length")]
    COSEKeyEDDSAXInvalid,

    #[error("The certificate public key does not match the declared algorithm")]
    CertificatePublicKeyAlgorithmMismatch,

    #[error("Insecure cryptography (SHA1) was requested and refused")]
    CredentialInsecureCryptography,

    #[error("The attestation format is not supported ({0})")]
    AttestationNotSupported(String),

    #[error("ECDAA attestation is not supported")]
    AttestationEcdaaUnsupported,

    #[error("The attestation statement is not a map")]
    AttestationStatementMapInvalid,

    #[error("The attestation statement is missing sig")]
    AttestationStatementSigMissing,

    #[error("The attestation statement signature is not valid")]
    AttestationStatementSigInvalid,

    #[error("The attestation statement is missing alg")]
    AttestationStatementAlgMissing,

    #[error("The attestation statement alg is not valid")]
    AttestationStatementAlgInvalid,

    #[error("The attestation statement alg does not match the credential public key algorithm")]
    AttestationStatementAlgMismatch,

    #[error("The attestation statement is missing x5c")]
    AttestationStatementX5CMissing,

    #[error("The attestation statement x5c is not valid")]
    AttestationStatementX5CInvalid,

    #[error("The none attestation statement must be empty")]
    AttestationStatementNoneNotEmpty,

    #[error("The attestation statement is missing ver")]
    AttestationStatementVerMissing,

    #[error("The attestation statement ver is not valid")]
    AttestationStatementVerInvalid,

    #[error("The attestation statement ver is not supported")]
    AttestationStatementVerUnsupported,

    #[error("The attestation statement is missing certInfo")]
    AttestationStatementCertInfoMissing,

    #[error("The attestation statement is missing pubArea")]
    AttestationStatementPubAreaMissing,

    #[error("The attestation certificate does not meet requirements ({0})")]
    AttestationCertificateRequirementsNotMet(&'static str),

    #[error("The attestation certificate is not yet valid")]
    AttestationCertificateNotYetValid,

    #[error("The attestation certificate has expired")]
    AttestationCertificateExpired,

    #[error("The attestation certificate AAGUID does not match the authenticator data")]
    AttestationCertificateAAGUIDMismatch,

    #[error("The attestation certificate does not carry an AAGUID extension")]
    AttestationCertificateAAGUIDMissing,

    #[error("The attestation certificate extension {0} must not be critical")]
    AttestationCertificateExtensionCritical(&'static str),

    #[error("The attestation certificate is missing a required extension")]
    AttestationStatementMissingExtension,

    #[error("The fido-u2f format requires an all zero AAGUID")]
    AttestationFidoU2fAaguidNotZero,

    #[error("The fido-u2f attestation key must be an EC key on P-256")]
    AttestationFidoU2fKeyInvalid,

    #[error("The credential public key does not match the certificate subject public key")]
    AttestationCredentialSubjectKeyMismatch,

    #[error("The attestation certificate nonce does not match")]
    AttestationCertificateNonceMismatch,

    #[error("The android key attestation challenge does not match the client data hash")]
    AttestationAndroidKeyChallengeMismatch,

    #[error("The android key is valid for all applications")]
    AttestationAndroidKeyAllApplications,

    #[error("The android key origin is not KM_ORIGIN_GENERATED")]
    AttestationAndroidKeyOriginInvalid,

    #[error("The android key purpose is not KM_PURPOSE_SIGN")]
    AttestationAndroidKeyPurposeInvalid,

    #[error("Neither android authorization list contains both origin and purpose")]
    AttestationAndroidKeyAuthorizationListMissing,

    #[error("The TPM magic is not TPM_GENERATED_VALUE")]
    AttestationTpmMagicInvalid,

    #[error("The TPM attestation type is not TPM_ST_ATTEST_CERTIFY")]
    AttestationTpmStInvalid,

    #[error("The TPM extra data is not valid")]
    AttestationTpmExtraDataInvalid,

    #[error("The TPM extra data does not match the attested data")]
    AttestationTpmExtraDataMismatch,

    #[error("The TPM public area does not match the credential public key")]
    AttestationTpmPubAreaMismatch,

    #[error("The TPM public area name algorithm is not supported")]
    AttestationTpmPubAreaHashUnknown,

    #[error("The TPM certified name does not match the public area")]
    AttestationTpmPubAreaHashInvalid,

    #[error("The TPM attested structure is not a certify info")]
    AttestationTpmAttestCertifyInvalid,

    #[error("The attestation certificate chain is not trusted: {0}")]
    AttestationChainNotTrusted(String),

    #[error("The attestation trust store is empty")]
    AttestationTrustStoreEmpty,

    #[error("The attestation trust path has no leaf certificate")]
    AttestationLeafCertMissing,

    #[error("The attestation certificate is not self signed")]
    AttestationLeafNotSelfSigned,

    #[error("Root validation was required but no metadata service is available")]
    MetadataServiceUnavailable,

    #[error("No metadata is available for authenticator {0}")]
    AttestationMetadataMissing(Uuid),

    #[error("The authenticator has an undesirable status {0:?}")]
    AuthenticatorStatusUndesirable(AuthenticatorStatus),

    #[error("OpenSSL Error: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),
}

impl From<nom::Err<BerError>> for AttestationError {
    fn from(e: nom::Err<BerError>) -> Self {
        AttestationError::ParseASN1Failure(e.into())
    }
}
