//! Types produced and consumed by attestation verification.

use openssl::x509;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttestationError;

/// Representation of an AAGUID
/// <https://www.w3.org/TR/webauthn/#aaguid>
pub type Aaguid = [u8; 16];

/// The AAGUID sent by authenticators that do not identify their model. This is the
/// required value for the fido-u2f format.
pub const AAGUID_ZERO: Aaguid = [0; 16];

/// A COSE signature algorithm identifier.
///
/// <https://www.iana.org/assignments/cose/cose.xhtml#algorithms>
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum COSEAlgorithm {
    /// ECDSA with SHA-256 on P-256
    ES256 = -7,
    /// ECDSA with SHA-384 on P-384
    ES384 = -35,
    /// ECDSA with SHA-512 on P-521
    ES512 = -36,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256 = -257,
    /// RSASSA-PKCS1-v1_5 with SHA-384
    RS384 = -258,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    RS512 = -259,
    /// RSASSA-PSS with SHA-256
    PS256 = -37,
    /// RSASSA-PSS with SHA-384
    PS384 = -38,
    /// RSASSA-PSS with SHA-512
    PS512 = -39,
    /// EdDSA, Ed25519 only
    EDDSA = -8,
    /// RSASSA-PKCS1-v1_5 with SHA-1. Some TPMs still emit this; it is always refused.
    INSECURE_RS1 = -65535,
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = AttestationError;

    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -257 => Ok(COSEAlgorithm::RS256),
            -258 => Ok(COSEAlgorithm::RS384),
            -259 => Ok(COSEAlgorithm::RS512),
            -37 => Ok(COSEAlgorithm::PS256),
            -38 => Ok(COSEAlgorithm::PS384),
            -39 => Ok(COSEAlgorithm::PS512),
            -8 => Ok(COSEAlgorithm::EDDSA),
            -65535 => Ok(COSEAlgorithm::INSECURE_RS1),
            _ => Err(AttestationError::COSEKeyInvalidAlgorithm),
        }
    }
}

impl From<COSEAlgorithm> for i128 {
    fn from(alg: COSEAlgorithm) -> i128 {
        alg as i32 as i128
    }
}

/// An ECDSACurve identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ECDSACurve {
    // +---------+-------+----------+------------------------------------+
    // | Name    | Value | Key Type | Description                        |
    // +---------+-------+----------+------------------------------------+
    // | P-256   | 1     | EC2      | NIST P-256 also known as secp256r1 |
    // | P-384   | 2     | EC2      | NIST P-384 also known as secp384r1 |
    // | P-521   | 3     | EC2      | NIST P-521 also known as secp521r1 |
    // +---------+-------+----------+------------------------------------+
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
    /// Identifies this curve as SECP384R1
    SECP384R1 = 2,
    /// Identifies this curve as SECP521R1
    SECP521R1 = 3,
}

/// An EDDSACurve identifier. Only Ed25519 is accepted for signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EDDSACurve {
    /// Identifies this OKP as ED25519
    ED25519 = 6,
}

/// A COSE Elliptic Curve Public Key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate.
    pub x: Vec<u8>,
    /// The key's public Y coordinate.
    pub y: Vec<u8>,
}

/// A COSE Octet Key Pair public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEOKPKey {
    /// The curve that this key references.
    pub curve: EDDSACurve,
    /// The public key bytes.
    pub x: Vec<u8>,
}

/// A COSE RSA PublicKey.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSERSAKey {
    /// An RSA modulus
    pub n: Vec<u8>,
    /// An RSA exponent
    pub e: Vec<u8>,
}

/// The type of Key contained within a COSE value.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum COSEKeyType {
    //    +-----------+-------+-----------------------------------------------+
    //    | Name      | Value | Description                                   |
    //    +-----------+-------+-----------------------------------------------+
    //    | OKP       | 1     | Octet Key Pair                                |
    //    | EC2       | 2     | Elliptic Curve Keys w/ x- and y-coordinate    |
    //    |           |       | pair                                          |
    //    | RSA       | 3     | RSA keys                                      |
    //    +-----------+-------+-----------------------------------------------+
    /// Identifies this as an Eliptic Curve octet key pair
    EC_OKP(COSEOKPKey),
    /// Identifies this as an Eliptic Curve EC2 key
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA key
    RSA(COSERSAKey),
}

/// The numeric id of the COSEKeyType used in the CBOR fields.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i64)]
pub enum COSEKeyTypeId {
    /// Octet Key Pair
    EC_OKP = 1,
    /// Elliptic Curve Keys w/ x- and y-coordinate
    EC_EC2 = 2,
    /// RSA
    EC_RSA = 3,
}

/// A credential public key as described by a COSE_Key, or as extracted from a certificate
/// together with the algorithm it is used with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEKey {
    /// The signature algorithm this key is used with
    pub type_: COSEAlgorithm,
    /// The public key
    pub key: COSEKeyType,
}

/// Attested Credential Data
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The guid of the authenticator. May indicate manufacturer.
    pub aaguid: Aaguid,
    /// The credential ID.
    pub credential_id: Vec<u8>,
    /// The credential's public key.
    pub credential_pk: COSEKey,
}

/// Authenticator data as produced during registration.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// Hash of the relying party id.
    pub rp_id_hash: [u8; 32],
    /// The raw flags byte.
    pub flags: u8,
    /// The counter of this credentials activations.
    pub counter: u32,
    /// Flag if the user was present.
    pub user_present: bool,
    /// Flag is the user verified to the device. Implies presence.
    pub user_verified: bool,
    /// Flag that the credential may be backed up.
    pub backup_eligible: bool,
    /// Flag that the credential is currently backed up.
    pub backup_state: bool,
    /// The attested credential data, if the AT flag was set.
    pub acd: Option<AttestedCredentialData>,
    /// The raw extension map, if the ED flag was set.
    pub extensions: Option<serde_cbor_2::Value>,
}

/// The kind of attestation that was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    /// The credential is authenticated by a signing X509 Certificate
    /// from a vendor or provider.
    Basic,
    /// The authenticator signed with the credential private key itself.
    Self_,
    /// The credential is authenticated using a CA, and may provide a
    /// ca chain to validate to it's root.
    AttCa,
    /// The credential is authenticated using an anonymization CA, and may provide a ca chain to
    /// validate to it's root.
    AnonCa,
    /// Elliptic curve direct anonymous attestation. Never produced, verification of this
    /// type always fails.
    ECDAA,
    /// No attestation was provided.
    None,
}

/// The presented certificate chain, leaf first, in the order of `x5c`.
pub type TrustPath = Vec<x509::X509>;

/// Format specific details learnt while verifying the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationMetadata {
    /// no metadata available
    None,
    /// Packed attestation of a known model
    Packed {
        /// The AAGUID of the authenticator
        aaguid: Uuid,
    },
    /// TPM attestation
    Tpm {
        /// The AAGUID of the authenticator
        aaguid: Uuid,
        /// The firmware version reported in certInfo
        firmware_version: u64,
    },
    /// Android key attestation
    AndroidKey {
        /// The keymaster is enforced in a TEE
        is_km_tee: bool,
        /// The attestation is performed in a TEE
        is_attest_tee: bool,
    },
}

/// The outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// The attestation type the statement conveys
    pub attestation_type: AttestationType,
    /// The certificates presented in the statement, leaf first
    pub trust_path: TrustPath,
    /// Format specific metadata
    pub metadata: AttestationMetadata,
}
