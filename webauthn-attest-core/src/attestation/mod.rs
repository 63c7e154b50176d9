//! Attestation statement verification.
//!
//! Each attestation statement format has its own verification procedure. They share one
//! contract: given the statement, the authenticator data and the client data hash, either
//! produce a [VerificationResult] or fail. The format is selected by the `fmt` member of the
//! attestation object.
//!
//! <https://w3c.github.io/webauthn/#sctn-defined-attestation-formats>

mod android_key;
mod apple;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

use std::collections::BTreeMap;
use std::fmt;

use fido_mds::MetadataService;
use openssl::x509::{X509Ref, X509};
use serde::{Deserialize, Serialize};
use serde_cbor_2::Value;

use crate::asn1::check_der_canonical;
use crate::cbor::{decode_cbor, map_get};
use crate::constants::*;
use crate::crypto::find_extension;
use crate::error::AttestationError;
use crate::interface::*;

pub use self::android_key::AndroidKeyAttestationExtensionData;
pub use self::apple::AppleAnonymousNonce;

/// The attestation object returned by the authenticator during registration.
#[derive(Debug, Clone)]
pub struct AttestationObject {
    /// The attestation statement format identifier.
    pub fmt: String,
    /// The format specific attestation statement.
    pub att_stmt: Value,
    /// The raw authenticator data. It is kept as bytes since signatures cover this exact
    /// encoding.
    pub auth_data_bytes: Vec<u8>,
}

impl AttestationObject {
    /// Assemble an attestation object from its parts.
    pub fn new(fmt: impl Into<String>, att_stmt: Value, auth_data_bytes: Vec<u8>) -> Self {
        AttestationObject {
            fmt: fmt.into(),
            att_stmt,
            auth_data_bytes,
        }
    }
}

impl TryFrom<&[u8]> for AttestationObject {
    type Error = AttestationError;

    /// Decode the CBOR attestation object `{ "fmt": tstr, "attStmt": map, "authData": bstr }`.
    fn try_from(data: &[u8]) -> Result<AttestationObject, AttestationError> {
        let value = decode_cbor(data)?;
        let m = cbor_try_map!(&value)?;

        let fmt = map_get(m, "fmt")
            .ok_or(AttestationError::AttestationObjectFieldMissing("fmt"))
            .and_then(|v| cbor_try_string!(v))?;
        let att_stmt = map_get(m, "attStmt")
            .ok_or(AttestationError::AttestationObjectFieldMissing("attStmt"))?;
        let auth_data = map_get(m, "authData")
            .ok_or(AttestationError::AttestationObjectFieldMissing("authData"))
            .and_then(|v| cbor_try_bytes!(v))?;

        Ok(AttestationObject {
            fmt: fmt.clone(),
            att_stmt: att_stmt.clone(),
            auth_data_bytes: auth_data.clone(),
        })
    }
}

/// The attestation statement formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AttestationFormat {
    /// Packed attestation
    Packed,
    /// TPM attestation (like Microsoft)
    Tpm,
    /// Android hardware attestation
    AndroidKey,
    /// Older Android Safety Net. Recognised, never verified.
    AndroidSafetyNet,
    /// Old U2F attestation type
    FIDOU2F,
    /// Apple touchID/faceID
    AppleAnonymous,
    /// No attestation
    None,
}

impl TryFrom<&str> for AttestationFormat {
    type Error = AttestationError;

    fn try_from(a: &str) -> Result<AttestationFormat, Self::Error> {
        match a {
            "packed" => Ok(AttestationFormat::Packed),
            "tpm" => Ok(AttestationFormat::Tpm),
            "android-key" => Ok(AttestationFormat::AndroidKey),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "fido-u2f" => Ok(AttestationFormat::FIDOU2F),
            "apple" => Ok(AttestationFormat::AppleAnonymous),
            "none" => Ok(AttestationFormat::None),
            _ => Err(AttestationError::AttestationNotSupported(a.to_string())),
        }
    }
}

impl AttestationFormat {
    /// The `fmt` identifier of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            AttestationFormat::Packed => "packed",
            AttestationFormat::Tpm => "tpm",
            AttestationFormat::AndroidKey => "android-key",
            AttestationFormat::AndroidSafetyNet => "android-safetynet",
            AttestationFormat::FIDOU2F => "fido-u2f",
            AttestationFormat::AppleAnonymous => "apple",
            AttestationFormat::None => "none",
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification policy supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationPolicy {
    /// Require packed and fido-u2f attestations to chain to a root listed by the metadata
    /// service, and refuse models with an undesirable status. Requires a metadata service.
    #[serde(default)]
    pub require_valid_attestation_root: bool,
    /// Skip certificate validity window checks. Only for tests with fixed vectors.
    #[serde(default)]
    pub danger_disable_certificate_time_checks: bool,
}

/// Verifies attestation objects under a policy, with an optional metadata service.
pub struct AttestationVerifier<'a> {
    policy: AttestationPolicy,
    metadata: Option<&'a dyn MetadataService>,
}

impl<'a> fmt::Debug for AttestationVerifier<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationVerifier")
            .field("policy", &self.policy)
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl<'a> AttestationVerifier<'a> {
    /// A verifier without a metadata service.
    pub fn new(policy: AttestationPolicy) -> Self {
        AttestationVerifier {
            policy,
            metadata: None,
        }
    }

    /// Consult `metadata` for trust roots and authenticator status.
    pub fn with_metadata(mut self, metadata: &'a dyn MetadataService) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The policy in effect.
    pub fn policy(&self) -> &AttestationPolicy {
        &self.policy
    }

    pub(crate) fn metadata(&self) -> Option<&'a dyn MetadataService> {
        self.metadata
    }

    /// Verify an attestation object against the hash of the client data JSON that was
    /// signed with it.
    pub fn verify(
        &self,
        att_obj: &AttestationObject,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult, AttestationError> {
        if client_data_hash.len() != CLIENT_DATA_HASH_LEN {
            return Err(AttestationError::ClientDataHashInvalid);
        }

        let format = AttestationFormat::try_from(att_obj.fmt.as_str())?;

        let auth_data = AuthenticatorData::try_from(att_obj.auth_data_bytes.as_slice())?;
        let acd = auth_data
            .acd
            .as_ref()
            .ok_or(AttestationError::MissingAttestationCredentialData)?;

        let att_stmt = cbor_try_map!(&att_obj.att_stmt)
            .map_err(|_| AttestationError::AttestationStatementMapInvalid)?;

        let input = AttestationInput {
            att_stmt,
            auth_data: &auth_data,
            auth_data_bytes: &att_obj.auth_data_bytes,
            acd,
            client_data_hash,
        };

        trace!(%format, "verifying attestation");

        let result = match format {
            AttestationFormat::Packed => packed::verify_packed_attestation(&input, self),
            AttestationFormat::FIDOU2F => fido_u2f::verify_fidou2f_attestation(&input, self),
            AttestationFormat::AndroidKey => {
                android_key::verify_android_key_attestation(&input, self)
            }
            AttestationFormat::AppleAnonymous => {
                apple::verify_apple_anonymous_attestation(&input, self)
            }
            AttestationFormat::Tpm => tpm::verify_tpm_attestation(&input, self),
            AttestationFormat::None => none::verify_none_attestation(&input),
            AttestationFormat::AndroidSafetyNet => {
                debug!("android-safetynet is not verifiable");
                Err(AttestationError::AttestationNotSupported(
                    format.as_str().to_string(),
                ))
            }
        };

        match &result {
            Ok(res) => debug!(
                %format,
                attestation_type = ?res.attestation_type,
                chain_len = res.trust_path.len(),
                "attestation verified"
            ),
            Err(e) => debug!(%format, ?e, "attestation rejected"),
        }

        result
    }
}

/// The decoded parts shared by every format verifier.
pub(crate) struct AttestationInput<'a> {
    pub att_stmt: &'a BTreeMap<Value, Value>,
    pub auth_data: &'a AuthenticatorData,
    pub auth_data_bytes: &'a [u8],
    pub acd: &'a AttestedCredentialData,
    pub client_data_hash: &'a [u8],
}

impl<'a> AttestationInput<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        map_get(self.att_stmt, key)
    }

    /// `authenticatorData || clientDataHash`, the data every format signs over.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.auth_data_bytes.len() + self.client_data_hash.len());
        data.extend_from_slice(self.auth_data_bytes);
        data.extend_from_slice(self.client_data_hash);
        data
    }

    pub fn alg(&self) -> Result<COSEAlgorithm, AttestationError> {
        let alg_value = self
            .get("alg")
            .ok_or(AttestationError::AttestationStatementAlgMissing)?;
        cbor_try_i128!(alg_value)
            .map_err(|_| AttestationError::AttestationStatementAlgInvalid)
            .and_then(|v| {
                COSEAlgorithm::try_from(v).map_err(|_| AttestationError::COSEKeyInvalidAlgorithm)
            })
    }

    pub fn sig(&self) -> Result<&'a [u8], AttestationError> {
        let sig_value = self
            .get("sig")
            .ok_or(AttestationError::AttestationStatementSigMissing)?;
        cbor_try_bytes!(sig_value)
            .map(|s| s.as_slice())
            .map_err(|_| AttestationError::AttestationStatementSigInvalid)
    }

    /// The decoded `x5c` chain, if present. A present chain must hold at least the leaf.
    pub fn x5c(&self) -> Result<Option<TrustPath>, AttestationError> {
        let Some(x5c) = self.get("x5c") else {
            return Ok(None);
        };

        // x5c: [ attestnCert: bytes, * (caCert: bytes) ]
        let x5c_array_ref =
            cbor_try_array!(x5c).map_err(|_| AttestationError::AttestationStatementX5CInvalid)?;

        let arr_x509 = x5c_array_ref
            .iter()
            .map(|values| {
                cbor_try_bytes!(values)
                    .map_err(|_| AttestationError::AttestationStatementX5CInvalid)
                    .and_then(|b| {
                        X509::from_der(b).map_err(|e| {
                            debug!(?e, "x5c certificate");
                            AttestationError::AttestationStatementX5CInvalid
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if arr_x509.is_empty() {
            return Err(AttestationError::AttestationStatementX5CInvalid);
        }

        Ok(Some(arr_x509))
    }

    pub fn x5c_required(&self) -> Result<TrustPath, AttestationError> {
        self.x5c()?
            .ok_or(AttestationError::AttestationStatementX5CMissing)
    }
}

/// x509 certificate extensions are validated by checking that the value of the extension is
/// equal to some other value the verifier computed.
pub trait AttestationX509Extension {
    /// the type of the value in the certificate extension
    type Output: Eq;

    /// the dotted oid of the extension
    const OID: &'static str;

    /// if `true`, then validating this certificate fails if this extension is missing
    const IS_REQUIRED: bool;

    /// if `true`, the extension must not be marked critical
    const MUST_NOT_BE_CRITICAL: bool = false;

    /// what error to return if the value in the extension is not equal to the expected value
    const VALIDATION_ERROR: AttestationError;

    /// how to parse the value out of the certificate extension
    fn parse(value: &[u8]) -> Result<(Self::Output, AttestationMetadata), AttestationError>;
}

/// The FIDO AAGUID x509 extension, id-fido-gen-ce-aaguid.
pub struct FidoGenCeAaguid;

impl AttestationX509Extension for FidoGenCeAaguid {
    type Output = Aaguid;

    const OID: &'static str = OID_FIDO_GEN_CE_AAGUID;

    const IS_REQUIRED: bool = false;

    const MUST_NOT_BE_CRITICAL: bool = true;

    const VALIDATION_ERROR: AttestationError =
        AttestationError::AttestationCertificateAAGUIDMismatch;

    // The extension value is the AAGUID as a 16 byte OCTET STRING.
    fn parse(value: &[u8]) -> Result<(Self::Output, AttestationMetadata), AttestationError> {
        check_der_canonical(value)?;
        let (_, aaguid) = der_parser::der::parse_der_octetstring(value)?;
        let aaguid: Aaguid = aaguid
            .as_slice()?
            .try_into()
            .map_err(|_| der_parser::error::BerError::InvalidLength)?;
        Ok((aaguid, AttestationMetadata::None))
    }
}

/// Read an attestation extension out of a certificate, if it is present.
pub fn read_extension<T>(
    x509: &X509Ref,
) -> Result<Option<(T::Output, AttestationMetadata)>, AttestationError>
where
    T: AttestationX509Extension,
{
    let Some(ext) = find_extension(x509, T::OID)? else {
        return Ok(None);
    };

    if T::MUST_NOT_BE_CRITICAL && ext.critical {
        return Err(AttestationError::AttestationCertificateExtensionCritical(
            T::OID,
        ));
    }

    T::parse(&ext.value).map(Some)
}

/// Validate that an x509 extension in the certificate holds the expected value.
pub fn validate_extension<T>(
    x509: &X509Ref,
    data: &T::Output,
) -> Result<AttestationMetadata, AttestationError>
where
    T: AttestationX509Extension,
{
    match read_extension::<T>(x509)? {
        Some((output, metadata)) => {
            if &output == data {
                Ok(metadata)
            } else {
                Err(T::VALIDATION_ERROR)
            }
        }
        None if T::IS_REQUIRED => Err(AttestationError::AttestationStatementMissingExtension),
        None => Ok(AttestationMetadata::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::encode_cbor;
    use openssl::bn::BigNumContext;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;

    fn registration_auth_data() -> Vec<u8> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = EcKey::generate(&group).unwrap();
        let mut ctx = BigNumContext::new().unwrap();
        let mut x = openssl::bn::BigNum::new().unwrap();
        let mut y = openssl::bn::BigNum::new().unwrap();
        key.public_key()
            .affine_coordinates(&group, &mut x, &mut y, &mut ctx)
            .unwrap();
        let cose = COSEKey {
            type_: COSEAlgorithm::ES256,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve: ECDSACurve::SECP256R1,
                x: x.to_vec_padded(32).unwrap(),
                y: y.to_vec_padded(32).unwrap(),
            }),
        };

        let mut data = vec![0x11; 32];
        data.push(0x41);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&AAGUID_ZERO);
        data.extend_from_slice(&[0x00, 0x04, 0xde, 0xad, 0xbe, 0xef]);
        data.extend_from_slice(&cose.to_cbor_bytes().unwrap());
        data
    }

    fn attestation_object_bytes(fmt: &str, att_stmt: Value, auth_data: Vec<u8>) -> Vec<u8> {
        let mut m = BTreeMap::new();
        m.insert(Value::Text("fmt".to_string()), Value::Text(fmt.to_string()));
        m.insert(Value::Text("attStmt".to_string()), att_stmt);
        m.insert(Value::Text("authData".to_string()), Value::Bytes(auth_data));
        encode_cbor(&Value::Map(m)).unwrap()
    }

    #[test]
    fn attestation_format_names() {
        for fmt in [
            "packed",
            "tpm",
            "android-key",
            "android-safetynet",
            "fido-u2f",
            "apple",
            "none",
        ] {
            assert_eq!(AttestationFormat::try_from(fmt).unwrap().as_str(), fmt);
        }
        assert!(matches!(
            AttestationFormat::try_from("solo"),
            Err(AttestationError::AttestationNotSupported(f)) if f == "solo"
        ));
    }

    #[test]
    fn decode_and_verify_none() {
        let auth_data = registration_auth_data();
        let raw = attestation_object_bytes("none", Value::Map(BTreeMap::new()), auth_data.clone());
        let att_obj = AttestationObject::try_from(raw.as_slice()).unwrap();
        assert_eq!(att_obj.fmt, "none");
        assert_eq!(att_obj.auth_data_bytes, auth_data);

        let verifier = AttestationVerifier::new(AttestationPolicy::default());
        let res = verifier.verify(&att_obj, &[0; 32]).unwrap();
        assert_eq!(res.attestation_type, AttestationType::None);
        assert!(res.trust_path.is_empty());
        assert_eq!(res.metadata, AttestationMetadata::None);

        assert!(matches!(
            verifier.verify(&att_obj, &[0; 31]),
            Err(AttestationError::ClientDataHashInvalid)
        ));
    }

    #[test]
    fn verify_rejects_unusable_objects() {
        let verifier = AttestationVerifier::new(AttestationPolicy::default());

        let att_obj = AttestationObject::new(
            "android-safetynet",
            Value::Map(BTreeMap::new()),
            registration_auth_data(),
        );
        assert!(matches!(
            verifier.verify(&att_obj, &[0; 32]),
            Err(AttestationError::AttestationNotSupported(_))
        ));

        let att_obj = AttestationObject::new("none", Value::Array(vec![]), registration_auth_data());
        assert!(matches!(
            verifier.verify(&att_obj, &[0; 32]),
            Err(AttestationError::AttestationStatementMapInvalid)
        ));

        // Clear the AT flag and drop the credential.
        let mut auth_data = registration_auth_data();
        auth_data.truncate(37);
        auth_data[32] = 0x01;
        let att_obj = AttestationObject::new("none", Value::Map(BTreeMap::new()), auth_data);
        assert!(matches!(
            verifier.verify(&att_obj, &[0; 32]),
            Err(AttestationError::MissingAttestationCredentialData)
        ));
    }

    #[test]
    fn decode_attestation_object_missing_fields() {
        // { "fmt": "none", "attStmt": {} }
        let data = hex_literal::hex!("a2 63666d74 646e6f6e65 67617474 53746d74 a0");
        assert!(matches!(
            AttestationObject::try_from(data.as_slice()),
            Err(AttestationError::AttestationObjectFieldMissing("authData"))
        ));
        assert!(AttestationObject::try_from([0xa0, 0x00].as_slice()).is_err());
    }

    const AAGUID: [u8; 16] = hex_literal::hex!("000102030405060708090a0b0c0d0e0f");

    #[test]
    fn aaguid_extension() {
        let value = [&hex_literal::hex!("04 10")[..], &AAGUID].concat();
        let (aaguid, metadata) = FidoGenCeAaguid::parse(&value).unwrap();
        assert_eq!(aaguid, AAGUID);
        assert_eq!(metadata, AttestationMetadata::None);

        // Too short, not an octet string, trailing bytes.
        assert!(FidoGenCeAaguid::parse(&hex_literal::hex!("04 02 00 01")).is_err());
        let value = [&hex_literal::hex!("0c 10")[..], &AAGUID].concat();
        assert!(FidoGenCeAaguid::parse(&value).is_err());
        let value = [&hex_literal::hex!("04 10")[..], &AAGUID, &[0x00]].concat();
        assert!(FidoGenCeAaguid::parse(&value).is_err());
    }

    #[test]
    fn aaguid_extension_non_canonical() {
        // Long form length for a 16 byte value.
        let value = [&hex_literal::hex!("04 81 10")[..], &AAGUID].concat();
        assert!(matches!(
            FidoGenCeAaguid::parse(&value),
            Err(AttestationError::ParseASN1Failure(_))
        ));

        // High tag number form for OCTET STRING.
        let value = [&hex_literal::hex!("1f 04 10")[..], &AAGUID].concat();
        assert!(matches!(
            FidoGenCeAaguid::parse(&value),
            Err(AttestationError::ParseASN1Failure(_))
        ));
    }
}
