//! Cryptographic operation wrapper for attestation verification. This module exists to
//! allow ease of auditing and to keep the cryptographic provider in one place. It uses
//! OpenSSL as the primitive provider, and `x509-parser` to enumerate certificate extensions.

#![allow(non_camel_case_types)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    hash::{self, MessageDigest},
    nid::Nid,
    pkey::{Id, PKey, Public},
    rsa::{Padding, Rsa},
    sha,
    sign::{RsaPssSaltlen, Verifier},
    x509::{X509Ref, X509VerifyResult},
};
use serde_cbor_2::Value;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;

use crate::cbor::encode_cbor;
use crate::constants::*;
use crate::error::AttestationError;
use crate::interface::*;

// COSE_Key map labels, https://www.rfc-editor.org/rfc/rfc9053
const COSE_KEY_KTY: i128 = 1;
const COSE_KEY_ALG: i128 = 3;
const COSE_KEY_CRV: i128 = -1;
const COSE_KEY_X: i128 = -2;
const COSE_KEY_Y: i128 = -3;
const COSE_KEY_RSA_N: i128 = -1;
const COSE_KEY_RSA_E: i128 = -2;

const RSA_MIN_MODULUS_LEN: usize = 256;
const RSA_MAX_MODULUS_LEN: usize = 512;
const RSA_MAX_EXPONENT_LEN: usize = 4;

impl TryFrom<i128> for ECDSACurve {
    type Error = AttestationError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            _ => Err(AttestationError::COSEKeyECDSAInvalidCurve),
        }
    }
}

impl ECDSACurve {
    /// The length in bytes of one affine coordinate on this curve.
    pub fn coordinate_size(self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
            ECDSACurve::SECP384R1 => 48,
            ECDSACurve::SECP521R1 => 66,
        }
    }

    fn to_openssl_nid(self) -> Nid {
        match self {
            ECDSACurve::SECP256R1 => Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => Nid::SECP384R1,
            ECDSACurve::SECP521R1 => Nid::SECP521R1,
        }
    }

    fn from_openssl_nid(nid: Nid) -> Option<Self> {
        match nid {
            Nid::X9_62_PRIME256V1 => Some(ECDSACurve::SECP256R1),
            Nid::SECP384R1 => Some(ECDSACurve::SECP384R1),
            Nid::SECP521R1 => Some(ECDSACurve::SECP521R1),
            _ => None,
        }
    }

    /// The curve an ECDSA algorithm is defined on.
    fn from_alg(alg: COSEAlgorithm) -> Option<Self> {
        match alg {
            COSEAlgorithm::ES256 => Some(ECDSACurve::SECP256R1),
            COSEAlgorithm::ES384 => Some(ECDSACurve::SECP384R1),
            COSEAlgorithm::ES512 => Some(ECDSACurve::SECP521R1),
            _ => None,
        }
    }
}

impl TryFrom<i128> for EDDSACurve {
    type Error = AttestationError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            6 => Ok(EDDSACurve::ED25519),
            _ => Err(AttestationError::COSEKeyEDDSAInvalidCurve),
        }
    }
}

impl EDDSACurve {
    /// The length in bytes of a public key on this curve.
    pub fn coordinate_size(self) -> usize {
        match self {
            EDDSACurve::ED25519 => 32,
        }
    }
}

impl COSEAlgorithm {
    fn is_rsa(self) -> bool {
        matches!(
            self,
            COSEAlgorithm::RS256
                | COSEAlgorithm::RS384
                | COSEAlgorithm::RS512
                | COSEAlgorithm::PS256
                | COSEAlgorithm::PS384
                | COSEAlgorithm::PS512
                | COSEAlgorithm::INSECURE_RS1
        )
    }

    fn is_pss(self) -> bool {
        matches!(
            self,
            COSEAlgorithm::PS256 | COSEAlgorithm::PS384 | COSEAlgorithm::PS512
        )
    }
}

/// The message digest implied by a signature algorithm. SHA-1 is always refused and EdDSA
/// signs the message itself, so neither has a digest here.
pub(crate) fn hash_from_alg(alg: COSEAlgorithm) -> Result<MessageDigest, AttestationError> {
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 | COSEAlgorithm::PS256 => {
            Ok(MessageDigest::sha256())
        }
        COSEAlgorithm::ES384 | COSEAlgorithm::RS384 | COSEAlgorithm::PS384 => {
            Ok(MessageDigest::sha384())
        }
        COSEAlgorithm::ES512 | COSEAlgorithm::RS512 | COSEAlgorithm::PS512 => {
            Ok(MessageDigest::sha512())
        }
        COSEAlgorithm::INSECURE_RS1 => {
            warn!("INSECURE SHA1 USAGE DETECTED");
            Err(AttestationError::CredentialInsecureCryptography)
        }
        COSEAlgorithm::EDDSA => {
            debug!(?alg, "no digest for algorithm");
            Err(AttestationError::COSEKeyInvalidType)
        }
    }
}

/// Hash `input` with the digest implied by `alg`.
pub(crate) fn only_hash_from_type(
    alg: COSEAlgorithm,
    input: &[u8],
) -> Result<Vec<u8>, AttestationError> {
    let md = hash_from_alg(alg)?;
    Ok(hash::hash(md, input)?.to_vec())
}

pub(crate) fn compute_sha256(data: &[u8]) -> [u8; 32] {
    sha::sha256(data)
}

fn cose_get<'a>(
    m: &'a BTreeMap<Value, Value>,
    label: i128,
) -> Result<&'a Value, AttestationError> {
    m.get(&Value::Integer(label))
        .ok_or(AttestationError::COSEKeyInvalidCBORValue)
}

impl TryFrom<&Value> for COSEKey {
    type Error = AttestationError;
    fn try_from(d: &Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        // https://www.w3.org/TR/webauthn/#sctn-encoded-credPubKey-examples
        // {
        //     1: 2,     ; kty: EC2 key type
        //     3: -7,    ; alg: ES256 signature algorithm
        //    -1: 1,     ; crv: P-256 curve
        //    -2: x,     ; x-coordinate as byte string 32 bytes in length
        //    -3: y      ; y-coordinate as byte string 32 bytes in length
        // }
        let key_type = cbor_try_i128!(cose_get(m, COSE_KEY_KTY)?)?;
        let type_ = cbor_try_i128!(cose_get(m, COSE_KEY_ALG)?).and_then(COSEAlgorithm::try_from)?;

        let cose_key = if key_type == COSEKeyTypeId::EC_EC2 as i128 {
            let curve = cbor_try_i128!(cose_get(m, COSE_KEY_CRV)?).and_then(ECDSACurve::try_from)?;

            // The curve must be the one the algorithm is defined over.
            if ECDSACurve::from_alg(type_) != Some(curve) {
                debug!(?curve, ?type_, "ec2 curve does not match algorithm");
                return Err(AttestationError::COSEKeyECDSAInvalidCurve);
            }

            let x = cbor_try_bytes!(cose_get(m, COSE_KEY_X)?)?;
            let y = cbor_try_bytes!(cose_get(m, COSE_KEY_Y)?)?;

            let coord_len = curve.coordinate_size();
            if x.len() != coord_len || y.len() != coord_len {
                return Err(AttestationError::COSEKeyECDSAXYInvalid);
            }

            COSEKey {
                type_,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.clone(),
                    y: y.clone(),
                }),
            }
        } else if key_type == COSEKeyTypeId::EC_RSA as i128 && type_.is_rsa() {
            let n = cbor_try_bytes!(cose_get(m, COSE_KEY_RSA_N)?)?;
            let e = cbor_try_bytes!(cose_get(m, COSE_KEY_RSA_E)?)?;

            if n.len() < RSA_MIN_MODULUS_LEN
                || n.len() > RSA_MAX_MODULUS_LEN
                || e.is_empty()
                || e.len() > RSA_MAX_EXPONENT_LEN
            {
                return Err(AttestationError::COSEKeyRSANEInvalid);
            }

            COSEKey {
                type_,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.clone(),
                    e: e.clone(),
                }),
            }
        } else if key_type == COSEKeyTypeId::EC_OKP as i128 && type_ == COSEAlgorithm::EDDSA {
            // https://datatracker.ietf.org/doc/html/rfc8152#section-13.2
            let curve = cbor_try_i128!(cose_get(m, COSE_KEY_CRV)?).and_then(EDDSACurve::try_from)?;
            let x = cbor_try_bytes!(cose_get(m, COSE_KEY_X)?)?;

            if x.len() != curve.coordinate_size() {
                return Err(AttestationError::COSEKeyEDDSAXInvalid);
            }

            COSEKey {
                type_,
                key: COSEKeyType::EC_OKP(COSEOKPKey {
                    curve,
                    x: x.clone(),
                }),
            }
        } else {
            debug!(?key_type, ?type_, "AttestationError::COSEKeyInvalidType");
            return Err(AttestationError::COSEKeyInvalidType);
        };

        // The rfc additionally states:
        //   "   Applications MUST check that the curve and the key type are
        //     consistent and reject a key if they are not."
        // this means feeding the values to openssl to validate them for us!
        cose_key.validate()?;
        Ok(cose_key)
    }
}

impl TryFrom<(COSEAlgorithm, &X509Ref)> for COSEKey {
    type Error = AttestationError;
    fn try_from((alg, certificate): (COSEAlgorithm, &X509Ref)) -> Result<COSEKey, Self::Error> {
        let pkey = certificate.public_key()?;

        let key = match pkey.id() {
            Id::EC => {
                let ec_key = pkey.ec_key()?;
                let group = ec_key.group();
                let curve = group
                    .curve_name()
                    .and_then(ECDSACurve::from_openssl_nid)
                    .ok_or(AttestationError::COSEKeyECDSAInvalidCurve)?;

                if ECDSACurve::from_alg(alg) != Some(curve) {
                    debug!(?curve, ?alg, "certificate curve does not match algorithm");
                    return Err(AttestationError::CertificatePublicKeyAlgorithmMismatch);
                }

                let mut ctx = BigNumContext::new()?;
                let mut xbn = BigNum::new()?;
                let mut ybn = BigNum::new()?;
                ec_key
                    .public_key()
                    .affine_coordinates(group, &mut xbn, &mut ybn, &mut ctx)?;

                let coord_len = curve.coordinate_size() as i32;
                COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: xbn.to_vec_padded(coord_len)?,
                    y: ybn.to_vec_padded(coord_len)?,
                })
            }
            Id::RSA if alg.is_rsa() => {
                let rsa = pkey.rsa()?;
                COSEKeyType::RSA(COSERSAKey {
                    n: rsa.n().to_vec(),
                    e: rsa.e().to_vec(),
                })
            }
            Id::ED25519 if alg == COSEAlgorithm::EDDSA => COSEKeyType::EC_OKP(COSEOKPKey {
                curve: EDDSACurve::ED25519,
                x: pkey.raw_public_key()?,
            }),
            id => {
                debug!(?id, ?alg, "certificate key type does not match algorithm");
                return Err(AttestationError::CertificatePublicKeyAlgorithmMismatch);
            }
        };

        Ok(COSEKey { type_: alg, key })
    }
}

impl COSEKey {
    /// Does this key declare the expected signature algorithm?
    pub fn is_same_alg(&self, alg: COSEAlgorithm) -> bool {
        self.type_ == alg
    }

    /// The canonical COSE_Key encoding of this key. Two keys are the same key if and only
    /// if these bytes are equal.
    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>, AttestationError> {
        let mut m = BTreeMap::new();
        m.insert(
            Value::Integer(COSE_KEY_ALG),
            Value::Integer(i128::from(self.type_)),
        );
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                m.insert(
                    Value::Integer(COSE_KEY_KTY),
                    Value::Integer(COSEKeyTypeId::EC_EC2 as i128),
                );
                m.insert(
                    Value::Integer(COSE_KEY_CRV),
                    Value::Integer(ec2k.curve as i128),
                );
                m.insert(Value::Integer(COSE_KEY_X), Value::Bytes(ec2k.x.clone()));
                m.insert(Value::Integer(COSE_KEY_Y), Value::Bytes(ec2k.y.clone()));
            }
            COSEKeyType::EC_OKP(okpk) => {
                m.insert(
                    Value::Integer(COSE_KEY_KTY),
                    Value::Integer(COSEKeyTypeId::EC_OKP as i128),
                );
                m.insert(
                    Value::Integer(COSE_KEY_CRV),
                    Value::Integer(okpk.curve as i128),
                );
                m.insert(Value::Integer(COSE_KEY_X), Value::Bytes(okpk.x.clone()));
            }
            COSEKeyType::RSA(rsak) => {
                m.insert(
                    Value::Integer(COSE_KEY_KTY),
                    Value::Integer(COSEKeyTypeId::EC_RSA as i128),
                );
                m.insert(Value::Integer(COSE_KEY_RSA_N), Value::Bytes(rsak.n.clone()));
                m.insert(Value::Integer(COSE_KEY_RSA_E), Value::Bytes(rsak.e.clone()));
            }
        }
        encode_cbor(&Value::Map(m))
    }

    /// The uncompressed X9.62 point `0x04 || x || y` of an EC2 key.
    pub fn get_alg_key_ecc_x962_raw(&self) -> Result<Vec<u8>, AttestationError> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let mut r = Vec::with_capacity(1 + ecpk.x.len() + ecpk.y.len());
                r.push(0x04);
                r.extend_from_slice(&ecpk.x);
                r.extend_from_slice(&ecpk.y);
                Ok(r)
            }
            _ => {
                debug!("get_alg_key_ecc_x962_raw");
                Err(AttestationError::COSEKeyInvalidType)
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), AttestationError> {
        self.get_openssl_pkey().map(|_| ())
    }

    fn get_openssl_pkey(&self) -> Result<PKey<Public>, AttestationError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;
                let xbn = BigNum::from_slice(&ec2k.x)?;
                let ybn = BigNum::from_slice(&ec2k.y)?;

                let ec_key = EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;

                // Validate the key is sound. This checks the point is on the curve.
                ec_key.check_key()?;

                Ok(PKey::from_ec_key(ec_key)?)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = BigNum::from_slice(&rsak.n)?;
                let ebn = BigNum::from_slice(&rsak.e)?;
                let rsa_key = Rsa::from_public_components(nbn, ebn)?;
                Ok(PKey::from_rsa(rsa_key)?)
            }
            COSEKeyType::EC_OKP(okpk) => match okpk.curve {
                EDDSACurve::ED25519 => Ok(PKey::public_key_from_raw_bytes(&okpk.x, Id::ED25519)?),
            },
        }
    }

    /// Verify `signature` over `verification_data` with this key and its declared algorithm.
    /// A signature that does not verify is `Ok(false)`; an unusable key or algorithm is an error.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> Result<bool, AttestationError> {
        let pkey = self.get_openssl_pkey()?;
        verify_with_pkey(self.type_, &pkey, signature, verification_data)
    }
}

/// Validate a signature made by the subject key of an x509 certificate. The certificate key
/// must be of the kind `alg` requires.
pub fn verify_signature(
    alg: COSEAlgorithm,
    certificate: &X509Ref,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, AttestationError> {
    let pkey = certificate.public_key()?;
    // Refuse a key of the wrong kind or curve before verifying.
    COSEKey::try_from((alg, certificate))?;
    verify_with_pkey(alg, &pkey, signature, verification_data)
}

/// ECDSA signatures appear both as DER `Ecdsa-Sig-Value` and as raw fixed width `r || s`.
fn normalise_ecdsa_signature(
    signature: &[u8],
    coord_len: usize,
) -> Result<EcdsaSig, AttestationError> {
    if let Ok(sig) = EcdsaSig::from_der(signature) {
        // Only accept a strict encoding, trailing garbage must not pass.
        if sig.to_der()? == signature {
            return Ok(sig);
        }
    }

    if signature.len() == coord_len * 2 {
        let (r, s) = signature.split_at(coord_len);
        let r = BigNum::from_slice(r)?;
        let s = BigNum::from_slice(s)?;
        return Ok(EcdsaSig::from_private_components(r, s)?);
    }

    debug!(len = signature.len(), "ecdsa signature is neither DER nor raw");
    Err(AttestationError::AttestationStatementSigInvalid)
}

fn verify_with_pkey(
    alg: COSEAlgorithm,
    pkey: &PKey<Public>,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, AttestationError> {
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::ES384 | COSEAlgorithm::ES512 => {
            let curve =
                ECDSACurve::from_alg(alg).ok_or(AttestationError::COSEKeyInvalidAlgorithm)?;
            let ec_key = pkey
                .ec_key()
                .map_err(|_| AttestationError::COSEKeyInvalidType)?;
            let sig = match normalise_ecdsa_signature(signature, curve.coordinate_size()) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            let digest = hash::hash(hash_from_alg(alg)?, verification_data)?;
            Ok(sig.verify(&digest, &ec_key).unwrap_or_else(|e| {
                debug!(?e, "ecdsa verification error");
                false
            }))
        }
        COSEAlgorithm::EDDSA => {
            if pkey.id() != Id::ED25519 {
                return Err(AttestationError::COSEKeyInvalidType);
            }
            let mut verifier = Verifier::new_without_digest(pkey)?;
            Ok(verifier
                .verify_oneshot(signature, verification_data)
                .unwrap_or_else(|e| {
                    debug!(?e, "eddsa verification error");
                    false
                }))
        }
        _ => {
            // Refuses SHA-1 before touching the key.
            let md = hash_from_alg(alg)?;
            if pkey.id() != Id::RSA {
                return Err(AttestationError::COSEKeyInvalidType);
            }
            let mut verifier = Verifier::new(md, pkey)?;
            if alg.is_pss() {
                verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
                verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
                verifier.set_rsa_mgf1_md(md)?;
            } else {
                verifier.set_rsa_padding(Padding::PKCS1)?;
            }
            verifier.update(verification_data)?;
            Ok(verifier.verify(signature).unwrap_or_else(|e| {
                debug!(?e, "rsa verification error");
                false
            }))
        }
    }
}

/// A certificate extension copied out of the certificate.
#[derive(Debug, Clone)]
pub(crate) struct CertificateExtension {
    pub oid: String,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// Run `f` over the x509-parser view of the certificate.
fn with_parsed_certificate<T>(
    certificate: &X509Ref,
    f: impl FnOnce(&X509Certificate<'_>) -> Result<T, AttestationError>,
) -> Result<T, AttestationError> {
    let der = certificate.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der).map_err(|e| {
        debug!(?e, "x509-parser failed to read certificate");
        AttestationError::AttestationStatementX5CInvalid
    })?;
    f(&parsed)
}

fn x509_extension_error(e: x509_parser::error::X509Error) -> AttestationError {
    debug!(?e, "certificate extension invalid");
    AttestationError::AttestationStatementX5CInvalid
}

pub(crate) fn certificate_extensions(
    certificate: &X509Ref,
) -> Result<Vec<CertificateExtension>, AttestationError> {
    with_parsed_certificate(certificate, |parsed| {
        Ok(parsed
            .extensions()
            .iter()
            .map(|ext| CertificateExtension {
                oid: ext.oid.to_id_string(),
                critical: ext.critical,
                value: ext.value.to_vec(),
            })
            .collect())
    })
}

pub(crate) fn find_extension(
    certificate: &X509Ref,
    oid: &str,
) -> Result<Option<CertificateExtension>, AttestationError> {
    Ok(certificate_extensions(certificate)?
        .into_iter()
        .find(|ext| ext.oid == oid))
}

/// Is the certificate marked as a CA? An absent Basic Constraints extension means it is not.
pub(crate) fn basic_constraints_is_ca(certificate: &X509Ref) -> Result<bool, AttestationError> {
    with_parsed_certificate(certificate, |parsed| {
        Ok(parsed
            .basic_constraints()
            .map_err(x509_extension_error)?
            .is_some_and(|bc| bc.value.ca))
    })
}

/// Check that the current time is within the certificate validity window.
pub(crate) fn check_validity(
    certificate: &X509Ref,
    danger_disable_certificate_time_checks: bool,
) -> Result<(), AttestationError> {
    if danger_disable_certificate_time_checks {
        warn!("certificate time checks are disabled");
        return Ok(());
    }

    let now = Asn1Time::days_from_now(0)?;

    if certificate.not_before().compare(&now)? == Ordering::Greater {
        debug!(not_before = %certificate.not_before(), "certificate not yet valid");
        return Err(AttestationError::AttestationCertificateNotYetValid);
    }

    if certificate.not_after().compare(&now)? == Ordering::Less {
        debug!(not_after = %certificate.not_after(), "certificate expired");
        return Err(AttestationError::AttestationCertificateExpired);
    }

    Ok(())
}

/// True if the certificate names itself as issuer and its signature verifies with its own key.
pub(crate) fn is_self_signed(certificate: &X509Ref) -> Result<bool, AttestationError> {
    if certificate.issued(certificate) != X509VerifyResult::OK {
        return Ok(false);
    }
    let pkey = certificate.public_key()?;
    Ok(certificate.verify(&pkey)?)
}

/// The raw value of the first subject entry for `nid`. Compared as bytes, an embedded NUL
/// must not cut the value short.
fn subject_entry(certificate: &X509Ref, nid: Nid) -> Option<&[u8]> {
    certificate
        .subject_name()
        .entries_by_nid(nid)
        .next()
        .map(|e| e.data().as_slice())
}

pub(crate) fn assert_packed_attest_req(certificate: &X509Ref) -> Result<(), AttestationError> {
    // https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements

    // Version MUST be set to 3 (which is indicated by an ASN.1 INTEGER with value 2).
    if certificate.version() != 2 {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "version is not 3",
        ));
    }

    // Subject-C, Subject-O, Subject-CN are vendor chosen but must be present.
    for nid in [Nid::COUNTRYNAME, Nid::ORGANIZATIONNAME, Nid::COMMONNAME] {
        match subject_entry(certificate, nid) {
            Some(v) if !v.is_empty() => {}
            _ => {
                debug!(?nid, "subject entry missing");
                return Err(AttestationError::AttestationCertificateRequirementsNotMet(
                    "subject is missing C, O or CN",
                ));
            }
        }
    }

    // Subject-OU is the literal string "Authenticator Attestation"
    if subject_entry(certificate, Nid::ORGANIZATIONALUNITNAME)
        != Some(PACKED_ATTESTATION_OU.as_bytes())
    {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "subject OU is not Authenticator Attestation",
        ));
    }

    // The Basic Constraints extension MUST have the CA component set to false.
    if basic_constraints_is_ca(certificate)? {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "certificate is a CA",
        ));
    }

    Ok(())
}

pub(crate) fn assert_tpm_attest_req(certificate: &X509Ref) -> Result<(), AttestationError> {
    // https://w3c.github.io/webauthn/#sctn-tpm-cert-requirements

    if certificate.version() != 2 {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "version is not 3",
        ));
    }

    // Subject field MUST be set to empty.
    if certificate.subject_name().entries().next().is_some() {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "subject is not empty",
        ));
    }

    with_parsed_certificate(certificate, |parsed| {
        // The Subject Alternative Name extension MUST be set as defined in [TPMv2-EK-Profile]
        // section 3.2.9. The TPM attributes sit in a directoryName.
        let san = parsed
            .subject_alternative_name()
            .map_err(x509_extension_error)?
            .ok_or(AttestationError::AttestationCertificateRequirementsNotMet(
                "subject alt name missing",
            ))?;
        let san_oids: Vec<String> = san
            .value
            .general_names
            .iter()
            .filter_map(|gn| match gn {
                GeneralName::DirectoryName(dn) => Some(dn),
                _ => None,
            })
            .flat_map(|dn| dn.iter_attributes())
            .map(|attr| attr.attr_type().to_id_string())
            .collect();
        for required in [
            OID_TCG_AT_TPM_MANUFACTURER,
            OID_TCG_AT_TPM_MODEL,
            OID_TCG_AT_TPM_VERSION,
        ] {
            if !san_oids.iter().any(|o| o == required) {
                debug!(?required, "tpm attribute missing from subject alt name");
                return Err(AttestationError::AttestationCertificateRequirementsNotMet(
                    "subject alt name lacks tpm attributes",
                ));
            }
        }

        // The Extended Key Usage extension MUST contain the OID 2.23.133.8.3
        let eku = parsed
            .extended_key_usage()
            .map_err(x509_extension_error)?
            .ok_or(AttestationError::AttestationCertificateRequirementsNotMet(
                "extended key usage missing",
            ))?;
        if !eku
            .value
            .other
            .iter()
            .any(|oid| oid.to_id_string() == OID_TCG_KP_AIK_CERTIFICATE)
        {
            return Err(AttestationError::AttestationCertificateRequirementsNotMet(
                "extended key usage lacks tcg-kp-AIKCertificate",
            ));
        }

        Ok(())
    })?;

    // The Basic Constraints extension MUST have the CA component set to false.
    if basic_constraints_is_ca(certificate)? {
        return Err(AttestationError::AttestationCertificateRequirementsNotMet(
            "certificate is a CA",
        ));
    }

    Ok(())
}
