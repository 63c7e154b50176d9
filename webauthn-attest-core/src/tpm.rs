//! TPM 2.0 structures carried by the tpm attestation format.
//!
//! All integers are big endian. Sized buffers (`TPM2B_*`) are a u16 length followed by
//! that many bytes. See TPM 2.0 Part 2: Structures.

use nom::bytes::complete::take;
use nom::combinator::{cond, eof};
use nom::number::complete::{be_u16, be_u32, be_u64, be_u8};
use openssl::hash::{self, MessageDigest};

use crate::error::AttestationError;
use crate::interface::{COSEKey, COSEKeyType, ECDSACurve};

pub(crate) const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub(crate) const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

/// A TPM_ALG_ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TpmAlgId {
    Rsa,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Null,
    Ecc,
    Other(u16),
}

impl From<u16> for TpmAlgId {
    fn from(v: u16) -> Self {
        match v {
            0x0001 => TpmAlgId::Rsa,
            0x0004 => TpmAlgId::Sha1,
            0x000B => TpmAlgId::Sha256,
            0x000C => TpmAlgId::Sha384,
            0x000D => TpmAlgId::Sha512,
            0x0010 => TpmAlgId::Null,
            0x0023 => TpmAlgId::Ecc,
            v => TpmAlgId::Other(v),
        }
    }
}

impl TpmAlgId {
    /// The digest for a name algorithm. SHA-1 names are not accepted.
    pub(crate) fn digest(self) -> Option<MessageDigest> {
        match self {
            TpmAlgId::Sha256 => Some(MessageDigest::sha256()),
            TpmAlgId::Sha384 => Some(MessageDigest::sha384()),
            TpmAlgId::Sha512 => Some(MessageDigest::sha512()),
            _ => None,
        }
    }

    fn to_u16(self) -> u16 {
        match self {
            TpmAlgId::Rsa => 0x0001,
            TpmAlgId::Sha1 => 0x0004,
            TpmAlgId::Sha256 => 0x000B,
            TpmAlgId::Sha384 => 0x000C,
            TpmAlgId::Sha512 => 0x000D,
            TpmAlgId::Null => 0x0010,
            TpmAlgId::Ecc => 0x0023,
            TpmAlgId::Other(v) => v,
        }
    }
}

/// TPM_ECC_CURVE values for the NIST curves.
fn ecc_curve_from_id(id: u16) -> Option<ECDSACurve> {
    match id {
        0x0003 => Some(ECDSACurve::SECP256R1),
        0x0004 => Some(ECDSACurve::SECP384R1),
        0x0005 => Some(ECDSACurve::SECP521R1),
        _ => None,
    }
}

/// TPMS_ATTEST restricted to the certify variant, the only one valid for webauthn.
/// qualifiedSigner, clockInfo and the qualified name are parsed but not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TpmsAttest {
    pub magic: u32,
    pub type_: u16,
    pub extra_data: Vec<u8>,
    pub firmware_version: u64,
    pub certify_name: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuPublicId {
    Rsa { modulus: Vec<u8> },
    Ecc { curve_id: u16, x: Vec<u8>, y: Vec<u8> },
}

/// TPMT_PUBLIC for RSA and ECC objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TpmtPublic {
    pub type_: TpmAlgId,
    pub name_alg: TpmAlgId,
    pub exponent: u32,
    pub unique: TpmuPublicId,
}

fn tpm2b_parser(i: &[u8]) -> nom::IResult<&[u8], &[u8]> {
    let (i, size) = be_u16(i)?;
    take(size as usize)(i)
}

fn tpm_alg_id_parser(i: &[u8]) -> nom::IResult<&[u8], TpmAlgId> {
    let (i, v) = be_u16(i)?;
    Ok((i, TpmAlgId::from(v)))
}

/// TPMS_CLOCK_INFO, clock (8) resetCount (4) restartCount (4) safe (1).
fn clock_info_parser(i: &[u8]) -> nom::IResult<&[u8], ()> {
    let (i, _clock) = be_u64(i)?;
    let (i, _reset_count) = be_u32(i)?;
    let (i, _restart_count) = be_u32(i)?;
    let (i, _safe) = be_u8(i)?;
    Ok((i, ()))
}

fn tpms_attest_parser(i: &[u8]) -> nom::IResult<&[u8], TpmsAttest> {
    let (i, magic) = be_u32(i)?;
    let (i, type_) = be_u16(i)?;
    let (i, _qualified_signer) = tpm2b_parser(i)?;
    let (i, extra_data) = tpm2b_parser(i)?;
    let (i, _) = clock_info_parser(i)?;
    let (i, firmware_version) = be_u64(i)?;
    // TPMS_CERTIFY_INFO
    let (i, certify_name) = tpm2b_parser(i)?;
    let (i, _certify_qualified_name) = tpm2b_parser(i)?;
    let (i, _) = eof(i)?;

    Ok((
        i,
        TpmsAttest {
            magic,
            type_,
            extra_data: extra_data.to_vec(),
            firmware_version,
            certify_name: certify_name.to_vec(),
        },
    ))
}

/// A TPMT_SYM_DEF_OBJECT. Attestation keys have no symmetric part, but one is still
/// skipped correctly if present.
fn symmetric_parser(i: &[u8]) -> nom::IResult<&[u8], TpmAlgId> {
    let (i, alg) = tpm_alg_id_parser(i)?;
    let (i, _key_bits_mode) = cond(alg != TpmAlgId::Null, take(4usize))(i)?;
    Ok((i, alg))
}

/// A scheme id followed by its hash algorithm when it is not TPM_ALG_NULL.
fn scheme_parser(i: &[u8]) -> nom::IResult<&[u8], TpmAlgId> {
    let (i, scheme) = tpm_alg_id_parser(i)?;
    let (i, _hash) = cond(scheme != TpmAlgId::Null, be_u16)(i)?;
    Ok((i, scheme))
}

fn tpmt_public_parser(i: &[u8]) -> nom::IResult<&[u8], TpmtPublic> {
    let (i, type_) = tpm_alg_id_parser(i)?;
    let (i, name_alg) = tpm_alg_id_parser(i)?;
    let (i, _object_attributes) = be_u32(i)?;
    let (i, _auth_policy) = tpm2b_parser(i)?;

    let (i, exponent, unique) = match type_ {
        TpmAlgId::Rsa => {
            // TPMS_RSA_PARMS
            let (i, _symmetric) = symmetric_parser(i)?;
            let (i, _scheme) = scheme_parser(i)?;
            let (i, _key_bits) = be_u16(i)?;
            let (i, exponent) = be_u32(i)?;
            // TPM2B_PUBLIC_KEY_RSA
            let (i, modulus) = tpm2b_parser(i)?;
            (
                i,
                exponent,
                TpmuPublicId::Rsa {
                    modulus: modulus.to_vec(),
                },
            )
        }
        TpmAlgId::Ecc => {
            // TPMS_ECC_PARMS
            let (i, _symmetric) = symmetric_parser(i)?;
            let (i, _scheme) = scheme_parser(i)?;
            let (i, curve_id) = be_u16(i)?;
            let (i, _kdf) = scheme_parser(i)?;
            // TPMS_ECC_POINT
            let (i, x) = tpm2b_parser(i)?;
            let (i, y) = tpm2b_parser(i)?;
            (
                i,
                0,
                TpmuPublicId::Ecc {
                    curve_id,
                    x: x.to_vec(),
                    y: y.to_vec(),
                },
            )
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Switch,
            )))
        }
    };
    let (i, _) = eof(i)?;

    Ok((
        i,
        TpmtPublic {
            type_,
            name_alg,
            exponent,
            unique,
        },
    ))
}

impl TryFrom<&[u8]> for TpmsAttest {
    type Error = AttestationError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        tpms_attest_parser(data)
            .map(|(_, attest)| attest)
            .map_err(|e| {
                error!(?e, "TPMS_ATTEST");
                AttestationError::ParseNOMFailure
            })
    }
}

impl TryFrom<&[u8]> for TpmtPublic {
    type Error = AttestationError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        tpmt_public_parser(data)
            .map(|(_, public)| public)
            .map_err(|e| {
                error!(?e, "TPMT_PUBLIC");
                AttestationError::ParseNOMFailure
            })
    }
}

fn strip_leading_zeros(b: &[u8]) -> &[u8] {
    let idx = b.iter().position(|v| *v != 0).unwrap_or(b.len());
    &b[idx..]
}

impl TpmtPublic {
    /// Does this public area describe the same key as the credential public key?
    pub(crate) fn matches_key(&self, key: &COSEKey) -> bool {
        match (&self.unique, &key.key) {
            (TpmuPublicId::Rsa { modulus }, COSEKeyType::RSA(rsak)) => {
                // An exponent of zero means the default, 2^16 + 1.
                let exponent = if self.exponent == 0 {
                    65537
                } else {
                    self.exponent
                };
                let exponent = exponent.to_be_bytes();
                strip_leading_zeros(modulus) == strip_leading_zeros(&rsak.n)
                    && strip_leading_zeros(&exponent) == strip_leading_zeros(&rsak.e)
            }
            (TpmuPublicId::Ecc { curve_id, x, y }, COSEKeyType::EC_EC2(ec2k)) => {
                ecc_curve_from_id(*curve_id) == Some(ec2k.curve) && *x == ec2k.x && *y == ec2k.y
            }
            _ => false,
        }
    }

    /// The TPM name of the object described by `pub_area`, `nameAlg || H(pub_area)`.
    pub(crate) fn name(&self, pub_area: &[u8]) -> Result<Vec<u8>, AttestationError> {
        let md = self
            .name_alg
            .digest()
            .ok_or(AttestationError::AttestationTpmPubAreaHashUnknown)?;
        let digest = hash::hash(md, pub_area)?;
        let mut name = self.name_alg.to_u16().to_be_bytes().to_vec();
        name.extend_from_slice(&digest);
        Ok(name)
    }
}
