use der_parser::ber::BerObjectContent;
use der_parser::der::*;
use der_parser::error::{BerError, BerResult};

use super::{validate_extension, AttestationInput, AttestationVerifier, AttestationX509Extension};
use crate::asn1::check_der_canonical;
use crate::constants::*;
use crate::crypto::{check_validity, verify_signature};
use crate::error::AttestationError;
use crate::interface::*;

/// The Android key attestation extension, KeyDescription.
///
/// ```text
/// KeyDescription ::= SEQUENCE {
///     attestationVersion         INTEGER,
///     attestationSecurityLevel   SecurityLevel,
///     keymasterVersion           INTEGER,
///     keymasterSecurityLevel     SecurityLevel,
///     attestationChallenge       OCTET_STRING,
///     uniqueId                   OCTET_STRING,
///     softwareEnforced           AuthorizationList,
///     teeEnforced                AuthorizationList,
/// }
/// ```
pub struct AndroidKeyAttestationExtensionData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
}

impl SecurityLevel {
    fn parse(i: &[u8]) -> BerResult<'_, Self> {
        let (i, level) = parse_der_enum(i)?;
        let level = match level.as_u32()? {
            0 => SecurityLevel::Software,
            1 => SecurityLevel::TrustedEnvironment,
            2 => SecurityLevel::StrongBox,
            _ => return Err(nom::Err::Error(BerError::InvalidTag)),
        };
        Ok((i, level))
    }

    fn is_hardware(self) -> bool {
        self != SecurityLevel::Software
    }
}

/// The members of an AuthorizationList that registration cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AuthorizationList {
    all_applications: bool,
    origin: Option<u64>,
    purpose: Vec<u64>,
}

impl AuthorizationList {
    // Every member is an EXPLICIT context tag numbered after the keymaster tag.
    fn parse(i: &[u8]) -> BerResult<'_, Self> {
        parse_der_container(|i: &[u8], hdr: Header| {
            if hdr.tag() != Tag::Sequence {
                return Err(nom::Err::Error(BerError::BerTypeError));
            }

            let mut al = AuthorizationList::default();

            let mut i = i;
            while !i.is_empty() {
                let (k, obj) = parse_der(i)?;
                i = k;

                if obj.header.class() != Class::ContextSpecific {
                    return Err(nom::Err::Error(BerError::BerTypeError));
                }
                let BerObjectContent::Unknown(o) = obj.content else {
                    return Err(nom::Err::Error(BerError::BerTypeError));
                };

                match o.header.tag().0 {
                    KM_TAG_ALL_APPLICATIONS => {
                        al.all_applications = true;
                    }
                    KM_TAG_ORIGIN => {
                        let (_, val) = parse_der_integer(o.data)?;
                        al.origin = Some(val.as_u64()?);
                    }
                    // purpose [1] EXPLICIT SET OF INTEGER
                    KM_TAG_PURPOSE => {
                        let (_, purpose) = parse_der_container(|i: &[u8], hdr: Header| {
                            if hdr.tag() != Tag::Set {
                                return Err(nom::Err::Error(BerError::BerTypeError));
                            }
                            let mut purpose = Vec::new();
                            let mut i = i;
                            while !i.is_empty() {
                                let (k, val) = parse_der_integer(i)?;
                                purpose.push(val.as_u64()?);
                                i = k;
                            }
                            Ok((i, purpose))
                        })(o.data)?;
                        al.purpose = purpose;
                    }
                    _ => continue,
                }
            }

            Ok((i, al))
        })(i)
    }
}

/// The fields of a KeyDescription used for registration.
#[derive(Debug)]
struct KeyDescription {
    attestation_challenge: Vec<u8>,
    attest_sec_level: SecurityLevel,
    km_sec_level: SecurityLevel,
    software_enforced: AuthorizationList,
    tee_enforced: AuthorizationList,
}

impl KeyDescription {
    fn parse(i: &[u8]) -> BerResult<'_, Self> {
        parse_der_container(|i: &[u8], hdr: Header| {
            if hdr.tag() != Tag::Sequence {
                return Err(nom::Err::Error(BerError::BerTypeError));
            }
            let (i, _attestation_version) = parse_der_integer(i)?;
            let (i, attest_sec_level) = SecurityLevel::parse(i)?;
            let (i, _keymaster_version) = parse_der_integer(i)?;
            let (i, km_sec_level) = SecurityLevel::parse(i)?;

            let (i, attestation_challenge) = parse_der_octetstring(i)?;
            let attestation_challenge = attestation_challenge.as_slice()?.to_vec();

            let (i, _unique_id) = parse_der_octetstring(i)?;

            let (i, software_enforced) = AuthorizationList::parse(i)?;
            let (i, tee_enforced) = AuthorizationList::parse(i)?;

            Ok((
                i,
                KeyDescription {
                    attestation_challenge,
                    attest_sec_level,
                    km_sec_level,
                    software_enforced,
                    tee_enforced,
                },
            ))
        })(i)
    }
}

impl AttestationX509Extension for AndroidKeyAttestationExtensionData {
    // The attestation challenge
    type Output = Vec<u8>;

    const OID: &'static str = OID_ANDROID_KEY_DESCRIPTION;

    const IS_REQUIRED: bool = true;

    const VALIDATION_ERROR: AttestationError =
        AttestationError::AttestationAndroidKeyChallengeMismatch;

    fn parse(value: &[u8]) -> Result<(Self::Output, AttestationMetadata), AttestationError> {
        check_der_canonical(value)?;
        let (_, kd) = KeyDescription::parse(value)?;

        trace!(?kd);

        let KeyDescription {
            attestation_challenge,
            attest_sec_level,
            km_sec_level,
            software_enforced,
            tee_enforced,
        } = kd;

        // The key must be scoped to the RP, never usable by every application.
        if software_enforced.all_applications || tee_enforced.all_applications {
            return Err(AttestationError::AttestationAndroidKeyAllApplications);
        }

        // A list that carries origin or purpose must carry the required value.
        for list in [&software_enforced, &tee_enforced] {
            if list.origin.is_some_and(|o| o != KM_ORIGIN_GENERATED) {
                return Err(AttestationError::AttestationAndroidKeyOriginInvalid);
            }
            if !list.purpose.is_empty() && !list.purpose.contains(&KM_PURPOSE_SIGN) {
                return Err(AttestationError::AttestationAndroidKeyPurposeInvalid);
            }
        }

        // Between them the lists must state both origin and purpose.
        let has_origin = software_enforced.origin.is_some() || tee_enforced.origin.is_some();
        let has_purpose = !software_enforced.purpose.is_empty() || !tee_enforced.purpose.is_empty();
        if !(has_origin && has_purpose) {
            return Err(AttestationError::AttestationAndroidKeyAuthorizationListMissing);
        }

        Ok((
            attestation_challenge,
            AttestationMetadata::AndroidKey {
                is_km_tee: km_sec_level.is_hardware(),
                is_attest_tee: attest_sec_level.is_hardware(),
            },
        ))
    }
}

// https://w3c.github.io/webauthn/#sctn-android-key-attestation
pub(crate) fn verify_android_key_attestation(
    input: &AttestationInput<'_>,
    verifier: &AttestationVerifier<'_>,
) -> Result<VerificationResult, AttestationError> {
    let alg = input.alg()?;
    let sig = input.sig()?;
    let trust_path = input.x5c_required()?;

    let attestn_cert = trust_path
        .first()
        .ok_or(AttestationError::AttestationStatementX5CInvalid)?;

    check_validity(
        attestn_cert,
        verifier.policy().danger_disable_certificate_time_checks,
    )?;

    // 2. Verify that sig is a valid signature over the concatenation of authenticatorData and
    // clientDataHash using the public key in the first certificate in x5c with the algorithm
    // specified in alg.
    if !verify_signature(alg, attestn_cert, sig, &input.signed_data())? {
        debug!("android-key signature invalid");
        return Err(AttestationError::AttestationStatementSigInvalid);
    }

    // 3. Verify that the public key in the first certificate in x5c matches the
    // credentialPublicKey in the attestedCredentialData in authenticatorData.
    let credential_public_key = &input.acd.credential_pk;
    let subject_public_key = COSEKey::try_from((credential_public_key.type_, &**attestn_cert))?;

    if credential_public_key.to_cbor_bytes()? != subject_public_key.to_cbor_bytes()? {
        return Err(AttestationError::AttestationCredentialSubjectKeyMismatch);
    }

    // 4. Verify that the attestationChallenge field in the attestation certificate extension
    // data is identical to clientDataHash, and that the authorization lists are acceptable.
    let metadata = validate_extension::<AndroidKeyAttestationExtensionData>(
        attestn_cert,
        &input.client_data_hash.to_vec(),
    )?;

    // 5. Return attestation type Basic and attestation trust path x5c.
    Ok(VerificationResult {
        attestation_type: AttestationType::Basic,
        trust_path,
        metadata,
    })
}
