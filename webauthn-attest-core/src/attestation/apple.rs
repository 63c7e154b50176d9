use der_parser::der::*;
use der_parser::error::BerError;

use super::{validate_extension, AttestationInput, AttestationVerifier, AttestationX509Extension};
use crate::asn1::check_der_canonical;
use crate::constants::*;
use crate::crypto::{check_validity, compute_sha256};
use crate::error::AttestationError;
use crate::interface::*;

/// The nonce extension of an Apple anonymous attestation certificate.
///
/// ```text
/// AppleAnonymousAttestation ::= SEQUENCE {
///     nonce [1] EXPLICIT OCTET STRING
/// }
/// ```
pub struct AppleAnonymousNonce;

impl AttestationX509Extension for AppleAnonymousNonce {
    type Output = [u8; 32];

    const OID: &'static str = OID_APPLE_NONCE;

    const IS_REQUIRED: bool = true;

    const VALIDATION_ERROR: AttestationError =
        AttestationError::AttestationCertificateNonceMismatch;

    fn parse(value: &[u8]) -> Result<(Self::Output, AttestationMetadata), AttestationError> {
        check_der_canonical(value)?;
        let (_, nonce) = parse_der_container(|i: &[u8], hdr: Header| {
            if hdr.tag() != Tag::Sequence {
                return Err(nom::Err::Error(BerError::BerTypeError));
            }
            let (i, tagged_nonce) = parse_der_tagged_explicit(1, parse_der_octetstring)(i)?;
            let (class, _tag, nonce) = tagged_nonce.as_tagged()?;
            if class != Class::ContextSpecific {
                return Err(nom::Err::Error(BerError::BerTypeError));
            }
            Ok((i, nonce.as_slice()?))
        })(value)?;

        let nonce: [u8; 32] = nonce
            .try_into()
            .map_err(|_| AttestationError::AttestationCertificateNonceMismatch)?;

        Ok((nonce, AttestationMetadata::None))
    }
}

// https://www.w3.org/TR/webauthn-3/#sctn-apple-anonymous-attestation
pub(crate) fn verify_apple_anonymous_attestation(
    input: &AttestationInput<'_>,
    verifier: &AttestationVerifier<'_>,
) -> Result<VerificationResult, AttestationError> {
    let credential_public_key = &input.acd.credential_pk;
    let alg = credential_public_key.type_;

    // The credential certificate followed by its issuing CA.
    let trust_path = input.x5c_required()?;
    if trust_path.len() < 2 {
        debug!(len = trust_path.len(), "apple x5c must hold the credential cert and its CA");
        return Err(AttestationError::AttestationStatementX5CInvalid);
    }

    let cred_cert = trust_path
        .first()
        .ok_or(AttestationError::AttestationStatementX5CInvalid)?;

    check_validity(
        cred_cert,
        verifier.policy().danger_disable_certificate_time_checks,
    )?;

    // 2. Concatenate authenticatorData and clientDataHash to form nonceToHash.
    // 3. Perform SHA-256 hash of nonceToHash to produce nonce.
    let nonce = compute_sha256(&input.signed_data());

    // 4. Verify that nonce equals the value of the extension with OID 1.2.840.113635.100.8.2
    // in credCert.
    validate_extension::<AppleAnonymousNonce>(cred_cert, &nonce)?;

    // 5. Verify that the credential public key equals the Subject Public Key of credCert.
    let subject_public_key = COSEKey::try_from((alg, &**cred_cert))?;

    if credential_public_key.to_cbor_bytes()? != subject_public_key.to_cbor_bytes()? {
        return Err(AttestationError::AttestationCredentialSubjectKeyMismatch);
    }

    // 6. Return attestation type Anonymization CA and attestation trust path x5c.
    Ok(VerificationResult {
        attestation_type: AttestationType::AnonCa,
        trust_path,
        metadata: AttestationMetadata::None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn apple_nonce_extension() {
        let ext = hex!(
            "30 24 a1 22 04 20"
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
        );
        let (nonce, _) = AppleAnonymousNonce::parse(&ext).unwrap();
        assert_eq!(nonce[0], 0x00);
        assert_eq!(nonce[31], 0x1f);
    }

    #[test]
    fn apple_nonce_extension_malformed() {
        // Wrong context tag.
        let ext = hex!("30 06 a2 04 04 02 00 01");
        assert!(AppleAnonymousNonce::parse(&ext).is_err());

        // Short nonce.
        let ext = hex!("30 06 a1 04 04 02 00 01");
        assert!(matches!(
            AppleAnonymousNonce::parse(&ext),
            Err(AttestationError::AttestationCertificateNonceMismatch)
        ));

        assert!(AppleAnonymousNonce::parse(&hex!("04 00")).is_err());
    }

    #[test]
    fn apple_nonce_extension_non_canonical() {
        // OCTET STRING length in the long form.
        let ext = hex!(
            "30 25 a1 23 04 81 20"
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
        );
        assert!(matches!(
            AppleAnonymousNonce::parse(&ext),
            Err(AttestationError::ParseASN1Failure(_))
        ));
    }
}
