use uuid::Uuid;

use super::{validate_extension, AttestationInput, AttestationVerifier, FidoGenCeAaguid};
use crate::crypto::{assert_packed_attest_req, check_validity, verify_signature};
use crate::error::AttestationError;
use crate::interface::*;
use crate::trust::validate_packed_root;

// https://w3c.github.io/webauthn/#sctn-packed-attestation
pub(crate) fn verify_packed_attestation(
    input: &AttestationInput<'_>,
    verifier: &AttestationVerifier<'_>,
) -> Result<VerificationResult, AttestationError> {
    let acd = input.acd;
    let alg = input.alg()?;
    let sig = input.sig()?;
    let x5c = input.x5c()?;
    let ecdaa_key_id = input.get("ecdaaKeyId");

    let verification_data = input.signed_data();

    match (x5c, ecdaa_key_id) {
        (Some(trust_path), _) => {
            // 2. If x5c is present, this indicates that the attestation type is not ECDAA.
            let danger_disable_certificate_time_checks =
                verifier.policy().danger_disable_certificate_time_checks;
            for cert in trust_path.iter() {
                check_validity(cert, danger_disable_certificate_time_checks)?;
            }

            // The leaf certificate is the first element.
            let attestn_cert = trust_path
                .first()
                .ok_or(AttestationError::AttestationStatementX5CInvalid)?;

            // Verify that sig is a valid signature over the concatenation of authenticatorData
            // and clientDataHash using the attestation public key in attestnCert with the
            // algorithm specified in alg.
            let is_valid_signature = verify_signature(alg, attestn_cert, sig, &verification_data)?;

            if !is_valid_signature {
                trace!("packed x509 signature invalid");
                return Err(AttestationError::AttestationStatementSigInvalid);
            }

            // Verify that attestnCert meets the requirements in § 8.2.1 Packed Attestation
            // Statement Certificate Requirements.
            assert_packed_attest_req(attestn_cert)?;

            // If attestnCert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4
            // (id-fido-gen-ce-aaguid) verify that the value of this extension matches the aaguid
            // in authenticatorData.
            validate_extension::<FidoGenCeAaguid>(attestn_cert, &acd.aaguid)?;

            validate_packed_root(verifier, &acd.aaguid, &trust_path)?;

            Ok(VerificationResult {
                attestation_type: AttestationType::Basic,
                trust_path,
                metadata: AttestationMetadata::Packed {
                    aaguid: Uuid::from_bytes(acd.aaguid),
                },
            })
        }
        (None, Some(_ecdaa_key_id)) => {
            // 3. If ecdaaKeyId is present, then the attestation type is ECDAA.
            debug!("packed ecdaa attestation refused");
            Err(AttestationError::AttestationEcdaaUnsupported)
        }
        (None, None) => {
            // 4. If neither x5c nor ecdaaKeyId is present, self attestation is in use.
            let credential_public_key = &acd.credential_pk;

            // 4.a. Validate that alg matches the algorithm of the credentialPublicKey in
            // authenticatorData.
            if !credential_public_key.is_same_alg(alg) {
                debug!(?alg, key_alg = ?credential_public_key.type_, "self attestation alg");
                return Err(AttestationError::AttestationStatementAlgMismatch);
            }

            // 4.b. Verify that sig is a valid signature over the concatenation of
            // authenticatorData and clientDataHash using the credential public key with alg.
            if !credential_public_key.verify_signature(sig, &verification_data)? {
                trace!("invalid self attestation signature");
                return Err(AttestationError::AttestationStatementSigInvalid);
            }

            // 4.c. Return attestation type Self and an empty attestation trust path.
            Ok(VerificationResult {
                attestation_type: AttestationType::Self_,
                trust_path: Vec::new(),
                metadata: AttestationMetadata::None,
            })
        }
    }
}
