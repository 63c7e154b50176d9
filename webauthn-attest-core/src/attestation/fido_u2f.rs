use super::{AttestationInput, AttestationVerifier};
use crate::crypto::{check_validity, verify_signature};
use crate::error::AttestationError;
use crate::interface::*;
use crate::trust::validate_fidou2f_root;

// https://w3c.github.io/webauthn/#fido-u2f-attestation
pub(crate) fn verify_fidou2f_attestation(
    input: &AttestationInput<'_>,
    verifier: &AttestationVerifier<'_>,
) -> Result<VerificationResult, AttestationError> {
    let acd = input.acd;

    // U2F devices predate AAGUIDs and must report the zero value.
    if acd.aaguid != AAGUID_ZERO {
        debug!(aaguid = ?acd.aaguid, "fido-u2f aaguid is not zero");
        return Err(AttestationError::AttestationFidoU2fAaguidNotZero);
    }

    let sig = input.sig()?;

    // Check that x5c has exactly one element and let att_cert be that element.
    let trust_path = input.x5c_required()?;
    let att_cert = match trust_path.as_slice() {
        [att_cert] => att_cert,
        _ => {
            debug!(len = trust_path.len(), "fido-u2f x5c must hold one certificate");
            return Err(AttestationError::AttestationStatementX5CInvalid);
        }
    };

    check_validity(
        att_cert,
        verifier.policy().danger_disable_certificate_time_checks,
    )?;

    // Let certificate public key be the public key conveyed by att_cert. If certificate public
    // key is not an Elliptic Curve (EC) public key over the P-256 curve, terminate this
    // algorithm and return an appropriate error.
    let is_p256 = att_cert
        .public_key()?
        .ec_key()
        .ok()
        .and_then(|ec| ec.group().curve_name())
        == Some(openssl::nid::Nid::X9_62_PRIME256V1);
    if !is_p256 {
        return Err(AttestationError::AttestationFidoU2fKeyInvalid);
    }

    // Let publicKeyU2F be the concatenation 0x04 || x || y.
    let credential_public_key = &acd.credential_pk;
    let public_key_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;

    // Let verificationData be the concatenation of (0x00 || rpIdHash || clientDataHash ||
    // credentialId || publicKeyU2F)
    let mut verification_data = Vec::with_capacity(
        1 + 32 + input.client_data_hash.len() + acd.credential_id.len() + public_key_u2f.len(),
    );
    verification_data.push(0x00);
    verification_data.extend_from_slice(&input.auth_data.rp_id_hash);
    verification_data.extend_from_slice(input.client_data_hash);
    verification_data.extend_from_slice(&acd.credential_id);
    verification_data.extend_from_slice(&public_key_u2f);

    // Verify the sig using verificationData and certificate public key.
    let is_valid_signature = verify_signature(
        credential_public_key.type_,
        att_cert,
        sig,
        &verification_data,
    )?;

    if !is_valid_signature {
        trace!("fido-u2f signature invalid");
        return Err(AttestationError::AttestationStatementSigInvalid);
    }

    validate_fidou2f_root(verifier, &trust_path)?;

    // Return attestation type Basic and attestation trust path x5c.
    Ok(VerificationResult {
        attestation_type: AttestationType::Basic,
        trust_path,
        metadata: AttestationMetadata::None,
    })
}
