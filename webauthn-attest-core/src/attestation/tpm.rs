use uuid::Uuid;

use super::{validate_extension, AttestationInput, AttestationVerifier, FidoGenCeAaguid};
use crate::crypto::{assert_tpm_attest_req, check_validity, only_hash_from_type, verify_signature};
use crate::error::AttestationError;
use crate::interface::*;
use crate::tpm::{TpmsAttest, TpmtPublic, TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY};

// https://w3c.github.io/webauthn/#sctn-tpm-attestation
pub(crate) fn verify_tpm_attestation(
    input: &AttestationInput<'_>,
    verifier: &AttestationVerifier<'_>,
) -> Result<VerificationResult, AttestationError> {
    debug!("begin verify_tpm_attest");
    let acd = input.acd;

    // The version of the TPM specification to which the signature conforms.
    let ver_value = input
        .get("ver")
        .ok_or(AttestationError::AttestationStatementVerMissing)?;
    let ver =
        cbor_try_string!(ver_value).map_err(|_| AttestationError::AttestationStatementVerInvalid)?;
    if ver != "2.0" {
        debug!(?ver, "tpm version");
        return Err(AttestationError::AttestationStatementVerUnsupported);
    }

    let alg = input.alg()?;

    // The TPMS_ATTEST structure over which the signature was computed.
    let certinfo_bytes = input
        .get("certInfo")
        .ok_or(AttestationError::AttestationStatementCertInfoMissing)
        .and_then(|v| {
            cbor_try_bytes!(v).map_err(|_| AttestationError::AttestationStatementCertInfoMissing)
        })?;
    let certinfo = TpmsAttest::try_from(certinfo_bytes.as_slice())?;

    // The TPMT_PUBLIC structure used by the TPM to represent the credential public key.
    let pubarea_bytes = input
        .get("pubArea")
        .ok_or(AttestationError::AttestationStatementPubAreaMissing)
        .and_then(|v| {
            cbor_try_bytes!(v).map_err(|_| AttestationError::AttestationStatementPubAreaMissing)
        })?;
    let pubarea = TpmtPublic::try_from(pubarea_bytes.as_slice())?;

    let sig = input.sig()?;

    // aikCert followed by its certificate chain.
    let trust_path = input.x5c_required()?;
    let aik_cert = trust_path
        .first()
        .ok_or(AttestationError::AttestationStatementX5CInvalid)?;

    // Verify that the public key specified by the parameters and unique fields of pubArea is
    // identical to the credentialPublicKey in the attestedCredentialData in authenticatorData.
    if !pubarea.matches_key(&acd.credential_pk) {
        debug!(pub_area_type = ?pubarea.type_, "tpm pubArea does not describe the credential key");
        return Err(AttestationError::AttestationTpmPubAreaMismatch);
    }

    // Verify that magic is set to TPM_GENERATED_VALUE.
    if certinfo.magic != TPM_GENERATED_VALUE {
        return Err(AttestationError::AttestationTpmMagicInvalid);
    }

    // Verify that type is set to TPM_ST_ATTEST_CERTIFY.
    if certinfo.type_ != TPM_ST_ATTEST_CERTIFY {
        return Err(AttestationError::AttestationTpmStInvalid);
    }

    if certinfo.extra_data.is_empty() {
        return Err(AttestationError::AttestationTpmExtraDataInvalid);
    }

    // Verify that extraData is set to the hash of attToBeSigned using the hash algorithm
    // employed in "alg".
    let att_to_be_signed = input.signed_data();
    if only_hash_from_type(alg, &att_to_be_signed)? != certinfo.extra_data {
        return Err(AttestationError::AttestationTpmExtraDataMismatch);
    }

    // Verify that attested contains a TPMS_CERTIFY_INFO structure whose name field contains a
    // valid Name for pubArea, as computed using the algorithm in the nameAlg field of pubArea.
    // The name carries the algorithm id in its first two bytes, so it is checked as well.
    if pubarea.name(pubarea_bytes)? != certinfo.certify_name {
        return Err(AttestationError::AttestationTpmPubAreaHashInvalid);
    }

    // Verify the sig is a valid signature over certInfo using the attestation public key in
    // aikCert with the algorithm specified in alg.
    if !verify_signature(alg, aik_cert, sig, certinfo_bytes)? {
        debug!("tpm certInfo signature invalid");
        return Err(AttestationError::AttestationStatementSigInvalid);
    }

    // Verify that aikCert meets the requirements in § 8.3.1 TPM Attestation Statement
    // Certificate Requirements.
    check_validity(
        aik_cert,
        verifier.policy().danger_disable_certificate_time_checks,
    )?;
    assert_tpm_attest_req(aik_cert)?;

    // If aikCert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4 (id-fido-gen-ce-aaguid)
    // verify that the value of this extension matches the aaguid in authenticatorData.
    validate_extension::<FidoGenCeAaguid>(aik_cert, &acd.aaguid)?;

    // Return attestation type AttCA and attestation trust path x5c.
    Ok(VerificationResult {
        attestation_type: AttestationType::AttCa,
        trust_path,
        metadata: AttestationMetadata::Tpm {
            aaguid: Uuid::from_bytes(acd.aaguid),
            firmware_version: certinfo.firmware_version,
        },
    })
}
