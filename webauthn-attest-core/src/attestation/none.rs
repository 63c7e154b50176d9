use super::AttestationInput;
use crate::error::AttestationError;
use crate::interface::*;

// https://w3c.github.io/webauthn/#sctn-none-attestation
pub(crate) fn verify_none_attestation(
    input: &AttestationInput<'_>,
) -> Result<VerificationResult, AttestationError> {
    if !input.att_stmt.is_empty() {
        debug!(members = input.att_stmt.len(), "none attestation statement");
        return Err(AttestationError::AttestationStatementNoneNotEmpty);
    }

    Ok(VerificationResult {
        attestation_type: AttestationType::None,
        trust_path: Vec::new(),
        metadata: AttestationMetadata::None,
    })
}
