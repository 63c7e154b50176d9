//! Attestation trust chain validation.
//!
//! Format verifiers only prove that a statement is internally consistent. Whether the
//! presented chain leads to a root you trust is decided here, either directly with
//! [verify_trust_path] or through the root policy of an [AttestationVerifier] that consults
//! a metadata service.

use fido_mds::{AttestationType as MdsAttestationType, MetadataEntry};
use openssl::stack;
use openssl::x509::{self, store, verify, X509};
use uuid::Uuid;

use crate::attestation::{read_extension, AttestationVerifier, FidoGenCeAaguid};
use crate::crypto::is_self_signed;
use crate::error::AttestationError;
use crate::interface::Aaguid;

/// Verify that the trust path chains to one of `roots`. The first certificate of the path
/// is the leaf, any further certificates are untrusted intermediates. Revocation is not
/// checked.
///
/// Returns `Ok(false)` when the chain does not validate.
pub fn verify_trust_path(
    trust_path: &[X509],
    roots: &[X509],
    danger_disable_certificate_time_checks: bool,
) -> Result<bool, AttestationError> {
    // If the root list is empty no attestation can ever be trusted.
    if roots.is_empty() {
        return Err(AttestationError::AttestationTrustStoreEmpty);
    }

    let (leaf, chain) = trust_path
        .split_first()
        .ok_or(AttestationError::AttestationLeafCertMissing)?;

    // Convert the chain to a stack so that openssl can use it.
    let mut chain_stack = stack::Stack::new()?;
    for crt in chain.iter() {
        chain_stack.push(crt.clone())?;
    }

    let mut ca_store = store::X509StoreBuilder::new()?;

    // In tests we may need to allow disabling time window validity.
    if danger_disable_certificate_time_checks {
        ca_store.set_flags(verify::X509VerifyFlags::NO_CHECK_TIME)?;
    }

    for root in roots.iter() {
        ca_store.add_cert(root.clone())?;
    }

    let ca_store = ca_store.build();

    let mut ca_ctx = x509::X509StoreContext::new()?;

    let trusted = ca_ctx.init(&ca_store, leaf, &chain_stack, |ca_ctx_ref| {
        ca_ctx_ref.verify_cert().map(|_| {
            // The returned boolean is ignored in favour of the richer error.
            let res = ca_ctx_ref.error();
            if res == x509::X509VerifyResult::OK {
                true
            } else {
                debug!(
                    error = %res,
                    depth = ca_ctx_ref.error_depth(),
                    subject = ?ca_ctx_ref.current_cert().map(|crt| crt.subject_name()),
                    "trust path does not validate"
                );
                false
            }
        })
    })?;

    Ok(trusted)
}

/// Refuse an authenticator model whose status history marks it as untrustworthy.
pub fn check_metadata_status(entry: &MetadataEntry) -> Result<(), AttestationError> {
    match entry.undesirable_status() {
        Some(status) => {
            warn!(aaguid = %entry.aaguid, %status, "authenticator has an undesirable status");
            Err(AttestationError::AuthenticatorStatusUndesirable(status))
        }
        None => Ok(()),
    }
}

/// Find the metadata for a model. Unknown models are skipped unless the service is in
/// conformance testing mode.
fn metadata_for(
    verifier: &AttestationVerifier<'_>,
    aaguid: Uuid,
) -> Result<Option<MetadataEntry>, AttestationError> {
    let service = verifier
        .metadata()
        .ok_or(AttestationError::MetadataServiceUnavailable)?;

    match service.get_entry(&aaguid) {
        Some(entry) => {
            check_metadata_status(&entry)?;
            Ok(Some(entry))
        }
        None if service.conformance_testing() => {
            Err(AttestationError::AttestationMetadataMissing(aaguid))
        }
        None => {
            debug!(%aaguid, "no metadata for authenticator, root validation skipped");
            Ok(None)
        }
    }
}

fn require_chain(
    verifier: &AttestationVerifier<'_>,
    entry: &MetadataEntry,
    trust_path: &[X509],
) -> Result<(), AttestationError> {
    let trusted = verify_trust_path(
        trust_path,
        &entry.attestation_root_certificates,
        verifier.policy().danger_disable_certificate_time_checks,
    )?;

    if trusted {
        Ok(())
    } else {
        Err(AttestationError::AttestationChainNotTrusted(
            entry.aaguid.to_string(),
        ))
    }
}

/// Root policy for packed attestation with a certificate chain.
pub(crate) fn validate_packed_root(
    verifier: &AttestationVerifier<'_>,
    aaguid: &Aaguid,
    trust_path: &[X509],
) -> Result<(), AttestationError> {
    if !verifier.policy().require_valid_attestation_root {
        return Ok(());
    }

    let Some(entry) = metadata_for(verifier, Uuid::from_bytes(*aaguid))? else {
        return Ok(());
    };

    if entry.supports(MdsAttestationType::BasicFull) {
        require_chain(verifier, &entry, trust_path)
    } else {
        // Without basic_full the model is expected to use a self signed surrogate.
        let leaf = trust_path
            .first()
            .ok_or(AttestationError::AttestationLeafCertMissing)?;
        if is_self_signed(leaf)? {
            Ok(())
        } else {
            Err(AttestationError::AttestationLeafNotSelfSigned)
        }
    }
}

/// Root policy for fido-u2f attestation. The authenticator data carries no model, so the
/// AAGUID comes from the attestation certificate.
pub(crate) fn validate_fidou2f_root(
    verifier: &AttestationVerifier<'_>,
    trust_path: &[X509],
) -> Result<(), AttestationError> {
    if !verifier.policy().require_valid_attestation_root {
        return Ok(());
    }

    let service = verifier
        .metadata()
        .ok_or(AttestationError::MetadataServiceUnavailable)?;

    let leaf = trust_path
        .first()
        .ok_or(AttestationError::AttestationLeafCertMissing)?;

    match read_extension::<FidoGenCeAaguid>(leaf)? {
        Some((aaguid, _)) => match metadata_for(verifier, Uuid::from_bytes(aaguid))? {
            Some(entry) => require_chain(verifier, &entry, trust_path),
            None => Ok(()),
        },
        None if service.conformance_testing() => {
            Err(AttestationError::AttestationCertificateAAGUIDMissing)
        }
        None => {
            debug!("fido-u2f certificate has no aaguid, root validation skipped");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fido_mds::{AuthenticatorStatus, StatusReport};
    use openssl::asn1::Asn1Time;
    use openssl::bn::{BigNum, MsbOption};
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::extension::BasicConstraints;
    use openssl::x509::{X509Name, X509NameBuilder};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn name(cn: &str) -> X509Name {
        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
        builder.build()
    }

    fn keypair() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn days_from_now(days: i64) -> Asn1Time {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        Asn1Time::from_unix((now + days * 86400).try_into().unwrap()).unwrap()
    }

    // Valid from a day before `not_after_days`, or from now when that is in the future.
    fn certificate(
        subject: &str,
        pkey: &PKey<Private>,
        issuer: Option<(&str, &PKey<Private>)>,
        ca: bool,
        not_after_days: i64,
    ) -> X509 {
        let mut serial = BigNum::new().unwrap();
        serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder
            .set_serial_number(&serial.to_asn1_integer().unwrap())
            .unwrap();
        builder.set_subject_name(&name(subject)).unwrap();
        let issuer_cn = issuer.map(|(cn, _)| cn).unwrap_or(subject);
        builder.set_issuer_name(&name(issuer_cn)).unwrap();
        builder.set_pubkey(pkey).unwrap();
        builder
            .set_not_before(&days_from_now((not_after_days - 1).min(0)))
            .unwrap();
        builder
            .set_not_after(&days_from_now(not_after_days))
            .unwrap();
        if ca {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
        }
        let signer = issuer.map(|(_, k)| k).unwrap_or(pkey);
        builder.sign(signer, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    #[test]
    fn trust_path_to_root() {
        let root_key = keypair();
        let root = certificate("Root", &root_key, None, true, 30);
        let inter_key = keypair();
        let inter = certificate("Intermediate", &inter_key, Some(("Root", &root_key)), true, 30);
        let leaf_key = keypair();
        let leaf = certificate("Leaf", &leaf_key, Some(("Intermediate", &inter_key)), false, 30);

        assert!(verify_trust_path(&[leaf.clone(), inter.clone()], &[root.clone()], false).unwrap());

        // Without the intermediate the leaf does not chain.
        assert!(!verify_trust_path(&[leaf.clone()], &[root.clone()], false).unwrap());

        // An unrelated root is never trusted.
        let other_key = keypair();
        let other = certificate("Other Root", &other_key, None, true, 30);
        assert!(!verify_trust_path(&[leaf, inter], &[other], false).unwrap());
    }

    #[test]
    fn trust_path_errors() {
        let root_key = keypair();
        let root = certificate("Root", &root_key, None, true, 30);

        assert!(matches!(
            verify_trust_path(&[root.clone()], &[], false),
            Err(AttestationError::AttestationTrustStoreEmpty)
        ));
        assert!(matches!(
            verify_trust_path(&[], &[root], false),
            Err(AttestationError::AttestationLeafCertMissing)
        ));
    }

    #[test]
    fn trust_path_expired_leaf() {
        let root_key = keypair();
        let root = certificate("Root", &root_key, None, true, 30);
        let leaf_key = keypair();
        // Expired yesterday.
        let leaf = certificate("Leaf", &leaf_key, Some(("Root", &root_key)), false, -1);

        assert!(!verify_trust_path(&[leaf.clone()], &[root.clone()], false).unwrap());
        assert!(verify_trust_path(&[leaf], &[root], true).unwrap());
    }

    #[test]
    fn metadata_status() {
        let mut entry = MetadataEntry::new(Uuid::nil());
        assert!(check_metadata_status(&entry).is_ok());

        entry.status_reports.push(StatusReport {
            status: AuthenticatorStatus::FidoCertifiedL1,
            effective_date: None,
            authenticator_version: None,
            certificate: None,
            url: None,
        });
        assert!(check_metadata_status(&entry).is_ok());

        entry.status_reports.push(StatusReport {
            status: AuthenticatorStatus::AttestationKeyCompromise,
            effective_date: None,
            authenticator_version: None,
            certificate: None,
            url: None,
        });
        assert!(matches!(
            check_metadata_status(&entry),
            Err(AttestationError::AuthenticatorStatusUndesirable(
                AuthenticatorStatus::AttestationKeyCompromise
            ))
        ));
    }
}
