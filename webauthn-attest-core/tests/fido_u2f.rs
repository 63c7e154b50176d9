mod common;

use common::*;
use fido_mds::{AttestationType as MdsAttestationType, MetadataEntry, StaticMetadataService};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use serde_cbor_2::Value;
use uuid::Uuid;
use webauthn_attest_core::error::AttestationError;
use webauthn_attest_core::{
    AttestationObject, AttestationPolicy, AttestationType, AttestationVerifier, AAGUID_ZERO,
};

fn u2f_cert(key: &PKey<Private>) -> X509 {
    CertSpec::new(name(&[(Nid::COMMONNAME, "Example U2F Attestation")]), key).build()
}

/// 0x00 || rpIdHash || clientDataHash || credentialId || 0x04 || x || y
fn verification_data(auth_data: &[u8], cred_key: &PKey<Private>, client_data_hash: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00];
    data.extend_from_slice(&auth_data[..32]);
    data.extend_from_slice(client_data_hash);
    data.extend_from_slice(&CREDENTIAL_ID);
    data.extend_from_slice(
        &cose_es256(cred_key)
            .get_alg_key_ecc_x962_raw()
            .unwrap(),
    );
    data
}

fn u2f_attestation(
    att_key: &PKey<Private>,
    certs: &[&X509],
    aaguid: &[u8; 16],
) -> AttestationObject {
    let cred_key = p256_key();
    let auth_data = auth_data(aaguid, &cose_es256(&cred_key));
    let sig = sign_es256(
        att_key,
        &verification_data(&auth_data, &cred_key, &CLIENT_DATA_HASH),
    );
    attestation(
        "fido-u2f",
        stmt(vec![("sig", Value::Bytes(sig)), ("x5c", x5c(certs))]),
        auth_data,
    )
}

fn verifier() -> AttestationVerifier<'static> {
    AttestationVerifier::new(AttestationPolicy::default())
}

#[test]
fn fido_u2f_attestation() {
    init_logging();
    let att_key = p256_key();
    let cert = u2f_cert(&att_key);
    let att_obj = u2f_attestation(&att_key, &[&cert], &AAGUID_ZERO);

    let result = verifier().verify(&att_obj, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::Basic);
    assert_eq!(result.trust_path.len(), 1);
    assert_eq!(
        result.trust_path[0].to_der().unwrap(),
        cert.to_der().unwrap()
    );
}

#[test]
fn fido_u2f_tampered() {
    let att_key = p256_key();
    let cert = u2f_cert(&att_key);
    let att_obj = u2f_attestation(&att_key, &[&cert], &AAGUID_ZERO);

    let tampered = AttestationObject::new(
        "fido-u2f",
        att_obj.att_stmt.clone(),
        tamper(&att_obj.auth_data_bytes),
    );
    assert!(matches!(
        verifier().verify(&tampered, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationStatementSigInvalid)
    ));

    assert!(matches!(
        verifier().verify(&att_obj, &tampered_hash()),
        Err(AttestationError::AttestationStatementSigInvalid)
    ));
}

#[test]
fn fido_u2f_nonzero_aaguid() {
    let att_key = p256_key();
    let cert = u2f_cert(&att_key);
    // The signature is valid for this data, the AAGUID alone makes it unacceptable.
    let att_obj = u2f_attestation(&att_key, &[&cert], &TEST_AAGUID);

    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationFidoU2fAaguidNotZero)
    ));
}

#[test]
fn fido_u2f_certificate_count() {
    let att_key = p256_key();
    let cert = u2f_cert(&att_key);
    let ca_key = p256_key();
    let ca = root_ca("Example U2F Root", &ca_key);

    let att_obj = u2f_attestation(&att_key, &[&cert, &ca], &AAGUID_ZERO);
    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationStatementX5CInvalid)
    ));

    let cred_key = p256_key();
    let auth_data = auth_data(&AAGUID_ZERO, &cose_es256(&cred_key));
    let att_obj = attestation(
        "fido-u2f",
        stmt(vec![("sig", Value::Bytes(vec![0; 70]))]),
        auth_data,
    );
    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationStatementX5CMissing)
    ));
}

#[test]
fn fido_u2f_requires_p256() {
    let att_key = ec_key(Nid::SECP384R1);
    let cert = u2f_cert(&att_key);
    let att_obj = u2f_attestation(&att_key, &[&cert], &AAGUID_ZERO);

    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationFidoU2fKeyInvalid)
    ));
}

#[test]
fn fido_u2f_root_policy() {
    let root_key = p256_key();
    let root = root_ca("Example U2F Root", &root_key);
    let att_key = p256_key();
    let cert = CertSpec::new(name(&[(Nid::COMMONNAME, "Example U2F Attestation")]), &att_key)
        .issuer(&root, &root_key)
        .extension(aaguid_extension(&TEST_AAGUID, false))
        .build();
    let att_obj = u2f_attestation(&att_key, &[&cert], &AAGUID_ZERO);

    let policy = AttestationPolicy {
        require_valid_attestation_root: true,
        danger_disable_certificate_time_checks: false,
    };

    let mut entry = MetadataEntry::new(Uuid::from_bytes(TEST_AAGUID));
    entry.attestation_root_certificates.push(root);
    entry.attestation_types.push(MdsAttestationType::BasicFull);
    let mut service = StaticMetadataService::new();
    service.insert(entry);

    let verifier = AttestationVerifier::new(policy.clone()).with_metadata(&service);
    assert!(verifier.verify(&att_obj, &CLIENT_DATA_HASH).is_ok());

    // Without the AAGUID extension the model is unknown, which conformance testing refuses.
    let bare_key = p256_key();
    let bare = u2f_cert(&bare_key);
    let att_obj = u2f_attestation(&bare_key, &[&bare], &AAGUID_ZERO);
    assert!(verifier.verify(&att_obj, &CLIENT_DATA_HASH).is_ok());

    let strict = StaticMetadataService::new().with_conformance_testing(true);
    let verifier = AttestationVerifier::new(policy).with_metadata(&strict);
    assert!(matches!(
        verifier.verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationCertificateAAGUIDMissing)
    ));
}
