mod common;

use std::collections::BTreeMap;

use common::*;
use serde_cbor_2::Value;
use webauthn_attest_core::error::AttestationError;
use webauthn_attest_core::{
    AttestationMetadata, AttestationObject, AttestationPolicy, AttestationType,
    AttestationVerifier, COSEAlgorithm,
};

fn encode(fmt: &str, att_stmt: Value, auth_data: Vec<u8>) -> Vec<u8> {
    let mut m = BTreeMap::new();
    m.insert(text("fmt"), text(fmt));
    m.insert(text("attStmt"), att_stmt);
    m.insert(text("authData"), Value::Bytes(auth_data));
    serde_cbor_2::to_vec(&Value::Map(m)).unwrap()
}

fn verifier() -> AttestationVerifier<'static> {
    AttestationVerifier::new(AttestationPolicy::default())
}

fn self_attestation_bytes() -> Vec<u8> {
    let cred_key = p256_key();
    let auth_data = auth_data(&TEST_AAGUID, &cose_es256(&cred_key));
    let sig = sign_es256(&cred_key, &signed_data(&auth_data, &CLIENT_DATA_HASH));
    encode(
        "packed",
        stmt(vec![
            ("alg", alg(COSEAlgorithm::ES256)),
            ("sig", Value::Bytes(sig)),
        ]),
        auth_data,
    )
}

#[test]
fn none_attestation_from_cbor() {
    init_logging();
    let cred_key = p256_key();
    let raw = encode(
        "none",
        stmt(vec![]),
        auth_data(&TEST_AAGUID, &cose_es256(&cred_key)),
    );

    let att_obj = AttestationObject::try_from(raw.as_slice()).unwrap();
    assert_eq!(att_obj.fmt, "none");

    let result = verifier().verify(&att_obj, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::None);
    assert!(result.trust_path.is_empty());
    assert_eq!(result.metadata, AttestationMetadata::None);
}

#[test]
fn none_attestation_must_be_empty() {
    let cred_key = p256_key();
    let att_obj = attestation(
        "none",
        stmt(vec![("sig", Value::Bytes(vec![0x30, 0x00]))]),
        auth_data(&TEST_AAGUID, &cose_es256(&cred_key)),
    );
    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationStatementNoneNotEmpty)
    ));
}

#[test]
fn self_attestation_from_cbor() {
    let raw = self_attestation_bytes();
    let att_obj = AttestationObject::try_from(raw.as_slice()).unwrap();
    let result = verifier().verify(&att_obj, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::Self_);
}

#[test]
fn unknown_and_unverifiable_formats() {
    let cred_key = p256_key();
    let auth_data = auth_data(&TEST_AAGUID, &cose_es256(&cred_key));

    let att_obj = attestation("fido-u3f", stmt(vec![]), auth_data.clone());
    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationNotSupported(fmt)) if fmt == "fido-u3f"
    ));

    let att_obj = attestation(
        "android-safetynet",
        stmt(vec![
            ("ver", text("14366018")),
            ("response", Value::Bytes(b"header.payload.signature".to_vec())),
        ]),
        auth_data,
    );
    assert!(matches!(
        verifier().verify(&att_obj, &CLIENT_DATA_HASH),
        Err(AttestationError::AttestationNotSupported(fmt)) if fmt == "android-safetynet"
    ));
}

#[test]
fn client_data_hash_length() {
    let raw = self_attestation_bytes();
    let att_obj = AttestationObject::try_from(raw.as_slice()).unwrap();

    let hashes: [&[u8]; 3] = [&CLIENT_DATA_HASH[..31], &[], &[0x5a; 33]];
    for hash in hashes {
        assert!(matches!(
            verifier().verify(&att_obj, hash),
            Err(AttestationError::ClientDataHashInvalid)
        ));
    }
}

#[test]
fn attestation_object_members() {
    let cred_key = p256_key();
    let auth_data = auth_data(&TEST_AAGUID, &cose_es256(&cred_key));

    let mut m = BTreeMap::new();
    m.insert(text("fmt"), text("none"));
    m.insert(text("authData"), Value::Bytes(auth_data));
    let raw = serde_cbor_2::to_vec(&Value::Map(m)).unwrap();
    assert!(matches!(
        AttestationObject::try_from(raw.as_slice()),
        Err(AttestationError::AttestationObjectFieldMissing("attStmt"))
    ));

    // A well formed CBOR value that is not a map.
    let raw = serde_cbor_2::to_vec(&Value::Array(vec![text("none")])).unwrap();
    assert!(AttestationObject::try_from(raw.as_slice()).is_err());
}

#[test]
fn truncated_attestation_objects() {
    let raw = self_attestation_bytes();

    for len in 0..raw.len() {
        let Ok(att_obj) = AttestationObject::try_from(&raw[..len]) else {
            continue;
        };
        assert!(verifier().verify(&att_obj, &CLIENT_DATA_HASH).is_err());
    }
}

#[test]
fn truncated_authenticator_data() {
    let cred_key = p256_key();
    let auth_data = auth_data(&TEST_AAGUID, &cose_es256(&cred_key));

    for len in 0..auth_data.len() {
        let att_obj = attestation("none", stmt(vec![]), auth_data[..len].to_vec());
        assert!(verifier().verify(&att_obj, &CLIENT_DATA_HASH).is_err());
    }
}
