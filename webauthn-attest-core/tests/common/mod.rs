//! A software authenticator that produces attestations for the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::str::FromStr;

use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, BigNumContext, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Extension, X509Name, X509NameBuilder, X509};
use serde_cbor_2::Value;

use webauthn_attest_core::{
    AttestationObject, COSEAlgorithm, COSEEC2Key, COSEKey, COSEKeyType, ECDSACurve,
};

pub const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";
pub const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";
pub const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";
pub const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

pub const TEST_AAGUID: [u8; 16] = [
    0xcb, 0x69, 0x48, 0x1e, 0x8f, 0xf7, 0x40, 0x39, 0x93, 0xec, 0x0a, 0x27, 0x29, 0xa1, 0x54,
    0xa8,
];

pub const CLIENT_DATA_HASH: [u8; 32] = [0x5a; 32];

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("webauthn_attest_core=debug")
        .with_test_writer()
        .try_init();
}

// ---- keys

pub fn ec_key(nid: Nid) -> PKey<Private> {
    let group = EcGroup::from_curve_name(nid).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn p256_key() -> PKey<Private> {
    ec_key(Nid::X9_62_PRIME256V1)
}

/// The ES256 COSE key for a P-256 key pair.
pub fn cose_es256(pkey: &PKey<Private>) -> COSEKey {
    let ec = pkey.ec_key().unwrap();
    let mut ctx = BigNumContext::new().unwrap();
    let mut x = BigNum::new().unwrap();
    let mut y = BigNum::new().unwrap();
    ec.public_key()
        .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
        .unwrap();
    COSEKey {
        type_: COSEAlgorithm::ES256,
        key: COSEKeyType::EC_EC2(COSEEC2Key {
            curve: ECDSACurve::SECP256R1,
            x: x.to_vec_padded(32).unwrap(),
            y: y.to_vec_padded(32).unwrap(),
        }),
    }
}

/// A DER ECDSA signature with SHA-256.
pub fn sign_es256(pkey: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), pkey).unwrap();
    signer.update(data).unwrap();
    signer.sign_to_vec().unwrap()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    openssl::sha::sha256(data)
}

// ---- authenticator data

pub const CREDENTIAL_ID: [u8; 16] = [0xc7; 16];

/// Registration authenticator data for `example.com` with UP, UV and AT set.
pub fn auth_data(aaguid: &[u8; 16], credential_pk: &COSEKey) -> Vec<u8> {
    let mut data = sha256(b"example.com").to_vec();
    data.push(0x45);
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(aaguid);
    data.extend_from_slice(&(CREDENTIAL_ID.len() as u16).to_be_bytes());
    data.extend_from_slice(&CREDENTIAL_ID);
    data.extend_from_slice(&credential_pk.to_cbor_bytes().unwrap());
    data
}

/// authenticatorData || clientDataHash
pub fn signed_data(auth_data: &[u8], client_data_hash: &[u8]) -> Vec<u8> {
    let mut data = auth_data.to_vec();
    data.extend_from_slice(client_data_hash);
    data
}

/// Flip a bit of the RP ID hash. The structure stays valid.
pub fn tamper(auth_data: &[u8]) -> Vec<u8> {
    let mut data = auth_data.to_vec();
    data[3] ^= 0x01;
    data
}

pub fn tampered_hash() -> [u8; 32] {
    let mut h = CLIENT_DATA_HASH;
    h[31] ^= 0x80;
    h
}

// ---- attestation statements

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn stmt(members: Vec<(&str, Value)>) -> Value {
    Value::Map(members.into_iter().map(|(k, v)| (text(k), v)).collect::<BTreeMap<_, _>>())
}

pub fn x5c(certs: &[&X509]) -> Value {
    Value::Array(
        certs
            .iter()
            .map(|c| Value::Bytes(c.to_der().unwrap()))
            .collect(),
    )
}

pub fn alg(alg: COSEAlgorithm) -> Value {
    Value::Integer(i128::from(alg))
}

pub fn attestation(fmt: &str, att_stmt: Value, auth_data: Vec<u8>) -> AttestationObject {
    AttestationObject::new(fmt, att_stmt, auth_data)
}

// ---- DER

pub fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len < 0x100 {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

pub fn der_seq(parts: &[Vec<u8>]) -> Vec<u8> {
    der(0x30, &parts.concat())
}

pub fn der_oid(dotted: &str) -> Vec<u8> {
    let arcs: Vec<u64> = dotted.split('.').map(|a| a.parse().unwrap()).collect();
    let mut content = Vec::new();
    let mut encode = |mut v: u64| {
        let mut tmp = vec![(v & 0x7f) as u8];
        v >>= 7;
        while v > 0 {
            tmp.push(0x80 | (v & 0x7f) as u8);
            v >>= 7;
        }
        tmp.reverse();
        content.extend_from_slice(&tmp);
    };
    encode(arcs[0] * 40 + arcs[1]);
    for arc in &arcs[2..] {
        encode(*arc);
    }
    der(0x06, &content)
}

pub fn der_int(v: u8) -> Vec<u8> {
    if v & 0x80 != 0 {
        der(0x02, &[0x00, v])
    } else {
        der(0x02, &[v])
    }
}

pub fn der_octets(v: &[u8]) -> Vec<u8> {
    der(0x04, v)
}

/// A context specific EXPLICIT tag, using the high tag number form where needed.
pub fn der_explicit(tag: u32, inner: &[u8]) -> Vec<u8> {
    let mut ident = Vec::new();
    if tag < 31 {
        ident.push(0xa0 | tag as u8);
    } else {
        ident.push(0xbf);
        let mut tmp = vec![(tag & 0x7f) as u8];
        let mut t = tag >> 7;
        while t > 0 {
            tmp.push(0x80 | (t & 0x7f) as u8);
            t >>= 7;
        }
        tmp.reverse();
        ident.extend_from_slice(&tmp);
    }
    let encoded = der(0x00, inner);
    ident.extend_from_slice(&encoded[1..]);
    ident
}

pub fn extension(oid: &str, critical: bool, value: &[u8]) -> X509Extension {
    let oid = Asn1Object::from_str(oid).unwrap();
    let value = Asn1OctetString::new_from_bytes(value).unwrap();
    X509Extension::new_from_der(&oid, critical, &value).unwrap()
}

pub fn aaguid_extension(aaguid: &[u8; 16], critical: bool) -> X509Extension {
    extension(OID_FIDO_GEN_CE_AAGUID, critical, &der_octets(aaguid))
}

// ---- certificates

pub fn name(entries: &[(Nid, &str)]) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    for (nid, value) in entries {
        builder.append_entry_by_nid(*nid, value).unwrap();
    }
    builder.build()
}

pub fn packed_subject() -> X509Name {
    name(&[
        (Nid::COUNTRYNAME, "AU"),
        (Nid::ORGANIZATIONNAME, "Example Authenticators"),
        (Nid::ORGANIZATIONALUNITNAME, "Authenticator Attestation"),
        (Nid::COMMONNAME, "Example Key Attestation"),
    ])
}

pub struct CertSpec<'a> {
    pub subject: X509Name,
    pub key: &'a PKey<Private>,
    pub issuer: Option<(&'a X509, &'a PKey<Private>)>,
    pub ca: bool,
    pub extensions: Vec<X509Extension>,
    pub not_before_days: i64,
    pub not_after_days: u32,
}

impl<'a> CertSpec<'a> {
    pub fn new(subject: X509Name, key: &'a PKey<Private>) -> Self {
        CertSpec {
            subject,
            key,
            issuer: None,
            ca: false,
            extensions: Vec::new(),
            not_before_days: 0,
            not_after_days: 30,
        }
    }

    pub fn issuer(mut self, cert: &'a X509, key: &'a PKey<Private>) -> Self {
        self.issuer = Some((cert, key));
        self
    }

    pub fn ca(mut self) -> Self {
        self.ca = true;
        self
    }

    pub fn extension(mut self, ext: X509Extension) -> Self {
        self.extensions.push(ext);
        self
    }

    pub fn build(self) -> X509 {
        let mut serial = BigNum::new().unwrap();
        serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder
            .set_serial_number(&serial.to_asn1_integer().unwrap())
            .unwrap();
        builder.set_subject_name(&self.subject).unwrap();
        match self.issuer {
            Some((issuer, _)) => builder.set_issuer_name(issuer.subject_name()).unwrap(),
            None => builder.set_issuer_name(&self.subject).unwrap(),
        }
        builder.set_pubkey(self.key).unwrap();

        let now = Asn1Time::days_from_now(0).unwrap();
        let not_before = if self.not_before_days > 0 {
            Asn1Time::days_from_now(self.not_before_days as u32).unwrap()
        } else {
            now
        };
        builder.set_not_before(&not_before).unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(self.not_after_days).unwrap())
            .unwrap();

        if self.ca {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
        }
        for ext in self.extensions {
            builder.append_extension(ext).unwrap();
        }

        let signer = match self.issuer {
            Some((_, key)) => key,
            None => self.key,
        };
        builder.sign(signer, MessageDigest::sha256()).unwrap();
        builder.build()
    }
}

/// A self signed CA certificate.
pub fn root_ca(cn: &str, key: &PKey<Private>) -> X509 {
    CertSpec::new(name(&[(Nid::COMMONNAME, cn)]), key).ca().build()
}
