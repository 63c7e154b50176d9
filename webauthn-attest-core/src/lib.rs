//! Webauthn Attestation Verification
//!
//! When a new credential is registered, the authenticator may provide an attestation statement
//! that proves the credential was created by a genuine device of a known model. This library
//! decodes the attestation object, checks the statement for the format the authenticator used
//! (packed, fido-u2f, android-key, apple, tpm or none) and returns the attestation type along
//! with the certificate chain that was presented.
//!
//! Trust decisions that need outside knowledge, such as which roots an authenticator model
//! chains to or whether the model has been revoked, are supplied by a
//! [MetadataService](fido_mds::MetadataService) that you inject into the [AttestationVerifier].
//!
//! ```no_run
//! use webauthn_attest_core::{AttestationObject, AttestationPolicy, AttestationVerifier};
//!
//! # fn example(raw: &[u8], client_data_hash: &[u8]) -> Result<(), webauthn_attest_core::error::AttestationError> {
//! let att_obj = AttestationObject::try_from(raw)?;
//! let verifier = AttestationVerifier::new(AttestationPolicy::default());
//! let result = verifier.verify(&att_obj, client_data_hash)?;
//! println!("{:?}", result.attestation_type);
//! # Ok(())
//! # }
//! ```

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod constants;

pub mod asn1;
pub mod attestation;
pub mod authenticator_data;
pub mod cbor;
pub mod crypto;
pub mod error;
pub mod interface;
mod tpm;
pub mod trust;

pub use crate::attestation::{
    AttestationFormat, AttestationObject, AttestationPolicy, AttestationVerifier,
};
pub use crate::interface::*;
pub use crate::trust::verify_trust_path;
