#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use base64::{engine::general_purpose, Engine as _};
use clap::Parser;
use clap::{Args, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fido_mds::StaticMetadataService;
use webauthn_attest_core::{
    AttestationObject, AttestationPolicy, AttestationVerifier, AuthenticatorData,
    VerificationResult,
};

#[derive(Debug, Args)]
pub struct VerifyOpt {
    #[clap(short, long)]
    pub debug: bool,
    /// Path to the CBOR attestation object
    #[clap(short = 'a', long = "attestation")]
    pub attestation: PathBuf,
    /// The input files are base64 text rather than binary
    #[clap(long)]
    pub base64: bool,
    /// Path to the client data JSON, which is hashed with SHA-256
    #[clap(long = "client-data-json", conflicts_with = "client_data_hash")]
    pub client_data_json: Option<PathBuf>,
    /// The client data hash as hex
    #[clap(long = "client-data-hash", required_unless_present = "client_data_json")]
    pub client_data_hash: Option<String>,
    /// Path to a metadata JSON file
    #[clap(short = 'm', long = "metadata")]
    pub metadata: Option<PathBuf>,
    /// Require packed and fido-u2f attestations to chain to a metadata root
    #[clap(long = "require-valid-root", requires = "metadata")]
    pub require_valid_root: bool,
    /// Refuse authenticators that have no metadata
    #[clap(long, requires = "metadata")]
    pub conformance: bool,
    /// Do not check certificate validity windows
    #[clap(long = "danger-disable-time-checks")]
    pub danger_disable_time_checks: bool,
}

#[derive(Debug, Args)]
pub struct InspectOpt {
    #[clap(short, long)]
    pub debug: bool,
    /// Path to the raw authenticator data
    #[clap(long = "auth-data")]
    pub auth_data: PathBuf,
    /// The input file is base64 text rather than binary
    #[clap(long)]
    pub base64: bool,
}

#[derive(Debug, Subcommand)]
#[clap(about = "Webauthn attestation verification tool")]
pub enum Opt {
    /// Verify an attestation object and display the result
    Verify(VerifyOpt),
    /// Parse and display authenticator data
    Inspect(InspectOpt),
}

impl Opt {
    fn debug(&self) -> bool {
        match self {
            Opt::Verify(VerifyOpt { debug, .. }) | Opt::Inspect(InspectOpt { debug, .. }) => {
                *debug
            }
        }
    }
}

#[derive(Debug, clap::Parser)]
#[clap(about = "Webauthn attestation verification tool")]
pub struct CliParser {
    #[clap(subcommand)]
    pub commands: Opt,
}

fn read_input(path: &Path, base64: bool) -> Result<Vec<u8>, String> {
    let data = fs::read(path).map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
    if !base64 {
        return Ok(data);
    }

    let text = String::from_utf8(data)
        .map_err(|_| format!("{} is not base64 text", path.display()))?;
    let text = text.trim();
    general_purpose::STANDARD
        .decode(text)
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')))
        .map_err(|e| format!("{} is not valid base64: {}", path.display(), e))
}

fn client_data_hash(opt: &VerifyOpt) -> Result<Vec<u8>, String> {
    match (&opt.client_data_json, &opt.client_data_hash) {
        (Some(path), _) => {
            let json = read_input(path, opt.base64)?;
            Ok(openssl::sha::sha256(&json).to_vec())
        }
        (None, Some(h)) => hex::decode(h.trim()).map_err(|e| format!("invalid hex: {}", e)),
        (None, None) => Err("no client data provided".to_string()),
    }
}

fn display_result(result: &VerificationResult) {
    println!("attestation type: {:?}", result.attestation_type);
    match serde_json::to_string(&result.metadata) {
        Ok(m) => println!("metadata: {}", m),
        Err(e) => tracing::warn!(?e, "unable to display metadata"),
    }
    for (idx, cert) in result.trust_path.iter().enumerate() {
        let subject: Vec<String> = cert
            .subject_name()
            .entries()
            .map(|entry| {
                let value = String::from_utf8_lossy(entry.data().as_slice());
                format!("{}={}", entry.object().nid().short_name().unwrap_or("?"), value)
            })
            .collect();
        println!("trust path [{}]: {}", idx, subject.join(", "));
    }
}

fn verify(opt: &VerifyOpt) -> Result<(), String> {
    let raw = read_input(&opt.attestation, opt.base64)?;
    let client_data_hash = client_data_hash(opt)?;

    let att_obj = AttestationObject::try_from(raw.as_slice()).map_err(|e| e.to_string())?;
    tracing::debug!(fmt = %att_obj.fmt, "decoded attestation object");

    let metadata = match &opt.metadata {
        Some(path) => {
            let s = fs::read_to_string(path)
                .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
            let service = StaticMetadataService::from_str(&s)
                .map_err(|e| e.to_string())?
                .with_conformance_testing(opt.conformance);
            Some(service)
        }
        None => None,
    };

    let policy = AttestationPolicy {
        require_valid_attestation_root: opt.require_valid_root,
        danger_disable_certificate_time_checks: opt.danger_disable_time_checks,
    };

    let mut verifier = AttestationVerifier::new(policy);
    if let Some(service) = metadata.as_ref() {
        verifier = verifier.with_metadata(service);
    }

    let result = verifier
        .verify(&att_obj, &client_data_hash)
        .map_err(|e| e.to_string())?;

    println!("format: {}", att_obj.fmt);
    display_result(&result);
    Ok(())
}

fn inspect(opt: &InspectOpt) -> Result<(), String> {
    let raw = read_input(&opt.auth_data, opt.base64)?;
    let auth_data = AuthenticatorData::try_from(raw.as_slice()).map_err(|e| e.to_string())?;

    println!("rp id hash: {}", hex::encode(auth_data.rp_id_hash));
    println!("flags: {:#04x}", auth_data.flags);
    println!("user present: {}", auth_data.user_present);
    println!("user verified: {}", auth_data.user_verified);
    println!("backup eligible: {}", auth_data.backup_eligible);
    println!("backup state: {}", auth_data.backup_state);
    println!("counter: {}", auth_data.counter);

    if let Some(acd) = &auth_data.acd {
        println!("aaguid: {}", hex::encode(acd.aaguid));
        println!("credential id: {}", hex::encode(&acd.credential_id));
        println!("credential key: {:?}", acd.credential_pk.type_);
    }

    if let Some(extensions) = &auth_data.extensions {
        println!("extensions: {:?}", extensions);
    }

    Ok(())
}

fn main() -> ExitCode {
    let opt = CliParser::parse();

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = if opt.commands.debug() {
        match EnvFilter::try_new(
            "webauthn_attest_core=debug,fido_mds=debug,webauthn_attest_tool=debug",
        ) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("ERROR! Unable to start tracing {:?}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(f) => f,
            Err(_) => EnvFilter::new("webauthn_attest_core=warn,fido_mds=warn,webauthn_attest_tool=warn"),
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let res = match &opt.commands {
        Opt::Verify(verify_opt) => verify(verify_opt),
        Opt::Inspect(inspect_opt) => inspect(inspect_opt),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(%e);
            ExitCode::FAILURE
        }
    }
}
