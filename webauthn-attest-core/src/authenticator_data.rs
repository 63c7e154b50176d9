//! Parsing of the authenticator data buffer.
//!
//! ```text
//! [ rpIdHash (32) | flags (1) | signCount (4, BE) | attestedCredentialData? | extensions? ]
//! attestedCredentialData = [ aaguid (16) | credIdLen (2, BE) | credId | COSE_Key ]
//! ```

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u32, be_u8};

use crate::cbor::decode_cbor_prefix;
use crate::constants::*;
use crate::error::AttestationError;
use crate::interface::{AttestedCredentialData, AuthenticatorData, COSEKey};

struct AuthenticatorDataHeader<'a> {
    rp_id_hash: &'a [u8],
    flags: u8,
    counter: u32,
}

struct AttestedCredentialDataHeader<'a> {
    aaguid: &'a [u8],
    credential_id: &'a [u8],
}

fn authenticator_data_header_parser(
    i: &[u8],
) -> nom::IResult<&[u8], AuthenticatorDataHeader<'_>> {
    let (i, rp_id_hash) = take(RP_ID_HASH_LEN)(i)?;
    let (i, flags) = be_u8(i)?;
    let (i, counter) = be_u32(i)?;

    Ok((
        i,
        AuthenticatorDataHeader {
            rp_id_hash,
            flags,
            counter,
        },
    ))
}

fn acd_header_parser(
    i: &[u8],
) -> nom::IResult<&[u8], AttestedCredentialDataHeader<'_>> {
    let (i, aaguid) = take(AAGUID_LEN)(i)?;
    let (i, cred_id_len) = be_u16(i)?;
    let (i, credential_id) = take(cred_id_len as usize)(i)?;

    Ok((
        i,
        AttestedCredentialDataHeader {
            aaguid,
            credential_id,
        },
    ))
}

fn nom_failure<E: std::fmt::Debug>(e: E) -> AttestationError {
    error!(?e, "authenticator data structure");
    AttestationError::ParseNOMFailure
}

impl TryFrom<&[u8]> for AuthenticatorData {
    type Error = AttestationError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let (i, header) = authenticator_data_header_parser(data).map_err(nom_failure)?;

        let mut rp_id_hash = [0; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(header.rp_id_hash);

        let flags = header.flags;

        let (i, acd) = if flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0 {
            let (i, acd_header) = acd_header_parser(i).map_err(nom_failure)?;

            // The COSE key is not length prefixed, so the decoder tells us where it ended.
            let (cose_value, consumed) = decode_cbor_prefix(i)?;
            let credential_pk = COSEKey::try_from(&cose_value)?;

            let mut aaguid = [0; AAGUID_LEN];
            aaguid.copy_from_slice(acd_header.aaguid);

            let acd = AttestedCredentialData {
                aaguid,
                credential_id: acd_header.credential_id.to_vec(),
                credential_pk,
            };

            (&i[consumed..], Some(acd))
        } else {
            (i, None)
        };

        let (i, extensions) = if flags & FLAG_EXTENSION_DATA != 0 {
            let (extensions, consumed) = decode_cbor_prefix(i)?;
            // Only a map is a meaningful extension output.
            cbor_try_map!(&extensions)?;
            (&i[consumed..], Some(extensions))
        } else {
            (i, None)
        };

        if !i.is_empty() {
            debug!(remaining = i.len(), "authenticator data trailing bytes");
            return Err(AttestationError::AuthenticatorDataTrailingBytes);
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter: header.counter,
            user_present: flags & FLAG_USER_PRESENT != 0,
            user_verified: flags & FLAG_USER_VERIFIED != 0,
            backup_eligible: flags & FLAG_BACKUP_ELIGIBLE != 0,
            backup_state: flags & FLAG_BACKUP_STATE != 0,
            acd,
            extensions,
        })
    }
}
