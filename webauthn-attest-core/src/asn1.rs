//! DER decoding on top of `der_parser`.
//!
//! `der_parser` enforces the DER content rules, such as minimal integers, definite lengths
//! and boolean values, but accepts a long form length or tag where the short form would do.
//! Extension values are run through `check_der_canonical` before they are parsed so that
//! only the canonical encoding of a value is accepted.

use der_parser::der::{der_read_element_header, parse_der, DerObject, Header};
use der_parser::error::BerError;

use crate::error::AttestationError;

/// A decoded DER element. Children of constructed elements are decoded as well.
pub type Asn1Element<'a> = DerObject<'a>;

/// Maximum nesting of constructed elements.
const MAX_DEPTH: usize = 32;

/// Highest tag number that must use the single octet identifier form.
const MAX_LOW_TAG: u32 = 30;

/// Decode exactly one canonical DER element, failing on trailing bytes.
pub fn decode_asn1(i: &[u8]) -> Result<Asn1Element<'_>, AttestationError> {
    check_der_canonical(i)?;
    let (_, element) = parse_der(i)?;
    Ok(element)
}

/// Fail unless `i` is exactly one DER element whose identifiers and lengths, and those of
/// every nested element, use their shortest encoding.
pub(crate) fn check_der_canonical(i: &[u8]) -> Result<(), BerError> {
    let rest = check_element(i, 0)?;
    if !rest.is_empty() {
        debug!(trailing = rest.len(), "bytes after DER element");
        return Err(BerError::InvalidLength);
    }
    Ok(())
}

fn check_element(i: &[u8], depth: usize) -> Result<&[u8], BerError> {
    if depth > MAX_DEPTH {
        return Err(BerError::BerMaxDepth);
    }

    let (rem, hdr) = der_read_element_header(i)?;
    let len = hdr.length().definite()?;

    let tag_len = check_identifier(&hdr)?;
    let length_len = i.len() - rem.len() - tag_len;
    if length_len != minimal_length_octets(len) {
        debug!(len, length_len, "non minimal DER length");
        return Err(BerError::InvalidLength);
    }

    if rem.len() < len {
        return Err(BerError::InvalidLength);
    }
    let (content, next) = rem.split_at(len);

    if hdr.is_constructed() {
        let mut children = content;
        while !children.is_empty() {
            children = check_element(children, depth + 1)?;
        }
    }

    Ok(next)
}

/// Returns the identifier length.
fn check_identifier(hdr: &Header<'_>) -> Result<usize, BerError> {
    let raw_tag = hdr.raw_tag().ok_or(BerError::InvalidTag)?;
    if raw_tag.len() > 1 {
        // High tag number form: only for tags above 30, and without leading zero septets.
        if hdr.tag().0 <= MAX_LOW_TAG || raw_tag.get(1) == Some(&0x80) {
            debug!(tag = hdr.tag().0, "non minimal DER identifier");
            return Err(BerError::InvalidTag);
        }
    }
    Ok(raw_tag.len())
}

fn minimal_length_octets(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        let significant = (usize::BITS - len.leading_zeros()) as usize;
        1 + (significant + 7) / 8
    }
}
