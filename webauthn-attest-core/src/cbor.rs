//! CBOR decoding helpers over `serde_cbor_2`.
//!
//! The generic object model is [serde_cbor_2::Value]. Typed access to it goes through the
//! `cbor_try_*` macros, which fail with [AttestationError::CBORTypeMismatch] rather than
//! coercing.

use crate::error::AttestationError;
use serde::Deserialize;
use serde_cbor_2::Value;

/// Decode a single CBOR item that must occupy the whole buffer.
pub fn decode_cbor(data: &[u8]) -> Result<Value, AttestationError> {
    serde_cbor_2::from_slice(data).map_err(|e| {
        debug!(?e, "decode_cbor");
        AttestationError::ParseCBORFailure(e)
    })
}

/// Decode a single CBOR item from the front of a buffer, returning the item and the number of
/// bytes it occupied. Used where a CBOR item is followed by further data, such as the
/// credential public key inside authenticator data.
pub fn decode_cbor_prefix(data: &[u8]) -> Result<(Value, usize), AttestationError> {
    let mut deserializer = serde_cbor_2::Deserializer::from_slice(data);
    let value = Value::deserialize(&mut deserializer).map_err(|e| {
        debug!(?e, "decode_cbor_prefix");
        AttestationError::ParseCBORFailure(e)
    })?;
    Ok((value, deserializer.byte_offset()))
}

/// Encode a value back to bytes. Maps are emitted in key order, so two values that compare
/// equal always encode identically.
pub fn encode_cbor(value: &Value) -> Result<Vec<u8>, AttestationError> {
    serde_cbor_2::to_vec(value).map_err(AttestationError::ParseCBORFailure)
}

/// Look up a text keyed entry in a CBOR map.
pub(crate) fn map_get<'a>(
    map: &'a std::collections::BTreeMap<Value, Value>,
    key: &str,
) -> Option<&'a Value> {
    map.get(&Value::Text(key.to_string()))
}
