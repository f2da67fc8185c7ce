//! Byte encodings of index terms
//!
//! Numeric terms are fixed-width big-endian so that the byte order of the
//! term dictionary matches the numeric order and range queries become term
//! dictionary ranges.

use std::net::IpAddr;
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::FieldValue;

const SIGN_BIT: u64 = 1 << 63;

pub fn encode_long(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_long(bytes: &[u8]) -> Result<i64> {
    let raw = fixed8(bytes)?;
    Ok((u64::from_be_bytes(raw) ^ SIGN_BIT) as i64)
}

/// `_ts` terms; timestamps are unsigned so plain big-endian already sorts
pub fn encode_ts(ts: u64) -> [u8; 8] {
    ts.to_be_bytes()
}

// Positive values get the sign bit set, negative values are inverted entirely
pub fn encode_double(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let sortable = if bits & SIGN_BIT != 0 { !bits } else { bits ^ SIGN_BIT };
    sortable.to_be_bytes()
}

pub fn decode_double(bytes: &[u8]) -> Result<f64> {
    let sortable = u64::from_be_bytes(fixed8(bytes)?);
    let bits = if sortable & SIGN_BIT != 0 { sortable ^ SIGN_BIT } else { !sortable };
    Ok(f64::from_bits(bits))
}

pub fn encode_bool(value: bool) -> &'static [u8] {
    if value { b"true" } else { b"false" }
}

pub fn encode_uuid(value: &Uuid) -> Vec<u8> {
    value.hyphenated().to_string().into_bytes()
}

pub fn encode_inet(value: &IpAddr) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Term bytes of a single-term value; strings must already be normalized
pub fn term_of(value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::Str(s) | FieldValue::Text(s) => s.as_bytes().to_vec(),
        FieldValue::Long(v) => encode_long(*v).to_vec(),
        FieldValue::Double(v) => encode_double(*v).to_vec(),
        FieldValue::Boolean(v) => encode_bool(*v).to_vec(),
        FieldValue::Uuid(u) | FieldValue::TimeUuid(u) => encode_uuid(u),
        FieldValue::Inet(ip) => encode_inet(ip),
        FieldValue::Date(d) => encode_long(d.timestamp_millis()).to_vec(),
    }
}

fn fixed8(bytes: &[u8]) -> Result<[u8; 8]> {
    bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Parse, format!("Expected an 8 byte numeric term, got {} bytes", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_order_is_byte_order() {
        let values = [i64::MIN, -1_000, -1, 0, 1, 42, i64::MAX];
        for pair in values.windows(2) {
            assert!(encode_long(pair[0]) < encode_long(pair[1]), "{:?}", pair);
        }
        for v in values {
            assert_eq!(decode_long(&encode_long(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_double_order_is_byte_order() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-9, 3.25, f64::INFINITY];
        for pair in values.windows(2) {
            assert!(encode_double(pair[0]) < encode_double(pair[1]), "{:?}", pair);
        }
        for v in values {
            assert_eq!(decode_double(&encode_double(v)).unwrap().to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_short_numeric_term_is_rejected() {
        assert!(decode_long(b"abc").is_err());
    }
}
