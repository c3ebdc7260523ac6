//! Canonical CBOR encoding for hashed and signed inputs.
//!
//! Rules (RFC 8949 deterministic encoding):
//! - Map keys sorted by their encoded bytes
//! - Integers: smallest valid encoding
//! - Lengths: definite only
//! - Only integers, byte strings, text and maps are accepted
//!
//! Identifier derivation and request signing both hash these bytes, so the
//! same logical value always produces the same bytes.

use ciborium::value::{Integer, Value};

use crate::error::{CoreError, Result};

/// Encode `value` canonically.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value)?;
    Ok(buf)
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Map(entries) => encode_map(buf, entries)?,
        other => {
            return Err(CoreError::EncodingError(format!(
                "unsupported CBOR value in canonical input: {:?}",
                other
            )))
        }
    }
    Ok(())
}

fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut sorted = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_bytes = Vec::new();
        encode_value(&mut key_bytes, k)?;
        sorted.push((key_bytes, v));
    }
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, sorted.len() as u64);
    for (key_bytes, v) in sorted {
        buf.extend_from_slice(&key_bytes);
        encode_value(buf, v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths() {
        assert_eq!(to_canonical_bytes(&Value::Integer(23.into())).unwrap(), vec![0x17]);
        assert_eq!(to_canonical_bytes(&Value::Integer(24.into())).unwrap(), vec![0x18, 24]);
        assert_eq!(
            to_canonical_bytes(&Value::Integer(300.into())).unwrap(),
            vec![0x19, 0x01, 0x2c]
        );
        assert_eq!(to_canonical_bytes(&Value::Integer((-1).into())).unwrap(), vec![0x20]);
    }

    #[test]
    fn test_map_order_independent_of_insertion() {
        let a = Value::Map(vec![
            (Value::Text("bb".into()), Value::Integer(1.into())),
            (Value::Text("a".into()), Value::Integer(2.into())),
        ]);
        let b = Value::Map(vec![
            (Value::Text("a".into()), Value::Integer(2.into())),
            (Value::Text("bb".into()), Value::Integer(1.into())),
        ]);
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
    }

    #[test]
    fn test_floats_rejected() {
        assert!(matches!(
            to_canonical_bytes(&Value::Float(1.5)),
            Err(CoreError::EncodingError(_))
        ));
    }
}
