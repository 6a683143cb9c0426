//! This module implements the CBOR format, converting between
//! [`serde_cbor::Value`] and [`Value`].
//!
//! CBOR carries byte strings natively, so `Value::Bytes` survives a round
//! trip here even though the other formats reject it.

#![cfg(feature = "serde_cbor")]

use crate::format::{Format, FormatError};
use crate::value::Value;
use serde_cbor::Value as CBOR_Value;
use std::convert::TryFrom;

// These conversions seem obvious and pointless, but over time they may
// diverge.  Tags are dropped and the tagged value is kept.
impl TryFrom<&CBOR_Value> for Value {
    type Error = FormatError;

    fn try_from(value: &CBOR_Value) -> Result<Self, Self::Error> {
        let result = match value {
            CBOR_Value::Null => Value::Null,
            CBOR_Value::Bool(b) => Value::Bool(*b),
            CBOR_Value::Integer(i) => Value::Integer(*i),
            CBOR_Value::Float(f) => Value::from_float(*f),
            CBOR_Value::Bytes(b) => Value::Bytes(b.clone()),
            CBOR_Value::Text(t) => Value::Text(t.clone()),
            CBOR_Value::Array(a) => {
                let array: Result<_, _> = a.iter().map(Value::try_from).collect();
                Value::Array(array?)
            }
            CBOR_Value::Map(m) => {
                let map: Result<_, FormatError> = m
                    .iter()
                    .map(|(k, v)| Ok((Value::try_from(k)?, Value::try_from(v)?)))
                    .collect();
                Value::Map(map?)
            }
            CBOR_Value::Tag(_, inner) => Value::try_from(inner.as_ref())?,
            _ => return Err(FormatError::Decode("can't handle hidden cbor Value".into())),
        };
        Ok(result)
    }
}

// A variant that consumes the CBOR Value.
impl TryFrom<CBOR_Value> for Value {
    type Error = FormatError;

    fn try_from(value: CBOR_Value) -> Result<Self, Self::Error> {
        Value::try_from(&value)
    }
}

impl TryFrom<&Value> for CBOR_Value {
    type Error = FormatError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let result = match value {
            Value::Null => CBOR_Value::Null,
            Value::Bool(b) => CBOR_Value::Bool(*b),
            Value::Integer(i) => CBOR_Value::Integer(*i),
            Value::Float(f) => CBOR_Value::Float(f.0),
            Value::Text(t) => CBOR_Value::Text(t.clone()),
            Value::Bytes(b) => CBOR_Value::Bytes(b.clone()),
            Value::Array(a) => {
                let array: Result<_, _> = a.iter().map(CBOR_Value::try_from).collect();
                CBOR_Value::Array(array?)
            }
            Value::Map(m) => {
                let map: Result<_, FormatError> = m
                    .iter()
                    .map(|(k, v)| Ok((CBOR_Value::try_from(k)?, CBOR_Value::try_from(v)?)))
                    .collect();
                CBOR_Value::Map(map?)
            }
            other => return Err(FormatError::NotSerializable(other.kind_name())),
        };
        Ok(result)
    }
}

/// The CBOR format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cbor;

impl Format for Cbor {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn mimetype(&self) -> &'static str {
        "application/cbor"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".cbor"]
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        let cbor = CBOR_Value::try_from(value)?;
        serde_cbor::to_vec(&cbor).map_err(|e| FormatError::Encode(e.to_string()))
    }

    fn unserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        let cbor: CBOR_Value =
            serde_cbor::from_slice(data).map_err(|e| FormatError::Decode(format!("cbor parsing failed: {}", e)))?;
        Value::try_from(cbor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbor_keeps_bytes() {
        let value = Value::map(vec![("data", Value::Bytes(vec![0, 1, 255]))]);
        let encoded = Cbor.serialize(&value).unwrap();
        assert_eq!(Cbor.unserialize(&encoded).unwrap(), value);
    }
}
