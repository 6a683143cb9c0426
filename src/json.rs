//! This module implements the JSON format, converting between
//! [`serde_json::Value`] and [`Value`].
//!
//! # Examples
//!
//! ```
//! use scheme::{Field, Integer, Structure, Fields};
//!
//! let person = Field::from(Structure::new(
//!     Fields::new().field("name", scheme::Text::new()).field("age", Integer::new()),
//! ));
//! let json = br#"{ "name": "Bob", "age": 43 }"#;
//!
//! let value = person.unserialize_from(json, "json").unwrap();
//! assert_eq!(value.get("age"), Some(&scheme::Value::Integer(43)));
//! ```
//!

#![cfg(feature = "serde_json")]

use crate::format::{Format, FormatError};
use crate::value::Value;
use serde_json::Value as JSON_Value;
use std::convert::TryFrom;

// Convert JSON `Value`s to the local `Value` type that fields process.

impl TryFrom<&JSON_Value> for Value {
    type Error = FormatError;

    fn try_from(value: &JSON_Value) -> Result<Self, Self::Error> {
        let result = match value {
            JSON_Value::Null => Value::Null,
            JSON_Value::Bool(b) => Value::Bool(*b),
            JSON_Value::Number(num) => {
                if let Some(u) = num.as_u64() {
                    Value::Integer(u as i128)
                } else if let Some(i) = num.as_i64() {
                    Value::Integer(i as i128)
                } else if let Some(f) = num.as_f64() {
                    Value::from_float(f)
                } else {
                    return Err(FormatError::Decode(
                        "JSON Value::Number conversion failure".into(),
                    ));
                }
            }
            JSON_Value::String(t) => Value::Text(t.clone()),
            JSON_Value::Array(a) => {
                let array: Result<_, _> = a.iter().map(Value::try_from).collect();
                Value::Array(array?)
            }
            JSON_Value::Object(m) => {
                let map: Result<_, FormatError> = m
                    .iter()
                    .map(|(k, v)| {
                        // An iterator returning a 2-tuple can be used as (key, value)
                        // when building a new map.
                        Ok((Value::Text(k.clone()), Value::try_from(v)?))
                    })
                    .collect();
                Value::Map(map?)
            }
        };
        Ok(result)
    }
}

#[test]
fn test_json_number_behavior() {
    // Ensures that our JSON decoder tracks number types precisely, and
    // doesn't, say, allow floating-point values to become integers.
    // serde_json does sometimes permit as_f64 to work on integers, which is
    // why try_from has to test u64, then i64, then f64.

    let json_value: JSON_Value = serde_json::from_str("1").unwrap();
    assert!(json_value.as_u64().is_some());

    let json_value: JSON_Value = serde_json::from_str("-1").unwrap();
    assert!(json_value.as_u64().is_none());
    assert!(json_value.as_i64().is_some());

    let json_value: JSON_Value = serde_json::from_str("1.0").unwrap();
    assert!(json_value.as_u64().is_none());
    assert!(json_value.as_i64().is_none());
    assert!(json_value.as_f64().is_some());

    assert_eq!(Value::try_from(&json_value).unwrap(), Value::from_float(1.0));
}

// A variant that consumes the JSON Value.
impl TryFrom<JSON_Value> for Value {
    type Error = FormatError;

    fn try_from(value: JSON_Value) -> Result<Self, Self::Error> {
        Value::try_from(&value)
    }
}

// And the other direction, for natively serializable values only.
impl TryFrom<&Value> for JSON_Value {
    type Error = FormatError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let result = match value {
            Value::Null => JSON_Value::Null,
            Value::Bool(b) => JSON_Value::Bool(*b),
            Value::Integer(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    JSON_Value::from(i)
                } else if let Ok(u) = u64::try_from(*i) {
                    JSON_Value::from(u)
                } else {
                    return Err(FormatError::Encode(format!("integer {} out of range", i)));
                }
            }
            Value::Float(f) => serde_json::Number::from_f64(f.0)
                .map(JSON_Value::Number)
                .ok_or_else(|| FormatError::Encode(format!("{} has no JSON form", f.0)))?,
            Value::Text(t) => JSON_Value::String(t.clone()),
            Value::Array(a) => {
                let array: Result<_, _> = a.iter().map(JSON_Value::try_from).collect();
                JSON_Value::Array(array?)
            }
            Value::Map(m) => {
                let mut object = serde_json::Map::new();
                for (k, v) in m {
                    match k {
                        Value::Text(k) => {
                            object.insert(k.clone(), JSON_Value::try_from(v)?);
                        }
                        other => return Err(FormatError::NotSerializable(other.kind_name())),
                    }
                }
                JSON_Value::Object(object)
            }
            other => return Err(FormatError::NotSerializable(other.kind_name())),
        };
        Ok(result)
    }
}

/// The JSON format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn mimetype(&self) -> &'static str {
        "application/json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        let json = JSON_Value::try_from(value)?;
        serde_json::to_vec(&json).map_err(|e| FormatError::Encode(e.to_string()))
    }

    fn unserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        let json: JSON_Value =
            serde_json::from_slice(data).map_err(|e| FormatError::Decode(e.to_string()))?;
        Value::try_from(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rejects_native_values() {
        let value = Value::map(vec![("when", Value::Bytes(vec![1, 2]))]);
        let err = Json.serialize(&value).unwrap_err();
        assert!(matches!(err, FormatError::NotSerializable("bytes")));

        let err = Json.serialize(&Value::from_float(f64::NAN)).unwrap_err();
        assert!(matches!(err, FormatError::Encode(_)));
    }
}
