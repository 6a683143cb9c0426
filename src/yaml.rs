//! This module implements the YAML format, converting between
//! [`serde_yaml::Value`] and [`Value`].

#![cfg(feature = "serde_yaml")]

use crate::format::{Format, FormatError};
use crate::value::Value;
use serde_yaml::Value as YAML_Value;
use std::convert::TryFrom;

impl TryFrom<&YAML_Value> for Value {
    type Error = FormatError;

    fn try_from(value: &YAML_Value) -> Result<Self, Self::Error> {
        let result = match value {
            YAML_Value::Null => Value::Null,
            YAML_Value::Bool(b) => Value::Bool(*b),
            // Same order as the JSON decoder, so integers stay integers.
            YAML_Value::Number(num) => {
                if let Some(u) = num.as_u64() {
                    Value::Integer(u as i128)
                } else if let Some(i) = num.as_i64() {
                    Value::Integer(i as i128)
                } else if let Some(f) = num.as_f64() {
                    Value::from_float(f)
                } else {
                    return Err(FormatError::Decode(
                        "YAML Value::Number conversion failure".into(),
                    ));
                }
            }
            YAML_Value::String(t) => Value::Text(t.clone()),
            YAML_Value::Sequence(s) => {
                let array: Result<_, _> = s.iter().map(Value::try_from).collect();
                Value::Array(array?)
            }
            YAML_Value::Mapping(m) => {
                let map: Result<_, FormatError> = m
                    .iter()
                    .map(|(k, v)| Ok((Value::try_from(k)?, Value::try_from(v)?)))
                    .collect();
                Value::Map(map?)
            }
            YAML_Value::Tagged(tagged) => Value::try_from(&tagged.value)?,
        };
        Ok(result)
    }
}

impl TryFrom<&Value> for YAML_Value {
    type Error = FormatError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let result = match value {
            Value::Null => YAML_Value::Null,
            Value::Bool(b) => YAML_Value::Bool(*b),
            Value::Integer(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    YAML_Value::Number(i.into())
                } else if let Ok(u) = u64::try_from(*i) {
                    YAML_Value::Number(u.into())
                } else {
                    return Err(FormatError::Encode(format!("integer {} out of range", i)));
                }
            }
            Value::Float(f) => YAML_Value::Number(f.0.into()),
            Value::Text(t) => YAML_Value::String(t.clone()),
            Value::Array(a) => {
                let sequence: Result<_, _> = a.iter().map(YAML_Value::try_from).collect();
                YAML_Value::Sequence(sequence?)
            }
            Value::Map(m) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in m {
                    match k {
                        Value::Text(k) => {
                            mapping.insert(YAML_Value::String(k.clone()), YAML_Value::try_from(v)?);
                        }
                        other => return Err(FormatError::NotSerializable(other.kind_name())),
                    }
                }
                YAML_Value::Mapping(mapping)
            }
            other => return Err(FormatError::NotSerializable(other.kind_name())),
        };
        Ok(result)
    }
}

/// The YAML format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl Format for Yaml {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn mimetype(&self) -> &'static str {
        "application/x-yaml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".yaml", ".yml"]
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError> {
        let yaml = YAML_Value::try_from(value)?;
        serde_yaml::to_string(&yaml)
            .map(String::into_bytes)
            .map_err(|e| FormatError::Encode(e.to_string()))
    }

    fn unserialize(&self, data: &[u8]) -> Result<Value, FormatError> {
        let yaml: YAML_Value =
            serde_yaml::from_slice(data).map_err(|e| FormatError::Decode(e.to_string()))?;
        Value::try_from(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_preserves_key_order() {
        let value = Value::map(vec![("b", 1), ("a", 2)]);
        let text = String::from_utf8(Yaml.serialize(&value).unwrap()).unwrap();
        assert_eq!(text, "b: 1\na: 2\n");

        let decoded = Yaml.unserialize(text.as_bytes()).unwrap();
        let keys: Vec<&Value> = decoded.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec![&Value::from("b"), &Value::from("a")]);
    }
}
