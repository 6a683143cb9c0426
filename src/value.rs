//! This module declares the generic Value enum that every field consumes and
//! produces.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use float_ord::FloatOrd;
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::object::ObjectRef;
use crate::surrogate::Surrogate;

/// The map type used by [`Value::Map`].
///
/// Insertion order is preserved, but two maps compare equal when they hold
/// the same entries in any order.
pub type ValueMap = IndexMap<Value, Value>;

/// `Value` represents all the data a field can process.
///
/// Native values (dates, decimals, binary data, surrogates) live alongside
/// the plain values that the codecs understand.  A value built only from
/// the plain variants is "natively serializable"; see
/// [`is_natively_serializable`](Value::is_natively_serializable).
///
/// To bring a new kind of data into the engine, write implementations of
/// the `From` or `TryFrom` traits for that type.  See the [`json`] module
/// for an example.
///
/// [`json`]: crate::json
#[derive(Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i128),
    Float(FloatOrd<f64>),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(chrono::DateTime<FixedOffset>),
    Time(NaiveTime),
    Array(Vec<Value>),
    Map(ValueMap),
    Surrogate(Box<Surrogate>),
    Object(ObjectRef),
}

// FloatOrd doesn't implement Debug, so we have to do all the work by hand.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(x) => x.fmt(f),
            Value::Integer(x) => x.fmt(f),
            Value::Float(x) => x.0.fmt(f),
            Value::Decimal(x) => write!(f, "Decimal({})", x),
            Value::Text(x) => x.fmt(f),
            Value::Bytes(x) => x.fmt(f),
            Value::Date(x) => write!(f, "Date({})", x),
            Value::DateTime(x) => write!(f, "DateTime({})", x.to_rfc3339()),
            Value::Time(x) => write!(f, "Time({})", x),
            Value::Array(x) => x.fmt(f),
            Value::Map(x) => f.debug_map().entries(x.iter()).finish(),
            Value::Surrogate(x) => x.fmt(f),
            Value::Object(x) => x.fmt(f),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(x) => x.hash(state),
            Value::Integer(x) => x.hash(state),
            Value::Float(x) => x.0.to_bits().hash(state),
            Value::Decimal(x) => x.hash(state),
            Value::Text(x) => x.hash(state),
            Value::Bytes(x) => x.hash(state),
            Value::Date(x) => x.hash(state),
            Value::DateTime(x) => x.hash(state),
            Value::Time(x) => x.hash(state),
            Value::Array(x) => x.hash(state),
            Value::Map(x) => {
                // Entry order doesn't participate in equality, so it can't
                // participate in the hash either.
                let mut combined: u64 = 0;
                for (key, value) in x {
                    let mut hasher = DefaultHasher::new();
                    key.hash(&mut hasher);
                    value.hash(&mut hasher);
                    combined = combined.wrapping_add(hasher.finish());
                }
                x.len().hash(state);
                combined.hash(state);
            }
            Value::Surrogate(x) => x.hash(state),
            Value::Object(x) => x.hash(state),
        }
    }
}

/// The entries of `map` sorted by key, so maps holding the same entries in
/// a different order compare alike.
pub(crate) fn sorted_entries(map: &ValueMap) -> Vec<(&Value, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}

impl Value {
    // Ranks the variants for ordering values of different kinds.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::Decimal(_) => 4,
            Value::Text(_) => 5,
            Value::Bytes(_) => 6,
            Value::Date(_) => 7,
            Value::DateTime(_) => 8,
            Value::Time(_) => 9,
            Value::Array(_) => 10,
            Value::Map(_) => 11,
            Value::Surrogate(_) => 12,
            Value::Object(_) => 13,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => sorted_entries(a).cmp(&sorted_entries(b)),
            (Value::Surrogate(a), Value::Surrogate(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Value {
    // Only exists so implementers don't need to use/see float_ord::FloatOrd
    /// Create a `Value::Float`.
    pub fn from_float<F: Into<f64>>(f: F) -> Value {
        Value::Float(FloatOrd(f.into()))
    }

    /// Build a `Value::Map` from key-value pairs.
    pub fn map<K, V, I>(entries: I) -> Value
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Build a `Value::Array`.
    pub fn array<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Returns `true` for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the contents of a `Value::Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Copy out the contents of a `Value::Integer`.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Copy out the contents of a `Value::Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            _ => None,
        }
    }

    /// Copy out the contents of a `Value::Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the contents of a `Value::Array`.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow the contents of a `Value::Map`.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in a `Value::Map`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()
            .and_then(|m| m.get(&Value::Text(key.to_string())))
    }

    /// Python-style truthiness, used when filtering fields by attribute.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => f.0 != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Text(t) => !t.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
            _ => true,
        }
    }

    /// Returns `true` if every part of this value can be handed to a codec:
    /// null, booleans, numbers, text, arrays, and maps with text keys.
    pub fn is_natively_serializable(&self) -> bool {
        match self {
            Value::Null
            | Value::Bool(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Text(_) => true,
            Value::Array(a) => a.iter().all(Value::is_natively_serializable),
            Value::Map(m) => m
                .iter()
                .all(|(k, v)| matches!(k, Value::Text(_)) && v.is_natively_serializable()),
            _ => false,
        }
    }

    /// A short name for the kind of value, used in codec errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Surrogate(_) => "surrogate",
            Value::Object(_) => "object",
        }
    }

    /// Render a map key or index as a path segment.
    pub(crate) fn segment(&self) -> String {
        match self {
            Value::Text(t) => t.clone(),
            Value::Integer(i) => i.to_string(),
            other => format!("{:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Value {
                    Value::Integer(i as i128)
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, i128, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::from_float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Value {
        Value::from_float(f)
    }
}

impl From<&str> for Value {
    fn from(t: &str) -> Value {
        Value::Text(t.to_string())
    }
}

impl From<String> for Value {
    fn from(t: String) -> Value {
        Value::Text(t)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Value {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Value {
        Value::Array(a)
    }
}

impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Value {
        Value::Map(m)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Value {
        Value::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Value {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Value {
        Value::Time(t)
    }
}

impl From<chrono::DateTime<FixedOffset>> for Value {
    fn from(dt: chrono::DateTime<FixedOffset>) -> Value {
        Value::DateTime(dt)
    }
}

impl From<Surrogate> for Value {
    fn from(s: Surrogate) -> Value {
        Value::Surrogate(Box::new(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Value {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Value {
        match o {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn map_equality_ignores_order() {
        let a = Value::map(vec![("a", 1), ("b", 2)]);
        let b = Value::map(vec![("b", 2), ("a", 1)]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn total_order() {
        let mut values = vec![
            Value::from("b"),
            Value::from_float(0.5),
            Value::from(2),
            Value::Null,
            Value::from(1),
            Value::from(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::from(true),
                Value::from(1),
                Value::from(2),
                Value::from_float(0.5),
                Value::from("b"),
            ]
        );

        let a = Value::map(vec![("a", 1), ("b", 2)]);
        let b = Value::map(vec![("b", 2), ("a", 1)]);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(Value::map(vec![("a", 1)]) < Value::map(vec![("a", 2)]));
        assert!(Value::map(vec![(Value::from(1), "x")]) < Value::map(vec![("1", "x")]));
    }

    #[test]
    fn native_serializability() {
        assert!(Value::map(vec![("a", Value::array(vec![1, 2]))]).is_natively_serializable());
        assert!(!Value::Bytes(vec![1]).is_natively_serializable());

        let mut m = ValueMap::new();
        m.insert(Value::Integer(1), Value::Null);
        assert!(!Value::Map(m).is_natively_serializable());
    }
}
