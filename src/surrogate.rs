//! Surrogates: schema-described stand-ins for host objects.
//!
//! A [`Surrogate`] is a map of values tagged with the identity of its
//! surrogate type.  On the wire it is a map with the identity under `_`,
//! plus either the full description of a dynamic schema under
//! `__schema__` or, for registered types with versioned schemas, the
//! schema version under `__version__`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use log::debug;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::field::{DescribeContext, Description, ExtractOptions, Field, FieldType, Phase};
use crate::registry::reconstruct;
use crate::util::{Error, ProcessResult, SchemeError};
use crate::value::{sorted_entries, Value, ValueMap};

/// The identity given to surrogates whose wire form carries none.
pub const UNTYPED_IDENTITY: &str = "scheme.surrogate";

const IDENTITY_KEY: &str = "_";
const SCHEMA_KEY: &str = "__schema__";
const VERSION_KEY: &str = "__version__";

/// Failures specific to surrogates.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurrogateError {
    /// A dynamic schema was given for a type that has versioned schemas.
    #[error("cannot specify a dynamic schema for surrogate '{0}', which has inherent schemas")]
    DynamicSchemaConflict(String),
    /// The requested schema version does not exist.
    #[error("invalid version {version} for surrogate '{identity}'")]
    InvalidVersion { identity: String, version: i128 },
    /// The value can't be made into a surrogate.
    #[error("invalid surrogate value: {0}")]
    InvalidValue(String),
}

type Contributor = Arc<dyn Fn(&mut ValueMap, Option<u32>) + Send + Sync>;

/// A registered surrogate type.
#[derive(Clone)]
pub struct SurrogateType {
    identity: String,
    schemas: Vec<Field>,
    contribute: Option<Contributor>,
}

impl SurrogateType {
    /// Declare a surrogate type without schemas.
    pub fn new<I: Into<String>>(identity: I) -> SurrogateType {
        SurrogateType {
            identity: identity.into(),
            schemas: Vec::new(),
            contribute: None,
        }
    }

    /// Add the next schema version; the first call declares version 1.
    pub fn schema(mut self, schema: Field) -> SurrogateType {
        self.schemas.push(schema);
        self
    }

    /// Run `contribute` on every newly constructed value of this type.
    pub fn contribute<F>(mut self, contribute: F) -> SurrogateType
    where
        F: Fn(&mut ValueMap, Option<u32>) + Send + Sync + 'static,
    {
        self.contribute = Some(Arc::new(contribute));
        self
    }

    /// The identity surrogates of this type carry.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The latest schema version, or `None` without schemas.
    pub fn latest_version(&self) -> Option<u32> {
        if self.schemas.is_empty() {
            None
        } else {
            Some(self.schemas.len() as u32)
        }
    }

    fn versioned(&self, version: i128) -> Result<&Field, SurrogateError> {
        let invalid = || SurrogateError::InvalidVersion {
            identity: self.identity.clone(),
            version,
        };
        let index = usize::try_from(version)
            .ok()
            .and_then(|version| version.checked_sub(1))
            .ok_or_else(invalid)?;
        self.schemas.get(index).ok_or_else(invalid)
    }
}

impl fmt::Debug for SurrogateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrogateType")
            .field("identity", &self.identity)
            .field("versions", &self.schemas.len())
            .finish()
    }
}

static SURROGATE_TYPES: Lazy<RwLock<HashMap<String, Arc<SurrogateType>>>> = Lazy::new(Default::default);

/// Register a surrogate type, replacing any type with the same identity.
pub fn register_surrogate_type(surrogate_type: SurrogateType) {
    debug!("registering surrogate type {}", surrogate_type.identity);
    let mut types = match SURROGATE_TYPES.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    types.insert(surrogate_type.identity.clone(), Arc::new(surrogate_type));
}

/// Find a registered surrogate type.
pub fn lookup_surrogate_type(identity: &str) -> Option<Arc<SurrogateType>> {
    let types = match SURROGATE_TYPES.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    types.get(identity).cloned()
}

/// A schema-described value standing in for a host object.
#[derive(Clone)]
pub struct Surrogate {
    identity: String,
    value: ValueMap,
    schema: Option<Box<Field>>,
    version: Option<u32>,
}

impl Surrogate {
    /// Wrap `value` as an untyped container with the given identity.
    pub fn new<I: Into<String>>(identity: I, value: ValueMap) -> Surrogate {
        Surrogate {
            identity: identity.into(),
            value,
            schema: None,
            version: None,
        }
    }

    /// Build a surrogate of the type `identity` from `value`.
    ///
    /// The value is extracted through the effective schema: `schema` when
    /// given (a dynamic schema), otherwise the registered schema for
    /// `version`, defaulting to the latest.  Types without any schema keep
    /// map values as they are.  The type's `contribute` hook runs last.
    pub fn construct(
        identity: &str,
        value: &Value,
        schema: Option<Field>,
        version: Option<u32>,
    ) -> Result<Surrogate, Error> {
        let surrogate_type = lookup_surrogate_type(identity);
        let inherent = surrogate_type.as_deref().filter(|t| !t.schemas.is_empty());

        let (effective, version) = match (&schema, inherent) {
            (Some(_), Some(_)) => {
                return Err(SurrogateError::DynamicSchemaConflict(identity.to_string()).into())
            }
            (Some(schema), None) => (Some(schema), None),
            (None, Some(t)) => {
                let version = version.or_else(|| t.latest_version()).unwrap_or(1);
                (Some(t.versioned(version as i128)?), Some(version))
            }
            (None, None) => (None, version),
        };

        let value = match (value, effective) {
            (Value::Map(_), Some(schema)) => schema.extract(value, &ExtractOptions::default())?,
            (Value::Map(_), None) => value.clone(),
            (Value::Null, _) => return Err(SurrogateError::InvalidValue("null".into()).into()),
            (_, Some(schema)) => schema.extract(
                value,
                &ExtractOptions {
                    strict: false,
                    ..ExtractOptions::default()
                },
            )?,
            (other, None) => return Err(SurrogateError::InvalidValue(format!("{:?}", other)).into()),
        };
        let mut value = into_map(value)?;

        if let Some(contribute) = surrogate_type.as_ref().and_then(|t| t.contribute.as_ref()) {
            contribute(&mut value, version);
        }
        Ok(Surrogate {
            identity: identity.to_string(),
            value,
            schema: schema.map(Box::new),
            version,
        })
    }

    /// The identity of this surrogate's type.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The surrogate's values.
    pub fn value(&self) -> &ValueMap {
        &self.value
    }

    /// Look up one value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(&Value::from(key))
    }

    /// The dynamic schema, if there is one.
    pub fn schema(&self) -> Option<&Field> {
        self.schema.as_deref()
    }

    /// The schema version, for registered types with versioned schemas.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// A copy of the surrogate's values.
    pub fn to_map(&self) -> ValueMap {
        self.value.clone()
    }

    /// Produce the wire form of this surrogate.
    pub fn serialize(&self) -> Result<Value, Error> {
        let value = Value::Map(self.value.clone());
        let mut serialized = if let Some(schema) = &self.schema {
            let mut serialized = into_map(schema.serialize(&value)?)?;
            serialized.insert(Value::from(SCHEMA_KEY), schema.describe()?);
            serialized
        } else {
            let versioned = match (lookup_surrogate_type(&self.identity), self.version) {
                (Some(t), Some(version)) if !t.schemas.is_empty() => {
                    Some((t.versioned(version as i128)?.serialize(&value)?, version))
                }
                _ => None,
            };
            match versioned {
                Some((serialized, version)) => {
                    let mut serialized = into_map(serialized)?;
                    if version > 1 {
                        serialized.insert(Value::from(VERSION_KEY), Value::from(version));
                    }
                    serialized
                }
                None => self.value.clone(),
            }
        };
        serialized.insert(Value::from(IDENTITY_KEY), Value::from(self.identity.as_str()));
        Ok(Value::Map(serialized))
    }

    /// Rebuild a surrogate from its wire form.
    pub fn unserialize(value: &Value) -> Result<Surrogate, Error> {
        Surrogate::unserialize_at(value, &[])
    }

    pub(crate) fn unserialize_at(value: &Value, ancestry: &[String]) -> Result<Surrogate, Error> {
        let mut value = match value {
            Value::Map(m) => m.clone(),
            other => return Err(SurrogateError::InvalidValue(format!("{:?}", other)).into()),
        };
        let identity = match value.shift_remove(&Value::from(IDENTITY_KEY)) {
            Some(Value::Text(identity)) => identity,
            _ => UNTYPED_IDENTITY.to_string(),
        };

        if let Some(description) = value.shift_remove(&Value::from(SCHEMA_KEY)) {
            if description.is_null() {
                return Err(SurrogateError::InvalidValue("empty schema".into()).into());
            }
            let schema = reconstruct(&description)?;
            let value = schema.process_at(&Value::Map(value), Phase::Incoming, true, ancestry)?;
            return Ok(Surrogate {
                identity,
                value: into_map(value)?,
                schema: Some(Box::new(schema)),
                version: None,
            });
        }

        match lookup_surrogate_type(&identity).filter(|t| !t.schemas.is_empty()) {
            Some(t) => {
                let version = match value.shift_remove(&Value::from(VERSION_KEY)) {
                    None => 1,
                    Some(Value::Integer(version)) => version,
                    Some(other) => {
                        return Err(SurrogateError::InvalidValue(format!("version {:?}", other)).into())
                    }
                };
                let schema = t.versioned(version)?;
                let number = u32::try_from(version).map_err(|_| SurrogateError::InvalidVersion {
                    identity: identity.clone(),
                    version,
                })?;
                let value = schema.process_at(&Value::Map(value), Phase::Incoming, true, ancestry)?;
                Ok(Surrogate {
                    identity,
                    value: into_map(value)?,
                    schema: None,
                    version: Some(number),
                })
            }
            None => Ok(Surrogate::new(identity, value)),
        }
    }
}

fn into_map(value: Value) -> Result<ValueMap, SurrogateError> {
    match value {
        Value::Map(m) => Ok(m),
        other => Err(SurrogateError::InvalidValue(format!("{:?}", other))),
    }
}

// Schemas take no part in equality.
impl PartialEq for Surrogate {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.version == other.version && self.value == other.value
    }
}

impl Eq for Surrogate {}

impl Hash for Surrogate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
        self.version.hash(state);
        sorted_entries(&self.value).hash(state);
    }
}

impl Ord for Surrogate {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.identity, self.version, sorted_entries(&self.value)).cmp(&(
            &other.identity,
            other.version,
            sorted_entries(&other.value),
        ))
    }
}

impl PartialOrd for Surrogate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.identity)?;
        f.debug_map().entries(self.value.iter()).finish()?;
        write!(f, ")")
    }
}

/// A field accepting surrogates, optionally restricted to some identities.
#[derive(Clone, Debug, Default)]
pub struct SurrogateField {
    surrogates: Option<Vec<String>>,
}

impl SurrogateField {
    /// Accept any surrogate.
    pub fn new() -> SurrogateField {
        SurrogateField::default()
    }

    /// Accept only surrogates with one of these identities.
    pub fn surrogates<I, S>(mut self, identities: I) -> SurrogateField
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identities: Vec<String> = identities.into_iter().map(Into::into).collect();
        self.surrogates = if identities.is_empty() { None } else { Some(identities) };
        self
    }

    fn sorted(&self) -> Option<Vec<&str>> {
        self.surrogates.as_ref().map(|s| {
            let mut sorted: Vec<&str> = s.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            sorted
        })
    }
}

impl FieldType for SurrogateField {
    fn tag(&self) -> &'static str {
        "surrogate"
    }

    fn type_name(&self) -> &'static str {
        "Surrogate"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match &value {
            Value::Surrogate(_) => Ok(value),
            Value::Map(_) => match Surrogate::unserialize_at(&value, ancestry) {
                Ok(surrogate) => Ok(Value::from(surrogate)),
                Err(Error::Structural(e)) => Err(e),
                Err(_) => Err(field.invalid(ancestry, &value)),
            },
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let identity = match &value {
            Value::Surrogate(s) => s.identity(),
            _ => return Err(field.invalid(ancestry, &value)),
        };
        if let Some(surrogates) = &self.surrogates {
            if !surrogates.iter().any(|s| s == identity) {
                let accepted = self.sorted().unwrap_or_default().join(", ");
                return Err(field.violation(
                    "invalid-surrogate",
                    ancestry,
                    Some(&value),
                    &[("surrogates", accepted)],
                ));
            }
        }
        Ok(value)
    }

    fn serialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match &value {
            Value::Surrogate(s) => match s.serialize() {
                Ok(serialized) => Ok(serialized),
                Err(Error::Structural(e)) => Err(e),
                Err(_) => Err(field.invalid(ancestry, &value)),
            },
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("surrogates", self.surrogates.as_ref().map(|s| Value::array(s.iter().map(String::as_str))));
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "surrogates" => Some(Value::from(
                self.surrogates.as_ref().map(|s| Value::array(s.iter().map(String::as_str))),
            )),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        match self.sorted() {
            Some(sorted) => vec![format!("surrogates={:?}", sorted)],
            None => Vec::new(),
        }
    }
}
