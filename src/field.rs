//! The [`Field`] node and its processing pipeline.
//!
//! A `Field` holds the parameters every field type shares (name, default,
//! nullability, constant, hooks, aspects) plus a [`FieldKind`] that carries
//! the type-specific parameters and behavior.  Fields are built once and
//! then treated as immutable; builder methods consume `self`, so
//! `field.clone().required(true)` is the way to derive a variant.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

use crate::catalog::{self, FieldError};
use crate::composite::{Map, Sequence, Tuple, Union};
use crate::error::{ErrorEntry, ErrorKind, ErrorStructure, StructuralError};
use crate::format;
use crate::scalar::{
    Any, Binary, Boolean, Date, DateTime, Decimal, Enumeration, Float, Integer, Object, Text, Time,
    Token, Uuid,
};
use crate::structure::{Fields, Structure};
use crate::surrogate::SurrogateField;
use crate::undefined::FieldRef;
use crate::util::{Error, ProcessResult, SchemeError};
use crate::value::{Value, ValueMap};

/// The direction a value is travelling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// From the outside world into the program.
    Incoming,
    /// From the program out to the world.
    Outgoing,
}

/// Transforms a value after unserialization and before validation.
pub type Preprocessor = Arc<dyn Fn(Value) -> Value + Send + Sync>;
/// Converts a processed value into a host value; receives the parent key, if any.
pub type Instantiator = Arc<dyn Fn(&Field, Value, Option<&Value>) -> Value + Send + Sync>;
/// Converts a host value into a plain value.
pub type Extractor = Arc<dyn Fn(&Field, &Value) -> Value + Send + Sync>;
/// Produces a value on demand.
pub type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// A field's default: a fixed value, or a producer called each time.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Value(Value),
    /// A zero-argument producer.
    Producer(Producer),
}

impl DefaultValue {
    /// Evaluate this default.
    pub fn get(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Producer(p) => p(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => v.fmt(f),
            DefaultValue::Producer(_) => write!(f, "<producer>"),
        }
    }
}

/// Type-specific behavior.
///
/// Scalar types override the three pipeline hooks; composite types process
/// their children directly and only use the description hooks.
pub(crate) trait FieldType {
    /// The type tag used in descriptions, e.g. `"integer"`.
    fn tag(&self) -> &'static str;

    /// The name shown in `Display` output, e.g. `"Integer"`.
    fn type_name(&self) -> &'static str;

    fn unserialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        Ok(value)
    }

    fn validate(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        Ok(value)
    }

    fn describe(
        &self,
        _description: &mut Description,
        _ctx: &mut DescribeContext<'_>,
    ) -> Result<(), SchemeError> {
        Ok(())
    }

    /// Read a declared parameter; `None` if this type doesn't declare `name`.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    fn repr(&self) -> Vec<String> {
        Vec::new()
    }
}

/// The type of a field, with its type-specific parameters.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub enum FieldKind {
    Any(Any),
    Boolean(Boolean),
    Integer(Integer),
    Float(Float),
    Decimal(Decimal),
    Text(Text),
    Date(Date),
    DateTime(DateTime),
    Time(Time),
    Binary(Binary),
    Enumeration(Enumeration),
    Token(Token),
    Uuid(Uuid),
    Object(Object),
    Surrogate(SurrogateField),
    Sequence(Sequence),
    Map(Map),
    Tuple(Tuple),
    Union(Union),
    Structure(Structure),
}

macro_rules! with_kind {
    ($kind:expr, $k:ident => $body:expr) => {
        match $kind {
            FieldKind::Any($k) => $body,
            FieldKind::Boolean($k) => $body,
            FieldKind::Integer($k) => $body,
            FieldKind::Float($k) => $body,
            FieldKind::Decimal($k) => $body,
            FieldKind::Text($k) => $body,
            FieldKind::Date($k) => $body,
            FieldKind::DateTime($k) => $body,
            FieldKind::Time($k) => $body,
            FieldKind::Binary($k) => $body,
            FieldKind::Enumeration($k) => $body,
            FieldKind::Token($k) => $body,
            FieldKind::Uuid($k) => $body,
            FieldKind::Object($k) => $body,
            FieldKind::Surrogate($k) => $body,
            FieldKind::Sequence($k) => $body,
            FieldKind::Map($k) => $body,
            FieldKind::Tuple($k) => $body,
            FieldKind::Union($k) => $body,
            FieldKind::Structure($k) => $body,
        }
    };
}

macro_rules! field_kinds {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(kind: $ty) -> Field {
                    Field::new(FieldKind::$variant(kind))
                }
            }

            impl From<$ty> for FieldRef {
                fn from(kind: $ty) -> FieldRef {
                    FieldRef::from(Field::from(kind))
                }
            }
        )*
    };
}

field_kinds!(
    Any(Any),
    Boolean(Boolean),
    Integer(Integer),
    Float(Float),
    Decimal(Decimal),
    Text(Text),
    Date(Date),
    DateTime(DateTime),
    Time(Time),
    Binary(Binary),
    Enumeration(Enumeration),
    Token(Token),
    Uuid(Uuid),
    Object(Object),
    Surrogate(SurrogateField),
    Sequence(Sequence),
    Map(Map),
    Tuple(Tuple),
    Union(Union),
    Structure(Structure),
);

impl FieldKind {
    /// The type tag, e.g. `"integer"`.
    pub fn tag(&self) -> &'static str {
        with_kind!(self, k => k.tag())
    }

    /// Returns `true` for types that hold sub-fields.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FieldKind::Sequence(_)
                | FieldKind::Map(_)
                | FieldKind::Tuple(_)
                | FieldKind::Union(_)
                | FieldKind::Structure(_)
        )
    }

    fn transform_children(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<FieldKind> {
        match self {
            FieldKind::Sequence(k) => k.transform(transformer).map(FieldKind::Sequence),
            FieldKind::Map(k) => k.transform(transformer).map(FieldKind::Map),
            FieldKind::Tuple(k) => k.transform(transformer).map(FieldKind::Tuple),
            FieldKind::Union(k) => k.transform(transformer).map(FieldKind::Union),
            FieldKind::Structure(k) => k.transform(transformer).map(FieldKind::Structure),
            _ => None,
        }
    }
}

/// A typed validator and converter node in a schema graph.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) nonnull: bool,
    pub(crate) required: bool,
    pub(crate) ignore_null: bool,
    pub(crate) constant: Option<Value>,
    pub(crate) errors: Vec<FieldError>,
    pub(crate) aspects: BTreeMap<String, Value>,
    pub(crate) preprocessor: Option<Preprocessor>,
    pub(crate) instantiator: Option<Instantiator>,
    pub(crate) extractor: Option<Extractor>,
    pub(crate) kind: FieldKind,
}

impl Field {
    /// Create a field of the given kind with every common parameter at its
    /// default.
    pub fn new(kind: FieldKind) -> Field {
        let default = match &kind {
            FieldKind::Structure(s) if s.generates_default() => {
                Some(DefaultValue::Value(s.generate_default(true)))
            }
            _ => None,
        };
        Field {
            name: None,
            description: None,
            title: None,
            notes: None,
            default,
            nonnull: false,
            required: false,
            ignore_null: false,
            constant: None,
            errors: Vec::new(),
            aspects: BTreeMap::new(),
            preprocessor: None,
            instantiator: None,
            extractor: None,
            kind,
        }
    }

    /// Set the field's name, its key within a parent structure.
    pub fn with_name<N: Into<String>>(mut self, name: N) -> Field {
        self.name = Some(name.into());
        self
    }

    /// Set a concise description, used in generated documentation.
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Field {
        self.description = Some(description.into());
        self
    }

    /// Set a public title.
    pub fn with_title<T: Into<String>>(mut self, title: T) -> Field {
        self.title = Some(title.into());
        self
    }

    /// Set free-form notes.
    pub fn with_notes<T: Into<String>>(mut self, notes: T) -> Field {
        self.notes = Some(notes.into());
        self
    }

    /// Set a fixed default, substituted for a missing value inside an
    /// incoming structure.  A null default means "no default".
    pub fn with_default<V: Into<Value>>(mut self, default: V) -> Field {
        let default = default.into();
        self.default = if default.is_null() {
            None
        } else {
            Some(DefaultValue::Value(default))
        };
        self
    }

    /// Set a default that is produced on demand.
    pub fn with_default_fn<F>(mut self, producer: F) -> Field
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    /// Reject null values.
    pub fn nonnull(mut self, nonnull: bool) -> Field {
        self.nonnull = nonnull;
        self
    }

    /// Require the field to be present inside a structure.
    pub fn required(mut self, required: bool) -> Field {
        self.required = required;
        self
    }

    /// Treat an explicit null inside a structure as if the field were absent.
    pub fn ignore_null(mut self, ignore_null: bool) -> Field {
        self.ignore_null = ignore_null;
        self
    }

    /// Shorthand for `nonnull(true).required(true)`; text and binary fields
    /// also get a minimum length of one unless they already have one.
    pub fn nonempty(mut self) -> Field {
        self.nonnull = true;
        self.required = true;
        match &mut self.kind {
            FieldKind::Text(text) => text.require_content(),
            FieldKind::Binary(binary) => binary.require_content(),
            _ => {}
        }
        self
    }

    /// Accept only this exact value.
    pub fn with_constant<V: Into<Value>>(mut self, constant: V) -> Field {
        let constant = constant.into();
        if let FieldKind::Enumeration(e) = &mut self.kind {
            e.narrow(&constant);
        }
        self.constant = if constant.is_null() {
            None
        } else {
            Some(constant)
        };
        self
    }

    /// Override the message of one error token for this field only.
    pub fn with_error(mut self, error: FieldError) -> Field {
        self.errors.retain(|e| e.token != error.token);
        self.errors.push(error);
        self
    }

    /// Attach an extension aspect.  Null values are ignored.
    pub fn with_aspect<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Field {
        let value = value.into();
        if !value.is_null() {
            self.aspects.insert(name.into(), value);
        }
        self
    }

    /// Install a preprocessor.
    pub fn with_preprocessor<F>(mut self, preprocessor: F) -> Field
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.preprocessor = Some(Arc::new(preprocessor));
        self
    }

    /// Install an instantiator.
    pub fn with_instantiator<F>(mut self, instantiator: F) -> Field
    where
        F: Fn(&Field, Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.instantiator = Some(Arc::new(instantiator));
        self
    }

    /// Install an extractor.
    pub fn with_extractor<F>(mut self, extractor: F) -> Field
    where
        F: Fn(&Field, &Value) -> Value + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// The field's name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The field's name, or `(type)` when it has none.
    pub fn guaranteed_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("({})", self.type_tag()),
        }
    }

    /// The field's description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The field's title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The field's notes.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Whether null values are rejected.
    pub fn is_nonnull(&self) -> bool {
        self.nonnull
    }

    /// Whether the field must be present inside a structure.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether an explicit null is treated as absent.
    pub fn ignores_null(&self) -> bool {
        self.ignore_null
    }

    /// The constant, if any.
    pub fn constant(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    /// The default, if any.
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Evaluate the default, calling its producer if it has one.
    pub fn get_default(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::get)
    }

    /// The extension aspects.
    pub fn aspects(&self) -> &BTreeMap<String, Value> {
        &self.aspects
    }

    /// The field's type and type-specific parameters.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The type tag, e.g. `"integer"`.
    pub fn type_tag(&self) -> &'static str {
        self.kind.tag()
    }

    /// Returns `true` for fields that hold sub-fields.
    pub fn is_structural(&self) -> bool {
        self.kind.is_structural()
    }

    /// Borrow the structure behind this field, if it is one.
    pub fn as_structure(&self) -> Option<&Structure> {
        match &self.kind {
            FieldKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    /// Mutably borrow the structure behind this field, for one-time
    /// mutators such as [`Structure::insert`].  Must not be used once the
    /// schema is shared.
    pub fn as_structure_mut(&mut self) -> Option<&mut Structure> {
        match &mut self.kind {
            FieldKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    /// A clone of this structure field with `fields` added or replaced.
    pub fn extend(&self, fields: Fields) -> Result<Field, SchemeError> {
        let mut extension = self.clone();
        match &mut extension.kind {
            FieldKind::Structure(s) => s.extend_with(fields),
            _ => return Err(SchemeError::NotAStructure(self.guaranteed_name())),
        }
        Ok(extension)
    }

    /// A clone of this structure field in which existing fields named in
    /// `fields` are replaced; other names in `fields` are ignored.
    pub fn replace(&self, fields: Fields) -> Result<Field, SchemeError> {
        let structure = self
            .as_structure()
            .ok_or_else(|| SchemeError::NotAStructure(self.guaranteed_name()))?;
        if !fields.names().any(|name| structure.contains(name)) {
            return Ok(self.clone());
        }
        let mut replacement = self.clone();
        if let FieldKind::Structure(s) = &mut replacement.kind {
            s.replace_with(fields);
        }
        Ok(replacement)
    }

    /// Read a declared parameter first, then the aspects.
    ///
    /// Returns `None` when neither knows `name`.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let declared = match name {
            "name" => Some(Value::from(self.name.clone())),
            "type" => Some(Value::from(self.type_tag())),
            "description" => Some(Value::from(self.description.clone())),
            "title" => Some(Value::from(self.title.clone())),
            "notes" => Some(Value::from(self.notes.clone())),
            "nonnull" => Some(Value::Bool(self.nonnull)),
            "required" => Some(Value::Bool(self.required)),
            "ignore_null" => Some(Value::Bool(self.ignore_null)),
            "structural" => Some(Value::Bool(self.is_structural())),
            "constant" => Some(self.constant.clone().unwrap_or(Value::Null)),
            "default" => Some(match &self.default {
                Some(DefaultValue::Value(v)) => v.clone(),
                _ => Value::Null,
            }),
            _ => with_kind!(&self.kind, k => k.attribute(name)),
        };
        declared.or_else(|| self.aspects.get(name).cloned())
    }

    // Error construction.

    pub(crate) fn error(
        &self,
        kind: ErrorKind,
        token: &str,
        ancestry: &[String],
        value: Option<&Value>,
        params: &[(&str, String)],
    ) -> StructuralError {
        let definition = self
            .errors
            .iter()
            .find(|e| e.token == token)
            .or_else(|| catalog::lookup(self.type_tag(), token));
        let entry = match definition {
            Some(definition) => ErrorEntry {
                token: definition.token.to_string(),
                title: definition.title.to_string(),
                message: definition.format(self.name(), params),
                show_field: definition.show_field,
                show_value: definition.show_value,
            },
            None => ErrorEntry {
                token: token.to_string(),
                title: token.replace('_', " "),
                message: format!("{} failed validation", self.name().unwrap_or("unknown-field")),
                show_field: true,
                show_value: true,
            },
        };
        StructuralError::located(kind, ancestry, Some(self.to_string()), value).append(entry)
    }

    /// An `invalid` error that lets a union try its next candidate.
    pub(crate) fn invalid(&self, ancestry: &[String], value: &Value) -> StructuralError {
        self.error(ErrorKind::InvalidType, "invalid", ancestry, Some(value), &[])
    }

    /// A constraint failure.
    pub(crate) fn violation(
        &self,
        token: &str,
        ancestry: &[String],
        value: Option<&Value>,
        params: &[(&str, String)],
    ) -> StructuralError {
        self.error(ErrorKind::Validation, token, ancestry, value, params)
    }

    /// An aggregate failure holding per-child results.
    pub(crate) fn aggregate(
        &self,
        ancestry: &[String],
        value: &Value,
        structure: ErrorStructure,
    ) -> StructuralError {
        StructuralError::located(ErrorKind::Validation, ancestry, Some(self.to_string()), Some(value))
            .attach(structure)
    }

    // Processing.

    /// Process `value` in the given direction, unserializing before
    /// validation (incoming) or serializing after it (outgoing) when
    /// `serialized` is set.
    pub fn process(&self, value: &Value, phase: Phase, serialized: bool) -> ProcessResult {
        self.process_value(value, phase, serialized, &[self.guaranteed_name()], false)
    }

    /// Like [`process`](Field::process), but reporting errors relative to
    /// `ancestry` instead of this field's own name.
    pub fn process_at(
        &self,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
    ) -> ProcessResult {
        if ancestry.is_empty() {
            return self.process(value, phase, serialized);
        }
        self.process_value(value, phase, serialized, ancestry, false)
    }

    /// Process a partial value: a structure at the root skips defaults and
    /// required-field checks.  Nested fields are processed normally.
    pub fn process_partial(&self, value: &Value, phase: Phase, serialized: bool) -> ProcessResult {
        self.process_value(value, phase, serialized, &[self.guaranteed_name()], true)
    }

    pub(crate) fn process_value(
        &self,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        partial: bool,
    ) -> ProcessResult {
        match &self.kind {
            FieldKind::Sequence(k) => k.process(self, value, phase, serialized, ancestry, partial),
            FieldKind::Map(k) => k.process(self, value, phase, serialized, ancestry, partial),
            FieldKind::Tuple(k) => k.process(self, value, phase, serialized, ancestry, partial),
            FieldKind::Union(k) => k.process(self, value, phase, serialized, ancestry, partial),
            FieldKind::Structure(k) => k.process(self, value, phase, serialized, ancestry, partial),
            _ => self.process_scalar(value, phase, serialized, ancestry),
        }
    }

    fn process_scalar(
        &self,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
    ) -> ProcessResult {
        if self.check_null(value, ancestry)? {
            return Ok(Value::Null);
        }

        let mut value = value.clone();
        if serialized && phase == Phase::Incoming {
            value = with_kind!(&self.kind, k => k.unserialize(self, value, ancestry))?;
        }
        if let Some(preprocessor) = &self.preprocessor {
            value = preprocessor(value);
        }
        if let Some(constant) = &self.constant {
            if value != *constant {
                return Err(self.invalid(ancestry, &value));
            }
        }

        value = with_kind!(&self.kind, k => k.validate(self, value, ancestry))?;

        if serialized && phase == Phase::Outgoing {
            value = with_kind!(&self.kind, k => k.serialize(self, value, ancestry))?;
        }
        Ok(value)
    }

    /// Returns `Ok(true)` if `value` counts as null and that's allowed.
    pub(crate) fn check_null(&self, value: &Value, ancestry: &[String]) -> Result<bool, StructuralError> {
        let null = match &self.kind {
            FieldKind::Enumeration(e) => value.is_null() || e.ignores(value),
            _ => value.is_null(),
        };
        if !null {
            return Ok(false);
        }
        if self.nonnull {
            return Err(self.violation("nonnull", ancestry, None, &[]));
        }
        Ok(true)
    }

    pub(crate) fn apply_preprocessor(&self, value: Value) -> Value {
        match &self.preprocessor {
            Some(preprocessor) => preprocessor(value),
            None => value,
        }
    }

    /// Process a child slot, reporting an unresolved forward reference as
    /// this field's `undefined` error.
    pub(crate) fn process_child(
        &self,
        child: &FieldRef,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        partial: bool,
    ) -> ProcessResult {
        match child.resolve() {
            Some(field) => field.process_value(value, phase, serialized, ancestry, partial),
            None => Err(self.violation("undefined", ancestry, Some(value), &[])),
        }
    }

    /// Process `value` as outgoing and serialized.
    pub fn serialize(&self, value: &Value) -> ProcessResult {
        self.process(value, Phase::Outgoing, true)
    }

    /// Process `value` as incoming and serialized.
    pub fn unserialize(&self, value: &Value) -> ProcessResult {
        self.process(value, Phase::Incoming, true)
    }

    /// Serialize `value`, then encode it with the named format.
    pub fn serialize_as(&self, value: &Value, format: &str) -> Result<Vec<u8>, Error> {
        let value = self.serialize(value)?;
        let codec = format::lookup_format(format)?;
        Ok(codec.serialize(&value)?)
    }

    /// Decode `data` with the named format, then unserialize it.
    pub fn unserialize_from(&self, data: &[u8], format: &str) -> Result<Value, Error> {
        let codec = format::lookup_format(format)?;
        let value = codec.unserialize(data)?;
        Ok(self.unserialize(&value)?)
    }

    /// Read and decode the file at `path`, then unserialize its content.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Value, Error> {
        let value = format::read(path)?;
        Ok(self.unserialize(&value)?)
    }

    /// Serialize `value` and write it to `path`, using `format` or the
    /// file's extension to pick the codec.
    pub fn write<P: AsRef<Path>>(&self, path: P, value: &Value, format: Option<&str>) -> Result<(), Error> {
        let value = self.serialize(value)?;
        format::write(path, &value, format)?;
        Ok(())
    }

    // Description.

    /// Describe this field as a plain, natively serializable map from which
    /// [`reconstruct`](crate::reconstruct) builds an equivalent field.
    pub fn describe(&self) -> Result<Value, SchemeError> {
        self.describe_with(&DescribeOptions::default())
    }

    /// Describe this field with explicit options.
    pub fn describe_with(&self, options: &DescribeOptions) -> Result<Value, SchemeError> {
        let mut ctx = DescribeContext {
            options,
            stack: Vec::new(),
        };
        self.describe_in(&mut ctx)
    }

    pub(crate) fn describe_in(&self, ctx: &mut DescribeContext<'_>) -> Result<Value, SchemeError> {
        let mut description = Description::new(ctx.options.verbose);
        description.set("__type__", self.type_tag());
        for (name, value) in &self.aspects {
            if value.is_natively_serializable() {
                description.set(name, value.clone());
            }
        }

        description.option("name", self.name.clone());
        description.option("description", self.description.clone());
        description.option("title", self.title.clone());
        description.option("notes", self.notes.clone());
        description.flag("nonnull", self.nonnull, false);
        description.flag("required", self.required, false);
        description.flag("ignore_null", self.ignore_null, false);

        if let Some(DefaultValue::Value(default)) = &self.default {
            description.option("default", self.wire_form(default));
        }
        if let Some(constant) = &self.constant {
            description.option("constant", self.wire_form(constant));
        }

        with_kind!(&self.kind, k => k.describe(&mut description, ctx))?;

        for name in &ctx.options.parameters {
            if description.contains(name) {
                continue;
            }
            if let Some(value) = self.attribute(name) {
                if !value.is_null() && value.is_natively_serializable() {
                    description.set(name, value);
                }
            }
        }
        Ok(description.into_value())
    }

    /// The serialized form of a parameter value, if it has one.
    pub(crate) fn wire_form(&self, value: &Value) -> Option<Value> {
        let name = self.guaranteed_name();
        self.process_value(value, Phase::Outgoing, true, &[name], true)
            .ok()
            .filter(Value::is_natively_serializable)
    }

    // Screening, filtering, extraction, instantiation.

    /// True if every non-null test value equals this field's attribute of
    /// the same name.
    pub fn screen(&self, tests: &BTreeMap<String, Value>) -> bool {
        tests
            .iter()
            .filter(|(_, expected)| !expected.is_null())
            .all(|(name, expected)| self.attribute(name).as_ref() == Some(expected))
    }

    /// Filter this field by boolean attribute tests.
    ///
    /// A `true` test includes the field when the attribute is truthy.  A
    /// `false` test excludes it when the attribute is truthy, and includes
    /// it otherwise.  With `exclusive`, a field no test includes is
    /// dropped.  Structural fields filter their children the same way.
    pub fn filter(&self, exclusive: bool, tests: &BTreeMap<String, bool>) -> Option<Field> {
        if !self.included(exclusive, tests) {
            return None;
        }
        match &self.kind {
            FieldKind::Sequence(s) => s.filter(self, exclusive, tests),
            FieldKind::Structure(s) => Some(s.filter(self, exclusive, tests)),
            _ => Some(self.clone()),
        }
    }

    fn included(&self, exclusive: bool, tests: &BTreeMap<String, bool>) -> bool {
        let mut included = !exclusive;
        for (name, expected) in tests {
            let truthy = self.attribute(name).map_or(false, |v| v.is_truthy());
            if *expected {
                if truthy {
                    included = true;
                }
            } else if truthy {
                return false;
            } else {
                included = true;
            }
        }
        included
    }

    /// Extract a plain value for this field from `subject`, using the
    /// extractor hooks of this field and its children.
    pub fn extract(&self, subject: &Value, options: &ExtractOptions) -> Result<Value, ExtractError> {
        if !options.screen.is_empty() && !self.screen(&options.screen) {
            return Err(ExtractError::Excluded);
        }
        match &self.kind {
            FieldKind::Sequence(k) => k.extract(self, subject, options),
            FieldKind::Map(k) => k.extract(self, subject, options),
            FieldKind::Tuple(k) => k.extract(self, subject, options),
            FieldKind::Structure(k) => k.extract(self, subject, options),
            _ => Ok(self.apply_extractor(subject)),
        }
    }

    pub(crate) fn apply_extractor(&self, subject: &Value) -> Value {
        match &self.extractor {
            Some(extractor) if !subject.is_null() => extractor(self, subject),
            _ => subject.clone(),
        }
    }

    /// Convert a processed value into a host value, children first, using
    /// the instantiator hooks.  `key` is the value's key in its parent.
    pub fn instantiate(&self, value: &Value, key: Option<&Value>) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        let value = match &self.kind {
            FieldKind::Sequence(k) => k.instantiate(value),
            FieldKind::Map(k) => k.instantiate(value),
            FieldKind::Tuple(k) => k.instantiate(value),
            FieldKind::Structure(k) => k.instantiate(value),
            _ => value.clone(),
        };
        match &self.instantiator {
            Some(instantiator) => instantiator(self, value, key),
            None => value,
        }
    }

    /// Rebuild this field graph bottom-up.
    ///
    /// The transformer sees every node, parents first.  Untouched subtrees
    /// are reused; forward references are not followed.
    pub fn transform<F>(&self, transformer: F) -> Field
    where
        F: Fn(&Field) -> Transform,
    {
        self.transform_with(&transformer)
            .unwrap_or_else(|| self.clone())
    }

    pub(crate) fn transform_with(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Field> {
        match transformer(self) {
            Transform::Replace(field) => Some(field),
            Transform::Keep => None,
            Transform::Descend => self.kind.transform_children(transformer).map(|kind| {
                let mut field = self.clone();
                field.kind = kind;
                field
            }),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aspects = Vec::new();
        if let Some(name) = &self.name {
            aspects.push(format!("name={:?}", name));
        }
        aspects.extend(with_kind!(&self.kind, k => k.repr()));
        if self.constant.is_some() {
            aspects.push("constant=true".into());
        }
        if let Some(DefaultValue::Value(default)) = &self.default {
            aspects.push(format!("default={:?}", default));
        }
        if self.nonnull {
            aspects.push("nonnull=true".into());
        }
        if self.required {
            aspects.push("required=true".into());
        }
        if self.ignore_null {
            aspects.push("ignore_null=true".into());
        }
        if let Some(title) = &self.title {
            aspects.push(format!("title={:?}", title));
        }
        let type_name = with_kind!(&self.kind, k => k.type_name());
        write!(f, "{}({})", type_name, aspects.join(", "))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("nonnull", &self.nonnull)
            .field("required", &self.required)
            .field("ignore_null", &self.ignore_null)
            .field("constant", &self.constant)
            .field("aspects", &self.aspects)
            .finish()
    }
}

/// Render a child slot for `Display` output without following forward
/// references.
pub(crate) fn repr_ref(child: &FieldRef) -> String {
    match child {
        FieldRef::Defined(field) => field.to_string(),
        FieldRef::Deferred { undefined, .. } => format!("{:?}", undefined),
    }
}

/// Options for [`Field::describe_with`].
#[derive(Debug, Clone, Default)]
pub struct DescribeOptions {
    /// Include parameters even when they equal their defaults.
    pub verbose: bool,
    /// Extra attribute names to include, read with [`Field::attribute`].
    pub parameters: Vec<String>,
}

pub(crate) struct DescribeContext<'a> {
    pub(crate) options: &'a DescribeOptions,
    // Forward references currently being described.
    stack: Vec<usize>,
}

impl DescribeContext<'_> {
    /// Describe a child slot.
    pub(crate) fn child(&mut self, child: &FieldRef) -> Result<Value, SchemeError> {
        let field = child
            .resolve()
            .ok_or_else(|| SchemeError::Undescribable("reference to an undefined field".into()))?;
        match child.slot_id() {
            Some(id) => {
                if self.stack.contains(&id) {
                    return Err(SchemeError::Undescribable("recursive field reference".into()));
                }
                self.stack.push(id);
                let description = field.describe_in(self);
                self.stack.pop();
                description
            }
            None => field.describe_in(self),
        }
    }
}

/// A description under construction.
pub(crate) struct Description {
    entries: ValueMap,
    verbose: bool,
}

impl Description {
    fn new(verbose: bool) -> Description {
        Description {
            entries: ValueMap::new(),
            verbose,
        }
    }

    pub(crate) fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.entries.insert(Value::from(key), value.into());
    }

    pub(crate) fn option<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub(crate) fn flag(&mut self, key: &str, value: bool, default: bool) {
        if self.verbose || value != default {
            self.set(key, value);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&Value::from(key))
    }

    fn into_value(self) -> Value {
        Value::Map(self.entries)
    }
}

/// What a transformer wants done with a node.
pub enum Transform {
    /// Use this field in place of the node.
    Replace(Field),
    /// Keep the node and its subtree as they are.
    Keep,
    /// Keep the node, but visit its children.
    Descend,
}

/// Options for [`Field::extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Structures reject subjects that aren't maps.
    pub strict: bool,
    /// Structures drop members whose value is null.
    pub sparse: bool,
    /// Fields that fail [`Field::screen`] with these tests are excluded.
    pub screen: BTreeMap<String, Value>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            strict: true,
            sparse: true,
            screen: BTreeMap::new(),
        }
    }
}

/// A failure while extracting a value.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The field was screened out; its parent drops it silently.
    #[error("field excluded from extraction")]
    Excluded,
    /// The subject had the wrong shape for the field.
    #[error("cannot extract a value from {0:?}")]
    InvalidSubject(Value),
}

/// Extract a child slot, passing the subject through when the slot is an
/// unresolved forward reference.
pub(crate) fn extract_child(
    child: &FieldRef,
    subject: &Value,
    options: &ExtractOptions,
) -> Result<Value, ExtractError> {
    match child.resolve() {
        Some(field) => field.extract(subject, options),
        None => Ok(subject.clone()),
    }
}

/// Instantiate through a child slot.
pub(crate) fn instantiate_child(child: &FieldRef, value: &Value, key: Option<&Value>) -> Value {
    match child.resolve() {
        Some(field) => field.instantiate(value, key),
        None => value.clone(),
    }
}

/// Transform a child slot; `None` means unchanged.
pub(crate) fn transform_child(
    child: &FieldRef,
    transformer: &dyn Fn(&Field) -> Transform,
) -> Option<FieldRef> {
    match child {
        FieldRef::Defined(field) => field.transform_with(transformer).map(FieldRef::from),
        FieldRef::Deferred { .. } => None,
    }
}
