//! The process-wide table of field types, and reconstruction of fields
//! from their descriptions.
//!
//! Every built-in type is registered under its tag when the table is first
//! used.  [`register_field_type`] adds more tags, or replaces a built-in
//! constructor.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::composite::{Map, Sequence, Tuple, Union};
use crate::field::Field;
use crate::scalar::{
    Any, Binary, Boolean, Date, DateTime, Decimal, Enumeration, Float, Integer, Object, Text, Time,
    Token, Uuid,
};
use crate::structure::{Fields, KeyOrder, Structure, Variants};
use crate::surrogate::SurrogateField;
use crate::util::SchemeError;
use crate::value::{Value, ValueMap};

/// Builds the type-specific part of a field from its description.
///
/// The constructor takes the parameters it understands; `reconstruct`
/// applies the common parameters and keeps whatever is left as aspects.
pub type Constructor = fn(&mut Parameters) -> Result<Field, SchemeError>;

static FIELD_TYPES: Lazy<RwLock<HashMap<String, Constructor>>> =
    Lazy::new(|| RwLock::new(builtin_types()));

fn builtin_types() -> HashMap<String, Constructor> {
    let builtins: [(&str, Constructor); 20] = [
        ("field", |_| Ok(Any::new().into())),
        ("boolean", |_| Ok(Boolean::new().into())),
        ("integer", construct_integer),
        ("float", construct_float),
        ("decimal", construct_decimal),
        ("text", construct_text),
        ("date", construct_date),
        ("datetime", construct_datetime),
        ("time", construct_time),
        ("binary", construct_binary),
        ("enumeration", construct_enumeration),
        ("token", construct_token),
        ("uuid", |_| Ok(Uuid::new().into())),
        ("object", |_| Ok(Object::new().into())),
        ("surrogate", construct_surrogate),
        ("sequence", construct_sequence),
        ("map", construct_map),
        ("tuple", construct_tuple),
        ("union", construct_union),
        ("structure", construct_structure),
    ];
    builtins
        .iter()
        .map(|(tag, constructor)| (tag.to_string(), *constructor))
        .collect()
}

/// Register `constructor` for descriptions of type `tag`.
pub fn register_field_type<T: Into<String>>(tag: T, constructor: Constructor) {
    let tag = tag.into();
    debug!("registering field type {}", tag);
    let mut types = match FIELD_TYPES.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    types.insert(tag, constructor);
}

fn lookup_field_type(tag: &str) -> Option<Constructor> {
    let types = match FIELD_TYPES.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    types.get(tag).copied()
}

/// Build a field from a description produced by
/// [`Field::describe`](crate::Field::describe).
///
/// The type tag is read from `__type__` (or the older `fieldtype` key).
/// Nested descriptions are reconstructed recursively, `default` and
/// `constant` are unserialized through the new field, and unrecognized
/// keys become aspects.
pub fn reconstruct(description: &Value) -> Result<Field, SchemeError> {
    let entries = match description {
        Value::Map(entries) => entries.clone(),
        other => return Err(SchemeError::NotADescription(format!("{:?}", other))),
    };
    let mut params = Parameters::new(entries);
    let tag = match params.take("__type__").or_else(|| params.take("fieldtype")) {
        Some(Value::Text(tag)) => tag,
        _ => return Err(SchemeError::NotADescription(format!("{:?}", description))),
    };
    let constructor = lookup_field_type(&tag).ok_or_else(|| SchemeError::UnknownType(tag.clone()))?;
    params.tag = tag;

    let mut field = constructor(&mut params)?;

    if let Some(name) = params.take_text("name")? {
        field = field.with_name(name);
    }
    if let Some(description) = params.take_text("description")? {
        field = field.with_description(description);
    }
    if let Some(title) = params.take_text("title")? {
        field = field.with_title(title);
    }
    if let Some(notes) = params.take_text("notes")? {
        field = field.with_notes(notes);
    }
    field = field
        .nonnull(params.take_bool("nonnull", false)?)
        .required(params.take_bool("required", false)?)
        .ignore_null(params.take_bool("ignore_null", false)?);

    let default = params.take("default").map(|v| native_form(&field, v));
    let constant = params.take("constant").map(|v| native_form(&field, v));
    if let Some(constant) = constant {
        field = field.with_constant(constant);
    }
    if let Some(default) = default {
        field = field.with_default(default);
    }

    for (name, value) in params.entries {
        if let Value::Text(name) = name {
            field = field.with_aspect(name, value);
        }
    }
    Ok(field)
}

// Parameter values that don't unserialize are kept in wire form.
fn native_form(field: &Field, value: Value) -> Value {
    field.unserialize(&value).unwrap_or(value)
}

/// The parameters of a description being reconstructed.
///
/// Each `take_*` method removes the parameter it reads.  A missing or null
/// parameter reads as `None`; a parameter of the wrong type is an error.
#[derive(Debug)]
pub struct Parameters {
    tag: String,
    entries: ValueMap,
}

impl Parameters {
    fn new(entries: ValueMap) -> Parameters {
        Parameters {
            tag: String::new(),
            entries,
        }
    }

    /// The type tag being reconstructed.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Take a parameter as it is.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        match self.entries.shift_remove(&Value::from(name)) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Take a text parameter.
    pub fn take_text(&mut self, name: &str) -> Result<Option<String>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text)),
            Some(other) => Err(mismatch(name, "text", &other)),
        }
    }

    /// Take a boolean parameter.
    pub fn take_bool(&mut self, name: &str, default: bool) -> Result<bool, SchemeError> {
        match self.take(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(mismatch(name, "a boolean", &other)),
        }
    }

    /// Take an integer parameter.
    pub fn take_integer(&mut self, name: &str) -> Result<Option<i128>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(i)),
            Some(other) => Err(mismatch(name, "an integer", &other)),
        }
    }

    /// Take a non-negative integer parameter, such as a length.
    pub fn take_length(&mut self, name: &str) -> Result<Option<usize>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Integer(i)) if i >= 0 && i <= usize::MAX as i128 => Ok(Some(i as usize)),
            Some(other) => Err(mismatch(name, "a non-negative integer", &other)),
        }
    }

    /// Take a numeric parameter as a float.
    pub fn take_float(&mut self, name: &str) -> Result<Option<f64>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Float(f)) => Ok(Some(f.0)),
            Some(Value::Integer(i)) => Ok(Some(i as f64)),
            Some(other) => Err(mismatch(name, "a number", &other)),
        }
    }

    /// Take an array parameter.
    pub fn take_array(&mut self, name: &str) -> Result<Option<Vec<Value>>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(mismatch(name, "an array", &other)),
        }
    }

    /// Take a map parameter.
    pub fn take_map(&mut self, name: &str) -> Result<Option<ValueMap>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Map(entries)) => Ok(Some(entries)),
            Some(other) => Err(mismatch(name, "a map", &other)),
        }
    }

    /// Take a nested field description and reconstruct it.
    pub fn take_field(&mut self, name: &str) -> Result<Option<Field>, SchemeError> {
        self.take(name).map(|d| reconstruct(&d)).transpose()
    }

    /// Take a list of nested field descriptions.
    pub fn take_fields(&mut self, name: &str) -> Result<Option<Vec<Field>>, SchemeError> {
        match self.take_array(name)? {
            None => Ok(None),
            Some(items) => items.iter().map(reconstruct).collect::<Result<_, _>>().map(Some),
        }
    }

    /// Take a parameter in wire form and unserialize it through `field`.
    pub fn take_native(&mut self, name: &str, field: &Field) -> Result<Option<Value>, SchemeError> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => field
                .unserialize(&value)
                .map(Some)
                .map_err(|e| SchemeError::parameter(name, e.to_string())),
        }
    }

    /// Take a parameter that must be present.
    pub fn require_field(&mut self, name: &str) -> Result<Field, SchemeError> {
        self.take_field(name)?
            .ok_or_else(|| SchemeError::parameter(name, format!("is required by '{}'", self.tag)))
    }
}

fn mismatch(name: &str, expected: &str, found: &Value) -> SchemeError {
    SchemeError::parameter(name, format!("expected {}, found {}", expected, found.kind_name()))
}

fn construct_integer(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut integer = Integer::new();
    if let Some(minimum) = params.take_integer("minimum")? {
        integer = integer.minimum(minimum);
    }
    if let Some(maximum) = params.take_integer("maximum")? {
        integer = integer.maximum(maximum);
    }
    Ok(integer.into())
}

fn construct_float(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut float = Float::new();
    if let Some(minimum) = params.take_float("minimum")? {
        float = float.minimum(minimum);
    }
    if let Some(maximum) = params.take_float("maximum")? {
        float = float.maximum(maximum);
    }
    Ok(float.into())
}

fn construct_decimal(params: &mut Parameters) -> Result<Field, SchemeError> {
    let parse = |name: &str, text: Option<String>| {
        text.map(|t| rust_decimal::Decimal::from_str(&t).map_err(|e| SchemeError::parameter(name, e.to_string())))
            .transpose()
    };
    let mut decimal = Decimal::new();
    if let Some(minimum) = parse("minimum", params.take_text("minimum")?)? {
        decimal = decimal.minimum(minimum);
    }
    if let Some(maximum) = parse("maximum", params.take_text("maximum")?)? {
        decimal = decimal.maximum(maximum);
    }
    Ok(decimal.into())
}

fn construct_text(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut text = Text::new()
        .strip(params.take_bool("strip", true)?)
        .escape_html_entities(params.take_bool("escape_html_entities", false)?);
    if let Some(pattern) = params.take_text("pattern")? {
        let pattern = Regex::new(&pattern).map_err(|e| SchemeError::parameter("pattern", e.to_string()))?;
        text = text.pattern(pattern);
    }
    if let Some(min_length) = params.take_length("min_length")? {
        text = text.min_length(min_length);
    }
    if let Some(max_length) = params.take_length("max_length")? {
        text = text.max_length(max_length);
    }
    Ok(text.into())
}

fn construct_date(params: &mut Parameters) -> Result<Field, SchemeError> {
    let parser = Field::from(Date::new());
    let mut date = Date::new();
    if let Some(Value::Date(minimum)) = params.take_native("minimum", &parser)? {
        date = date.minimum(minimum);
    }
    if let Some(Value::Date(maximum)) = params.take_native("maximum", &parser)? {
        date = date.maximum(maximum);
    }
    Ok(date.into())
}

fn construct_datetime(params: &mut Parameters) -> Result<Field, SchemeError> {
    let utc = params.take_bool("utc", false)?;
    let parser = Field::from(DateTime::new().utc(utc));
    let mut datetime = DateTime::new().utc(utc);
    if let Some(Value::DateTime(minimum)) = params.take_native("minimum", &parser)? {
        datetime = datetime.minimum(minimum);
    }
    if let Some(Value::DateTime(maximum)) = params.take_native("maximum", &parser)? {
        datetime = datetime.maximum(maximum);
    }
    Ok(datetime.into())
}

fn construct_time(params: &mut Parameters) -> Result<Field, SchemeError> {
    let parser = Field::from(Time::new());
    let mut time = Time::new();
    if let Some(Value::Time(minimum)) = params.take_native("minimum", &parser)? {
        time = time.minimum(minimum);
    }
    if let Some(Value::Time(maximum)) = params.take_native("maximum", &parser)? {
        time = time.maximum(maximum);
    }
    Ok(time.into())
}

fn construct_binary(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut binary = Binary::new();
    if let Some(min_length) = params.take_length("min_length")? {
        binary = binary.min_length(min_length);
    }
    if let Some(max_length) = params.take_length("max_length")? {
        binary = binary.max_length(max_length);
    }
    Ok(binary.into())
}

fn construct_enumeration(params: &mut Parameters) -> Result<Field, SchemeError> {
    let values = params
        .take_array("enumeration")?
        .ok_or_else(|| SchemeError::parameter("enumeration", "is required"))?;
    let mut enumeration = Enumeration::new(values)?;
    if let Some(ignored) = params.take_array("ignored_values")? {
        enumeration = enumeration.ignored_values(ignored)?;
    }
    Ok(enumeration.into())
}

fn construct_token(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut token = Token::new();
    if let Some(segments) = params.take_length("segments")? {
        token = token.segments(segments);
    }
    Ok(token.into())
}

fn construct_surrogate(params: &mut Parameters) -> Result<Field, SchemeError> {
    let surrogates: Vec<String> = match params.take("surrogates") {
        None => Vec::new(),
        Some(Value::Text(list)) => list.split_whitespace().map(String::from).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Text(identity) => Ok(identity.clone()),
                other => Err(mismatch("surrogates", "text", other)),
            })
            .collect::<Result<_, _>>()?,
        Some(other) => return Err(mismatch("surrogates", "an array", &other)),
    };
    Ok(SurrogateField::new().surrogates(surrogates).into())
}

fn construct_sequence(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut sequence = Sequence::new(params.require_field("item")?)
        .unique(params.take_bool("unique", false)?);
    if let Some(min_length) = params.take_length("min_length")? {
        sequence = sequence.min_length(min_length);
    }
    if let Some(max_length) = params.take_length("max_length")? {
        sequence = sequence.max_length(max_length);
    }
    Ok(sequence.into())
}

fn construct_map(params: &mut Parameters) -> Result<Field, SchemeError> {
    let mut map = Map::new(params.require_field("value")?);
    if let Some(key) = params.take_field("key")? {
        map = map.key(key);
    }
    if let Some(keys) = params.take_array("required_keys")? {
        let keys = keys
            .iter()
            .map(|k| match k {
                Value::Text(key) => Ok(key.clone()),
                other => Err(mismatch("required_keys", "text", other)),
            })
            .collect::<Result<Vec<String>, _>>()?;
        map = map.required_keys(keys);
    }
    Ok(map.into())
}

fn construct_tuple(params: &mut Parameters) -> Result<Field, SchemeError> {
    let values = params
        .take_fields("values")?
        .ok_or_else(|| SchemeError::parameter("values", "is required"))?;
    Ok(Tuple::new(values).into())
}

fn construct_union(params: &mut Parameters) -> Result<Field, SchemeError> {
    let fields = params.take_fields("fields")?.unwrap_or_default();
    Ok(Union::new(fields)?.into())
}

fn reconstruct_fields(name: &str, description: ValueMap) -> Result<Fields, SchemeError> {
    let mut fields = Fields::new();
    for (key, child) in description {
        match key {
            Value::Text(key) => fields.insert(key, reconstruct(&child)?),
            other => return Err(mismatch(name, "text keys", &other)),
        }
    }
    Ok(fields)
}

fn construct_structure(params: &mut Parameters) -> Result<Field, SchemeError> {
    let layout = params
        .take_map("structure")?
        .ok_or_else(|| SchemeError::parameter("structure", "is required"))?;

    let mut structure = match params.take_field("polymorphic_on")? {
        Some(on) => {
            let mut variants = Variants::new();
            for (identity, fields) in layout {
                let identity = identity.segment();
                let fields = match fields {
                    Value::Map(fields) => reconstruct_fields("structure", fields)?,
                    other => return Err(mismatch("structure", "a map", &other)),
                };
                variants = variants.variant(identity, fields);
            }
            Structure::polymorphic(on, variants)?
        }
        None => Structure::new(reconstruct_fields("structure", layout)?),
    };

    structure = structure.strict(params.take_bool("strict", true)?);
    match params.take("key_order") {
        None => {}
        Some(Value::Array(names)) => {
            structure = structure.key_order(KeyOrder::Fixed(text_list("key_order", &names)?));
        }
        Some(Value::Map(orders)) => {
            let mut per_variant = indexmap::IndexMap::new();
            for (identity, names) in orders {
                let names = match names {
                    Value::Array(names) => text_list("key_order", &names)?,
                    other => return Err(mismatch("key_order", "an array", &other)),
                };
                per_variant.insert(identity.segment(), names);
            }
            structure = structure.key_order(KeyOrder::PerVariant(per_variant));
        }
        Some(other) => return Err(mismatch("key_order", "an array or a map", &other)),
    }
    Ok(structure.into())
}

fn text_list(name: &str, items: &[Value]) -> Result<Vec<String>, SchemeError> {
    items
        .iter()
        .map(|item| match item {
            Value::Text(text) => Ok(text.clone()),
            other => Err(mismatch(name, "text", other)),
        })
        .collect()
}
