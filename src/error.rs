//! The structural error tree.
//!
//! A [`StructuralError`] is both an error and a piece of data.  Composite
//! fields report a failure by returning an aggregate whose `structure`
//! mirrors the shape of the input: valid children keep their processed
//! values, failed children hold their own `StructuralError`.

use std::error;
use std::fmt;

use indexmap::IndexMap;
use strum_macros::{Display, IntoStaticStr};

use crate::util::{escape_html, indent, looks_like_html};
use crate::value::{Value, ValueMap};

/// What kind of failure a [`StructuralError`] represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A generic structural failure, e.g. one rebuilt from its serialized form.
    Structural,
    /// The value had the right shape but failed a constraint.
    Validation,
    /// The value's type was wrong and could not be coerced.
    InvalidType,
}

/// One `{token, title, message}` record at a node of the error tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    /// Machine-readable identifier, e.g. `"required"`.
    pub token: String,
    /// Short title, e.g. `"required field"`.
    pub title: String,
    /// The formatted message.
    pub message: String,
    /// Include the field in formatted reports.
    pub show_field: bool,
    /// Include the value in formatted reports.
    pub show_value: bool,
}

impl ErrorEntry {
    fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        if !self.token.is_empty() {
            map.insert("token".into(), self.token.clone().into());
        }
        if !self.title.is_empty() {
            map.insert("title".into(), self.title.clone().into());
        }
        map.insert("message".into(), self.message.clone().into());
        Value::Map(map)
    }

    fn from_value(value: &Value) -> ErrorEntry {
        let text = |key| value.get(key).and_then(Value::as_text).unwrap_or("").to_string();
        let message = match value {
            Value::Map(_) => text("message"),
            Value::Text(t) => t.clone(),
            other => format!("{:?}", other),
        };
        ErrorEntry {
            token: text("token"),
            title: text("title"),
            message,
            show_field: false,
            show_value: false,
        }
    }
}

/// A slot in an aggregate error's structure.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSlot {
    /// A child that processed successfully.
    Value(Value),
    /// A child that failed.
    Error(StructuralError),
}

impl ErrorSlot {
    /// The processed value, if this child succeeded.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ErrorSlot::Value(v) => Some(v),
            ErrorSlot::Error(_) => None,
        }
    }

    /// The child's error, if it failed.
    pub fn as_error(&self) -> Option<&StructuralError> {
        match self {
            ErrorSlot::Value(_) => None,
            ErrorSlot::Error(e) => Some(e),
        }
    }
}

impl From<Result<Value, StructuralError>> for ErrorSlot {
    fn from(result: Result<Value, StructuralError>) -> ErrorSlot {
        match result {
            Ok(v) => ErrorSlot::Value(v),
            Err(e) => ErrorSlot::Error(e),
        }
    }
}

/// The shape of an aggregate error: a list or a mapping of slots.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorStructure {
    /// Positional children (sequences and tuples).
    Sequence(Vec<ErrorSlot>),
    /// Keyed children (maps and structures).
    Mapping(IndexMap<Value, ErrorSlot>),
}

impl ErrorStructure {
    /// Slot `index` of a positional structure.
    pub fn index(&self, index: usize) -> Option<&ErrorSlot> {
        match self {
            ErrorStructure::Sequence(slots) => slots.get(index),
            ErrorStructure::Mapping(_) => None,
        }
    }

    /// The slot for text key `key` of a keyed structure.
    pub fn key(&self, key: &str) -> Option<&ErrorSlot> {
        match self {
            ErrorStructure::Sequence(_) => None,
            ErrorStructure::Mapping(slots) => slots.get(&Value::Text(key.to_string())),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        match self {
            ErrorStructure::Sequence(slots) => slots.len(),
            ErrorStructure::Mapping(slots) => slots.len(),
        }
    }

    /// Returns `true` if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn failures(&self) -> Box<dyn Iterator<Item = &StructuralError> + '_> {
        match self {
            ErrorStructure::Sequence(slots) => Box::new(slots.iter().filter_map(ErrorSlot::as_error)),
            ErrorStructure::Mapping(slots) => {
                Box::new(slots.values().filter_map(ErrorSlot::as_error))
            }
        }
    }
}

/// A validation failure, carrying its path, value and nested structure.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralError {
    kind: ErrorKind,
    errors: Vec<ErrorEntry>,
    structure: Option<ErrorStructure>,
    identity: Vec<String>,
    value: Option<Value>,
    field: Option<String>,
}

impl StructuralError {
    /// Create an empty error of the given kind.
    pub fn new(kind: ErrorKind) -> StructuralError {
        StructuralError {
            kind,
            errors: Vec::new(),
            structure: None,
            identity: Vec::new(),
            value: None,
            field: None,
        }
    }

    pub(crate) fn located(
        kind: ErrorKind,
        identity: &[String],
        field: Option<String>,
        value: Option<&Value>,
    ) -> StructuralError {
        StructuralError {
            kind,
            errors: Vec::new(),
            structure: None,
            identity: identity.to_vec(),
            value: value.cloned(),
            field,
        }
    }

    /// Add an entry at this node.
    pub fn append(mut self, entry: ErrorEntry) -> StructuralError {
        self.errors.push(entry);
        self
    }

    /// Attach a child structure.
    pub fn attach(mut self, structure: ErrorStructure) -> StructuralError {
        self.structure = Some(structure);
        self
    }

    /// Absorb the entries of another error.
    pub fn merge(mut self, other: StructuralError) -> StructuralError {
        self.errors.extend(other.errors);
        self
    }

    /// The kind of failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The entries at this node.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// The tokens of the entries at this node.
    pub fn tokens(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.token.as_str()).collect()
    }

    /// The child structure, for aggregate failures.
    pub fn structure(&self) -> Option<&ErrorStructure> {
        self.structure.as_ref()
    }

    /// The path from the root, e.g. `["root", ".items", "[2]"]`.
    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    /// The offending value, when known.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// True if this node holds entries or a structure.
    pub fn is_substantive(&self) -> bool {
        !self.errors.is_empty() || self.structure.is_some()
    }

    /// Convert this tree into its wire form, a two-element array of
    /// `[errors, structure]`.  Either half is null when absent.
    pub fn serialize(&self) -> Value {
        let errors = if self.errors.is_empty() {
            Value::Null
        } else {
            serialize_entries(&self.errors)
        };
        let structure = match &self.structure {
            Some(structure) => serialize_structure(structure),
            None => Value::Null,
        };
        Value::Array(vec![errors, structure])
    }

    /// Rebuild an error from its wire form.
    ///
    /// Valid children were serialized as null, so they come back as
    /// `ErrorSlot::Value(Value::Null)`.
    pub fn unserialize(value: &Value) -> Option<StructuralError> {
        let pair = value.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        let mut error = StructuralError::new(ErrorKind::Structural);
        if let Value::Array(entries) = &pair[0] {
            error.errors = entries.iter().map(ErrorEntry::from_value).collect();
        }
        if !pair[1].is_null() {
            error.structure = Some(unserialize_structure(&pair[1]));
        }
        Some(error)
    }

    /// Render a numbered, human-readable report, one item per leaf error.
    pub fn format_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.collect_entries(&mut errors);
        if let Some(structure) = &self.structure {
            collect_structure(structure, &mut errors);
        }
        errors
            .iter()
            .enumerate()
            .map(|(i, error)| format!("[{:02}] {}", i + 1, indent(error, 5, false)))
            .collect()
    }

    fn collect_entries(&self, out: &mut Vec<String>) {
        let identity: String = self.identity.concat();
        for entry in &self.errors {
            let title = capitalize(if entry.title.is_empty() {
                "validation"
            } else {
                &entry.title
            });
            let mut lines = vec![format!("{} error at {}: {}", title, identity, entry.message)];
            if entry.show_field {
                if let Some(field) = &self.field {
                    lines.push(format!("Field: {}", field));
                }
            }
            if entry.show_value {
                if let Some(value) = &self.value {
                    if !value.is_null() {
                        lines.push(format!("Value: {:?}", value));
                    }
                }
            }
            out.push(lines.join("\n"));
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn collect_structure(structure: &ErrorStructure, out: &mut Vec<String>) {
    for child in structure.failures() {
        match &child.structure {
            Some(nested) => collect_structure(nested, out),
            None => child.collect_entries(out),
        }
    }
}

fn serialize_entries(entries: &[ErrorEntry]) -> Value {
    Value::Array(entries.iter().map(ErrorEntry::to_value).collect())
}

fn serialize_child(child: &StructuralError) -> Value {
    match &child.structure {
        Some(nested) => serialize_structure(nested),
        None => serialize_entries(&child.errors),
    }
}

fn serialize_structure(structure: &ErrorStructure) -> Value {
    match structure {
        ErrorStructure::Sequence(slots) => Value::Array(
            slots
                .iter()
                .map(|slot| match slot {
                    ErrorSlot::Error(e) => serialize_child(e),
                    ErrorSlot::Value(_) => Value::Null,
                })
                .collect(),
        ),
        ErrorStructure::Mapping(slots) => {
            let mut map = ValueMap::new();
            for (key, slot) in slots {
                if let ErrorSlot::Error(e) = slot {
                    let key = match key {
                        Value::Text(t) if looks_like_html(t) => Value::Text(escape_html(t)),
                        other => other.clone(),
                    };
                    map.insert(key, serialize_child(e));
                }
            }
            Value::Map(map)
        }
    }
}

// A leaf is a list of entry maps; anything else nests further.
fn is_leaf(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            !items.is_empty()
                && items.iter().all(|item| {
                    item.get("message").is_some() || item.get("token").is_some()
                })
        }
        _ => false,
    }
}

fn unserialize_child(value: &Value) -> ErrorSlot {
    if value.is_null() {
        return ErrorSlot::Value(Value::Null);
    }
    let mut child = StructuralError::new(ErrorKind::Structural);
    if is_leaf(value) {
        if let Value::Array(entries) = value {
            child.errors = entries.iter().map(ErrorEntry::from_value).collect();
        }
    } else {
        child.structure = Some(unserialize_structure(value));
    }
    ErrorSlot::Error(child)
}

fn unserialize_structure(value: &Value) -> ErrorStructure {
    match value {
        Value::Map(slots) => ErrorStructure::Mapping(
            slots
                .iter()
                .map(|(k, v)| (k.clone(), unserialize_child(v)))
                .collect(),
        ),
        Value::Array(slots) => ErrorStructure::Sequence(slots.iter().map(unserialize_child).collect()),
        _ => ErrorStructure::Sequence(Vec::new()),
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "validation failed")?;
        for line in self.format_errors() {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

// Standard boilerplate, required so other errors can wrap this one.
impl error::Error for StructuralError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}
