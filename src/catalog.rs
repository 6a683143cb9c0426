//! Error definitions attached to each field type.
//!
//! Every field type inherits the base catalog and may add tokens or replace
//! the message of an inherited token.  Catalogs are merged once, on first
//! use.

use std::borrow::Cow;
use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::util::{escape_html, looks_like_html};

/// A (token, title, message template) triple.
///
/// Message templates use `{name}` placeholders.  `{field}` always resolves
/// to the field's name, or `unknown-field` when it has none.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// The machine-readable identifier, e.g. `"nonnull"`.
    pub token: Cow<'static, str>,
    /// A short human-readable title.
    pub title: Cow<'static, str>,
    /// The message template.
    pub message: Cow<'static, str>,
    /// Include the field in formatted reports.
    pub show_field: bool,
    /// Include the offending value in formatted reports.
    pub show_value: bool,
}

impl FieldError {
    /// Create an error definition from static strings.
    pub const fn new(token: &'static str, title: &'static str, message: &'static str) -> Self {
        FieldError {
            token: Cow::Borrowed(token),
            title: Cow::Borrowed(title),
            message: Cow::Borrowed(message),
            show_field: true,
            show_value: true,
        }
    }

    /// Create an error definition from owned strings.
    pub fn custom<T, U, V>(token: T, title: U, message: V) -> Self
    where
        T: Into<String>,
        U: Into<String>,
        V: Into<String>,
    {
        FieldError {
            token: Cow::Owned(token.into()),
            title: Cow::Owned(title.into()),
            message: Cow::Owned(message.into()),
            show_field: true,
            show_value: true,
        }
    }

    /// Fill in the message template.
    pub fn format(&self, field_name: Option<&str>, params: &[(&str, String)]) -> String {
        let mut message = self.message.to_string();
        if !params.iter().any(|(k, _)| *k == "field") {
            message = message.replace("{field}", field_name.unwrap_or("unknown-field"));
        }
        for (key, value) in params {
            message = message.replace(&format!("{{{}}}", key), value);
        }
        if looks_like_html(&message) {
            message = escape_html(&message);
        }
        message
    }
}

static BASE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} is an invalid value"),
    FieldError::new("nonnull", "null value", "{field} must be a non-null value"),
    FieldError::new("overflow", "overflow error", "{field} overflowed"),
    FieldError::new(
        "undefined",
        "undefined field",
        "{field} refers to a field that has not been defined",
    ),
];

static BOOLEAN: &[FieldError] = &[FieldError::new(
    "invalid",
    "invalid value",
    "{field} must be a boolean value",
)];

static INTEGER: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be an integer"),
    FieldError::new(
        "minimum",
        "minimum value",
        "{field} must be greater then or equal to {minimum}",
    ),
    FieldError::new(
        "maximum",
        "maximum value",
        "{field} must be less then or equal to {maximum}",
    ),
];

static FLOAT: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a floating-point number"),
    FieldError::new(
        "minimum",
        "minimum value",
        "{field} must be greater then or equal to {minimum}",
    ),
    FieldError::new(
        "maximum",
        "maximum value",
        "{field} must be less then or equal to {maximum}",
    ),
];

static DECIMAL: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a decimal value"),
    FieldError::new(
        "minimum",
        "minimum value",
        "{field} must be greater then or equal to {minimum}",
    ),
    FieldError::new(
        "maximum",
        "maximum value",
        "{field} must be less then or equal to {maximum}",
    ),
];

static TEXT: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a textual value"),
    FieldError::new("pattern", "invalid value", "{field} has an invalid value"),
    FieldError::new(
        "min_length",
        "minimum length",
        "{field} must contain at least {min_length} non-whitespace {noun}",
    ),
    FieldError::new(
        "max_length",
        "maximum length",
        "{field} may contain at most {max_length} {noun}",
    ),
];

static DATE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a date value"),
    FieldError::new("minimum", "minimum value", "{field} must not occur before {minimum}"),
    FieldError::new("maximum", "maximum value", "{field} must not occur after {maximum}"),
];

static DATETIME: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a datetime value"),
    FieldError::new("minimum", "minimum value", "{field} must not occur before {minimum}"),
    FieldError::new("maximum", "maximum value", "{field} must not occur after {maximum}"),
];

static TIME: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a time value"),
    FieldError::new("minimum", "minimum value", "{field} must not occur before {minimum}"),
    FieldError::new("maximum", "maximum value", "{field} must not occur after {maximum}"),
];

static BINARY: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a binary value"),
    FieldError::new(
        "min_length",
        "minimum length",
        "{field} must contain at least {min_length} {noun}",
    ),
    FieldError::new(
        "max_length",
        "maximum length",
        "{field} must contain at most {max_length} {noun}",
    ),
];

static ENUMERATION: &[FieldError] = &[FieldError::new(
    "invalid",
    "invalid value",
    "{field} must be one of {values}",
)];

static TOKEN: &[FieldError] = &[FieldError::new(
    "invalid",
    "invalid value",
    "{field} must be a valid token",
)];

static UUID: &[FieldError] = &[FieldError::new(
    "invalid",
    "invalid value",
    "{field} must be a UUID",
)];

static OBJECT: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a registered object"),
    FieldError::new("import", "object import", "cannot import {value}"),
];

static SURROGATE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a surrogate"),
    FieldError::new(
        "invalid-surrogate",
        "invalid surrogate",
        "{field} must be one of {surrogates}",
    ),
];

static SEQUENCE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a sequence"),
    FieldError::new(
        "min_length",
        "minimum length",
        "{field} must have at least {min_length} {noun}",
    ),
    FieldError::new(
        "max_length",
        "maximum length",
        "{field} must have at most {max_length} {noun}",
    ),
    FieldError::new(
        "duplicate",
        "duplicate value",
        "{field} must not have duplicate values",
    ),
];

static MAP: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a map"),
    FieldError::new("invalidkeys", "invalid keys", "{field} must have valid keys"),
    FieldError::new(
        "required",
        "required key",
        "{field} is missing required key '{name}'",
    ),
];

static TUPLE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a tuple"),
    FieldError::new(
        "length",
        "invalid length",
        "{field} must contain exactly {length} values",
    ),
];

static STRUCTURE: &[FieldError] = &[
    FieldError::new("invalid", "invalid value", "{field} must be a structure"),
    FieldError::new(
        "required",
        "required field",
        "{field} is missing required field '{name}'",
    ),
    FieldError::new(
        "unknown",
        "unknown field",
        "{field} includes an unknown field '{name}'",
    ),
    FieldError::new(
        "unrecognized",
        "unrecognized polymorphic identity",
        "{field} must specify a recognized polymorphic identity",
    ),
];

/// The errors each type declares on top of the base catalog.
fn declared(tag: &str) -> &'static [FieldError] {
    match tag {
        "boolean" => BOOLEAN,
        "integer" => INTEGER,
        "float" => FLOAT,
        "decimal" => DECIMAL,
        "text" => TEXT,
        "date" => DATE,
        "datetime" => DATETIME,
        "time" => TIME,
        "binary" => BINARY,
        "enumeration" => ENUMERATION,
        "token" => TOKEN,
        "uuid" => UUID,
        "object" => OBJECT,
        "surrogate" => SURROGATE,
        "sequence" => SEQUENCE,
        "map" => MAP,
        "tuple" => TUPLE,
        "structure" => STRUCTURE,
        _ => &[],
    }
}

/// A merged catalog, keyed by token.
pub type Catalog = IndexMap<&'static str, &'static FieldError>;

const TAGS: &[&str] = &[
    "field",
    "boolean",
    "integer",
    "float",
    "decimal",
    "text",
    "date",
    "datetime",
    "time",
    "binary",
    "enumeration",
    "token",
    "uuid",
    "object",
    "surrogate",
    "sequence",
    "map",
    "tuple",
    "union",
    "structure",
];

static CATALOGS: Lazy<HashMap<&'static str, Catalog>> = Lazy::new(|| {
    TAGS.iter()
        .map(|&tag| {
            let mut catalog = Catalog::new();
            for error in BASE.iter().chain(declared(tag)) {
                if let Cow::Borrowed(token) = error.token {
                    catalog.insert(token, error);
                }
            }
            (tag, catalog)
        })
        .collect()
});

/// Find the definition of `token` for a field type.
pub fn lookup(tag: &str, token: &str) -> Option<&'static FieldError> {
    CATALOGS
        .get(tag)
        .and_then(|catalog| catalog.get(token).copied())
        .or_else(|| BASE.iter().find(|e| e.token == token))
}

/// The merged catalog for a field type.
pub fn catalog(tag: &str) -> Option<&'static Catalog> {
    CATALOGS.get(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_and_overridden() {
        let invalid = lookup("integer", "invalid").unwrap();
        assert_eq!(invalid.message, "{field} must be an integer");

        let nonnull = lookup("integer", "nonnull").unwrap();
        assert_eq!(nonnull.message, "{field} must be a non-null value");

        let union = catalog("union").unwrap();
        assert_eq!(union.len(), BASE.len());
    }

    #[test]
    fn message_format() {
        let error = lookup("sequence", "min_length").unwrap();
        let message = error.format(
            Some("items"),
            &[("min_length", "2".into()), ("noun", "items".into())],
        );
        assert_eq!(message, "items must have at least 2 items");

        let error = lookup("field", "invalid").unwrap();
        assert_eq!(error.format(None, &[]), "unknown-field is an invalid value");
        assert_eq!(
            error.format(Some("<b>"), &[]),
            "&lt;b&gt; is an invalid value"
        );
    }
}
