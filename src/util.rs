//! This module defines error and result types, plus a few text helpers.
//!

use once_cell::sync::Lazy;
use regex::Regex;
use std::result::Result;
use thiserror::Error;

use crate::error::StructuralError;
use crate::field::ExtractError;
use crate::format::FormatError;
use crate::surrogate::SurrogateError;
use crate::value::Value;

/// Misuse of the schema-construction API.
///
/// These are programmer errors, raised while a schema is being built or
/// reconstructed.  They are never raised for bad input data.
#[allow(missing_docs)]
#[rustversion::attr(since(1.40), non_exhaustive)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemeError {
    /// A field parameter had the wrong type or an impossible value.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    /// A description named a field type that was never registered.
    #[error("unknown field type '{0}'")]
    UnknownType(String),
    /// A description was not a map with a `__type__` key.
    #[error("not a field description: {0}")]
    NotADescription(String),
    /// A field could not be described.
    #[error("cannot describe field: {0}")]
    Undescribable(String),
    /// `Undefined::define` was called twice.
    #[error("undefined field is already defined")]
    AlreadyDefined,
    /// A structure operation was attempted on some other kind of field.
    #[error("{0} is not a structure")]
    NotAStructure(String),
    /// A polymorphic structure was declared incorrectly.
    #[error("invalid polymorphic structure: {0}")]
    Polymorphism(String),
}

impl SchemeError {
    pub(crate) fn parameter<N: Into<String>, R: Into<String>>(name: N, reason: R) -> SchemeError {
        SchemeError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The top-level error type, wrapping every failure the crate can report.
#[allow(missing_docs)]
#[rustversion::attr(since(1.40), non_exhaustive)]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Surrogate(#[from] SurrogateError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// The result of processing a value through a field.
pub type ProcessResult = Result<Value, StructuralError>;

/// Indent every line of `text` by `width` spaces, optionally leaving the
/// first line alone.
pub fn indent(text: &str, width: usize, indent_first: bool) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 && !indent_first {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

static PLURALIZATION_RULES: Lazy<Vec<(Regex, Regex, &'static str)>> = Lazy::new(|| {
    let rule = |pattern, target, replacement| (fixed_regex(pattern), fixed_regex(target), replacement);
    vec![
        rule("ife$", "ife$", "ives"),
        rule("eau$", "eau$", "eaux"),
        rule("lf$", "lf$", "lves"),
        rule("[sxz]$", "$", "es"),
        rule("[^aeioudgkprt]h$", "$", "es"),
        rule("(qu|[^aeiou])y$", "y$", "ies"),
    ]
});

/// Pluralize an English noun, unless `quantity` is exactly one.
pub fn pluralize(word: &str, quantity: usize) -> String {
    if quantity == 1 {
        return word.to_string();
    }
    for (pattern, target, replacement) in PLURALIZATION_RULES.iter() {
        if pattern.is_match(word) {
            return target.replace(word, *replacement).into_owned();
        }
    }
    format!("{}s", word)
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| fixed_regex("<[^<]+?>"));

/// Compile one of the crate's built-in patterns.
pub(crate) fn fixed_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

/// Returns true if `text` looks like it contains markup.
pub(crate) fn looks_like_html(text: &str) -> bool {
    HTML_TAG.is_match(text)
}

/// Escape `&`, `<` and `>`.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("item", 1), "item");
        assert_eq!(pluralize("item", 2), "items");
        assert_eq!(pluralize("box", 0), "boxes");
        assert_eq!(pluralize("entry", 3), "entries");
        assert_eq!(pluralize("knife", 2), "knives");
        assert_eq!(pluralize("day", 2), "days");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb\nc", 2, true), "  a\n  b\n  c");
        assert_eq!(indent("a\nb", 5, false), "a\n     b");
    }
}
