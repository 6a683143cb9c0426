//! Leaf field types.
//!
//! Each type here implements the three pipeline hooks of
//! [`FieldType`](crate::field::FieldType): `unserialize` coerces the wire
//! form, `validate` checks the native value (and may normalize it),
//! `serialize` produces the wire form.

use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::str::FromStr;

use crate::error::ErrorKind;
use crate::field::{DescribeContext, Description, Field, FieldType};
use crate::object::lookup_object;
use crate::util::{escape_html, fixed_regex, pluralize, ProcessResult, SchemeError};
use crate::value::Value;

const DATE_PATTERN: &str = "%Y-%m-%d";
// `%.f` writes fractional seconds only when there are some, and reads them
// when present.
const DATETIME_PATTERN: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const TIME_PATTERN: &str = "%H:%M:%S%.f";

/// A bound that is either fixed or computed at validation time.
#[derive(Clone)]
pub enum Limit<T> {
    /// A fixed value.
    Fixed(T),
    /// A producer, called on every validation.
    Dynamic(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Limit<T> {
    /// Build a dynamic limit.
    pub fn dynamic<F>(producer: F) -> Limit<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Limit::Dynamic(Arc::new(producer))
    }

    /// The current value of the bound.
    pub fn resolve(&self) -> T {
        match self {
            Limit::Fixed(v) => v.clone(),
            Limit::Dynamic(producer) => producer(),
        }
    }

    /// The bound, if it is fixed.
    pub fn fixed(&self) -> Option<&T> {
        match self {
            Limit::Fixed(v) => Some(v),
            Limit::Dynamic(_) => None,
        }
    }
}

impl<T> From<T> for Limit<T> {
    fn from(value: T) -> Limit<T> {
        Limit::Fixed(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Limit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Fixed(v) => v.fmt(f),
            Limit::Dynamic(_) => write!(f, "<dynamic>"),
        }
    }
}

fn repr_limit<T: fmt::Debug>(name: &str, limit: &Option<Limit<T>>) -> Option<String> {
    limit.as_ref().map(|l| format!("{}={:?}", name, l))
}

pub(crate) fn length_check(
    field: &Field,
    value: &Value,
    ancestry: &[String],
    length: usize,
    min_length: Option<usize>,
    max_length: Option<usize>,
    noun: &str,
) -> Result<(), crate::error::StructuralError> {
    if let Some(min_length) = min_length {
        if length < min_length {
            return Err(field.violation(
                "min_length",
                ancestry,
                Some(value),
                &[
                    ("min_length", min_length.to_string()),
                    ("noun", pluralize(noun, min_length)),
                ],
            ));
        }
    }
    if let Some(max_length) = max_length {
        if length > max_length {
            return Err(field.violation(
                "max_length",
                ancestry,
                Some(value),
                &[
                    ("max_length", max_length.to_string()),
                    ("noun", pluralize(noun, max_length)),
                ],
            ));
        }
    }
    Ok(())
}

/// Accepts any value unchanged.
#[derive(Debug, Clone, Default)]
pub struct Any;

impl Any {
    #[allow(missing_docs)]
    pub fn new() -> Any {
        Any
    }
}

impl FieldType for Any {
    fn tag(&self) -> &'static str {
        "field"
    }

    fn type_name(&self) -> &'static str {
        "Field"
    }
}

/// Boolean values.
#[derive(Debug, Clone, Default)]
pub struct Boolean;

impl Boolean {
    #[allow(missing_docs)]
    pub fn new() -> Boolean {
        Boolean
    }
}

impl FieldType for Boolean {
    fn tag(&self) -> &'static str {
        "boolean"
    }

    fn type_name(&self) -> &'static str {
        "Boolean"
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Bool(_) => Ok(value),
            other => Err(field.invalid(ancestry, &other)),
        }
    }
}

/// Integer values, optionally bounded.
///
/// On input, text is parsed and integral floats are accepted.  Booleans are
/// never integers.
#[derive(Debug, Clone, Default)]
pub struct Integer {
    minimum: Option<i128>,
    maximum: Option<i128>,
}

impl Integer {
    #[allow(missing_docs)]
    pub fn new() -> Integer {
        Integer::default()
    }

    /// Reject values below `minimum`.
    pub fn minimum(mut self, minimum: i128) -> Integer {
        self.minimum = Some(minimum);
        self
    }

    /// Reject values above `maximum`.
    pub fn maximum(mut self, maximum: i128) -> Integer {
        self.maximum = Some(maximum);
        self
    }
}

impl FieldType for Integer {
    fn tag(&self) -> &'static str {
        "integer"
    }

    fn type_name(&self) -> &'static str {
        "Integer"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Integer(_)) {
            return Ok(value);
        }
        let converted = match &value {
            Value::Float(f) if f.0.is_finite() && f.0.fract() == 0.0 => f.0.to_i128(),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i128(),
            Value::Text(t) => t.trim().parse::<i128>().ok(),
            _ => None,
        };
        match converted {
            Some(i) => Ok(Value::Integer(i)),
            None => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let i = match &value {
            Value::Integer(i) => *i,
            other => return Err(field.invalid(ancestry, other)),
        };
        if let Some(minimum) = self.minimum {
            if i < minimum {
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", minimum.to_string())]));
            }
        }
        if let Some(maximum) = self.maximum {
            if i > maximum {
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", maximum.to_string())]));
            }
        }
        Ok(value)
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("minimum", self.minimum);
        d.option("maximum", self.maximum);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.into()),
            "maximum" => Some(self.maximum.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(minimum) = self.minimum {
            aspects.push(format!("minimum={}", minimum));
        }
        if let Some(maximum) = self.maximum {
            aspects.push(format!("maximum={}", maximum));
        }
        aspects
    }
}

/// Floating-point values, optionally bounded.
#[derive(Debug, Clone, Default)]
pub struct Float {
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl Float {
    #[allow(missing_docs)]
    pub fn new() -> Float {
        Float::default()
    }

    /// Reject values below `minimum`.
    pub fn minimum(mut self, minimum: f64) -> Float {
        self.minimum = Some(minimum);
        self
    }

    /// Reject values above `maximum`.
    pub fn maximum(mut self, maximum: f64) -> Float {
        self.maximum = Some(maximum);
        self
    }
}

impl FieldType for Float {
    fn tag(&self) -> &'static str {
        "float"
    }

    fn type_name(&self) -> &'static str {
        "Float"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Float(_)) {
            return Ok(value);
        }
        let converted = match &value {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            Value::Text(t) => t.trim().parse::<f64>().ok(),
            _ => None,
        };
        match converted {
            Some(f) => Ok(Value::from_float(f)),
            None => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let f = match value.as_float() {
            Some(f) => f,
            None => return Err(field.invalid(ancestry, &value)),
        };
        if let Some(minimum) = self.minimum {
            if f < minimum {
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", format!("{:.6}", minimum))]));
            }
        }
        if let Some(maximum) = self.maximum {
            if f > maximum {
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", format!("{:.6}", maximum))]));
            }
        }
        Ok(value)
    }

    fn serialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match value.as_float() {
            Some(f) if !f.is_finite() => Err(field.violation("overflow", ancestry, Some(&value), &[])),
            _ => Ok(value),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("minimum", self.minimum);
        d.option("maximum", self.maximum);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.into()),
            "maximum" => Some(self.maximum.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(minimum) = self.minimum {
            aspects.push(format!("minimum={:?}", minimum));
        }
        if let Some(maximum) = self.maximum {
            aspects.push(format!("maximum={:?}", maximum));
        }
        aspects
    }
}

/// Arbitrary-precision decimal values; text on the wire.
#[derive(Debug, Clone, Default)]
pub struct Decimal {
    minimum: Option<rust_decimal::Decimal>,
    maximum: Option<rust_decimal::Decimal>,
}

impl Decimal {
    #[allow(missing_docs)]
    pub fn new() -> Decimal {
        Decimal::default()
    }

    /// Reject values below `minimum`.
    pub fn minimum(mut self, minimum: rust_decimal::Decimal) -> Decimal {
        self.minimum = Some(minimum);
        self
    }

    /// Reject values above `maximum`.
    pub fn maximum(mut self, maximum: rust_decimal::Decimal) -> Decimal {
        self.maximum = Some(maximum);
        self
    }
}

impl FieldType for Decimal {
    fn tag(&self) -> &'static str {
        "decimal"
    }

    fn type_name(&self) -> &'static str {
        "Decimal"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Decimal(_)) {
            return Ok(value);
        }
        let converted = match &value {
            Value::Text(t) => rust_decimal::Decimal::from_str(t.trim()).ok(),
            Value::Integer(i) => rust_decimal::Decimal::from_i128(*i),
            Value::Float(f) => rust_decimal::Decimal::from_f64(f.0),
            _ => None,
        };
        match converted {
            Some(d) => Ok(Value::Decimal(d)),
            None => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let d = match &value {
            Value::Decimal(d) => *d,
            other => return Err(field.invalid(ancestry, other)),
        };
        if let Some(minimum) = self.minimum {
            if d < minimum {
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", minimum.to_string())]));
            }
        }
        if let Some(maximum) = self.maximum {
            if d > maximum {
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", maximum.to_string())]));
            }
        }
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Decimal(d) => Ok(Value::Text(d.to_string())),
            other => Ok(other),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("minimum", self.minimum.map(|m| m.to_string()));
        d.option("maximum", self.maximum.map(|m| m.to_string()));
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.into()),
            "maximum" => Some(self.maximum.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(minimum) = self.minimum {
            aspects.push(format!("minimum={}", minimum));
        }
        if let Some(maximum) = self.maximum {
            aspects.push(format!("maximum={}", maximum));
        }
        aspects
    }
}

/// Text values.
///
/// Lengths count characters, measured after stripping.  A pattern must
/// match at the start of the value.
#[derive(Debug, Clone)]
pub struct Text {
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    strip: bool,
    escape_html_entities: bool,
}

impl Default for Text {
    fn default() -> Self {
        Text {
            pattern: None,
            min_length: None,
            max_length: None,
            strip: true,
            escape_html_entities: false,
        }
    }
}

impl Text {
    #[allow(missing_docs)]
    pub fn new() -> Text {
        Text::default()
    }

    /// Require values to match `pattern` at their start.
    pub fn pattern(mut self, pattern: Regex) -> Text {
        self.pattern = Some(pattern);
        self
    }

    /// Minimum length in characters.
    pub fn min_length(mut self, min_length: usize) -> Text {
        self.min_length = Some(min_length);
        self
    }

    /// Maximum length in characters.
    pub fn max_length(mut self, max_length: usize) -> Text {
        self.max_length = Some(max_length);
        self
    }

    /// Strip surrounding whitespace before validation (default `true`).
    pub fn strip(mut self, strip: bool) -> Text {
        self.strip = strip;
        self
    }

    /// Escape `&`, `<` and `>` in accepted values.
    pub fn escape_html_entities(mut self, escape: bool) -> Text {
        self.escape_html_entities = escape;
        self
    }

    pub(crate) fn require_content(&mut self) {
        if self.min_length.is_none() {
            self.min_length = Some(1);
        }
    }
}

impl FieldType for Text {
    fn tag(&self) -> &'static str {
        "text"
    }

    fn type_name(&self) -> &'static str {
        "Text"
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let mut text = match value {
            Value::Text(t) => t,
            other => return Err(field.invalid(ancestry, &other)),
        };
        if self.strip {
            text = text.trim().to_string();
        }
        let length = text.chars().count();
        let matched = self
            .pattern
            .as_ref()
            .map_or(true, |p| p.find(&text).map_or(false, |m| m.start() == 0));
        let escaped = if self.escape_html_entities {
            Some(escape_html(&text))
        } else {
            None
        };

        let value = Value::Text(text);
        length_check(field, &value, ancestry, length, self.min_length, self.max_length, "character")?;
        if !matched {
            return Err(field.violation("pattern", ancestry, Some(&value), &[]));
        }
        Ok(escaped.map_or(value, Value::Text))
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("pattern", self.pattern.as_ref().map(Regex::as_str));
        d.option("min_length", self.min_length);
        d.option("max_length", self.max_length);
        d.flag("strip", self.strip, true);
        d.flag("escape_html_entities", self.escape_html_entities, false);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "pattern" => Some(self.pattern.as_ref().map(Regex::as_str).into()),
            "min_length" => Some(self.min_length.into()),
            "max_length" => Some(self.max_length.into()),
            "strip" => Some(self.strip.into()),
            "escape_html_entities" => Some(self.escape_html_entities.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(min_length) = self.min_length {
            aspects.push(format!("min_length={}", min_length));
        }
        if let Some(max_length) = self.max_length {
            aspects.push(format!("max_length={}", max_length));
        }
        if let Some(pattern) = &self.pattern {
            aspects.push(format!("pattern={:?}", pattern.as_str()));
        }
        if !self.strip {
            aspects.push("strip=false".into());
        }
        aspects
    }
}

/// Calendar dates; `YYYY-MM-DD` on the wire.
#[derive(Debug, Clone, Default)]
pub struct Date {
    minimum: Option<Limit<NaiveDate>>,
    maximum: Option<Limit<NaiveDate>>,
}

impl Date {
    #[allow(missing_docs)]
    pub fn new() -> Date {
        Date::default()
    }

    /// The earliest valid date.
    pub fn minimum<L: Into<Limit<NaiveDate>>>(mut self, minimum: L) -> Date {
        self.minimum = Some(minimum.into());
        self
    }

    /// The latest valid date.
    pub fn maximum<L: Into<Limit<NaiveDate>>>(mut self, maximum: L) -> Date {
        self.maximum = Some(maximum.into());
        self
    }
}

impl FieldType for Date {
    fn tag(&self) -> &'static str {
        "date"
    }

    fn type_name(&self) -> &'static str {
        "Date"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Date(_)) {
            return Ok(value);
        }
        match &value {
            Value::Text(t) => NaiveDate::parse_from_str(t, DATE_PATTERN)
                .map(Value::Date)
                .map_err(|_| field.invalid(ancestry, &value)),
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let date = match &value {
            Value::Date(d) => *d,
            other => return Err(field.invalid(ancestry, other)),
        };
        if let Some(minimum) = self.minimum.as_ref().map(Limit::resolve) {
            if date < minimum {
                let minimum = minimum.format(DATE_PATTERN).to_string();
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", minimum)]));
            }
        }
        if let Some(maximum) = self.maximum.as_ref().map(Limit::resolve) {
            if date > maximum {
                let maximum = maximum.format(DATE_PATTERN).to_string();
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", maximum)]));
            }
        }
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Date(d) => Ok(Value::Text(d.format(DATE_PATTERN).to_string())),
            other => Ok(other),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        let format = |limit: &Option<Limit<NaiveDate>>| {
            limit
                .as_ref()
                .and_then(Limit::fixed)
                .map(|date| date.format(DATE_PATTERN).to_string())
        };
        d.option("minimum", format(&self.minimum));
        d.option("maximum", format(&self.maximum));
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.as_ref().map(|l| Value::Date(l.resolve())).into()),
            "maximum" => Some(self.maximum.as_ref().map(|l| Value::Date(l.resolve())).into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        repr_limit("minimum", &self.minimum)
            .into_iter()
            .chain(repr_limit("maximum", &self.maximum))
            .collect()
    }
}

/// Timezone-aware timestamps; UTC `YYYY-MM-DDTHH:MM:SS[.fff]Z` on the wire.
///
/// Accepted values are converted to local time, or to UTC when `utc` is
/// set.
#[derive(Debug, Clone, Default)]
pub struct DateTime {
    minimum: Option<Limit<chrono::DateTime<FixedOffset>>>,
    maximum: Option<Limit<chrono::DateTime<FixedOffset>>>,
    utc: bool,
}

impl DateTime {
    #[allow(missing_docs)]
    pub fn new() -> DateTime {
        DateTime::default()
    }

    /// The earliest valid instant.
    pub fn minimum<L: Into<Limit<chrono::DateTime<FixedOffset>>>>(mut self, minimum: L) -> DateTime {
        self.minimum = Some(minimum.into());
        self
    }

    /// The latest valid instant.
    pub fn maximum<L: Into<Limit<chrono::DateTime<FixedOffset>>>>(mut self, maximum: L) -> DateTime {
        self.maximum = Some(maximum.into());
        self
    }

    /// Keep values in UTC instead of local time.
    pub fn utc(mut self, utc: bool) -> DateTime {
        self.utc = utc;
        self
    }

    fn normalize(&self, value: &chrono::DateTime<FixedOffset>) -> chrono::DateTime<FixedOffset> {
        if self.utc {
            value.with_timezone(&Utc).into()
        } else {
            value.with_timezone(&Local).into()
        }
    }
}

fn format_instant(value: &chrono::DateTime<FixedOffset>) -> String {
    value.with_timezone(&Utc).format(DATETIME_PATTERN).to_string()
}

impl FieldType for DateTime {
    fn tag(&self) -> &'static str {
        "datetime"
    }

    fn type_name(&self) -> &'static str {
        "DateTime"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::DateTime(_)) {
            return Ok(value);
        }
        match &value {
            Value::Text(t) => NaiveDateTime::parse_from_str(t, DATETIME_PATTERN)
                .map(|naive| Value::DateTime(Utc.from_utc_datetime(&naive).into()))
                .map_err(|_| field.invalid(ancestry, &value)),
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let instant = match &value {
            Value::DateTime(dt) => self.normalize(dt),
            other => return Err(field.invalid(ancestry, other)),
        };
        let value = Value::DateTime(instant);
        if let Some(minimum) = self.minimum.as_ref().map(Limit::resolve) {
            if instant < minimum {
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", format_instant(&minimum))]));
            }
        }
        if let Some(maximum) = self.maximum.as_ref().map(Limit::resolve) {
            if instant > maximum {
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", format_instant(&maximum))]));
            }
        }
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        match value {
            Value::DateTime(dt) => Ok(Value::Text(format_instant(&dt))),
            other => Ok(other),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        let format = |limit: &Option<Limit<chrono::DateTime<FixedOffset>>>| {
            limit.as_ref().and_then(Limit::fixed).map(format_instant)
        };
        d.option("minimum", format(&self.minimum));
        d.option("maximum", format(&self.maximum));
        d.flag("utc", self.utc, false);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.as_ref().map(|l| Value::DateTime(l.resolve())).into()),
            "maximum" => Some(self.maximum.as_ref().map(|l| Value::DateTime(l.resolve())).into()),
            "utc" => Some(self.utc.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects: Vec<String> = repr_limit("minimum", &self.minimum)
            .into_iter()
            .chain(repr_limit("maximum", &self.maximum))
            .collect();
        if self.utc {
            aspects.push("utc=true".into());
        }
        aspects
    }
}

/// Times of day; `HH:MM:SS` on the wire.
#[derive(Debug, Clone, Default)]
pub struct Time {
    minimum: Option<Limit<NaiveTime>>,
    maximum: Option<Limit<NaiveTime>>,
}

impl Time {
    #[allow(missing_docs)]
    pub fn new() -> Time {
        Time::default()
    }

    /// The earliest valid time.
    pub fn minimum<L: Into<Limit<NaiveTime>>>(mut self, minimum: L) -> Time {
        self.minimum = Some(minimum.into());
        self
    }

    /// The latest valid time.
    pub fn maximum<L: Into<Limit<NaiveTime>>>(mut self, maximum: L) -> Time {
        self.maximum = Some(maximum.into());
        self
    }
}

impl FieldType for Time {
    fn tag(&self) -> &'static str {
        "time"
    }

    fn type_name(&self) -> &'static str {
        "Time"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Time(_)) {
            return Ok(value);
        }
        match &value {
            Value::Text(t) => NaiveTime::parse_from_str(t, TIME_PATTERN)
                .map(Value::Time)
                .map_err(|_| field.invalid(ancestry, &value)),
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let time = match &value {
            Value::Time(t) => *t,
            other => return Err(field.invalid(ancestry, other)),
        };
        if let Some(minimum) = self.minimum.as_ref().map(Limit::resolve) {
            if time < minimum {
                let minimum = minimum.format(TIME_PATTERN).to_string();
                return Err(field.violation("minimum", ancestry, Some(&value), &[("minimum", minimum)]));
            }
        }
        if let Some(maximum) = self.maximum.as_ref().map(Limit::resolve) {
            if time > maximum {
                let maximum = maximum.format(TIME_PATTERN).to_string();
                return Err(field.violation("maximum", ancestry, Some(&value), &[("maximum", maximum)]));
            }
        }
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Time(t) => Ok(Value::Text(t.format(TIME_PATTERN).to_string())),
            other => Ok(other),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        let format = |limit: &Option<Limit<NaiveTime>>| {
            limit
                .as_ref()
                .and_then(Limit::fixed)
                .map(|time| time.format(TIME_PATTERN).to_string())
        };
        d.option("minimum", format(&self.minimum));
        d.option("maximum", format(&self.maximum));
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "minimum" => Some(self.minimum.as_ref().map(|l| Value::Time(l.resolve())).into()),
            "maximum" => Some(self.maximum.as_ref().map(|l| Value::Time(l.resolve())).into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        repr_limit("minimum", &self.minimum)
            .into_iter()
            .chain(repr_limit("maximum", &self.maximum))
            .collect()
    }
}

/// Binary data; URL-safe base64 on the wire.
#[derive(Debug, Clone, Default)]
pub struct Binary {
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl Binary {
    #[allow(missing_docs)]
    pub fn new() -> Binary {
        Binary::default()
    }

    /// Minimum length in bytes.
    pub fn min_length(mut self, min_length: usize) -> Binary {
        self.min_length = Some(min_length);
        self
    }

    /// Maximum length in bytes.
    pub fn max_length(mut self, max_length: usize) -> Binary {
        self.max_length = Some(max_length);
        self
    }

    pub(crate) fn require_content(&mut self) {
        if self.min_length.is_none() {
            self.min_length = Some(1);
        }
    }
}

impl FieldType for Binary {
    fn tag(&self) -> &'static str {
        "binary"
    }

    fn type_name(&self) -> &'static str {
        "Binary"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if matches!(value, Value::Bytes(_)) {
            return Ok(value);
        }
        match &value {
            Value::Text(t) => base64::decode_config(t, base64::URL_SAFE)
                .map(Value::Bytes)
                .map_err(|_| field.invalid(ancestry, &value)),
            _ => Err(field.invalid(ancestry, &value)),
        }
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let length = match &value {
            Value::Bytes(b) => b.len(),
            other => return Err(field.invalid(ancestry, other)),
        };
        length_check(field, &value, ancestry, length, self.min_length, self.max_length, "byte")?;
        Ok(value)
    }

    fn serialize(&self, _field: &Field, value: Value, _ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Bytes(b) => Ok(Value::Text(base64::encode_config(&b, base64::URL_SAFE))),
            other => Ok(other),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("min_length", self.min_length);
        d.option("max_length", self.max_length);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "min_length" => Some(self.min_length.into()),
            "max_length" => Some(self.max_length.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(min_length) = self.min_length {
            aspects.push(format!("min_length={}", min_length));
        }
        if let Some(max_length) = self.max_length {
            aspects.push(format!("max_length={}", max_length));
        }
        aspects
    }
}

/// One of a fixed list of natively serializable values.
#[derive(Debug, Clone)]
pub struct Enumeration {
    values: Vec<Value>,
    ignored: Vec<Value>,
}

fn native_values<I, V>(name: &str, values: I) -> Result<Vec<Value>, SchemeError>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    match values.iter().find(|v| !v.is_natively_serializable()) {
        Some(v) => Err(SchemeError::parameter(
            name,
            format!("{:?} is not natively serializable", v),
        )),
        None => Ok(values),
    }
}

impl Enumeration {
    /// Create an enumeration of `values`, which must all be natively
    /// serializable.
    pub fn new<I, V>(values: I) -> Result<Enumeration, SchemeError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Ok(Enumeration {
            values: native_values("enumeration", values)?,
            ignored: Vec::new(),
        })
    }

    /// Values that are translated to null instead of being rejected.
    pub fn ignored_values<I, V>(mut self, values: I) -> Result<Enumeration, SchemeError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.ignored = native_values("ignored_values", values)?;
        Ok(self)
    }

    /// The accepted values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn ignores(&self, value: &Value) -> bool {
        self.ignored.contains(value)
    }

    pub(crate) fn narrow(&mut self, constant: &Value) {
        if !constant.is_null() {
            self.values = vec![constant.clone()];
        }
    }

    fn representation(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{:?}", v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FieldType for Enumeration {
    fn tag(&self) -> &'static str {
        "enumeration"
    }

    fn type_name(&self) -> &'static str {
        "Enumeration"
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        if self.values.contains(&value) {
            return Ok(value);
        }
        Err(field.error(
            ErrorKind::InvalidType,
            "invalid",
            ancestry,
            Some(&value),
            &[("values", self.representation())],
        ))
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.set("enumeration", self.values.clone());
        if !self.ignored.is_empty() {
            d.set("ignored_values", self.ignored.clone());
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "enumeration" => Some(Value::Array(self.values.clone())),
            "ignored_values" => Some(Value::Array(self.ignored.clone())),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        vec![format!("enumeration=[{}]", self.representation())]
    }
}

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| fixed_regex(r"^\w(?:[-+.\w]*\w)?(?::\w(?:[-+.\w]*\w)?)*$"));

/// Colon-separated identifier tokens such as `app:module.name`.
///
/// Each segment starts and ends with a word character and may contain
/// `-`, `+` and `.` in between.
#[derive(Debug, Clone, Default)]
pub struct Token {
    segments: Option<usize>,
}

impl Token {
    #[allow(missing_docs)]
    pub fn new() -> Token {
        Token::default()
    }

    /// Require exactly this many segments.
    pub fn segments(mut self, segments: usize) -> Token {
        self.segments = Some(segments);
        self
    }
}

impl FieldType for Token {
    fn tag(&self) -> &'static str {
        "token"
    }

    fn type_name(&self) -> &'static str {
        "Token"
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let segments = match value.as_text() {
            Some(t) if TOKEN_PATTERN.is_match(t) => t.matches(':').count() + 1,
            _ => return Err(field.invalid(ancestry, &value)),
        };
        match self.segments {
            Some(expected) if expected != segments => {
                Err(field.violation("invalid", ancestry, Some(&value), &[]))
            }
            _ => Ok(value),
        }
    }

    fn describe(&self, d: &mut Description, _ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.option("segments", self.segments);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "segments" => Some(self.segments.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        self.segments
            .map(|s| format!("segments={}", s))
            .into_iter()
            .collect()
    }
}

/// UUIDs in canonical lowercase hyphenated form.
#[derive(Debug, Clone, Default)]
pub struct Uuid;

impl Uuid {
    #[allow(missing_docs)]
    pub fn new() -> Uuid {
        Uuid
    }
}

fn is_canonical_uuid(text: &str) -> bool {
    uuid::Uuid::parse_str(text).map_or(false, |u| u.hyphenated().to_string() == text)
}

impl FieldType for Uuid {
    fn tag(&self) -> &'static str {
        "uuid"
    }

    fn type_name(&self) -> &'static str {
        "UUID"
    }

    fn validate(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match value.as_text() {
            Some(t) if is_canonical_uuid(t) => Ok(value),
            _ => Err(field.invalid(ancestry, &value)),
        }
    }
}

/// References to registered host objects; the registered name on the wire.
///
/// See [`register_object`](crate::register_object).
#[derive(Debug, Clone, Default)]
pub struct Object;

impl Object {
    #[allow(missing_docs)]
    pub fn new() -> Object {
        Object
    }
}

impl FieldType for Object {
    fn tag(&self) -> &'static str {
        "object"
    }

    fn type_name(&self) -> &'static str {
        "Object"
    }

    fn unserialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        let name = match value.as_text() {
            Some(name) => name,
            None => return Ok(value),
        };
        match lookup_object(name) {
            Some(object) => Ok(Value::Object(object)),
            None => Err(field.violation(
                "import",
                ancestry,
                Some(&value),
                &[("value", format!("{:?}", name))],
            )),
        }
    }

    fn serialize(&self, field: &Field, value: Value, ancestry: &[String]) -> ProcessResult {
        match value {
            Value::Object(object) => Ok(Value::Text(object.name().to_string())),
            Value::Text(_) => Ok(value),
            other => Err(field.invalid(ancestry, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pattern() {
        for good in &["a", "a:b", "app.module:x-y+z", "a_b:c1"] {
            assert!(TOKEN_PATTERN.is_match(good), "{}", good);
        }
        for bad in &["", ":a", "a:", "a.", "-a", "a::b", "a b"] {
            assert!(!TOKEN_PATTERN.is_match(bad), "{}", bad);
        }
    }

    #[test]
    fn canonical_uuid() {
        assert!(is_canonical_uuid("9f8e1d6a-5b3c-4a2f-8e7d-6c5b4a3f2e1d"));
        assert!(!is_canonical_uuid("9F8E1D6A-5B3C-4A2F-8E7D-6C5B4A3F2E1D"));
        assert!(!is_canonical_uuid("9f8e1d6a5b3c4a2f8e7d6c5b4a3f2e1d"));
    }
}
