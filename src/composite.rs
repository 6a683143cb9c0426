//! Sequence, Map, Tuple and Union fields.
//!
//! Composite fields process every child, never stopping at the first
//! failure.  If any child fails, the composite returns one aggregate error
//! whose structure holds the processed value of each valid child and the
//! error of each failed one, slot for slot.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use log::trace;

use crate::error::{ErrorKind, ErrorSlot, ErrorStructure};
use crate::field::{
    extract_child, instantiate_child, repr_ref, transform_child, DescribeContext, Description,
    ExtractError, ExtractOptions, Field, FieldKind, FieldType, Phase, Transform,
};
use crate::scalar::length_check;
use crate::undefined::FieldRef;
use crate::util::{ProcessResult, SchemeError};
use crate::value::{Value, ValueMap};

pub(crate) fn child_path(ancestry: &[String], segment: String) -> Vec<String> {
    let mut path = Vec::with_capacity(ancestry.len() + 1);
    path.extend_from_slice(ancestry);
    path.push(segment);
    path
}

/// Keep the values if every child succeeded; otherwise build the
/// positional error structure.
pub(crate) fn settle(results: Vec<ProcessResult>) -> Result<Vec<Value>, ErrorStructure> {
    if results.iter().all(Result::is_ok) {
        Ok(results.into_iter().filter_map(Result::ok).collect())
    } else {
        Err(ErrorStructure::Sequence(
            results.into_iter().map(ErrorSlot::from).collect(),
        ))
    }
}

/// The keyed counterpart of [`settle`].
pub(crate) fn settle_map(results: IndexMap<Value, ProcessResult>) -> Result<ValueMap, ErrorStructure> {
    if results.values().all(Result::is_ok) {
        Ok(results
            .into_iter()
            .filter_map(|(k, v)| v.ok().map(|v| (k, v)))
            .collect())
    } else {
        Err(ErrorStructure::Mapping(
            results
                .into_iter()
                .map(|(k, v)| (k, ErrorSlot::from(v)))
                .collect(),
        ))
    }
}

/// Run the common composite prologue: null check, container check,
/// preprocessor.  `Ok(None)` means the value was an allowed null.
fn prologue(
    field: &Field,
    value: &Value,
    ancestry: &[String],
    is_container: fn(&Value) -> bool,
) -> Result<Option<Value>, crate::error::StructuralError> {
    if field.check_null(value, ancestry)? {
        return Ok(None);
    }
    if !is_container(value) {
        return Err(field.invalid(ancestry, value));
    }
    let value = field.apply_preprocessor(value.clone());
    if !is_container(&value) {
        return Err(field.invalid(ancestry, &value));
    }
    Ok(Some(value))
}

fn is_array(value: &Value) -> bool {
    matches!(value, Value::Array(_))
}

fn is_map(value: &Value) -> bool {
    matches!(value, Value::Map(_))
}

fn describe_children(ctx: &mut DescribeContext<'_>, children: &[FieldRef]) -> Result<Value, SchemeError> {
    let mut descriptions = Vec::with_capacity(children.len());
    for child in children {
        descriptions.push(ctx.child(child)?);
    }
    Ok(Value::Array(descriptions))
}

fn transform_children(
    children: &[FieldRef],
    transformer: &dyn Fn(&Field) -> Transform,
) -> Option<Vec<FieldRef>> {
    let candidates: Vec<Option<FieldRef>> = children
        .iter()
        .map(|child| transform_child(child, transformer))
        .collect();
    if candidates.iter().all(Option::is_none) {
        return None;
    }
    Some(
        candidates
            .into_iter()
            .zip(children)
            .map(|(candidate, child)| candidate.unwrap_or_else(|| child.clone()))
            .collect(),
    )
}

/// A homogeneous list of items.
#[derive(Debug, Clone)]
pub struct Sequence {
    item: FieldRef,
    min_length: Option<usize>,
    max_length: Option<usize>,
    unique: bool,
}

impl Sequence {
    /// Create a sequence whose items are processed by `item`.
    pub fn new<F: Into<FieldRef>>(item: F) -> Sequence {
        Sequence {
            item: item.into(),
            min_length: None,
            max_length: None,
            unique: false,
        }
    }

    /// Minimum number of items.
    pub fn min_length(mut self, min_length: usize) -> Sequence {
        self.min_length = Some(min_length);
        self
    }

    /// Maximum number of items.
    pub fn max_length(mut self, max_length: usize) -> Sequence {
        self.max_length = Some(max_length);
        self
    }

    /// Reject sequences with duplicate processed items.
    pub fn unique(mut self, unique: bool) -> Sequence {
        self.unique = unique;
        self
    }

    /// The item slot.
    pub fn item(&self) -> &FieldRef {
        &self.item
    }

    pub(crate) fn process(
        &self,
        field: &Field,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        _partial: bool,
    ) -> ProcessResult {
        let value = match prologue(field, value, ancestry, is_array)? {
            Some(value) => value,
            None => return Ok(Value::Null),
        };
        let items = value.as_array().map(Vec::as_slice).unwrap_or_default();

        length_check(field, &value, ancestry, items.len(), self.min_length, self.max_length, "item")?;

        let results = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let path = child_path(ancestry, format!("[{}]", i));
                field.process_child(&self.item, item, phase, serialized, &path, false)
            })
            .collect();
        let processed = settle(results).map_err(|s| field.aggregate(ancestry, &value, s))?;

        if self.unique {
            let distinct: HashSet<&Value> = processed.iter().collect();
            if distinct.len() != processed.len() {
                return Err(field.violation("duplicate", ancestry, Some(&value), &[]));
            }
        }
        Ok(Value::Array(processed))
    }

    pub(crate) fn extract(
        &self,
        field: &Field,
        subject: &Value,
        options: &ExtractOptions,
    ) -> Result<Value, ExtractError> {
        if subject.is_null() {
            return Ok(Value::Null);
        }
        let subject = field.apply_extractor(subject);
        let items = match &subject {
            Value::Array(items) => items,
            _ => return Err(ExtractError::InvalidSubject(subject)),
        };
        let mut extraction = Vec::with_capacity(items.len());
        for item in items {
            match extract_child(&self.item, item, options) {
                Ok(v) => extraction.push(v),
                Err(ExtractError::Excluded) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Value::Array(extraction))
    }

    pub(crate) fn instantiate(&self, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| instantiate_child(&self.item, item, None))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub(crate) fn filter(
        &self,
        field: &Field,
        exclusive: bool,
        tests: &BTreeMap<String, bool>,
    ) -> Option<Field> {
        match &self.item {
            FieldRef::Defined(item) if item.is_structural() => {
                let item = item.filter(exclusive, tests)?;
                let mut filtered = field.clone();
                if let FieldKind::Sequence(sequence) = &mut filtered.kind {
                    sequence.item = FieldRef::from(item);
                }
                Some(filtered)
            }
            _ => Some(field.clone()),
        }
    }

    pub(crate) fn transform(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Sequence> {
        transform_child(&self.item, transformer).map(|item| Sequence {
            item,
            ..self.clone()
        })
    }
}

impl FieldType for Sequence {
    fn tag(&self) -> &'static str {
        "sequence"
    }

    fn type_name(&self) -> &'static str {
        "Sequence"
    }

    fn describe(&self, d: &mut Description, ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.set("item", ctx.child(&self.item)?);
        d.option("min_length", self.min_length);
        d.option("max_length", self.max_length);
        d.flag("unique", self.unique, false);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "min_length" => Some(self.min_length.into()),
            "max_length" => Some(self.max_length.into()),
            "unique" => Some(self.unique.into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = vec![format!("item={}", repr_ref(&self.item))];
        if let Some(min_length) = self.min_length {
            aspects.push(format!("min_length={}", min_length));
        }
        if let Some(max_length) = self.max_length {
            aspects.push(format!("max_length={}", max_length));
        }
        if self.unique {
            aspects.push("unique=true".into());
        }
        aspects
    }
}

/// A mapping with homogeneous values.
///
/// Keys must be text unless a key field is given.
#[derive(Debug, Clone)]
pub struct Map {
    value: FieldRef,
    key: Option<FieldRef>,
    required_keys: Vec<String>,
}

impl Map {
    /// Create a map whose values are processed by `value`.
    pub fn new<F: Into<FieldRef>>(value: F) -> Map {
        Map {
            value: value.into(),
            key: None,
            required_keys: Vec::new(),
        }
    }

    /// Process keys through `key`; a key that fails makes the whole map
    /// invalid.
    pub fn key<F: Into<FieldRef>>(mut self, key: F) -> Map {
        self.key = Some(key.into());
        self
    }

    /// Keys that must be present.
    pub fn required_keys<I, S>(mut self, keys: I) -> Map
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// The value slot.
    pub fn value(&self) -> &FieldRef {
        &self.value
    }

    pub(crate) fn process(
        &self,
        field: &Field,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        _partial: bool,
    ) -> ProcessResult {
        let value = match prologue(field, value, ancestry, is_map)? {
            Some(value) => value,
            None => return Ok(Value::Null),
        };
        let entries = match &value {
            Value::Map(entries) => entries,
            _ => return Err(field.invalid(ancestry, &value)),
        };

        let mut results = IndexMap::with_capacity(entries.len());
        for (key, subvalue) in entries {
            let path = child_path(ancestry, format!("[{}]", key.segment()));
            let key = match &self.key {
                Some(key_field) => field
                    .process_child(key_field, key, phase, serialized, &path, false)
                    .map_err(|_| field.violation("invalidkeys", ancestry, Some(&value), &[]))?,
                None if matches!(key, Value::Text(_)) => key.clone(),
                None => return Err(field.violation("invalidkeys", ancestry, Some(&value), &[])),
            };
            let result = field.process_child(&self.value, subvalue, phase, serialized, &path, false);
            results.insert(key, result);
        }

        for name in &self.required_keys {
            let key = Value::from(name.as_str());
            if !results.contains_key(&key) {
                let missing = field.violation("required", ancestry, None, &[("name", name.clone())]);
                results.insert(key, Err(missing));
            }
        }

        settle_map(results)
            .map(Value::Map)
            .map_err(|s| field.aggregate(ancestry, &value, s))
    }

    pub(crate) fn extract(
        &self,
        field: &Field,
        subject: &Value,
        options: &ExtractOptions,
    ) -> Result<Value, ExtractError> {
        if subject.is_null() {
            return Ok(Value::Null);
        }
        let subject = field.apply_extractor(subject);
        let entries = match &subject {
            Value::Map(entries) => entries,
            _ => return Err(ExtractError::InvalidSubject(subject)),
        };
        let mut extraction = ValueMap::with_capacity(entries.len());
        for (key, value) in entries {
            match extract_child(&self.value, value, options) {
                Ok(v) => {
                    extraction.insert(key.clone(), v);
                }
                Err(ExtractError::Excluded) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Value::Map(extraction))
    }

    pub(crate) fn instantiate(&self, value: &Value) -> Value {
        match value {
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), instantiate_child(&self.value, v, Some(k))))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub(crate) fn transform(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Map> {
        let value = transform_child(&self.value, transformer);
        let key = self
            .key
            .as_ref()
            .and_then(|key| transform_child(key, transformer));
        if value.is_none() && key.is_none() {
            return None;
        }
        Some(Map {
            value: value.unwrap_or_else(|| self.value.clone()),
            key: key.or_else(|| self.key.clone()),
            required_keys: self.required_keys.clone(),
        })
    }
}

impl FieldType for Map {
    fn tag(&self) -> &'static str {
        "map"
    }

    fn type_name(&self) -> &'static str {
        "Map"
    }

    fn describe(&self, d: &mut Description, ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.set("value", ctx.child(&self.value)?);
        if let Some(key) = &self.key {
            d.set("key", ctx.child(key)?);
        }
        if !self.required_keys.is_empty() {
            d.set("required_keys", Value::array(self.required_keys.iter().map(String::as_str)));
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "required_keys" => Some(Value::array(self.required_keys.iter().map(String::as_str))),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        if let Some(key) = &self.key {
            aspects.push(format!("key={}", repr_ref(key)));
        }
        aspects.push(format!("value={}", repr_ref(&self.value)));
        if !self.required_keys.is_empty() {
            let mut keys = self.required_keys.clone();
            keys.sort();
            aspects.push(format!("required_keys={:?}", keys));
        }
        aspects
    }
}

/// A fixed-length list with a field per position.
#[derive(Debug, Clone)]
pub struct Tuple {
    values: Vec<FieldRef>,
}

impl Tuple {
    /// Create a tuple with one field per position.
    pub fn new<I, F>(values: I) -> Tuple
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldRef>,
    {
        Tuple {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The position slots.
    pub fn values(&self) -> &[FieldRef] {
        &self.values
    }

    pub(crate) fn process(
        &self,
        field: &Field,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        _partial: bool,
    ) -> ProcessResult {
        let value = match prologue(field, value, ancestry, is_array)? {
            Some(value) => value,
            None => return Ok(Value::Null),
        };
        let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
        if items.len() != self.values.len() {
            return Err(field.violation(
                "length",
                ancestry,
                Some(&value),
                &[("length", self.values.len().to_string())],
            ));
        }

        let results = self
            .values
            .iter()
            .zip(items)
            .enumerate()
            .map(|(i, (slot, item))| {
                let path = child_path(ancestry, format!("[{}]", i));
                field.process_child(slot, item, phase, serialized, &path, false)
            })
            .collect();
        settle(results)
            .map(Value::Array)
            .map_err(|s| field.aggregate(ancestry, &value, s))
    }

    pub(crate) fn extract(
        &self,
        field: &Field,
        subject: &Value,
        options: &ExtractOptions,
    ) -> Result<Value, ExtractError> {
        if subject.is_null() {
            return Ok(Value::Null);
        }
        let subject = field.apply_extractor(subject);
        let items = match &subject {
            Value::Array(items) if items.len() >= self.values.len() => items,
            _ => return Err(ExtractError::InvalidSubject(subject)),
        };
        let mut extraction = Vec::with_capacity(self.values.len());
        for (slot, item) in self.values.iter().zip(items) {
            match extract_child(slot, item, options) {
                Ok(v) => extraction.push(v),
                Err(ExtractError::Excluded) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Value::Array(extraction))
    }

    pub(crate) fn instantiate(&self, value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                self.values
                    .iter()
                    .zip(items)
                    .map(|(slot, item)| instantiate_child(slot, item, None))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub(crate) fn transform(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Tuple> {
        transform_children(&self.values, transformer).map(|values| Tuple { values })
    }
}

impl FieldType for Tuple {
    fn tag(&self) -> &'static str {
        "tuple"
    }

    fn type_name(&self) -> &'static str {
        "Tuple"
    }

    fn describe(&self, d: &mut Description, ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.set("values", describe_children(ctx, &self.values)?);
        Ok(())
    }

    fn repr(&self) -> Vec<String> {
        let values: Vec<String> = self.values.iter().map(repr_ref).collect();
        vec![format!("values=({})", values.join(", "))]
    }
}

/// An ordered choice between candidate fields.
///
/// The first candidate that accepts the value wins.  Only a type mismatch
/// moves on to the next candidate; any other failure is final.
#[derive(Debug, Clone)]
pub struct Union {
    fields: Vec<FieldRef>,
}

impl Union {
    /// Create a union of `fields`, in order of preference.
    pub fn new<I, F>(fields: I) -> Result<Union, SchemeError>
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SchemeError::parameter("fields", "a union needs at least one field"));
        }
        Ok(Union { fields })
    }

    /// The candidate slots.
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    pub(crate) fn process(
        &self,
        field: &Field,
        value: &Value,
        phase: Phase,
        serialized: bool,
        ancestry: &[String],
        partial: bool,
    ) -> ProcessResult {
        if field.check_null(value, ancestry)? {
            return Ok(Value::Null);
        }
        for (i, candidate) in self.fields.iter().enumerate() {
            match field.process_child(candidate, value, phase, serialized, ancestry, partial) {
                Ok(processed) => return Ok(processed),
                Err(e) if e.kind() == ErrorKind::InvalidType => {
                    trace!("union candidate {} rejected {:?}", i, value);
                }
                Err(e) => return Err(e),
            }
        }
        Err(field.invalid(ancestry, value))
    }

    pub(crate) fn transform(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Union> {
        transform_children(&self.fields, transformer).map(|fields| Union { fields })
    }
}

impl FieldType for Union {
    fn tag(&self) -> &'static str {
        "union"
    }

    fn type_name(&self) -> &'static str {
        "Union"
    }

    fn describe(&self, d: &mut Description, ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        d.set("fields", describe_children(ctx, &self.fields)?);
        Ok(())
    }

    fn repr(&self) -> Vec<String> {
        let fields: Vec<String> = self.fields.iter().map(repr_ref).collect();
        vec![format!("fields=({})", fields.join(", "))]
    }
}
