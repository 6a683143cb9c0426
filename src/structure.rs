//! Record-like structures, optionally polymorphic.
//!
//! A plain structure maps names to fields.  A polymorphic structure reads a
//! discriminator field first and uses its value to pick one of several
//! variants, each a set of named fields.  The discriminator is injected
//! into every variant as a required field whose constant is the variant's
//! identity.

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};

use crate::composite::{child_path, settle_map};
use crate::field::{
    extract_child, instantiate_child, repr_ref, transform_child, DescribeContext, Description,
    ExtractError, ExtractOptions, Field, FieldKind, FieldType, Phase, Transform,
};
use crate::scalar::Enumeration;
use crate::undefined::FieldRef;
use crate::util::{ProcessResult, SchemeError};
use crate::value::{Value, ValueMap};

/// An ordered set of named fields.
///
/// Fields added here take their key as their name unless they already have
/// one.
#[derive(Debug, Clone, Default)]
pub struct Fields(IndexMap<String, FieldRef>);

impl Fields {
    /// Create an empty set.
    pub fn new() -> Fields {
        Fields::default()
    }

    /// Add a field under `name`.
    pub fn field<N: Into<String>, F: Into<FieldRef>>(mut self, name: N, field: F) -> Fields {
        self.insert(name, field);
        self
    }

    /// Add or replace a field under `name`.
    pub fn insert<N: Into<String>, F: Into<FieldRef>>(&mut self, name: N, field: F) {
        let name = name.into();
        let field = field.into().named(&name);
        self.0.insert(name, field);
    }

    /// The field named `name`, if it is available.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.get(name).and_then(FieldRef::resolve)
    }

    /// The slot named `name`.
    pub fn slot(&self, name: &str) -> Option<&FieldRef> {
        self.0.get(name)
    }

    /// Returns `true` if a field is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The field names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The slots, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRef)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Insert with the key forced onto the field's name.
    fn put(&mut self, name: String, field: FieldRef) {
        let field = field.renamed(&name);
        self.0.insert(name, field);
    }

    fn defaults(&self, sparse: bool) -> Value {
        let mut defaults = ValueMap::new();
        for (name, slot) in &self.0 {
            let default = slot.resolve().and_then(Field::get_default);
            if !sparse || default.is_some() {
                defaults.insert(Value::from(name.as_str()), default.unwrap_or(Value::Null));
            }
        }
        Value::Map(defaults)
    }

    fn filtered(&self, exclusive: bool, tests: &BTreeMap<String, bool>) -> Fields {
        let mut filtered = IndexMap::new();
        for (name, slot) in &self.0 {
            match slot {
                FieldRef::Defined(field) => {
                    if let Some(field) = field.filter(exclusive, tests) {
                        filtered.insert(name.clone(), FieldRef::from(field));
                    }
                }
                deferred => {
                    filtered.insert(name.clone(), deferred.clone());
                }
            }
        }
        Fields(filtered)
    }

    fn transformed(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Fields> {
        let mut changed = false;
        let mut candidates = IndexMap::with_capacity(self.0.len());
        for (name, slot) in &self.0 {
            match transform_child(slot, transformer) {
                Some(candidate) => {
                    changed = true;
                    candidates.insert(name.clone(), candidate.renamed(name));
                }
                None => {
                    candidates.insert(name.clone(), slot.clone());
                }
            }
        }
        if changed {
            Some(Fields(candidates))
        } else {
            None
        }
    }

    fn describe(&self, ctx: &mut DescribeContext<'_>, skip: Option<&str>) -> Result<Value, SchemeError> {
        let mut description = ValueMap::new();
        for (name, slot) in &self.0 {
            if Some(name.as_str()) == skip {
                continue;
            }
            description.insert(Value::from(name.as_str()), ctx.child(slot)?);
        }
        Ok(Value::Map(description))
    }

    fn repr(&self) -> String {
        let entries: Vec<String> = self
            .0
            .iter()
            .map(|(name, slot)| format!("{:?}: {}", name, repr_ref(slot)))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

/// The variants of a polymorphic structure, keyed by identity.
///
/// Fields registered under the identity `*` are merged into every other
/// variant.
#[derive(Debug, Clone, Default)]
pub struct Variants(IndexMap<String, Fields>);

impl Variants {
    /// Create an empty variant set.
    pub fn new() -> Variants {
        Variants::default()
    }

    /// Add a variant.
    pub fn variant<I: Into<String>>(mut self, identity: I, fields: Fields) -> Variants {
        self.0.insert(identity.into(), fields);
        self
    }

    /// Add fields common to every variant.
    pub fn common(self, fields: Fields) -> Variants {
        self.variant("*", fields)
    }

    /// The variant identities, in declaration order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The fields of one variant.
    pub fn get(&self, identity: &str) -> Option<&Fields> {
        self.0.get(identity)
    }
}

/// A forced iteration order for structure fields.
///
/// Listed names come first; fields that aren't listed follow in
/// declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOrder {
    /// One order for a plain structure.
    Fixed(Vec<String>),
    /// One order per variant of a polymorphic structure.
    PerVariant(IndexMap<String, Vec<String>>),
}

impl KeyOrder {
    fn listed(&self, identity: Option<&str>) -> &[String] {
        match (self, identity) {
            (KeyOrder::Fixed(names), _) => names,
            (KeyOrder::PerVariant(orders), Some(identity)) => {
                orders.get(identity).map(Vec::as_slice).unwrap_or_default()
            }
            (KeyOrder::PerVariant(_), None) => &[],
        }
    }

    fn to_value(&self) -> Value {
        let names = |names: &Vec<String>| Value::array(names.iter().map(String::as_str));
        match self {
            KeyOrder::Fixed(order) => names(order),
            KeyOrder::PerVariant(orders) => Value::Map(
                orders
                    .iter()
                    .map(|(identity, order)| (Value::from(identity.as_str()), names(order)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone)]
enum Layout {
    Fixed(Fields),
    Polymorphic {
        on: Box<Field>,
        variants: IndexMap<String, Fields>,
    },
}

/// A record-like mapping from names to fields.
#[derive(Debug, Clone)]
pub struct Structure {
    layout: Layout,
    strict: bool,
    key_order: Option<KeyOrder>,
    generate_default: bool,
}

impl Structure {
    /// Create a plain structure.
    pub fn new(fields: Fields) -> Structure {
        Structure {
            layout: Layout::Fixed(fields),
            strict: true,
            key_order: None,
            generate_default: false,
        }
    }

    /// Create a polymorphic structure discriminated by `on`, which must be
    /// named.
    ///
    /// Fails if a variant already defines a field with the discriminator's
    /// name.
    pub fn polymorphic(on: Field, variants: Variants) -> Result<Structure, SchemeError> {
        let on_name = match on.name() {
            Some(name) => name.to_string(),
            None => {
                return Err(SchemeError::Polymorphism(
                    "the discriminator field must be named".into(),
                ))
            }
        };
        let on = on.required(true);

        let mut variants = variants.0;
        let common = variants.shift_remove("*");
        let mut layout = IndexMap::with_capacity(variants.len());
        for (identity, mut fields) in variants {
            if let Some(common) = &common {
                for (name, slot) in common.iter() {
                    fields.insert(name, slot.clone());
                }
            }
            if fields.contains(&on_name) {
                return Err(SchemeError::Polymorphism(format!(
                    "variant '{}' already defines '{}'",
                    identity, on_name
                )));
            }
            fields.put(on_name.clone(), FieldRef::from(on.clone().with_constant(identity.as_str())));
            layout.insert(identity, fields);
        }

        Ok(Structure {
            layout: Layout::Polymorphic {
                on: Box::new(on),
                variants: layout,
            },
            strict: true,
            key_order: None,
            generate_default: false,
        })
    }

    /// Create a polymorphic structure whose discriminator is a generated,
    /// non-empty enumeration of the variant identities.
    pub fn polymorphic_named<N: Into<String>>(name: N, variants: Variants) -> Result<Structure, SchemeError> {
        let identities: Vec<&str> = variants.identities().filter(|i| *i != "*").collect();
        let on = Field::from(Enumeration::new(identities)?)
            .with_name(name)
            .nonempty();
        Structure::polymorphic(on, variants)
    }

    /// Reject unknown keys (the default) or silently drop them.
    pub fn strict(mut self, strict: bool) -> Structure {
        self.strict = strict;
        self
    }

    /// Force an iteration order.
    pub fn key_order(mut self, key_order: KeyOrder) -> Structure {
        self.key_order = Some(key_order);
        self
    }

    /// Install the generated default as this structure's default.
    pub fn with_generated_default(mut self) -> Structure {
        self.generate_default = true;
        self
    }

    pub(crate) fn generates_default(&self) -> bool {
        self.generate_default
    }

    /// Returns `true` if this structure is polymorphic.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self.layout, Layout::Polymorphic { .. })
    }

    /// Returns `true` if unknown keys are rejected.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The discriminator field of a polymorphic structure.
    pub fn polymorphic_on(&self) -> Option<&Field> {
        match &self.layout {
            Layout::Fixed(_) => None,
            Layout::Polymorphic { on, .. } => Some(on),
        }
    }

    /// The fields of a plain structure.
    pub fn fields(&self) -> Option<&Fields> {
        match &self.layout {
            Layout::Fixed(fields) => Some(fields),
            Layout::Polymorphic { .. } => None,
        }
    }

    /// The fields of one variant of a polymorphic structure, including the
    /// injected discriminator.
    pub fn variant(&self, identity: &str) -> Option<&Fields> {
        match &self.layout {
            Layout::Fixed(_) => None,
            Layout::Polymorphic { variants, .. } => variants.get(identity),
        }
    }

    /// The forced iteration order, if any.
    pub fn order(&self) -> Option<&KeyOrder> {
        self.key_order.as_ref()
    }

    /// The field named `name` in a plain structure.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields().and_then(|fields| fields.get(name))
    }

    /// Returns `true` if `name` is a field of this structure, or of any
    /// variant when polymorphic.
    pub fn contains(&self, name: &str) -> bool {
        self.field_sets().any(|fields| fields.contains(name))
    }

    /// True if processing can fail for want of a field: a polymorphic
    /// structure always needs its discriminator, a plain one needs any
    /// required field without a default.
    pub fn has_required_fields(&self) -> bool {
        match &self.layout {
            Layout::Polymorphic { .. } => true,
            Layout::Fixed(fields) => fields
                .iter()
                .filter_map(|(_, slot)| slot.resolve())
                .any(|f| f.is_required() && f.default_value().is_none()),
        }
    }

    /// Collect the member defaults, per variant when polymorphic.  With
    /// `sparse`, members without a default are left out.
    pub fn generate_default(&self, sparse: bool) -> Value {
        match &self.layout {
            Layout::Fixed(fields) => fields.defaults(sparse),
            Layout::Polymorphic { variants, .. } => Value::Map(
                variants
                    .iter()
                    .map(|(identity, fields)| (Value::from(identity.as_str()), fields.defaults(sparse)))
                    .collect(),
            ),
        }
    }

    /// Add `field`, which must be named.  An existing field of the same
    /// name is only replaced with `overwrite`.  Polymorphic structures add
    /// the field to every variant.
    ///
    /// Only for use while the schema is being built.
    pub fn insert(&mut self, field: Field, overwrite: bool) -> Result<(), SchemeError> {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => return Err(SchemeError::parameter("field", "an inserted field must be named")),
        };
        for fields in self.field_sets_mut() {
            if overwrite || !fields.contains(&name) {
                fields.put(name.clone(), FieldRef::from(field.clone()));
            }
        }
        Ok(())
    }

    /// Add every field of `fields`.  Existing fields are replaced only with
    /// `prefer`.
    ///
    /// Only for use while the schema is being built.
    pub fn merge(&mut self, fields: Fields, prefer: bool) {
        for target in self.field_sets_mut() {
            for (name, slot) in fields.iter() {
                if target.contains(name) && !prefer {
                    continue;
                }
                target.put(name.to_string(), slot.clone());
            }
        }
    }

    pub(crate) fn extend_with(&mut self, fields: Fields) {
        for target in self.field_sets_mut() {
            for (name, slot) in fields.iter() {
                target.put(name.to_string(), slot.clone());
            }
        }
    }

    pub(crate) fn replace_with(&mut self, fields: Fields) {
        for target in self.field_sets_mut() {
            for (name, slot) in fields.iter() {
                if target.contains(name) {
                    target.put(name.to_string(), slot.clone());
                }
            }
        }
    }

    fn field_sets(&self) -> Box<dyn Iterator<Item = &Fields> + '_> {
        match &self.layout {
            Layout::Fixed(fields) => Box::new(std::iter::once(fields)),
            Layout::Polymorphic { variants, .. } => Box::new(variants.values()),
        }
    }

    fn field_sets_mut(&mut self) -> Box<dyn Iterator<Item = &mut Fields> + '_> {
        match &mut self.layout {
            Layout::Fixed(fields) => Box::new(std::iter::once(fields)),
            Layout::Polymorphic { variants, .. } => Box::new(variants.values_mut()),
        }
    }

    fn iteration_order<'a>(&'a self, definition: &'a Fields, identity: Option<&str>) -> Vec<&'a str> {
        let listed = self
            .key_order
            .as_ref()
            .map(|order| order.listed(identity))
            .unwrap_or_default();
        let mut order: Vec<&str> = listed
            .iter()
            .map(String::as_str)
            .filter(|name| definition.contains(name))
            .collect();
        for name in definition.names() {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }

    /// Select the definition for a subject map without processing it.
    fn definition_for(&self, entries: &ValueMap) -> Option<&Fields> {
        match &self.layout {
            Layout::Fixed(fields) => Some(fields),
            Layout::Polymorphic { on, variants } => {
                let identity = entries.get(&Value::from(on.name()?))?;
                variants.get(identity.as_text()?)
            }
        }
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
        if !matches!(value, Value::Map(_)) {
            return Err(field.invalid(ancestry, value));
        }
        let value = field.apply_preprocessor(value.clone());
        let entries = match &value {
            Value::Map(entries) => entries,
            other => return Err(field.invalid(ancestry, other)),
        };

        let (definition, identity) = match &self.layout {
            Layout::Fixed(fields) => (fields, None),
            Layout::Polymorphic { on, variants } => {
                let on_name = on.name().unwrap_or_default();
                let discriminator = match entries.get(&Value::from(on_name)) {
                    Some(d) if !d.is_null() => d,
                    _ => {
                        return Err(field.violation(
                            "required",
                            ancestry,
                            None,
                            &[("name", on_name.to_string())],
                        ))
                    }
                };
                let path = child_path(ancestry, format!(".{}", on_name));
                let identity = on.process_value(discriminator, phase, serialized, &path, false)?;
                // Variants are tagged with text; other identities never match.
                match identity.as_text().and_then(|key| variants.get_key_value(key)) {
                    Some((key, fields)) => (fields, Some(key.clone())),
                    None => return Err(field.violation("unrecognized", ancestry, Some(&identity), &[])),
                }
            }
        };

        let mut remaining: IndexSet<&Value> = entries.keys().collect();
        let mut results: IndexMap<Value, ProcessResult> = IndexMap::new();

        for name in self.iteration_order(definition, identity.as_deref()) {
            let slot = match definition.slot(name) {
                Some(slot) => slot,
                None => continue,
            };
            let member = slot.resolve();
            let key = Value::from(name);

            let member_value = match entries.get(&key) {
                Some(v) => {
                    remaining.shift_remove(&key);
                    v.clone()
                }
                None if partial => continue,
                None => match member {
                    Some(m) if phase == Phase::Incoming && m.default_value().is_some() => {
                        m.get_default().unwrap_or(Value::Null)
                    }
                    Some(m) if m.is_required() => {
                        let missing = field.violation("required", ancestry, None, &[("name", name.to_string())]);
                        results.insert(key, Err(missing));
                        continue;
                    }
                    _ => continue,
                },
            };

            if member_value.is_null() && member.map_or(false, Field::ignores_null) {
                continue;
            }

            let path = child_path(ancestry, format!(".{}", name));
            let result = field.process_child(slot, &member_value, phase, serialized, &path, false);
            results.insert(key, result);
        }

        if self.strict {
            for name in remaining {
                let unknown = field.violation("unknown", ancestry, None, &[("name", name.segment())]);
                results.insert(name.clone(), Err(unknown));
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
            Value::Map(entries) => entries.clone(),
            Value::Surrogate(surrogate) if !options.strict => surrogate.to_map(),
            _ if !options.strict => ValueMap::new(),
            _ => return Err(ExtractError::InvalidSubject(subject)),
        };
        let definition = match self.definition_for(&entries) {
            Some(definition) => definition,
            None => return Err(ExtractError::InvalidSubject(subject)),
        };

        let mut extraction = ValueMap::new();
        for (name, slot) in definition.iter() {
            let key = Value::from(name);
            let value = match entries.get(&key) {
                Some(value) => value,
                None => continue,
            };
            if options.sparse && value.is_null() {
                continue;
            }
            match extract_child(slot, value, options) {
                Ok(v) => {
                    extraction.insert(key, v);
                }
                Err(ExtractError::Excluded) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Value::Map(extraction))
    }

    pub(crate) fn instantiate(&self, value: &Value) -> Value {
        let entries = match value {
            Value::Map(entries) => entries,
            other => return other.clone(),
        };
        let definition = match self.definition_for(entries) {
            Some(definition) => definition,
            None => return value.clone(),
        };
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| {
                    let instance = match k.as_text().and_then(|name| definition.slot(name)) {
                        Some(slot) => instantiate_child(slot, v, None),
                        None => v.clone(),
                    };
                    (k.clone(), instance)
                })
                .collect(),
        )
    }

    pub(crate) fn filter(&self, field: &Field, exclusive: bool, tests: &BTreeMap<String, bool>) -> Field {
        let mut filtered = field.clone();
        if let FieldKind::Structure(structure) = &mut filtered.kind {
            for fields in structure.field_sets_mut() {
                *fields = fields.filtered(exclusive, tests);
            }
        }
        filtered
    }

    pub(crate) fn transform(&self, transformer: &dyn Fn(&Field) -> Transform) -> Option<Structure> {
        let layout = match &self.layout {
            Layout::Fixed(fields) => Layout::Fixed(fields.transformed(transformer)?),
            Layout::Polymorphic { on, variants } => {
                let candidates: Vec<Option<Fields>> = variants
                    .values()
                    .map(|fields| fields.transformed(transformer))
                    .collect();
                if candidates.iter().all(Option::is_none) {
                    return None;
                }
                Layout::Polymorphic {
                    on: on.clone(),
                    variants: variants
                        .iter()
                        .zip(candidates)
                        .map(|((identity, fields), candidate)| {
                            (identity.clone(), candidate.unwrap_or_else(|| fields.clone()))
                        })
                        .collect(),
                }
            }
        };
        Some(Structure {
            layout,
            ..self.clone()
        })
    }
}

impl FieldType for Structure {
    fn tag(&self) -> &'static str {
        "structure"
    }

    fn type_name(&self) -> &'static str {
        "Structure"
    }

    fn describe(&self, d: &mut Description, ctx: &mut DescribeContext<'_>) -> Result<(), SchemeError> {
        match &self.layout {
            Layout::Fixed(fields) => {
                d.set("structure", fields.describe(ctx, None)?);
            }
            Layout::Polymorphic { on, variants } => {
                d.set("polymorphic_on", on.describe_in(ctx)?);
                let mut structure = ValueMap::new();
                for (identity, fields) in variants {
                    let description = fields.describe(ctx, on.name())?;
                    structure.insert(Value::from(identity.as_str()), description);
                }
                d.set("structure", Value::Map(structure));
            }
        }
        d.flag("strict", self.strict, true);
        if let Some(key_order) = &self.key_order {
            d.set("key_order", key_order.to_value());
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "strict" => Some(self.strict.into()),
            "polymorphic_on" => Some(self.polymorphic_on().and_then(Field::name).into()),
            "key_order" => Some(self.key_order.as_ref().map(KeyOrder::to_value).into()),
            _ => None,
        }
    }

    fn repr(&self) -> Vec<String> {
        let mut aspects = Vec::new();
        match &self.layout {
            Layout::Fixed(fields) => aspects.push(format!("structure={}", fields.repr())),
            Layout::Polymorphic { on, variants } => {
                let variants: Vec<String> = variants
                    .iter()
                    .map(|(identity, fields)| format!("{:?}: {}", identity, fields.repr()))
                    .collect();
                aspects.push(format!("structure={{{}}}", variants.join(", ")));
                aspects.push(format!("polymorphic_on={:?}", on.name().unwrap_or_default()));
            }
        }
        if !self.strict {
            aspects.push("strict=false".into());
        }
        if let Some(key_order) = &self.key_order {
            aspects.push(format!("key_order={:?}", key_order));
        }
        aspects
    }
}
