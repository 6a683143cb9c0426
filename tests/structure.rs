use std::collections::BTreeMap;

use scheme::{
    Enumeration, ExtractError, ExtractOptions, Field, FieldRef, Fields, Integer, KeyOrder, Map,
    Phase, Sequence, Structure, Text, Transform, Tuple, Undefined, Value, Variants,
};

fn person() -> Field {
    Field::from(Structure::new(
        Fields::new()
            .field("name", Field::from(Text::new()).required(true))
            .field("age", Field::from(Integer::new()).with_default(18))
            .field("nickname", Text::new()),
    ))
    .with_name("person")
}

fn shapes() -> Variants {
    Variants::new()
        .variant(
            "circle",
            Fields::new().field("radius", Field::from(Integer::new()).required(true)),
        )
        .variant(
            "square",
            Fields::new().field("side", Field::from(Integer::new()).required(true)),
        )
        .common(Fields::new().field("label", Text::new()))
}

#[test]
fn defaults_and_required() {
    let field = person();
    let value = field.unserialize(&Value::map(vec![("name", "Alice")])).unwrap();
    assert_eq!(value, Value::map(vec![("name", Value::from("Alice")), ("age", Value::from(18))]));

    // Defaults only fill in incoming values.
    let value = field.serialize(&Value::map(vec![("name", "Alice")])).unwrap();
    assert_eq!(value, Value::map(vec![("name", "Alice")]));

    let err = field
        .unserialize(&Value::map(vec![("age", Value::from("x")), ("email", Value::from("a@b"))]))
        .unwrap_err();
    let structure = err.structure().unwrap();
    assert_eq!(structure.len(), 3);
    let name = structure.key("name").unwrap().as_error().unwrap();
    assert_eq!(name.tokens(), vec!["required"]);
    assert_eq!(name.errors()[0].message, "person is missing required field 'name'");
    let age = structure.key("age").unwrap().as_error().unwrap();
    assert_eq!(age.identity(), &["person".to_string(), ".age".to_string()]);
    assert_eq!(structure.key("email").unwrap().as_error().unwrap().tokens(), vec!["unknown"]);
}

#[test]
fn defaults_are_validated() {
    let field = Field::from(Structure::new(
        Fields::new().field("a", Field::from(Integer::new().minimum(5)).with_default(2)),
    ));
    let err = field
        .unserialize(&Value::map(Vec::<(&str, Value)>::new()))
        .unwrap_err();
    let a = err.structure().unwrap().key("a").unwrap().as_error().unwrap();
    assert_eq!(a.tokens(), vec!["minimum"]);
}

#[test]
fn shape_checks() {
    let field = person();
    assert_eq!(field.unserialize(&Value::Null).unwrap(), Value::Null);
    let err = field.unserialize(&Value::array(vec![1])).unwrap_err();
    assert_eq!(err.tokens(), vec!["invalid"]);
}

#[test]
fn lenient_structures_drop_unknown_keys() {
    let field = Field::from(Structure::new(Fields::new().field("a", Integer::new())).strict(false));
    let value = field.unserialize(&Value::map(vec![("a", 1), ("b", 2)])).unwrap();
    assert_eq!(value, Value::map(vec![("a", 1)]));
}

#[test]
fn ignore_null() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("a", Field::from(Integer::new()).ignore_null(true))
            .field("b", Integer::new()),
    ));
    let value = field
        .unserialize(&Value::map(vec![("a", Value::Null), ("b", Value::Null)]))
        .unwrap();
    assert_eq!(value, Value::map(vec![("b", Value::Null)]));
}

#[test]
fn partial_processing() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("name", Field::from(Text::new()).required(true))
            .field("age", Field::from(Integer::new()).with_default(18))
            .field(
                "address",
                Structure::new(Fields::new().field("city", Field::from(Text::new()).required(true))),
            ),
    ));
    let value = field
        .process_partial(&Value::map(vec![("age", 3)]), Phase::Incoming, true)
        .unwrap();
    assert_eq!(value, Value::map(vec![("age", 3)]));

    // Only the root is partial.
    let err = field
        .process_partial(
            &Value::map(vec![("address", Value::map(Vec::<(&str, Value)>::new()))]),
            Phase::Incoming,
            true,
        )
        .unwrap_err();
    let address = err.structure().unwrap().key("address").unwrap().as_error().unwrap();
    let city = address.structure().unwrap().key("city").unwrap().as_error().unwrap();
    assert_eq!(city.tokens(), vec!["required"]);
}

#[test]
fn polymorphic() {
    let field = Field::from(Structure::polymorphic_named("type", shapes()).unwrap());
    let value = field
        .unserialize(&Value::map(vec![
            ("type", Value::from("circle")),
            ("radius", Value::from("2")),
            ("label", Value::from("c")),
        ]))
        .unwrap();
    assert_eq!(value.get("radius"), Some(&Value::Integer(2)));
    assert_eq!(value.get("type"), Some(&Value::from("circle")));

    let err = field.unserialize(&Value::map(vec![("radius", 2)])).unwrap_err();
    assert_eq!(err.tokens(), vec!["required"]);
    assert!(err.structure().is_none());

    let err = field
        .unserialize(&Value::map(vec![("type", Value::from("circle")), ("side", Value::from(1))]))
        .unwrap_err();
    let structure = err.structure().unwrap();
    assert_eq!(structure.key("radius").unwrap().as_error().unwrap().tokens(), vec!["required"]);
    assert_eq!(structure.key("side").unwrap().as_error().unwrap().tokens(), vec!["unknown"]);

    let err = field.unserialize(&Value::map(vec![("type", "triangle")])).unwrap_err();
    assert_eq!(err.tokens(), vec!["invalid"]);
    assert_eq!(err.identity(), &["(structure)".to_string(), ".type".to_string()]);
}

#[test]
fn polymorphic_unrecognized_identity() {
    let on = Field::from(Text::new()).with_name("kind");
    let field = Field::from(Structure::polymorphic(on, shapes()).unwrap());
    let err = field.unserialize(&Value::map(vec![("kind", "triangle")])).unwrap_err();
    assert_eq!(err.tokens(), vec!["unrecognized"]);
}

#[test]
fn polymorphic_identity_must_be_text() {
    let on = Field::from(scheme::Any::new()).with_name("kind");
    let variants = Variants::new().variant("1", Fields::new().field("a", Integer::new()));
    let field = Field::from(Structure::polymorphic(on, variants).unwrap());

    field.unserialize(&Value::map(vec![("kind", "1")])).unwrap();
    let err = field.unserialize(&Value::map(vec![("kind", 1)])).unwrap_err();
    assert_eq!(err.tokens(), vec!["unrecognized"]);
}

#[test]
fn polymorphic_construction_errors() {
    Structure::polymorphic(Field::from(Text::new()), shapes()).unwrap_err();

    let clashing = Variants::new().variant("a", Fields::new().field("type", Text::new()));
    Structure::polymorphic_named("type", clashing).unwrap_err();

    let structure = Structure::polymorphic_named("type", shapes()).unwrap();
    assert!(structure.is_polymorphic());
    assert!(structure.has_required_fields());
    assert!(structure.contains("radius"));
    assert!(structure.contains("side"));
    let circle = structure.variant("circle").unwrap();
    assert_eq!(circle.names().collect::<Vec<_>>(), vec!["radius", "label", "type"]);
    assert_eq!(circle.get("type").unwrap().constant(), Some(&Value::from("circle")));
    assert!(structure.polymorphic_on().unwrap().is_required());
}

#[test]
fn key_order() {
    let field = Field::from(
        Structure::new(
            Fields::new()
                .field("a", Integer::new())
                .field("b", Integer::new())
                .field("c", Integer::new()),
        )
        .key_order(KeyOrder::Fixed(vec!["c".into(), "a".into()])),
    );
    let value = field
        .unserialize(&Value::map(vec![("a", 1), ("b", 2), ("c", 3)]))
        .unwrap();
    let keys: Vec<&str> = value.as_map().unwrap().keys().filter_map(Value::as_text).collect();
    assert_eq!(keys, vec!["c", "a", "b"]);
}

#[test]
fn generated_defaults() {
    let fields = Fields::new()
        .field("a", Field::from(Integer::new()).with_default(1))
        .field("b", Integer::new());
    let structure = Structure::new(fields.clone());
    assert_eq!(structure.generate_default(true), Value::map(vec![("a", 1)]));
    assert_eq!(
        structure.generate_default(false),
        Value::map(vec![("a", Value::from(1)), ("b", Value::Null)])
    );

    let field = Field::from(Structure::new(fields).with_generated_default());
    assert_eq!(field.get_default(), Some(Value::map(vec![("a", 1)])));

    let nested = Field::from(Structure::new(Fields::new().field("inner", field)));
    let value = nested.unserialize(&Value::map(Vec::<(&str, Value)>::new())).unwrap();
    assert_eq!(value, Value::map(vec![("inner", Value::map(vec![("a", 1)]))]));
}

#[test]
fn required_fields() {
    let optional = Structure::new(Fields::new().field("a", Integer::new()));
    assert!(!optional.has_required_fields());

    let defaulted = Structure::new(
        Fields::new().field("a", Field::from(Integer::new()).required(true).with_default(0)),
    );
    assert!(!defaulted.has_required_fields());

    let required = Structure::new(Fields::new().field("a", Field::from(Integer::new()).required(true)));
    assert!(required.has_required_fields());
}

#[test]
fn insert_and_merge() {
    let mut structure = Structure::new(Fields::new().field("a", Integer::new()));
    structure.insert(Field::from(Text::new()), false).unwrap_err();

    structure.insert(Field::from(Text::new()).with_name("a"), false).unwrap();
    assert_eq!(structure.get("a").unwrap().type_tag(), "integer");
    structure.insert(Field::from(Text::new()).with_name("a"), true).unwrap();
    assert_eq!(structure.get("a").unwrap().type_tag(), "text");

    structure.merge(
        Fields::new().field("a", Integer::new()).field("b", Integer::new()),
        false,
    );
    assert_eq!(structure.get("a").unwrap().type_tag(), "text");
    assert_eq!(structure.get("b").unwrap().name(), Some("b"));
    structure.merge(Fields::new().field("a", Integer::new()), true);
    assert_eq!(structure.get("a").unwrap().type_tag(), "integer");

    let mut polymorphic = Structure::polymorphic_named("type", shapes()).unwrap();
    polymorphic.insert(Field::from(Text::new()).with_name("color"), false).unwrap();
    assert!(polymorphic.variant("circle").unwrap().contains("color"));
    assert!(polymorphic.variant("square").unwrap().contains("color"));
}

#[test]
fn extend_and_replace() {
    let field = person();
    let extended = field.extend(Fields::new().field("email", Text::new())).unwrap();
    extended
        .unserialize(&Value::map(vec![("name", "a"), ("email", "a@example.com")]))
        .unwrap();
    // The extended copy leaves its source untouched.
    field
        .unserialize(&Value::map(vec![("name", "a"), ("email", "a@example.com")]))
        .unwrap_err();

    let replaced = field
        .replace(Fields::new().field("age", Text::new()).field("other", Text::new()))
        .unwrap();
    let structure = replaced.as_structure().unwrap();
    assert_eq!(structure.get("age").unwrap().type_tag(), "text");
    assert!(!structure.contains("other"));

    Field::from(Integer::new()).extend(Fields::new()).unwrap_err();
}

#[test]
fn forward_references() {
    let undefined = Undefined::new();
    let field = Field::from(Structure::new(Fields::new().field("later", &undefined)));

    let err = field.unserialize(&Value::map(vec![("later", 1)])).unwrap_err();
    let later = err.structure().unwrap().key("later").unwrap().as_error().unwrap();
    assert_eq!(later.tokens(), vec!["undefined"]);

    undefined.define(Integer::new()).unwrap();
    let value = field.unserialize(&Value::map(vec![("later", "1")])).unwrap();
    assert_eq!(value, Value::map(vec![("later", 1)]));
    undefined.define(Text::new()).unwrap_err();
}

#[test]
fn defining_fills_every_slot() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let undefined = Undefined::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    undefined.register(move |field| {
        assert_eq!(field.type_tag(), "integer");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let sequence = Field::from(Sequence::new(&undefined));
    let tuple = Field::from(Tuple::new(vec![FieldRef::from(&undefined), FieldRef::from(Text::new())]));
    let map = Field::from(Map::new(&undefined));
    sequence.unserialize(&Value::array(vec!["1"])).unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    undefined.define(Integer::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        sequence.unserialize(&Value::array(vec!["1", "2"])).unwrap(),
        Value::array(vec![1, 2])
    );
    tuple
        .unserialize(&Value::array(vec![Value::from("3"), Value::from("x")]))
        .unwrap();
    assert_eq!(
        map.unserialize(&Value::map(vec![("a", "4")])).unwrap(),
        Value::map(vec![("a", 4)])
    );

    // Callbacks registered after definition run straight away.
    let late = Arc::clone(&calls);
    undefined.register(move |_| {
        late.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn extract() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("a", Integer::new())
            .field("b", Integer::new())
            .field(
                "tags",
                Field::from(Sequence::new(Text::new()))
                    .with_extractor(|_, subject| match subject {
                        Value::Text(t) => Value::array(t.split(',')),
                        other => other.clone(),
                    }),
            ),
    ));
    let subject = Value::map(vec![
        ("a", Value::from(1)),
        ("b", Value::Null),
        ("tags", Value::from("x,y")),
        ("ignored", Value::from(5)),
    ]);
    let value = field.extract(&subject, &ExtractOptions::default()).unwrap();
    assert_eq!(
        value,
        Value::map(vec![("a", Value::from(1)), ("tags", Value::array(vec!["x", "y"]))])
    );

    let dense = ExtractOptions {
        sparse: false,
        ..ExtractOptions::default()
    };
    assert_eq!(field.extract(&subject, &dense).unwrap().get("b"), Some(&Value::Null));

    assert_eq!(
        field.extract(&Value::from(3), &ExtractOptions::default()),
        Err(ExtractError::InvalidSubject(Value::from(3)))
    );
    let lenient = ExtractOptions {
        strict: false,
        ..ExtractOptions::default()
    };
    assert_eq!(
        field.extract(&Value::from(3), &lenient).unwrap(),
        Value::map(Vec::<(&str, Value)>::new())
    );
}

#[test]
fn extract_with_screen() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("public", Field::from(Integer::new()).with_aspect("visible", true))
            .field("secret", Field::from(Integer::new()).with_aspect("visible", false)),
    ))
    .with_aspect("visible", true);
    let mut screen = BTreeMap::new();
    screen.insert("visible".to_string(), Value::from(true));
    let options = ExtractOptions {
        screen,
        ..ExtractOptions::default()
    };
    let value = field
        .extract(&Value::map(vec![("public", 1), ("secret", 2)]), &options)
        .unwrap();
    assert_eq!(value, Value::map(vec![("public", 1)]));
}

#[test]
fn filter() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("id", Field::from(Integer::new()).with_aspect("readonly", true))
            .field("name", Text::new())
            .field(
                "children",
                Sequence::new(Structure::new(
                    Fields::new()
                        .field("id", Field::from(Integer::new()).with_aspect("readonly", true))
                        .field("name", Text::new()),
                )),
            ),
    ));
    let mut tests = BTreeMap::new();
    tests.insert("readonly".to_string(), false);
    let filtered = field.filter(false, &tests).unwrap();

    let structure = filtered.as_structure().unwrap();
    assert!(!structure.contains("id"));
    assert!(structure.contains("name"));
    filtered
        .unserialize(&Value::map(vec![(
            "children",
            Value::array(vec![Value::map(vec![("name", "x")])]),
        )]))
        .unwrap();
    filtered
        .unserialize(&Value::map(vec![(
            "children",
            Value::array(vec![Value::map(vec![("id", 1)])]),
        )]))
        .unwrap_err();
}

#[test]
fn instantiate_children_first() {
    let field = Field::from(Structure::new(Fields::new().field(
        "n",
        Field::from(Integer::new()).with_instantiator(|_, value, key| {
            assert_eq!(key, None);
            Value::Integer(value.as_integer().unwrap_or_default() * 2)
        }),
    )))
    .with_instantiator(|_, value, _| Value::array(vec![value]));

    let instance = field.instantiate(&Value::map(vec![("n", 21)]), None);
    assert_eq!(instance, Value::array(vec![Value::map(vec![("n", 42)])]));
}

#[test]
fn transform() {
    let field = person();
    let transformed = field.transform(|f| {
        if f.type_tag() == "integer" {
            Transform::Replace(Field::from(Text::new()))
        } else {
            Transform::Descend
        }
    });
    let age = transformed.as_structure().unwrap().get("age").unwrap();
    assert_eq!(age.type_tag(), "text");
    assert_eq!(age.name(), Some("age"));

    // The untransformed field keeps its integer.
    assert_eq!(field.as_structure().unwrap().get("age").unwrap().type_tag(), "integer");

    let untouched = field.transform(|_| Transform::Keep);
    assert_eq!(untouched.to_string(), field.to_string());
}

#[test]
fn screen() {
    let field = Field::from(Enumeration::new(vec!["a"]).unwrap())
        .with_name("choice")
        .with_aspect("group", "basic");
    let mut tests = BTreeMap::new();
    tests.insert("group".to_string(), Value::from("basic"));
    tests.insert("name".to_string(), Value::from("choice"));
    tests.insert("title".to_string(), Value::Null);
    assert!(field.screen(&tests));

    tests.insert("required".to_string(), Value::from(true));
    assert!(!field.screen(&tests));
}
