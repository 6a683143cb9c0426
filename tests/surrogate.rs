use chrono::NaiveDate;
use scheme::{
    register_surrogate_type, Date, Error, Field, Fields, Integer, Structure, Surrogate,
    SurrogateError, SurrogateField, SurrogateType, Text, Value,
};

fn person_v1() -> Field {
    Field::from(Structure::new(Fields::new().field("name", Text::new())))
}

fn person_v2() -> Field {
    Field::from(Structure::new(
        Fields::new().field("name", Text::new()).field("age", Integer::new()),
    ))
}

fn register_person(identity: &str) {
    register_surrogate_type(
        SurrogateType::new(identity)
            .schema(person_v1())
            .schema(person_v2()),
    );
}

#[test]
fn untyped_surrogates() {
    let surrogate = Surrogate::unserialize(&Value::map(vec![("a", 1)])).unwrap();
    assert_eq!(surrogate.identity(), scheme::surrogate::UNTYPED_IDENTITY);
    assert_eq!(surrogate.get("a"), Some(&Value::from(1)));
    assert_eq!(surrogate.version(), None);

    let wire = Surrogate::new("tests.plain", surrogate.to_map()).serialize().unwrap();
    assert_eq!(wire, Value::map(vec![("a", Value::from(1)), ("_", Value::from("tests.plain"))]));
}

#[test]
fn versioned_types() {
    register_person("tests.person.versioned");
    let subject = Value::map(vec![
        ("name", Value::from("Ann")),
        ("age", Value::from(30)),
        ("extra", Value::from(true)),
    ]);

    let latest = Surrogate::construct("tests.person.versioned", &subject, None, None).unwrap();
    assert_eq!(latest.version(), Some(2));
    assert_eq!(latest.get("extra"), None);

    let wire = latest.serialize().unwrap();
    assert_eq!(wire.get("__version__"), Some(&Value::from(2)));
    assert_eq!(wire.get("_"), Some(&Value::from("tests.person.versioned")));
    assert_eq!(Surrogate::unserialize(&wire).unwrap(), latest);

    let first = Surrogate::construct("tests.person.versioned", &subject, None, Some(1)).unwrap();
    assert_eq!(first.value().len(), 1);
    let wire = first.serialize().unwrap();
    assert_eq!(wire.get("__version__"), None);
    assert_eq!(Surrogate::unserialize(&wire).unwrap().version(), Some(1));
}

#[test]
fn converting_between_versions() {
    register_person("tests.person.converted");
    let latest = Surrogate::construct(
        "tests.person.converted",
        &Value::map(vec![("name", Value::from("Ann")), ("age", Value::from(30))]),
        None,
        None,
    )
    .unwrap();
    let first =
        Surrogate::construct("tests.person.converted", &Value::from(latest), None, Some(1)).unwrap();
    assert_eq!(first.to_map(), Value::map(vec![("name", "Ann")]).as_map().unwrap().clone());
}

#[test]
fn construction_errors() {
    register_person("tests.person.errors");
    let subject = Value::map(vec![("name", "Ann")]);

    match Surrogate::construct("tests.person.errors", &subject, None, Some(3)) {
        Err(Error::Surrogate(SurrogateError::InvalidVersion { version, .. })) => assert_eq!(version, 3),
        other => panic!("unexpected result {:?}", other),
    }
    match Surrogate::construct("tests.person.errors", &subject, Some(person_v1()), None) {
        Err(Error::Surrogate(SurrogateError::DynamicSchemaConflict(identity))) => {
            assert_eq!(identity, "tests.person.errors")
        }
        other => panic!("unexpected result {:?}", other),
    }
    match Surrogate::construct("tests.unregistered", &Value::Null, None, None) {
        Err(Error::Surrogate(SurrogateError::InvalidValue(_))) => {}
        other => panic!("unexpected result {:?}", other),
    }
    match Surrogate::construct("tests.unregistered", &Value::from(3), None, None) {
        Err(Error::Surrogate(SurrogateError::InvalidValue(_))) => {}
        other => panic!("unexpected result {:?}", other),
    }

    let wire = Value::map(vec![("_", Value::from("tests.person.errors")), ("__version__", Value::from(7))]);
    assert!(Surrogate::unserialize(&wire).is_err());
}

#[test]
fn dynamic_schemas() {
    let schema = Field::from(Structure::new(Fields::new().field("when", Date::new())));
    let day = NaiveDate::from_ymd_opt(2022, 3, 4).unwrap();
    let surrogate = Surrogate::construct(
        "tests.dynamic",
        &Value::map(vec![("when", Value::Date(day))]),
        Some(schema),
        None,
    )
    .unwrap();

    let wire = surrogate.serialize().unwrap();
    assert_eq!(wire.get("when"), Some(&Value::from("2022-03-04")));
    assert_eq!(
        wire.get("__schema__").unwrap().get("__type__"),
        Some(&Value::from("structure"))
    );

    let rebuilt = Surrogate::unserialize(&wire).unwrap();
    assert_eq!(rebuilt.get("when"), Some(&Value::Date(day)));
    assert!(rebuilt.schema().is_some());
    assert_eq!(rebuilt, surrogate);
}

#[test]
fn contributed_values() {
    register_surrogate_type(SurrogateType::new("tests.contributed").contribute(|map, version| {
        map.insert(Value::from("keys"), Value::from(map.len()));
        assert_eq!(version, None);
    }));
    let surrogate = Surrogate::construct(
        "tests.contributed",
        &Value::map(vec![("a", 1), ("b", 2)]),
        None,
        None,
    )
    .unwrap();
    assert_eq!(surrogate.get("keys"), Some(&Value::from(2)));
}

#[test]
fn surrogate_fields() {
    let field = Field::from(SurrogateField::new().surrogates(vec!["tests.field.b", "tests.field.a"]))
        .with_name("item");

    let value = field
        .unserialize(&Value::map(vec![("_", "tests.field.a"), ("x", "1")]))
        .unwrap();
    match &value {
        Value::Surrogate(s) => assert_eq!(s.identity(), "tests.field.a"),
        other => panic!("expected a surrogate, got {:?}", other),
    }
    assert_eq!(
        field.serialize(&value).unwrap(),
        Value::map(vec![("x", "1"), ("_", "tests.field.a")])
    );

    let err = field
        .unserialize(&Value::map(vec![("_", "tests.field.c")]))
        .unwrap_err();
    assert_eq!(err.tokens(), vec!["invalid-surrogate"]);
    assert_eq!(
        err.errors()[0].message,
        "item must be one of tests.field.a, tests.field.b"
    );

    field.unserialize(&Value::from("tests.field.a")).unwrap_err();
    Field::from(SurrogateField::new())
        .unserialize(&Value::map(vec![("_", "anything")]))
        .unwrap();
}

#[test]
fn surrogate_field_reports_schema_errors() {
    register_person("tests.person.field");
    let field = Field::from(SurrogateField::new());
    let err = field
        .unserialize(&Value::map(vec![
            ("_", Value::from("tests.person.field")),
            ("__version__", Value::from(2)),
            ("age", Value::from("old")),
        ]))
        .unwrap_err();
    let age = err.structure().unwrap().key("age").unwrap().as_error().unwrap();
    assert_eq!(age.tokens(), vec!["invalid"]);
}

#[test]
fn oversized_versions_are_rejected() {
    register_person("tests.person.oversized");
    let version = (1i128 << 64) + 1;
    let wire = Value::map(vec![
        ("_", Value::from("tests.person.oversized")),
        ("__version__", Value::Integer(version)),
        ("name", Value::from("Ann")),
    ]);
    match Surrogate::unserialize(&wire) {
        Err(Error::Surrogate(SurrogateError::InvalidVersion { version: v, .. })) => assert_eq!(v, version),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn surrogate_hashing() {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(surrogate: &Surrogate) -> u64 {
        let mut hasher = DefaultHasher::new();
        surrogate.hash(&mut hasher);
        hasher.finish()
    }
    let entries = |pairs: Vec<(&str, i32)>| Value::map(pairs).as_map().unwrap().clone();

    let a = Surrogate::new("tests.hashing", entries(vec![("x", 1), ("y", 2)]));
    let reordered = Surrogate::new("tests.hashing", entries(vec![("y", 2), ("x", 1)]));
    let other = Surrogate::new("tests.hashing", entries(vec![("x", 3), ("y", 4)]));
    assert_eq!(a, reordered);
    assert_eq!(hash_of(&a), hash_of(&reordered));
    assert_ne!(hash_of(&a), hash_of(&other));
    assert!(a < other);
}
