use scheme::{Error, Field, Fields, Integer, SchemeError, Structure, Text, Value};

#[test]
fn error_traits() {
    let field = Field::from(Integer::new()).with_name("count");
    let err = field.unserialize(&Value::from("many")).unwrap_err();

    // It would be unfriendly to not support Send + Sync + Unpin.
    // Error types should also support Error, Display, and Debug.
    fn has_traits1<T: Sized + Send + Sync + Unpin>(_: &T) {}
    fn has_traits2<T: std::error::Error + std::fmt::Display + std::fmt::Debug>(_: &T) {}

    has_traits1(&err);
    has_traits2(&err);

    assert_eq!(
        format!("{}", err),
        "validation failed\n[01] Invalid value error at count: count must be an integer\n     \
         Field: Integer(name=\"count\")\n     Value: \"many\""
    );

    let err = Error::from(err);
    has_traits1(&err);
    has_traits2(&err);

    let err = Error::from(SchemeError::UnknownType("widget".into()));
    has_traits1(&err);
    has_traits2(&err);
}

#[test]
fn formatted_report() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field("name", Field::from(Text::new()).required(true))
            .field("age", Integer::new()),
    ))
    .with_name("person");
    let err = field
        .unserialize(&Value::map(vec![("age", "old")]))
        .unwrap_err();

    let report = err.format_errors();
    assert_eq!(report.len(), 2);
    assert!(report[0].starts_with("[01] Required field error at person: person is missing required field 'name'"));
    assert!(report[1].starts_with("[02] Invalid value error at person.age: age must be an integer"));
}

#[test]
fn wire_form() {
    let field = Field::from(Integer::new()).with_name("n");
    let err = field.unserialize(&Value::from("x")).unwrap_err();
    let wire = err.serialize();
    assert_eq!(
        wire,
        Value::array(vec![
            Value::array(vec![Value::map(vec![
                ("token", "invalid"),
                ("title", "invalid value"),
                ("message", "n must be an integer"),
            ])]),
            Value::Null,
        ])
    );

    let rebuilt = scheme::StructuralError::unserialize(&wire).unwrap();
    assert_eq!(rebuilt.tokens(), vec!["invalid"]);
    assert!(rebuilt.is_substantive());
    assert!(scheme::StructuralError::unserialize(&Value::from(1)).is_none());
}
