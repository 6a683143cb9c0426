use scheme::{
    ErrorKind, Field, Fields, Integer, Map, Sequence, Structure, Text, Tuple, Union, Value,
};

fn numbers() -> Field {
    Field::from(Sequence::new(Integer::new().minimum(0))).with_name("numbers")
}

#[test]
fn sequence() {
    let field = numbers();
    let value = field
        .unserialize(&Value::array(vec![Value::from("1"), Value::from(2)]))
        .unwrap();
    assert_eq!(value, Value::array(vec![1, 2]));

    field.unserialize(&Value::from("1, 2")).unwrap_err();
}

#[test]
fn sequence_collects_every_failure() {
    let field = numbers();
    let err = field
        .unserialize(&Value::array(vec![Value::from(1), Value::from(-1), Value::from("x")]))
        .unwrap_err();
    assert!(err.errors().is_empty());

    let structure = err.structure().unwrap();
    assert_eq!(structure.len(), 3);
    assert_eq!(structure.index(0).unwrap().as_value(), Some(&Value::Integer(1)));

    let negative = structure.index(1).unwrap().as_error().unwrap();
    assert_eq!(negative.tokens(), vec!["minimum"]);
    assert_eq!(negative.identity(), &["numbers".to_string(), "[1]".to_string()]);

    let text = structure.index(2).unwrap().as_error().unwrap();
    assert_eq!(text.tokens(), vec!["invalid"]);

    assert_eq!(err.format_errors().len(), 2);
}

#[test]
fn sequence_constraints() {
    let field = Field::from(Sequence::new(Integer::new()).min_length(1).max_length(2).unique(true));
    let err = field.unserialize(&Value::array(Vec::<Value>::new())).unwrap_err();
    assert_eq!(err.tokens(), vec!["min_length"]);

    let err = field.unserialize(&Value::array(vec![1, 2, 3])).unwrap_err();
    assert_eq!(err.tokens(), vec!["max_length"]);

    let err = field.unserialize(&Value::array(vec![Value::from(1), Value::from("1")])).unwrap_err();
    assert_eq!(err.tokens(), vec!["duplicate"]);
}

#[test]
fn map() {
    let field = Field::from(Map::new(Integer::new()).required_keys(vec!["a"]));
    let value = field.unserialize(&Value::map(vec![("a", "1"), ("b", "2")])).unwrap();
    assert_eq!(value, Value::map(vec![("a", 1), ("b", 2)]));

    let err = field.unserialize(&Value::map(vec![("b", "x")])).unwrap_err();
    let structure = err.structure().unwrap();
    assert_eq!(structure.key("b").unwrap().as_error().unwrap().tokens(), vec!["invalid"]);
    assert_eq!(structure.key("a").unwrap().as_error().unwrap().tokens(), vec!["required"]);
}

#[test]
fn map_keys() {
    let plain = Field::from(Map::new(Text::new()));
    let err = plain
        .unserialize(&Value::map(vec![(Value::from(1), Value::from("one"))]))
        .unwrap_err();
    assert_eq!(err.tokens(), vec!["invalidkeys"]);

    let keyed = Field::from(Map::new(Text::new()).key(Integer::new()));
    let value = keyed
        .unserialize(&Value::map(vec![(Value::from("1"), Value::from("one"))]))
        .unwrap();
    assert_eq!(value, Value::map(vec![(Value::from(1), Value::from("one"))]));
}

#[test]
fn tuple() {
    let field = Field::from(Tuple::new(vec![Field::from(Text::new()), Field::from(Integer::new())]));
    let value = field
        .unserialize(&Value::array(vec![Value::from("a"), Value::from("2")]))
        .unwrap();
    assert_eq!(value, Value::array(vec![Value::from("a"), Value::from(2)]));

    let err = field.unserialize(&Value::array(vec!["a"])).unwrap_err();
    assert_eq!(err.tokens(), vec!["length"]);

    let err = field
        .unserialize(&Value::array(vec![Value::from(1), Value::from(2)]))
        .unwrap_err();
    let first = err.structure().unwrap().index(0).unwrap().as_error().unwrap();
    assert_eq!(first.tokens(), vec!["invalid"]);
}

#[test]
fn union_tries_candidates_in_order() {
    let field = Field::from(
        Union::new(vec![
            Field::from(Integer::new().maximum(10)),
            Field::from(Text::new()),
        ])
        .unwrap(),
    );
    assert_eq!(field.unserialize(&Value::from(3)).unwrap(), Value::Integer(3));
    assert_eq!(field.unserialize(&Value::from("x")).unwrap(), Value::from("x"));

    // A constraint failure ends the search.
    let err = field.unserialize(&Value::from(11)).unwrap_err();
    assert_eq!(err.tokens(), vec!["maximum"]);

    let err = field.unserialize(&Value::from(true)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidType);

    Union::new(Vec::<Field>::new()).unwrap_err();
}

#[test]
fn nested_error_serialization() {
    let field = Field::from(Structure::new(
        Fields::new().field("items", Sequence::new(Integer::new())),
    ));
    let err = field
        .unserialize(&Value::map(vec![(
            "items",
            Value::array(vec![Value::from(1), Value::from("x")]),
        )]))
        .unwrap_err();

    let wire = err.serialize();
    let rebuilt = scheme::StructuralError::unserialize(&wire).unwrap();
    let items = rebuilt.structure().unwrap().key("items").unwrap().as_error().unwrap();
    let item = items.structure().unwrap().index(1).unwrap().as_error().unwrap();
    assert_eq!(item.tokens(), vec!["invalid"]);
    assert_eq!(items.structure().unwrap().index(0).unwrap().as_value(), Some(&Value::Null));
}
