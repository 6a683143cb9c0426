use ntest::timeout;
use scheme::{Field, Fields, SchemeError, Sequence, Structure, Text, Undefined, Value};

fn tree() -> Field {
    let node = Undefined::new();
    let field = Field::from(Structure::new(
        Fields::new()
            .field("label", Field::from(Text::new()).required(true))
            .field("children", Sequence::new(&node)),
    ))
    .with_name("node");
    node.define(field.clone()).unwrap();
    field
}

fn nested(depth: usize) -> Value {
    let mut value = Value::map(vec![("label", "leaf")]);
    for i in 0..depth {
        value = Value::map(vec![
            ("label", Value::from(format!("level {}", i))),
            ("children", Value::array(vec![value])),
        ]);
    }
    value
}

#[test]
#[timeout(5000)] // 5 seconds
fn test_recursion() {
    let field = tree();
    field.unserialize(&nested(64)).unwrap();

    let mut broken = nested(8);
    if let Value::Map(entries) = &mut broken {
        entries.shift_remove(&Value::from("label"));
    }
    field.unserialize(&broken).unwrap_err();
}

#[test]
#[timeout(5000)]
fn recursive_description() {
    let field = tree();
    match field.describe() {
        Err(SchemeError::Undescribable(_)) => {}
        other => panic!("expected an undescribable field, got {:?}", other),
    }
    // Display doesn't follow the forward reference.
    assert!(field.to_string().starts_with("Structure("));
    assert!(format!("{:?}", field).contains("Undefined(defined: node)"));
}

#[test]
#[timeout(5000)]
fn recursive_transform() {
    let field = tree();
    let transformed = field.transform(|f| match f.name() {
        Some("label") => scheme::Transform::Replace(Field::from(Text::new().max_length(3))),
        _ => scheme::Transform::Descend,
    });
    transformed
        .unserialize(&Value::map(vec![("label", "abc")]))
        .unwrap();
    transformed
        .unserialize(&Value::map(vec![("label", "abcd")]))
        .unwrap_err();
}
