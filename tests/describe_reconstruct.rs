use chrono::NaiveDate;
use regex::Regex;
use scheme::{
    reconstruct, register_field_type, Date, DescribeOptions, Enumeration, Field, Fields, Integer,
    KeyOrder, Map, Parameters, SchemeError, Sequence, Structure, Text, Token, Tuple, Union, Value,
    Variants,
};

fn round_trip(field: &Field) -> Field {
    let description = field.describe().unwrap();
    let rebuilt = reconstruct(&description).unwrap();
    assert_eq!(rebuilt.describe().unwrap(), description);
    rebuilt
}

#[test]
fn describe_scalar() {
    let field = Field::from(Integer::new().minimum(0))
        .with_name("count")
        .with_description("how many")
        .required(true)
        .with_default(3);
    assert_eq!(
        field.describe().unwrap(),
        Value::map(vec![
            ("__type__", Value::from("integer")),
            ("name", Value::from("count")),
            ("description", Value::from("how many")),
            ("required", Value::from(true)),
            ("default", Value::from(3)),
            ("minimum", Value::from(0)),
        ])
    );
    let rebuilt = round_trip(&field);
    assert_eq!(rebuilt.get_default(), Some(Value::Integer(3)));
    assert!(rebuilt.is_required());
}

#[test]
fn verbose_and_extra_parameters() {
    let field = Field::from(Text::new()).with_aspect("widget", "textarea");
    let terse = field.describe().unwrap();
    assert_eq!(terse.get("strip"), None);
    assert_eq!(terse.get("widget"), Some(&Value::from("textarea")));

    let options = DescribeOptions {
        verbose: true,
        parameters: vec!["structural".into()],
    };
    let verbose = field.describe_with(&options).unwrap();
    assert_eq!(verbose.get("strip"), Some(&Value::from(true)));
    assert_eq!(verbose.get("nonnull"), Some(&Value::from(false)));
    assert_eq!(verbose.get("structural"), Some(&Value::from(false)));
}

#[test]
fn dates_travel_in_wire_form() {
    let field = Field::from(Date::new().minimum(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()))
        .with_default(NaiveDate::from_ymd_opt(2020, 5, 17).unwrap());
    let description = field.describe().unwrap();
    assert_eq!(description.get("default"), Some(&Value::from("2020-05-17")));
    assert_eq!(description.get("minimum"), Some(&Value::from("2000-01-01")));

    let rebuilt = round_trip(&field);
    assert_eq!(
        rebuilt.get_default(),
        Some(Value::Date(NaiveDate::from_ymd_opt(2020, 5, 17).unwrap()))
    );
    rebuilt.unserialize(&"1999-01-01".into()).unwrap_err();
}

#[test]
fn composites() {
    let field = Field::from(Structure::new(
        Fields::new()
            .field(
                "code",
                Text::new().pattern(Regex::new("[a-z]+").unwrap()).max_length(8),
            )
            .field("tags", Sequence::new(Token::new()).unique(true))
            .field("scores", Map::new(Integer::new()).required_keys(vec!["total"]))
            .field(
                "pair",
                Tuple::new(vec![Field::from(Integer::new()), Field::from(Text::new())]),
            )
            .field(
                "either",
                Union::new(vec![Field::from(Integer::new()), Field::from(Text::new())]).unwrap(),
            )
            .field(
                "color",
                Enumeration::new(vec!["red", "green"])
                    .unwrap()
                    .ignored_values(vec![""])
                    .unwrap(),
            ),
    ))
    .with_name("record");
    let rebuilt = round_trip(&field);

    let value = Value::map(vec![
        ("code", Value::from("abc")),
        ("tags", Value::array(vec!["a:b"])),
        ("scores", Value::map(vec![("total", "3")])),
        ("pair", Value::array(vec![Value::from(1), Value::from("x")])),
        ("either", Value::from("y")),
        ("color", Value::from("")),
    ]);
    assert_eq!(rebuilt.unserialize(&value).unwrap(), field.unserialize(&value).unwrap());
}

#[test]
fn structure_options() {
    let field = Field::from(
        Structure::new(Fields::new().field("a", Integer::new()).field("b", Integer::new()))
            .strict(false)
            .key_order(KeyOrder::Fixed(vec!["b".into()])),
    );
    let description = field.describe().unwrap();
    assert_eq!(description.get("strict"), Some(&Value::from(false)));
    assert_eq!(description.get("key_order"), Some(&Value::array(vec!["b"])));

    let rebuilt = round_trip(&field);
    let structure = rebuilt.as_structure().unwrap();
    assert!(!structure.is_strict());
    assert_eq!(structure.order(), Some(&KeyOrder::Fixed(vec!["b".into()])));
}

#[test]
fn polymorphic_structures() {
    let variants = Variants::new()
        .variant("cat", Fields::new().field("lives", Integer::new()))
        .variant("dog", Fields::new().field("breed", Text::new()));
    let field = Field::from(Structure::polymorphic_named("species", variants).unwrap());

    let description = field.describe().unwrap();
    let cat = description.get("structure").unwrap().get("cat").unwrap();
    // The injected discriminator isn't part of the variant description.
    assert_eq!(cat.get("species"), None);
    assert_eq!(
        description.get("polymorphic_on").unwrap().get("name"),
        Some(&Value::from("species"))
    );

    let rebuilt = round_trip(&field);
    let value = rebuilt
        .unserialize(&Value::map(vec![("species", "dog"), ("breed", "collie")]))
        .unwrap();
    assert_eq!(value.get("breed"), Some(&Value::from("collie")));
    rebuilt
        .unserialize(&Value::map(vec![("species", "dog"), ("lives", "9")]))
        .unwrap_err();
}

#[test]
fn legacy_type_key() {
    let field = reconstruct(&Value::map(vec![("fieldtype", "boolean"), ("name", "flag")])).unwrap();
    assert_eq!(field.type_tag(), "boolean");
    assert_eq!(field.name(), Some("flag"));
}

#[test]
fn reconstruct_failures() {
    assert!(matches!(
        reconstruct(&Value::from("integer")),
        Err(SchemeError::NotADescription(_))
    ));
    assert!(matches!(
        reconstruct(&Value::map(vec![("name", "x")])),
        Err(SchemeError::NotADescription(_))
    ));
    assert!(matches!(
        reconstruct(&Value::map(vec![("__type__", "widget")])),
        Err(SchemeError::UnknownType(_))
    ));
    assert!(matches!(
        reconstruct(&Value::map(vec![("__type__", "integer"), ("minimum", "zero")])),
        Err(SchemeError::InvalidParameter { .. })
    ));
    assert!(matches!(
        reconstruct(&Value::map(vec![("__type__", "sequence")])),
        Err(SchemeError::InvalidParameter { .. })
    ));
}

fn construct_percentage(params: &mut Parameters) -> Result<Field, SchemeError> {
    let integer = Integer::new().minimum(0).maximum(100);
    let _ = params.take("minimum");
    let _ = params.take("maximum");
    Ok(Field::from(integer))
}

#[test]
fn custom_field_types() {
    register_field_type("percentage", construct_percentage);
    let field = reconstruct(&Value::map(vec![
        ("__type__", Value::from("percentage")),
        ("unit", Value::from("%")),
    ]))
    .unwrap();
    field.unserialize(&Value::from(50)).unwrap();
    field.unserialize(&Value::from(101)).unwrap_err();
    assert_eq!(field.attribute("unit"), Some(Value::from("%")));
}
