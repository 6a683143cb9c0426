#![cfg(feature = "serde_json")]

use chrono::NaiveDate;
use scheme::{Binary, Date, Error, Field, Fields, FormatError, Integer, Sequence, Structure, Text, Value};
use serde::{Deserialize, Serialize};

fn event() -> Field {
    Field::from(Structure::new(
        Fields::new()
            .field("title", Field::from(Text::new()).required(true))
            .field("day", Date::new())
            .field("attendees", Sequence::new(Text::new()))
            .field("capacity", Integer::new().minimum(1)),
    ))
    .with_name("event")
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Event {
    title: String,
    day: String,
    attendees: Vec<String>,
    capacity: u32,
}

#[test]
fn unserialize_from_json() {
    let source = Event {
        title: "Launch".into(),
        day: "2021-06-01".into(),
        attendees: vec!["ann".into(), "bob".into()],
        capacity: 10,
    };
    let json = serde_json::to_vec(&source).unwrap();

    let value = event().unserialize_from(&json, "json").unwrap();
    assert_eq!(
        value.get("day"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()))
    );

    let encoded = event().serialize_as(&value, "application/json").unwrap();
    let round_trip: Event = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(round_trip, source);
}

#[test]
fn json_validation_errors() {
    let json = br#"{ "title": "Launch", "capacity": 0, "attendees": ["ann", 3] }"#;
    match event().unserialize_from(json, "json") {
        Err(Error::Structural(e)) => {
            let structure = e.structure().unwrap();
            let capacity = structure.key("capacity").unwrap().as_error().unwrap();
            assert_eq!(capacity.tokens(), vec!["minimum"]);
            let attendees = structure.key("attendees").unwrap().as_error().unwrap();
            assert!(attendees.structure().unwrap().index(1).unwrap().as_error().is_some());
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn malformed_and_unknown_formats() {
    match event().unserialize_from(b"{ not json", "json") {
        Err(Error::Format(FormatError::Decode(_))) => {}
        other => panic!("unexpected result {:?}", other),
    }
    match event().unserialize_from(b"{}", "toml") {
        Err(Error::Format(FormatError::UnknownFormat(name))) => assert_eq!(name, "toml"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn binary_travels_as_base64() {
    let field = Field::from(Structure::new(Fields::new().field("data", Binary::new())));
    let value = Value::map(vec![("data", Value::Bytes(vec![0, 1, 255]))]);
    let encoded = field.serialize_as(&value, "json").unwrap();
    assert_eq!(encoded, br#"{"data":"AAH_"}"#.to_vec());
    assert_eq!(field.unserialize_from(&encoded, "json").unwrap(), value);
}

#[test]
fn read_and_write_files() {
    let path = std::env::temp_dir().join(format!("scheme-event-{}.json", std::process::id()));
    let value = Value::map(vec![
        ("title", Value::from("Launch")),
        ("day", Value::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())),
    ]);

    event().write(&path, &value, None).unwrap();
    let read = event().read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(read, value);

    match event().read(&path) {
        Err(Error::Format(FormatError::Io(_))) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[cfg(feature = "serde_yaml")]
#[test]
fn yaml_file_by_extension() {
    let path = std::env::temp_dir().join(format!("scheme-event-{}.yml", std::process::id()));
    let value = Value::map(vec![("title", "Launch")]);
    event().write(&path, &value, None).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let read = event().read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(text, "title: Launch\n");
    assert_eq!(read, value);
}

#[cfg(feature = "serde_cbor")]
#[test]
fn cbor_keeps_integers_and_text() {
    let value = Value::map(vec![("title", Value::from("Launch")), ("capacity", Value::from(5))]);
    let encoded = event().serialize_as(&value, "cbor").unwrap();
    assert_eq!(event().unserialize_from(&encoded, "cbor").unwrap(), value);
}
