use scheme::supplemental::{email, extended_email, url};
use scheme::Value;

#[test]
fn single_email() {
    let field = email(false).with_name("email");
    assert_eq!(
        field.unserialize(&" Alpha@Example.COM; ".into()).unwrap(),
        Value::from("alpha@example.com")
    );
    field.unserialize(&"first.last+tag@mail.example.org".into()).unwrap();

    let err = field.unserialize(&"alpha at example".into()).unwrap_err();
    assert_eq!(err.tokens(), vec!["pattern"]);
    assert_eq!(err.errors()[0].message, "email must be a valid email address");

    field
        .unserialize(&"alpha@example.com, beta@example.com".into())
        .unwrap_err();
}

#[test]
fn multiple_emails() {
    let field = email(true);
    assert_eq!(
        field
            .unserialize(&"a@example.com; B@example.com  c@example.com,".into())
            .unwrap(),
        Value::from("a@example.com,b@example.com,c@example.com")
    );
    field.unserialize(&"a@example.com; nobody".into()).unwrap_err();
}

#[test]
fn extended_emails() {
    let field = extended_email();
    for good in &[
        r#""Alpha" <alpha@example.com>"#,
        "Alpha Beta <alpha@example.com>",
        "alpha@example.com",
    ] {
        field.unserialize(&Value::from(*good)).unwrap();
    }
    field.unserialize(&"Alpha <not-an-address>".into()).unwrap_err();
}

#[test]
fn urls() {
    let field = url();
    for good in &[
        "http://example.com",
        "https://www.example.com/path?query=1",
        "localhost:8000",
        "ftp://192.168.0.1/file",
    ] {
        field.unserialize(&Value::from(*good)).unwrap();
    }
    for bad in &["not a url", "http://", "http://example.com/with space"] {
        field.unserialize(&Value::from(*bad)).unwrap_err();
    }
}
