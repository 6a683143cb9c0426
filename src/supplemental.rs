//! Ready-made text fields for email addresses and URLs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::FieldError;
use crate::field::Field;
use crate::scalar::Text;
use crate::util::fixed_regex;
use crate::value::Value;

const EMAIL_EXPR: &str = concat!(
    r#"([-!#$%&'*+/=?^_`{}|~0-9a-zA-Z]+(\.[-!#$%&'*+/=?^_`{}|~0-9a-zA-Z]+)*"#,
    r#"|"([\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*""#,
    r#")@([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,6}"#,
);

static EMAIL_ADDRESS: Lazy<Regex> = Lazy::new(|| fixed_regex(&format!("^({})?$", EMAIL_EXPR)));

static EXTENDED_EMAIL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    fixed_regex(&format!(
        r#"^(("[^"]+"[ ]+<{0}>)|([^<]+[ ]+<{0}>)|({0}))?$"#,
        EMAIL_EXPR
    ))
});

static EMAIL_LIST: Lazy<Regex> = Lazy::new(|| fixed_regex(&format!("^({0}(,{0})*)?$", EMAIL_EXPR)));

static SEPARATOR: Lazy<Regex> = Lazy::new(|| fixed_regex(r"[\s,;:]+"));

static URL: Lazy<Regex> = Lazy::new(|| {
    fixed_regex(concat!(
        r"(?i)^(?:([^:]+)://)?",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
        r"localhost|",
        r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$",
    ))
});

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == ';' || c == ':'
}

fn plain_text(pattern: &Regex) -> Text {
    Text::new()
        .pattern(pattern.clone())
        .strip(false)
        .escape_html_entities(false)
}

/// A text field for an email address, or with `multiple` for a list of
/// them separated by whitespace, commas, semicolons or colons.
///
/// Values are lower-cased and stray separators are trimmed; a list is
/// normalized to comma-separated form.
pub fn email(multiple: bool) -> Field {
    let (pattern, message) = if multiple {
        (&*EMAIL_LIST, "{field} must be a list of valid email addresses")
    } else {
        (&*EMAIL_ADDRESS, "{field} must be a valid email address")
    };
    Field::from(plain_text(pattern))
        .with_error(FieldError::new("pattern", "invalid value", message))
        .with_preprocessor(move |value| match value {
            Value::Text(text) => {
                let text = text.trim_matches(is_separator).to_lowercase();
                if multiple {
                    Value::Text(SEPARATOR.replace_all(&text, ",").into_owned())
                } else {
                    Value::Text(text)
                }
            }
            other => other,
        })
}

/// A text field for an email address that may carry a display name, as in
/// `"Alpha" <alpha@example.com>`.  Values are not normalized.
pub fn extended_email() -> Field {
    Field::from(plain_text(&EXTENDED_EMAIL_ADDRESS)).with_error(FieldError::new(
        "pattern",
        "invalid value",
        "{field} must be a valid email address",
    ))
}

/// A text field for URLs.
pub fn url() -> Field {
    Field::from(plain_text(&URL)).with_error(FieldError::new(
        "pattern",
        "invalid value",
        "{field} must be a valid URL",
    ))
}
