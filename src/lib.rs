//! `scheme` is a library for declaring the shape of structured data as a
//! graph of typed fields, then validating, converting and describing data
//! with it.
//!
//! A schema is built from [`Field`]s.  Every field processes a [`Value`] in
//! one of two directions: *incoming* data is unserialized from its wire form
//! and validated, *outgoing* data is validated and serialized.  Composite
//! fields ([`Sequence`], [`Map`], [`Tuple`], [`Union`], [`Structure`])
//! process their children and collect every failure, so a single error
//! reports all that is wrong with a value, mirrored into the shape of the
//! value itself.
//!
//! # Implementation Details
//!
//! - Supports JSON, YAML and CBOR encodings, controlled by the
//!   `serde_json`, `serde_yaml` and `serde_cbor` features.
//!
//! - Fields can describe themselves as plain data, and [`reconstruct`]
//!   builds an equivalent field from such a description, so schemas can be
//!   shipped between processes.
//!
//! - Schemas may refer to themselves through [`Undefined`] placeholders.
//!
//! - Processing is read-only; a finished schema can be shared between
//!   threads.
//!
//! # Examples
//!
//! This example validates JSON-encoded data:
//!
//! ```
//! # #[cfg(feature = "serde_json")]
//! # {
//! use scheme::{Field, Fields, Integer, Structure, Text};
//!
//! let person = Field::from(Structure::new(
//!     Fields::new()
//!         .field("name", Field::from(Text::new()).required(true))
//!         .field("age", Integer::new().minimum(0)),
//! ));
//!
//! let json = br#"{ "name": "Bob", "age": 43 }"#;
//! person.unserialize_from(json, "json").unwrap();
//! # }
//! ```
//!
//! If the data doesn't have the expected structure, the error says where:
//! ```
//! # #[cfg(feature = "serde_json")]
//! # {
//! use scheme::{Error, Field, Fields, Integer, Structure, Text};
//!
//! let person = Field::from(Structure::new(
//!     Fields::new()
//!         .field("name", Field::from(Text::new()).required(true))
//!         .field("age", Integer::new().minimum(0)),
//! ));
//!
//! let json = br#"{ "age": "forty three" }"#;
//! match person.unserialize_from(json, "json") {
//!     Err(Error::Structural(e)) => {
//!         let structure = e.structure().unwrap();
//!         assert_eq!(structure.key("name").unwrap().as_error().unwrap().tokens(), vec!["required"]);
//!         assert_eq!(structure.key("age").unwrap().as_error().unwrap().tokens(), vec!["invalid"]);
//!     }
//!     other => panic!("unexpected result {:?}", other),
//! }
//! # }
//! ```
//!
//! Supported field types:
//! - Scalars: `field` (any value), `boolean`, `integer`, `float`,
//!   `decimal`, `text`, `date`, `datetime`, `time`, `binary`,
//!   `enumeration`, `token`, `uuid`, `object`, `surrogate`
//! - Composites: `sequence`, `map`, `tuple`, `union`, `structure`
//!   (optionally polymorphic)

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![warn(clippy::cast_possible_truncation)]

pub mod catalog;
pub mod composite;
pub mod error;
pub mod field;
pub mod format;
pub mod object;
pub mod registry;
pub mod scalar;
pub mod structure;
pub mod supplemental;
pub mod surrogate;
pub mod undefined;
pub mod util;
pub mod value;

#[cfg(feature = "serde_cbor")]
pub mod cbor;
#[cfg(feature = "serde_json")]
pub mod json;
#[cfg(feature = "serde_yaml")]
pub mod yaml;

#[doc(inline)]
pub use catalog::FieldError;
#[doc(inline)]
pub use composite::{Map, Sequence, Tuple, Union};
#[doc(inline)]
pub use error::{ErrorEntry, ErrorKind, ErrorSlot, ErrorStructure, StructuralError};
#[doc(inline)]
pub use field::{
    DefaultValue, DescribeOptions, ExtractError, ExtractOptions, Field, FieldKind, Phase, Transform,
};
#[doc(inline)]
pub use format::{lookup_format, register_format, Format, FormatError};
#[doc(inline)]
pub use object::{lookup_object, register_object, ObjectRef};
#[doc(inline)]
pub use registry::{reconstruct, register_field_type, Parameters};
#[doc(inline)]
pub use scalar::{
    Any, Binary, Boolean, Date, DateTime, Decimal, Enumeration, Float, Integer, Limit, Object, Text,
    Time, Token, Uuid,
};
#[doc(inline)]
pub use structure::{Fields, KeyOrder, Structure, Variants};
#[doc(inline)]
pub use surrogate::{register_surrogate_type, Surrogate, SurrogateError, SurrogateField, SurrogateType};
#[doc(inline)]
pub use undefined::{FieldRef, Undefined};
#[doc(inline)]
pub use util::{Error, ProcessResult, SchemeError};
#[doc(inline)]
pub use value::{Value, ValueMap};
