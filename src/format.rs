//! Wire formats.
//!
//! A [`Format`] converts natively serializable [`Value`]s to and from
//! bytes.  Formats are registered in a process-wide table and looked up by
//! name (`"json"`), mimetype (`"application/json"`) or extension
//! (`".json"`).  The built-in codecs are registered when the table is first
//! used, each behind the Cargo feature of the crate it wraps.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, RwLock};

use log::debug;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::value::Value;

/// A failure while encoding, decoding, or moving encoded data around.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum FormatError {
    /// No registered format matches this name, mimetype or extension.
    #[error("unknown format '{0}'")]
    UnknownFormat(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The value could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(String),
    /// The data could not be decoded.
    #[error("decoding failed: {0}")]
    Decode(String),
    /// The value contains something this format can't carry.
    #[error("{0} values are not serializable in this format")]
    NotSerializable(&'static str),
}

/// A codec between [`Value`]s and bytes.
pub trait Format: Send + Sync {
    /// The short name, e.g. `"json"`.
    fn name(&self) -> &'static str;

    /// The mimetype, e.g. `"application/json"`.
    fn mimetype(&self) -> &'static str;

    /// File extensions, each with its leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Encode a value.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, FormatError>;

    /// Decode a value.
    fn unserialize(&self, data: &[u8]) -> Result<Value, FormatError>;
}

static FORMATS: Lazy<RwLock<Vec<Arc<dyn Format>>>> = Lazy::new(|| RwLock::new(builtin_formats()));

#[allow(unused_mut)]
fn builtin_formats() -> Vec<Arc<dyn Format>> {
    let mut formats: Vec<Arc<dyn Format>> = Vec::new();
    #[cfg(feature = "serde_json")]
    formats.push(Arc::new(crate::json::Json));
    #[cfg(feature = "serde_yaml")]
    formats.push(Arc::new(crate::yaml::Yaml));
    #[cfg(feature = "serde_cbor")]
    formats.push(Arc::new(crate::cbor::Cbor));
    formats
}

/// Register a format.  Later registrations win lookups over earlier ones.
pub fn register_format<F: Format + 'static>(format: F) {
    debug!("registering format {}", format.name());
    let mut formats = match FORMATS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    formats.insert(0, Arc::new(format));
}

/// Find a format by name, mimetype, or extension (with its leading dot).
pub fn lookup_format(key: &str) -> Result<Arc<dyn Format>, FormatError> {
    let formats = match FORMATS.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    formats
        .iter()
        .find(|f| f.name() == key || f.mimetype() == key || f.extensions().contains(&key))
        .cloned()
        .ok_or_else(|| FormatError::UnknownFormat(key.to_string()))
}

fn format_for_path(path: &Path) -> Result<Arc<dyn Format>, FormatError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(extension) => lookup_format(&format!(".{}", extension)),
        None => Err(FormatError::UnknownFormat(path.display().to_string())),
    }
}

/// Read and decode a file, choosing the format by its extension.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Value, FormatError> {
    let path = path.as_ref();
    let format = format_for_path(path)?;
    let data = fs::read(path)?;
    format.unserialize(&data)
}

/// Encode and write a file, using the named format or else the format
/// matching the file's extension.
pub fn write<P: AsRef<Path>>(path: P, value: &Value, format: Option<&str>) -> Result<(), FormatError> {
    let path = path.as_ref();
    let format = match format {
        Some(key) => lookup_format(key)?,
        None => format_for_path(path)?,
    };
    let data = format.serialize(value)?;
    fs::write(path, data)?;
    Ok(())
}
