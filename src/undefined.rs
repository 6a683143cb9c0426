//! Forward references, for schemas that refer to themselves or to fields
//! that are built later.
//!
//! An [`Undefined`] is a shared placeholder.  Composite fields built from it
//! hold a [`FieldRef::Deferred`] slot, and register a callback that fills
//! the slot when [`Undefined::define`] is called.  All `define` calls must happen before
//! the schema is shared between threads.

use std::fmt;
use std::sync::{Arc, Mutex};

use log::debug;
use once_cell::sync::OnceCell;

use crate::field::Field;
use crate::util::SchemeError;

type Callback = Box<dyn FnOnce(&Field) + Send>;

struct Slot {
    field: OnceCell<Field>,
    callbacks: Mutex<Vec<Callback>>,
}

/// A field that can be defined at a later time.
#[derive(Clone)]
pub struct Undefined {
    slot: Arc<Slot>,
}

impl Undefined {
    /// Create a pending placeholder.
    pub fn new() -> Undefined {
        Undefined {
            slot: Arc::new(Slot {
                field: OnceCell::new(),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a placeholder that is already defined.
    pub fn with<F: Into<Field>>(field: F) -> Undefined {
        let undefined = Undefined::new();
        // A fresh cell can't already be set.
        let _ = undefined.slot.field.set(field.into());
        undefined
    }

    /// The field, once defined.
    pub fn field(&self) -> Option<&Field> {
        self.slot.field.get()
    }

    /// Returns `true` once `define` has been called.
    pub fn is_defined(&self) -> bool {
        self.slot.field.get().is_some()
    }

    /// Resolve this placeholder, then run every registered callback.
    ///
    /// A placeholder can only be defined once.
    pub fn define<F: Into<Field>>(&self, field: F) -> Result<(), SchemeError> {
        self.slot
            .field
            .set(field.into())
            .map_err(|_| SchemeError::AlreadyDefined)?;
        let field = match self.slot.field.get() {
            Some(field) => field,
            None => return Err(SchemeError::AlreadyDefined),
        };
        debug!("defined forward reference as {}", field.guaranteed_name());

        let callbacks: Vec<Callback> = {
            let mut pending = match self.slot.callbacks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            pending.drain(..).collect()
        };
        for callback in callbacks {
            callback(field);
        }
        Ok(())
    }

    /// Run `callback` when this placeholder is defined, or immediately if it
    /// already is.
    pub fn register<F>(&self, callback: F)
    where
        F: FnOnce(&Field) + Send + 'static,
    {
        let mut pending = match self.slot.callbacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.slot.field.get() {
            Some(field) => {
                drop(pending);
                callback(field);
            }
            None => pending.push(Box::new(callback)),
        }
    }

    // Identifies the shared slot, so recursive walks can spot cycles.
    pub(crate) fn slot_id(&self) -> usize {
        Arc::as_ptr(&self.slot) as *const () as usize
    }
}

impl Default for Undefined {
    fn default() -> Self {
        Undefined::new()
    }
}

impl fmt::Debug for Undefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field() {
            Some(field) => write!(f, "Undefined(defined: {})", field.guaranteed_name()),
            None => write!(f, "Undefined(pending)"),
        }
    }
}

/// A child slot in a composite field.
#[derive(Clone)]
pub enum FieldRef {
    /// An ordinary field.
    Defined(Box<Field>),
    /// A field that is resolved through an [`Undefined`].
    Deferred {
        /// The shared placeholder.
        undefined: Undefined,
        /// The name the resolved field takes in its parent, if any.
        name: Option<String>,
        /// Filled by a callback registered with the placeholder.
        resolved: Arc<OnceCell<Box<Field>>>,
    },
}

impl FieldRef {
    // A slot that the placeholder fills in when it's defined.
    fn deferred(undefined: Undefined, name: Option<String>) -> FieldRef {
        let resolved = Arc::new(OnceCell::new());
        let cell = Arc::clone(&resolved);
        let rename = name.clone();
        undefined.register(move |field| {
            let field = match rename {
                Some(name) if field.name() != Some(name.as_str()) => field.clone().with_name(name),
                _ => field.clone(),
            };
            let _ = cell.set(Box::new(field));
        });
        FieldRef::Deferred {
            undefined,
            name,
            resolved,
        }
    }

    /// The field in this slot, if it's available.
    pub fn resolve(&self) -> Option<&Field> {
        match self {
            FieldRef::Defined(field) => Some(field),
            FieldRef::Deferred { resolved, .. } => resolved.get().map(|field| &**field),
        }
    }

    /// Give the field in this slot a name, unless it already has one.
    pub(crate) fn named(self, key: &str) -> FieldRef {
        match self {
            FieldRef::Defined(field) if field.name().is_none() => {
                FieldRef::Defined(Box::new(field.with_name(key)))
            }
            FieldRef::Deferred { undefined, .. } => FieldRef::deferred(undefined, Some(key.to_string())),
            other => other,
        }
    }

    /// Force a name onto the field in this slot.
    pub(crate) fn renamed(self, key: &str) -> FieldRef {
        match self {
            FieldRef::Defined(field) => FieldRef::Defined(Box::new(field.with_name(key))),
            deferred => deferred.named(key),
        }
    }

    pub(crate) fn slot_id(&self) -> Option<usize> {
        match self {
            FieldRef::Defined(_) => None,
            FieldRef::Deferred { undefined, .. } => Some(undefined.slot_id()),
        }
    }
}

// Deferred slots may lead back to their parent, so only the placeholder
// is shown.
impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Defined(field) => field.fmt(f),
            FieldRef::Deferred { undefined, name, .. } => f
                .debug_struct("Deferred")
                .field("undefined", undefined)
                .field("name", name)
                .finish(),
        }
    }
}

impl From<Field> for FieldRef {
    fn from(field: Field) -> FieldRef {
        FieldRef::Defined(Box::new(field))
    }
}

impl From<&Undefined> for FieldRef {
    fn from(undefined: &Undefined) -> FieldRef {
        match undefined.field() {
            Some(field) => FieldRef::Defined(Box::new(field.clone())),
            None => FieldRef::deferred(undefined.clone(), None),
        }
    }
}

impl From<Undefined> for FieldRef {
    fn from(undefined: Undefined) -> FieldRef {
        FieldRef::from(&undefined)
    }
}
