//! Named host objects.
//!
//! The `object` field carries references to values owned by the host
//! program.  On the wire they travel as their registered name.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use log::debug;
use once_cell::sync::Lazy;

/// A reference to a registered host object.
#[derive(Clone)]
pub struct ObjectRef {
    name: String,
    object: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// The name this object was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the object as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.name)
    }
}

// Names are unique within the registry, so they stand in for identity.
impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ObjectRef {}

impl Ord for ObjectRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl PartialOrd for ObjectRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

static OBJECTS: Lazy<RwLock<HashMap<String, ObjectRef>>> = Lazy::new(Default::default);

/// Register `object` under `name`, replacing any previous registration.
pub fn register_object<N, T>(name: N, object: T) -> ObjectRef
where
    N: Into<String>,
    T: Any + Send + Sync,
{
    let reference = ObjectRef {
        name: name.into(),
        object: Arc::new(object),
    };
    debug!("registering object {}", reference.name);
    let mut objects = match OBJECTS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    objects.insert(reference.name.clone(), reference.clone());
    reference
}

/// Find a registered object by name.
pub fn lookup_object(name: &str) -> Option<ObjectRef> {
    let objects = match OBJECTS.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    objects.get(name).cloned()
}
