use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{LinealError, Result};
use crate::object::{Object, ObjectRef};
use crate::value::OtherHasher;

// ------------- Descendants -------------
// Everything registered under one type name.
#[derive(Debug, Clone, Default)]
struct Descendants {
    default: Option<ObjectRef>,
    named: HashMap<String, ObjectRef, OtherHasher>,
}

impl Descendants {
    fn len(&self) -> usize {
        self.named.len() + usize::from(self.default.is_some())
    }
    fn slot(&mut self, identity: Option<&str>) -> Option<&mut ObjectRef> {
        match identity {
            None => self.default.as_mut(),
            Some(identity) => self.named.get_mut(identity),
        }
    }
}

// ------------- Root -------------
/// The registry of finished objects, keyed by type and optional identity.
/// Each type has at most one default (identity-less) object.
#[derive(Debug, Clone, Default)]
pub struct Root {
    kept: HashMap<String, Descendants, OtherHasher>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object, replacing whatever was kept under the same type
    /// and identity. The boolean tells if something was replaced.
    pub fn keep(&mut self, object: Object) -> Result<(ObjectRef, bool)> {
        self.keep_ref(Arc::new(object))
    }

    pub fn keep_ref(&mut self, object: ObjectRef) -> Result<(ObjectRef, bool)> {
        let Some(type_name) = object.type_name() else {
            return Err(LinealError::Registry(String::from(
                "Anonymous objects cannot be registered",
            )));
        };
        let descendants = self.kept.entry(type_name.to_owned()).or_default();
        let previous = match object.identity() {
            None => descendants.default.replace(Arc::clone(&object)),
            Some(identity) => descendants
                .named
                .insert(identity.to_owned(), Arc::clone(&object)),
        };
        let replaced = previous.is_some();
        debug!(
            r#type = type_name,
            identity = object.identity().unwrap_or(""),
            replaced,
            "kept object"
        );
        Ok((object, replaced))
    }

    pub fn get(&self, type_name: &str, identity: Option<&str>) -> Option<ObjectRef> {
        let descendants = self.kept.get(type_name)?;
        match identity {
            None => descendants.default.clone(),
            Some(identity) => descendants.named.get(identity).cloned(),
        }
    }
    pub fn get_default(&self, type_name: &str) -> Option<ObjectRef> {
        self.get(type_name, None)
    }

    /// Mutable access to a kept object. Objects already holding the handle as a
    /// parent or value keep seeing the state they were built against; the
    /// registry entry is copied on first write if it is shared.
    pub fn get_mut(&mut self, type_name: &str, identity: Option<&str>) -> Option<&mut Object> {
        let slot = self.kept.get_mut(type_name)?.slot(identity)?;
        Some(Arc::make_mut(slot))
    }

    pub fn remove(&mut self, type_name: &str, identity: Option<&str>) -> Option<ObjectRef> {
        let descendants = self.kept.get_mut(type_name)?;
        let removed = match identity {
            None => descendants.default.take(),
            Some(identity) => descendants.named.remove(identity),
        };
        if descendants.len() == 0 {
            self.kept.remove(type_name);
        }
        if removed.is_some() {
            debug!(r#type = type_name, identity = identity.unwrap_or(""), "removed object");
        }
        removed
    }

    /// Registered type names in sorted order.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.kept.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Every object of a type: the default first, then the named ones sorted
    /// by identity.
    pub fn all_by_type(&self, type_name: &str) -> Vec<ObjectRef> {
        let Some(descendants) = self.kept.get(type_name) else {
            return Vec::new();
        };
        let mut named: Vec<(&String, &ObjectRef)> = descendants.named.iter().collect();
        named.sort_unstable_by(|a, b| a.0.cmp(b.0));
        descendants
            .default
            .iter()
            .chain(named.into_iter().map(|(_, object)| object))
            .cloned()
            .collect()
    }

    /// Every kept object, grouped by sorted type name.
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.types()
            .into_iter()
            .flat_map(|type_name| self.all_by_type(type_name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kept.values().map(Descendants::len).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
