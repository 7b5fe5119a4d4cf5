use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::combinator::Combinator;
use crate::error::{LinealError, OperationError, Result};
use crate::value::{OtherHasher, Value};

/// Shared handle to a finished object. Parent lists and object values hold
/// these, never the objects themselves.
pub type ObjectRef = Arc<Object>;

/// A local field definition: the value together with the combinator that
/// decides how it merges onto whatever the lineage already holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub combinator: Combinator,
    pub value: Value,
}

impl Field {
    pub fn new(combinator: Combinator, value: Value) -> Self {
        Self { combinator, value }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Object {
    type_name: Option<String>,
    identity: Option<String>,
    parents: Vec<ObjectRef>,
    fields: HashMap<String, Field, OtherHasher>,
}

impl Object {
    /// The default object of a type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }
    pub fn named(type_name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            identity: Some(identity.into()),
            ..Self::default()
        }
    }
    pub fn anonymous() -> Self {
        Self::default()
    }
    /// Builds an object from optional parts. An empty type counts as absent.
    /// An identity without a type is refused, and so is an empty identity,
    /// which would otherwise stand for the default object.
    pub fn with(type_name: Option<&str>, identity: Option<&str>) -> Result<Self> {
        let type_name = type_name.filter(|t| !t.is_empty());
        match (type_name, identity) {
            (_, Some("")) => Err(LinealError::Registry(String::from(
                "Object identity cannot be empty",
            ))),
            (None, Some(identity)) => Err(LinealError::Registry(format!(
                "Object identity \"{}\" given without a type",
                identity
            ))),
            (type_name, identity) => Ok(Self {
                type_name: type_name.map(str::to_owned),
                identity: identity.map(str::to_owned),
                ..Self::default()
            }),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
    pub fn is_anonymous(&self) -> bool {
        self.type_name.is_none()
    }
    pub fn is_default(&self) -> bool {
        self.type_name.is_some() && self.identity.is_none()
    }

    // ------------- parents -------------
    pub fn parents(&self) -> &[ObjectRef] {
        &self.parents
    }
    pub fn add_parent(&mut self, parent: ObjectRef) {
        self.parents.push(parent);
    }
    /// Detaches a parent by identity of the handle. Returns whether it was attached.
    pub fn remove_parent(&mut self, parent: &ObjectRef) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| !Arc::ptr_eq(p, parent));
        before != self.parents.len()
    }

    // ------------- local fields -------------
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.set_field(name, Combinator::Set, value);
    }
    pub fn set_field(&mut self, name: impl Into<String>, combinator: Combinator, value: impl Into<Value>) {
        self.fields.insert(name.into(), Field::new(combinator, value.into()));
    }
    pub fn clear(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }
    pub fn contains_local(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
    pub fn local(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }
    pub fn local_field_names(&self) -> BTreeSet<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
    /// Every field name defined anywhere in the lineage.
    pub fn available_field_names(&self) -> BTreeSet<String> {
        self.lineage()
            .into_iter()
            .flat_map(|object| object.fields.keys().cloned())
            .collect()
    }

    /// Pre-order, depth-first walk of this object and its ancestors. Parents are
    /// visited in declared order and each is fully explored before its next
    /// sibling. An ancestor reachable along two paths is visited twice.
    pub fn lineage(&self) -> Vec<&Object> {
        let mut visited = Vec::new();
        let mut pending: Vec<&Object> = vec![self];
        while let Some(object) = pending.pop() {
            visited.push(object);
            pending.extend(object.parents.iter().rev().map(|parent| parent.as_ref()));
        }
        visited
    }

    /// Resolves the effective value of a field.
    ///
    /// The local definitions found along the lineage are folded from the last
    /// one visited back to this object's own, each entry's combinator combining
    /// its value onto the accumulated result. The object itself therefore has
    /// the final word: `x = v;` overrides inheritance while `x += v;` merges
    /// onto it.
    pub fn get_field(&self, name: &str) -> std::result::Result<Option<Value>, OperationError> {
        let found: Vec<&Field> = self
            .lineage()
            .into_iter()
            .filter_map(|object| object.fields.get(name))
            .collect();
        let Some((deepest, nearer)) = found.split_last() else {
            return Ok(None);
        };
        trace!(field = name, definitions = found.len(), "resolving field");
        let mut accumulated = deepest.value.copy();
        for field in nearer.iter().rev() {
            accumulated = field.combinator.combine(&field.value, Some(&accumulated))?;
        }
        Ok(Some(accumulated))
    }

    /// Merges `addend` into this object: its parents are appended, and each of
    /// its local fields is combined onto the matching local entry here.
    pub fn cascade(&mut self, addend: &Object) -> std::result::Result<(), OperationError> {
        self.parents.extend(addend.parents.iter().cloned());
        for (name, field) in &addend.fields {
            let value = field
                .combinator
                .combine(&field.value, self.fields.get(name).map(|existing| &existing.value))?;
            self.fields.insert(name.clone(), Field::new(field.combinator, value));
        }
        Ok(())
    }

    /// An anonymous copy sharing this object's parents and holding deep copies
    /// of its local fields. Same as cascading into an empty object.
    pub fn duplicate(&self) -> Object {
        Object {
            parents: self.parents.clone(),
            fields: self
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), Field::new(field.combinator, field.value.copy())))
                .collect(),
            ..Object::anonymous()
        }
    }

    /// Replaces every reachable field with its resolved value as a local `=`
    /// entry and drops the parents.
    pub fn flatten(&mut self) -> std::result::Result<(), OperationError> {
        let mut resolved = HashMap::with_hasher(OtherHasher::default());
        for name in self.available_field_names() {
            if let Some(value) = self.get_field(&name)? {
                resolved.insert(name, Field::new(Combinator::Set, value));
            }
        }
        self.fields = resolved;
        self.parents.clear();
        Ok(())
    }
}

fn write_reference(f: &mut fmt::Formatter, object: &Object) -> fmt::Result {
    match (&object.type_name, &object.identity) {
        (Some(t), Some(i)) => write!(f, "{} \"{}\"", t, i),
        (Some(t), None) => write!(f, "{}", t),
        _ => write!(f, "{{}}"),
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.type_name.is_some() {
            write_reference(f, self)?;
            write!(f, " ")?;
        }
        for (n, parent) in self.parents.iter().enumerate() {
            write!(f, "{}", if n == 0 { ": " } else { " : " })?;
            write_reference(f, parent)?;
            write!(f, " ")?;
        }
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();
        write!(f, "{{")?;
        for name in names {
            let field = &self.fields[name];
            write!(f, " {} {} {};", name, field.combinator, field.value)?;
        }
        write!(f, " }}")
    }
}
