//! Moving data between objects and application records.
//!
//! Two routes are offered. [`Binding`] is an explicit table of member names
//! and closures, for records that should not or cannot derive serde traits.
//! The serde route ([`deserialize`], [`export_by_type`], [`object_from_serialize`])
//! goes through `serde_json::Value` and works with any derived record.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value as Json};
use tracing::{debug, warn};

use crate::error::{LinealError, Result};
use crate::object::{Object, ObjectRef};
use crate::root::Root;
use crate::value::Value;

// ------------- FromValue -------------
/// Conversion from a resolved value into a native type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn refuse<T>(value: &Value, wanted: &str) -> Result<T> {
    Err(LinealError::Conversion(format!(
        "cannot convert {} value {} into {}",
        value.kind(),
        value,
        wanted
    )))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(*b),
            other => refuse(other, "bool"),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(*i),
            Value::Boolean(b) => Ok(i64::from(*b)),
            other => refuse(other, "i64"),
        }
    }
}

macro_rules! narrow_integer {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = i64::from_value(value)?;
                    <$t>::try_from(wide).map_err(|_| {
                        LinealError::Conversion(format!("{} is out of range for {}", wide, stringify!($t)))
                    })
                }
            }
        )*
    };
}
narrow_integer!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => refuse(other, "f64"),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) => Ok(value.text()),
            other => refuse(other, "String"),
        }
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Result<Self> {
        let text = String::from_value(value)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => refuse(value, "char"),
        }
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(ObjectRef::clone(object)),
            other => refuse(other, "object"),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(list) => list.iter().map(T::from_value).collect(),
            Value::Set(set) => set.iter().map(T::from_value).collect(),
            Value::Null | Value::Object(_) => refuse(value, "a list"),
            scalar => Ok(vec![T::from_value(scalar)?]),
        }
    }
}

impl<T, S> FromValue for HashSet<T, S>
where
    T: FromValue + Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Set(set) => set.iter().map(T::from_value).collect(),
            Value::List(list) => list.iter().map(T::from_value).collect(),
            other => refuse(other, "a set"),
        }
    }
}

fn fields_of<T: FromValue>(value: &Value) -> Result<Vec<(String, T)>> {
    let Value::Object(object) = value else {
        return refuse(value, "a map");
    };
    let mut entries = Vec::new();
    for name in object.available_field_names() {
        if let Some(resolved) = object.get_field(&name)? {
            let converted = T::from_value(&resolved)?;
            entries.push((name, converted));
        }
    }
    Ok(entries)
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(fields_of(value)?.into_iter().collect())
    }
}

impl<T: FromValue, S: BuildHasher + Default> FromValue for HashMap<String, T, S> {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(fields_of(value)?.into_iter().collect())
    }
}

// Maps become anonymous objects with one assigned field per entry.
impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        let mut object = Object::anonymous();
        for (name, value) in map {
            object.set(name, value);
        }
        Value::from(object)
    }
}

impl<T: Into<Value>, S> From<HashMap<String, T, S>> for Value {
    fn from(map: HashMap<String, T, S>) -> Self {
        let mut object = Object::anonymous();
        for (name, value) in map {
            object.set(name, value);
        }
        Value::from(object)
    }
}

impl Object {
    /// Resolves a field and converts it. `Ok(None)` when nothing in the
    /// lineage defines it.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        match self.get_field(name)? {
            Some(value) => T::from_value(&value).map(Some),
            None => Ok(None),
        }
    }
}

// ------------- Binding -------------
type Setter<T> = Box<dyn Fn(&mut T, &Value) -> Result<()> + Send + Sync>;
type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

fn within(member: &str, error: LinealError) -> LinealError {
    match error {
        LinealError::Conversion(message) => {
            LinealError::Conversion(format!("member \"{}\": {}", member, message))
        }
        other => other,
    }
}

/// A table of named members of `T`, built once by the application and used
/// to fill records from objects and to turn records back into objects.
///
/// ```
/// use lineal::bind::Binding;
///
/// #[derive(Default)]
/// struct Person { name: String, age: u32 }
///
/// let binding = Binding::<Person>::new("person")
///     .identity(|p| Some(p.name.clone()), |p, name| p.name = name)
///     .member("age", |p| p.age, |p, age| p.age = age);
///
/// let root = lineal::read_str(r#"person "bob" { age = 40; }"#).unwrap();
/// let people = binding.create_all(&root).unwrap();
/// assert_eq!(people[0].name, "bob");
/// assert_eq!(people[0].age, 40);
/// ```
pub struct Binding<T> {
    type_name: String,
    setters: Vec<(String, Setter<T>)>,
    getters: Vec<(String, Getter<T>)>,
    identity_setter: Option<Box<dyn Fn(&mut T, String) + Send + Sync>>,
    identity_getter: Option<Box<dyn Fn(&T) -> Option<String> + Send + Sync>>,
}

impl<T> Binding<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            setters: Vec::new(),
            getters: Vec::new(),
            identity_setter: None,
            identity_getter: None,
        }
    }
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Binds a field name to a setter. The name may differ from the member it
    /// ends up in.
    pub fn setter<V, F>(mut self, name: impl Into<String>, set: F) -> Self
    where
        V: FromValue,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        self.setters.push((
            name,
            Box::new(move |target, value| {
                let converted = V::from_value(value).map_err(|e| within(&member, e))?;
                set(target, converted);
                Ok(())
            }),
        ));
        self
    }

    pub fn getter<V, F>(mut self, name: impl Into<String>, get: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.getters
            .push((name.into(), Box::new(move |source| get(source).into())));
        self
    }

    pub fn member<V, G, S>(self, name: impl Into<String>, get: G, set: S) -> Self
    where
        V: FromValue + Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        self.getter(name.clone(), get).setter(name, set)
    }

    /// The member receiving the object's identity, and supplying it on export.
    pub fn identity<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Option<String> + Send + Sync + 'static,
        S: Fn(&mut T, String) + Send + Sync + 'static,
    {
        self.identity_getter = Some(Box::new(get));
        self.identity_setter = Some(Box::new(set));
        self
    }

    /// Copies every resolved field that has a bound setter into `target`.
    pub fn apply(&self, object: &Object, target: &mut T) -> Result<()> {
        for name in object.available_field_names() {
            let Some((_, set)) = self.setters.iter().find(|(member, _)| *member == name) else {
                warn!(r#type = %self.type_name, field = %name, "no member bound for field");
                continue;
            };
            if let Some(value) = object.get_field(&name)? {
                set(target, &value)?;
            }
        }
        if let (Some(set), Some(identity)) = (&self.identity_setter, object.identity()) {
            set(target, identity.to_owned());
        }
        Ok(())
    }

    pub fn create(&self, object: &Object) -> Result<T>
    where
        T: Default,
    {
        let mut created = T::default();
        self.apply(object, &mut created)?;
        Ok(created)
    }

    /// Creates one record per object of the bound type, default object first.
    pub fn create_all(&self, root: &Root) -> Result<Vec<T>>
    where
        T: Default,
    {
        let objects = root.all_by_type(&self.type_name);
        debug!(r#type = %self.type_name, count = objects.len(), "binding objects");
        objects.iter().map(|object| self.create(object)).collect()
    }

    /// Builds an object of the bound type from a record's getters.
    pub fn export(&self, source: &T) -> Object {
        let identity = self.identity_getter.as_ref().and_then(|get| get(source));
        let mut object = match identity {
            Some(identity) => Object::named(self.type_name.as_str(), identity),
            None => Object::new(self.type_name.as_str()),
        };
        for (name, get) in &self.getters {
            object.set(name.as_str(), get(source));
        }
        object
    }
}

// ------------- serde bridge -------------
pub fn value_to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).ok_or_else(|| {
            LinealError::Conversion(format!("float {} has no JSON representation", f))
        })?,
        Value::String(s) => Json::String(s.clone()),
        Value::List(list) => Json::Array(list.iter().map(value_to_json).collect::<Result<_>>()?),
        Value::Set(set) => {
            let mut elements: Vec<&Value> = set.iter().collect();
            elements.sort_by_cached_key(|element| element.to_string());
            Json::Array(elements.into_iter().map(value_to_json).collect::<Result<_>>()?)
        }
        Value::Object(object) => to_json(object)?,
    })
}

/// Every resolved field of an object as a JSON object.
pub fn to_json(object: &Object) -> Result<Json> {
    let mut map = Map::new();
    for name in object.available_field_names() {
        if let Some(value) = object.get_field(&name)? {
            map.insert(name, value_to_json(&value)?);
        }
    }
    Ok(Json::Object(map))
}

/// JSON objects become anonymous objects, arrays become lists.
pub fn value_from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(array) => Value::List(array.iter().map(value_from_json).collect()),
        Json::Object(map) => {
            let mut object = Object::anonymous();
            for (name, value) in map {
                object.set(name.as_str(), value_from_json(value));
            }
            Value::from(object)
        }
    }
}

/// Deserializes an object's resolved fields into `T`. When `identity_field`
/// is given, the object's identity is handed to that field.
pub fn deserialize<T: DeserializeOwned>(object: &Object, identity_field: Option<&str>) -> Result<T> {
    let mut json = to_json(object)?;
    if let (Some(field), Some(identity), Json::Object(map)) = (identity_field, object.identity(), &mut json) {
        map.insert(field.to_owned(), Json::String(identity.to_owned()));
    }
    Ok(serde_json::from_value(json)?)
}

/// Deserializes every object of a type, default object first.
pub fn export_by_type<T: DeserializeOwned>(
    root: &Root,
    type_name: &str,
    identity_field: Option<&str>,
) -> Result<Vec<T>> {
    root.all_by_type(type_name)
        .iter()
        .map(|object| deserialize(object, identity_field))
        .collect()
}

/// Builds an object from any record that serializes as a map or struct.
pub fn object_from_serialize<S: Serialize + ?Sized>(
    type_name: &str,
    identity: Option<&str>,
    record: &S,
) -> Result<Object> {
    let mut object = Object::with(Some(type_name), identity)?;
    match serde_json::to_value(record)? {
        Json::Object(map) => {
            for (name, json) in &map {
                object.set(name.as_str(), value_from_json(json));
            }
            Ok(object)
        }
        other => Err(LinealError::Conversion(format!(
            "a {} record does not serialize into named fields: {}",
            type_name, other
        ))),
    }
}
