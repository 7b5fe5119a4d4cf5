// used to give sets a fast, deterministic hasher
use core::hash::{BuildHasherDefault, Hash, Hasher};
use seahash::SeaHasher;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::OperationError;
use crate::object::{Object, ObjectRef};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;
pub type ValueSet = HashSet<Value, OtherHasher>;

/// The variant of a [`Value`]. The declaration order is the promotion rank for
/// everything from `Boolean` up to `List`; `Object` and `Null` are outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Boolean,
    Integer,
    Float,
    String,
    Set,
    List,
    Object,
    Null,
}

impl Kind {
    /// Position in the promotion lattice, if the kind takes part in it.
    pub fn rank(self) -> Option<u8> {
        match self {
            Kind::Boolean => Some(0),
            Kind::Integer => Some(1),
            Kind::Float => Some(2),
            Kind::String => Some(3),
            Kind::Set => Some(4),
            Kind::List => Some(5),
            Kind::Object | Kind::Null => None,
        }
    }
    pub fn is_scalar(self) -> bool {
        matches!(self, Kind::Boolean | Kind::Integer | Kind::Float | Kind::String)
    }
    pub fn name(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Set => "set",
            Kind::List => "list",
            Kind::Object => "object",
            Kind::Null => "null",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Every datum the language can hold.
///
/// Values are never mutated in place. Combining or copying always produces a
/// new value; `Object` values share an immutable [`ObjectRef`] until they are
/// copied, which detaches them from whatever registered object they came from.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Set(ValueSet),
    List(Vec<Value>),
    Object(ObjectRef),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Set(_) => Kind::Set,
            Value::List(_) => Kind::List,
            Value::Object(_) => Kind::Object,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn set<I: IntoIterator<Item = Value>>(values: I) -> Value {
        Value::Set(values.into_iter().collect())
    }
    pub fn list<I: IntoIterator<Item = Value>>(values: I) -> Value {
        Value::List(values.into_iter().collect())
    }

    /// Deep copy. Collections copy their elements and objects are cascaded
    /// into a fresh anonymous object, so nothing in the result is shared with
    /// the original's field tables.
    pub fn copy(&self) -> Value {
        match self {
            Value::Set(set) => Value::Set(set.iter().map(Value::copy).collect()),
            Value::List(list) => Value::List(list.iter().map(Value::copy).collect()),
            Value::Object(object) => Value::Object(Arc::new(object.duplicate())),
            other => other.clone(),
        }
    }

    /// Widens this value to `target`. Promoting to the current kind returns an
    /// equal value; promoting downwards, to `Object`/`Null`, or from outside
    /// the lattice fails.
    pub fn promote_to(&self, target: Kind) -> Result<Value, OperationError> {
        let from = self.kind();
        let refused = OperationError::Promotion { from, to: target };
        let (Some(current), Some(wanted)) = (from.rank(), target.rank()) else {
            return Err(refused);
        };
        if wanted < current {
            return Err(refused);
        }
        if wanted == current {
            return Ok(self.clone());
        }
        let promoted = match (self, target) {
            (Value::Boolean(b), Kind::Integer) => Value::Integer(if *b { 1 } else { 0 }),
            (Value::Boolean(b), Kind::Float) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (Value::Integer(i), Kind::Float) => Value::Float(*i as f64),
            (scalar, Kind::String) => Value::String(scalar.text()),
            (Value::Set(set), Kind::List) => Value::List(set.iter().cloned().collect()),
            (scalar, Kind::Set) => Value::set([scalar.clone()]),
            (scalar, Kind::List) => Value::list([scalar.clone()]),
            _ => return Err(refused),
        };
        Ok(promoted)
    }

    /// Textual form used when a scalar is promoted to a string.
    pub fn text(&self) -> String {
        match self {
            Value::Null => String::from("null"),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    // ------------- unary operators -------------
    pub fn negate(&self) -> Result<Value, OperationError> {
        match self {
            Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::String(s) => Ok(Value::String(s.to_lowercase())),
            other => Err(OperationError::Unary {
                operator: "negate",
                kind: other.kind(),
            }),
        }
    }
    pub fn not(&self) -> Result<Value, OperationError> {
        match self {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(OperationError::Unary {
                operator: "not",
                kind: other.kind(),
            }),
        }
    }
    pub fn bitwise_not(&self) -> Result<Value, OperationError> {
        match self {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            Value::Integer(i) => Ok(Value::Integer(!i)),
            Value::Float(f) => Ok(Value::Float(f64::from_bits(!f.to_bits()))),
            other => Err(OperationError::Unary {
                operator: "bitwise-not",
                kind: other.kind(),
            }),
        }
    }
    pub fn absolute(&self) -> Result<Value, OperationError> {
        match self {
            Value::Integer(i) => Ok(Value::Integer(i.wrapping_abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            other => Err(OperationError::Unary {
                operator: "absolute",
                kind: other.kind(),
            }),
        }
    }

    // ------------- accessors -------------
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

fn format_float(f: f64) -> String {
    // Debug keeps the trailing ".0" so the text still reads as a float
    format!("{:?}", f)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

// Floats compare by bit pattern so that sets stay well behaved around NaN,
// and objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Null => (),
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Set(set) => {
                // element order is arbitrary, so fold the element hashes commutatively
                let mut combined: u64 = 0;
                for value in set {
                    let mut hasher = SeaHasher::default();
                    value.hash(&mut hasher);
                    combined = combined.wrapping_add(hasher.finish());
                }
                set.len().hash(state);
                combined.hash(state);
            }
            Value::List(list) => list.hash(state),
            Value::Object(object) => (Arc::as_ptr(object) as usize).hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "\"{}\"", escape(s)),
            Value::List(list) => {
                let items: Vec<String> = list.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Set(set) => {
                let mut items: Vec<String> = set.iter().map(|v| v.to_string()).collect();
                items.sort();
                write!(f, "<{}>", items.join(", "))
            }
            Value::Object(object) => write!(f, "{}", object),
        }
    }
}

// ------------- conversions from native data -------------
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}
impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::String(c.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}
impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}
impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(Arc::new(object))
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(list: Vec<T>) -> Self {
        Value::List(list.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>, S> From<HashSet<T, S>> for Value {
    fn from(set: HashSet<T, S>) -> Self {
        Value::Set(set.into_iter().map(Into::into).collect())
    }
}
