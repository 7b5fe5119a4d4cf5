//! Lineal – an embeddable, inheritance-based language for configuration and data definition.
//!
//! Lineal text declares typed, optionally named records (*objects*). An object
//! may inherit from any number of previously declared objects, and every field
//! it defines carries a *combinator* deciding how that definition merges with
//! what the lineage already holds:
//!
//! ```text
//! // the default object of type "soldier"
//! soldier { health = 100; skills = <"march">; }
//!
//! // a named object inheriting from it
//! soldier "medic" : soldier { health += 20; skills += <"heal">; }
//!
//! // "<-" inherits and then flattens into plain assignments
//! soldier "veteran" <- soldier "medic" { health *= 2; rank = "sergeant"; }
//! ```
//!
//! ## Resolution
//! A field's effective value is found by walking the object and its ancestors
//! depth first, parents in declared order, and folding the definitions found
//! from the deepest back to the object itself (see [`object::Object::get_field`]).
//! `x = v;` therefore overrides whatever was inherited, while `x += v;`
//! merges onto it.
//!
//! ## Modules
//! * [`value`] – The [`value::Value`] union, its promotion lattice and unary operators.
//! * [`combinator`] – The [`combinator::Combinator`] algebra shared by field merging and expressions.
//! * [`object`] – Objects, lineage resolution, cascading and flattening.
//! * [`root`] – The [`root::Root`] keeper of registered objects.
//! * [`lexer`] / [`parser`] – Tokenizing and reading text into a root.
//! * [`include`] – The [`include::Includer`] capability behind `#include "path"`.
//! * [`bind`] – Moving objects into and out of application records.
//! * [`settings`] – Runtime settings read through the `config` crate.
//!
//! ## Expressions
//! Values may be computed inline. Identifiers read fields of the object being
//! declared, so later fields can build on earlier ones:
//! ```
//! let root = lineal::read_str(r#"
//!     .point(x, y);
//!     shape "square" { corner = point(2, 2); side = 2 ' 3 - 1; area = side * side; }
//! "#).unwrap();
//! let square = root.get("shape", Some("square")).unwrap();
//! assert_eq!(square.get_field("area").unwrap(), Some(lineal::Value::Integer(49)));
//! ```
//!
//! ## Errors
//! Syntax problems are collected for the whole input and reported together as
//! [`LinealError::Parse`]. Invalid operations, such as dividing by zero or
//! adding a string to an object, abort reading immediately with
//! [`LinealError::Operation`].

pub mod bind;
pub mod combinator;
pub mod error;
pub mod include;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod root;
pub mod settings;
pub mod value;

pub use combinator::Combinator;
pub use error::{LinealError, Result};
pub use object::{Object, ObjectRef};
pub use parser::{Reader, read_file, read_str};
pub use root::Root;
pub use value::{Kind, Value};
