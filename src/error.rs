use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::Kind;

/// A position inside a named source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub stream: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(stream: Arc<str>, line: usize, column: usize) -> Self {
        Self { stream, line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.stream, self.line, self.column)
    }
}

/// One lexical or syntax problem, recorded during a pass and reported later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Every diagnostic gathered by one parse, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }
    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(other);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
    // Appended to an aborting error, listing what was found before it.
    fn preceding(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("\nFound before it:\n{}", self)
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for diagnostic in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
            first = false;
        }
        Ok(())
    }
}

/// Failures of the value algebra. These abort the operation that raised them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Can't use a {operator} operator with {kind} values")]
    Mismatch { operator: &'static str, kind: Kind },
    #[error("Can't use a {operator} operator with {kind} as an operand; the operand must be an integer")]
    ShiftOperand { operator: &'static str, kind: Kind },
    #[error("Divide by zero in {operator}")]
    DivideByZero { operator: &'static str },
    #[error("Cannot promote {from} to {to}")]
    Promotion { from: Kind, to: Kind },
    #[error("Can't apply unary {operator} to {kind} values")]
    Unary { operator: &'static str, kind: Kind },
}

#[derive(Error, Debug)]
pub enum LinealError {
    #[error("Parse failed:\n{0}")]
    Parse(Diagnostics),
    /// An invalid operation aborted the read. `earlier` holds the syntax
    /// problems already found in the same pass.
    #[error(
        "Operation error{}: {source}{}",
        .location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default(),
        .earlier.preceding()
    )]
    Operation {
        source: OperationError,
        location: Option<Location>,
        earlier: Diagnostics,
    },
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinealError>;

impl From<OperationError> for LinealError {
    fn from(e: OperationError) -> Self {
        Self::Operation {
            source: e,
            location: None,
            earlier: Diagnostics::new(),
        }
    }
}

impl From<config::ConfigError> for LinealError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_json::Error> for LinealError {
    fn from(e: serde_json::Error) -> Self {
        Self::Conversion(e.to_string())
    }
}
