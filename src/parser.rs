use std::collections::HashMap;
use std::fs;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::combinator::Combinator;
use crate::error::{Diagnostic, Diagnostics, LinealError, Location, OperationError, Result};
use crate::include::{FileIncluder, Includer};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::object::{Object, ObjectRef};
use crate::root::Root;
use crate::settings::Settings;
use crate::value::{OtherHasher, Value};

// ------------- Reader -------------
/// Reads source text into a [`Root`]. A reader holds no parse state, so one
/// reader can apply any number of sources to any number of roots.
pub struct Reader {
    includer: Box<dyn Includer>,
    max_include_depth: usize,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// A reader resolving includes from the file system.
    pub fn new() -> Self {
        Self {
            includer: Box::new(FileIncluder::default()),
            max_include_depth: Settings::default().max_include_depth,
        }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            includer: Box::new(FileIncluder::from_settings(settings)),
            max_include_depth: settings.max_include_depth,
        }
    }
    pub fn with_includer(mut self, includer: impl Includer + 'static) -> Self {
        self.includer = Box::new(includer);
        self
    }
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Parses `text` and registers every declaration into `root`. Objects
    /// already in `root` can be referenced and inherited from.
    ///
    /// Syntax problems do not stop the pass; they are all returned together as
    /// [`LinealError::Parse`] once the input is exhausted. Nothing from the
    /// first problem onwards is registered. An operation error aborts at once
    /// and carries the problems found before it.
    pub fn read(&self, stream_name: &str, text: &str, root: &mut Root) -> Result<()> {
        debug!(stream = stream_name, "reading");
        let lexer = Lexer::new(stream_name, text, self.includer.as_ref(), self.max_include_depth);
        Parser::new(lexer, root).run()
    }

    pub fn read_file(&self, path: impl AsRef<Path>, root: &mut Root) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        self.read(&path.to_string_lossy(), &text, root)
    }
}

/// Parses a string into a fresh [`Root`].
pub fn read_str(text: &str) -> Result<Root> {
    let mut root = Root::new();
    Reader::new().read("<string>", text, &mut root)?;
    Ok(root)
}

/// Parses a file into a fresh [`Root`]; includes resolve relative to it.
pub fn read_file(path: impl AsRef<Path>) -> Result<Root> {
    let mut root = Root::new();
    Reader::new().read_file(path, &mut root)?;
    Ok(root)
}

// ------------- Operators -------------
#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    Negate,
    Not,
    BitwiseNot,
    Absolute,
    Binary(Combinator),
}

impl Operator {
    fn prefix(kind: TokenKind) -> Option<Operator> {
        match kind {
            TokenKind::Minus => Some(Operator::Negate),
            TokenKind::Plus => Some(Operator::Absolute),
            TokenKind::Bang => Some(Operator::Not),
            TokenKind::Tilde => Some(Operator::BitwiseNot),
            _ => None,
        }
    }
    fn infix(kind: TokenKind) -> Option<Operator> {
        let combinator = match kind {
            TokenKind::Plus => Combinator::Add,
            TokenKind::Minus => Combinator::Subtract,
            TokenKind::Star => Combinator::Multiply,
            TokenKind::Slash => Combinator::Division,
            TokenKind::Percent => Combinator::Modulo,
            TokenKind::Apostrophe => Combinator::Power,
            TokenKind::Ampersand => Combinator::BitwiseAnd,
            TokenKind::Pipe => Combinator::BitwiseOr,
            TokenKind::Caret => Combinator::BitwiseXor,
            TokenKind::ShiftLeft => Combinator::LeftShift,
            TokenKind::ShiftRight => Combinator::RightShift,
            TokenKind::ShiftRightPadded => Combinator::RightPaddedShift,
            _ => return None,
        };
        Some(Operator::Binary(combinator))
    }
    fn precedence(self) -> u8 {
        match self {
            Operator::Binary(Combinator::BitwiseOr | Combinator::BitwiseXor) => 1,
            Operator::Binary(Combinator::BitwiseAnd) => 2,
            Operator::Binary(
                Combinator::LeftShift | Combinator::RightShift | Combinator::RightPaddedShift,
            ) => 3,
            Operator::Binary(Combinator::Add | Combinator::Subtract | Combinator::Set) => 4,
            Operator::Binary(Combinator::Multiply | Combinator::Division | Combinator::Modulo) => 5,
            Operator::Binary(Combinator::Power) => 6,
            Operator::Negate | Operator::Not | Operator::BitwiseNot | Operator::Absolute => 7,
        }
    }
    fn right_associative(self) -> bool {
        !matches!(self, Operator::Binary(c) if c != Combinator::Power)
    }
    // Whether `self`, already on the stack, reduces before `incoming` is pushed.
    fn binds_before(self, incoming: Operator) -> bool {
        self.precedence() > incoming.precedence()
            || (self.precedence() == incoming.precedence() && !incoming.right_associative())
    }
}

// ------------- Parser -------------
enum Halt {
    // a syntax problem was recorded; skip ahead and carry on
    Recover,
    Abort(LinealError),
}

type Step<T> = std::result::Result<T, Halt>;

struct Parser<'a> {
    lexer: Lexer<'a>,
    root: &'a mut Root,
    prototypes: HashMap<String, Vec<String>, OtherHasher>,
    token: Token,
    // lexical problems met while scanning up to `token`
    pending: Vec<Diagnostic>,
    depth: usize,
    diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    fn new(mut lexer: Lexer<'a>, root: &'a mut Root) -> Self {
        let token = lexer.next_token();
        let pending = lexer.take_diagnostics();
        Self {
            lexer,
            root,
            prototypes: HashMap::default(),
            token,
            pending,
            depth: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    fn run(mut self) -> Result<()> {
        while !self.at(TokenKind::End) {
            match self.declaration() {
                Ok(()) => (),
                Err(Halt::Recover) => self.recover(),
                Err(Halt::Abort(mut e)) => {
                    warn!(error = %e, "parse aborted");
                    self.flush_pending();
                    if let LinealError::Operation { earlier, .. } = &mut e {
                        *earlier = mem::take(&mut self.diagnostics);
                    }
                    return Err(e);
                }
            }
        }
        self.flush_pending();
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(LinealError::Parse(self.diagnostics))
        }
    }

    // ------------- token plumbing -------------
    fn advance(&mut self) {
        match self.token.kind {
            TokenKind::LeftBrace => self.depth += 1,
            TokenKind::RightBrace => self.depth = self.depth.saturating_sub(1),
            _ => (),
        }
        self.flush_pending();
        self.token = self.lexer.next_token();
        self.pending = self.lexer.take_diagnostics();
    }
    // Lexical problems are recorded once the token they precede is consumed,
    // so that they count against the declaration they occur in.
    fn flush_pending(&mut self) {
        self.diagnostics.extend(mem::take(&mut self.pending));
    }
    fn at(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }
    fn accept(&mut self, kind: TokenKind) -> bool {
        let matched = self.at(kind);
        if matched {
            self.advance();
        }
        matched
    }
    fn expect(&mut self, kind: TokenKind, message: &str) -> Step<()> {
        if self.accept(kind) {
            Ok(())
        } else {
            self.fail(message)
        }
    }
    fn fail<T>(&mut self, message: impl Into<String>) -> Step<T> {
        let found = match self.token.kind {
            TokenKind::End => String::from("end of input"),
            TokenKind::String => format!("\"{}\"", self.token.lexeme),
            _ => format!("'{}'", self.token.lexeme),
        };
        let location = self.token.location.clone();
        self.fail_at(location, format!("{}, found {}", message.into(), found))
    }
    fn fail_at<T>(&mut self, location: Location, message: impl Into<String>) -> Step<T> {
        self.report_at(location, message);
        Err(Halt::Recover)
    }
    // Records a problem that leaves the token stream in a sound place.
    fn report_at(&mut self, location: Location, message: impl Into<String>) {
        self.flush_pending();
        let diagnostic = Diagnostic::new(location, message);
        warn!(%diagnostic, "syntax error");
        self.diagnostics.push(diagnostic);
    }
    fn operation(location: &Location, error: OperationError) -> Halt {
        Halt::Abort(LinealError::Operation {
            source: error,
            location: Some(location.clone()),
            earlier: Diagnostics::new(),
        })
    }

    // Skips to the end of the broken declaration: a top level ';' or the '}'
    // closing its body.
    fn recover(&mut self) {
        loop {
            match self.token.kind {
                TokenKind::End => return,
                TokenKind::Semicolon if self.depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RightBrace if self.depth <= 1 => {
                    self.advance();
                    self.depth = 0;
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    // ------------- declarations -------------
    fn declaration(&mut self) -> Step<()> {
        if self.accept(TokenKind::Dot) {
            return self.prototype();
        }
        let (type_name, identity) =
            self.declaration_name("Expected an object type or a prototype declaration")?;
        let mut object = Object::with(Some(type_name.as_str()), identity.as_deref()).map_err(Halt::Abort)?;
        let flatten = self.at(TokenKind::Inherit);
        if flatten || self.at(TokenKind::Colon) {
            loop {
                self.advance();
                let parent = self.reference("Parent object")?;
                object.add_parent(parent);
                if !self.at(TokenKind::Colon) {
                    break;
                }
            }
        }
        let location = self.token.location.clone();
        self.body(&mut object)?;
        if flatten {
            object
                .flatten()
                .map_err(|e| Self::operation(&location, e))?;
        }
        // once anything went wrong, the rest of the input is only checked
        if self.diagnostics.is_empty() {
            self.root.keep(object).map_err(Halt::Abort)?;
        } else {
            debug!(r#type = object.type_name().unwrap_or_default(), "not registered after earlier errors");
        }
        Ok(())
    }

    fn declaration_name(&mut self, message: &str) -> Step<(String, Option<String>)> {
        if !self.at(TokenKind::Identifier) {
            return self.fail(message);
        }
        let type_name = self.token.lexeme.clone();
        self.advance();
        let identity = match self.token.kind {
            TokenKind::String if self.token.lexeme.is_empty() => {
                return self.fail("An object identity cannot be empty");
            }
            TokenKind::Identifier | TokenKind::String | TokenKind::Number => {
                let identity = self.token.lexeme.clone();
                self.advance();
                Some(identity)
            }
            _ => None,
        };
        Ok((type_name, identity))
    }

    // Reads `type [identity]` and looks it up among the registered objects.
    fn reference(&mut self, what: &str) -> Step<ObjectRef> {
        let location = self.token.location.clone();
        let (type_name, identity) = self.declaration_name("Expected the type of a registered object")?;
        match self.root.get(&type_name, identity.as_deref()) {
            Some(object) => Ok(object),
            None => {
                let described = match identity {
                    Some(identity) => format!("{} \"{}\"", type_name, identity),
                    None => type_name,
                };
                self.fail_at(location, format!("{} ({}) not declared or found", what, described))
            }
        }
    }

    fn prototype(&mut self) -> Step<()> {
        let location = self.token.location.clone();
        if !self.at(TokenKind::Identifier) {
            return self.fail("Expected a type name after '.'");
        }
        let type_name = self.token.lexeme.clone();
        self.advance();
        self.expect(TokenKind::LeftParen, "Expected '(' to open the prototype field list")?;
        let mut fields = Vec::new();
        loop {
            if !self.at(TokenKind::Identifier) {
                return self.fail("Expected a field name in the prototype");
            }
            fields.push(self.token.lexeme.clone());
            self.advance();
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen, "Expected ',' or ')' in the prototype field list")?;
        self.accept(TokenKind::Semicolon);
        if self.prototypes.contains_key(&type_name) {
            self.report_at(
                location,
                format!("Prototype for type \"{}\" is already declared", type_name),
            );
            return Ok(());
        }
        debug!(r#type = %type_name, fields = fields.len(), "declared prototype");
        self.prototypes.insert(type_name, fields);
        Ok(())
    }

    fn prototype_fields(&mut self, type_name: &str) -> Step<Vec<String>> {
        let found = self.prototypes.get(type_name).cloned();
        match found {
            Some(fields) => Ok(fields),
            None => self.fail(format!("No prototype declared for type \"{}\"", type_name)),
        }
    }

    fn body(&mut self, object: &mut Object) -> Step<()> {
        match self.token.kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.fields(None, object)?;
                self.expect(
                    TokenKind::RightBrace,
                    "Expected an assignment or '}' to end the object declaration",
                )
            }
            TokenKind::LeftParen => {
                let fields = self.prototype_fields(object.type_name().unwrap_or_default())?;
                self.advance();
                self.positional(None, object, &fields)?;
                self.expect(TokenKind::RightParen, "Expected ',' or ')' after a positional value")?;
                self.accept(TokenKind::Semicolon);
                Ok(())
            }
            _ => self.fail("Expected an object body: '{', '(' or ';'"),
        }
    }

    // `scope` resolves identifiers in expressions; `None` means the target
    // itself, which lets a field refer to fields assigned before it.
    fn fields(&mut self, scope: Option<&Object>, target: &mut Object) -> Step<()> {
        while self.at(TokenKind::Identifier) {
            let name = self.token.lexeme.clone();
            self.advance();
            let TokenKind::Assign(combinator) = self.token.kind else {
                return self.fail(format!("Expected an assignment operator after \"{}\"", name));
            };
            self.advance();
            let value = self.value(scope.unwrap_or(&*target))?;
            target.set_field(name, combinator, value);
            self.expect(TokenKind::Semicolon, "Expected ';' after the assigned value")?;
        }
        Ok(())
    }

    // Values matched in order against prototype fields. A short list leaves
    // the remaining fields unset.
    fn positional(&mut self, scope: Option<&Object>, target: &mut Object, fields: &[String]) -> Step<()> {
        if self.at(TokenKind::RightParen) {
            return Ok(());
        }
        let mut names = fields.iter();
        loop {
            let Some(name) = names.next() else {
                let type_name = target.type_name().unwrap_or_default().to_owned();
                return self.fail(format!(
                    "More values than the {} fields in the prototype for type \"{}\"",
                    fields.len(),
                    type_name
                ));
            };
            let value = self.value(scope.unwrap_or(&*target))?;
            target.set(name.clone(), value);
            if !self.accept(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    // ------------- values -------------
    fn value(&mut self, scope: &Object) -> Step<Value> {
        if self.accept(TokenKind::At) {
            self.expect(TokenKind::LeftBrace, "Expected '{' after '@'")?;
            let object = self.reference("Referenced object")?;
            self.expect(TokenKind::RightBrace, "Expected '}' to close the object reference")?;
            return Ok(Value::Object(object));
        }
        self.expression(scope)
    }

    fn expression(&mut self, scope: &Object) -> Step<Value> {
        let mut values: Vec<Value> = Vec::new();
        let mut operators: Vec<(Operator, Location)> = Vec::new();
        loop {
            while let Some(unary) = Operator::prefix(self.token.kind) {
                operators.push((unary, self.token.location.clone()));
                self.advance();
            }
            values.push(self.operand(scope)?);
            let Some(binary) = Operator::infix(self.token.kind) else {
                break;
            };
            let location = self.token.location.clone();
            self.advance();
            while let Some((top, _)) = operators.last() {
                if !top.binds_before(binary) {
                    break;
                }
                if let Some((top, at)) = operators.pop() {
                    self.reduce(top, &at, &mut values)?;
                }
            }
            operators.push((binary, location));
        }
        while let Some((operator, at)) = operators.pop() {
            self.reduce(operator, &at, &mut values)?;
        }
        match values.pop() {
            Some(value) if values.is_empty() => Ok(value),
            _ => self.fail("Malformed expression"),
        }
    }

    fn reduce(&mut self, operator: Operator, at: &Location, values: &mut Vec<Value>) -> Step<()> {
        let Some(right) = values.pop() else {
            return self.fail_at(at.clone(), "Operator is missing an operand");
        };
        let result = match operator {
            Operator::Negate => right.negate(),
            Operator::Not => right.not(),
            Operator::BitwiseNot => right.bitwise_not(),
            Operator::Absolute => right.absolute(),
            Operator::Binary(combinator) => {
                let Some(left) = values.pop() else {
                    return self.fail_at(at.clone(), "Operator is missing an operand");
                };
                combinator.combine(&right, Some(&left))
            }
        };
        values.push(result.map_err(|e| Self::operation(at, e))?);
        Ok(())
    }

    fn operand(&mut self, scope: &Object) -> Step<Value> {
        match self.token.kind {
            TokenKind::String
            | TokenKind::Number
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                let literal = self.token.literal.take().unwrap_or(Value::Null);
                self.advance();
                Ok(literal)
            }
            TokenKind::LeftParen => {
                self.advance();
                let value = self.value(scope)?;
                self.expect(TokenKind::RightParen, "Expected ')' to close the expression")?;
                Ok(value)
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut object = Object::anonymous();
                self.fields(Some(scope), &mut object)?;
                self.expect(
                    TokenKind::RightBrace,
                    "Expected an assignment or '}' to end the object literal",
                )?;
                Ok(Value::Object(Arc::new(object)))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let elements = self.elements(scope, TokenKind::RightBracket, "Expected ',' or ']' in the list")?;
                Ok(Value::List(elements))
            }
            TokenKind::LeftAngle => {
                self.advance();
                let elements = self.elements(scope, TokenKind::RightAngle, "Expected ',' or '>' in the set")?;
                Ok(Value::set(elements))
            }
            TokenKind::Identifier => {
                let location = self.token.location.clone();
                let name = self.token.lexeme.clone();
                self.advance();
                if self.at(TokenKind::LeftParen) {
                    let fields = self.prototype_fields(&name)?;
                    self.advance();
                    let mut object = Object::new(name);
                    self.positional(Some(scope), &mut object, &fields)?;
                    self.expect(TokenKind::RightParen, "Expected ',' or ')' after a positional value")?;
                    return Ok(Value::Object(Arc::new(object)));
                }
                match scope
                    .get_field(&name)
                    .map_err(|e| Self::operation(&location, e))?
                {
                    Some(value) => Ok(value),
                    None => self.fail_at(location, format!("No field \"{}\" to use in the expression", name)),
                }
            }
            _ => self.fail("Expected a value"),
        }
    }

    fn elements(&mut self, scope: &Object, close: TokenKind, message: &str) -> Step<Vec<Value>> {
        let mut elements = Vec::new();
        if self.accept(close) {
            return Ok(elements);
        }
        loop {
            elements.push(self.value(scope)?);
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, message)?;
        Ok(elements)
    }
}
