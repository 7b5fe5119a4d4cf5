use std::mem;
use std::sync::Arc;

use lazy_static::lazy_static;
use logos::Logos;
use regex::Regex;
use tracing::{debug, warn};

use crate::combinator::Combinator;
use crate::error::{Diagnostic, Location};
use crate::include::Includer;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    String,
    Number,
    True,
    False,
    Null,
    Assign(Combinator),
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftAngle,
    RightAngle,
    Semicolon,
    Colon,
    Comma,
    Inherit,
    Dot,
    At,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Apostrophe,
    Tilde,
    Bang,
    Ampersand,
    Pipe,
    Caret,
    ShiftLeft,
    ShiftRight,
    ShiftRightPadded,
    End,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// The decoded value of string, number and keyword literals.
    pub literal: Option<Value>,
    pub location: Location,
}

// ------------- RawToken -------------
// What logos recognizes within a single stream. Assignment operators share one
// token and are resolved against the combinator spellings afterwards.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    BlockComment,
    #[token("/*")]
    UnterminatedComment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,
    #[regex(r#""([^"\\\n]|\\.)*"#)]
    UnterminatedString,
    #[regex(r"[0-9][0-9A-Za-z.]*")]
    Number,
    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Word,
    #[regex(r"#[A-Za-z0-9_]*")]
    Directive,

    #[regex(r"(<<|>>>|>>|[+\-*/%'&|^])?=")]
    Assign,

    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngle,
    #[token(">")]
    RightAngle,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("<-")]
    Inherit,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("'")]
    Apostrophe,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token(">>>")]
    ShiftRightPadded,
}

impl RawToken {
    fn punctuation(self) -> Option<TokenKind> {
        Some(match self {
            RawToken::LeftBrace => TokenKind::LeftBrace,
            RawToken::RightBrace => TokenKind::RightBrace,
            RawToken::LeftParen => TokenKind::LeftParen,
            RawToken::RightParen => TokenKind::RightParen,
            RawToken::LeftBracket => TokenKind::LeftBracket,
            RawToken::RightBracket => TokenKind::RightBracket,
            RawToken::LeftAngle => TokenKind::LeftAngle,
            RawToken::RightAngle => TokenKind::RightAngle,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Inherit => TokenKind::Inherit,
            RawToken::Dot => TokenKind::Dot,
            RawToken::At => TokenKind::At,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::Apostrophe => TokenKind::Apostrophe,
            RawToken::Tilde => TokenKind::Tilde,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Ampersand => TokenKind::Ampersand,
            RawToken::Pipe => TokenKind::Pipe,
            RawToken::Caret => TokenKind::Caret,
            RawToken::ShiftLeft => TokenKind::ShiftLeft,
            RawToken::ShiftRight => TokenKind::ShiftRight,
            RawToken::ShiftRightPadded => TokenKind::ShiftRightPadded,
            _ => return None,
        })
    }
}

lazy_static! {
    static ref DECIMAL: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref FLOATING: Regex = Regex::new(r"^[0-9]+\.[0-9]*$").unwrap();
    static ref HEXADECIMAL: Regex = Regex::new(r"^0[xX]([0-9a-fA-F]+)$").unwrap();
}

// ------------- Frame -------------
// One source stream being scanned. Includes push a new frame.
#[derive(Debug)]
struct Frame {
    name: Arc<str>,
    text: String,
    offset: usize,
    line: usize,
    column: usize,
}

impl Frame {
    fn new(name: &str, text: &str) -> Self {
        Self {
            name: Arc::from(name),
            text: text.to_owned(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }
    fn rest(&self) -> &str {
        &self.text[self.offset..]
    }
    // Moves forward to a byte offset, keeping line and column in step.
    fn advance_to(&mut self, offset: usize) {
        for c in self.text[self.offset..offset].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = offset;
    }
    fn skip_line(&mut self) {
        let length = self.rest().find('\n').unwrap_or(self.rest().len());
        self.advance_to(self.offset + length);
    }
    fn location(&self) -> Location {
        Location::new(Arc::clone(&self.name), self.line, self.column)
    }
    // The next raw token with its location and text. `None` once only trivia
    // is left.
    fn next_raw(&mut self) -> Option<(Result<RawToken, ()>, Location, String)> {
        let mut lexer = RawToken::lexer(self.rest());
        let Some(raw) = lexer.next() else {
            self.advance_to(self.text.len());
            return None;
        };
        let span = lexer.span();
        let slice = lexer.slice().to_owned();
        let base = self.offset;
        self.advance_to(base + span.start);
        let location = self.location();
        self.advance_to(base + span.end);
        Some((raw, location, slice))
    }
}

// ------------- Lexer -------------
/// Turns source text into tokens, following `#include` directives through an
/// [`Includer`]. Problems are collected as diagnostics and scanning goes on.
pub struct Lexer<'i> {
    current: Frame,
    suspended: Vec<Frame>,
    includer: &'i dyn Includer,
    max_include_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'i> Lexer<'i> {
    pub fn new(stream_name: &str, text: &str, includer: &'i dyn Includer, max_include_depth: usize) -> Self {
        Self {
            current: Frame::new(stream_name, text),
            suspended: Vec::new(),
            includer,
            max_include_depth,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics recorded since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, location: Location, message: String) {
        let diagnostic = Diagnostic::new(location, message);
        warn!(%diagnostic, "lexical error");
        self.diagnostics.push(diagnostic);
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            let Some((raw, location, slice)) = self.current.next_raw() else {
                match self.suspended.pop() {
                    Some(outer) => {
                        debug!(stream = %self.current.name, "finished include");
                        self.current = outer;
                        continue;
                    }
                    None => return token(TokenKind::End, String::new(), None, self.current.location()),
                }
            };
            let raw = match raw {
                Ok(raw) => raw,
                Err(()) => {
                    let c = slice.chars().next().unwrap_or_default();
                    self.report(location, format!("Unexpected character '{}'", c));
                    continue;
                }
            };
            match raw {
                RawToken::String => {
                    let text = self.unescape(&slice[1..slice.len() - 1], &location);
                    return token(TokenKind::String, text.clone(), Some(Value::String(text)), location);
                }
                RawToken::UnterminatedString => {
                    self.report(location.clone(), String::from("Unterminated string literal"));
                    let text = self.unescape(&slice[1..], &location);
                    return token(TokenKind::String, text.clone(), Some(Value::String(text)), location);
                }
                RawToken::Number => {
                    if let Some(number) = self.number(slice, location) {
                        return number;
                    }
                }
                RawToken::Word => {
                    let (kind, literal) = match slice.to_lowercase().as_str() {
                        "true" => (TokenKind::True, Some(Value::Boolean(true))),
                        "false" => (TokenKind::False, Some(Value::Boolean(false))),
                        "null" => (TokenKind::Null, Some(Value::Null)),
                        _ => (TokenKind::Identifier, None),
                    };
                    return token(kind, slice, literal, location);
                }
                RawToken::Assign => match Combinator::from_operator(&slice) {
                    Some(combinator) => return token(TokenKind::Assign(combinator), slice, None, location),
                    None => self.report(location, format!("Unknown assignment operator '{}'", slice)),
                },
                RawToken::Directive => self.directive(&slice[1..], location),
                RawToken::UnterminatedComment => {
                    self.report(location, String::from("Unterminated block comment"));
                    let end = self.current.text.len();
                    self.current.advance_to(end);
                }
                other => {
                    if let Some(kind) = other.punctuation() {
                        return token(kind, slice, None, location);
                    }
                }
            }
        }
    }

    // Decodes the escapes in a string literal's body. `start` is the location
    // of the opening quote.
    fn unescape(&mut self, body: &str, start: &Location) -> String {
        let mut text = String::new();
        let mut chars = body.chars().enumerate().peekable();
        while let Some((index, c)) = chars.next() {
            if c != '\\' {
                text.push(c);
                continue;
            }
            let at = Location::new(Arc::clone(&start.stream), start.line, start.column + 1 + index);
            match chars.next().map(|(_, escaped)| escaped) {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some('r') => text.push('\r'),
                Some('0') => text.push('\0'),
                Some('\\') => text.push('\\'),
                Some('"') => text.push('"'),
                Some('\'') => text.push('\''),
                Some('u') => {
                    let mut digits = String::new();
                    while digits.len() < 4 {
                        match chars.peek() {
                            Some((_, digit)) if digit.is_ascii_hexdigit() => {
                                digits.push(*digit);
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                        Some(decoded) if digits.len() == 4 => text.push(decoded),
                        _ => self.report(at, format!("Invalid unicode escape '\\u{}'", digits)),
                    }
                }
                Some(other) => {
                    self.report(at, format!("Unknown escape sequence '\\{}'", other));
                    text.push(other);
                }
                // a trailing backslash, only possible in an unterminated literal
                None => (),
            }
        }
        text
    }

    fn number(&mut self, lexeme: String, location: Location) -> Option<Token> {
        let literal = if let Some(captures) = HEXADECIMAL.captures(&lexeme) {
            // hexadecimal literals spell out a bit pattern, so the full 64 bits are usable
            u64::from_str_radix(&captures[1], 16).ok().map(|bits| Value::Integer(bits as i64))
        } else if DECIMAL.is_match(&lexeme) {
            lexeme.parse::<i64>().ok().map(Value::Integer)
        } else if FLOATING.is_match(&lexeme) {
            lexeme.parse::<f64>().ok().map(Value::Float)
        } else {
            self.report(location, format!("Malformed number '{}'", lexeme));
            return None;
        };
        match literal {
            Some(literal) => Some(token(TokenKind::Number, lexeme, Some(literal), location)),
            None => {
                self.report(location, format!("Number '{}' is out of range", lexeme));
                None
            }
        }
    }

    fn directive(&mut self, name: &str, location: Location) {
        if !name.eq_ignore_ascii_case("include") {
            self.current.skip_line();
            self.report(location, format!("Unknown directive '#{}'", name));
            return;
        }
        let (gap, quoted) = {
            let rest = self.current.rest();
            let gap = rest.find(|c| c != ' ' && c != '\t').unwrap_or(rest.len());
            (gap, rest[gap..].starts_with('"'))
        };
        if !quoted {
            self.current.skip_line();
            self.report(location, String::from("Expected a quoted path after #include"));
            return;
        }
        let path_offset = self.current.offset + gap;
        self.current.advance_to(path_offset);
        let path = match self.current.next_raw() {
            Some((Ok(RawToken::String), at, slice)) => self.unescape(&slice[1..slice.len() - 1], &at),
            Some((_, at, slice)) => {
                self.report(at.clone(), String::from("Unterminated string literal"));
                self.unescape(&slice[1..], &at)
            }
            None => return,
        };
        if self.suspended.len() >= self.max_include_depth {
            self.report(
                location,
                format!(
                    "Cannot include \"{}\": nesting exceeds the limit of {}",
                    path, self.max_include_depth
                ),
            );
            return;
        }
        match self.includer.include(&self.current.name, &path) {
            Ok(source) => {
                debug!(from = %self.current.name, stream = %source.name, "started include");
                let included = Frame::new(&source.name, &source.text);
                let outer = mem::replace(&mut self.current, included);
                self.suspended.push(outer);
            }
            Err(e) => self.report(location, format!("Unable to include \"{}\": {}", path, e)),
        }
    }
}

fn token(kind: TokenKind, lexeme: String, literal: Option<Value>, location: Location) -> Token {
    Token {
        kind,
        lexeme,
        literal,
        location,
    }
}
