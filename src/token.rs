//! Tokens produced by the [`Scanner`](crate::scanner::Scanner).
//!
//! A [`Token`] borrows its lexeme from the source; literal payloads are
//! decoded once, at scan time, into a [`Literal`] the parser hands straight
//! to the AST.

use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

/// Declares [`TokenKind`] together with the canonical name used by the token
/// dump and the JSON output.
macro_rules! token_kinds {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum TokenKind {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl TokenKind {
            pub fn name(self) -> &'static str {
                match self {
                    $(TokenKind::$variant => $name,)*
                }
            }
        }
    };
}

token_kinds! {
    LeftParen => "LEFT_PAREN",
    RightParen => "RIGHT_PAREN",
    LeftBrace => "LEFT_BRACE",
    RightBrace => "RIGHT_BRACE",
    Comma => "COMMA",
    Dot => "DOT",
    Minus => "MINUS",
    Plus => "PLUS",
    Semicolon => "SEMICOLON",
    Slash => "SLASH",
    Star => "STAR",

    Bang => "BANG",
    BangEqual => "BANG_EQUAL",
    Equal => "EQUAL",
    EqualEqual => "EQUAL_EQUAL",
    Greater => "GREATER",
    GreaterEqual => "GREATER_EQUAL",
    Less => "LESS",
    LessEqual => "LESS_EQUAL",

    Identifier => "IDENTIFIER",
    String => "STRING",
    Number => "NUMBER",

    And => "AND",
    Class => "CLASS",
    Else => "ELSE",
    False => "FALSE",
    Fun => "FUN",
    For => "FOR",
    If => "IF",
    Nil => "NIL",
    Or => "OR",
    Print => "PRINT",
    Return => "RETURN",
    Super => "SUPER",
    This => "THIS",
    True => "TRUE",
    Var => "VAR",
    While => "WHILE",

    Eof => "EOF",
}

impl TokenKind {
    /// Kinds that open a statement; the parser resynchronizes on them.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded value of a `NUMBER` or `STRING` token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),

    /// Contents without the surrounding quotes.
    Str(Rc<str>),
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Number(n) => serializer.serialize_f64(*n),
            Literal::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Literal {
    /// Numbers always show a fractional part: `3` prints as `3.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(s),

            Literal::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                let mut buf: itoa::Buffer = itoa::Buffer::new();

                write!(f, "{}.0", buf.format(*n as i64))
            }

            Literal::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A scanned token: kind, source slice, decoded literal and line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,

    /// The exact substring of the source that produced this token.
    pub lexeme: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,

    /// 1‑based line number in the source.
    pub line: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, lexeme: &'a str, line: usize) -> Self {
        Self {
            kind,
            lexeme,
            literal: None,
            line,
        }
    }

    pub fn with_literal(kind: TokenKind, lexeme: &'a str, literal: Literal, line: usize) -> Self {
        Self {
            kind,
            lexeme,
            literal: Some(literal),
            line,
        }
    }

    /// The end‑of‑input marker.
    pub fn eof(line: usize) -> Self {
        Self::new(TokenKind::Eof, "", line)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token<'_> {
    /// `KIND lexeme literal`, with `null` standing in for a missing literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "{} {} {}", self.kind, self.lexeme, literal),
            None => write!(f, "{} {} null", self.kind, self.lexeme),
        }
    }
}
