//! One‑pass, streaming lexer for Lox source text.
//!
//! [`Scanner`] is a [`FusedIterator`] over `Result<Token>`: every call to
//! `next` first skips trivia (whitespace, newlines, `//` comments), then
//! produces exactly one token or one lexical error.  Scanning resumes after an
//! error, so a single pass reports every lexical problem in the input.  The
//! stream always ends with one `EOF` token.
//!
//! Lexemes are zero‑copy slices of the source.  String and number literals
//! are decoded here, once, into the token's [`Literal`].  Comments and string
//! bodies are searched with `memchr`; keywords come from a perfect‑hash map.
//!
//! # Example
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("print 123; // example");
//! for result in &mut scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use std::iter::FusedIterator;
use std::rc::Rc;

use log::{debug, info};
use memchr::{memchr, memchr_iter};
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Literal, Token, TokenKind};

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "and"    => TokenKind::And,
    "class"  => TokenKind::Class,
    "else"   => TokenKind::Else,
    "false"  => TokenKind::False,
    "fun"    => TokenKind::Fun,
    "for"    => TokenKind::For,
    "if"     => TokenKind::If,
    "nil"    => TokenKind::Nil,
    "or"     => TokenKind::Or,
    "print"  => TokenKind::Print,
    "return" => TokenKind::Return,
    "super"  => TokenKind::Super,
    "this"   => TokenKind::This,
    "true"   => TokenKind::True,
    "var"    => TokenKind::Var,
    "while"  => TokenKind::While,
};

pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    /// First byte of the token being scanned.
    start: usize,
    pos: usize,
    line: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        info!("Scanner created over {} bytes", source.len());

        Self {
            source,
            bytes: source.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `offset` positions ahead, or `0` past the end.
    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if !self.at_end() && self.bytes[self.pos] == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, accept: impl Fn(u8) -> bool) {
        while !self.at_end() && accept(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.pos]
    }

    fn token(&self, kind: TokenKind) -> Token<'a> {
        Token::new(kind, self.lexeme(), self.line)
    }

    /// `matched` when the next byte is `next` (consuming it), else `single`.
    fn either(&mut self, next: u8, matched: TokenKind, single: TokenKind) -> Token<'a> {
        let kind = if self.eat(next) { matched } else { single };
        self.token(kind)
    }

    fn skip_trivia(&mut self) {
        while !self.at_end() {
            match self.bytes[self.pos] {
                b' ' | b'\r' | b'\t' => self.pos += 1,

                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }

                // The newline ending the comment is left for the next round.
                b'/' if self.peek_at(1) == b'/' => {
                    self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos + offset,
                        None => self.bytes.len(),
                    };
                }

                _ => return,
            }
        }
    }

    /// Scan the token starting at `self.start`; trivia is already skipped.
    fn scan_token(&mut self) -> Result<Token<'a>> {
        let byte: u8 = self.bytes[self.pos];
        self.pos += 1;

        let kind: TokenKind = match byte {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'-' => TokenKind::Minus,
            b'+' => TokenKind::Plus,
            b';' => TokenKind::Semicolon,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,

            b'!' => return Ok(self.either(b'=', TokenKind::BangEqual, TokenKind::Bang)),
            b'=' => return Ok(self.either(b'=', TokenKind::EqualEqual, TokenKind::Equal)),
            b'<' => return Ok(self.either(b'=', TokenKind::LessEqual, TokenKind::Less)),
            b'>' => return Ok(self.either(b'=', TokenKind::GreaterEqual, TokenKind::Greater)),

            b'"' => return self.string(),
            b'0'..=b'9' => return Ok(self.number()),
            b if b.is_ascii_alphabetic() || b == b'_' => return Ok(self.identifier()),

            _ => return Err(self.unexpected_character()),
        };

        Ok(self.token(kind))
    }

    /// The opening quote is consumed.  The token's line is the line of the
    /// closing quote.
    fn string(&mut self) -> Result<Token<'a>> {
        let rest: &'a [u8] = &self.bytes[self.pos..];

        let Some(close) = memchr(b'"', rest) else {
            self.line += memchr_iter(b'\n', rest).count();
            self.pos = self.bytes.len();

            return Err(LoxError::lex(self.line, "Unterminated string."));
        };

        let body: &'a str = &self.source[self.pos..self.pos + close];
        self.line += memchr_iter(b'\n', body.as_bytes()).count();
        self.pos += close + 1;

        Ok(Token::with_literal(
            TokenKind::String,
            self.lexeme(),
            Literal::Str(Rc::from(body)),
            self.line,
        ))
    }

    /// Digits with an optional fraction; a `.` not followed by a digit is
    /// left for the next token.
    fn number(&mut self) -> Token<'a> {
        self.eat_while(|b| b.is_ascii_digit());

        if self.peek_at(0) == b'.' && self.peek_at(1).is_ascii_digit() {
            self.pos += 1;
            self.eat_while(|b| b.is_ascii_digit());
        }

        // `digits[.digits]` always parses
        let value: f64 = self.lexeme().parse().unwrap_or_default();

        Token::with_literal(TokenKind::Number, self.lexeme(), Literal::Number(value), self.line)
    }

    fn identifier(&mut self) -> Token<'a> {
        self.eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');

        let kind: TokenKind = KEYWORDS
            .get(self.lexeme())
            .copied()
            .unwrap_or(TokenKind::Identifier);

        self.token(kind)
    }

    /// Skips the whole UTF‑8 sequence so a multi‑byte character is reported once.
    fn unexpected_character(&mut self) -> LoxError {
        let ch: char = self.source[self.start..]
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.pos = self.start + ch.len_utf8();

        LoxError::lex(self.line, format!("Unexpected character: {}", ch))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.skip_trivia();
        self.start = self.pos;

        if self.at_end() {
            self.finished = true;
            return Some(Ok(Token::eof(self.line)));
        }

        let result: Result<Token<'a>> = self.scan_token();

        if let Ok(token) = &result {
            debug!("Scanned {} '{}' on line {}", token.kind, token.lexeme, token.line);
        }

        Some(result)
    }
}

impl FusedIterator for Scanner<'_> {}

/// Scan the whole of `source`, splitting the output into the token stream
/// (always ending in `EOF`) and every lexical error encountered on the way.
pub fn scan_all(source: &str) -> (Vec<Token<'_>>, Vec<LoxError>) {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} lexical error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
