//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime) convert their internal
//! failure modes into one of the variants defined here.  A single run of a
//! program surfaces its failures to the driver as [`Diagnostics`], which keeps
//! every individual error (kind, message, line) intact.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenKind};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `at` is either ` at 'lexeme'` or ` at end`.
    #[error("[line {line}] Error{at}: {message}")]
    Parse {
        message: String,
        line: usize,
        at: String,
    },

    /// Static‑analysis failure detected by the resolver.
    #[error("[line {line}] Error{at}: {message}")]
    Resolve {
        message: String,
        line: usize,
        at: String,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on output writes.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**; the location is taken from `token`.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        let at: String = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            _ => format!(" at '{}'", token.lexeme),
        };

        info!(
            "Creating Parse error: line={}, at={}, msg={}",
            token.line, at, message
        );

        LoxError::Parse {
            message,
            line: token.line,
            at,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, lexeme: &str, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, lexeme={}, msg={}",
            line, lexeme, message
        );

        LoxError::Resolve {
            message,
            line,
            at: format!(" at '{}'", lexeme),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// Source line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) => None,
        }
    }

    /// The bare message without location decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            LoxError::Io(e) => e.to_string(),
        }
    }

    /// Runtime and I/O failures happen while the program is executing;
    /// everything else is detected before the first statement runs.
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime { .. } | LoxError::Io(_))
    }
}

/// Every error produced by one run of a program.
///
/// Lexical and syntax errors are accumulated, so a failed run may carry
/// several of them; resolution and runtime failures stop their phase at the
/// first occurrence and therefore arrive alone.
#[derive(Debug, Error)]
pub struct Diagnostics(Vec<LoxError>);

impl Diagnostics {
    pub fn new(errors: Vec<LoxError>) -> Self {
        Diagnostics(errors)
    }

    pub fn errors(&self) -> &[LoxError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<LoxError> {
        self.0
    }

    /// `true` when the run failed during execution rather than before it.
    pub fn is_runtime(&self) -> bool {
        self.0.iter().any(LoxError::is_runtime)
    }
}

impl From<LoxError> for Diagnostics {
    fn from(error: LoxError) -> Self {
        Diagnostics(vec![error])
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }

            write!(f, "{}", error)?;
        }

        Ok(())
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
