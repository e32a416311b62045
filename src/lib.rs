//! `rox`: a tree-walking interpreter for the Lox scripting language.
//!
//! The pipeline is scanner → parser → resolver → interpreter; [`Lox`] wires
//! the four passes into a reusable session.

pub mod ast;
pub mod ast_printer;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lox;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use error::{Diagnostics, LoxError, Result};
pub use lox::Lox;
