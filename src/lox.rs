//! The reusable interpreter session.
//!
//! A [`Lox`] owns everything that must survive between programs fed to the
//! same session (the REPL feeds one line at a time): the global environment,
//! the instance heap, the resolution table and the node‑id counter.  Nothing
//! else persists; each [`Lox::run`] builds its own scanner, parser and
//! resolver.

use std::io::{self, Stdout, Write};

use log::{debug, info};

use crate::ast::Stmt;
use crate::error::{Diagnostics, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_all;
use crate::value::Value;

pub struct Lox<W: Write = Stdout> {
    interpreter: Interpreter<W>,
    next_id: usize,
}

impl Lox<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Lox<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Lox<W> {
    pub fn with_output(out: W) -> Self {
        Lox {
            interpreter: Interpreter::with_output(out),
            next_id: 0,
        }
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter<W> {
        &mut self.interpreter
    }

    /// Read a global binding left behind by earlier runs.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.interpreter.global(name)
    }

    /// Scan, parse, resolve and execute `source`.
    ///
    /// Lexical and syntax errors are reported together and prevent
    /// resolution; a resolution error prevents execution; a runtime error
    /// aborts the rest of the program, keeping output already written.
    pub fn run(&mut self, source: &str) -> Result<(), Diagnostics> {
        info!("Running program of {} bytes", source.len());

        let statements: Vec<Stmt> = self.parse_program(source)?;

        debug!("Resolving {} statement(s)", statements.len());
        Resolver::new(&mut self.interpreter).resolve(&statements)?;

        self.interpreter.interpret(&statements)?;

        info!("Program executed successfully");
        Ok(())
    }

    fn parse_program(&mut self, source: &str) -> Result<Vec<Stmt>, Diagnostics> {
        let (tokens, mut errors): (_, Vec<LoxError>) = scan_all(source);

        let mut parser = Parser::new(&tokens).with_first_id(self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();

        match parsed {
            Ok(statements) if errors.is_empty() => Ok(statements),
            Ok(_) => Err(Diagnostics::new(errors)),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                errors.sort_by_key(|e| e.line());
                Err(Diagnostics::new(errors))
            }
        }
    }
}
