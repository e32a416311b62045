//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, misplaced
//!    `return` / `this` / `super`, self‑inheritance).  The first error stops
//!    the pass.
//!
//!    Inside its own initializer a local name still refers to the binding it
//!    shadows: `var a = 1; { var a = a + 1; }` reads the outer `a`.  Only when
//!    no enclosing scope and no global declares the name is the read an error.
//! 3. Tell the interpreter, for *each* variable occurrence, how many scopes out
//!    its binding lives.  Occurrences found in no scope are globals and are
//!    left unrecorded.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt, Symbol};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use log::{debug, info};

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we inside a class body?  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances by calling back into the interpreter.
pub struct Resolver<'a, 'i, W: Write> {
    interpreter: &'i mut Interpreter<W>,
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    globals: HashSet<&'a str>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a, 'i, W: Write> Resolver<'a, 'i, W> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'i mut Interpreter<W>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            globals: HashSet::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &'a [Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s)?;
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so `var a = a;`
                // is caught in a local scope
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // the name is visible *inside* its own body (recursion)
                self.declare(&declaration.name)?;
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function)?;
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods)?,

            Stmt::Expression(expr) | Stmt::Print { value: expr, .. } => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword.line,
                            &keyword.lexeme,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }
            }
        }

        Ok(())
    }

    fn resolve_class(
        &mut self,
        name: &'a Symbol,
        superclass: Option<&'a Expr>,
        methods: &'a [Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Resolving class '{}'", name);

        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name)?;
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    return Err(LoxError::resolve(
                        super_name.line,
                        &super_name.lexeme,
                        "A class can't inherit from itself.",
                    ));
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass)?;

            // synthetic scope holding `super`, mirrored at runtime
            self.begin_scope();
            self.bind_synthetic("super");
        }

        // synthetic scope holding `this`, mirrored by method binding
        self.begin_scope();
        self.bind_synthetic("this");

        for method in methods {
            let kind: FunctionType = if &*method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, kind)?;
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name } => {
                let initializing: bool = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(&*name.lexeme) == Some(&false));

                if !initializing {
                    self.resolve_local(*id, name, 0);
                } else if !self.resolve_local(*id, name, 1) && !self.is_global(name) {
                    // `{ var a = a; }` with no outer `a` to read from
                    return Err(LoxError::resolve(
                        name.line,
                        &name.lexeme,
                        "Can't read local variable in its own initializer.",
                    ));
                }
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value)?;
                self.resolve_local(*id, name, 0);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object)?,

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)?;
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, keyword, 0);
            }

            Expr::Super { id, keyword, .. } => match self.current_class {
                ClassType::None => {
                    return Err(LoxError::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't use 'super' outside of a class.",
                    ));
                }

                ClassType::Class => {
                    return Err(LoxError::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                }

                ClassType::Subclass => {
                    self.resolve_local(*id, keyword, 0);
                }
            },
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, function: &'a FunctionDecl, kind: FunctionType) -> Result<()> {
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &function.params {
            self.declare(param)?;
            self.define(param);
        }
        for stmt in &function.body {
            self.resolve_stmt(stmt)?;
        }
        self.end_scope();

        self.current_function = enclosing;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind_synthetic(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Globals may be redeclared; locals may not.
    fn declare(&mut self, name: &'a Symbol) -> Result<()> {
        if self.scopes.is_empty() {
            self.globals.insert(&name.lexeme);
        }

        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&*name.lexeme) {
                return Err(LoxError::resolve(
                    name.line,
                    &name.lexeme,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(&name.lexeme, false);
        }
        Ok(())
    }

    fn define(&mut self, name: &'a Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(&name.lexeme, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local, searching outward from `skip`
    /// scopes above the innermost one.  Returns `false` when no local scope
    /// declares the name, leaving it global.
    fn resolve_local(&mut self, id: ExprId, name: &Symbol, skip: usize) -> bool {
        let found: Option<usize> = self
            .scopes
            .iter()
            .rev()
            .enumerate()
            .skip(skip)
            .find(|(_, scope)| scope.contains_key(&*name.lexeme))
            .map(|(depth, _)| depth);

        match found {
            Some(depth) => {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                true
            }
            None => {
                debug!("Resolved '{}' as global", name.lexeme);
                false
            }
        }
    }

    /// Declared at top level earlier in this program, or by an earlier run
    /// of the session (natives included).
    fn is_global(&self, name: &Symbol) -> bool {
        self.globals.contains(&*name.lexeme) || self.interpreter.global(&name.lexeme).is_some()
    }
}
