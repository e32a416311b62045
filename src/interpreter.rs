//! Tree‑walking evaluator.
//!
//! Statements execute against an arena of environments (see
//! [`crate::environment`]).  Runtime errors travel through
//! [`Result`]; a `return` travels separately as [`Flow::Return`], so the two
//! never share a recovery path.

use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{BinaryOp, Expr, ExprId, FunctionDecl, LiteralValue, LogicalOp, Stmt, Symbol, UnaryOp};
use crate::environment::{EnvId, Environments, GLOBAL};
use crate::error::{LoxError, Result};
use crate::value::{Heap, Instance, LoxClass, LoxFunction, NativeFunction, Value};

/// Deepest chain of nested calls before a program fails with "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 128;

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    /// Fell through to the next statement.
    Normal,

    /// A `return` is unwinding to the nearest call boundary.
    Return(Value),
}

pub struct Interpreter<W: Write = Stdout> {
    out: W,
    environments: Environments,
    environment: EnvId,
    heap: Heap,
    locals: HashMap<ExprId, usize>,
    /// Calls currently executing.
    depth: usize,
}

impl Interpreter<Stdout> {
    /// Creates an Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates an Interpreter writing `print` output to `out` and defines
    /// native functions such as `clock`.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let mut environments = Environments::new();

        debug!("Defining native function 'clock'");

        environments.define(
            GLOBAL,
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            })),
        );

        Self {
            out,
            environments,
            environment: GLOBAL,
            heap: Heap::new(),
            locals: HashMap::new(),
            depth: 0,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Register an additional built‑in in the global scope.
    pub fn define_native(&mut self, native: NativeFunction) {
        let name: &'static str = native.name;

        self.environments
            .define(GLOBAL, name, Value::NativeFunction(Rc::new(native)));
    }

    /// Read a global binding, if present.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.environments.get(GLOBAL, name, 0).ok()
    }

    /// Number of scopes currently held, the global one included.
    pub fn environment_count(&self) -> usize {
        self.environments.len()
    }

    /// Called by the resolver: `id` refers to a binding `depth` scopes out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            // A top‑level `return` is rejected by the resolver.
            self.execute(stmt)?;
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print { keyword, value } => {
                let value: Value = self.evaluate(value)?;
                let text: String = stringify(&value, keyword.line)?;

                writeln!(self.out, "{}", text)?;
                debug!("Printed value: {}", text);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name, value);

                self.environments
                    .define(self.environment, &name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env: EnvId = self.environments.push(self.environment);
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name);

                let function: LoxFunction = self.make_function(declaration, self.environment, false);

                self.environments.define(
                    self.environment,
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Runs `statements` inside `env`, restoring (and releasing) it afterwards
    /// whatever the outcome.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvId) -> Result<Flow> {
        let previous: EnvId = self.environment;
        self.environment = env;

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        self.environments.release(env);

        result
    }

    fn execute_class(
        &mut self,
        name: &Symbol,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        debug!("Declaring class '{}'", name);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let line: usize = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environments
            .define(self.environment, &name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra scope holding `super`.
        let method_env: EnvId = match &superclass {
            Some(superclass) if !methods.is_empty() => {
                let env: EnvId = self.environments.push(self.environment);
                self.environments
                    .define(env, "super", Value::Class(Rc::clone(superclass)));
                env
            }
            _ => self.environment,
        };

        let methods: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let is_initializer: bool = &*method.name.lexeme == "init";
                let function: LoxFunction = self.make_function(method, method_env, is_initializer);

                (method.name.lexeme.to_string(), Rc::new(function))
            })
            .collect();

        let class = LoxClass {
            name: Rc::clone(&name.lexeme),
            superclass,
            methods,
        };

        self.environments.assign(
            self.environment,
            &name.lexeme,
            Value::Class(Rc::new(class)),
            name.line,
        )?;

        info!("Class '{}' defined", name);
        Ok(Flow::Normal)
    }

    fn make_function(
        &mut self,
        declaration: &Rc<FunctionDecl>,
        closure: EnvId,
        is_initializer: bool,
    ) -> LoxFunction {
        self.environments.capture(closure);

        LoxFunction {
            declaration: Rc::clone(declaration),
            closure,
            is_initializer,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(Rc::clone(s)),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                line,
                right,
            } => self.evaluate_unary(*operator, *line, right),

            Expr::Binary {
                left,
                operator,
                line,
                right,
            } => self.evaluate_binary(left, *operator, *line, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                let short_circuits: bool = match operator {
                    LogicalOp::Or => left_val.is_truthy(),
                    LogicalOp::And => !left_val.is_truthy(),
                };

                if short_circuits {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => self.environments.assign_at(
                        self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => {
                        self.environments
                            .assign(GLOBAL, &name.lexeme, value.clone(), name.line)?
                    }
                }

                debug!("Assigned value {} to '{}'", value, name);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.call_value(callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => self.get_property(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let instance: Instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    _ => {
                        return Err(LoxError::runtime(name.line, "Only instances have fields."));
                    }
                };

                let value: Value = self.evaluate(value)?;
                self.heap.set_field(&instance, &name.lexeme, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Symbol) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => {
                self.environments
                    .get_at(self.environment, distance, &name.lexeme, name.line)
            }
            None => self.environments.get(GLOBAL, &name.lexeme, name.line),
        }
    }

    fn evaluate_unary(&mut self, operator: UnaryOp, line: usize, right: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(right)?;

        match (operator, right_val) {
            (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Negate, _) => Err(LoxError::runtime(line, "Operand must be a number.")),
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: BinaryOp,
        line: usize,
        right: &Expr,
    ) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        debug!("Binary '{}': left={}, right={}", operator, left_val, right_val);

        match operator {
            BinaryOp::Equal => Ok(Value::Bool(left_val == right_val)),
            BinaryOp::NotEqual => Ok(Value::Bool(left_val != right_val)),

            BinaryOp::Add => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => {
                    let mut joined: String = String::with_capacity(a.len() + b.len());
                    joined.push_str(&a);
                    joined.push_str(&b);
                    Ok(Value::String(Rc::from(joined)))
                }
                _ => Err(LoxError::runtime(
                    line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            BinaryOp::Subtract => numbers(line, left_val, right_val).map(|(a, b)| Value::Number(a - b)),
            BinaryOp::Multiply => numbers(line, left_val, right_val).map(|(a, b)| Value::Number(a * b)),
            BinaryOp::Divide => numbers(line, left_val, right_val).map(|(a, b)| Value::Number(a / b)),
            BinaryOp::Less => numbers(line, left_val, right_val).map(|(a, b)| Value::Bool(a < b)),
            BinaryOp::LessEqual => numbers(line, left_val, right_val).map(|(a, b)| Value::Bool(a <= b)),
            BinaryOp::Greater => numbers(line, left_val, right_val).map(|(a, b)| Value::Bool(a > b)),
            BinaryOp::GreaterEqual => {
                numbers(line, left_val, right_val).map(|(a, b)| Value::Bool(a >= b))
            }
        }
    }

    fn get_property(&mut self, instance: &Instance, name: &Symbol) -> Result<Value> {
        if let Some(value) = self.heap.get_field(instance, &name.lexeme) {
            return Ok(value);
        }

        match instance.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(self.bind(&method, instance))),
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Symbol, method: &Symbol) -> Result<Value> {
        let distance: usize = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass: Rc<LoxClass> =
            match self
                .environments
                .get_at(self.environment, distance, "super", keyword.line)?
            {
                Value::Class(class) => class,
                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Superclass must be a class.",
                    ))
                }
            };

        // `this` always lives in the scope just inside the one holding `super`.
        let object: Instance = match self.environments.get_at(
            self.environment,
            distance.saturating_sub(1),
            "this",
            keyword.line,
        )? {
            Value::Instance(instance) => instance,
            _ => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Can't use 'super' outside of a method.",
                ))
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(self.bind(&found, &object))),
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Produce a copy of `method` whose closure binds `this` to `instance`.
    ///
    /// The `this` scope is not marked captured: [`Self::release_unshared`]
    /// gives it back after a call unless the bound method was stored.
    fn bind(&mut self, method: &LoxFunction, instance: &Instance) -> Rc<LoxFunction> {
        let env: EnvId = self.environments.push(method.closure);
        self.environments
            .define(env, "this", Value::Instance(instance.clone()));

        Rc::new(LoxFunction {
            declaration: Rc::clone(&method.declaration),
            closure: env,
            is_initializer: method.is_initializer,
        })
    }

    /// Drop the last handle to a called function; a bound method nobody kept
    /// releases its `this` scope.
    fn release_unshared(&mut self, function: Rc<LoxFunction>) {
        if Rc::strong_count(&function) == 1 {
            self.environments.release(function.closure);
        }
    }

    fn enter_call(&mut self, paren: &Symbol) -> Result<()> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren.line, "Stack overflow."));
        }

        self.depth += 1;
        Ok(())
    }

    /// Invokes a callable (native function, user function or class).
    fn call_value(&mut self, callee: Value, paren: &Symbol, args: Vec<Value>) -> Result<Value> {
        let arity: usize = match &callee {
            Value::NativeFunction(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(LoxError::runtime(
                    paren.line,
                    "Can only call functions and classes.",
                ));
            }
        };

        if args.len() != arity {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        match callee {
            Value::NativeFunction(native) => {
                debug!("Calling native function '{}'", native.name);

                let result: Value =
                    (native.func)(&args).map_err(|e| LoxError::runtime(paren.line, e))?;

                debug!("Native function '{}' returned: {}", native.name, result);
                Ok(result)
            }

            Value::Function(function) => {
                self.enter_call(paren)?;
                let result: Result<Value> = self.call_function(&function, args);
                self.depth -= 1;

                self.release_unshared(function);
                result
            }

            Value::Class(class) => {
                debug!("Instantiating class '{}'", class.name);

                let instance: Instance = self.heap.alloc(Rc::clone(&class));

                if let Some(initializer) = class.find_method("init") {
                    self.enter_call(paren)?;
                    let bound: Rc<LoxFunction> = self.bind(&initializer, &instance);
                    let result: Result<Value> = self.call_function(&bound, args);
                    self.depth -= 1;

                    self.release_unshared(bound);
                    result?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    fn call_function(&mut self, function: &LoxFunction, args: Vec<Value>) -> Result<Value> {
        let declaration: &FunctionDecl = &function.declaration;

        debug!("Calling user-defined function '{}'", declaration.name);

        let env: EnvId = self.environments.push(function.closure);

        for (param, arg) in declaration.params.iter().zip(args) {
            self.environments.define(env, &param.lexeme, arg);
        }

        let flow: Flow = self.execute_block(&declaration.body, env)?;

        if function.is_initializer {
            // An initializer always yields its instance.
            return self.environments.get_at(
                function.closure,
                0,
                "this",
                declaration.name.line,
            );
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// Both operands of an arithmetic or comparison operator, which must be numbers.
fn numbers(line: usize, left: Value, right: Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(LoxError::runtime(line, "Operands must be numbers.")),
    }
}

/// Text written by `print`.  Only `nil`, numbers and strings are printable.
fn stringify(value: &Value, line: usize) -> Result<String> {
    match value {
        Value::Nil => Ok("nil".to_string()),
        Value::Number(_) => Ok(value.to_string()),
        Value::String(s) => Ok(s.to_string()),
        other => Err(LoxError::runtime(
            line,
            format!("Invalid value type '{}'.", other.type_name()),
        )),
    }
}

/// Native `clock()`: seconds since the Unix epoch.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    let millis: i64 = Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}
