/*!
Recursive‑descent parser producing the statement list of a program.

Time & Space
------------
* **n** = number of tokens (including the sole EOF).

Each token is consumed once via `advance()`; error recovery (`synchronize`)
discards tokens up to the next statement boundary.  Overall **Θ(n)** time; the
AST is O(n) space and call‑stack depth follows syntactic nesting.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths (`synchronize`)  | `debug`| Context before recovering.                |

### Error handling

Syntax errors are *accumulated*: a failing declaration is recorded, the parser
synchronizes to the next statement boundary and continues, so one run reports
every independent syntax error.  Too many arguments and an invalid assignment
target are recorded without unwinding at all.

--------------------------------------------------------------------------------
Grammar (EBNF)
--------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" function* "}" ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | forStmt | ifStmt | printStmt
               | returnStmt | whileStmt | block ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
block          → "{" declaration* "}" ;
parameters     → IDENT ( "," IDENT )* ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality  ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → expression ( "," expression )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "super" "." IDENT ;
```
*/

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprId, FunctionDecl, LiteralValue, LogicalOp, Stmt, Symbol, UnaryOp};
use crate::error::{LoxError, Result};
use crate::token::{Literal, Token, TokenKind};

use log::{debug, info};

/// Maximum number of parameters / call arguments.
const MAX_ARITY: usize = 255;

const EQUALITY: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::BangEqual, BinaryOp::NotEqual),
    (TokenKind::EqualEqual, BinaryOp::Equal),
];

const COMPARISON: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Greater, BinaryOp::Greater),
    (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
    (TokenKind::Less, BinaryOp::Less),
    (TokenKind::LessEqual, BinaryOp::LessEqual),
];

const TERM: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Minus, BinaryOp::Subtract),
    (TokenKind::Plus, BinaryOp::Add),
];

const FACTOR: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Star, BinaryOp::Multiply),
    (TokenKind::Slash, BinaryOp::Divide),
];

const UNARY: &[(TokenKind, UnaryOp)] = &[
    (TokenKind::Bang, UnaryOp::Not),
    (TokenKind::Minus, UnaryOp::Negate),
];

/// Stands in for the `EOF` of a token slice that lacks one.
const END: &Token<'static> = &Token {
    kind: TokenKind::Eof,
    lexeme: "",
    literal: None,
    line: 1,
};

/// Top‑level parser over an immutable slice of tokens.
///
/// The slice normally ends with the `EOF` token the scanner emits; the parser
/// never advances past it.  A slice without one (empty included) is parsed as
/// if it ended there.
pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,
    next_id: usize,
    errors: Vec<LoxError>,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            next_id: 0,
            errors: Vec::new(),
        }
    }

    /// Start numbering variable‑like nodes at `first`, so ids stay unique
    /// across several programs run in the same session.
    pub fn with_first_id(mut self, first: usize) -> Self {
        self.next_id = first;
        self
    }

    /// The id the next variable‑like node would receive.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program.  On failure every syntax error found is
    /// returned, in source order.
    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt>, Vec<LoxError>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if self.errors.is_empty() {
            info!("Parsed {} statement(s)", statements.len());
            Ok(statements)
        } else {
            info!("Parse failed with {} error(s)", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Parse a single expression followed by `EOF`.
    pub fn parse_expression(&mut self) -> std::result::Result<Expr, Vec<LoxError>> {
        info!("Parsing a single expression");

        let result: Result<Expr> = self.expression().and_then(|expr| {
            if self.is_at_end() {
                Ok(expr)
            } else {
                Err(LoxError::parse(self.peek(), "Expected end of expression"))
            }
        });

        match result {
            Ok(expr) if self.errors.is_empty() => Ok(expr),
            Ok(_) => Err(std::mem::take(&mut self.errors)),
            Err(e) => {
                self.errors.push(e);
                Err(std::mem::take(&mut self.errors))
            }
        }
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration; on error record it, resynchronize and yield nothing.
    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration");

        let result = if self.matches(TokenKind::Class) {
            self.class_declaration()
        } else if self.matches(TokenKind::Fun) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenKind::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Parse error, synchronizing: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    /// Parse declarations up to the closing `}`, recovering inside the block.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after block")?;
        Ok(statements)
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Symbol = self
            .consume(TokenKind::Identifier, "Expected class name")?
            .into();

        let superclass: Option<Expr> = if self.matches(TokenKind::Less) {
            let super_name: Symbol = self
                .consume(TokenKind::Identifier, "Expected superclass name")?
                .into();

            Some(Expr::Variable {
                id: self.fresh_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expected '{' before class body")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after class body")?;

        debug!("Parsed class '{}' with {} method(s)", name, methods.len());

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name: Symbol = self
            .consume(TokenKind::Identifier, &format!("Expected {} name", kind))?
            .into();

        self.consume(
            TokenKind::LeftParen,
            &format!("Expected '(' after {} name", kind),
        )?;

        let mut params: Vec<Symbol> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    let e = LoxError::parse(self.peek(), "Can't have more than 255 parameters");
                    self.errors.push(e);
                }

                params.push(
                    self.consume(TokenKind::Identifier, "Expected parameter name")?
                        .into(),
                );

                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "Expected ')' after parameters")?;

        self.consume(
            TokenKind::LeftBrace,
            &format!("Expected '{{' before {} body", kind),
        )?;
        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Symbol = self
            .consume(TokenKind::Identifier, "Expected variable name")?
            .into();

        let initializer: Option<Expr> = if self.matches(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after variable declaration",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        debug!("Entering statement at line {}", self.peek().line);

        if self.matches(TokenKind::For) {
            self.for_statement()
        } else if self.matches(TokenKind::If) {
            self.if_statement()
        } else if self.matches(TokenKind::While) {
            self.while_statement()
        } else if self.matches(TokenKind::Return) {
            self.return_statement()
        } else if self.matches(TokenKind::LeftBrace) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenKind::Print) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// `for` has no node of its own: it becomes
    /// `{ initializer; while (condition) { body; increment; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'for'")?;

        let initializer: Option<Stmt> = if self.matches(TokenKind::Semicolon) {
            None
        } else if self.matches(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after loop condition")?;

        let increment: Option<Expr> = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(LiteralValue::True));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let keyword: Symbol = self.previous().into();
        let value: Expr = self.expression()?;

        self.consume(TokenKind::Semicolon, "Expected ';' after value")?;

        Ok(Stmt::Print { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after condition")?;
        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Symbol = self.previous().into();
        let value: Option<Expr> = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expected ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenKind::Equal) {
            let equals: &Token<'_> = self.previous();
            let value: Expr = self.assignment()?;

            match expr {
                Expr::Variable { name, .. } => {
                    return Ok(Expr::Assign {
                        id: self.fresh_id(),
                        name,
                        value: Box::new(value),
                    });
                }

                Expr::Get { object, name } => {
                    return Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    });
                }

                other => {
                    // Reported, but the parser is not confused: keep going.
                    self.errors
                        .push(LoxError::parse(equals, "Invalid assignment target"));

                    return Ok(other);
                }
            }
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenKind::Or) {
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenKind::And) {
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(EQUALITY, Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(COMPARISON, Self::term)
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(TERM, Self::factor)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(FACTOR, Self::unary)
    }

    /// One left‑associative precedence level: `operand ( op operand )*`.
    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = operand(self)?;

        while let Some(operator) = self.match_operator(operators) {
            let line: usize = self.previous().line;
            let right: Expr = operand(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                line,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(operator) = self.match_operator(UNARY) {
            let line: usize = self.previous().line;
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                line,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenKind::Dot) {
                let name: Symbol = self
                    .consume(TokenKind::Identifier, "Expected property name after '.'")?
                    .into();

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let e = LoxError::parse(self.peek(), "Can't have more than 255 arguments");
                    self.errors.push(e);
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        let paren: Symbol = self
            .consume(TokenKind::RightParen, "Expected ')' after arguments")?
            .into();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.matches(TokenKind::False) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.matches(TokenKind::True) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.matches(TokenKind::Nil) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.check(TokenKind::Number) || self.check(TokenKind::String) {
            let literal: LiteralValue = match &self.advance().literal {
                Some(Literal::Number(n)) => LiteralValue::Number(*n),
                Some(Literal::Str(s)) => LiteralValue::Str(Rc::clone(s)),
                None => return Err(LoxError::parse(self.previous(), "Malformed literal")),
            };

            return Ok(Expr::Literal(literal));
        }

        if self.matches(TokenKind::Super) {
            let keyword: Symbol = self.previous().into();
            self.consume(TokenKind::Dot, "Expected '.' after 'super'")?;
            let method: Symbol = self
                .consume(TokenKind::Identifier, "Expected superclass method name")?
                .into();

            return Ok(Expr::Super {
                id: self.fresh_id(),
                keyword,
                method,
            });
        }

        if self.matches(TokenKind::This) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous().into(),
            });
        }

        if self.matches(TokenKind::Identifier) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous().into(),
            });
        }

        if self.matches(TokenKind::LeftParen) {
            let expr: Expr = self.expression()?;

            self.consume(TokenKind::RightParen, "Expected ')' after expression")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expected expression"))
    }

    // ────────────────────── utility helpers ───────────────────────

    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();

            return true;
        }

        false
    }

    /// Consume the next token if it is one of `operators`, yielding its operator.
    fn match_operator<Op: Copy>(&mut self, operators: &[(TokenKind, Op)]) -> Option<Op> {
        let kind: TokenKind = self.peek().kind;
        let (_, operator) = operators.iter().find(|(k, _)| *k == kind)?;

        self.advance();
        Some(*operator)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&'a Token<'a>> {
        if self.check(kind) {
            return Ok(self.advance());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().is(kind)
    }

    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().is(TokenKind::Eof)
    }

    /// The current token.  A slice without its `EOF` reads as if it had one.
    fn peek(&self) -> &'a Token<'a> {
        self.token_at(self.current)
    }

    fn previous(&self) -> &'a Token<'a> {
        self.token_at(self.current.saturating_sub(1))
    }

    fn token_at(&self, index: usize) -> &'a Token<'a> {
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last().filter(|t| t.is(TokenKind::Eof)))
            .unwrap_or(END)
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if self.previous().is(TokenKind::Semicolon) || self.peek().kind.starts_statement() {
                return;
            }

            self.advance();
        }
    }
}
