//! Runtime scopes, stored in an arena and addressed by [`EnvId`].
//!
//! Environments form a parent‑linked chain (`enclosing`).  Closures refer to
//! the environment they captured by id rather than by shared pointer, so a
//! closure that is reachable from its own captured scope cannot keep itself
//! alive: the arena owns every environment of a session and drops them as a
//! unit.
//!
//! A parent always has a smaller id than its children.  When a block or call
//! exits, its environment is popped if it is the newest one and nothing
//! captured it, which keeps closure‑free loops in constant space.

use std::collections::HashMap;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// Index of an environment in the [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

/// The global scope: created with the arena, never released.
pub const GLOBAL: EnvId = EnvId(0);

#[derive(Debug, Default)]
struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
    captured: bool,
}

#[derive(Debug)]
pub struct Environments {
    envs: Vec<Environment>,
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

impl Environments {
    pub fn new() -> Self {
        Environments {
            envs: vec![Environment::default()],
        }
    }

    /// Number of live environments, the global one included.
    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    /// Allocate a fresh, empty scope enclosed by `enclosing`.
    pub fn push(&mut self, enclosing: EnvId) -> EnvId {
        let id = EnvId(self.envs.len());

        self.envs.push(Environment {
            enclosing: Some(enclosing),
            ..Environment::default()
        });

        id
    }

    /// Mark `id` as referenced by a function value; it will never be released.
    pub fn capture(&mut self, id: EnvId) {
        self.envs[id.0].captured = true;
    }

    /// Give back a scope that has just been exited.
    pub fn release(&mut self, id: EnvId) {
        if id != GLOBAL && id.0 + 1 == self.envs.len() && !self.envs[id.0].captured {
            self.envs.pop();
        }
    }

    pub fn enclosing(&self, id: EnvId) -> Option<EnvId> {
        self.envs[id.0].enclosing
    }

    /// Bind `name` in exactly this scope, shadowing or redefining it.
    pub fn define(&mut self, id: EnvId, name: &str, value: Value) {
        self.envs[id.0].values.insert(name.to_string(), value);
    }

    /// Look `name` up, walking the chain from `id` outward.
    pub fn get(&self, id: EnvId, name: &str, line: usize) -> Result<Value> {
        let mut current: Option<EnvId> = Some(id);

        while let Some(env) = current {
            if let Some(value) = self.envs[env.0].values.get(name) {
                return Ok(value.clone());
            }

            current = self.envs[env.0].enclosing;
        }

        Err(undefined(name, line))
    }

    /// Assign an existing binding, walking the chain from `id` outward.
    pub fn assign(&mut self, id: EnvId, name: &str, value: Value, line: usize) -> Result<()> {
        let mut current: Option<EnvId> = Some(id);

        while let Some(env) = current {
            if let Some(slot) = self.envs[env.0].values.get_mut(name) {
                *slot = value;
                return Ok(());
            }

            current = self.envs[env.0].enclosing;
        }

        Err(undefined(name, line))
    }

    /// The environment `distance` hops up the chain from `id`.
    pub fn ancestor(&self, id: EnvId, distance: usize) -> Option<EnvId> {
        let mut env: EnvId = id;

        for _ in 0..distance {
            env = self.envs[env.0].enclosing?;
        }

        Some(env)
    }

    /// Read `name` from the scope exactly `distance` hops away.
    pub fn get_at(&self, id: EnvId, distance: usize, name: &str, line: usize) -> Result<Value> {
        debug!("get_at '{}' distance={} from {:?}", name, distance, id);

        self.ancestor(id, distance)
            .and_then(|env| self.envs[env.0].values.get(name).cloned())
            .ok_or_else(|| undefined(name, line))
    }

    /// Assign `name` in the scope exactly `distance` hops away.
    pub fn assign_at(
        &mut self,
        id: EnvId,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        debug!("assign_at '{}' distance={} from {:?}", name, distance, id);

        let env: EnvId = self
            .ancestor(id, distance)
            .ok_or_else(|| undefined(name, line))?;

        match self.envs[env.0].values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name, line)),
        }
    }
}

fn undefined(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}
