use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single scope: name bindings plus an optional link to the enclosing
/// scope. Chains of environments run from the innermost active scope out to
/// the globals. Scopes are shared by reference between the execution frame
/// that created them and any closures formed while they were active, so a
/// mutation through one holder is visible to all of them.
#[derive(Debug, Clone)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditional insert/overwrite in this scope. Redeclaration is
    /// allowed; enclosing scopes are never consulted.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Exact-match lookup here, delegating outward through the chain.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeError::undefined_variable(name))
        }
    }

    /// Overwrite an existing binding here or in an enclosing scope. Never
    /// defines a new binding.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeError::undefined_variable(name))
        }
    }

    /// Read a binding exactly `distance` enclosing-links up the chain.
    ///
    /// The resolver guarantees the scope at that distance exists and holds
    /// the name; a violation is an internal bug, not a user error, and
    /// aborts the run.
    pub fn get_at(&self, distance: usize, name: &str) -> Value {
        if distance == 0 {
            return self
                .values
                .get(name)
                .unwrap_or_else(|| {
                    panic!("resolver inconsistency: no binding for '{name}' in resolved scope")
                })
                .clone();
        }

        let scope = self.ancestor(distance);
        let scope = scope.borrow();

        scope
            .values
            .get(name)
            .unwrap_or_else(|| {
                panic!(
                    "resolver inconsistency: no binding for '{name}' at distance {distance}"
                )
            })
            .clone()
    }

    /// Overwrite a binding exactly `distance` enclosing-links up the chain.
    /// Same contract as [`Environment::get_at`]: a missing scope or binding
    /// aborts the run.
    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Value) {
        if distance == 0 {
            if !self.values.contains_key(&name.lexeme) {
                panic!(
                    "resolver inconsistency: no binding for '{}' in resolved scope",
                    name.lexeme
                );
            }
            self.values.insert(name.lexeme.clone(), value);
            return;
        }

        let scope = self.ancestor(distance);
        let mut scope = scope.borrow_mut();

        if !scope.values.contains_key(&name.lexeme) {
            panic!(
                "resolver inconsistency: no binding for '{}' at distance {}",
                name.lexeme, distance
            );
        }
        scope.values.insert(name.lexeme.clone(), value);
    }

    /// Walk `distance` (≥ 1) enclosing-links and return that scope.
    fn ancestor(&self, distance: usize) -> Rc<RefCell<Environment>> {
        let mut env = self.enclosing.clone().unwrap_or_else(|| {
            panic!("resolver inconsistency: scope chain ends before distance {distance}")
        });

        for _ in 1..distance {
            let parent = env.borrow().enclosing.clone();
            env = parent.unwrap_or_else(|| {
                panic!("resolver inconsistency: scope chain ends before distance {distance}")
            });
        }

        env
    }
}
