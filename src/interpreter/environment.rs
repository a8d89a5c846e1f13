use std::{
    cell::RefCell,
    collections::{HashMap, hash_map::Entry},
    rc::Rc,
};

use tracing::trace;

use crate::{LoxError, Result, object::Object, token::Token};

pub type RcCell<T> = Rc<RefCell<T>>;

/// One scope's bindings plus a parent pointer. Shared ownership because any
/// number of closures may capture the same parent.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<RcCell<Environment>>,
}

impl Environment {
    pub fn new() -> Environment {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: RcCell<Environment>) -> Environment {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: String, value: Object) {
        trace!(?name, ?value, "defining");
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Object> {
        match self.values.get(&name.lexeme) {
            Some(val) => Ok(val.clone()),
            None => {
                if let Some(outer) = &self.enclosing {
                    outer.borrow().get(name)
                } else {
                    Err(LoxError::runtime(
                        name,
                        format!("Undefined variable '{}'.", name.lexeme),
                    ))
                }
            }
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<()> {
        match self.values.entry(name.lexeme.clone()) {
            Entry::Vacant(_) => {
                if let Some(ref outer) = self.enclosing {
                    outer.borrow_mut().assign(name, value)
                } else {
                    Err(LoxError::runtime(
                        name,
                        format!("Undefined variable '{}'.", name.lexeme),
                    ))
                }
            }
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Skip exactly `distance` links, no search. A missing slot here means
    /// the resolver and the evaluator disagree, which is our bug.
    pub fn get_at(this: &RcCell<Environment>, distance: usize, name: &str) -> Result<Object> {
        trace!(distance, name, "get at");
        let ancestor = Environment::ancestor(this, distance)?;
        let value = ancestor.borrow().values.get(name).cloned();
        value.ok_or_else(|| LoxError::Internal {
            message: format!("Expected variable '{name}' at distance {distance}"),
        })
    }

    pub fn assign_at(this: &RcCell<Environment>, distance: usize, name: &str, value: Object) -> Result<()> {
        trace!(distance, name, ?value, "assign at");
        let ancestor = Environment::ancestor(this, distance)?;
        ancestor.borrow_mut().values.insert(name.to_string(), value);
        Ok(())
    }

    fn ancestor(this: &RcCell<Environment>, distance: usize) -> Result<RcCell<Environment>> {
        let mut env = Rc::clone(this);
        for _ in 0..distance {
            let outer = env.borrow().enclosing.clone();
            env = outer.ok_or_else(|| LoxError::Internal {
                message: format!("No enclosing environment at distance {distance}"),
            })?;
        }
        Ok(env)
    }
}
