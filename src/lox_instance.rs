use std::{collections::HashMap, rc::Rc};

use crate::{
    LoxError, Result, interpreter::environment::RcCell, lox_class::LoxClass, object::Object, token::Token,
};

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    /// Open-ended: assignment creates fields on first write.
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Fields shadow methods. Associated rather than a method because a
    /// found method must be bound to the instance's shared handle.
    pub fn get(instance: &RcCell<LoxInstance>, name: &Token) -> Result<Object> {
        if let Some(field) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        if let Some(method) = instance.borrow().class.find_method(&name.lexeme) {
            return Ok(Object::Callable(Rc::new(method.bind(Rc::clone(instance)))));
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }
}

impl std::fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class)
    }
}
