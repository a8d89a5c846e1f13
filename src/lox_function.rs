use std::{cell::RefCell, rc::Rc};

use crate::{
    LoxError, Result,
    interpreter::{
        Interpreter,
        environment::{Environment, RcCell},
    },
    lox_callable::LoxCallable,
    lox_instance::LoxInstance,
    object::{Literal, Object},
    stmt::Function,
};

#[derive(Clone, Debug)]
pub struct LoxFunction {
    declaration: Rc<Function>,
    closure: RcCell<Environment>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<Function>, closure: RcCell<Environment>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Materialize a method on a receiver: same declaration, but the closure
    /// gains a scope where `this` is the instance.
    pub fn bind(&self, instance: RcCell<LoxInstance>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this".to_string(), Object::Instance(instance));
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }
}

impl std::fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

impl LoxCallable for LoxFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        for (param, arg) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme.clone(), arg);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => (),
            // Not an error: `return` unwinding to its call frame
            Err(LoxError::Return { value }) => {
                if !self.is_initializer {
                    return Ok(value);
                }
            }
            Err(other) => return Err(other),
        }

        // An initializer always evaluates to its instance, even on a bare
        // `return;`
        if self.is_initializer {
            Environment::get_at(&self.closure, 0, "this")
        } else {
            Ok(Object::Literal(Literal::Null))
        }
    }

    fn arity(&self) -> u8 {
        self.declaration.params.len() as u8
    }

    fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}
