use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    Result, interpreter::Interpreter, lox_callable::LoxCallable as _, lox_function::LoxFunction,
    lox_instance::LoxInstance, object::Object,
};

#[derive(Clone, Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(name: String, superclass: Option<Rc<LoxClass>>, methods: HashMap<String, LoxFunction>) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Local methods shadow inherited ones.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref().and_then(|superclass| superclass.find_method(name))
    }

    /// Calling a class builds an instance and runs `init` on it when one
    /// exists. Takes the shared handle so the instance can point back at
    /// its class.
    pub fn construct(class: &Rc<LoxClass>, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));
        if let Some(initializer) = class.find_method("init") {
            initializer.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }
        Ok(Object::Instance(instance))
    }

    pub fn arity(&self) -> u8 {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl std::fmt::Display for LoxClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
