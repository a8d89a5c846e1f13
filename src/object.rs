use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::{
    LoxError,
    interpreter::environment::RcCell,
    lox_callable::LoxCallable,
    lox_class::LoxClass,
    lox_instance::LoxInstance,
    token::Token,
};

/// A literal value as scanned from source. Also doubles as the payload of
/// `Object::Literal` at runtime. `OrderedFloat` keeps `Eq`/`Hash` derivable
/// on tokens.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

impl From<()> for Literal {
    fn from(_value: ()) -> Self {
        Literal::Null
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(OrderedFloat(value))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A runtime value: a literal, something callable, a class, or an instance.
/// Callables, classes, and instances live behind `Rc` so closures, method
/// tables, and fields can share them.
#[derive(Clone)]
pub enum Object {
    Literal(Literal),
    Callable(Rc<dyn LoxCallable>),
    Class(Rc<LoxClass>),
    Instance(RcCell<LoxInstance>),
}

impl Object {
    /// Only `nil` and `false` are falsey.
    pub fn is_truthy(&self) -> bool {
        !matches!(
            self,
            Object::Literal(Literal::Null) | Object::Literal(Literal::Boolean(false))
        )
    }

    pub fn into_number(self) -> Result<OrderedFloat<f64>, ObjectRuntimeError> {
        match self {
            Object::Literal(Literal::Number(n)) => Ok(n),
            _ => Err(ObjectRuntimeError {
                message: "Operand must be a number.".to_string(),
            }),
        }
    }

    pub fn number_operands(left: &Object, right: &Object) -> Result<(f64, f64), ObjectRuntimeError> {
        match (left, right) {
            (Object::Literal(Literal::Number(l)), Object::Literal(Literal::Number(r))) => Ok((l.0, r.0)),
            _ => Err(ObjectRuntimeError {
                message: "Operands must be numbers.".to_string(),
            }),
        }
    }
}

/// Equality: literals by value, everything else by identity. A mismatch of
/// kinds is always unequal.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Literal(l), Object::Literal(r)) => l == r,
            (Object::Callable(l), Object::Callable(r)) => Rc::ptr_eq(l, r),
            (Object::Class(l), Object::Class(r)) => Rc::ptr_eq(l, r),
            (Object::Instance(l), Object::Instance(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl std::ops::Add for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn add(self, rhs: Object) -> Self::Output {
        match (self, rhs) {
            (Object::Literal(Literal::Number(l)), Object::Literal(Literal::Number(r))) => Ok((l.0 + r.0).into()),
            (Object::Literal(Literal::String(l)), Object::Literal(Literal::String(r))) => {
                Ok(format!("{l}{r}").into())
            }
            _ => Err(ObjectRuntimeError {
                message: "Operands must be two numbers or two strings.".to_string(),
            }),
        }
    }
}

impl std::ops::Sub for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn sub(self, rhs: Object) -> Self::Output {
        let (l, r) = Object::number_operands(&self, &rhs)?;
        Ok((l - r).into())
    }
}

impl std::ops::Mul for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn mul(self, rhs: Object) -> Self::Output {
        let (l, r) = Object::number_operands(&self, &rhs)?;
        Ok((l * r).into())
    }
}

impl std::ops::Div for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    // Division by zero follows IEEE 754, no diagnostic.
    fn div(self, rhs: Object) -> Self::Output {
        let (l, r) = Object::number_operands(&self, &rhs)?;
        Ok((l / r).into())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::Literal(Literal::String(value))
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::Literal(Literal::String(value.to_string()))
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Literal(Literal::Number(OrderedFloat(value)))
    }
}

impl From<OrderedFloat<f64>> for Object {
    fn from(value: OrderedFloat<f64>) -> Self {
        Object::Literal(Literal::Number(value))
    }
}

impl From<()> for Object {
    fn from(_value: ()) -> Self {
        Object::Literal(Literal::Null)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Literal(Literal::Boolean(value))
    }
}

impl From<Literal> for Object {
    fn from(value: Literal) -> Self {
        Object::Literal(value)
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Callable(c) => write!(f, "{c}"),
            Self::Class(c) => write!(f, "{c}"),
            Self::Instance(i) => write!(f, "{}", i.borrow()),
        }
    }
}

// Shallow on purpose: closure environments can cycle back through instance
// fields, which a derived Debug would chase forever.
impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit:?}"),
            Self::Callable(c) => write!(f, "<fn {}>", c.name()),
            Self::Class(c) => write!(f, "<class {}>", c.name),
            Self::Instance(i) => write!(f, "<{} instance>", i.borrow().class_name()),
        }
    }
}

/// A runtime error raised below the token level (operator impls, natives).
/// The evaluator attaches the offending token via `into_lox`.
#[derive(Debug)]
pub struct ObjectRuntimeError {
    pub message: String,
}

impl ObjectRuntimeError {
    pub fn into_lox(self, token: &Token) -> LoxError {
        LoxError::Runtime {
            message: self.message,
            line: token.line,
        }
    }
}
