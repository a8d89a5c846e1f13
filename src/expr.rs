use macros::ExpressionType;

use crate::{object::Object, token::Token};

/// Identity for the resolver side-table. Assigned by the parser from a
/// monotone counter; only nodes the resolver records a depth for carry one.
pub type ExprId = usize;

#[derive(Clone, Debug, ExpressionType)]
pub struct Assign {
    pub id: ExprId,
    pub name: Token,
    pub value: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Binary {
    pub left: Box<Expr>,
    pub operator: Token,
    pub right: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Call {
    pub callee: Box<Expr>,
    pub paren: Token,
    pub arguments: Vec<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Get {
    pub object: Box<Expr>,
    pub name: Token,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Grouping {
    pub expression: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Literal {
    pub value: Object,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Logical {
    pub left: Box<Expr>,
    pub operator: Token,
    pub right: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Set {
    pub object: Box<Expr>,
    pub name: Token,
    pub value: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Super {
    pub id: ExprId,
    pub keyword: Token,
    pub method: Token,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct This {
    pub id: ExprId,
    pub keyword: Token,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Unary {
    pub operator: Token,
    pub right: Box<Expr>,
}

#[derive(Clone, Debug, ExpressionType)]
pub struct Variable {
    pub id: ExprId,
    pub name: Token,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Assign(Assign),
    Binary(Binary),
    Call(Call),
    Get(Get),
    Grouping(Grouping),
    Literal(Literal),
    Logical(Logical),
    Set(Set),
    Super(Super),
    This(This),
    Unary(Unary),
    Variable(Variable),
}
