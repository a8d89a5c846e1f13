use std::collections::HashMap;

use snafu::whatever;
use tracing::trace;

use super::Interpreter;
use crate::{
    Result,
    expr::{self, Expr, ExprId},
    parser,
    stmt::{self, Stmt},
    token::Token,
};

/// Walks the parsed program once before execution, pinning every local
/// reference to a scope depth and rejecting the statically-detectable
/// misuses of `var`, `return`, `this`, and `super`.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    /// Innermost scope last; the bool flips to true once the name's
    /// initializer has been resolved.
    scopes: Vec<HashMap<String, bool>>,
    curr_fn: FunctionType,
    curr_class: ClassType,
    had_error: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter) -> Self {
        Self {
            interpreter,
            scopes: vec![],
            curr_fn: FunctionType::None,
            curr_class: ClassType::None,
            had_error: false,
        }
    }

    pub fn resolve_all(&mut self, statements: &[Stmt]) -> Result<()> {
        self.resolve_stmts(statements)?;

        if self.had_error {
            whatever!("One or more errors during static analysis")
        }
        Ok(())
    }

    /// Diagnostics accumulate; resolution carries on so one pass reports
    /// everything.
    fn report(&mut self, token: &Token, message: &str) {
        eprintln!("{}", parser::error(token, message));
        self.had_error = true;
    }
}

// Statements
impl Resolver<'_> {
    fn resolve_stmts(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            self.resolve_stmt(statement)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, statement: &Stmt) -> Result<()> {
        trace!(?statement, "Resolving statement");
        match statement {
            Stmt::Block(block) => {
                self.begin_scope();
                self.resolve_stmts(&block.statements)?;
                self.end_scope()?;
            }
            Stmt::Class(stmt) => self.resolve_class(stmt)?,
            Stmt::Expression(stmt) => self.resolve_expr(&stmt.expression)?,
            Stmt::Function(func) => {
                self.declare(&func.name);
                self.define(&func.name);

                self.resolve_func(func, FunctionType::Function)?;
            }
            Stmt::If(stmt) => {
                self.resolve_expr(&stmt.condition)?;
                self.resolve_stmt(&stmt.then_branch)?;
                if let Some(else_branch) = &stmt.else_branch {
                    self.resolve_stmt(else_branch)?;
                }
            }
            Stmt::Print(stmt) => {
                self.resolve_expr(&stmt.expression)?;
            }
            Stmt::Return(stmt) => {
                if let FunctionType::None = self.curr_fn {
                    self.report(&stmt.keyword, "Can't return from top-level code.");
                }
                if let Some(val) = &stmt.value {
                    if self.curr_fn == FunctionType::Initializer {
                        self.report(&stmt.keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(val)?;
                }
            }
            Stmt::Var(var) => {
                self.declare(&var.name);
                if let Some(initializer) = &var.initializer {
                    self.resolve_expr(initializer)?;
                }
                self.define(&var.name);
            }
            Stmt::While(stmt) => {
                self.resolve_expr(&stmt.condition)?;
                self.resolve_stmt(&stmt.body)?;
            }
        }
        Ok(())
    }

    fn resolve_class(&mut self, stmt: &stmt::Class) -> Result<()> {
        let enclosing_class = self.curr_class;
        self.curr_class = ClassType::Class;

        self.declare(&stmt.name);
        self.define(&stmt.name);

        if let Some(superclass) = &stmt.superclass {
            if superclass.name.lexeme == stmt.name.lexeme {
                self.report(&superclass.name, "A class can't inherit from itself.");
            }
            self.curr_class = ClassType::Subclass;
            // The superclass is just a variable reference
            self.resolve_variable(superclass);

            self.begin_scope();
            self.scope_define("super");
        }

        self.begin_scope();
        self.scope_define("this");

        for method in stmt.methods.iter() {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_func(method, declaration)?;
        }

        self.end_scope()?;
        if stmt.superclass.is_some() {
            self.end_scope()?;
        }

        self.curr_class = enclosing_class;
        Ok(())
    }

    fn resolve_func(&mut self, func: &stmt::Function, typ: FunctionType) -> Result<()> {
        let enclosing_fn = self.curr_fn;
        self.curr_fn = typ;
        self.begin_scope();
        for param in func.params.iter() {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&func.body)?;
        self.end_scope()?;
        self.curr_fn = enclosing_fn;
        Ok(())
    }
}

// Expressions
impl Resolver<'_> {
    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        trace!(?expr, "Resolving expression");
        match expr {
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value)?;
                self.resolve_local(assign.id, &assign.name);
            }
            Expr::Binary(binary) => {
                self.resolve_expr(&binary.left)?;
                self.resolve_expr(&binary.right)?;
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee)?;
                for arg in call.arguments.iter() {
                    self.resolve_expr(arg)?;
                }
            }
            Expr::Get(get) => {
                self.resolve_expr(&get.object)?;
            }
            Expr::Grouping(group) => {
                self.resolve_expr(&group.expression)?;
            }
            Expr::Literal(_) => (),
            Expr::Logical(logic) => {
                self.resolve_expr(&logic.left)?;
                self.resolve_expr(&logic.right)?;
            }
            Expr::Set(set) => {
                self.resolve_expr(&set.value)?;
                self.resolve_expr(&set.object)?;
            }
            Expr::Super(sup) => {
                match self.curr_class {
                    ClassType::None => self.report(&sup.keyword, "Can't use 'super' outside a class."),
                    ClassType::Class => {
                        self.report(&sup.keyword, "Can't use 'super' in a class with no superclass.")
                    }
                    ClassType::Subclass => (),
                }
                self.resolve_local(sup.id, &sup.keyword);
            }
            Expr::This(this) => {
                if let ClassType::None = self.curr_class {
                    self.report(&this.keyword, "Can't use 'this' outside of a class.");
                    return Ok(());
                }
                self.resolve_local(this.id, &this.keyword);
            }
            Expr::Unary(unary) => self.resolve_expr(&unary.right)?,
            Expr::Variable(var) => self.resolve_variable(var),
        }
        Ok(())
    }

    fn resolve_variable(&mut self, var: &expr::Variable) {
        let in_own_initializer = self
            .scopes
            .last()
            .is_some_and(|scope| scope.get(&var.name.lexeme) == Some(&false));
        if in_own_initializer {
            self.report(&var.name, "Can't read local variable in its own initializer.");
        }

        self.resolve_local(var.id, &var.name);
    }
}

// Helpers
impl Resolver<'_> {
    fn begin_scope(&mut self) {
        trace!(len = self.scopes.len(), "Beginning scope");
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) -> Result<()> {
        trace!(len = self.scopes.len(), "Ending scope");
        if self.scopes.pop().is_none() {
            whatever!("Ended a scope when there was no stack")
        }
        Ok(())
    }

    fn declare(&mut self, name: &Token) {
        trace!(name = %name.lexeme, len = self.scopes.len(), "Declaring");
        if self.scopes.is_empty() {
            return;
        }

        let clashes = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&name.lexeme));
        if clashes {
            self.report(name, "Already a variable with this name in this scope.");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Direct insert for the implicit `this`/`super` bindings, which have
    /// no declaring token.
    fn scope_define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, token: &Token) {
        trace!(?token, len = self.scopes.len(), "Resolving local");
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(&token.lexeme) {
                self.interpreter.resolve(id, self.scopes.len() - 1 - i);
                return;
            }
        }
        // Not found anywhere: a global, left out of the side-table
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{LoxError, parser::Parser, scanner::Scanner};

    fn resolve(source: &str) -> Result<()> {
        let tokens = Scanner::new(source.to_string()).scan_tokens()?;
        let statements = Parser::new(tokens).parse()?;
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter).resolve_all(&statements)
    }

    fn assert_rejected(source: &str) {
        assert!(
            matches!(resolve(source), Err(LoxError::Resolver { .. })),
            "expected a static error for: {source}"
        );
    }

    #[test]
    fn globals_resolve_without_errors() {
        resolve("var a = 1; print a; { var b = a; print b; }").unwrap();
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert_rejected("return 1;");
    }

    #[test]
    fn return_inside_function_is_fine() {
        resolve("fun f() { return 1; }").unwrap();
    }

    #[test]
    fn initializer_may_not_return_a_value() {
        assert_rejected("class Foo { init() { return 1; } }");
    }

    #[test]
    fn initializer_may_return_bare() {
        resolve("class Foo { init() { return; } }").unwrap();
    }

    #[test]
    fn duplicate_local_declaration_is_rejected() {
        assert_rejected("fun f() { var a = 1; var a = 2; }");
    }

    #[test]
    fn duplicate_global_declaration_is_allowed() {
        resolve("var a = 1; var a = 2;").unwrap();
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_rejected() {
        assert_rejected("fun f() { var a = a; }");
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        assert_rejected("class Oops < Oops {}");
    }

    #[test]
    fn this_outside_a_class_is_rejected() {
        assert_rejected("print this;");
        assert_rejected("fun notAMethod() { return this; }");
    }

    #[test]
    fn super_outside_a_class_is_rejected() {
        assert_rejected("super.method();");
    }

    #[test]
    fn super_without_a_superclass_is_rejected() {
        assert_rejected("class Base { method() { return super.method(); } }");
    }

    #[test]
    fn super_in_a_subclass_is_fine() {
        resolve("class A { m() {} } class B < A { m() { return super.m(); } }").unwrap();
    }
}
