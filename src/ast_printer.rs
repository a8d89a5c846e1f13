use crate::{expr::Expr, stmt, stmt::Stmt};

/// Renders a parsed program as Lisp-style s-expressions. A debug aid only:
/// the driver trace-logs the parsed form, tests assert on it.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print_program(&self, statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|statement| self.print_stmt(statement))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn print_stmt(&self, statement: &Stmt) -> String {
        match statement {
            Stmt::Block(block) => format!("(block {})", self.print_program(&block.statements)),
            Stmt::Class(class) => {
                let mut out = format!("(class {}", class.name.lexeme);
                if let Some(superclass) = &class.superclass {
                    out.push_str(&format!(" < {}", superclass.name.lexeme));
                }
                for method in &class.methods {
                    out.push(' ');
                    out.push_str(&self.print_function(method));
                }
                out.push(')');
                out
            }
            Stmt::Expression(stmt) => format!("(; {})", self.print(&stmt.expression)),
            Stmt::Function(func) => self.print_function(func),
            Stmt::If(stmt) => match &stmt.else_branch {
                Some(else_branch) => format!(
                    "(if-else {} {} {})",
                    self.print(&stmt.condition),
                    self.print_stmt(&stmt.then_branch),
                    self.print_stmt(else_branch)
                ),
                None => format!("(if {} {})", self.print(&stmt.condition), self.print_stmt(&stmt.then_branch)),
            },
            Stmt::Print(stmt) => format!("(print {})", self.print(&stmt.expression)),
            Stmt::Return(stmt) => match &stmt.value {
                Some(value) => format!("(return {})", self.print(value)),
                None => "(return)".to_string(),
            },
            Stmt::Var(var) => match &var.initializer {
                Some(init) => format!("(var {} = {})", var.name.lexeme, self.print(init)),
                None => format!("(var {})", var.name.lexeme),
            },
            Stmt::While(stmt) => {
                format!("(while {} {})", self.print(&stmt.condition), self.print_stmt(&stmt.body))
            }
        }
    }

    fn print_function(&self, func: &stmt::Function) -> String {
        let params: Vec<_> = func.params.iter().map(|param| param.lexeme.as_str()).collect();
        format!(
            "(fun {} ({}) {})",
            func.name.lexeme,
            params.join(" "),
            self.print_program(&func.body)
        )
    }

    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Assign(assign) => format!("(= {} {})", assign.name.lexeme, self.print(&assign.value)),
            Expr::Binary(binary) => self.parenthesize(&binary.operator.lexeme, &[&binary.left, &binary.right]),
            Expr::Call(call) => {
                let mut parts = vec![self.print(&call.callee)];
                parts.extend(call.arguments.iter().map(|arg| self.print(arg)));
                format!("(call {})", parts.join(" "))
            }
            Expr::Get(get) => format!("(. {} {})", self.print(&get.object), get.name.lexeme),
            Expr::Grouping(group) => self.parenthesize("group", &[&group.expression]),
            Expr::Literal(lit) => lit.value.to_string(),
            Expr::Logical(logic) => self.parenthesize(&logic.operator.lexeme, &[&logic.left, &logic.right]),
            Expr::Set(set) => format!(
                "(.= {} {} {})",
                self.print(&set.object),
                set.name.lexeme,
                self.print(&set.value)
            ),
            Expr::Super(sup) => format!("(super {})", sup.method.lexeme),
            Expr::This(_) => "this".to_string(),
            Expr::Unary(unary) => self.parenthesize(&unary.operator.lexeme, &[&unary.right]),
            Expr::Variable(var) => var.name.lexeme.clone(),
        }
    }

    fn parenthesize(&self, name: &str, exprs: &[&Expr]) -> String {
        let parts: Vec<_> = exprs.iter().map(|expr| self.print(expr)).collect();
        format!("({} {})", name, parts.join(" "))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        expr::{Binary, Grouping, Literal, Unary},
        token::Token,
        token_type::TokenType,
    };

    #[test]
    fn does_the_thing() {
        let expr = Binary::expr(
            Unary::expr(
                Token::new(TokenType::Minus, "-", ().into(), 1),
                Literal::expr(123_f64.into()),
            ),
            Token::new(TokenType::Star, "*", ().into(), 1),
            Grouping::expr(Literal::expr(45.67.into())),
        );
        let printer = AstPrinter {};
        assert_eq!(printer.print(&expr), "(* (- 123) (group 45.67))".to_string());
    }

    #[test]
    fn prints_whole_programs() {
        use crate::{parser::Parser, scanner::Scanner};

        let tokens = Scanner::new("var a = 1; if (a < 2) print a; else print \"big\";".to_string())
            .scan_tokens()
            .unwrap();
        let statements = Parser::new(tokens).parse().unwrap();
        let printer = AstPrinter {};
        assert_eq!(
            printer.print_program(&statements),
            "(var a = 1) (if-else (< a 2) (print a) (print big))"
        );
    }
}
