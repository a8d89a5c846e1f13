pub mod environment;
pub mod resolver;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use environment::{Environment, RcCell};
use tracing::instrument;

use crate::{
    LoxError, Result,
    expr::{self, Expr, ExprId},
    lox_callable::LoxCallable as _,
    lox_class::LoxClass,
    lox_function::LoxFunction,
    lox_instance::LoxInstance,
    native::clock::LoxClock,
    object::{Literal, Object},
    stmt::{self, Stmt},
    token::Token,
    token_type::TokenType,
};

pub struct Interpreter {
    environment: RcCell<Environment>,
    pub globals: RcCell<Environment>,
    /// The resolver side-table: reference node -> environments to skip.
    /// Absent means "global, look up by name at runtime".
    locals: HashMap<ExprId, usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("clock".to_string(), Object::Callable(Rc::new(LoxClock {})));
        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    #[instrument(skip(self, statements), err, level = "trace")]
    pub fn interpret(&mut self, statements: Vec<Stmt>) -> Result<()> {
        for statement in statements {
            self.execute(&statement)?;
        }
        Ok(())
    }

    /// Written by the resolver pass only; read-only during evaluation.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(stmt) => {
                self.execute_block(&stmt.statements, Environment::with_enclosing(Rc::clone(&self.environment)))
            }
            Stmt::Class(stmt) => self.execute_class_stmt(stmt),
            Stmt::Expression(stmt) => self.evaluate(&stmt.expression).map(|_| ()),
            Stmt::Function(stmt) => self.execute_fn_stmt(stmt),
            Stmt::If(stmt) => self.execute_if_stmt(stmt),
            Stmt::Print(stmt) => self.execute_print_stmt(stmt),
            Stmt::Return(stmt) => self.execute_return_stmt(stmt),
            Stmt::Var(stmt) => self.execute_var_stmt(stmt),
            Stmt::While(stmt) => self.execute_while_stmt(stmt),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Object> {
        match expr {
            Expr::Assign(expr) => self.eval_assign(expr),
            Expr::Binary(expr) => self.eval_binary(expr),
            Expr::Call(expr) => self.eval_call(expr),
            Expr::Get(expr) => self.eval_get(expr),
            Expr::Grouping(expr) => self.evaluate(&expr.expression),
            Expr::Literal(expr) => Ok(expr.value.clone()),
            Expr::Logical(expr) => self.eval_logical(expr),
            Expr::Set(expr) => self.eval_set(expr),
            Expr::Super(expr) => self.eval_super(expr),
            Expr::This(expr) => self.look_up_variable(&expr.keyword, expr.id),
            Expr::Unary(expr) => self.eval_unary(expr),
            Expr::Variable(expr) => self.look_up_variable(&expr.name, expr.id),
        }
    }

    pub fn execute_block(&mut self, statements: &[Stmt], environment: Environment) -> Result<()> {
        let previous = std::mem::replace(&mut self.environment, Rc::new(RefCell::new(environment)));
        let result = statements.iter().try_for_each(|statement| self.execute(statement));
        // Restore on every exit path, including Return unwinding
        self.environment = previous;
        result
    }
}

// Statements
impl Interpreter {
    fn execute_print_stmt(&mut self, stmt: &stmt::Print) -> Result<()> {
        println!("{}", self.evaluate(&stmt.expression)?);
        Ok(())
    }

    fn execute_var_stmt(&mut self, stmt: &stmt::Var) -> Result<()> {
        let value = match &stmt.initializer {
            Some(init) => self.evaluate(init)?,
            None => Object::Literal(Literal::Null),
        };

        self.environment.borrow_mut().define(stmt.name.lexeme.clone(), value);
        Ok(())
    }

    fn execute_if_stmt(&mut self, stmt: &stmt::If) -> Result<()> {
        let res = self.evaluate(&stmt.condition)?;
        if res.is_truthy() {
            self.execute(&stmt.then_branch)?;
        } else if let Some(ref eb) = stmt.else_branch {
            self.execute(eb)?;
        }

        Ok(())
    }

    fn execute_while_stmt(&mut self, stmt: &stmt::While) -> Result<()> {
        let mut res = self.evaluate(&stmt.condition)?;
        while res.is_truthy() {
            self.execute(&stmt.body)?;
            res = self.evaluate(&stmt.condition)?;
        }

        Ok(())
    }

    fn execute_fn_stmt(&mut self, stmt: &stmt::Function) -> Result<()> {
        let function = LoxFunction::new(Rc::new(stmt.clone()), Rc::clone(&self.environment), false);
        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::Callable(Rc::new(function)));
        Ok(())
    }

    fn execute_return_stmt(&mut self, stmt: &stmt::Return) -> Result<()> {
        let value = if let Some(ref val) = stmt.value {
            self.evaluate(val)?
        } else {
            Object::Literal(Literal::Null)
        };
        Err(LoxError::Return { value })
    }

    fn execute_class_stmt(&mut self, stmt: &stmt::Class) -> Result<()> {
        let superclass = match &stmt.superclass {
            Some(superclass) => match self.look_up_variable(&superclass.name, superclass.id)? {
                Object::Class(class) => Some(class),
                _ => {
                    return Err(LoxError::runtime(&superclass.name, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::Literal(Literal::Null));

        // Methods of a subclass close over an extra scope holding `super`
        let previous = Rc::clone(&self.environment);
        if let Some(ref superclass) = superclass {
            let mut environment = Environment::with_enclosing(Rc::clone(&self.environment));
            environment.define("super".to_string(), Object::Class(Rc::clone(superclass)));
            self.environment = Rc::new(RefCell::new(environment));
        }

        let mut methods = HashMap::new();
        for method in &stmt.methods {
            let is_initializer = method.name.lexeme == "init";
            let function = LoxFunction::new(Rc::new(method.clone()), Rc::clone(&self.environment), is_initializer);
            methods.insert(method.name.lexeme.clone(), function);
        }

        let class = LoxClass::new(stmt.name.lexeme.clone(), superclass, methods);
        self.environment = previous;

        self.environment.borrow_mut().assign(&stmt.name, Object::Class(Rc::new(class)))
    }
}

// Expressions
impl Interpreter {
    fn look_up_variable(&mut self, name: &Token, id: ExprId) -> Result<Object> {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &name.lexeme),
            None => self.globals.borrow().get(name),
        }
    }

    fn eval_binary(&mut self, expr: &expr::Binary) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;
        let right = self.evaluate(&expr.right)?;

        let obj = match expr.operator.typ {
            TokenType::Greater | TokenType::GreaterEqual | TokenType::Less | TokenType::LessEqual => {
                let (l, r) = Object::number_operands(&left, &right).map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(match expr.operator.typ {
                    TokenType::Greater => l > r,
                    TokenType::GreaterEqual => l >= r,
                    TokenType::Less => l < r,
                    _ => l <= r,
                })
            }
            TokenType::Minus => (left - right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Plus => (left + right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Slash => (left / right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Star => (left * right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::EqualEqual => Object::from(left == right),
            TokenType::BangEqual => Object::from(left != right),
            _ => {
                return Err(LoxError::Internal {
                    message: format!("Not a binary operator: '{}'", expr.operator.lexeme),
                });
            }
        };

        Ok(obj)
    }

    /// Short-circuit; yields the deciding operand itself, not a boolean.
    fn eval_logical(&mut self, expr: &expr::Logical) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;

        let truthy_left = left.is_truthy();
        match (&expr.operator.typ, truthy_left) {
            (&TokenType::Or, true) | (&TokenType::And, false) => Ok(left),
            _ => self.evaluate(&expr.right),
        }
    }

    fn eval_unary(&mut self, expr: &expr::Unary) -> Result<Object> {
        let right = self.evaluate(&expr.right)?;
        let obj = match expr.operator.typ {
            TokenType::Minus => {
                let n = right.into_number().map_err(|e| e.into_lox(&expr.operator))?;
                Object::Literal(Literal::Number(-n))
            }
            TokenType::Bang => Object::from(!right.is_truthy()),
            _ => {
                return Err(LoxError::Internal {
                    message: format!("Not a unary operator: '{}'", expr.operator.lexeme),
                });
            }
        };

        Ok(obj)
    }

    fn eval_assign(&mut self, expr: &expr::Assign) -> Result<Object> {
        let value = self.evaluate(&expr.value)?;
        match self.locals.get(&expr.id) {
            Some(distance) => {
                Environment::assign_at(&self.environment, *distance, &expr.name.lexeme, value.clone())?
            }
            None => self.globals.borrow_mut().assign(&expr.name, value.clone())?,
        }
        Ok(value)
    }

    fn eval_call(&mut self, expr: &expr::Call) -> Result<Object> {
        let callee = self.evaluate(&expr.callee)?;
        let mut arguments = Vec::new();
        for argument in expr.arguments.iter() {
            arguments.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                self.check_arity(function.arity(), arguments.len(), &expr.paren)?;
                function.call(self, arguments)
            }
            Object::Class(class) => {
                self.check_arity(class.arity(), arguments.len(), &expr.paren)?;
                LoxClass::construct(&class, self, arguments)
            }
            _ => Err(LoxError::runtime(&expr.paren, "Can only call functions and classes.")),
        }
    }

    fn check_arity(&self, arity: u8, got: usize, paren: &Token) -> Result<()> {
        if got != arity as usize {
            return Err(LoxError::runtime(
                paren,
                format!("Expected {arity} arguments but got {got}."),
            ));
        }
        Ok(())
    }

    fn eval_get(&mut self, expr: &expr::Get) -> Result<Object> {
        match self.evaluate(&expr.object)? {
            Object::Instance(instance) => LoxInstance::get(&instance, &expr.name),
            _ => Err(LoxError::runtime(&expr.name, "Only instances have properties.")),
        }
    }

    fn eval_set(&mut self, expr: &expr::Set) -> Result<Object> {
        let Object::Instance(instance) = self.evaluate(&expr.object)? else {
            return Err(LoxError::runtime(&expr.name, "Only instances have fields."));
        };

        let value = self.evaluate(&expr.value)?;
        instance.borrow_mut().set(&expr.name, value.clone());
        Ok(value)
    }

    /// `super` and `this` live in adjacent scopes of a method's closure, so
    /// the receiver sits one link closer than the superclass.
    fn eval_super(&mut self, expr: &expr::Super) -> Result<Object> {
        let distance = *self.locals.get(&expr.id).ok_or_else(|| LoxError::Internal {
            message: "'super' expression was never resolved".to_string(),
        })?;
        let superclass = Environment::get_at(&self.environment, distance, "super")?;
        let receiver = Environment::get_at(&self.environment, distance - 1, "this")?;

        let (Object::Class(superclass), Object::Instance(receiver)) = (superclass, receiver) else {
            return Err(LoxError::Internal {
                message: "Malformed closure around 'super'".to_string(),
            });
        };

        match superclass.find_method(&expr.method.lexeme) {
            Some(method) => Ok(Object::Callable(Rc::new(method.bind(receiver)))),
            None => Err(LoxError::runtime(
                &expr.method,
                format!("Undefined property {}.", expr.method.lexeme),
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{resolver::Resolver, *};
    use crate::{parser::Parser, scanner::Scanner};

    fn run(source: &str) -> (Interpreter, Result<()>) {
        let mut interpreter = Interpreter::new();
        let result = run_more(&mut interpreter, &mut 0, source);
        (interpreter, result)
    }

    /// REPL-style: reuse an interpreter (and the expression id counter)
    /// across several source chunks.
    fn run_more(interpreter: &mut Interpreter, next_id: &mut usize, source: &str) -> Result<()> {
        let tokens = Scanner::new(source.to_string()).scan_tokens()?;
        let mut parser = Parser::new(tokens);
        parser.continue_ids_from(*next_id);
        let statements = parser.parse()?;
        *next_id = parser.next_id();
        Resolver::new(interpreter).resolve_all(&statements)?;
        interpreter.interpret(statements)
    }

    fn global(interpreter: &Interpreter, name: &str) -> Object {
        interpreter
            .globals
            .borrow()
            .get(&Token::new(TokenType::Identifier, name, Literal::Null, 1))
            .expect("global should be defined")
    }

    #[test]
    fn arithmetic_respects_precedence() {
        let (interpreter, result) = run("var a = 1 + 2 * 3 - (4 - 2) / 2;");
        result.unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(6.0));
    }

    #[test]
    fn string_concatenation() {
        let (interpreter, result) = run("var a = \"hi\"; var b = a + \" there\";");
        result.unwrap();
        assert_eq!(global(&interpreter, "b"), Object::from("hi there"));
    }

    #[test]
    fn zero_and_empty_string_are_truthy() {
        let (interpreter, result) = run("var r; if (0) r = \"t\"; else r = \"f\"; var s; if (\"\") s = \"t\"; else s = \"f\";");
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from("t"));
        assert_eq!(global(&interpreter, "s"), Object::from("t"));
    }

    #[test]
    fn logical_operators_return_the_deciding_operand() {
        let (interpreter, result) = run(
            "var a = nil or \"yes\";
             var b = \"left\" or \"right\";
             var c = nil and 2;
             var d = 1 and 2;",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from("yes"));
        assert_eq!(global(&interpreter, "b"), Object::from("left"));
        assert_eq!(global(&interpreter, "c"), Object::from(()));
        assert_eq!(global(&interpreter, "d"), Object::from(2.0));
    }

    #[test]
    fn for_loop_accumulates() {
        let (interpreter, result) = run(
            "var out = \"\";
             for (var i = 0; i < 3; i = i + 1) out = out + \"x\";",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "out"), Object::from("xxx"));
    }

    #[test]
    fn closure_sees_bindings_at_declaration_site() {
        // Both calls must see the outer `a`; the later shadow changes nothing
        let (interpreter, result) = run(
            "var a = \"global\";
             var first; var second;
             {
               fun showA() { return a; }
               first = showA();
               var a = \"block\";
               second = showA();
             }",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "first"), Object::from("global"));
        assert_eq!(global(&interpreter, "second"), Object::from("global"));
    }

    #[test]
    fn closure_shares_mutable_upvalue() {
        let (interpreter, result) = run(
            "fun makeCounter() {
               var i = 0;
               fun count() { i = i + 1; return i; }
               return count;
             }
             var counter = makeCounter();
             counter();
             var second = counter();",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "second"), Object::from(2.0));
    }

    #[test]
    fn methods_read_fields_through_this() {
        let (interpreter, result) = run(
            "class Cake {
               taste() { return \"The \" + this.flavor + \" cake is delicious!\"; }
             }
             var cake = Cake();
             cake.flavor = \"chocolate\";
             var r = cake.taste();",
        );
        result.unwrap();
        assert_eq!(
            global(&interpreter, "r"),
            Object::from("The chocolate cake is delicious!")
        );
    }

    #[test]
    fn init_returns_the_instance_even_on_bare_return() {
        let (interpreter, result) = run(
            "class Foo {
               init(n) {
                 this.n = n;
                 if (n > 0) return;
                 this.n = 0 - n;
               }
             }
             var a = Foo(3).n;
             var b = Foo(-2).n;
             var c = Foo(1);
             var same = c.init(5) == c;",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(3.0));
        assert_eq!(global(&interpreter, "b"), Object::from(2.0));
        assert_eq!(global(&interpreter, "same"), Object::from(true));
    }

    #[test]
    fn super_dispatches_to_the_parent_method() {
        let (interpreter, result) = run(
            "class A { speak() { return \"A\"; } }
             class B < A { speak() { return super.speak() + \"B\"; } }
             var r = B().speak();",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from("AB"));
    }

    #[test]
    fn inherited_method_binds_the_subclass_receiver() {
        let (interpreter, result) = run(
            "class A { name() { return this.kind; } }
             class B < A { init() { this.kind = \"b\"; } }
             var r = B().name();",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from("b"));
    }

    #[test]
    fn bound_method_keeps_its_receiver() {
        let (interpreter, result) = run(
            "class Counter {
               init() { this.count = 0; }
               inc() { this.count = this.count + 1; return this.count; }
             }
             var c = Counter();
             var m = c.inc;
             m();
             var r = c.inc();",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(2.0));
    }

    #[test]
    fn fields_shadow_methods() {
        let (interpreter, result) = run(
            "class Box { label() { return \"method\"; } }
             var box = Box();
             box.label = \"field\";
             var r = box.label;",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from("field"));
    }

    #[test]
    fn arity_mismatch_reports_expected_and_got() {
        let (_, result) = run("fun f(a, b) { return a; } f(1, 2, 3);");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Expected 2 arguments but got 3.\n [line 1]");
    }

    #[test]
    fn class_arity_follows_init() {
        let (_, result) = run("class P { init(x, y) { this.x = x; this.y = y; } } P(1);");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Expected 2 arguments but got 1.\n [line 1]");
    }

    #[test]
    fn only_functions_and_classes_are_callable() {
        let (_, result) = run("var x = 1; x();");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Can only call functions and classes.\n [line 1]");
    }

    #[test]
    fn unary_minus_requires_a_number() {
        let (_, result) = run("-\"muffin\";");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Operand must be a number.\n [line 1]");
    }

    #[test]
    fn comparison_requires_numbers() {
        let (_, result) = run("1 < \"2\";");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Operands must be numbers.\n [line 1]");
    }

    #[test]
    fn plus_mismatch_names_both_acceptable_shapes() {
        let (_, result) = run("\"1\" + 2;");
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operands must be two numbers or two strings.\n [line 1]"
        );
    }

    #[test]
    fn undefined_variable_reports_its_name() {
        let (_, result) = run("print ghost;");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'ghost'.\n [line 1]");
    }

    #[test]
    fn property_access_requires_an_instance() {
        let (_, result) = run("var x = 1; x.y;");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Only instances have properties.\n [line 1]");
    }

    #[test]
    fn undefined_property_reports_its_name() {
        let (_, result) = run("class Empty {} Empty().missing;");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Undefined property 'missing'.\n [line 1]");
    }

    #[test]
    fn superclass_must_be_a_class() {
        let (_, result) = run("var NotAClass = \"so not\"; class B < NotAClass {}");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Superclass must be a class.\n [line 1]");
    }

    #[test]
    fn equality_mixes_kinds_without_erroring() {
        let (interpreter, result) = run(
            "var a = 1 == \"1\";
             var b = nil == nil;
             var c = nil == false;
             var d = \"x\" != \"y\";",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(false));
        assert_eq!(global(&interpreter, "b"), Object::from(true));
        assert_eq!(global(&interpreter, "c"), Object::from(false));
        assert_eq!(global(&interpreter, "d"), Object::from(true));
    }

    #[test]
    fn division_by_zero_is_ieee() {
        let (interpreter, result) = run("var a = 1 / 0; var big = a > 1000000;");
        result.unwrap();
        assert_eq!(global(&interpreter, "big"), Object::from(true));
    }

    #[test]
    fn clock_is_predefined() {
        let (interpreter, result) = run("var ok = clock() > 0;");
        result.unwrap();
        assert_eq!(global(&interpreter, "ok"), Object::from(true));
    }

    #[test]
    fn stringify_function_and_class_objects() {
        let (interpreter, result) = run("fun f() {} class C {} var c = C();");
        result.unwrap();
        assert_eq!(global(&interpreter, "f").to_string(), "<fn f>");
        assert_eq!(global(&interpreter, "C").to_string(), "C");
        assert_eq!(global(&interpreter, "c").to_string(), "C instance");
        assert_eq!(global(&interpreter, "clock").to_string(), "<native fn>");
    }

    #[test]
    fn repl_reuse_keeps_resolved_closures_working() {
        let mut interpreter = Interpreter::new();
        let mut next_id = 0;
        run_more(
            &mut interpreter,
            &mut next_id,
            "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } var f = make();",
        )
        .unwrap();
        run_more(&mut interpreter, &mut next_id, "f(); var r = f();").unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(2.0));
    }

    #[test]
    fn environment_is_restored_after_a_runtime_error() {
        let mut interpreter = Interpreter::new();
        let mut next_id = 0;
        run_more(&mut interpreter, &mut next_id, "var a = \"outer\";").unwrap();
        run_more(&mut interpreter, &mut next_id, "{ var a = \"inner\"; missing; }").unwrap_err();
        run_more(&mut interpreter, &mut next_id, "var r = a;").unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from("outer"));
    }

    #[test]
    fn return_unwinds_nested_blocks() {
        let (interpreter, result) = run(
            "fun find() {
               for (var i = 0; i < 10; i = i + 1) {
                 if (i == 3) { return i; }
               }
               return -1;
             }
             var r = find();",
        );
        result.unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(3.0));
    }
}
