// ABOUTME: Tree-walking evaluator: runs a resolved statement list against a chain of environments
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Expr, ExprId, ExprKind, LiteralValue, Stmt};
use crate::callable::{clock, Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// What a statement did, distinct from a hard error: either it ran to
/// completion, or it hit a `return` and is unwinding back to the call that
/// invoked the enclosing function. Keeping this separate from
/// `RuntimeError` means control flow never gets confused with failure, and
/// every statement-executing method still restores `self.environment` on
/// its way out regardless of which one happened.
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<ExprId, usize>,
    next_expr_id: ExprId,
    stdout: RefCell<Box<dyn Write>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        let globals = Environment::new();
        register_globals(&globals);
        Self {
            globals: globals.clone(),
            environment: globals,
            locals: HashMap::new(),
            next_expr_id: 0,
            stdout: RefCell::new(writer),
        }
    }

    /// The session-wide expression-id counter, threaded into each
    /// `Parser::new` call. A REPL resolves and interprets many statement
    /// lists against the same `Interpreter`, and a closure or class method
    /// defined on one line can be called on a later one, so ids must never
    /// be reused for as long as this interpreter's `locals` table is alive.
    pub fn next_expr_id_mut(&mut self) -> &mut ExprId {
        &mut self.next_expr_id
    }

    /// Merges a freshly resolved program's lexical-distance table into the
    /// running one. Must not replace it outright: bindings resolved for
    /// code from an earlier call (e.g. a class defined on a previous REPL
    /// line) stay live and callable, and their entries must survive later
    /// calls that resolve unrelated, disjoint expression ids.
    pub fn set_locals(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }

    pub fn execute_block(&mut self, statements: &[Stmt], environment: Rc<Environment>) -> Result<Flow, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_statements(statements);
        self.environment = previous;
        result
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                returning => return Ok(returning),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.stdout.borrow_mut(), "{value}");
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let scope = Environment::with_parent(self.environment.clone());
                self.execute_block(statements, scope)
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        returning => return Ok(returning),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(decl.clone(), self.environment.clone(), false);
                self.environment
                    .define(decl.name.lexeme.clone(), Value::Callable(Callable::Function(Rc::new(function))));
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Class { name, superclass, methods } => self.execute_class(name, superclass, methods),
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: &Option<Expr>,
        methods: &[Rc<crate::ast::FunctionDecl>],
    ) -> Result<Flow, RuntimeError> {
        let superclass_value = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    let token = match &expr.kind {
                        ExprKind::Variable(token) => token.clone(),
                        _ => name.clone(),
                    };
                    return Err(RuntimeError::new(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment.define(name.lexeme.clone(), Value::Nil);

        let previous_environment = self.environment.clone();
        if let Some(superclass) = &superclass_value {
            self.environment = Environment::with_parent(self.environment.clone());
            self.environment.define("super", Value::Callable(Callable::Class(superclass.clone())));
        }

        let mut method_map = HashMap::new();
        for decl in methods {
            let is_initializer = decl.name.lexeme == "init";
            let function = LoxFunction::new(decl.clone(), self.environment.clone(), is_initializer);
            method_map.insert(decl.name.lexeme.clone(), Rc::new(function));
        }

        let class = Rc::new(LoxClass::new(name.lexeme.clone(), superclass_value.clone(), method_map));

        if superclass_value.is_some() {
            self.environment = previous_environment;
        }

        self.environment.assign(name, Value::Callable(Callable::Class(class)))?;
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::string(s.as_str()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Unary { operator, right } => self.evaluate_unary(operator, right),
            ExprKind::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            ExprKind::Logical { left, operator, right } => self.evaluate_logical(left, operator, right),
            ExprKind::Variable(name) => self.look_up_variable(name, expr.id),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                if let Some(distance) = self.locals.get(&expr.id) {
                    self.environment.assign_at(*distance, name, value.clone());
                } else {
                    self.globals.assign(name, value.clone())?;
                }
                Ok(value)
            }
            ExprKind::Call { callee, paren, arguments } => self.evaluate_call(callee, paren, arguments),
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => instance.get(name),
                    _ => Err(RuntimeError::new(name.clone(), "Only instances have properties.")),
                }
            }
            ExprKind::Set { object, name, value } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(RuntimeError::new(name.clone(), "Only instances have fields.")),
                }
            }
            ExprKind::This(keyword) => self.look_up_variable(keyword, expr.id),
            ExprKind::Super { keyword, method } => self.evaluate_super(expr.id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(operator.clone(), "Operand must be a number.")),
            },
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only produces '-' and '!' as unary operators"),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        match operator.kind {
            TokenKind::Or if left.is_truthy() => Ok(left),
            TokenKind::And if !left.is_truthy() => Ok(left),
            _ => self.evaluate(right),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.kind {
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
                _ => Err(RuntimeError::new(operator.clone(), "Operands must be two numbers or two strings.")),
            },
            TokenKind::Minus => numeric_op(operator, left, right, |a, b| a - b),
            TokenKind::Star => numeric_op(operator, left, right, |a, b| a * b),
            TokenKind::Slash => {
                let (a, b) = as_numbers(operator, left, right)?;
                // Preserves the book's exact epsilon-guard behaviour rather than
                // IEEE-754 division, including for 0 / 0.
                if b.abs() < 1e-5 {
                    return Err(RuntimeError::new(operator.clone(), "Cannot divide by 0."));
                }
                Ok(Value::Number(a / b))
            }
            TokenKind::Greater => numeric_cmp(operator, left, right, |a, b| a > b),
            TokenKind::GreaterEqual => numeric_cmp(operator, left, right, |a, b| a >= b),
            TokenKind::Less => numeric_cmp(operator, left, right, |a, b| a < b),
            TokenKind::LessEqual => numeric_cmp(operator, left, right, |a, b| a <= b),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            _ => unreachable!("parser only produces binary operators handled above"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        let callable = match callee {
            Value::Callable(callable) => callable,
            _ => return Err(RuntimeError::new(paren.clone(), "Can only call functions and classes.")),
        };

        if args.len() != callable.arity() {
            return Err(RuntimeError::new(
                paren.clone(),
                format!("Expected {} arguments but got {}.", callable.arity(), args.len()),
            ));
        }

        callable.call(self, args)
    }

    fn evaluate_super(&mut self, expr_id: ExprId, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let distance = *self
            .locals
            .get(&expr_id)
            .expect("resolver always records a distance for 'super'");

        let superclass = match self.environment.get_at(distance, "super") {
            Value::Callable(Callable::Class(class)) => class,
            _ => unreachable!("'super' always resolves to a class"),
        };

        let instance = match self.environment.get_at(distance - 1, "this") {
            Value::Instance(instance) => instance,
            _ => unreachable!("'this' always resolves to an instance one scope inside 'super'"),
        };

        let bound = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| RuntimeError::new(method.clone(), format!("Undefined property '{}'.", method.lexeme)))?
            .bind(instance);

        Ok(Value::Callable(Callable::Function(Rc::new(bound))))
    }

    fn look_up_variable(&self, name: &Token, expr_id: ExprId) -> Result<Value, RuntimeError> {
        if let Some(distance) = self.locals.get(&expr_id) {
            Ok(self.environment.get_at(*distance, &name.lexeme))
        } else {
            self.globals.get(name)
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn as_numbers(operator: &Token, left: Value, right: Value) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.")),
    }
}

fn numeric_op(
    operator: &Token,
    left: Value,
    right: Value,
    op: impl FnOnce(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    let (a, b) = as_numbers(operator, left, right)?;
    Ok(Value::Number(op(a, b)))
}

fn numeric_cmp(
    operator: &Token,
    left: Value,
    right: Value,
    op: impl FnOnce(f64, f64) -> bool,
) -> Result<Value, RuntimeError> {
    let (a, b) = as_numbers(operator, left, right)?;
    Ok(Value::Bool(op(a, b)))
}

fn register_globals(env: &Rc<Environment>) {
    env.define(
        "clock",
        Value::Callable(Callable::Native(Rc::new(NativeFunction { name: "clock".to_string(), arity: 0, func: clock }))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::lexer::Lexer;
    use crate::output::SharedBuffer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn run(src: &str) -> (String, Diagnostics) {
        let buffer = SharedBuffer::new();
        let mut interpreter = Interpreter::with_writer(Box::new(buffer.clone()));
        let mut diagnostics = Diagnostics::new();

        let tokens = Lexer::new(src, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, interpreter.next_expr_id_mut(), &mut diagnostics).parse();
        assert!(!diagnostics.had_error(), "unexpected static errors");

        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error(), "unexpected resolve errors");
        interpreter.set_locals(locals);

        if let Err(err) = interpreter.interpret(&statements) {
            diagnostics.runtime_error(&err);
        }

        let output = buffer.contents();
        (output, diagnostics)
    }

    #[test]
    fn prints_arithmetic() {
        let (out, diagnostics) = run("print 1 + 2 * 3;");
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(out, "7\n");
    }

    #[test]
    fn string_concatenation() {
        let (out, _) = run(r#"print "foo" + "bar";"#);
        assert_eq!(out, "foobar\n");
    }

    #[test]
    fn closures_capture_their_own_variable() {
        let (out, _) = run(
            r#"
            fun makeCounter() {
                var i = 0;
                fun counter() {
                    i = i + 1;
                    return i;
                }
                return counter;
            }
            var counter = makeCounter();
            print counter();
            print counter();
            "#,
        );
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn class_instantiation_and_method_call() {
        let (out, diagnostics) = run(
            r#"
            class Greeter {
                greet(name) {
                    print "hi " + name;
                }
            }
            var g = Greeter();
            g.greet("lox");
            "#,
        );
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(out, "hi lox\n");
    }

    #[test]
    fn initializer_implicitly_returns_this() {
        let (out, _) = run(
            r#"
            class Box {
                init(value) { this.value = value; }
            }
            var b = Box(42);
            print b.value;
            "#,
        );
        assert_eq!(out, "42\n");
    }

    #[test]
    fn inheritance_and_super() {
        let (out, diagnostics) = run(
            r#"
            class A {
                method() { print "A method"; }
            }
            class B < A {
                method() {
                    super.method();
                    print "B method";
                }
            }
            B().method();
            "#,
        );
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(out, "A method\nB method\n");
    }

    #[test]
    fn calling_non_callable_is_a_runtime_error() {
        let (_, diagnostics) = run("var x = 1; x();");
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn adding_number_and_string_is_a_runtime_error() {
        let (_, diagnostics) = run(r#"print 1 + "a";"#);
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn division_near_zero_reports_divide_by_zero() {
        let (_, diagnostics) = run("print 1 / 0;");
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn block_scoped_variable_does_not_leak_into_enclosing_scope() {
        let (out, diagnostics) = run(
            r#"
            var x = "outer";
            {
                var x = "inner";
                print x;
            }
            print x;
            "#,
        );
        assert!(!diagnostics.had_runtime_error());
        assert_eq!(out, "inner\nouter\n");
    }

    #[test]
    fn while_loop_executes_body_until_condition_false() {
        let (out, _) = run("var i = 0; while (i < 3) { print i; i = i + 1; }");
        assert_eq!(out, "0\n1\n2\n");
    }

    #[test]
    fn equality_is_reference_identity_for_instances() {
        let (out, _) = run(
            r#"
            class A {}
            var a = A();
            var b = A();
            print a == a;
            print a == b;
            "#,
        );
        assert_eq!(out, "true\nfalse\n");
    }
}
