// ABOUTME: Callable values - user-defined functions, classes, and native functions
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

#[derive(Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.arity(),
            Callable::Class(c) => c.arity(),
            Callable::Native(n) => n.arity,
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(f) => f.call(interpreter, args),
            Callable::Class(c) => c.call(interpreter, args),
            Callable::Native(n) => (n.func)(&args),
        }
    }

    /// Reference identity, matching the book's rule that two functions or
    /// classes are equal only if they are literally the same object.
    pub fn identity_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(func) => write!(f, "<fn {}>", func.name()),
            Callable::Class(class) => write!(f, "{}", class.name),
            Callable::Native(_) => write!(f, "<native fn>"),
        }
    }
}

pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<Environment>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Rc<Environment>, is_initializer: bool) -> Self {
        Self { declaration, closure, is_initializer }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produces a copy of this function whose closure has `this` bound to
    /// `instance`, one scope out from the method's original closure. Class
    /// statements call this once per instantiation (for `init`) and
    /// instance property lookups call it once per method access.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        let env = Environment::with_parent(self.closure.clone());
        env.define("this", Value::Instance(instance));
        LoxFunction { declaration: self.declaration.clone(), closure: env, is_initializer: self.is_initializer }
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = Environment::with_parent(self.closure.clone());
        for (param, arg) in self.declaration.params.iter().zip(args) {
            env.define(param.lexeme.clone(), arg);
        }

        let flow = interpreter.execute_block(&self.declaration.body, env)?;

        if self.is_initializer {
            return Ok(self.closure.get_at(0, "this"));
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }
}

pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(name: String, superclass: Option<Rc<LoxClass>>, methods: HashMap<String, Rc<LoxFunction>>) -> Self {
        Self { name, superclass, methods }
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map(|m| m.arity()).unwrap_or(0)
    }

    pub fn call(self: &Rc<Self>, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(LoxInstance::new(self.clone()));
        if let Some(initializer) = self.find_method("init") {
            initializer.bind(instance.clone()).call(interpreter, args)?;
        }
        Ok(Value::Instance(instance))
    }
}

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self { class, fields: RefCell::new(HashMap::new()) }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn get(self: &Rc<Self>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(method) = self.class.find_method(&name.lexeme) {
            return Ok(Value::Callable(Callable::Function(Rc::new(method.bind(self.clone())))));
        }
        Err(RuntimeError::new(name.clone(), format!("Undefined property '{}'.", name.lexeme)))
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, RuntimeError>,
}

pub fn clock(_args: &[Value]) -> Result<Value, RuntimeError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(Value::Number(elapsed.as_secs_f64()))
}
