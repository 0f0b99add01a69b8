// ABOUTME: Lexical environment frames: name -> value bindings with a parent chain
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// One scope frame. Bindings live behind a `RefCell` because closures hold
/// `Rc<Environment>` references into outer frames that must stay mutable
/// (a block assigning to an enclosing variable, a loop re-defining its own
/// frame each iteration) while multiple owners are alive.
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Self { bindings: RefCell::new(HashMap::new()), parent: None })
    }

    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Self { bindings: RefCell::new(HashMap::new()), parent: Some(parent) })
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.bindings.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(parent) = &self.parent {
            return parent.get(name);
        }
        Err(RuntimeError::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }

    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.bindings.borrow().contains_key(&name.lexeme) {
            self.bindings.borrow_mut().insert(name.lexeme.clone(), value);
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            return parent.assign(name, value);
        }
        Err(RuntimeError::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }

    fn ancestor(self: &Rc<Self>, distance: usize) -> Rc<Environment> {
        let mut env = Rc::clone(self);
        for _ in 0..distance {
            let parent = env.parent.clone().expect("resolver distance exceeds environment chain");
            env = parent;
        }
        env
    }

    /// Look up a name the resolver has already determined lives exactly
    /// `distance` scopes up. The binding is guaranteed to exist by that
    /// resolution, so a miss here means the resolver and interpreter have
    /// drifted out of sync.
    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str) -> Value {
        self.ancestor(distance)
            .bindings
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolver recorded a binding for '{name}' that isn't there"))
    }

    pub fn assign_at(self: &Rc<Self>, distance: usize, name: &Token, value: Value) {
        self.ancestor(distance).bindings.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenKind::Identifier, lexeme, None, 1)
    }

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn undefined_variable_errors() {
        let env = Environment::new();
        assert!(env.get(&name("missing")).is_err());
    }

    #[test]
    fn assign_to_undefined_errors() {
        let env = Environment::new();
        assert!(env.assign(&name("missing"), Value::Nil).is_err());
    }

    #[test]
    fn shadowing_in_child_scope() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        child.define("x", Value::Number(2.0));
        assert_eq!(child.get(&name("x")).unwrap(), Value::Number(2.0));
        assert_eq!(parent.get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_up_to_defining_scope() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));
        let child = Environment::with_parent(parent.clone());
        child.assign(&name("x"), Value::Number(5.0)).unwrap();
        assert_eq!(parent.get(&name("x")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn get_at_and_assign_at_distance() {
        let globals = Environment::new();
        let a = Environment::with_parent(globals.clone());
        let b = Environment::with_parent(a.clone());
        a.define("y", Value::Number(9.0));
        assert_eq!(b.get_at(1, "y"), Value::Number(9.0));
        b.assign_at(1, &name("y"), Value::Number(42.0));
        assert_eq!(a.get(&name("y")).unwrap(), Value::Number(42.0));
    }
}
