// ABOUTME: Lexically scoped environment chain for variable bindings

use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single lexical scope: a name-to-value map plus a pointer to the
/// enclosing scope. Created per block, per function call, and per class
/// definition (twice when the class has a superclass). Lives as long as any
/// closure or activation references it.
#[derive(Debug)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: None,
        })
    }

    pub fn with_enclosing(enclosing: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(Rc::clone(enclosing)),
        })
    }

    /// Bind `name` in this scope (doesn't walk the enclosing chain). `var`
    /// without an initializer defines `nil`; a later assignment overwrites
    /// it, so this may be called more than once for the same name.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    /// Walk `depth` enclosing steps from `self`.
    fn ancestor(self: &Rc<Self>, depth: usize) -> Rc<Environment> {
        let mut env = Rc::clone(self);
        for _ in 0..depth {
            let next = env
                .enclosing
                .clone()
                .expect("resolver-computed depth must stay within the environment chain");
            env = next;
        }
        env
    }

    /// Read a binding known (by the resolver) to live exactly `depth` scopes
    /// up from `self`. Panics if absent — that would mean the resolver and
    /// evaluator disagree about scope shape, an interpreter bug, not a
    /// user-facing error.
    pub fn get_at(self: &Rc<Self>, depth: usize, name: &str) -> Value {
        self.ancestor(depth)
            .values
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolved local '{name}' missing at depth {depth}"))
    }

    pub fn assign_at(self: &Rc<Self>, depth: usize, name: &str, value: Value) {
        self.ancestor(depth)
            .values
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Look up a global (unresolved) reference; absence is a runtime error.
    pub fn get_global(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        self.values
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::new(format!("Undefined variable '{name}'."), line))
    }

    pub fn assign_global(&self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        let mut values = self.values.borrow_mut();
        if values.contains_key(name) {
            values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(RuntimeError::new(format!("Undefined variable '{name}'."), line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get_global() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));
        assert!(matches!(env.get_global("x", 1), Ok(Value::Number(n)) if n == 42.0));
    }

    #[test]
    fn undefined_global_is_runtime_error() {
        let env = Environment::new();
        assert!(env.get_global("missing", 1).is_err());
    }

    #[test]
    fn child_shadows_parent() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));
        let child = Environment::with_enclosing(&parent);
        child.define("x", Value::Number(2.0));

        assert!(matches!(child.get_at(0, "x"), Value::Number(n) if n == 2.0));
        assert!(matches!(child.get_at(1, "x"), Value::Number(n) if n == 1.0));
    }

    #[test]
    fn assign_at_depth_mutates_ancestor() {
        let parent = Environment::new();
        parent.define("x", Value::Number(1.0));
        let child = Environment::with_enclosing(&parent);

        child.assign_at(1, "x", Value::Number(99.0));
        assert!(matches!(parent.get_global("x", 1), Ok(Value::Number(n)) if n == 99.0));
    }
}
