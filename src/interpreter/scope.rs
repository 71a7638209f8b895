//! Lexical scopes
//!
//! Scopes form a chain through their parents. Closures keep the scope they
//! were created in alive, so scopes are reference counted and mutated
//! through interior mutability.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::interpreter::value::Value;

pub type ScopeRef = Rc<Scope>;

#[derive(Default)]
pub struct Scope {
    variables: RefCell<HashMap<String, Value>>,
    parent: Option<ScopeRef>,
    var_args: RefCell<Option<Rc<[Value]>>>,
    in_loop: Cell<bool>,
}

impl Scope {
    /// A root scope with no parent
    pub fn new() -> ScopeRef {
        Rc::new(Self::default())
    }

    /// A child scope that resolves unknown names through `self`
    pub fn extend(self: &Rc<Self>) -> ScopeRef {
        Rc::new(Self {
            parent: Some(self.clone()),
            ..Self::default()
        })
    }

    /// Resolve a name through the chain, nearest binding first
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.variables.borrow().get(name) {
                return Some(value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    /// Declare or overwrite a binding in this scope
    pub fn set_local(&self, name: &str, value: Value) {
        self.variables.borrow_mut().insert(name.to_string(), value);
    }

    /// Update the nearest scope that declares `name`. The value is handed
    /// back when no scope in the chain declares it.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Value> {
        let mut scope = self;
        loop {
            if let Some(slot) = scope.variables.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => return Err(value),
            }
        }
    }

    pub fn set_var_args(&self, values: Vec<Value>) {
        *self.var_args.borrow_mut() = Some(values.into());
    }

    /// Extra call arguments, inherited from the nearest scope that has them
    pub fn var_args(&self) -> Rc<[Value]> {
        let mut scope = self;
        loop {
            if let Some(values) = scope.var_args.borrow().as_ref() {
                return values.clone();
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => return Rc::from(Vec::new()),
            }
        }
    }

    pub fn mark_in_loop(&self) {
        self.in_loop.set(true);
    }

    pub fn is_in_loop(&self) -> bool {
        let mut scope = self;
        loop {
            if scope.in_loop.get() {
                return true;
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

}
