use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::error::RuntimeError;
use crate::token::Position;
use crate::value::Value;
use crate::Shared;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("attempt to access undefined variable {0}")]
    Undefined(String),
    #[error("attempt to convert variable {name} from type {from} to type {to}")]
    TypeMismatch { name: String, from: &'static str, to: &'static str },
}

impl ScopeError {
    pub fn at(self, position: Position) -> RuntimeError {
        match self {
            ScopeError::Undefined(name) => RuntimeError::UndefinedVariable { name, position },
            ScopeError::TypeMismatch { name, from, to } => {
                RuntimeError::TypeMismatch { name, from, to, position }
            }
        }
    }
}

/// One level of the variable scope chain. Every name maps to a shared cell so
/// closures can hold the very same cell as the scope that defined them.
#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<Shared<Scope>>,
    values: FxHashMap<String, Shared<Value>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(self, parent: Shared<Scope>) -> Self {
        Self { parent: Some(parent), ..self }
    }

    pub fn as_shared(self) -> Shared<Self> {
        Rc::new(RefCell::new(self))
    }

    /// The cell bound to `name` here or in the nearest enclosing scope.
    pub fn reference(&self, name: &str) -> Result<Shared<Value>, ScopeError> {
        if let Some(cell) = self.values.get(name) {
            return Ok(cell.clone());
        }

        // Ask one level above if possible
        match self.parent {
            Some(ref parent) => parent.borrow().reference(name),
            None => Err(ScopeError::Undefined(name.to_owned())),
        }
    }

    pub fn value(&self, name: &str) -> Result<Value, ScopeError> {
        self.reference(name).map(|cell| cell.borrow().clone())
    }

    /// True if `name` is bound in this scope, ignoring parents.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Checks whether [`Scope::set`] would accept `value` for `name`
    /// without writing anything.
    pub fn check_set(&self, name: &str, value: &Value) -> Result<(), ScopeError> {
        match self.values.get(name) {
            Some(cell) => check_type(name, &cell.borrow(), value),
            None => Ok(()),
        }
    }

    /// Checks a batch of writes as if they were applied in order, so a name
    /// written twice is checked against its own earlier write.
    pub fn check_all<'a>(
        &self,
        writes: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> Result<(), ScopeError> {
        let mut pending: FxHashMap<&str, &Value> = FxHashMap::default();
        for (name, value) in writes {
            match pending.get(name) {
                Some(current) => check_type(name, current, value)?,
                None => self.check_set(name, value)?,
            }
            pending.insert(name, value);
        }

        Ok(())
    }

    /// Binds `name` in this scope. An existing binding keeps its cell, so
    /// anything that captured it sees the write; its type may only change
    /// while it holds nil.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ScopeError> {
        self.check_set(name, &value)?;

        match self.values.get(name) {
            Some(cell) => *cell.borrow_mut() = value,
            None => {
                self.values.insert(name.to_owned(), Rc::new(RefCell::new(value)));
            }
        }

        Ok(())
    }

    /// Binds `name` to an existing cell shared with another scope.
    pub fn set_ref(&mut self, name: &str, cell: Shared<Value>) {
        self.values.insert(name.to_owned(), cell);
    }

    /// Names and cells bound directly in this scope.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Shared<Value>)> {
        self.values.iter()
    }
}

fn check_type(name: &str, current: &Value, value: &Value) -> Result<(), ScopeError> {
    if current.is_nil() || current.same_type(value) {
        Ok(())
    } else {
        Err(ScopeError::TypeMismatch {
            name: name.to_owned(),
            from: current.type_name(),
            to: value.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_walks_outward() {
        let globals = Scope::new().as_shared();
        globals.borrow_mut().set("x", Value::Int(1)).unwrap();

        let inner = Scope::new().with_parent(globals.clone());
        assert_eq!(inner.value("x"), Ok(Value::Int(1)));
        assert_eq!(inner.value("y"), Err(ScopeError::Undefined("y".into())));
    }

    #[test]
    fn set_creates_in_the_local_scope() {
        let globals = Scope::new().as_shared();
        globals.borrow_mut().set("x", Value::Int(1)).unwrap();

        let mut inner = Scope::new().with_parent(globals.clone());
        inner.set("x", Value::from("shadow")).unwrap();

        assert_eq!(inner.value("x"), Ok(Value::from("shadow")));
        assert_eq!(globals.borrow().value("x"), Ok(Value::Int(1)));
    }

    #[test]
    fn type_is_fixed_once_not_nil() {
        let mut scope = Scope::new();
        scope.set("x", Value::Nil).unwrap();
        scope.set("x", Value::Int(1)).unwrap();
        scope.set("x", Value::Int(2)).unwrap();

        let err = scope.set("x", Value::from("a")).unwrap_err();
        assert_eq!(
            err,
            ScopeError::TypeMismatch { name: "x".into(), from: "int64", to: "string" }
        );
        assert_eq!(scope.value("x"), Ok(Value::Int(2)));

        assert!(scope.set("x", Value::Nil).is_err());
        assert_eq!(scope.value("x"), Ok(Value::Int(2)));
    }

    #[test]
    fn shared_cells_see_each_others_writes() {
        let mut outer = Scope::new();
        outer.set("n", Value::Int(1)).unwrap();

        let mut captured = Scope::new();
        captured.set_ref("n", outer.reference("n").unwrap());

        captured.set("n", Value::Int(5)).unwrap();
        assert_eq!(outer.value("n"), Ok(Value::Int(5)));

        outer.set("n", Value::Int(9)).unwrap();
        assert_eq!(captured.value("n"), Ok(Value::Int(9)));
    }

    #[test]
    fn batch_check_sees_earlier_writes_to_the_same_name() {
        let mut scope = Scope::new();
        scope.set("a", Value::Nil).unwrap();

        let one = Value::Int(1);
        let text = Value::from("x");
        assert!(scope.check_all([("a", &one), ("b", &text)]).is_ok());
        assert_eq!(
            scope.check_all([("a", &one), ("a", &text)]),
            Err(ScopeError::TypeMismatch { name: "a".into(), from: "int64", to: "string" })
        );
        assert_eq!(scope.value("a"), Ok(Value::Nil));
    }

    #[test]
    fn nil_cell_keeps_identity_when_typed() {
        let mut outer = Scope::new();
        outer.set("f", Value::Nil).unwrap();
        let cell = outer.reference("f").unwrap();

        outer.set("f", Value::Int(3)).unwrap();
        assert_eq!(*cell.borrow(), Value::Int(3));
    }
}
