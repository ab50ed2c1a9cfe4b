use std::fmt::{Debug, Display};

use tracing::trace;

use crate::environment::Scope;
use crate::error::RuntimeError;
use crate::interpreter::Evaluator;
use crate::token::Position;
use crate::value::{Control, Value};
use crate::Shared;

/// A closure: compiled body plus the cells it captured when the function
/// literal was evaluated.
pub struct Function {
    pub parameters: Vec<String>,
    pub channels: Vec<String>,
    pub locals: Vec<String>,
    pub body: Evaluator,
    pub captured: Shared<Scope>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Runs the body in a child of the caller's scope, seeded with the
    /// captured cells, the locals set to nil and the parameters bound to
    /// `arguments`.
    pub fn call(
        &self,
        arguments: Vec<Value>,
        caller: &Shared<Scope>,
        position: Position,
    ) -> Result<Vec<Value>, RuntimeError> {
        if arguments.len() != self.arity() {
            return Err(RuntimeError::ArgumentCount {
                parameters: self.arity(),
                arguments: arguments.len(),
                position,
            });
        }

        trace!(function = %self, arguments = arguments.len(), "applying function");

        let mut scope = Scope::new().with_parent(caller.clone());
        for (name, cell) in self.captured.borrow().bindings() {
            scope.set_ref(name, cell.clone());
        }
        for local in &self.locals {
            scope.set(local, Value::Nil).map_err(|e| e.at(position))?;
        }
        for (param, arg) in self.parameters.iter().zip(arguments) {
            scope.set(param, arg).map_err(|e| e.at(position))?;
        }

        let mut result = (self.body)(&scope.as_shared())?;

        // A return signal ends here; its values become the call's values.
        if let [Value::Control(Control::Return(_))] = result.as_slice() {
            if let Some(Value::Control(Control::Return(values))) = result.pop() {
                return Ok(values);
            }
        }

        Ok(result)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func({})[{}]{{...}}", self.parameters.join(", "), self.channels.join(", "))
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .field("channels", &self.channels)
            .field("locals", &self.locals)
            .finish_non_exhaustive()
    }
}
