use std::cmp::Ordering;
use std::fmt::Display;
use std::rc::Rc;

use thiserror::Error;

use crate::error::RuntimeError;
use crate::func::Function;
use crate::token::Position;

/// Result of evaluating a node. Control signals never end up in a variable;
/// they only travel as the sole element of a result list.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Function(Rc<Function>),
    Control(Control),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Return(Vec<Value>),
    Break,
    Continue,
}

/// An operator was applied to values it does not support. Carries no
/// position; the evaluator attaches one with [`OperandError::at`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperandError {
    #[error("{0}")]
    Invalid(String),
    #[error("division by zero")]
    DivisionByZero,
}

impl OperandError {
    pub fn at(self, position: Position) -> RuntimeError {
        match self {
            OperandError::Invalid(message) => RuntimeError::InvalidOperand { message, position },
            OperandError::DivisionByZero => RuntimeError::DivisionByZero { position },
        }
    }
}

pub type OperandResult<T> = Result<T, OperandError>;

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int64",
            Value::Float(_) => "float64",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Control(_) => "control",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn add(&self, rhs: &Value) -> OperandResult<Value> {
        match (self, rhs) {
            (Value::String(l), Value::String(r)) => Ok(Value::String(format!("{l}{r}"))),
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_add(*r))),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
            _ => Err(self.mismatch("+", rhs)),
        }
    }

    pub fn sub(&self, rhs: &Value) -> OperandResult<Value> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_sub(*r))),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l - r)),
            _ => Err(self.mismatch("-", rhs)),
        }
    }

    pub fn mul(&self, rhs: &Value) -> OperandResult<Value> {
        match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_mul(*r))),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l * r)),
            _ => Err(self.mismatch("*", rhs)),
        }
    }

    pub fn div(&self, rhs: &Value) -> OperandResult<Value> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(OperandError::DivisionByZero),
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_div(*r))),
            (Value::Float(_), Value::Float(r)) if *r == 0.0 => Err(OperandError::DivisionByZero),
            (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l / r)),
            _ => Err(self.mismatch("/", rhs)),
        }
    }

    pub fn rem(&self, rhs: &Value) -> OperandResult<Value> {
        match (self, rhs) {
            (Value::Int(_), Value::Int(0)) => Err(OperandError::DivisionByZero),
            (Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_rem(*r))),
            _ => Err(self.mismatch("%", rhs)),
        }
    }

    pub fn neg(&self) -> OperandResult<Value> {
        match self {
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Float(v) => Ok(Value::Float(-v)),
            _ => Err(OperandError::Invalid(format!(
                "unary - requires a number, got {}",
                self.type_name()
            ))),
        }
    }

    /// `==` for two values of the same comparable type.
    pub fn equals(&self, rhs: &Value) -> OperandResult<bool> {
        match (self, rhs) {
            (Value::Nil, Value::Nil) => Ok(true),
            (Value::Bool(l), Value::Bool(r)) => Ok(l == r),
            (Value::Int(l), Value::Int(r)) => Ok(l == r),
            (Value::Float(l), Value::Float(r)) => Ok(l == r),
            (Value::String(l), Value::String(r)) => Ok(l == r),
            _ if !self.same_type(rhs) => {
                Err(OperandError::Invalid("cannot compare values of different types".into()))
            }
            _ => Err(OperandError::Invalid(format!(
                "values of type {} are not comparable",
                self.type_name()
            ))),
        }
    }

    /// Ordering for `<`, `<=`, `>` and `>=`. Only numbers and strings are ordered.
    pub fn compare(&self, rhs: &Value) -> OperandResult<Ordering> {
        let ordering = match (self, rhs) {
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            _ if !self.same_type(rhs) => {
                return Err(OperandError::Invalid(
                    "cannot compare values of different types".into(),
                ))
            }
            _ => {
                return Err(OperandError::Invalid(format!(
                    "don't know how to order values of type {}",
                    self.type_name()
                )))
            }
        };

        ordering.ok_or_else(|| OperandError::Invalid("cannot order NaN".into()))
    }

    fn mismatch(&self, operator: &str, rhs: &Value) -> OperandError {
        OperandError::Invalid(format!(
            "operator {operator} is not defined for {} and {}",
            self.type_name(),
            rhs.type_name()
        ))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            (Value::Control(l), Value::Control(r)) => l == r,
            _ => self.equals(other).unwrap_or(false),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) if n.is_infinite() => write!(f, "{}Inf", if *n > 0.0 { "+" } else { "-" }),
            // Shortest round-trip digits, never an exponent.
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Function(func) => write!(f, "{func}"),
            Value::Control(control) => write!(f, "{control}"),
        }
    }
}

impl Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Control::Return(values) => {
                let values = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "<return {}>", values.join(", "))
            }
            Control::Break => write!(f, "<break>"),
            Control::Continue => write!(f, "<continue>"),
        }
    }
}
