use thiserror::Error;

use crate::parser::ParseError;
use crate::resolver::AnalysisError;
use crate::scanner::ScanError;
use crate::token::{Position, TokenType};

/// Problems found while turning an analyzed tree into evaluators. None of
/// these can happen once evaluation has started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{position}: unknown operator {kind}/{literal}")]
    UnknownOperator { kind: TokenType, literal: String, position: Position },
    #[error("{position}: error converting {kind} literal {literal}: {reason}")]
    InvalidLiteral { kind: TokenType, literal: String, reason: String, position: Position },
    #[error("{position}: left-hand side of {operator} must be one or more identifiers")]
    InvalidTarget { operator: TokenType, position: Position },
    #[error("{position}: {keyword} outside of a loop")]
    OutsideLoop { keyword: TokenType, position: Position },
    #[error("{position}: malformed {kind} expression")]
    Malformed { kind: TokenType, position: Position },
    #[error("{position}: function was not analyzed before compiling")]
    MissingAnalysis { position: Position },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{position}: attempt to access undefined variable {name}")]
    UndefinedVariable { name: String, position: Position },
    #[error("{position}: attempt to convert variable {name} from type {from} to type {to}")]
    TypeMismatch { name: String, from: &'static str, to: &'static str, position: Position },
    #[error("{position}: {message}")]
    InvalidOperand { message: String, position: Position },
    #[error("{position}: division by zero")]
    DivisionByZero { position: Position },
    #[error("{position}: expected a single value, got {count}")]
    ValueCount { count: usize, position: Position },
    #[error(
        "{position}: count of variables on left ({targets}) does not match number of results on right side ({values})"
    )]
    AssignmentCount { targets: usize, values: usize, position: Position },
    #[error("{position}: cannot apply a non-function ({kind})")]
    NotCallable { kind: &'static str, position: Position },
    #[error(
        "{position}: number of arguments ({arguments}) does not match number of parameters ({parameters})"
    )]
    ArgumentCount { parameters: usize, arguments: usize, position: Position },
    #[error("{position}: unable to capture free variable {name}")]
    Capture { name: String, position: Position },
}

impl RuntimeError {
    pub fn position(&self) -> Position {
        match self {
            RuntimeError::UndefinedVariable { position, .. }
            | RuntimeError::TypeMismatch { position, .. }
            | RuntimeError::InvalidOperand { position, .. }
            | RuntimeError::DivisionByZero { position }
            | RuntimeError::ValueCount { position, .. }
            | RuntimeError::AssignmentCount { position, .. }
            | RuntimeError::NotCallable { position, .. }
            | RuntimeError::ArgumentCount { position, .. }
            | RuntimeError::Capture { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{}", join_lines(.0))]
    Scan(Vec<ScanError>),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<Vec<ScanError>> for Error {
    fn from(errors: Vec<ScanError>) -> Self {
        Error::Scan(errors)
    }
}

impl Error {
    /// Process exit status for this error, following sysexits: 65 when the
    /// program was rejected before running, 70 when it failed while running.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Runtime(_) => 70,
            _ => 65,
        }
    }
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("\n")
}
