#![allow(clippy::new_without_default)]

mod ast;
mod environment;
mod error;
mod func;
mod interpreter;
pub mod native;
mod parser;
mod printer;
mod resolver;
mod scanner;
mod token;
mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::environment::{Scope, ScopeError};
    pub use crate::error::*;
    pub use crate::func::Function;
    pub use crate::interpreter::{evaluate, Compiler, EvalResult, Evaluator};
    pub use crate::parser::*;
    pub use crate::printer::AstPrinter;
    pub use crate::resolver::{analyze, Analysis, AnalysisError, Program, Resolver};
    pub use crate::scanner::*;
    pub use crate::token::*;
    pub use crate::value::{Control, OperandError, Value};
    pub use crate::Shared;
}

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

pub use error::Error;
use prelude::{evaluate, Parser, Resolver, Scanner, Scope, Value};

pub type Shared<T> = Rc<RefCell<T>>;

const PROMPT: &str = ">>> ";
const CONTINUATION_PROMPT: &str = "... ";

/// Front door of the interpreter. Owns the global scope, which lives as
/// long as the `Gosh` value and carries bindings from one run to the next.
pub struct Gosh {
    globals: Shared<Scope>,
    print_sexpr: bool,
    print_analysis: bool,
}

impl Gosh {
    pub fn new() -> Self {
        let mut globals = Scope::new();
        native::install(&mut globals);

        Self { globals: globals.as_shared(), print_sexpr: false, print_analysis: false }
    }

    /// Print each parse tree as an s-expression before running it.
    pub fn with_sexpr(self, print_sexpr: bool) -> Self {
        Self { print_sexpr, ..self }
    }

    /// Print each function's scope analysis before running it.
    pub fn with_analysis(self, print_analysis: bool) -> Self {
        Self { print_analysis, ..self }
    }

    pub fn globals(&self) -> &Shared<Scope> {
        &self.globals
    }

    /// Scans, parses, analyzes and evaluates `source` against the global scope.
    pub fn run(&mut self, source_name: &str, source: &str) -> Result<Vec<Value>, Error> {
        let tokens = Scanner::new(source).scan_tokens()?;
        let root = Parser::new(tokens).parse()?;
        debug!(source = source_name, statements = root.children.len(), "parsed");

        if self.print_sexpr {
            println!("{}", root.sexpr());
        }

        let known = self.globals.borrow().bindings().map(|(name, _)| name.clone()).collect::<Vec<_>>();
        let program = Resolver::new().with_globals(known).resolve(root)?;

        if self.print_analysis {
            for (i, analysis) in program.functions().iter().enumerate() {
                println!("func #{}:\n{}", i + 1, analysis.borrow());
            }
        }

        evaluate(source_name, &program, &self.globals)
    }

    /// Runs `source` and prints its result values, if any, on one line.
    pub fn run_script(&mut self, source_name: &str, source: &str) -> Result<(), anyhow::Error> {
        let values = self.run(source_name, source)?;
        if !values.is_empty() {
            println!("{}", join_values(&values));
        }
        Ok(())
    }

    pub fn run_file(&mut self, filename: &str) -> Result<(), anyhow::Error> {
        let content =
            std::fs::read_to_string(filename).with_context(|| format!("failed to read {filename}"))?;
        self.run_script(filename, &content)
    }

    /// Interactive loop. Lines are collected until parentheses and braces
    /// balance, or until a line holding a single `.`.
    pub fn run_prompt(&mut self) -> Result<(), anyhow::Error> {
        let mut editor = DefaultEditor::new()?;
        let mut input = String::new();
        let mut depth = 0i32;

        loop {
            let prompt = if input.is_empty() { PROMPT } else { CONTINUATION_PROMPT };

            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    input.clear();
                    depth = 0;
                    continue;
                }
                Err(ReadlineError::Eof) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let force = line.trim() == ".";
            if !force {
                depth += bracket_depth(&line);
                input.push_str(&line);
                input.push('\n');
            }

            if !force && depth > 0 {
                continue;
            }

            let _ = editor.add_history_entry(input.trim_end());
            match self.run("stdin", &input) {
                Ok(values) if !values.is_empty() => println!("{}", join_values(&values)),
                Ok(_) => {}
                Err(e) => eprintln!("{e}"),
            }

            input.clear();
            depth = 0;
        }
    }
}

/// Net count of opening `(` and `{` over closing ones.
fn bracket_depth(line: &str) -> i32 {
    line.chars().fold(0, |depth, c| match c {
        '(' | '{' => depth + 1,
        ')' | '}' => depth - 1,
        _ => depth,
    })
}

fn join_values(values: &[Value]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn globals_persist_between_runs() {
        let mut gosh = Gosh::new();
        gosh.run("first", "x := 40").unwrap();
        assert_eq!(gosh.run("second", "x + 2").unwrap(), vec![Value::Int(42)]);
    }

    #[test]
    fn failed_run_keeps_earlier_state() {
        let mut gosh = Gosh::new();
        gosh.run("first", "x := 1").unwrap();
        assert!(gosh.run("second", "x := \"a\"").is_err());
        assert_eq!(gosh.run("third", "x").unwrap(), vec![Value::Int(1)]);
    }

    #[test]
    fn counts_brackets() {
        assert_eq!(bracket_depth("f := func(a) {"), 1);
        assert_eq!(bracket_depth("}"), -1);
        assert_eq!(bracket_depth("g(h(1))"), 0);
    }

    #[test]
    fn joins_values() {
        assert_eq!(join_values(&[Value::Int(1), Value::from("a"), Value::Nil]), "1, a, nil");
    }
}
