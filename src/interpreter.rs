use std::cmp::Ordering;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::Node;
use crate::environment::Scope;
use crate::error::{CompileError, Error, RuntimeError};
use crate::func::Function;
use crate::resolver::Program;
use crate::token::{Position, TokenType};
use crate::value::{Control, OperandError, Value};
use crate::Shared;

pub type EvalResult = Result<Vec<Value>, RuntimeError>;

/// A compiled node: runs the node's semantics against a live scope.
pub type Evaluator = Rc<dyn Fn(&Shared<Scope>) -> EvalResult>;

type BinaryOp = fn(&Value, &Value) -> Result<Value, OperandError>;
type CompareOp = fn(&Value, &Value) -> Result<bool, OperandError>;

/// If a sub-evaluation produced a control signal, hand it to the caller
/// untouched and skip the rest of the work.
macro_rules! propagate {
    ($values:expr) => {{
        let values = $values;
        if is_signal(&values) {
            return Ok(values);
        }
        values
    }};
}

fn is_signal(values: &[Value]) -> bool {
    matches!(values, [Value::Control(_)])
}

fn single(mut values: Vec<Value>, position: Position) -> Result<Value, RuntimeError> {
    match values.len() {
        1 => Ok(values.remove(0)),
        count => Err(RuntimeError::ValueCount { count, position }),
    }
}

fn constant(value: Value) -> Evaluator {
    Rc::new(move |_| Ok(vec![value.clone()]))
}

/// Compiles an analyzed tree into evaluators, one per node, each built once.
pub struct Compiler<'p> {
    program: &'p Program,
    loop_depth: usize,
}

impl<'p> Compiler<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program, loop_depth: 0 }
    }

    pub fn compile(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let position = node.position;

        match node.kind {
            TokenType::Int => {
                let n = node.literal.parse::<i64>().map_err(|e| self.invalid_literal(node, e))?;
                Ok(constant(Value::Int(n)))
            }
            TokenType::Float => {
                let n = node.literal.parse::<f64>().map_err(|e| self.invalid_literal(node, e))?;
                Ok(constant(Value::Float(n)))
            }
            TokenType::String => Ok(constant(Value::String(node.literal.clone()))),
            TokenType::True => Ok(constant(Value::Bool(true))),
            TokenType::False => Ok(constant(Value::Bool(false))),
            TokenType::Nil => Ok(constant(Value::Nil)),
            TokenType::Ident => {
                let name = node.literal.clone();
                Ok(Rc::new(move |scope| {
                    let value = scope.borrow().value(&name).map_err(|e| e.at(position))?;
                    Ok(vec![value])
                }))
            }
            TokenType::Stmts => self.statements(node),
            TokenType::Comma | TokenType::LParen => self.tuple(node),
            TokenType::Assign => self.assign(node),
            TokenType::Accum => self.accumulate(node),
            TokenType::QAssign => self.default_assign(node),
            TokenType::Plus => self.binary(node, Value::add),
            TokenType::Minus if node.children.len() == 1 => self.negate(node),
            TokenType::Minus => self.binary(node, Value::sub),
            TokenType::Mult => self.binary(node, Value::mul),
            TokenType::Div => self.binary(node, Value::div),
            TokenType::Modulo => self.binary(node, Value::rem),
            TokenType::Equal => self.comparison(node, Value::equals),
            TokenType::NotEqual => self.comparison(node, |l, r| l.equals(r).map(|eq| !eq)),
            TokenType::Less => self.comparison(node, |l, r| l.compare(r).map(Ordering::is_lt)),
            TokenType::LessEqual => self.comparison(node, |l, r| l.compare(r).map(Ordering::is_le)),
            TokenType::Grtr => self.comparison(node, |l, r| l.compare(r).map(Ordering::is_gt)),
            TokenType::GrtrEqual => self.comparison(node, |l, r| l.compare(r).map(Ordering::is_ge)),
            TokenType::LogAnd => self.logical(node, false),
            TokenType::LogOr => self.logical(node, true),
            TokenType::Not => self.not(node),
            TokenType::If => self.conditional(node),
            TokenType::While => self.while_loop(node),
            TokenType::Return => self.return_signal(node),
            TokenType::Break | TokenType::Continue => self.loop_signal(node),
            TokenType::Extern => Ok(Rc::new(|_| Ok(vec![]))),
            TokenType::Func => self.function(node),
            TokenType::FuncApply => self.apply(node),
            TokenType::Illegal
            | TokenType::EOF
            | TokenType::Period
            | TokenType::Semi
            | TokenType::RParen
            | TokenType::LSqr
            | TokenType::RSqr
            | TokenType::LBrace
            | TokenType::RBrace
            | TokenType::Else
            | TokenType::MethApply => Err(CompileError::UnknownOperator {
                kind: node.kind,
                literal: node.literal.clone(),
                position,
            }),
        }
    }

    fn invalid_literal(&self, node: &Node, reason: impl ToString) -> CompileError {
        CompileError::InvalidLiteral {
            kind: node.kind,
            literal: node.literal.clone(),
            reason: reason.to_string(),
            position: node.position,
        }
    }

    fn malformed(node: &Node) -> CompileError {
        CompileError::Malformed { kind: node.kind, position: node.position }
    }

    fn pair(&mut self, node: &Node) -> Result<(Evaluator, Evaluator), CompileError> {
        match node.children.as_slice() {
            [left, right] => Ok((self.compile(left)?, self.compile(right)?)),
            _ => Err(Self::malformed(node)),
        }
    }

    fn one(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        match node.children.as_slice() {
            [operand] => self.compile(operand),
            _ => Err(Self::malformed(node)),
        }
    }

    fn all(&mut self, nodes: &[Rc<Node>]) -> Result<Vec<Evaluator>, CompileError> {
        nodes.iter().map(|n| self.compile(n)).collect()
    }

    /// Names on the left of `:=` or `?=`: one identifier or a list of them.
    fn targets(node: &Node) -> Result<Vec<String>, CompileError> {
        let invalid = || CompileError::InvalidTarget { operator: node.kind, position: node.position };
        let lhs = node.child(0).ok_or_else(invalid)?;

        let targets = if lhs.is(&[TokenType::Comma, TokenType::LParen]) {
            lhs.children.iter().collect::<Vec<_>>()
        } else {
            vec![lhs]
        };

        targets
            .into_iter()
            .map(|t| if t.is(&[TokenType::Ident]) { Ok(t.literal.clone()) } else { Err(invalid()) })
            .collect()
    }

    fn statements(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let statements = self.all(&node.children)?;

        Ok(Rc::new(move |scope| {
            let mut last = vec![];
            for statement in &statements {
                last = statement(scope)?;
                if is_signal(&last) {
                    break;
                }
            }
            Ok(last)
        }))
    }

    fn tuple(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let items = self.all(&node.children)?;

        Ok(Rc::new(move |scope| {
            let mut values = vec![];
            for item in &items {
                values.extend(propagate!(item(scope)?));
            }
            Ok(values)
        }))
    }

    fn assign(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let targets = Self::targets(node)?;
        let rhs = self.compile(node.child(1).ok_or_else(|| Self::malformed(node))?)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let values = propagate!(rhs(scope)?);
            if values.len() != targets.len() {
                return Err(RuntimeError::AssignmentCount {
                    targets: targets.len(),
                    values: values.len(),
                    position,
                });
            }

            // Check every target first so a failed assignment writes nothing.
            let mut scope = scope.borrow_mut();
            scope.check_all(targets.iter().map(String::as_str).zip(&values)).map_err(|e| e.at(position))?;
            for (target, value) in targets.iter().zip(&values) {
                scope.set(target, value.clone()).map_err(|e| e.at(position))?;
            }

            Ok(values)
        }))
    }

    /// `x += e` is `x := x + e`.
    fn accumulate(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let name = match node.child(0) {
            Some(target) if target.is(&[TokenType::Ident]) => target.literal.clone(),
            _ => return Err(CompileError::InvalidTarget { operator: node.kind, position: node.position }),
        };
        let rhs = self.compile(node.child(1).ok_or_else(|| Self::malformed(node))?)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let operand = single(propagate!(rhs(scope)?), position)?;
            let current = scope.borrow().value(&name).map_err(|e| e.at(position))?;
            let sum = current.add(&operand).map_err(|e| e.at(position))?;
            scope.borrow_mut().set(&name, sum.clone()).map_err(|e| e.at(position))?;
            Ok(vec![sum])
        }))
    }

    /// `x ?= e` assigns only targets that are unbound or nil. The right side
    /// is not evaluated when every target already has a value.
    fn default_assign(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let targets = Self::targets(node)?;
        let rhs = self.compile(node.child(1).ok_or_else(|| Self::malformed(node))?)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let current = targets
                .iter()
                .map(|t| scope.borrow().value(t).unwrap_or(Value::Nil))
                .collect::<Vec<_>>();

            if current.iter().all(|v| !v.is_nil()) {
                return Ok(current);
            }

            let values = propagate!(rhs(scope)?);
            if values.len() != targets.len() {
                return Err(RuntimeError::AssignmentCount {
                    targets: targets.len(),
                    values: values.len(),
                    position,
                });
            }

            let mut scope = scope.borrow_mut();
            let pending = targets.iter().zip(current.iter().zip(values)).filter(|(_, (cur, _))| cur.is_nil());
            let pending = pending.map(|(t, (_, v))| (t, v)).collect::<Vec<_>>();
            scope.check_all(pending.iter().map(|(t, v)| (t.as_str(), v))).map_err(|e| e.at(position))?;
            for (target, value) in pending {
                scope.set(target, value).map_err(|e| e.at(position))?;
            }

            targets.iter().map(|t| scope.value(t).map_err(|e| e.at(position))).collect()
        }))
    }

    fn binary(&mut self, node: &Node, op: BinaryOp) -> Result<Evaluator, CompileError> {
        let (left, right) = self.pair(node)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let l = single(propagate!(left(scope)?), position)?;
            let r = single(propagate!(right(scope)?), position)?;
            let value = op(&l, &r).map_err(|e| e.at(position))?;
            Ok(vec![value])
        }))
    }

    fn negate(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let operand = self.one(node)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let value = single(propagate!(operand(scope)?), position)?;
            Ok(vec![value.neg().map_err(|e| e.at(position))?])
        }))
    }

    fn comparison(&mut self, node: &Node, op: CompareOp) -> Result<Evaluator, CompileError> {
        let (left, right) = self.pair(node)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let l = single(propagate!(left(scope)?), position)?;
            let r = single(propagate!(right(scope)?), position)?;
            let result = op(&l, &r).map_err(|e| e.at(position))?;
            Ok(vec![Value::Bool(result)])
        }))
    }

    /// `&&` stops at a falsy left side, `||` at a truthy one. Either way the
    /// result is the operand value itself, not a coerced bool.
    fn logical(&mut self, node: &Node, stop_when_truthy: bool) -> Result<Evaluator, CompileError> {
        let (left, right) = self.pair(node)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let l = single(propagate!(left(scope)?), position)?;
            if l.is_truthy() == stop_when_truthy {
                return Ok(vec![l]);
            }
            right(scope)
        }))
    }

    fn not(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let operand = self.one(node)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let value = single(propagate!(operand(scope)?), position)?;
            Ok(vec![Value::Bool(!value.is_truthy())])
        }))
    }

    fn conditional(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let mut branches = vec![];
        let mut chunks = node.children.chunks_exact(2);
        for chunk in &mut chunks {
            branches.push((self.compile(&chunk[0])?, self.compile(&chunk[1])?));
        }
        let otherwise = match chunks.remainder() {
            [last] => Some(self.compile(last)?),
            _ => None,
        };

        if branches.is_empty() {
            return Err(Self::malformed(node));
        }
        let position = node.position;

        Ok(Rc::new(move |scope| {
            for (condition, body) in &branches {
                let test = single(propagate!(condition(scope)?), position)?;
                if test.is_truthy() {
                    return body(scope);
                }
            }

            match otherwise {
                Some(ref body) => body(scope),
                None => Ok(vec![]),
            }
        }))
    }

    /// Yields `true` when the condition turns falsy and `false` on `break`.
    /// A return signal leaves the loop unchanged.
    fn while_loop(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let (Some(condition), Some(body)) = (node.child(0), node.child(1)) else {
            return Err(Self::malformed(node));
        };
        let condition = self.compile(condition)?;

        self.loop_depth += 1;
        let body = self.compile(body);
        self.loop_depth -= 1;
        let body = body?;

        let position = node.position;

        Ok(Rc::new(move |scope| loop {
            let test = single(propagate!(condition(scope)?), position)?;
            if !test.is_truthy() {
                return Ok(vec![Value::Bool(true)]);
            }

            let result = body(scope)?;
            match result.as_slice() {
                [Value::Control(Control::Break)] => return Ok(vec![Value::Bool(false)]),
                [Value::Control(Control::Return(_))] => return Ok(result),
                _ => {}
            }
        }))
    }

    fn return_signal(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let operand = match node.child(0) {
            Some(child) => Some(self.compile(child)?),
            None => None,
        };

        Ok(Rc::new(move |scope| {
            let values = match operand {
                Some(ref operand) => propagate!(operand(scope)?),
                None => vec![],
            };
            Ok(vec![Value::Control(Control::Return(values))])
        }))
    }

    fn loop_signal(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        if self.loop_depth == 0 {
            return Err(CompileError::OutsideLoop { keyword: node.kind, position: node.position });
        }

        let signal = match node.kind {
            TokenType::Break => Control::Break,
            _ => Control::Continue,
        };
        Ok(constant(Value::Control(signal)))
    }

    /// The body is compiled once here. Each evaluation of the literal builds
    /// a new closure capturing the current cells of its free variables.
    fn function(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let position = node.position;
        let analysis = self
            .program
            .analysis_of(node)
            .ok_or(CompileError::MissingAnalysis { position })?;
        let analysis = analysis.borrow();

        let body = node.child(2).ok_or_else(|| Self::malformed(node))?;
        // Loops outside the function don't make break/continue legal inside it.
        let enclosing_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.compile(body);
        self.loop_depth = enclosing_depth;
        let body = body?;

        let parameters = analysis.parameters.clone();
        let channels = analysis.channels.clone();
        let locals = analysis.locals.iter().cloned().collect::<Vec<_>>();
        let free = analysis.free_variables();
        let passed = analysis.captures().difference(&free).cloned().collect::<Vec<_>>();
        let free = free.into_iter().collect::<Vec<_>>();
        debug!(parameters = ?parameters, free = ?free, passed = ?passed, "compiled function");

        Ok(Rc::new(move |scope| {
            let mut captured = Scope::new();
            for name in &free {
                let cell = scope
                    .borrow()
                    .reference(name)
                    .map_err(|_| RuntimeError::Capture { name: name.clone(), position })?;
                captured.set_ref(name, cell);
            }
            // Names only nested functions use. One that is not bound yet is
            // looked up again when the nested literal runs.
            for name in &passed {
                if let Ok(cell) = scope.borrow().reference(name) {
                    captured.set_ref(name, cell);
                }
            }
            trace!(free = ?free, "captured closure");

            let function = Function {
                parameters: parameters.clone(),
                channels: channels.clone(),
                locals: locals.clone(),
                body: body.clone(),
                captured: captured.as_shared(),
            };
            Ok(vec![Value::Function(Rc::new(function))])
        }))
    }

    fn apply(&mut self, node: &Node) -> Result<Evaluator, CompileError> {
        let Some((callee, arguments)) = node.children.split_first() else {
            return Err(Self::malformed(node));
        };
        let callee = self.compile(callee)?;
        let arguments = self.all(arguments)?;
        let position = node.position;

        Ok(Rc::new(move |scope| {
            let function = match single(propagate!(callee(scope)?), position)? {
                Value::Function(function) => function,
                other => return Err(RuntimeError::NotCallable { kind: other.type_name(), position }),
            };

            let mut values = vec![];
            for argument in &arguments {
                values.extend(propagate!(argument(scope)?));
            }

            function.call(values, scope, position)
        }))
    }
}

/// Compiles `program` and runs it against `globals`. A top-level `return`
/// ends the program with its values.
#[tracing::instrument(level = "debug", skip_all, fields(source = source_name))]
pub fn evaluate(source_name: &str, program: &Program, globals: &Shared<Scope>) -> Result<Vec<Value>, Error> {
    let evaluator = Compiler::new(program).compile(&program.root)?;
    debug!("compiled program");

    let mut values = evaluator(globals)?;
    if let [Value::Control(Control::Return(_))] = values.as_slice() {
        if let Some(Value::Control(Control::Return(returned))) = values.pop() {
            values = returned;
        }
    }

    Ok(values)
}
