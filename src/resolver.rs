use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::{Node, NodeId};
use crate::token::{Position, TokenType};
use crate::Shared;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{position}: {message}")]
pub struct AnalysisError {
    pub position: Position,
    pub message: String,
}

impl AnalysisError {
    pub fn new<T>(node: &Node, message: impl AsRef<str>) -> Result<T, Self> {
        Err(Self { position: node.position, message: message.as_ref().to_owned() })
    }
}

/// What a function (or the top level) binds and references.
#[derive(Debug)]
pub struct Analysis {
    pub parameters: Vec<String>,
    pub channels: Vec<String>,
    pub locals: BTreeSet<String>,
    pub externs: BTreeSet<String>,
    pub identifiers: BTreeSet<String>,
    /// Free variables of nested functions. Not references of this function.
    pub nested: BTreeSet<String>,
    pub body: Rc<Node>,
    pub parent: Option<Shared<Analysis>>,
}

impl Analysis {
    pub fn new(body: Rc<Node>, parent: Option<Shared<Analysis>>) -> Self {
        Self {
            parameters: vec![],
            channels: vec![],
            locals: BTreeSet::new(),
            externs: BTreeSet::new(),
            identifiers: BTreeSet::new(),
            nested: BTreeSet::new(),
            body,
            parent,
        }
    }

    fn binds(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
            || self.channels.iter().any(|c| c == name)
            || self.locals.contains(name)
    }

    /// Names that must be captured from the defining scope: everything
    /// referenced but not bound here, plus the explicit externs.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut free = self.externs.clone();
        free.extend(self.identifiers.iter().filter(|id| !self.binds(id)).cloned());
        free
    }

    /// Free variables plus whatever nested functions need that this one
    /// doesn't bind. The closure takes these along when it can.
    pub fn captures(&self) -> BTreeSet<String> {
        let mut captures = self.free_variables();
        captures.extend(self.nested.iter().filter(|name| !self.binds(name)).cloned());
        captures
    }

    pub fn bound_in_ancestor(&self, name: &str) -> bool {
        if self.binds(name) {
            return true;
        }

        match self.parent {
            Some(ref parent) => parent.borrow().bound_in_ancestor(name),
            None => false,
        }
    }

    /// Free variables that no enclosing function binds either.
    pub fn missing_bindings(&self) -> Vec<String> {
        self.free_variables().into_iter().filter(|v| !self.bound_in_ancestor(v)).collect()
    }
}

impl Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
            names.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        }

        writeln!(f, "identifiers: {}", join(&self.identifiers))?;
        writeln!(f, "parameters: {}", join(&self.parameters))?;
        writeln!(f, "channels: {}", join(&self.channels))?;
        writeln!(f, "locals: {}", join(&self.locals))?;
        writeln!(f, "externs: {}", join(&self.externs))?;
        writeln!(f, "free: {}", join(&self.free_variables()))?;
        write!(f, "unbound: {}", join(&self.missing_bindings()))
    }
}

/// An analyzed tree. Function analyses are kept in a side table keyed by the
/// function node's identity.
#[derive(Debug)]
pub struct Program {
    pub root: Rc<Node>,
    functions: Vec<Shared<Analysis>>,
    by_node: FxHashMap<NodeId, Shared<Analysis>>,
}

impl Program {
    pub fn analysis_of(&self, node: &Node) -> Option<Shared<Analysis>> {
        self.by_node.get(&node.unique_id()).cloned()
    }

    /// Every function's analysis, in source order.
    pub fn functions(&self) -> &[Shared<Analysis>] {
        &self.functions
    }
}

/// Resolver walks the tree once per function boundary and classifies every
/// identifier as parameter, channel, local, extern or free.
#[derive(Default)]
pub struct Resolver {
    globals: FxHashSet<String>,
    functions: Vec<Shared<Analysis>>,
    by_node: FxHashMap<NodeId, Shared<Analysis>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names already bound in the global scope. Only used to keep the
    /// unbound-name warnings quiet for them.
    pub fn with_globals(mut self, globals: impl IntoIterator<Item = String>) -> Self {
        self.globals.extend(globals);
        self
    }

    pub fn resolve(mut self, root: Rc<Node>) -> Result<Program, AnalysisError> {
        let analysis = Rc::new(RefCell::new(Analysis::new(root.clone(), None)));
        self.scope_analysis(&root, &analysis)?;
        Self::finish(&analysis);

        for function in std::iter::once(&analysis).chain(&self.functions) {
            for name in function.borrow().missing_bindings() {
                if !self.globals.contains(&name) {
                    warn!(name = %name, "name is not bound in any enclosing scope");
                }
            }
        }

        Ok(Program { root, functions: self.functions, by_node: self.by_node })
    }

    fn scope_analysis(&mut self, node: &Rc<Node>, collector: &Shared<Analysis>) -> Result<(), AnalysisError> {
        match node.kind {
            TokenType::Func => return self.function(node, collector),
            TokenType::MethApply => return self.method_apply(node, collector),
            TokenType::Assign | TokenType::QAssign | TokenType::Accum => {
                self.assignment(node, collector)?;
            }
            TokenType::Extern => {
                for child in &node.children {
                    if !child.is(&[TokenType::Ident]) {
                        return AnalysisError::new(child, "extern expects identifiers");
                    }
                    collector.borrow_mut().externs.insert(child.literal.clone());
                }
            }
            TokenType::Ident => {
                collector.borrow_mut().identifiers.insert(node.literal.clone());
            }
            TokenType::Period => {
                // The name right of the dot is a field, not a variable.
                if let Some(object) = node.child(0) {
                    self.scope_analysis(object, collector)?;
                }
                return Ok(());
            }
            _ => {}
        }

        for child in &node.children {
            self.scope_analysis(child, collector)?;
        }

        Ok(())
    }

    fn function(&mut self, node: &Rc<Node>, parent: &Shared<Analysis>) -> Result<(), AnalysisError> {
        let (Some(params), Some(channels), Some(body)) = (node.child(0), node.child(1), node.child(2)) else {
            return AnalysisError::new(node, "function needs parameters, channels and a body");
        };

        let mut analysis = Analysis::new(body.clone(), Some(parent.clone()));
        analysis.parameters = idents(params)?;
        analysis.channels = idents(channels)?;
        let collector = Rc::new(RefCell::new(analysis));

        self.functions.push(collector.clone());
        self.by_node.insert(node.unique_id(), collector.clone());

        self.scope_analysis(body, &collector)?;
        Self::finish(&collector);

        let captures = collector.borrow().captures();
        parent.borrow_mut().nested.extend(captures);

        let analysis = collector.borrow();
        debug!(
            parameters = ?analysis.parameters,
            locals = ?analysis.locals,
            free = ?analysis.free_variables(),
            "analyzed function"
        );

        Ok(())
    }

    fn method_apply(&mut self, node: &Rc<Node>, collector: &Shared<Analysis>) -> Result<(), AnalysisError> {
        let Some(object) = node.child(0) else {
            return AnalysisError::new(node, "method call without an object");
        };

        let ident = primary_ident(object)?;
        collector.borrow_mut().identifiers.insert(ident);

        // Second child is the method name.
        for argument in node.children.iter().skip(2) {
            self.scope_analysis(argument, collector)?;
        }

        Ok(())
    }

    fn assignment(&mut self, node: &Node, collector: &Shared<Analysis>) -> Result<(), AnalysisError> {
        let Some(lhs) = node.child(0) else {
            return AnalysisError::new(node, "assignment without a target");
        };

        let targets = if lhs.is(&[TokenType::Comma, TokenType::LParen]) {
            lhs.children.iter().map(|c| primary_ident(c)).collect::<Result<Vec<_>, _>>()?
        } else {
            vec![primary_ident(lhs)?]
        };

        collector.borrow_mut().locals.extend(targets);
        Ok(())
    }

    fn finish(collector: &Shared<Analysis>) {
        let mut analysis = collector.borrow_mut();
        let externs = analysis.externs.clone();
        analysis.locals.retain(|local| !externs.contains(local));
    }
}

pub fn analyze(root: Rc<Node>) -> Result<Program, AnalysisError> {
    Resolver::new().resolve(root)
}

/// Flattens a parameter or channel list into names.
fn idents(node: &Node) -> Result<Vec<String>, AnalysisError> {
    match node.kind {
        TokenType::Ident => Ok(vec![node.literal.clone()]),
        TokenType::Comma | TokenType::LSqr | TokenType::LParen => {
            let mut names = vec![];
            for child in &node.children {
                names.extend(idents(child)?);
            }
            Ok(names)
        }
        _ => AnalysisError::new(node, format!("expected an identifier, found '{}'", node.literal)),
    }
}

/// The left-most name of an expression: `a[b]` and `a.b.c[2]` both give `a`.
fn primary_ident(node: &Node) -> Result<String, AnalysisError> {
    match node.kind {
        TokenType::Ident => Ok(node.literal.clone()),
        TokenType::Period | TokenType::LSqr => match node.child(0) {
            Some(inner) => primary_ident(inner),
            None => AnalysisError::new(node, "expected an identifier"),
        },
        _ => AnalysisError::new(node, format!("expected an identifier, found '{}'", node.literal)),
    }
}
