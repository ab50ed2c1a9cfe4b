use std::rc::Rc;

use crate::token::{Position, Token, TokenType};

/// Identity of a node within a parsed tree, stable for as long as the tree is
/// alive because every node is heap allocated behind an `Rc`.
pub type NodeId = usize;

/// One node of the syntax tree. The tree is immutable once the parser has
/// finished its rewrites; analysis results live in a side table keyed by
/// [`Node::unique_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: TokenType,
    pub literal: String,
    pub position: Position,
    pub children: Vec<Rc<Node>>,
}

impl Node {
    pub fn new(kind: TokenType, literal: impl Into<String>, position: Position) -> Self {
        Self { kind, literal: literal.into(), position, children: vec![] }
    }

    pub fn from_token(token: &Token) -> Self {
        Self::new(token.token_type, token.lexeme.clone(), token.position)
    }

    pub fn with_children(mut self, children: Vec<Rc<Node>>) -> Self {
        self.children = children;
        self
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(Rc::new(child));
    }

    pub fn is(&self, kinds: &[TokenType]) -> bool {
        kinds.contains(&self.kind)
    }

    pub fn child(&self, index: usize) -> Option<&Rc<Node>> {
        self.children.get(index)
    }

    pub fn unique_id(&self) -> NodeId {
        std::ptr::addr_of!(*self) as usize
    }
}

impl AsRef<Node> for Node {
    fn as_ref(&self) -> &Node {
        self
    }
}
