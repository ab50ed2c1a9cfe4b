use std::rc::Rc;

use thiserror::Error;

use crate::ast::Node;
use crate::token::{Position, Token, TokenType};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

type ParseResult = Result<Node, ParseError>;

// Binding powers, lowest first. Even numbers so right-associative operators
// can parse their right side at `bp - 1`.
const P_NONE: u8 = 0;
const P_ASSIGN: u8 = 4;
const P_RETURN: u8 = 6;
const P_COMMA: u8 = 8;
const P_LOGIC: u8 = 10;
const P_COMPARE: u8 = 12;
const P_PLUSMINUS: u8 = 14;
const P_MULTDIV: u8 = 16;
const P_PREFIX: u8 = 18;
const P_CALL: u8 = 20;
const P_PERIOD: u8 = 22;

fn binding_power(token_type: TokenType) -> u8 {
    match token_type {
        TokenType::Assign | TokenType::QAssign | TokenType::Accum => P_ASSIGN,
        TokenType::Comma => P_COMMA,
        TokenType::LogAnd | TokenType::LogOr => P_LOGIC,
        TokenType::Equal
        | TokenType::NotEqual
        | TokenType::Less
        | TokenType::LessEqual
        | TokenType::Grtr
        | TokenType::GrtrEqual => P_COMPARE,
        TokenType::Plus | TokenType::Minus => P_PLUSMINUS,
        TokenType::Mult | TokenType::Div | TokenType::Modulo => P_MULTDIV,
        TokenType::LParen | TokenType::LSqr => P_CALL,
        TokenType::Period => P_PERIOD,
        _ => P_NONE,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// A stream that doesn't end in EOF gets one appended.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        match tokens.last() {
            Some(last) if last.token_type == TokenType::EOF => {}
            last => {
                let position = last.map(|t| t.position).unwrap_or_default();
                tokens.push(Token::new(TokenType::EOF, "", position));
            }
        }
        Self { tokens, current: 0 }
    }

    /// Parses a whole program into a `stmts` node.
    pub fn parse(&mut self) -> Result<Rc<Node>, ParseError> {
        let program = self.statements(TokenType::EOF)?;
        self.consume(TokenType::EOF, "Expect end of input")?;
        Ok(Rc::new(program))
    }

    fn statements(&mut self, terminator: TokenType) -> ParseResult {
        let mut stmts = Node::new(TokenType::Stmts, "stmts", self.peek().position);

        loop {
            while self.match_tt(&[TokenType::Semi]) {}
            if self.check(terminator) || self.is_at_end() {
                break;
            }

            stmts.push(self.expression(P_NONE)?);

            if !self.check(terminator) && !self.match_tt(&[TokenType::Semi]) {
                return Err(self.error(self.peek(), "Expect newline or ';' after expression"));
            }
        }

        Ok(stmts)
    }

    fn expression(&mut self, rbp: u8) -> ParseResult {
        let token = self.advance();
        let mut left = self.nud(token)?;

        while rbp < binding_power(self.peek().token_type) {
            let token = self.advance();
            left = self.led(token, left)?;
        }

        Ok(left)
    }

    /// Tokens that start an expression.
    fn nud(&mut self, token: Token) -> ParseResult {
        let mut node = Node::from_token(&token);

        match token.token_type {
            TokenType::Ident
            | TokenType::Int
            | TokenType::Float
            | TokenType::String
            | TokenType::True
            | TokenType::False
            | TokenType::Nil
            | TokenType::Break
            | TokenType::Continue => Ok(node),
            TokenType::Not | TokenType::Minus => {
                node.push(self.expression(P_PREFIX)?);
                Ok(node)
            }
            TokenType::LParen => {
                if self.match_tt(&[TokenType::RParen]) {
                    return Ok(node);
                }
                let inner = self.expression(P_NONE)?;
                self.consume(TokenType::RParen, "Expect ')' after expression")?;
                Ok(inner)
            }
            TokenType::Return => {
                if !self.ends_expression() {
                    node.push(self.expression(P_RETURN)?);
                }
                Ok(node)
            }
            TokenType::Extern => {
                node.push(self.expression(P_COMMA)?);
                while self.match_tt(&[TokenType::Comma]) {
                    node.push(self.expression(P_COMMA)?);
                }
                Ok(node)
            }
            TokenType::Func => self.function(node),
            TokenType::If => {
                node.push(self.expression(P_NONE)?);
                node.push(self.block()?);

                while self.match_tt(&[TokenType::Else]) {
                    if self.match_tt(&[TokenType::If]) {
                        node.push(self.expression(P_NONE)?);
                        node.push(self.block()?);
                    } else {
                        node.push(self.block()?);
                        break;
                    }
                }
                Ok(node)
            }
            TokenType::While => {
                node.push(self.expression(P_NONE)?);
                node.push(self.block()?);
                Ok(node)
            }
            TokenType::EOF => Err(self.error(&token, "Unexpected end of input")),
            _ => Err(self.error(&token, "Expect expression")),
        }
    }

    /// Tokens that continue an expression, given what is to their left.
    fn led(&mut self, token: Token, left: Node) -> ParseResult {
        let bp = binding_power(token.token_type);
        let mut node = Node::from_token(&token);

        match token.token_type {
            TokenType::Assign | TokenType::QAssign | TokenType::Accum => {
                node.push(left);
                node.push(self.expression(bp - 1)?);
                Ok(node)
            }
            TokenType::Comma => {
                // (, (, a b) c) ==> (, a b c)
                if left.kind == TokenType::Comma {
                    node.children = left.children;
                } else {
                    node.push(left);
                }
                node.push(self.expression(bp)?);
                Ok(node)
            }
            TokenType::LParen => self.call(token, left),
            TokenType::LSqr => {
                node.push(left);
                node.push(self.expression(P_NONE)?);
                self.consume(TokenType::RSqr, "Expect ']' after index")?;
                Ok(node)
            }
            TokenType::Period => {
                node.push(left);
                let field = self.consume(TokenType::Ident, "Expect field name after '.'")?;
                node.push(Node::from_token(&field));
                Ok(node)
            }
            _ => {
                node.push(left);
                node.push(self.expression(bp)?);
                Ok(node)
            }
        }
    }

    /// ("(" f ...) ==> (f-apply f ...) and ("(" (. o m) ...) ==> (m-apply o m ...)
    fn call(&mut self, paren: Token, callee: Node) -> ParseResult {
        let mut arguments = vec![];
        if !self.check(TokenType::RParen) {
            loop {
                arguments.push(Rc::new(self.expression(P_COMMA)?));
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "Expect ')' after arguments")?;

        let node = if callee.kind == TokenType::Period && callee.children.len() == 2 {
            let mut children = callee.children;
            children.extend(arguments);
            Node::from_token(&paren.rewrite(TokenType::MethApply, "m-apply")).with_children(children)
        } else {
            let mut children = vec![Rc::new(callee)];
            children.extend(arguments);
            Node::from_token(&paren.rewrite(TokenType::FuncApply, "f-apply")).with_children(children)
        };

        Ok(node)
    }

    /// func(params)[channels] { body } ==> (func (params ...) (channels ...) (stmts ...))
    fn function(&mut self, mut node: Node) -> ParseResult {
        let open = self.consume(TokenType::LParen, "Expect '(' after 'func'")?;
        let mut parameters = Node::new(TokenType::LParen, "params", open.position);
        if !self.check(TokenType::RParen) {
            loop {
                parameters.push(self.expression(P_COMMA)?);
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RParen, "Expect ')' after parameters")?;

        let mut channels = Node::new(TokenType::LSqr, "channels", self.peek().position);
        if self.match_tt(&[TokenType::LSqr]) {
            if !self.check(TokenType::RSqr) {
                loop {
                    channels.push(self.expression(P_COMMA)?);
                    if !self.match_tt(&[TokenType::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenType::RSqr, "Expect ']' after channels")?;
        }

        node.push(parameters);
        node.push(channels);
        node.push(self.block()?);
        Ok(node)
    }

    fn block(&mut self) -> ParseResult {
        self.consume(TokenType::LBrace, "Expect '{' before block")?;
        let body = self.statements(TokenType::RBrace)?;
        self.consume(TokenType::RBrace, "Expect '}' after block")?;
        Ok(body)
    }

    fn ends_expression(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Semi | TokenType::RBrace | TokenType::RParen | TokenType::EOF
        )
    }

    /// Return the next token if its `token_type` matches the given type as input.
    /// Otherwise, return an error built from `message`.
    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.peek().token_type == token_type {
            return Ok(self.advance());
        }

        Err(self.error(self.peek(), message))
    }

    fn error(&self, token: &Token, message: &str) -> ParseError {
        let message = if token.token_type == TokenType::EOF {
            format!("{message}, at end")
        } else {
            format!("{message}, at '{}'", token.lexeme)
        };

        ParseError { position: token.position, message }
    }

    fn match_tt(&mut self, types: &[TokenType]) -> bool {
        for &tt in types {
            if self.check(tt) {
                self.advance();
                return true;
            }
        }

        false
    }

    /// Check to see if the next token's type matches the given `token_type`.
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing EOF.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }
}
