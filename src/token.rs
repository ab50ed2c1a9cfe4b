use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Illegal,
    EOF,

    // Identifiers and literals.
    Ident,
    Int,
    Float,
    String,

    // Assignment flavours.
    Assign,
    QAssign,
    Accum,

    // Operators.
    Plus,
    Minus,
    Mult,
    Div,
    Modulo,
    Not,
    LogAnd,
    LogOr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Grtr,
    GrtrEqual,

    // Delimiters.
    Comma,
    Semi,
    Period,
    LParen,
    RParen,
    LSqr,
    RSqr,
    LBrace,
    RBrace,

    // Keywords.
    Func,
    If,
    Else,
    While,
    Return,
    Break,
    Continue,
    Extern,
    True,
    False,
    Nil,

    // Produced by the parser's rewrites, never by the scanner.
    Stmts,
    FuncApply,
    MethApply,
}

impl TokenType {
    /// The spelling used when printing a tree or reporting an unknown operator.
    pub fn name(&self) -> &'static str {
        match self {
            TokenType::Illegal => "ILLEGAL",
            TokenType::EOF => "EOF",
            TokenType::Ident => "IDENT",
            TokenType::Int => "INT",
            TokenType::Float => "FLOAT",
            TokenType::String => "STRING",
            TokenType::Assign => ":=",
            TokenType::QAssign => "?=",
            TokenType::Accum => "+=",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Mult => "*",
            TokenType::Div => "/",
            TokenType::Modulo => "%",
            TokenType::Not => "!",
            TokenType::LogAnd => "&&",
            TokenType::LogOr => "||",
            TokenType::Equal => "==",
            TokenType::NotEqual => "!=",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::Grtr => ">",
            TokenType::GrtrEqual => ">=",
            TokenType::Comma => ",",
            TokenType::Semi => ";",
            TokenType::Period => ".",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::LSqr => "[",
            TokenType::RSqr => "]",
            TokenType::LBrace => "{",
            TokenType::RBrace => "}",
            TokenType::Func => "func",
            TokenType::If => "if",
            TokenType::Else => "else",
            TokenType::While => "while",
            TokenType::Return => "return",
            TokenType::Break => "break",
            TokenType::Continue => "continue",
            TokenType::Extern => "extern",
            TokenType::True => "true",
            TokenType::False => "false",
            TokenType::Nil => "nil",
            TokenType::Stmts => "stmts",
            TokenType::FuncApply => "f-apply",
            TokenType::MethApply => "m-apply",
        }
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

pub fn get_keyword(text: &str) -> Option<TokenType> {
    match text {
        "func" => Some(TokenType::Func),
        "if" => Some(TokenType::If),
        "else" => Some(TokenType::Else),
        "while" => Some(TokenType::While),
        "return" => Some(TokenType::Return),
        "break" => Some(TokenType::Break),
        "continue" => Some(TokenType::Continue),
        "extern" => Some(TokenType::Extern),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        "nil" => Some(TokenType::Nil),
        _ => None,
    }
}

/// 1-based line and column of a token in its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: &str, position: Position) -> Self {
        Self { token_type, lexeme: lexeme.to_owned(), position }
    }

    /// Same position, new kind and text. Used by the parser's tree rewrites.
    pub fn rewrite(&self, token_type: TokenType, lexeme: &str) -> Self {
        Self::new(token_type, lexeme, self.position)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>3}, {:>3} {:<10} {:?}",
            self.position.line, self.position.column, self.token_type, self.lexeme
        )
    }
}
