use thiserror::Error;

use crate::token::{get_keyword, Position, Token, TokenType};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{position}: {message}")]
pub struct ScanError {
    pub position: Position,
    pub message: String,
}

#[derive(Debug)]
pub struct Scanner {
    source_chars: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
    start: usize,
    current: usize,
    line: u32,
    line_start: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            line_start: 0,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, Vec<ScanError>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.start = self.current;
        self.end_line();
        let eof = Token::new(TokenType::EOF, "", self.position());
        self.tokens.push(eof);

        if !self.errors.is_empty() {
            return Err(std::mem::take(&mut self.errors));
        }

        // Take our temporary tokens out. It will be replaced by the default()
        // value for the vector
        Ok(std::mem::take(&mut self.tokens))
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LParen),
            ')' => self.add_token(TokenType::RParen),
            '[' => self.add_token(TokenType::LSqr),
            ']' => self.add_token(TokenType::RSqr),
            '{' => self.add_token(TokenType::LBrace),
            '}' => self.add_token(TokenType::RBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Period),
            ';' => self.add_token(TokenType::Semi),
            '-' => self.add_token(TokenType::Minus),
            '*' => self.add_token(TokenType::Mult),
            '/' => self.add_token(TokenType::Div),
            '%' => self.add_token(TokenType::Modulo),
            '+' => self.either('=', TokenType::Accum, TokenType::Plus),
            '!' => self.either('=', TokenType::NotEqual, TokenType::Not),
            '<' => self.either('=', TokenType::LessEqual, TokenType::Less),
            '>' => self.either('=', TokenType::GrtrEqual, TokenType::Grtr),
            ':' => self.require('=', TokenType::Assign),
            '?' => self.require('=', TokenType::QAssign),
            '=' => self.require('=', TokenType::Equal),
            '&' => self.require('&', TokenType::LogAnd),
            '|' => self.require('|', TokenType::LogOr),
            '#' => {
                // Go until end of the commented line
                while self.peek() != '\n' && !self.is_at_end() {
                    self.advance();
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.end_line();
                self.line += 1;
                self.line_start = self.current;
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),
            c => self.error(format!("Unexpected character '{c}'.")),
        }
    }

    /// Go's automatic semicolon rule: a line whose last token could end an
    /// expression is terminated with a `;`.
    fn end_line(&mut self) {
        let needs_semi = match self.tokens.last() {
            Some(token) if token.position.line == self.line => matches!(
                token.token_type,
                TokenType::Ident
                    | TokenType::Int
                    | TokenType::Float
                    | TokenType::String
                    | TokenType::True
                    | TokenType::False
                    | TokenType::Nil
                    | TokenType::Break
                    | TokenType::Continue
                    | TokenType::Return
                    | TokenType::RParen
                    | TokenType::RSqr
                    | TokenType::RBrace
            ),
            _ => false,
        };

        if needs_semi {
            let token = Token::new(TokenType::Semi, ";", self.position());
            self.tokens.push(token);
        }
    }

    fn either(&mut self, next: char, matched: TokenType, otherwise: TokenType) {
        let token_type = if self.match_next(next) { matched } else { otherwise };
        self.add_token(token_type);
    }

    fn require(&mut self, next: char, token_type: TokenType) {
        if self.match_next(next) {
            self.add_token(token_type);
        } else {
            let text = self.source_substring(self.start, self.current);
            self.error(format!("Unexpected character '{text}'."));
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, (self.start - self.line_start) as u32 + 1)
    }

    fn error(&mut self, message: impl Into<String>) {
        let position = self.position();
        self.errors.push(ScanError { position, message: message.into() });
    }

    fn advance(&mut self) -> char {
        let c = self.source_chars.get(self.current).copied().unwrap_or('\0');
        self.current += 1;
        c
    }

    fn source_substring(&self, start: usize, end: usize) -> String {
        self.source_chars[start..end].iter().collect()
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text = self.source_substring(self.start, self.current);
        self.add_token_with_text(token_type, &text);
    }

    fn add_token_with_text(&mut self, token_type: TokenType, text: &str) {
        let token = Token::new(token_type, text, self.position());
        self.tokens.push(token);
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.current += 1;
            return true;
        }

        false
    }

    fn peek(&self) -> char {
        self.source_chars.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source_chars.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn string(&mut self) {
        let mut text = String::new();

        loop {
            if self.is_at_end() || self.peek() == '\n' {
                self.error("Unterminated string.");
                return;
            }

            match self.advance() {
                '"' => break,
                '\\' => {
                    let escaped = match self.advance() {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '"' => '"',
                        '\\' => '\\',
                        other => {
                            self.error(format!("Unknown escape sequence '\\{other}'."));
                            other
                        }
                    };
                    text.push(escaped);
                }
                c => text.push(c),
            }
        }

        self.add_token_with_text(TokenType::String, &text);
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut token_type = TokenType::Int;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            // Consume '.'
            self.advance();
            token_type = TokenType::Float;

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        self.add_token(token_type);
    }

    fn identifier(&mut self) {
        while is_alpha_numeric(self.peek()) {
            self.advance();
        }

        let text = self.source_substring(self.start, self.current);
        let token_type = get_keyword(&text).unwrap_or(TokenType::Ident);
        self.add_token(token_type);
    }
}

fn is_alpha(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_alpha_numeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenType> {
        Scanner::new(source)
            .scan_tokens()
            .expect("scan failed")
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[rstest]
    #[case::assign("x := 1", vec![TokenType::Ident, TokenType::Assign, TokenType::Int, TokenType::Semi, TokenType::EOF])]
    #[case::operators("a += b ?= c", vec![TokenType::Ident, TokenType::Accum, TokenType::Ident, TokenType::QAssign, TokenType::Ident, TokenType::Semi, TokenType::EOF])]
    #[case::logic("!a && b || c", vec![TokenType::Not, TokenType::Ident, TokenType::LogAnd, TokenType::Ident, TokenType::LogOr, TokenType::Ident, TokenType::Semi, TokenType::EOF])]
    #[case::compare("1 <= 2 != 3 >= 4", vec![TokenType::Int, TokenType::LessEqual, TokenType::Int, TokenType::NotEqual, TokenType::Int, TokenType::GrtrEqual, TokenType::Int, TokenType::Semi, TokenType::EOF])]
    #[case::float("1.5 % 2", vec![TokenType::Float, TokenType::Modulo, TokenType::Int, TokenType::Semi, TokenType::EOF])]
    #[case::keywords("func if else while extern", vec![TokenType::Func, TokenType::If, TokenType::Else, TokenType::While, TokenType::Extern, TokenType::EOF])]
    #[case::comment("x # trailing words", vec![TokenType::Ident, TokenType::Semi, TokenType::EOF])]
    fn scans_kinds(#[case] source: &str, #[case] expected: Vec<TokenType>) {
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn inserts_semicolons_only_after_expression_enders() {
        let source = "f := func(a) {\n  return a\n}\nf(1)\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenType::Ident,
                TokenType::Assign,
                TokenType::Func,
                TokenType::LParen,
                TokenType::Ident,
                TokenType::RParen,
                TokenType::LBrace,
                TokenType::Return,
                TokenType::Ident,
                TokenType::Semi,
                TokenType::RBrace,
                TokenType::Semi,
                TokenType::Ident,
                TokenType::LParen,
                TokenType::Int,
                TokenType::RParen,
                TokenType::Semi,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn records_line_and_column() {
        let tokens = Scanner::new("a\n  bb := 2").scan_tokens().unwrap();
        let bb = tokens.iter().find(|t| t.lexeme == "bb").unwrap();
        assert_eq!(bb.position, Position::new(2, 3));
    }

    #[test]
    fn unescapes_strings() {
        let tokens = Scanner::new(r#""a\tb\"c\n""#).scan_tokens().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::String);
        assert_eq!(tokens[0].lexeme, "a\tb\"c\n");
    }

    #[test]
    fn collects_every_error() {
        let errors = Scanner::new("a = 1\n\"open").scan_tokens().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].position, Position::new(1, 3));
        assert_eq!(errors[1].message, "Unterminated string.");
    }
}
