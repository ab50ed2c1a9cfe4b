use gosh::prelude::{Position, Scanner, TokenType};

#[test]
fn scanner_works() {
    let input = "a && 3";
    let mut scanner = Scanner::new(input);
    let tokens = scanner.scan_tokens().unwrap();
    // a, &&, 3, inserted ';', EOF
    assert_eq!(tokens.len(), 5);
}

#[test]
fn no_semicolon_after_operators() {
    let tokens = Scanner::new("x := 1 +\n  2\n").scan_tokens().unwrap();
    let kinds = tokens.iter().map(|t| t.token_type).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TokenType::Ident,
            TokenType::Assign,
            TokenType::Int,
            TokenType::Plus,
            TokenType::Int,
            TokenType::Semi,
            TokenType::EOF
        ]
    );
}

#[test]
fn bad_characters_report_positions() {
    let errors = Scanner::new("ok\n  @").scan_tokens().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].position, Position::new(2, 3));
    assert_eq!(errors[0].to_string(), "2:3: Unexpected character '@'.");
}
