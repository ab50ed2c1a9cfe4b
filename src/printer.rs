use crate::ast::Node;

pub struct AstPrinter;

impl AstPrinter {
    /// Renders a tree as an s-expression, e.g. `1+2` becomes `(+ 1 2)`.
    pub fn to_string(node: &Node) -> String {
        if node.children.is_empty() {
            return quote(&node.literal);
        }

        let children = node.children.iter().map(|c| Self::to_string(c)).collect::<Vec<_>>();
        format!("({} {})", quote(&node.literal), children.join(" "))
    }
}

impl Node {
    pub fn sexpr(&self) -> String {
        AstPrinter::to_string(self)
    }
}

fn quote(literal: &str) -> String {
    if literal.chars().any(|c| c == '(' || c == ')' || c.is_whitespace()) {
        format!("{literal:?}")
    } else {
        literal.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Position, TokenType};

    #[test]
    fn print_a_tree() {
        // This is '-123 * "a b"'
        let at = Position::new(1, 1);
        let expr = Node::new(TokenType::Mult, "*", at).with_children(vec![
            Node::new(TokenType::Minus, "-", at)
                .with_children(vec![Node::new(TokenType::Int, "123", at).into()])
                .into(),
            Node::new(TokenType::String, "a b", at).into(),
        ]);

        assert_eq!(AstPrinter::to_string(&expr), r#"(* (- 123) "a b")"#.to_owned());
    }
}
