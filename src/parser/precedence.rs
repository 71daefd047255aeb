//! Operator precedence table for the shunting-yard conversion.

use crate::lexer::token::{Token, TokenCategory, TokenKind};

/// Function calls bind loosest of everything on the operator stack.
pub const FUNCTION_PRECEDENCE: u8 = 0;
/// `+` and `-`.
pub const ADDITIVE_PRECEDENCE: u8 = 1;
/// `*`, `/` and `%`.
pub const MULTIPLICATIVE_PRECEDENCE: u8 = 2;

/// Rank of a token on the operator stack; `None` for anything that never
/// belongs there. Higher rank binds tighter. All operators are
/// left-associative: equal rank pops.
pub fn precedence(token: &Token) -> Option<u8> {
    match token.category {
        TokenCategory::FunctionName => Some(FUNCTION_PRECEDENCE),
        TokenCategory::Operator => match token.kind {
            TokenKind::Plus | TokenKind::Minus => Some(ADDITIVE_PRECEDENCE),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                Some(MULTIPLICATIVE_PRECEDENCE)
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn test_ranks() {
        let t = |kind| Token::new(kind, Span::default());
        assert_eq!(precedence(&t(TokenKind::Plus)), Some(1));
        assert_eq!(precedence(&t(TokenKind::Minus)), Some(1));
        assert_eq!(precedence(&t(TokenKind::Star)), Some(2));
        assert_eq!(precedence(&t(TokenKind::Percent)), Some(2));
        assert_eq!(precedence(&t(TokenKind::LeftParen)), None);
        assert_eq!(precedence(&t(TokenKind::If)), None);
    }
}
