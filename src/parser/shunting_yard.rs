//! Infix-to-postfix conversion via Dijkstra's shunting-yard algorithm.
//!
//! Two stacks: `output` collects the postfix result, `operators` holds
//! pending operators, function names and open parentheses. The result is a
//! fresh token sequence; nothing persists between calls.

use crate::error::ParseError;
use crate::lexer::token::{Token, TokenCategory, TokenKind};
use crate::parser::precedence::precedence;

/// Convert one infix expression to postfix order. The input is everything
/// the lexer produced for the expression, terminated by an `End` token; a
/// comment token also terminates the scan (the rest of the line is
/// commentary). On any error the caller gets `Err`, never a partial stream.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>, ParseError> {
    let mut output: Vec<Token> = Vec::new();
    let mut operators: Vec<Token> = Vec::new();

    for token in tokens {
        if token.kind == TokenKind::End || token.category == TokenCategory::Comment {
            break;
        }

        if token.is_operand() {
            output.push(token.clone());
            continue;
        }

        match token.category {
            TokenCategory::Operator | TokenCategory::FunctionName => {
                let rank = precedence(token).ok_or_else(|| unexpected(token))?;
                // Left-associative: equal rank pops before pushing. An open
                // parenthesis stays put and stops the draining.
                while let Some(top) = operators.pop() {
                    let moves = top.kind != TokenKind::LeftParen
                        && matches!(precedence(&top), Some(top_rank) if top_rank >= rank);
                    if !moves {
                        operators.push(top);
                        break;
                    }
                    output.push(top);
                }
                operators.push(token.clone());
            }
            TokenCategory::Punctuation if token.kind == TokenKind::LeftParen => {
                operators.push(token.clone());
            }
            TokenCategory::Punctuation if token.kind == TokenKind::RightParen => loop {
                match operators.pop() {
                    Some(top) if top.kind == TokenKind::LeftParen => break,
                    Some(top) => output.push(top),
                    None => {
                        return Err(ParseError::UnbalancedParens { span: token.span });
                    }
                }
            },
            _ => return Err(unexpected(token)),
        }
    }

    // Drain the remaining operators; a leftover open parenthesis means the
    // expression never closed it.
    while let Some(top) = operators.pop() {
        if top.kind == TokenKind::LeftParen {
            return Err(ParseError::UnbalancedParens { span: top.span });
        }
        output.push(top);
    }

    Ok(output)
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.to_string(),
        span: token.span,
    }
}
