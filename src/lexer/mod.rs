//! Lexer module: raw source lines to token streams.

pub mod scanner;
pub mod token;

pub use scanner::tokenize;
pub use token::{DataType, Token, TokenCategory, TokenContent, TokenKind};
