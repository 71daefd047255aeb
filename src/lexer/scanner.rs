//! The lexer: one raw source line in, a typed token stream out.

use crate::error::LexError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;
use crate::symbols::SymbolTable;

/// Reserved prefix marking user-defined function names.
const FUNCTION_PREFIX: &str = "fn_";

/// Tokenize a single source line. Pure per call apart from interning new
/// names into `symbols`; on error the partial results are discarded.
pub fn tokenize(line: &str, symbols: &mut SymbolTable) -> Result<Vec<Token>, LexError> {
    Lexer::new(line).run(symbols)
}

/// Operator/punctuation characters. A maximal run of these forms one
/// symbol-class token; everything else (except whitespace) is word-class.
fn is_symbol_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-'
            | '*'
            | '/'
            | '%'
            | '('
            | ')'
            | '@'
            | '$'
            | '['
            | ']'
            | ','
            | '='
            | '>'
            | '<'
            | '!'
            | '{'
            | '}'
            | '#'
            | ';'
    )
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn run(mut self, symbols: &mut SymbolTable) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some((start, end)) = self.next_run() {
            let text = &self.source[start..end];
            let span = Span::new(start, end, 1, self.column_at(start));
            tokens.push(classify(text, span, symbols)?);
        }

        let len = self.source.len();
        tokens.push(Token::end(Span::new(len, len, 1, self.column_at(len))));
        Ok(tokens)
    }

    /// 1-based column of the character at byte `offset`. Counted in
    /// characters, not bytes, so multibyte input reports true columns.
    fn column_at(&self, offset: usize) -> usize {
        self.source[..offset].chars().count() + 1
    }

    /// Consume the next maximal run of same-class characters, skipping
    /// whitespace. Returns byte offsets into the source.
    fn next_run(&mut self) -> Option<(usize, usize)> {
        let (start, first) = loop {
            let (i, c) = *self.chars.peek()?;
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break (i, c);
            }
        };

        let symbol_run = is_symbol_char(first);
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_whitespace() || is_symbol_char(c) != symbol_run {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        Some((start, end))
    }
}

/// Classify one finished run. Vocabulary match first, then the secondary
/// classifiers in fixed order; no match fails the whole line.
fn classify(text: &str, span: Span, symbols: &mut SymbolTable) -> Result<Token, LexError> {
    if let Some(kind) = TokenKind::from_vocabulary(text) {
        return Ok(Token::new(kind, span));
    }

    if let Some(rest) = text.strip_prefix(FUNCTION_PREFIX) {
        if !rest.is_empty() && !rest.chars().any(is_symbol_char) {
            return Ok(Token::function(symbols.intern(text), span));
        }
    }

    if is_identifier(text) {
        return Ok(Token::variable(symbols.intern(text), span));
    }

    if let Some(token) = classify_number(text, span) {
        return Ok(token);
    }

    if let Some(token) = classify_char_literal(text, span) {
        return Ok(token);
    }

    Err(LexError::InvalidToken {
        text: text.to_string(),
        span,
    })
}

/// Digits with at most one decimal point and no letters.
fn classify_number(text: &str, span: Span) -> Option<Token> {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    let points = text.chars().filter(|c| *c == '.').count();
    if digits == 0 || points > 1 || digits + points != text.chars().count() {
        return None;
    }
    if points == 1 {
        text.parse::<f64>().ok().map(|v| Token::float(v, span))
    } else {
        text.parse::<i64>().ok().map(|v| Token::int(v, span))
    }
}

/// Exactly one character delimited by a pair of quote characters.
fn classify_char_literal(text: &str, span: Span) -> Option<Token> {
    let mut chars = text.chars();
    match (chars.next(), chars.next(), chars.next(), chars.next()) {
        (Some('\''), Some(c), Some('\''), None) => Some(Token::char_lit(c, span)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::token::TokenContent;

    fn kinds(line: &str) -> Vec<TokenKind> {
        let mut symbols = SymbolTable::new();
        tokenize(line, &mut symbols)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_declaration_line() {
        assert_eq!(
            kinds("int x = 5 ;"),
            vec![
                TokenKind::Int,
                TokenKind::Variable,
                TokenKind::Assign,
                TokenKind::IntImmediate,
                TokenKind::Semicolon,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_class_switch_splits_runs() {
        // No whitespace needed where the character class changes.
        assert_eq!(
            kinds("x=>10"),
            vec![
                TokenKind::Variable,
                TokenKind::GreaterEqual,
                TokenKind::IntImmediate,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_multi_char_comparators() {
        assert_eq!(
            kinds("<= == != =>"),
            vec![
                TokenKind::LessEqual,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::GreaterEqual,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_unmatched_symbol_run_fails() {
        let mut symbols = SymbolTable::new();
        let err = tokenize("x =< y", &mut symbols).unwrap_err();
        let LexError::InvalidToken { text, .. } = err;
        assert_eq!(text, "=<");
    }

    #[test]
    fn test_columns_count_characters_not_bytes() {
        // 'é' is two bytes; the bad run after it still reports column 5.
        let mut symbols = SymbolTable::new();
        let err = tokenize("'é' =< x", &mut symbols).unwrap_err();
        let LexError::InvalidToken { text, span } = err;
        assert_eq!(text, "=<");
        assert_eq!(span.column, 5);
    }

    #[test]
    fn test_immediates() {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize("3 2.5 'a'", &mut symbols).unwrap();
        assert_eq!(tokens[0].content, TokenContent::Int(3));
        assert_eq!(tokens[1].content, TokenContent::Float(2.5));
        assert_eq!(tokens[2].content, TokenContent::Char('a'));
    }

    #[test]
    fn test_bad_numbers() {
        let mut symbols = SymbolTable::new();
        assert!(tokenize("3.1.4", &mut symbols).is_err());
        assert!(tokenize("12x", &mut symbols).is_err());
    }

    #[test]
    fn test_function_name_prefix() {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize("call fn_main", &mut symbols).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Call);
        assert_eq!(tokens[1].kind, TokenKind::FunctionName);
        assert_eq!(symbols.resolve(tokens[1].var_id().unwrap()), Some("fn_main"));
    }

    #[test]
    fn test_same_name_same_id() {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize("x + x", &mut symbols).unwrap();
        assert_eq!(tokens[0].var_id(), tokens[2].var_id());
    }

    #[test]
    fn test_round_trip_modulo_whitespace() {
        let line = "while ( counter => 10 ) { }";
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(line, &mut symbols).unwrap();

        let rebuilt: Vec<String> = tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::End)
            .map(|t| match t.content {
                TokenContent::Ref(id) => symbols.resolve(id).unwrap_or_default().to_string(),
                TokenContent::None => t.kind.to_string(),
                _ => t.to_string(),
            })
            .collect();
        assert_eq!(rebuilt.join(" "), line);
    }

    #[test]
    fn test_failure_discards_partial_results() {
        let mut symbols = SymbolTable::new();
        assert!(tokenize("int x = ??", &mut symbols).is_err());
    }
}
