//! The shared token model.
//!
//! Every component of the toolchain exchanges [`Token`]s: the lexer produces
//! them, the expression parser reorders them, and the storage controller
//! tracks them through registers and RAM.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::span::Span;
use crate::symbols::VarId;

/// Concrete lexical identity of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Declaration keywords
    Void,
    Int,
    Float,
    Char,
    Long,
    Unsigned,

    // Conditionals
    If,
    Elif,
    Else,

    // Loops
    For,
    While,

    // Constants
    None,
    ValMin,
    ValMax,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparators ('=>' is greater-or-equal in this language)
    GreaterEqual,
    Greater,
    LessEqual,
    Less,
    EqualEqual,
    NotEqual,

    // Assignment
    Assign,

    // Function call / return keywords
    Call,
    Return,

    // Built-in functions
    Read,
    Output,
    Allocate,
    Free,
    Sleep,

    // Punctuation
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Comma,
    Semicolon,
    At,
    Dollar,

    // Comment openers
    CommentOpen,
    Hash,

    // Data-bearing tokens
    Variable,
    FunctionName,
    IntImmediate,
    FloatImmediate,
    CharImmediate,

    /// Stream terminator appended by the lexer.
    End,
}

/// Coarse class used for dispatch and precedence lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Declaration,
    Immediate,
    FunctionName,
    Builtin,
    Variable,
    Operator,
    Comparator,
    Punctuation,
    LoopKeyword,
    Constant,
    Comment,
    /// "Not a category": non-data tokens such as `if`, `call` or `End`.
    None,
}

/// Declared datatype of a variable or declaration keyword. Drives the
/// storage controller's minimum-footprint rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Untyped,
    Void,
    Int,
    Float,
    Char,
    Long,
    Unsigned,
}

/// Payload of a token. Exactly one variant is meaningful per token, selected
/// by its category; non-data tokens carry `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenContent {
    None,
    /// Reference id into the symbol table (variables and function names).
    Ref(VarId),
    Int(i64),
    Float(f64),
    Char(char),
}

/// The universal unit of meaning flowing through the toolchain.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub category: TokenCategory,
    pub data_type: DataType,
    /// 0 for scalars; N>0 marks the head of an N-element array.
    pub array_size: usize,
    pub content: TokenContent,
    pub span: Span,
}

lazy_static! {
    /// The fixed vocabulary: every keyword, operator and punctuation mark the
    /// lexer recognizes by exact match.
    static ref VOCABULARY: HashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        let entries: &[(&str, TokenKind)] = &[
            ("void", Void),
            ("int", Int),
            ("float", Float),
            ("char", Char),
            ("long", Long),
            ("unsigned", Unsigned),
            ("if", If),
            ("elif", Elif),
            ("else", Else),
            ("for", For),
            ("while", While),
            ("none", None),
            ("VAL_MIN", ValMin),
            ("VAL_MAX", ValMax),
            ("+", Plus),
            ("-", Minus),
            ("*", Star),
            ("/", Slash),
            ("%", Percent),
            ("=>", GreaterEqual),
            (">", Greater),
            ("<=", LessEqual),
            ("<", Less),
            ("==", EqualEqual),
            ("!=", NotEqual),
            ("=", Assign),
            ("call", Call),
            ("return", Return),
            ("read", Read),
            ("output", Output),
            ("allocate", Allocate),
            ("free", Free),
            ("sleep", Sleep),
            ("[", LeftBracket),
            ("]", RightBracket),
            ("{", LeftBrace),
            ("}", RightBrace),
            ("(", LeftParen),
            (")", RightParen),
            (",", Comma),
            (";", Semicolon),
            ("@", At),
            ("$", Dollar),
            ("/*", CommentOpen),
            ("#", Hash),
        ];
        entries.iter().copied().collect()
    };
}

impl TokenKind {
    /// Exact-match lookup against the fixed vocabulary.
    pub fn from_vocabulary(text: &str) -> Option<TokenKind> {
        VOCABULARY.get(text).copied()
    }

    /// The coarse class of this kind.
    pub fn category(self) -> TokenCategory {
        use TokenKind::*;
        match self {
            Void | Int | Float | Char | Long | Unsigned => TokenCategory::Declaration,
            For | While => TokenCategory::LoopKeyword,
            None | ValMin | ValMax => TokenCategory::Constant,
            Plus | Minus | Star | Slash | Percent => TokenCategory::Operator,
            GreaterEqual | Greater | LessEqual | Less | EqualEqual | NotEqual => {
                TokenCategory::Comparator
            }
            Assign | LeftBracket | RightBracket | LeftBrace | RightBrace | LeftParen
            | RightParen | Comma | Semicolon | At | Dollar => TokenCategory::Punctuation,
            CommentOpen | Hash => TokenCategory::Comment,
            Read | Output | Allocate | Free | Sleep => TokenCategory::Builtin,
            Variable => TokenCategory::Variable,
            FunctionName => TokenCategory::FunctionName,
            IntImmediate | FloatImmediate | CharImmediate => TokenCategory::Immediate,
            If | Elif | Else | Call | Return | End => TokenCategory::None,
        }
    }

    /// Datatype implied by a declaration keyword; `Untyped` for everything
    /// else.
    pub fn data_type(self) -> DataType {
        match self {
            TokenKind::Void => DataType::Void,
            TokenKind::Int => DataType::Int,
            TokenKind::Float => DataType::Float,
            TokenKind::Char => DataType::Char,
            TokenKind::Long => DataType::Long,
            TokenKind::Unsigned => DataType::Unsigned,
            _ => DataType::Untyped,
        }
    }
}

impl Token {
    /// A token with no payload; category and datatype derive from the kind.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            category: kind.category(),
            data_type: kind.data_type(),
            array_size: 0,
            content: TokenContent::None,
            span,
        }
    }

    pub fn variable(id: VarId, span: Span) -> Self {
        Self {
            content: TokenContent::Ref(id),
            ..Self::new(TokenKind::Variable, span)
        }
    }

    pub fn function(id: VarId, span: Span) -> Self {
        Self {
            content: TokenContent::Ref(id),
            ..Self::new(TokenKind::FunctionName, span)
        }
    }

    pub fn int(value: i64, span: Span) -> Self {
        Self {
            content: TokenContent::Int(value),
            ..Self::new(TokenKind::IntImmediate, span)
        }
    }

    pub fn float(value: f64, span: Span) -> Self {
        Self {
            content: TokenContent::Float(value),
            ..Self::new(TokenKind::FloatImmediate, span)
        }
    }

    pub fn char_lit(value: char, span: Span) -> Self {
        Self {
            content: TokenContent::Char(value),
            ..Self::new(TokenKind::CharImmediate, span)
        }
    }

    pub fn end(span: Span) -> Self {
        Self::new(TokenKind::End, span)
    }

    /// Mark this token as the head of an `n`-element array.
    pub fn with_array_size(mut self, n: usize) -> Self {
        self.array_size = n;
        self
    }

    /// Attach a declared datatype (set by the declaration collaborator).
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// The symbol-table reference, if this token carries one.
    pub fn var_id(&self) -> Option<VarId> {
        match self.content {
            TokenContent::Ref(id) => Some(id),
            _ => None,
        }
    }

    /// True for tokens the expression parser treats as operands.
    pub fn is_operand(&self) -> bool {
        matches!(
            self.category,
            TokenCategory::Variable | TokenCategory::Immediate
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.content) {
            (TokenKind::Variable, TokenContent::Ref(id)) => write!(f, "var{}", id),
            (TokenKind::FunctionName, TokenContent::Ref(id)) => write!(f, "fn{}", id),
            (_, TokenContent::Int(v)) => write!(f, "{}", v),
            (_, TokenContent::Float(v)) => write!(f, "{}", v),
            (_, TokenContent::Char(c)) => write!(f, "'{}'", c),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let text = match self {
            Void => "void",
            Int => "int",
            Float => "float",
            Char => "char",
            Long => "long",
            Unsigned => "unsigned",
            If => "if",
            Elif => "elif",
            Else => "else",
            For => "for",
            While => "while",
            None => "none",
            ValMin => "VAL_MIN",
            ValMax => "VAL_MAX",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            GreaterEqual => "=>",
            Greater => ">",
            LessEqual => "<=",
            Less => "<",
            EqualEqual => "==",
            NotEqual => "!=",
            Assign => "=",
            Call => "call",
            Return => "return",
            Read => "read",
            Output => "output",
            Allocate => "allocate",
            Free => "free",
            Sleep => "sleep",
            LeftBracket => "[",
            RightBracket => "]",
            LeftBrace => "{",
            RightBrace => "}",
            LeftParen => "(",
            RightParen => ")",
            Comma => ",",
            Semicolon => ";",
            At => "@",
            Dollar => "$",
            CommentOpen => "/*",
            Hash => "#",
            Variable => "<variable>",
            FunctionName => "<function>",
            IntImmediate => "<int>",
            FloatImmediate => "<float>",
            CharImmediate => "<char>",
            End => "<end>",
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_lookup() {
        assert_eq!(TokenKind::from_vocabulary("while"), Some(TokenKind::While));
        assert_eq!(TokenKind::from_vocabulary("=>"), Some(TokenKind::GreaterEqual));
        assert_eq!(TokenKind::from_vocabulary("pickles"), None);
    }

    #[test]
    fn test_vocabulary_round_trips_through_display() {
        for (text, kind) in [
            ("int", TokenKind::Int),
            ("<=", TokenKind::LessEqual),
            ("allocate", TokenKind::Allocate),
            ("/*", TokenKind::CommentOpen),
        ] {
            assert_eq!(kind.to_string(), text);
            assert_eq!(TokenKind::from_vocabulary(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(TokenKind::Int.category(), TokenCategory::Declaration);
        assert_eq!(TokenKind::Plus.category(), TokenCategory::Operator);
        assert_eq!(TokenKind::NotEqual.category(), TokenCategory::Comparator);
        assert_eq!(TokenKind::While.category(), TokenCategory::LoopKeyword);
        assert_eq!(TokenKind::If.category(), TokenCategory::None);
        assert_eq!(TokenKind::Read.category(), TokenCategory::Builtin);
    }

    #[test]
    fn test_operand_classification() {
        let span = Span::default();
        assert!(Token::int(3, span).is_operand());
        assert!(!Token::new(TokenKind::Plus, span).is_operand());
    }
}
