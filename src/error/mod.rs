//! Error types for all phases of the toolchain.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors. Local to one source line; the caller may skip the line and
/// continue with the next one.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("Invalid token '{text}' at {span}")]
    InvalidToken { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            Self::InvalidToken { span, .. } => *span,
        }
    }
}

/// Expression parser errors. A failure aborts the whole expression; callers
/// must treat it as "no valid expression", never as a partial stream.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected token '{found}' in expression at {span}")]
    UnexpectedToken { found: String, span: Span },

    #[error("Unbalanced parentheses at {span}")]
    UnbalancedParens { span: Span },
}

/// Storage controller errors. Recoverable: the caller decides whether to
/// force an eviction or fail the compilation step.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("No contiguous run of {requested} free RAM slot(s)")]
    OutOfRam { requested: usize },

    #[error("Variable {id} is not resident")]
    NotResident { id: crate::symbols::VarId },

    #[error("Token '{found}' is not a variable and cannot be placed")]
    NotAVariable { found: String },
}

/// Program loader errors. Fatal to loading; the VM never starts.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Line {line}: missing instruction category in '{text}'")]
    MissingCategory { line: usize, text: String },

    #[error("Line {line}: unknown instruction category '{category}'")]
    UnknownCategory { line: usize, category: String },

    #[error("Line {line}: unknown opcode '{opcode}'")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("Line {line}: expected {expected} operand(s), found {found}")]
    WrongOperandCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: bad operand '{operand}' ({reason})")]
    BadOperand {
        line: usize,
        operand: String,
        reason: String,
    },

    #[error("Line {line}: unknown label '{label}'")]
    UnknownLabel { line: usize, label: String },

    #[error("Line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
}

/// VM execution faults. All fatal: the VM halts immediately and is never
/// retried. These model hardware faults, not recoverable conditions.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{what} index {index} out of bounds (capacity {capacity})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        capacity: usize,
    },

    #[error("Expected {expected} value in R{register}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        register: usize,
    },

    #[error("Integer division by zero")]
    DivisionByZero,

    #[error("JRT with empty return stack")]
    ReturnStackUnderflow,

    #[error("No contiguous run of {requested} free RAM slot(s)")]
    OutOfMemory { requested: usize },
}

/// Initialization errors. Nothing is constructed when these are returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Instructions-per-second rate must be non-zero")]
    ZeroRate,

    #[error("{what} capacity must be non-zero")]
    ZeroCapacity { what: &'static str },
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum RivetError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
