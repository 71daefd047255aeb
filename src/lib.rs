//! Rivetlang: the core of a toy compiler toolchain.
//!
//! The pipeline runs in four stages:
//! - **Lexer**: maximal-run scanning of source lines into categorized tokens
//! - **Parser**: shunting-yard conversion of infix expressions to postfix
//! - **Storage controller**: register placement with eviction and RAM spill
//! - **VM**: a throttled bytecode machine executing the textual instruction
//!   format

pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod storage;
pub mod symbols;
pub mod vm;

use std::fs;
use std::path::Path;

use error::RivetError;
use lexer::Token;
use symbols::SymbolTable;
use vm::{Vm, VmConfig};

/// Load an instruction file and run it to completion on a fresh VM.
pub fn run_ir_file<P: AsRef<Path>>(path: P, config: VmConfig) -> Result<(), RivetError> {
    let source = fs::read_to_string(path)?;
    let mut machine = Vm::new(config)?;
    machine.load(&source)?;
    machine.run()?;
    Ok(())
}

/// Tokenize one source line and convert its expression to postfix order.
pub fn postfix_line(line: &str) -> Result<Vec<Token>, RivetError> {
    let mut symbols = SymbolTable::new();
    let tokens = lexer::tokenize(line, &mut symbols)?;
    let postfix = parser::to_postfix(&tokens)?;
    Ok(postfix)
}
