//! Two-pass loader for the textual instruction format.
//!
//! Canonical form, one instruction per line:
//!
//! ```text
//! [<CATEGORY>] <OPCODE> <OPERANDS...>
//! ```
//!
//! Pass 1 registers every `[L] LABEL <name>` at its instruction-memory
//! position (label definitions are not stored); pass 2 decodes the real
//! instructions and resolves every label operand against the completed
//! table. Blank lines and lines starting with `#` are ignored.

use indexmap::IndexMap;

use crate::error::LoadError;
use crate::vm::instruction::{ArithOp, Comparison, Instruction, JumpTarget, OperandType};

/// A loaded program: decoded instruction memory plus the label table in
/// definition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: IndexMap<String, usize>,
}

/// Parse and resolve a whole program. Any malformed line aborts the load.
pub fn load_program(source: &str) -> Result<Program, LoadError> {
    let labels = collect_labels(source)?;

    let mut instructions = Vec::new();
    for (line_no, text) in numbered_lines(source) {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let category = parse_category(line_no, text, fields[0])?;
        if category == 'L' {
            continue;
        }
        instructions.push(parse_instruction(line_no, category, &fields, &labels)?);
    }

    Ok(Program {
        instructions,
        labels,
    })
}

/// Pass 1: map every label definition to the index of the instruction that
/// follows it.
fn collect_labels(source: &str) -> Result<IndexMap<String, usize>, LoadError> {
    let mut labels = IndexMap::new();
    let mut next_index = 0usize;

    for (line_no, text) in numbered_lines(source) {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let category = parse_category(line_no, text, fields[0])?;

        if category == 'L' {
            expect_operands(line_no, &fields, 1)?;
            if fields[1] != "LABEL" {
                return Err(LoadError::UnknownOpcode {
                    line: line_no,
                    opcode: fields[1].to_string(),
                });
            }
            let name = fields[2];
            if labels.insert(name.to_string(), next_index).is_some() {
                return Err(LoadError::DuplicateLabel {
                    line: line_no,
                    label: name.to_string(),
                });
            }
        } else {
            next_index += 1;
        }
    }
    Ok(labels)
}

/// Lines that carry an instruction, with their 1-based source line numbers.
fn numbered_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_category(line: usize, text: &str, field: &str) -> Result<char, LoadError> {
    let inner = field
        .strip_prefix('[')
        .and_then(|f| f.strip_suffix(']'))
        .ok_or_else(|| LoadError::MissingCategory {
            line,
            text: text.to_string(),
        })?;
    match inner {
        "R" | "I" | "C" | "J" | "A" | "L" => Ok(inner.chars().next().unwrap_or('R')),
        _ => Err(LoadError::UnknownCategory {
            line,
            category: inner.to_string(),
        }),
    }
}

/// Decode one non-label line whose category is already known.
fn parse_instruction(
    line: usize,
    category: char,
    fields: &[&str],
    labels: &IndexMap<String, usize>,
) -> Result<Instruction, LoadError> {
    let opcode = fields.get(1).copied().unwrap_or_default();
    if opcode.is_empty() {
        return Err(LoadError::WrongOperandCount {
            line,
            expected: 1,
            found: 0,
        });
    }

    match category {
        'R' => parse_register_op(line, opcode, fields),
        'I' => {
            expect_operands(line, fields, 2)?;
            let register = parse_register(line, fields[2])?;
            let addr = parse_index(line, fields[3])?;
            match opcode {
                "STR" => Ok(Instruction::Str {
                    src: register,
                    addr,
                }),
                "LOD" => Ok(Instruction::Lod {
                    dest: register,
                    addr,
                }),
                _ => Err(unknown_opcode(line, opcode)),
            }
        }
        'C' => {
            let cmp = match opcode {
                "GRT" => Comparison::Grt,
                "GRE" => Comparison::Gre,
                "LTE" => Comparison::Lte,
                "LES" => Comparison::Les,
                "EQU" => Comparison::Equ,
                "NEQ" => Comparison::Neq,
                _ => return Err(unknown_opcode(line, opcode)),
            };
            expect_operands(line, fields, 3)?;
            Ok(Instruction::Branch {
                cmp,
                lhs: parse_register(line, fields[2])?,
                rhs: parse_register(line, fields[3])?,
                target: resolve_label(line, fields[4], labels)?,
            })
        }
        'J' => match opcode {
            "JMP" => {
                expect_operands(line, fields, 1)?;
                Ok(Instruction::Jmp {
                    target: resolve_label(line, fields[2], labels)?,
                })
            }
            "JAL" => {
                expect_operands(line, fields, 1)?;
                Ok(Instruction::Jal {
                    target: resolve_label(line, fields[2], labels)?,
                })
            }
            "JRT" => {
                expect_operands(line, fields, 0)?;
                Ok(Instruction::Jrt)
            }
            _ => Err(unknown_opcode(line, opcode)),
        },
        'A' => {
            expect_operands(line, fields, 2)?;
            let register = parse_register(line, fields[2])?;
            let size = parse_index(line, fields[3])?;
            if size == 0 {
                return Err(LoadError::BadOperand {
                    line,
                    operand: fields[3].to_string(),
                    reason: "size must be non-zero".to_string(),
                });
            }
            match opcode {
                "ALC" => Ok(Instruction::Alc {
                    dest: register,
                    size,
                }),
                "FRE" => Ok(Instruction::Fre {
                    src: register,
                    size,
                }),
                _ => Err(unknown_opcode(line, opcode)),
            }
        }
        // 'L' is filtered out by the caller.
        _ => Err(LoadError::UnknownCategory {
            line,
            category: category.to_string(),
        }),
    }
}

fn parse_register_op(line: usize, opcode: &str, fields: &[&str]) -> Result<Instruction, LoadError> {
    if opcode == "NOP" {
        expect_operands(line, fields, 0)?;
        return Ok(Instruction::Nop);
    }

    let (name, suffix) = opcode.split_once('_').unwrap_or((opcode, ""));
    let op = match name {
        "ADD" => ArithOp::Add,
        "SUB" => ArithOp::Sub,
        "MUL" => ArithOp::Mul,
        "DIV" => ArithOp::Div,
        "MOD" => ArithOp::Mod,
        _ => return Err(unknown_opcode(line, opcode)),
    };
    let ty = match suffix {
        "I" => OperandType::Int,
        "F" => OperandType::Float,
        _ => return Err(unknown_opcode(line, opcode)),
    };

    expect_operands(line, fields, 3)?;
    Ok(Instruction::Arith {
        op,
        ty,
        dest: parse_register(line, fields[2])?,
        lhs: parse_register(line, fields[3])?,
        rhs: parse_register(line, fields[4])?,
    })
}

fn expect_operands(line: usize, fields: &[&str], expected: usize) -> Result<(), LoadError> {
    // fields = [category, opcode, operands...]
    let found = fields.len().saturating_sub(2);
    if found != expected {
        return Err(LoadError::WrongOperandCount {
            line,
            expected,
            found,
        });
    }
    Ok(())
}

fn parse_register(line: usize, operand: &str) -> Result<usize, LoadError> {
    let digits = operand
        .strip_prefix('R')
        .ok_or_else(|| LoadError::BadOperand {
            line,
            operand: operand.to_string(),
            reason: "missing 'R' prefix".to_string(),
        })?;
    digits.parse().map_err(|_| LoadError::BadOperand {
        line,
        operand: operand.to_string(),
        reason: "register index is not a non-negative integer".to_string(),
    })
}

fn parse_index(line: usize, operand: &str) -> Result<usize, LoadError> {
    operand.parse().map_err(|_| LoadError::BadOperand {
        line,
        operand: operand.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

fn resolve_label(
    line: usize,
    name: &str,
    labels: &IndexMap<String, usize>,
) -> Result<JumpTarget, LoadError> {
    let index = *labels.get(name).ok_or_else(|| LoadError::UnknownLabel {
        line,
        label: name.to_string(),
    })?;
    Ok(JumpTarget {
        label: name.to_string(),
        index,
    })
}

fn unknown_opcode(line: usize, opcode: &str) -> LoadError {
    LoadError::UnknownOpcode {
        line,
        opcode: opcode.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let program = load_program(
            "[L] LABEL start\n\
             [R] ADD_I R0 R0 R1\n\
             [C] LES R0 R1 done\n\
             [J] JMP start\n\
             [L] LABEL done\n\
             [J] JRT\n",
        )
        .unwrap();

        assert_eq!(program.labels.get("start"), Some(&0));
        assert_eq!(program.labels.get("done"), Some(&3));
        // Label definitions emit no instruction memory.
        assert_eq!(program.instructions.len(), 4);

        match &program.instructions[2] {
            Instruction::Jmp { target } => assert_eq!(target.index, 0),
            other => panic!("expected JMP, got {other}"),
        }
    }

    #[test]
    fn test_unknown_label_fails_load() {
        let err = load_program("[J] JMP nowhere\n").unwrap_err();
        assert!(matches!(err, LoadError::UnknownLabel { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_label_fails_load() {
        let err = load_program("[L] LABEL a\n[L] LABEL a\n").unwrap_err();
        assert!(matches!(err, LoadError::DuplicateLabel { line: 2, .. }));
    }

    #[test]
    fn test_missing_register_prefix() {
        let err = load_program("[R] ADD_I 2 R0 R1\n").unwrap_err();
        assert!(matches!(err, LoadError::BadOperand { .. }));
    }

    #[test]
    fn test_wrong_operand_count_names_line() {
        let err = load_program("[R] NOP\n[R] ADD_I R0 R1\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::WrongOperandCount {
                line: 2,
                expected: 3,
                found: 2,
            }
        ));
    }

    #[test]
    fn test_unknown_opcode_and_category() {
        assert!(matches!(
            load_program("[R] XOR_I R0 R1 R2\n"),
            Err(LoadError::UnknownOpcode { .. })
        ));
        assert!(matches!(
            load_program("[Q] NOP\n"),
            Err(LoadError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_legacy_pipe_format_is_rejected() {
        assert!(matches!(
            load_program("ADD|||R2|||R0|||R1\n"),
            Err(LoadError::MissingCategory { .. })
        ));
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        let program = load_program("# setup\n\n[R] NOP\n").unwrap();
        assert_eq!(program.instructions, vec![Instruction::Nop]);
    }

    #[test]
    fn test_zero_allocation_size_rejected() {
        assert!(matches!(
            load_program("[A] ALC R0 0\n"),
            Err(LoadError::BadOperand { .. })
        ));
    }
}
