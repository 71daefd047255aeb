//! Decoded instruction definitions for the bytecode VM.

use std::fmt;

/// Per-instruction operand typing (`_I` / `_F` opcode suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    Int,
    Float,
}

/// Arithmetic operations (category R).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Compare-and-branch conditions (category C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Grt,
    Gre,
    Lte,
    Les,
    Equ,
    Neq,
}

/// A jump destination: the label as written plus the instruction index the
/// loader resolved it to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTarget {
    pub label: String,
    pub index: usize,
}

/// One decoded instruction. Label definitions are consumed by the loader and
/// never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `[R] <OP>_<T> Rdest Rlhs Rrhs`
    Arith {
        op: ArithOp,
        ty: OperandType,
        dest: usize,
        lhs: usize,
        rhs: usize,
    },
    /// `[I] STR Rsrc <addr>`: write a register value to a RAM address.
    Str { src: usize, addr: usize },
    /// `[I] LOD Rdest <addr>`: read a RAM address into a register.
    Lod { dest: usize, addr: usize },
    /// `[C] <CMP> Rlhs Rrhs <label>`: jump to the label if the comparison
    /// holds.
    Branch {
        cmp: Comparison,
        lhs: usize,
        rhs: usize,
        target: JumpTarget,
    },
    /// `[J] JMP <label>`
    Jmp { target: JumpTarget },
    /// `[J] JAL <label>`: jump and push the return address.
    Jal { target: JumpTarget },
    /// `[J] JRT`: return to the popped address.
    Jrt,
    /// `[A] ALC Rdest <size>`: first-fit allocate RAM cells, base address
    /// lands in the register.
    Alc { dest: usize, size: usize },
    /// `[A] FRE Rsrc <size>`: free cells at the address held in the
    /// register.
    Fre { src: usize, size: usize },
    /// `[R] NOP`: advance the program counter only.
    Nop,
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandType::Int => write!(f, "I"),
            OperandType::Float => write!(f, "F"),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
            ArithOp::Mod => "MOD",
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Comparison::Grt => "GRT",
            Comparison::Gre => "GRE",
            Comparison::Lte => "LTE",
            Comparison::Les => "LES",
            Comparison::Equ => "EQU",
            Comparison::Neq => "NEQ",
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Arith {
                op,
                ty,
                dest,
                lhs,
                rhs,
            } => write!(f, "[R] {}_{} R{} R{} R{}", op, ty, dest, lhs, rhs),
            Instruction::Str { src, addr } => write!(f, "[I] STR R{} {}", src, addr),
            Instruction::Lod { dest, addr } => write!(f, "[I] LOD R{} {}", dest, addr),
            Instruction::Branch {
                cmp,
                lhs,
                rhs,
                target,
            } => write!(f, "[C] {} R{} R{} {}", cmp, lhs, rhs, target.label),
            Instruction::Jmp { target } => write!(f, "[J] JMP {}", target.label),
            Instruction::Jal { target } => write!(f, "[J] JAL {}", target.label),
            Instruction::Jrt => write!(f, "[J] JRT"),
            Instruction::Alc { dest, size } => write!(f, "[A] ALC R{} {}", dest, size),
            Instruction::Fre { src, size } => write!(f, "[A] FRE R{} {}", src, size),
            Instruction::Nop => write!(f, "[R] NOP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_format() {
        let add = Instruction::Arith {
            op: ArithOp::Add,
            ty: OperandType::Int,
            dest: 2,
            lhs: 0,
            rhs: 1,
        };
        assert_eq!(add.to_string(), "[R] ADD_I R2 R0 R1");

        let branch = Instruction::Branch {
            cmp: Comparison::Les,
            lhs: 0,
            rhs: 1,
            target: JumpTarget {
                label: "loop".to_string(),
                index: 0,
            },
        };
        assert_eq!(branch.to_string(), "[C] LES R0 R1 loop");
    }
}
