//! Bytecode virtual machine: instruction definitions, the textual program
//! loader, and the throttled execution engine.

pub mod instruction;
pub mod loader;
pub mod machine;

pub use instruction::{ArithOp, Comparison, Instruction, JumpTarget, OperandType};
pub use loader::{load_program, Program};
pub use machine::{Value, Vm, VmConfig, VmState};
