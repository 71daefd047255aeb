//! The bytecode virtual machine.
//!
//! Executes decoded instructions against its register and RAM value banks,
//! throttled to a configured instructions-per-second rate. Exactly one VM is
//! expected to exist at a time; it is an owned value with no global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;

use crate::error::{ConfigError, ExecutionError, LoadError};
use crate::vm::instruction::{ArithOp, Comparison, Instruction, OperandType};
use crate::vm::loader::{load_program, Program};

/// A runtime value. Every read is checked against the instruction's operand
/// typing; there is no raw reinterpretation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
        }
    }
}

/// VM lifecycle. `Halted` covers both normal end-of-program and fatal
/// faults; teardown is plain drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted,
}

/// Capacities and clock rate, all required non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub ram_size: usize,
    pub register_count: usize,
    pub instructions_per_second: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            ram_size: 256,
            register_count: 6,
            instructions_per_second: 1_000,
        }
    }
}

/// The virtual machine: program counter, instruction memory, label table,
/// value banks and return-address stack.
#[derive(Debug)]
pub struct Vm {
    config: VmConfig,
    pc: usize,
    instructions: Vec<Instruction>,
    labels: IndexMap<String, usize>,
    registers: Vec<Value>,
    ram: Vec<Value>,
    ram_in_use: Vec<bool>,
    return_stack: Vec<usize>,
    state: VmState,
    tick: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl Vm {
    /// Validate the configuration and build a `Ready` machine. On error no
    /// VM state exists.
    pub fn new(config: VmConfig) -> Result<Self, ConfigError> {
        if config.instructions_per_second == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if config.register_count == 0 {
            return Err(ConfigError::ZeroCapacity { what: "register" });
        }
        if config.ram_size == 0 {
            return Err(ConfigError::ZeroCapacity { what: "RAM" });
        }

        Ok(Self {
            config,
            pc: 0,
            instructions: Vec::new(),
            labels: IndexMap::new(),
            registers: vec![Value::Int(0); config.register_count],
            ram: vec![Value::Int(0); config.ram_size],
            ram_in_use: vec![false; config.ram_size],
            return_stack: Vec::new(),
            state: VmState::Ready,
            tick: Duration::from_secs_f64(1.0 / f64::from(config.instructions_per_second)),
            cancel: None,
        })
    }

    /// Load a program from its textual form, resetting the program counter.
    pub fn load(&mut self, source: &str) -> Result<(), LoadError> {
        let Program {
            instructions,
            labels,
        } = load_program(source)?;
        self.instructions = instructions;
        self.labels = labels;
        self.pc = 0;
        self.return_stack.clear();
        self.state = VmState::Ready;
        Ok(())
    }

    /// Install a flag polled between instructions (never mid-delay) for
    /// clean shutdown.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn config(&self) -> VmConfig {
        self.config
    }

    pub fn labels(&self) -> &IndexMap<String, usize> {
        &self.labels
    }

    /// Read a register without counting as an instruction.
    pub fn register(&self, index: usize) -> Result<Value, ExecutionError> {
        self.check_register(index)?;
        Ok(self.registers[index])
    }

    /// Preset a register, as a code generator's prologue would.
    pub fn set_register(&mut self, index: usize, value: Value) -> Result<(), ExecutionError> {
        self.check_register(index)?;
        self.registers[index] = value;
        Ok(())
    }

    /// One-line summary of capacities, rate and lifecycle state.
    pub fn describe(&self) -> String {
        format!(
            "VM: {} registers, {} RAM cells, {} instruction(s)/s, {} instruction(s) loaded, state {:?}",
            self.config.register_count,
            self.config.ram_size,
            self.config.instructions_per_second,
            self.instructions.len(),
            self.state,
        )
    }

    /// Run to the end-of-program sentinel, a fatal fault, or cancellation.
    /// Throttles to the configured clock rate after every instruction.
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        self.state = VmState::Running;
        loop {
            if self.is_cancelled() {
                self.state = VmState::Halted;
                return Ok(());
            }
            if !self.step()? {
                return Ok(());
            }
            thread::sleep(self.tick);
        }
    }

    /// Execute one instruction. Returns `false` once the program counter
    /// reaches the end-of-program sentinel. Any error halts the VM with no
    /// recovery.
    pub fn step(&mut self) -> Result<bool, ExecutionError> {
        if self.pc >= self.instructions.len() {
            self.state = VmState::Halted;
            return Ok(false);
        }
        self.state = VmState::Running;

        match self.execute_current() {
            Ok(()) => Ok(true),
            Err(fault) => {
                self.state = VmState::Halted;
                Err(fault)
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn execute_current(&mut self) -> Result<(), ExecutionError> {
        let instruction = self.instructions[self.pc].clone();
        match instruction {
            Instruction::Arith {
                op,
                ty,
                dest,
                lhs,
                rhs,
            } => {
                let result = match ty {
                    OperandType::Int => {
                        Value::Int(int_arith(op, self.read_int(lhs)?, self.read_int(rhs)?)?)
                    }
                    OperandType::Float => {
                        Value::Float(float_arith(op, self.read_float(lhs)?, self.read_float(rhs)?))
                    }
                };
                self.check_register(dest)?;
                self.registers[dest] = result;
                self.pc += 1;
            }
            Instruction::Str { src, addr } => {
                self.check_register(src)?;
                self.check_ram(addr)?;
                self.ram[addr] = self.registers[src];
                self.pc += 1;
            }
            Instruction::Lod { dest, addr } => {
                self.check_register(dest)?;
                self.check_ram(addr)?;
                self.registers[dest] = self.ram[addr];
                self.pc += 1;
            }
            Instruction::Branch {
                cmp,
                lhs,
                rhs,
                target,
            } => {
                let taken = self.compare(cmp, lhs, rhs)?;
                self.pc = if taken { target.index } else { self.pc + 1 };
            }
            Instruction::Jmp { target } => {
                self.pc = target.index;
            }
            Instruction::Jal { target } => {
                self.return_stack.push(self.pc + 1);
                self.pc = target.index;
            }
            Instruction::Jrt => {
                self.pc = self
                    .return_stack
                    .pop()
                    .ok_or(ExecutionError::ReturnStackUnderflow)?;
            }
            Instruction::Alc { dest, size } => {
                self.check_register(dest)?;
                let base = self.first_free_run(size)?;
                for used in &mut self.ram_in_use[base..base + size] {
                    *used = true;
                }
                self.registers[dest] = Value::Int(base as i64);
                self.pc += 1;
            }
            Instruction::Fre { src, size } => {
                let base = self.read_int(src)?;
                let base = usize::try_from(base).map_err(|_| ExecutionError::OutOfBounds {
                    what: "RAM",
                    index: 0,
                    capacity: self.ram.len(),
                })?;
                let end = base
                    .checked_add(size)
                    .filter(|end| *end <= self.ram.len())
                    .ok_or(ExecutionError::OutOfBounds {
                        what: "RAM",
                        index: base.saturating_add(size),
                        capacity: self.ram.len(),
                    })?;
                for used in &mut self.ram_in_use[base..end] {
                    *used = false;
                }
                self.pc += 1;
            }
            Instruction::Nop => {
                self.pc += 1;
            }
        }
        Ok(())
    }

    fn compare(&self, cmp: Comparison, lhs: usize, rhs: usize) -> Result<bool, ExecutionError> {
        self.check_register(lhs)?;
        self.check_register(rhs)?;
        match (self.registers[lhs], self.registers[rhs]) {
            (Value::Int(a), Value::Int(b)) => Ok(compare_ordered(cmp, &a, &b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_partial(cmp, a, b)),
            (a, b) => Err(ExecutionError::TypeMismatch {
                expected: a.type_name(),
                found: b.type_name(),
                register: rhs,
            }),
        }
    }

    fn read_int(&self, index: usize) -> Result<i64, ExecutionError> {
        self.check_register(index)?;
        match self.registers[index] {
            Value::Int(v) => Ok(v),
            other => Err(ExecutionError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
                register: index,
            }),
        }
    }

    fn read_float(&self, index: usize) -> Result<f64, ExecutionError> {
        self.check_register(index)?;
        match self.registers[index] {
            Value::Float(v) => Ok(v),
            other => Err(ExecutionError::TypeMismatch {
                expected: "float",
                found: other.type_name(),
                register: index,
            }),
        }
    }

    fn check_register(&self, index: usize) -> Result<(), ExecutionError> {
        if index >= self.registers.len() {
            return Err(ExecutionError::OutOfBounds {
                what: "register",
                index,
                capacity: self.registers.len(),
            });
        }
        Ok(())
    }

    fn check_ram(&self, index: usize) -> Result<(), ExecutionError> {
        if index >= self.ram.len() {
            return Err(ExecutionError::OutOfBounds {
                what: "RAM",
                index,
                capacity: self.ram.len(),
            });
        }
        Ok(())
    }

    /// First-fit over the allocation map, same policy as the compile-time
    /// storage controller.
    fn first_free_run(&self, size: usize) -> Result<usize, ExecutionError> {
        let limit = self.ram.len().checked_sub(size).map(|l| l + 1);
        for base in 0..limit.unwrap_or(0) {
            if self.ram_in_use[base..base + size].iter().all(|used| !used) {
                return Ok(base);
            }
        }
        Err(ExecutionError::OutOfMemory { requested: size })
    }
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> Result<i64, ExecutionError> {
    match op {
        ArithOp::Add => Ok(a.wrapping_add(b)),
        ArithOp::Sub => Ok(a.wrapping_sub(b)),
        ArithOp::Mul => Ok(a.wrapping_mul(b)),
        ArithOp::Div => a.checked_div(b).ok_or(ExecutionError::DivisionByZero),
        ArithOp::Mod => a.checked_rem(b).ok_or(ExecutionError::DivisionByZero),
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }
}

fn compare_ordered(cmp: Comparison, a: &i64, b: &i64) -> bool {
    match cmp {
        Comparison::Grt => a > b,
        Comparison::Gre => a >= b,
        Comparison::Lte => a <= b,
        Comparison::Les => a < b,
        Comparison::Equ => a == b,
        Comparison::Neq => a != b,
    }
}

fn compare_partial(cmp: Comparison, a: f64, b: f64) -> bool {
    match cmp {
        Comparison::Grt => a > b,
        Comparison::Gre => a >= b,
        Comparison::Lte => a <= b,
        Comparison::Les => a < b,
        Comparison::Equ => a == b,
        Comparison::Neq => a != b,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Fast clock so test programs finish promptly.
    fn test_vm() -> Vm {
        Vm::new(VmConfig {
            ram_size: 32,
            register_count: 6,
            instructions_per_second: 1_000_000,
        })
        .unwrap()
    }

    #[test]
    fn test_zero_rate_creates_no_vm() {
        let result = Vm::new(VmConfig {
            instructions_per_second: 0,
            ..VmConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::ZeroRate)));
    }

    #[test]
    fn test_zero_capacity_creates_no_vm() {
        let result = Vm::new(VmConfig {
            ram_size: 0,
            ..VmConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::ZeroCapacity { .. })));
    }

    #[test]
    fn test_add_step_advances_pc() {
        let mut vm = test_vm();
        vm.load("[R] ADD_I R2 R0 R1\n").unwrap();
        vm.set_register(0, Value::Int(3)).unwrap();
        vm.set_register(1, Value::Int(4)).unwrap();

        assert!(vm.step().unwrap());
        assert_eq!(vm.register(2).unwrap(), Value::Int(7));
        assert_eq!(vm.pc(), 1);

        // The next step hits the end-of-program sentinel.
        assert!(!vm.step().unwrap());
        assert_eq!(vm.state(), VmState::Halted);
    }

    #[test]
    fn test_out_of_bounds_register_halts() {
        let mut vm = test_vm();
        vm.load("[R] ADD_I R9 R0 R1\n").unwrap();

        let err = vm.run().unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::OutOfBounds {
                what: "register",
                index: 9,
                capacity: 6,
            }
        ));
        assert_eq!(vm.state(), VmState::Halted);
    }

    #[test]
    fn test_float_typing() {
        let mut vm = test_vm();
        vm.load("[R] MUL_F R2 R0 R1\n").unwrap();
        vm.set_register(0, Value::Float(1.5)).unwrap();
        vm.set_register(1, Value::Float(2.0)).unwrap();
        vm.run().unwrap();
        assert_eq!(vm.register(2).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let mut vm = test_vm();
        vm.load("[R] ADD_F R2 R0 R1\n").unwrap();
        let err = vm.run().unwrap_err();
        assert!(matches!(err, ExecutionError::TypeMismatch { .. }));
        assert_eq!(vm.state(), VmState::Halted);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut vm = test_vm();
        vm.load("[R] DIV_I R2 R0 R1\n").unwrap();
        vm.set_register(0, Value::Int(10)).unwrap();
        let err = vm.run().unwrap_err();
        assert!(matches!(err, ExecutionError::DivisionByZero));
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let mut vm = test_vm();
        vm.load("[I] STR R0 5\n[I] LOD R1 5\n").unwrap();
        vm.set_register(0, Value::Int(42)).unwrap();
        vm.run().unwrap();
        assert_eq!(vm.register(1).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_ram_bounds_checked() {
        let mut vm = test_vm();
        vm.load("[I] STR R0 99\n").unwrap();
        let err = vm.run().unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::OutOfBounds { what: "RAM", .. }
        ));
    }

    #[test]
    fn test_branch_loop_counts_down() {
        // R0 counts down from 3; R2 accumulates the number of iterations.
        let mut vm = test_vm();
        vm.load(
            "[L] LABEL loop\n\
             [R] SUB_I R0 R0 R1\n\
             [R] ADD_I R2 R2 R1\n\
             [C] GRT R0 R3 loop\n",
        )
        .unwrap();
        vm.set_register(0, Value::Int(3)).unwrap();
        vm.set_register(1, Value::Int(1)).unwrap();
        vm.run().unwrap();
        assert_eq!(vm.register(2).unwrap(), Value::Int(3));
        assert_eq!(vm.state(), VmState::Halted);
    }

    #[test]
    fn test_jal_and_jrt() {
        // Call a subroutine that doubles R0, then fall through to the end.
        let mut vm = test_vm();
        vm.load(
            "[J] JAL double\n\
             [J] JMP end\n\
             [L] LABEL double\n\
             [R] ADD_I R0 R0 R0\n\
             [J] JRT\n\
             [L] LABEL end\n\
             [R] NOP\n",
        )
        .unwrap();
        vm.set_register(0, Value::Int(21)).unwrap();
        vm.run().unwrap();
        assert_eq!(vm.register(0).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_jrt_with_empty_stack_is_fatal() {
        let mut vm = test_vm();
        vm.load("[J] JRT\n").unwrap();
        assert!(matches!(
            vm.run().unwrap_err(),
            ExecutionError::ReturnStackUnderflow
        ));
    }

    #[test]
    fn test_alc_and_fre_reuse_cells() {
        let mut vm = test_vm();
        vm.load(
            "[A] ALC R0 4\n\
             [A] ALC R1 4\n\
             [A] FRE R0 4\n\
             [A] ALC R2 4\n",
        )
        .unwrap();
        vm.run().unwrap();
        assert_eq!(vm.register(0).unwrap(), Value::Int(0));
        assert_eq!(vm.register(1).unwrap(), Value::Int(4));
        // The freed run is handed out again.
        assert_eq!(vm.register(2).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_allocation_exhaustion_is_fatal() {
        let mut vm = Vm::new(VmConfig {
            ram_size: 4,
            register_count: 2,
            instructions_per_second: 1_000_000,
        })
        .unwrap();
        vm.load("[A] ALC R0 3\n[A] ALC R1 3\n").unwrap();
        assert!(matches!(
            vm.run().unwrap_err(),
            ExecutionError::OutOfMemory { requested: 3 }
        ));
    }

    #[test]
    fn test_cancellation_between_instructions() {
        let mut vm = test_vm();
        vm.load("[R] NOP\n[R] NOP\n").unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        vm.set_cancel_flag(Arc::clone(&flag));

        vm.run().unwrap();
        assert_eq!(vm.state(), VmState::Halted);
        assert_eq!(vm.pc(), 0);
    }

    #[test]
    fn test_describe_reports_configuration() {
        let vm = test_vm();
        let summary = vm.describe();
        assert!(summary.contains("6 registers"));
        assert!(summary.contains("32 RAM cells"));
        assert!(summary.contains("Ready"));
    }
}
