//! The bytecode virtual machine: a stack-based execution engine.

use std::io::{self, Stdout, Write};

use crate::error::{LoxError, RuntimeError};

use super::chunk::Chunk;
use super::compiler::compile;
use super::disassembler::{disassemble_chunk, disassemble_instruction};
use super::object::{Heap, ObjRef, StringKey};
use super::opcode::OpCode;
use super::table::Table;
use super::value::{values_equal, Value};

/// Maximum depth of the value stack.
pub const STACK_MAX: usize = 256;

/// Outcome of [`Vm::interpret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

impl From<&Result<(), LoxError>> for InterpretResult {
    fn from(result: &Result<(), LoxError>) -> Self {
        match result {
            Ok(()) => InterpretResult::Ok,
            Err(LoxError::Compile(_)) => InterpretResult::CompileError,
            Err(LoxError::Runtime(_) | LoxError::Io(_)) => InterpretResult::RuntimeError,
        }
    }
}

/// Debugging switches for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Write the compiled chunk to the output before executing it.
    pub disassemble: bool,
    /// Log every instruction and the stack at `trace` level.
    pub trace: bool,
}

/// The bytecode VM.
///
/// Globals and interned strings persist across [`Vm::interpret`] calls, so
/// one VM can serve a whole REPL session. `print` writes to `W`.
pub struct Vm<W: Write = Stdout> {
    chunk: Chunk,
    /// Index of the next byte to execute.
    ip: usize,
    /// Offset of the instruction being executed, for error lines.
    op_start: usize,
    stack: Vec<Value>,
    globals: Table,
    heap: Heap,
    out: W,
    options: RunOptions,
}

impl Vm<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            chunk: Chunk::new(),
            ip: 0,
            op_start: 0,
            stack: Vec::with_capacity(STACK_MAX),
            globals: Table::new(),
            heap: Heap::new(),
            out,
            options: RunOptions::default(),
        }
    }

    pub fn set_options(&mut self, options: RunOptions) {
        self.options = options;
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Current value of a global, if defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        let obj = self.heap.find_interned(name)?;
        self.globals.get(self.heap.key(obj))
    }

    /// Compile and run `source`, reporting any error on stderr.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let result = self.run_source(source);
        if let Err(err) = &result {
            eprintln!("{}", err);
        }
        InterpretResult::from(&result)
    }

    /// Compile and run `source`, returning the error instead of printing it.
    pub fn run_source(&mut self, source: &str) -> Result<(), LoxError> {
        let chunk = compile(source, &mut self.heap)?;

        if self.options.disassemble {
            let listing = disassemble_chunk(&chunk, &self.heap, "script");
            self.out.write_all(listing.as_bytes())?;
        }

        self.run_chunk(chunk)?;
        self.out.flush()?;
        Ok(())
    }

    /// Execute an already compiled chunk. On error the stack is reset.
    pub fn run_chunk(&mut self, chunk: Chunk) -> Result<(), RuntimeError> {
        self.chunk = chunk;
        self.ip = 0;
        self.op_start = 0;

        let result = self.run();
        if result.is_err() {
            self.reset_stack();
        }
        result
    }

    /// Release globals, interned strings and every heap object. The VM is
    /// usable again afterwards, as if freshly created.
    pub fn free(&mut self) {
        self.reset_stack();
        self.globals = Table::new();
        self.chunk.clear();
        self.ip = 0;
        self.heap.free_objects();
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
    }

    /// Run the dispatch loop.
    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.options.trace && log::log_enabled!(log::Level::Trace) {
                self.trace_instruction();
            }

            self.op_start = self.ip;
            let byte = self.read_byte()?;
            let Some(op) = OpCode::from_u8(byte) else {
                return Err(RuntimeError::invalid_opcode(byte, self.line()));
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant()?;
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(values_equal(a, b)))?;
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.op_add()?,
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Negate => {
                    let Value::Number(n) = self.peek(0)? else {
                        return Err(self.type_error("Operand must be a number."));
                    };
                    self.pop()?;
                    self.push(Value::Number(-n))?;
                }
                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Print => {
                    let value = self.pop()?;
                    let line = self.line();
                    writeln!(self.out, "{}", value.display(&self.heap))
                        .map_err(|e| RuntimeError::output(e, line))?;
                }
                OpCode::Jump => {
                    let offset = self.read_u16()?;
                    self.ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()?;
                    if self.peek(0)?.is_falsey() {
                        self.ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()? as usize;
                    if offset > self.ip {
                        return Err(RuntimeError::malformed_chunk(
                            "Loop jumps before start of code.",
                            self.line(),
                        ));
                    }
                    self.ip -= offset;
                }
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::DefineGlobal => {
                    let name = self.read_name()?;
                    let value = self.peek(0)?;
                    self.globals.set(name, value);
                    self.pop()?;
                }
                OpCode::GetGlobal => {
                    let name = self.read_name()?;
                    match self.globals.get(name) {
                        Some(value) => self.push(value)?,
                        None => return Err(self.undefined_variable(name.obj)),
                    }
                }
                OpCode::SetGlobal => {
                    let name = self.read_name()?;
                    let value = self.peek(0)?;
                    if self.globals.set(name, value) {
                        // Assignment never creates a global.
                        self.globals.delete(name);
                        return Err(self.undefined_variable(name.obj));
                    }
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let value = match self.stack.get(slot) {
                        Some(value) => *value,
                        None => return Err(RuntimeError::stack_underflow(self.line())),
                    };
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    let value = self.peek(0)?;
                    match self.stack.get_mut(slot) {
                        Some(local) => *local = value,
                        None => return Err(RuntimeError::stack_underflow(self.line())),
                    }
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    // --- Stack ---

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::stack_overflow(self.line()));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(RuntimeError::stack_underflow(self.line())),
        }
    }

    fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .map(|index| self.stack[index])
            .ok_or_else(|| RuntimeError::stack_underflow(self.line()))
    }

    // --- Decoding ---

    // Compiled chunks always end in `Return`; only chunks handed to
    // `run_chunk` directly can run off the end.
    fn read_byte(&mut self) -> Result<u8, RuntimeError> {
        let Some(&byte) = self.chunk.code.get(self.ip) else {
            return Err(RuntimeError::malformed_chunk(
                "Unexpected end of bytecode.",
                self.line(),
            ));
        };
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_constant(&mut self) -> Result<Value, RuntimeError> {
        let index = self.read_byte()?;
        match self.chunk.constants.get(index as usize) {
            Some(value) => Ok(*value),
            None => Err(RuntimeError::malformed_chunk(
                format!("Constant index {} out of range.", index),
                self.line(),
            )),
        }
    }

    fn read_name(&mut self) -> Result<StringKey, RuntimeError> {
        match self.read_constant()? {
            Value::Obj(obj) => Ok(self.heap.key(obj)),
            other => Err(self.type_error(format!(
                "Variable name must be a string, found {}.",
                other.type_name()
            ))),
        }
    }

    // --- Operations ---

    fn binary_number_op(&mut self, op: impl FnOnce(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let (Value::Number(a), Value::Number(b)) = (self.peek(1)?, self.peek(0)?) else {
            return Err(self.type_error("Operands must be numbers."));
        };
        self.pop()?;
        self.pop()?;
        self.push(op(a, b))
    }

    fn op_add(&mut self) -> Result<(), RuntimeError> {
        match (self.peek(1)?, self.peek(0)?) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop()?;
                self.pop()?;
                self.push(Value::Number(a + b))
            }
            (Value::Obj(a), Value::Obj(b)) => {
                let result = self.concatenate(a, b);
                self.pop()?;
                self.pop()?;
                self.push(Value::Obj(result))
            }
            _ => Err(self.type_error("Operands must be two numbers or two strings.")),
        }
    }

    fn concatenate(&mut self, a: ObjRef, b: ObjRef) -> ObjRef {
        let a = self.heap.string(a).as_str();
        let b = self.heap.string(b).as_str();
        let mut chars = String::with_capacity(a.len() + b.len());
        chars.push_str(a);
        chars.push_str(b);
        self.heap.intern_owned(chars)
    }

    // --- Errors ---

    fn line(&self) -> u32 {
        self.chunk.line_at(self.op_start)
    }

    fn type_error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::type_error(message, self.line())
    }

    fn undefined_variable(&self, name: ObjRef) -> RuntimeError {
        RuntimeError::undefined_variable(self.heap.string(name).as_str(), self.line())
    }

    fn trace_instruction(&self) {
        if self.ip >= self.chunk.len() {
            return;
        }
        let stack: Vec<String> = self
            .stack
            .iter()
            .map(|value| format!("[ {} ]", value.display(&self.heap)))
            .collect();
        log::trace!("          {}", stack.join(""));
        let (text, _) = disassemble_instruction(&self.chunk, &self.heap, self.ip);
        log::trace!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vm() -> Vm<Vec<u8>> {
        Vm::with_output(Vec::new())
    }

    #[test]
    fn test_interpret_result_mapping() {
        let mut vm = vm();
        assert_eq!(vm.interpret("print 1;"), InterpretResult::Ok);
        assert_eq!(vm.interpret("print ;"), InterpretResult::CompileError);
        assert_eq!(vm.interpret("print -nil;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn test_invalid_opcode_is_runtime_error() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write(250, 3);
        let err = vm.run_chunk(chunk).expect_err("bad opcode");
        assert!(matches!(err, RuntimeError::InvalidOpcode { byte: 250, line: 3 }));
    }

    #[test]
    fn test_chunk_without_return_is_runtime_error() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        let err = vm.run_chunk(chunk).expect_err("runs off the end");
        assert_eq!(err.to_string(), "Unexpected end of bytecode.");
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn test_truncated_operand_is_runtime_error() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write(0, 1);
        let err = vm.run_chunk(chunk).expect_err("missing operand byte");
        assert!(matches!(err, RuntimeError::MalformedChunk { line: 1, .. }));
    }

    #[test]
    fn test_missing_constant_is_runtime_error() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 2);
        chunk.write(7, 2);
        chunk.write_op(OpCode::Return, 2);
        let err = vm.run_chunk(chunk).expect_err("no constant 7");
        assert_eq!(err.to_string(), "Constant index 7 out of range.");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_loop_before_start_is_runtime_error() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Loop, 1);
        chunk.write(0, 1);
        chunk.write(9, 1);
        let err = vm.run_chunk(chunk).expect_err("loop underflows ip");
        assert_eq!(err.to_string(), "Loop jumps before start of code.");
    }

    #[test]
    fn test_pop_on_empty_stack_underflows() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Pop, 1);
        chunk.write_op(OpCode::Return, 1);
        let err = vm.run_chunk(chunk).expect_err("underflow");
        assert_eq!(err.to_string(), "Stack underflow.");
    }

    #[test]
    fn test_push_beyond_capacity_overflows() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        for _ in 0..=STACK_MAX {
            chunk.write_op(OpCode::Nil, 1);
        }
        chunk.write_op(OpCode::Return, 1);
        let err = vm.run_chunk(chunk).expect_err("overflow");
        assert_eq!(err.to_string(), "Stack overflow.");
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn test_full_stack_is_allowed() {
        let mut vm = vm();
        let mut chunk = Chunk::new();
        for _ in 0..STACK_MAX {
            chunk.write_op(OpCode::Nil, 1);
        }
        chunk.write_op(OpCode::Return, 1);
        vm.run_chunk(chunk).expect("exactly full stack");
        assert_eq!(vm.stack_len(), STACK_MAX);
    }

    #[test]
    fn test_disassemble_option_writes_listing() {
        let mut vm = vm();
        vm.set_options(RunOptions {
            disassemble: true,
            trace: false,
        });
        vm.run_source("print 1;").expect("runs");
        let out = String::from_utf8(vm.into_output()).expect("utf8");
        assert!(out.starts_with("== script ==\n"));
        assert!(out.contains("OP_PRINT"));
        assert!(out.ends_with("1\n"));
    }

    #[test]
    fn test_trace_option_does_not_change_output() {
        let mut vm = vm();
        vm.set_options(RunOptions {
            disassemble: false,
            trace: true,
        });
        vm.run_source("var a = 1; { var b = a + 1; print b; }").expect("runs");
        assert_eq!(vm.output().as_slice(), b"2\n");
    }
}
