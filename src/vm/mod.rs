//! Bytecode VM for Lox: compiles source straight to bytecode and executes it
//! on a stack-based VM.

pub mod chunk;
pub mod compiler;
pub mod compiler_exprs;
pub mod compiler_stmts;
pub mod disassembler;
pub mod object;
pub mod opcode;
pub mod table;
pub mod value;
#[allow(clippy::module_inception)]
pub mod vm;

#[cfg(test)]
mod tests;

pub use chunk::Chunk;
pub use compiler::compile;
pub use disassembler::disassemble_chunk;
pub use object::{Heap, Obj, ObjRef, ObjString};
pub use opcode::OpCode;
pub use table::Table;
pub use value::{values_equal, Value};
pub use vm::{InterpretResult, RunOptions, Vm, STACK_MAX};
