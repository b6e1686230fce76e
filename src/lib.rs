//! Loxlang: a single-pass bytecode compiler and stack-based virtual machine
//! for the Lox scripting language.
//!
//! Source text is scanned lazily, compiled in one pass straight to bytecode
//! (no AST) and executed by [`vm::Vm`].
//!
//! ```no_run
//! use loxlang::{InterpretResult, Vm};
//!
//! let mut vm = Vm::new();
//! assert_eq!(vm.interpret("print 1 + 2;"), InterpretResult::Ok);
//! ```

#![allow(clippy::new_without_default)]

pub mod error;
pub mod lexer;
pub mod repl;
pub mod span;
pub mod vm;

pub use error::LoxError;
pub use vm::{InterpretResult, RunOptions, Vm};

/// Run a Lox program on a fresh VM, printing to stdout.
pub fn run(source: &str) -> Result<(), LoxError> {
    run_with_options(source, RunOptions::default())
}

/// Run a Lox program on a fresh VM with the given debugging options.
pub fn run_with_options(source: &str, options: RunOptions) -> Result<(), LoxError> {
    let mut vm = Vm::new();
    vm.set_options(options);
    vm.run_source(source)
}

/// Compile and run `source` on a fresh VM, reporting errors on stderr.
pub fn interpret(source: &str) -> InterpretResult {
    Vm::new().interpret(source)
}
