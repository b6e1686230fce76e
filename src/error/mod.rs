//! Error types for compilation and execution.

use std::fmt;
use std::io;

use crate::span::Span;
use thiserror::Error;

/// Where in the source a compile error was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At the end of input.
    AtEnd,
    /// At a specific token, identified by its lexeme.
    At(String),
    /// At a scanner error token; the message already says what went wrong.
    Nowhere,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::At(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::Nowhere => Ok(()),
        }
    }
}

/// A single compile-time diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[line {}] Error{location}: {message}", .span.line)]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub location: ErrorLocation,
}

impl CompileError {
    pub fn new(message: impl Into<String>, span: Span, location: ErrorLocation) -> Self {
        Self {
            message: message.into(),
            span,
            location,
        }
    }

    pub fn line(&self) -> u32 {
        self.span.line
    }
}

/// Every diagnostic collected during one failed compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, CompileError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// Runtime errors. Each carries the source line of the failing instruction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{message}")]
    TypeError { message: String, line: u32 },

    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String, line: u32 },

    #[error("Stack overflow.")]
    StackOverflow { line: u32 },

    #[error("Stack underflow.")]
    StackUnderflow { line: u32 },

    #[error("Unknown opcode {byte}.")]
    InvalidOpcode { byte: u8, line: u32 },

    /// Hand-built chunk that reads past its code or constants.
    #[error("{message}")]
    MalformedChunk { message: String, line: u32 },

    #[error("Failed to write output: {source}")]
    Output { source: io::Error, line: u32 },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>, line: u32) -> Self {
        Self::TypeError {
            message: message.into(),
            line,
        }
    }

    pub fn undefined_variable(name: impl Into<String>, line: u32) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            line,
        }
    }

    pub fn stack_overflow(line: u32) -> Self {
        Self::StackOverflow { line }
    }

    pub fn stack_underflow(line: u32) -> Self {
        Self::StackUnderflow { line }
    }

    pub fn invalid_opcode(byte: u8, line: u32) -> Self {
        Self::InvalidOpcode { byte, line }
    }

    pub fn malformed_chunk(message: impl Into<String>, line: u32) -> Self {
        Self::MalformedChunk {
            message: message.into(),
            line,
        }
    }

    pub fn output(source: io::Error, line: u32) -> Self {
        Self::Output { source, line }
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::TypeError { line, .. } => *line,
            Self::UndefinedVariable { line, .. } => *line,
            Self::StackOverflow { line } => *line,
            Self::StackUnderflow { line } => *line,
            Self::InvalidOpcode { line, .. } => *line,
            Self::MalformedChunk { line, .. } => *line,
            Self::Output { line, .. } => *line,
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{0}")]
    Compile(#[from] CompileErrors),

    #[error("{0}\n[line {}] in script", .0.line())]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
