//! Source-to-bytecode compiler.
//!
//! Single-pass compilation: tokens are pulled from the scanner on demand and
//! bytecode is emitted as soon as each construct is recognized. There is no
//! AST. Variable resolution happens at compile time: locals become stack slot
//! indices, everything else is a global looked up by name.
//!
//! Errors do not stop compilation. Each one is recorded, the compiler enters
//! panic mode to suppress cascades, and it resynchronizes at the next
//! statement boundary.

use crate::error::{CompileError, CompileErrors, ErrorLocation};
use crate::lexer::{Scanner, Token, TokenKind};

use super::chunk::Chunk;
use super::object::Heap;
use super::opcode::OpCode;
use super::value::Value;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileErrors>;

/// Maximum number of locals addressable by a one-byte slot operand.
pub const MAX_LOCALS: usize = 256;

/// Maximum combined depth of nested statements and subexpressions. Both are
/// compiled by recursive descent, so this bounds native stack use.
pub const MAX_NESTING: usize = 256;

/// Compile a whole program into a chunk. Strings and identifier names are
/// interned into `heap`.
pub fn compile(source: &str, heap: &mut Heap) -> CompileResult<Chunk> {
    let mut compiler = Compiler::new(source, heap);
    compiler.advance();
    while !compiler.matches(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.finish()
}

/// A local variable tracked during compilation.
#[derive(Debug, Clone, Copy)]
pub struct Local<'src> {
    pub name: &'src str,
    /// `None` while the variable's own initializer is being compiled.
    pub depth: Option<u32>,
}

/// The compiler: transforms source text into bytecode.
pub struct Compiler<'src, 'heap> {
    scanner: Scanner<'src>,
    pub(super) heap: &'heap mut Heap,
    pub(super) chunk: Chunk,
    pub(super) current: Token<'src>,
    pub(super) previous: Token<'src>,
    errors: Vec<CompileError>,
    pub(super) panic_mode: bool,
    /// Local variables in scope, innermost last.
    pub(super) locals: Vec<Local<'src>>,
    /// Current scope depth (0 = global).
    pub(super) scope_depth: u32,
    nesting: usize,
}

impl<'src, 'heap> Compiler<'src, 'heap> {
    pub fn new(source: &'src str, heap: &'heap mut Heap) -> Self {
        Self {
            scanner: Scanner::new(source),
            heap,
            chunk: Chunk::new(),
            current: Token::synthetic(),
            previous: Token::synthetic(),
            errors: Vec::new(),
            panic_mode: false,
            locals: Vec::new(),
            scope_depth: 0,
            nesting: 0,
        }
    }

    fn finish(mut self) -> CompileResult<Chunk> {
        self.emit_op(OpCode::Return);

        if !self.errors.is_empty() {
            log::debug!("compilation failed with {} error(s)", self.errors.len());
            return Err(CompileErrors(self.errors));
        }

        log::debug!(
            "compiled chunk: {} bytes, {} constants",
            self.chunk.len(),
            self.chunk.constants.len()
        );
        Ok(self.chunk)
    }

    // --- Token stream ---

    pub(super) fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(super) fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // --- Error reporting ---

    pub(super) fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    pub(super) fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::AtEnd,
            TokenKind::Error => ErrorLocation::Nowhere,
            _ => ErrorLocation::At(token.lexeme.to_string()),
        };
        self.errors
            .push(CompileError::new(message, token.span, location));
    }

    /// Enter one level of recursive descent. Past [`MAX_NESTING`] this
    /// reports `message`, skips the current token and returns false; the
    /// caller must then return without calling [`Compiler::leave_nesting`].
    pub(super) fn enter_nesting(&mut self, message: &str) -> bool {
        if self.nesting >= MAX_NESTING {
            self.error_at_current(message);
            self.advance();
            return false;
        }
        self.nesting += 1;
        true
    }

    pub(super) fn leave_nesting(&mut self) {
        self.nesting -= 1;
    }

    /// Skip tokens until a likely statement boundary.
    pub(super) fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon || self.current.kind.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    // --- Chunk helpers ---

    pub(super) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line();
        self.chunk.write(byte, line);
    }

    pub(super) fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    pub(super) fn emit_op_with(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    pub(super) fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk.add_constant(value) {
            Some(index) => index,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    pub(super) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_with(OpCode::Constant, index);
    }

    /// Intern an identifier and store it in the constant pool.
    pub(super) fn identifier_constant(&mut self, name: &str) -> u8 {
        let obj = self.heap.intern(name);
        self.make_constant(Value::Obj(obj))
    }

    /// Emit a jump with a placeholder operand. Returns the operand offset
    /// for [`Compiler::patch_jump`].
    pub(super) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.chunk.len() - 2
    }

    pub(super) fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
            return;
        }
        self.chunk.patch_u16(offset, jump as u16);
    }

    pub(super) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);

        let offset = self.chunk.len() - loop_start + 2;
        let offset = match u16::try_from(offset) {
            Ok(offset) => offset,
            Err(_) => {
                self.error("Loop body too large.");
                0
            }
        };
        let [hi, lo] = offset.to_be_bytes();
        self.emit_byte(hi);
        self.emit_byte(lo);
    }

    // --- Scope management ---

    pub(super) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    pub(super) fn end_scope(&mut self) {
        self.scope_depth -= 1;
        // Pop locals that go out of scope
        while let Some(local) = self.locals.last() {
            if local.depth.is_some_and(|depth| depth <= self.scope_depth) {
                break;
            }
            self.emit_op(OpCode::Pop);
            self.locals.pop();
        }
    }

    // --- Local variables ---

    pub(super) fn add_local(&mut self, name: &'src str) {
        if self.locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.locals.push(Local { name, depth: None });
    }

    /// Record the variable just named by `previous` as a local in the
    /// current scope. Globals are late bound and need no declaration.
    pub(super) fn declare_variable(&mut self) {
        if self.scope_depth == 0 {
            return;
        }

        let name = self.previous.lexeme;
        let duplicate = self
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth.map_or(true, |depth| depth >= self.scope_depth))
            .any(|local| local.name == name);
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    pub(super) fn mark_initialized(&mut self) {
        let depth = self.scope_depth;
        if let Some(local) = self.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    pub(super) fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let (slot, initialized) = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
            .map(|(slot, local)| (slot, local.depth.is_some()))?;

        if !initialized {
            self.error("Can't read local variable in its own initializer.");
        }
        Some(slot as u8)
    }
}
