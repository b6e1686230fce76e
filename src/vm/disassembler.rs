//! Bytecode disassembler for debugging.

use std::fmt::{self, Write};

use super::chunk::Chunk;
use super::object::Heap;
use super::opcode::OpCode;

/// Disassemble a whole chunk into human-readable output.
pub fn disassemble_chunk(chunk: &Chunk, heap: &Heap, name: &str) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_chunk(&mut output, chunk, heap, name);
    output
}

/// Disassemble the instruction at `offset`. Returns the text (without a
/// trailing newline) and the offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, heap: &Heap, offset: usize) -> (String, usize) {
    let mut output = String::new();
    let next = write_instruction(&mut output, chunk, heap, offset).unwrap_or(offset + 1);
    (output, next)
}

fn write_chunk(out: &mut impl Write, chunk: &Chunk, heap: &Heap, name: &str) -> fmt::Result {
    writeln!(out, "== {} ==", name)?;

    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = write_instruction(out, chunk, heap, offset)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_instruction(
    out: &mut impl Write,
    chunk: &Chunk,
    heap: &Heap,
    offset: usize,
) -> Result<usize, fmt::Error> {
    write!(out, "{:04} ", offset)?;

    // Line number, or | if same as previous
    let line = chunk.line_at(offset);
    if offset > 0 && line == chunk.line_at(offset - 1) {
        write!(out, "   | ")?;
    } else {
        write!(out, "{:4} ", line)?;
    }

    let Some(&byte) = chunk.code.get(offset) else {
        write!(out, "<end of code>")?;
        return Ok(offset + 1);
    };
    let Some(op) = OpCode::from_u8(byte) else {
        write!(out, "Unknown opcode {}", byte)?;
        return Ok(offset + 1);
    };

    // Operands past the end of the code are reported instead of read.
    if offset + op.operand_size() >= chunk.code.len() {
        write!(out, "{} <truncated>", op.name())?;
        return Ok(chunk.code.len());
    }

    match op {
        OpCode::Constant | OpCode::DefineGlobal | OpCode::GetGlobal | OpCode::SetGlobal => {
            let index = chunk.code[offset + 1];
            write!(out, "{:<16} {:4} '", op.name(), index)?;
            match chunk.constants.get(index as usize) {
                Some(value) => write!(out, "{}", value.display(heap))?,
                None => write!(out, "<bad constant>")?,
            }
            write!(out, "'")?;
            Ok(offset + 2)
        }
        OpCode::GetLocal | OpCode::SetLocal => {
            write!(out, "{:<16} {:4}", op.name(), chunk.code[offset + 1])?;
            Ok(offset + 2)
        }
        OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => {
            let jump = chunk.read_u16(offset + 1) as usize;
            let after = offset + 3;
            let target = if op == OpCode::Loop {
                after.wrapping_sub(jump) as isize
            } else {
                (after + jump) as isize
            };
            write!(out, "{:<16} {:4} -> {}", op.name(), offset, target)?;
            Ok(after)
        }
        _ => {
            write!(out, "{}", op.name())?;
            Ok(offset + 1)
        }
    }
}
