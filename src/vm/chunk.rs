//! Bytecode chunk: code bytes, line table and constant pool.

use super::opcode::OpCode;
use super::value::Value;

/// Maximum number of constants addressable by a one-byte operand.
pub const MAX_CONSTANTS: usize = 256;

/// A chunk of bytecode: instructions + constant pool + line info.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The bytecode instructions and their operands.
    pub code: Vec<u8>,
    /// Source line numbers, parallel to `code`.
    pub lines: Vec<u32>,
    /// Constant pool.
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte and record its source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Add a constant to the pool and return its index, or `None` once the
    /// pool is full.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        let index = self.constants.len() as u8;
        self.constants.push(value);
        Some(index)
    }

    /// Read a big-endian u16 operand starting at `offset`.
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.code[offset], self.code[offset + 1]])
    }

    /// Overwrite the two operand bytes at `offset`.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
    }

    pub fn line_at(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Get the current offset (next instruction index).
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn clear(&mut self) {
        self.code.clear();
        self.lines.clear();
        self.constants.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_keeps_lines_parallel() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Print, 2);
        chunk.write_op(OpCode::Return, 2);
        assert_eq!(chunk.code, vec![1, 14, 7]);
        assert_eq!(chunk.lines, vec![1, 2, 2]);
        assert_eq!(chunk.line_at(1), 2);
    }

    #[test]
    fn test_constant_pool_limit() {
        let mut chunk = Chunk::new();
        for i in 0..MAX_CONSTANTS {
            assert_eq!(chunk.add_constant(Value::Number(i as f64)), Some(i as u8));
        }
        assert_eq!(chunk.add_constant(Value::Nil), None);
        assert_eq!(chunk.constants.len(), MAX_CONSTANTS);
    }

    #[test]
    fn test_u16_operands_are_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write(0xff, 1);
        chunk.write(0xff, 1);
        chunk.patch_u16(1, 0x0102);
        assert_eq!(chunk.code[1..].to_vec(), vec![0x01, 0x02]);
        assert_eq!(chunk.read_u16(1), 0x0102);
    }
}
