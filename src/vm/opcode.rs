//! Bytecode opcodes for the Lox VM.

/// Opcodes for the bytecode virtual machine.
///
/// The discriminants are the encoded byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Push a constant from the constant pool: CONSTANT <index:u8>
    Constant = 0,
    /// Push nil
    Nil,
    /// Push true
    True,
    /// Push false
    False,
    /// a == b
    Equal,
    /// a > b
    Greater,
    /// a < b
    Less,
    /// End execution of the chunk
    Return,
    /// -a
    Negate,
    /// a + b (numbers or strings)
    Add,
    Subtract,
    Multiply,
    Divide,
    /// !a
    Not,
    /// Pop and print the top of the stack
    Print,
    /// Unconditional forward jump: JUMP <offset:u16>
    Jump,
    /// Jump forward if the top of the stack is falsey (no pop): JUMP_IF_FALSE <offset:u16>
    JumpIfFalse,
    /// Jump backward: LOOP <offset:u16>
    Loop,
    /// Discard the top of the stack
    Pop,
    /// Bind a global from the top of the stack: DEFINE_GLOBAL <name:u8>
    DefineGlobal,
    /// GET_GLOBAL <name:u8>
    GetGlobal,
    /// SET_GLOBAL <name:u8>
    SetGlobal,
    /// GET_LOCAL <slot:u8>
    GetLocal,
    /// SET_LOCAL <slot:u8>
    SetLocal,
}

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Return
            | OpCode::Negate
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Not
            | OpCode::Print
            | OpCode::Pop => 0,

            OpCode::Constant
            | OpCode::DefineGlobal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetLocal
            | OpCode::SetLocal => 1,

            OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => 2,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        let op = match byte {
            0 => OpCode::Constant,
            1 => OpCode::Nil,
            2 => OpCode::True,
            3 => OpCode::False,
            4 => OpCode::Equal,
            5 => OpCode::Greater,
            6 => OpCode::Less,
            7 => OpCode::Return,
            8 => OpCode::Negate,
            9 => OpCode::Add,
            10 => OpCode::Subtract,
            11 => OpCode::Multiply,
            12 => OpCode::Divide,
            13 => OpCode::Not,
            14 => OpCode::Print,
            15 => OpCode::Jump,
            16 => OpCode::JumpIfFalse,
            17 => OpCode::Loop,
            18 => OpCode::Pop,
            19 => OpCode::DefineGlobal,
            20 => OpCode::GetGlobal,
            21 => OpCode::SetGlobal,
            22 => OpCode::GetLocal,
            23 => OpCode::SetLocal,
            _ => return None,
        };
        Some(op)
    }

    /// Mnemonic used by the disassembler.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Return => "OP_RETURN",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Print => "OP_PRINT",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Loop => "OP_LOOP",
            OpCode::Pop => "OP_POP",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}
