use core::fmt;

use crate::instruction::Instruction;
use crate::op::{self, ext};

/// Why a byte sequence failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// An unassigned main-table opcode byte.
    UnknownOpcode { offset: usize, op: u8 },
    /// An unassigned extended-table opcode byte.
    UnknownExtOpcode { offset: usize, op: u8 },
    /// The stream ended in the middle of an instruction.
    Truncated { offset: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { offset, op } => {
                write!(f, "unknown opcode 0x{op:02x} at offset {offset}")
            }
            Self::UnknownExtOpcode { offset, op } => {
                write!(f, "unknown extended opcode 0x{op:02x} at offset {offset}")
            }
            Self::Truncated { offset } => {
                write!(f, "bytecode truncated at offset {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Unlike the evaluator, the decoder accepts arbitrary input: it is a
/// diagnostic surface (disassembly, loader validation), so every fetch is
/// bounds-checked and malformed input is reported as a [`DecodeError`]
/// instead of being rejected up front. After an error the decoder is fused
/// and yields nothing further.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// Current byte offset in the stream.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether the decoder has reached the end of the bytecode.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream or after a
    /// previous error.
    pub fn decode_next(&mut self) -> Option<Result<Instruction, DecodeError>> {
        if self.failed || self.is_at_end() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let start = self.pos;
        let opcode = self.read_u8()?;

        match opcode {
            op::EXT => self.decode_ext(),

            op::DUP => Ok(Instruction::Dup),
            op::DISCARD => Ok(Instruction::Discard),
            op::DISCARD_B => Ok(Instruction::DiscardN { n: self.read_u8()? }),

            op::STACK_REF1..=op::STACK_REF5 => Ok(Instruction::StackRef {
                n: opcode as u16,
            }),
            op::STACK_REF_B => Ok(Instruction::StackRef {
                n: self.read_u8()? as u16,
            }),
            op::STACK_REF_W => Ok(Instruction::StackRef {
                n: self.read_u16()?,
            }),

            op::STACK_SET_B => Ok(Instruction::StackSet {
                n: self.read_u8()? as u16,
            }),
            op::STACK_SET_W => Ok(Instruction::StackSet {
                n: self.read_u16()?,
            }),

            op::CONSTANT_W => Ok(Instruction::Constant {
                idx: self.read_u16()?,
            }),
            op::CONSTANT0..=u8::MAX => Ok(Instruction::Constant {
                idx: (opcode - op::CONSTANT0) as u16,
            }),

            op::GOTO_W => Ok(Instruction::Goto {
                target: self.read_u16()?,
            }),
            op::GOTO_IF_NIL_W => Ok(Instruction::GotoIfNil {
                target: self.read_u16()?,
            }),
            op::GOTO_IF_NON_NIL_W => Ok(Instruction::GotoIfNonNil {
                target: self.read_u16()?,
            }),
            op::GOTO_IF_NIL_ELSE_POP_W => Ok(Instruction::GotoIfNilElsePop {
                target: self.read_u16()?,
            }),
            op::GOTO_IF_NON_NIL_ELSE_POP_W => {
                Ok(Instruction::GotoIfNonNilElsePop {
                    target: self.read_u16()?,
                })
            }

            op::RGOTO_B => Ok(Instruction::RGoto {
                offset: self.read_i8()?,
            }),
            op::RGOTO_IF_NIL_B => Ok(Instruction::RGotoIfNil {
                offset: self.read_i8()?,
            }),
            op::RGOTO_IF_NON_NIL_B => Ok(Instruction::RGotoIfNonNil {
                offset: self.read_i8()?,
            }),
            op::RGOTO_IF_NIL_ELSE_POP_B => Ok(Instruction::RGotoIfNilElsePop {
                offset: self.read_i8()?,
            }),
            op::RGOTO_IF_NON_NIL_ELSE_POP_B => {
                Ok(Instruction::RGotoIfNonNilElsePop {
                    offset: self.read_i8()?,
                })
            }

            op::CALL0..=op::CALL5 => Ok(Instruction::Call {
                argc: (opcode - op::CALL0) as u16,
            }),
            op::CALL_B => Ok(Instruction::Call {
                argc: self.read_u8()? as u16,
            }),
            op::CALL_W => Ok(Instruction::Call {
                argc: self.read_u16()?,
            }),

            op::RETURN => Ok(Instruction::Return),
            op::CONS => Ok(Instruction::Cons),
            op::LIST_B => Ok(Instruction::List { n: self.read_u8()? }),
            op::CONCAT_B => Ok(Instruction::Concat { n: self.read_u8()? }),
            op::ADD1 => Ok(Instruction::Add1),

            op::VAR_REF_B => Ok(Instruction::VarRef {
                idx: self.read_u8()? as u16,
            }),
            op::VAR_REF_W => Ok(Instruction::VarRef {
                idx: self.read_u16()?,
            }),
            op::VAR_SET_B => Ok(Instruction::VarSet {
                idx: self.read_u8()? as u16,
            }),
            op::VAR_SET_W => Ok(Instruction::VarSet {
                idx: self.read_u16()?,
            }),
            op::VAR_BIND_B => Ok(Instruction::VarBind {
                idx: self.read_u8()?,
            }),
            op::UNBIND_B => Ok(Instruction::Unbind {
                n: self.read_u8()? as u16,
            }),
            op::UNBIND_W => Ok(Instruction::Unbind {
                n: self.read_u16()?,
            }),

            _ => Err(DecodeError::UnknownOpcode { offset: start, op: opcode }),
        }
    }

    fn decode_ext(&mut self) -> Result<Instruction, DecodeError> {
        let offset = self.pos;
        let ext_op = self.read_u8()?;

        match ext_op {
            ext::STOP => Ok(Instruction::Stop),
            ext::NATIVE_CALL0..=ext::NATIVE_CALL5 => {
                Ok(Instruction::NativeCall {
                    argc: (ext_op - ext::NATIVE_CALL0) as u16,
                })
            }
            ext::NATIVE_CALL_B => Ok(Instruction::NativeCall {
                argc: self.read_u8()? as u16,
            }),
            ext::NATIVE_CALL_W => Ok(Instruction::NativeCall {
                argc: self.read_u16()?,
            }),
            _ => Err(DecodeError::UnknownExtOpcode { offset, op: ext_op }),
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        match self.bytes.get(self.pos) {
            Some(&v) => {
                self.pos += 1;
                Ok(v)
            }
            None => Err(DecodeError::Truncated { offset: self.pos }),
        }
    }

    fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

impl<'a> Iterator for BytecodeDecoder<'a> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}
