//! Opcode byte values.
//!
//! Opcodes are single bytes followed by zero, one, or two immediate operand
//! bytes. Three operand forms exist:
//!
//! - **N-form**: the operand is baked into the opcode byte itself
//!   ([`STACK_REF1`]..[`STACK_REF5`], [`CALL0`]..[`CALL5`], the embedded
//!   constant family at [`CONSTANT0`]`..=0xFF`).
//! - **B-form**: one unsigned operand byte.
//! - **W-form**: two operand bytes, little-endian `u16`.
//!
//! The byte layout follows the classic Emacs bytecode table: the embedded
//! families occupy their historical slots and the top quarter of the byte
//! space (`0xC0..=0xFF`) is the 64-entry embedded constant family
//! (`CONSTANT0 | k`).
//!
//! [`EXT`] is a prefix: the byte after it selects an operation from the
//! parallel [`ext`] table, with [`EXT_WIDTH`] giving the total instruction
//! length including the prefix. Frequent opcodes stay single-byte so the
//! main dispatch table remains dense; rare or structurally distinct
//! operations (native calls, the stop marker) live behind the prefix
//! without inflating it.

/// Prefix for the extended opcode table ([`ext`]).
pub const EXT: u8 = 0x00;

// Embedded stack references: push a copy of the cell `k + 1` slots below
// the top of stack.
pub const STACK_REF1: u8 = 0x01;
pub const STACK_REF2: u8 = 0x02;
pub const STACK_REF3: u8 = 0x03;
pub const STACK_REF4: u8 = 0x04;
pub const STACK_REF5: u8 = 0x05;
/// B-form stack reference.
pub const STACK_REF_B: u8 = 0x06;
/// W-form stack reference.
pub const STACK_REF_W: u8 = 0x07;

// Variable environment family. Part of the loader's token alphabet, but
// reserved: the evaluator has no semantics for it and reports a bad opcode.
pub const VAR_REF_B: u8 = 0x0E;
pub const VAR_REF_W: u8 = 0x0F;
pub const VAR_SET_B: u8 = 0x16;
pub const VAR_SET_W: u8 = 0x17;
pub const VAR_BIND_B: u8 = 0x1E;
pub const UNBIND_B: u8 = 0x2E;
pub const UNBIND_W: u8 = 0x2F;

// Bytecode-to-bytecode calls. The operand (embedded or immediate) is the
// argument count; the callee symbol sits below the arguments.
pub const CALL0: u8 = 0x20;
pub const CALL1: u8 = 0x21;
pub const CALL2: u8 = 0x22;
pub const CALL3: u8 = 0x23;
pub const CALL4: u8 = 0x24;
pub const CALL5: u8 = 0x25;
pub const CALL_B: u8 = 0x26;
pub const CALL_W: u8 = 0x27;

/// Pop cdr, pop car, push the new cons cell.
pub const CONS: u8 = 0x42;

/// Increment the top of stack (ints by 1, floats by 1.0).
pub const ADD1: u8 = 0x54;

/// W-form constant pool reference.
pub const CONSTANT_W: u8 = 0x81;

// Absolute branches. The W operand is a byte offset into the current
// function's code.
pub const GOTO_W: u8 = 0x82;
pub const GOTO_IF_NIL_W: u8 = 0x83;
pub const GOTO_IF_NON_NIL_W: u8 = 0x84;
pub const GOTO_IF_NIL_ELSE_POP_W: u8 = 0x85;
pub const GOTO_IF_NON_NIL_ELSE_POP_W: u8 = 0x86;

pub const RETURN: u8 = 0x87;
pub const DISCARD: u8 = 0x88;
pub const DUP: u8 = 0x89;

// Relative branches. The single operand byte is a signed offset from the
// end of the instruction.
pub const RGOTO_B: u8 = 0xAA;
pub const RGOTO_IF_NIL_B: u8 = 0xAB;
pub const RGOTO_IF_NON_NIL_B: u8 = 0xAC;
pub const RGOTO_IF_NIL_ELSE_POP_B: u8 = 0xAD;
pub const RGOTO_IF_NON_NIL_ELSE_POP_B: u8 = 0xAE;

/// Pop n cells, push the list built from them.
pub const LIST_B: u8 = 0xAF;
/// Pop n strings, push their concatenation.
pub const CONCAT_B: u8 = 0xB0;

/// Pop the top of stack and store it n slots further down.
pub const STACK_SET_B: u8 = 0xB2;
pub const STACK_SET_W: u8 = 0xB3;

/// Pop n cells.
pub const DISCARD_B: u8 = 0xB6;

/// First opcode of the embedded constant family: `CONSTANT0 | k` pushes
/// constant pool entry `k`, for `k` in `0..=63`.
pub const CONSTANT0: u8 = 0xC0;

/// Extended opcodes, selected by the byte following [`EXT`].
pub mod ext {
    /// Terminate evaluation. Every well-formed function body ends with
    /// `{EXT, STOP}` (see [`STOP_TRAILER`](super::STOP_TRAILER)).
    pub const STOP: u8 = 0x00;

    // Native calls with an embedded argument count. The byte value equals
    // the total slot count the call claims on the stack (callee symbol
    // plus arguments), so `NATIVE_CALL0` must stay at 1.
    pub const NATIVE_CALL0: u8 = 0x01;
    pub const NATIVE_CALL1: u8 = 0x02;
    pub const NATIVE_CALL2: u8 = 0x03;
    pub const NATIVE_CALL3: u8 = 0x04;
    pub const NATIVE_CALL4: u8 = 0x05;
    pub const NATIVE_CALL5: u8 = 0x06;
    /// B-form native call: the operand byte is the argument count.
    pub const NATIVE_CALL_B: u8 = 0x07;
    /// W-form native call.
    pub const NATIVE_CALL_W: u8 = 0x08;
}

/// The two-byte sequence that terminates every well-formed function body.
pub const STOP_TRAILER: [u8; 2] = [EXT, ext::STOP];

/// Total byte length, including the [`EXT`] prefix, of each extended
/// instruction. Entries for unassigned extended opcodes are zero; the
/// evaluator rejects those before the width is consulted.
pub static EXT_WIDTH: [u8; 256] = ext_width_table();

const fn ext_width_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    table[ext::STOP as usize] = 2;
    let mut op = ext::NATIVE_CALL0;
    while op <= ext::NATIVE_CALL5 {
        table[op as usize] = 2;
        op += 1;
    }
    table[ext::NATIVE_CALL_B as usize] = 3;
    table[ext::NATIVE_CALL_W as usize] = 4;
    table
}
