use crate::op::{self, ext};

/// A forward branch whose target has not been resolved yet.
///
/// Created by the `goto*` family on [`BytecodeBuilder`]; resolve it with
/// [`BytecodeBuilder::bind`].
#[derive(Debug)]
pub struct Label {
    /// Position of the u16 target bytes in the buffer.
    operand_pos: usize,
}

/// Builds a bytecode byte sequence.
///
/// The builder always picks the narrowest encoding: embedded N-form where
/// one exists, then the B-form, then the W-form. Finish a function body
/// with [`stop`](Self::stop) so it carries the mandatory
/// [`STOP_TRAILER`](op::STOP_TRAILER).
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Emit a B- or W-form instruction depending on the operand magnitude.
    fn emit_bw(&mut self, op_b: u8, op_w: u8, operand: u16) {
        if operand <= u8::MAX as u16 {
            self.emit_u8(op_b);
            self.emit_u8(operand as u8);
        } else {
            self.emit_u8(op_w);
            self.emit_u16(operand);
        }
    }

    // ── stack ──────────────────────────────────────────────────────

    /// `Dup` — push a copy of the top of stack.
    pub fn dup(&mut self) {
        self.emit_u8(op::DUP);
    }

    /// `Discard` — pop one cell.
    pub fn discard(&mut self) {
        self.emit_u8(op::DISCARD);
    }

    /// `DiscardN <n:u8>` — pop `n` cells.
    pub fn discard_n(&mut self, n: u8) {
        self.emit_u8(op::DISCARD_B);
        self.emit_u8(n);
    }

    /// `StackRef <n>` — push a copy of the cell `n + 1` slots below the top.
    pub fn stack_ref(&mut self, n: u16) {
        if (1..=5).contains(&n) {
            self.emit_u8(op::STACK_REF1 + (n as u8 - 1));
        } else {
            self.emit_bw(op::STACK_REF_B, op::STACK_REF_W, n);
        }
    }

    /// `StackSet <n>` — pop the top and store it `n` slots further down.
    pub fn stack_set(&mut self, n: u16) {
        self.emit_bw(op::STACK_SET_B, op::STACK_SET_W, n);
    }

    // ── constants ──────────────────────────────────────────────────

    /// `Constant <idx>` — push constant pool entry `idx`.
    pub fn constant(&mut self, idx: u16) {
        if idx <= 63 {
            self.emit_u8(op::CONSTANT0 | idx as u8);
        } else {
            self.emit_u8(op::CONSTANT_W);
            self.emit_u16(idx);
        }
    }

    // ── constructors and arithmetic ────────────────────────────────

    /// `Cons` — pop cdr, pop car, push the new cons cell.
    pub fn cons(&mut self) {
        self.emit_u8(op::CONS);
    }

    /// `List <n:u8>` — pop `n` cells, push the list built from them.
    pub fn list(&mut self, n: u8) {
        self.emit_u8(op::LIST_B);
        self.emit_u8(n);
    }

    /// `Concat <n:u8>` — pop `n` strings, push their concatenation.
    pub fn concat(&mut self, n: u8) {
        self.emit_u8(op::CONCAT_B);
        self.emit_u8(n);
    }

    /// `Add1` — increment the top of stack.
    pub fn add1(&mut self) {
        self.emit_u8(op::ADD1);
    }

    // ── variable environment (reserved) ────────────────────────────

    pub fn var_ref(&mut self, idx: u16) {
        self.emit_bw(op::VAR_REF_B, op::VAR_REF_W, idx);
    }

    pub fn var_set(&mut self, idx: u16) {
        self.emit_bw(op::VAR_SET_B, op::VAR_SET_W, idx);
    }

    pub fn var_bind(&mut self, idx: u8) {
        self.emit_u8(op::VAR_BIND_B);
        self.emit_u8(idx);
    }

    pub fn unbind(&mut self, n: u16) {
        self.emit_bw(op::UNBIND_B, op::UNBIND_W, n);
    }

    // ── calls ──────────────────────────────────────────────────────

    /// `Call <argc>` — call through the symbol below the `argc` arguments.
    pub fn call(&mut self, argc: u16) {
        if argc <= 5 {
            self.emit_u8(op::CALL0 + argc as u8);
        } else {
            self.emit_bw(op::CALL_B, op::CALL_W, argc);
        }
    }

    /// `Return` — return to the calling frame.
    pub fn return_(&mut self) {
        self.emit_u8(op::RETURN);
    }

    /// `NativeCall <argc>` — call the native function designated by the
    /// symbol below the `argc` arguments.
    pub fn native_call(&mut self, argc: u16) {
        self.emit_u8(op::EXT);
        if argc <= 5 {
            self.emit_u8(ext::NATIVE_CALL0 + argc as u8);
        } else if argc <= u8::MAX as u16 {
            self.emit_u8(ext::NATIVE_CALL_B);
            self.emit_u8(argc as u8);
        } else {
            self.emit_u8(ext::NATIVE_CALL_W);
            self.emit_u16(argc);
        }
    }

    /// `Stop` — emit the two-byte stop trailer.
    pub fn stop(&mut self) {
        self.emit_u8(op::EXT);
        self.emit_u8(ext::STOP);
    }

    // ── branches ───────────────────────────────────────────────────

    /// Emit an unconditional forward branch. Returns a [`Label`] that must
    /// be resolved later with [`bind`](Self::bind).
    pub fn goto(&mut self) -> Label {
        self.emit_goto_placeholder(op::GOTO_W)
    }

    /// Forward branch taken when the popped cell is nil.
    pub fn goto_if_nil(&mut self) -> Label {
        self.emit_goto_placeholder(op::GOTO_IF_NIL_W)
    }

    /// Forward branch taken when the popped cell is not nil.
    pub fn goto_if_non_nil(&mut self) -> Label {
        self.emit_goto_placeholder(op::GOTO_IF_NON_NIL_W)
    }

    /// Forward branch that keeps a nil top of stack, popping otherwise.
    pub fn goto_if_nil_else_pop(&mut self) -> Label {
        self.emit_goto_placeholder(op::GOTO_IF_NIL_ELSE_POP_W)
    }

    /// Forward branch that keeps a non-nil top of stack, popping otherwise.
    pub fn goto_if_non_nil_else_pop(&mut self) -> Label {
        self.emit_goto_placeholder(op::GOTO_IF_NON_NIL_ELSE_POP_W)
    }

    /// Bind a forward branch label to the current position.
    pub fn bind(&mut self, label: Label) {
        let target = self.buf.len();
        debug_assert!(target <= u16::MAX as usize, "branch target overflows u16");
        self.buf[label.operand_pos..label.operand_pos + 2]
            .copy_from_slice(&(target as u16).to_le_bytes());
    }

    /// Emit an unconditional backward branch to `target` (a byte offset
    /// obtained from [`current_offset`](Self::current_offset)).
    pub fn goto_back(&mut self, target: usize) {
        debug_assert!(target <= u16::MAX as usize, "branch target overflows u16");
        self.emit_u8(op::GOTO_W);
        self.emit_u16(target as u16);
    }

    /// Emit an unconditional relative backward branch to `target`.
    pub fn rgoto_back(&mut self, target: usize) {
        self.emit_rgoto_back(op::RGOTO_B, target);
    }

    /// Relative backward branch taken when the popped cell is nil.
    pub fn rgoto_if_nil_back(&mut self, target: usize) {
        self.emit_rgoto_back(op::RGOTO_IF_NIL_B, target);
    }

    /// Relative backward branch taken when the popped cell is not nil.
    pub fn rgoto_if_non_nil_back(&mut self, target: usize) {
        self.emit_rgoto_back(op::RGOTO_IF_NON_NIL_B, target);
    }

    /// Relative backward branch that keeps a nil top, popping otherwise.
    pub fn rgoto_if_nil_else_pop_back(&mut self, target: usize) {
        self.emit_rgoto_back(op::RGOTO_IF_NIL_ELSE_POP_B, target);
    }

    /// Relative backward branch that keeps a non-nil top, popping otherwise.
    pub fn rgoto_if_non_nil_else_pop_back(&mut self, target: usize) {
        self.emit_rgoto_back(op::RGOTO_IF_NON_NIL_ELSE_POP_B, target);
    }

    fn emit_goto_placeholder(&mut self, opcode: u8) -> Label {
        self.emit_u8(opcode);
        let operand_pos = self.buf.len();
        self.emit_u16(0); // placeholder
        Label { operand_pos }
    }

    fn emit_rgoto_back(&mut self, opcode: u8, target: usize) {
        self.emit_u8(opcode);
        let base = self.buf.len() + 1;
        let offset = target as isize - base as isize;
        debug_assert!(
            i8::try_from(offset).is_ok(),
            "relative branch offset {offset} overflows i8"
        );
        self.emit_u8(offset as i8 as u8);
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
