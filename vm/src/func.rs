use bytecode::op;
use lisp::Value;

/// A compiled function: opcode bytes plus the constant pool they index.
///
/// Immutable once constructed. Published functions are shared as
/// `Arc<Func>` so any number of execution contexts can run them
/// concurrently; reentrancy follows from the absence of mutable state.
#[derive(Debug)]
pub struct Func {
    code: Box<[u8]>,
    consts: Box<[Value]>,
}

impl Func {
    pub fn new(code: Vec<u8>, consts: Vec<Value>) -> Self {
        Self {
            code: code.into_boxed_slice(),
            consts: consts.into_boxed_slice(),
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn consts(&self) -> &[Value] {
        &self.consts
    }

    /// Whether the body ends in the mandatory `{EXT, STOP}` bytes.
    /// A loader may reject functions that do not; the evaluator checks this
    /// on entry in safety-check mode.
    pub fn has_stop_trailer(&self) -> bool {
        self.code.len() >= 2 && self.code[self.code.len() - 2..] == op::STOP_TRAILER
    }
}
