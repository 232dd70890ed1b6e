use std::sync::atomic::{AtomicU32, Ordering};

use crate::Value;

/// A symbol: a named cell that can designate a function.
///
/// Symbols are interned by the host; the runtime itself never interns and
/// only consults the fields. The function cell holds an index into one of
/// the shared registry's tables — which table depends on the opcode that
/// performs the call.
#[derive(Debug)]
pub struct Symbol {
    name: Box<str>,
    func_id: AtomicU32,
}

impl Symbol {
    /// Function cell value of a symbol that designates no function.
    /// Slot 0 of the registry tables is reserved so that this is never a
    /// valid index.
    pub const UNASSIGNED: u32 = 0;

    pub fn new(name: &str) -> Symbol {
        Symbol {
            name: name.into(),
            func_id: AtomicU32::new(Self::UNASSIGNED),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn func_id(&self) -> u32 {
        self.func_id.load(Ordering::Relaxed)
    }

    /// Binds the function cell. The cell is write-once: it is assigned at
    /// registration time and read-only afterwards.
    ///
    /// Panics if the cell is already bound.
    pub fn bind_func(&self, id: u32) {
        let prev = self.func_id.swap(id, Ordering::Relaxed);
        assert_eq!(
            prev,
            Self::UNASSIGNED,
            "function cell of `{}` is already bound",
            self.name
        );
    }
}

/// A Lisp-y pair. Car is the head of a list, cdr the tail.
#[derive(Debug)]
pub struct Cons {
    pub car: Value,
    pub cdr: Value,
}

/// A fixed-size array of values.
#[derive(Debug)]
pub struct Vector {
    pub elems: Vec<Value>,
}

/// Like [`Vector`], but stores raw bytes instead of arbitrary values.
/// The runtime never interprets the encoding.
#[derive(Debug)]
pub struct Str {
    pub bytes: Vec<u8>,
}
