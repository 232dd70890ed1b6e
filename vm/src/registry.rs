use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use lisp::{Symbol, Value};
use parking_lot::RwLock;

use crate::error::NativeError;
use crate::func::Func;

/// A function implemented outside the bytecode world, callable through the
/// native-call opcode family.
///
/// The slice argument is a borrowed window into the calling context's data
/// stack: slot 0 holds the symbol the call went through, slots `1..` the
/// positional arguments. The result must be placed in slot 0; if slot 0 is
/// left untouched the caller gets the symbol itself back. Assign nil
/// explicitly when conventional void-like behavior is desired.
///
/// Returning an error triggers a throw-like unwind of the whole evaluation
/// run. The window must not be retained beyond the call, which the borrow
/// already enforces.
pub type NativeFn =
    Arc<dyn Fn(&mut [Value]) -> Result<(), NativeError> + Send + Sync>;

struct Tables {
    funcs: Vec<Arc<Func>>,
    natives: Vec<NativeFn>,
    symbols: HashMap<String, Value, RandomState>,
}

/// The shared registry: append-only tables of compiled functions and native
/// functions, plus the name-to-symbol map built up by registration.
///
/// One registry is shared by any number of execution contexts via `Arc`.
/// The tables sit behind a reader/writer lock, so registration is allowed
/// while other threads evaluate; lookups clone `Arc` handles out and never
/// hold the lock across a call. Entries are immutable once published.
///
/// Index 0 of both tables is reserved as "unassigned" so that the function
/// cell of a fresh symbol never designates anything.
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        let reserved: NativeFn =
            Arc::new(|_| Err(NativeError::new("call through unassigned slot")));
        Self {
            tables: RwLock::new(Tables {
                funcs: vec![Arc::new(Func::new(Vec::new(), Vec::new()))],
                natives: vec![reserved],
                symbols: HashMap::default(),
            }),
        }
    }

    /// Binds `name` to a compiled function and returns the fresh symbol
    /// whose function cell designates it.
    ///
    /// Panics if `name` is already registered.
    pub fn register_func(&self, name: &str, func: Func) -> Value {
        let mut tables = self.tables.write();
        assert!(
            !tables.symbols.contains_key(name),
            "`{name}` is already registered"
        );

        let id = tables.funcs.len() as u32;
        tables.funcs.push(Arc::new(func));
        let sym = self.new_bound_symbol(&mut tables, name, id);
        tracing::debug!(target: "registry", "bound `{}` to function #{}", name, id);
        sym
    }

    /// Binds `name` to a native function and returns the fresh symbol whose
    /// function cell designates it.
    ///
    /// Panics if `name` is already registered.
    pub fn register_native(
        &self,
        name: &str,
        native: impl Fn(&mut [Value]) -> Result<(), NativeError> + Send + Sync + 'static,
    ) -> Value {
        let mut tables = self.tables.write();
        assert!(
            !tables.symbols.contains_key(name),
            "`{name}` is already registered"
        );

        let id = tables.natives.len() as u32;
        tables.natives.push(Arc::new(native));
        let sym = self.new_bound_symbol(&mut tables, name, id);
        tracing::debug!(target: "registry", "bound `{}` to native #{}", name, id);
        sym
    }

    /// Returns the symbol registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.tables.read().symbols.get(name).cloned()
    }

    /// Resolves a compiled function by its table index. Index 0 and
    /// out-of-range indices resolve to nothing.
    pub fn func(&self, id: u32) -> Option<Arc<Func>> {
        if id == 0 {
            return None;
        }
        self.tables.read().funcs.get(id as usize).cloned()
    }

    /// Resolves a native function by its table index. Index 0 and
    /// out-of-range indices resolve to nothing.
    pub fn native(&self, id: u32) -> Option<NativeFn> {
        if id == 0 {
            return None;
        }
        self.tables.read().natives.get(id as usize).cloned()
    }

    fn new_bound_symbol(&self, tables: &mut Tables, name: &str, id: u32) -> Value {
        let sym = Symbol::new(name);
        sym.bind_func(id);
        let value = Value::Symbol(Arc::new(sym));
        tables.symbols.insert(name.to_string(), value.clone());
        value
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::op;

    fn trailer_func() -> Func {
        Func::new(op::STOP_TRAILER.to_vec(), vec![])
    }

    #[test]
    fn ids_start_at_one() {
        let registry = Registry::new();
        let f = registry.register_func("f", trailer_func());
        let g = registry.register_func("g", trailer_func());
        assert_eq!(f.as_symbol().unwrap().func_id(), 1);
        assert_eq!(g.as_symbol().unwrap().func_id(), 2);

        let n = registry.register_native("n", |_| Ok(()));
        assert_eq!(n.as_symbol().unwrap().func_id(), 1);
    }

    #[test]
    fn lookup_returns_the_registered_symbol() {
        let registry = Registry::new();
        let f = registry.register_func("f", trailer_func());
        assert_eq!(registry.lookup("f"), Some(f));
        assert_eq!(registry.lookup("missing"), None);
    }

    #[test]
    fn unassigned_slots_resolve_to_nothing() {
        let registry = Registry::new();
        assert!(registry.func(0).is_none());
        assert!(registry.func(7).is_none());
        assert!(registry.native(0).is_none());
        assert!(registry.native(7).is_none());
    }

    #[test]
    fn resolves_registered_entries() {
        let registry = Registry::new();
        let f = registry.register_func("f", trailer_func());
        let id = f.as_symbol().unwrap().func_id();
        assert!(registry.func(id).is_some());

        let n = registry.register_native("n", |_| Ok(()));
        let id = n.as_symbol().unwrap().func_id();
        assert!(registry.native(id).is_some());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_name_fails_fast() {
        let registry = Registry::new();
        registry.register_func("f", trailer_func());
        registry.register_func("f", trailer_func());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_name_across_tables_fails_fast() {
        let registry = Registry::new();
        registry.register_func("f", trailer_func());
        registry.register_native("f", |_| Ok(()));
    }
}
