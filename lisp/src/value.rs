use std::sync::{Arc, LazyLock};

use crate::objects::{Cons, Str, Symbol, Vector};

// Distinguished immutable values. Falsiness is identity with NIL, so these
// must be allocated exactly once for the whole process.
static NIL: LazyLock<Value> = LazyLock::new(|| Value::symbol("nil"));
static T: LazyLock<Value> = LazyLock::new(|| Value::symbol("t"));

/// A universal Emacs Lisp value.
///
/// The set of runtime types is closed: Emacs Lisp has no way to define new
/// ones. Immediate payloads (`Int`, `Float`) live inline; everything else is
/// a shared heap cell behind an [`Arc`], which makes a `Value` cheap to clone
/// and safe to hand to another thread (constant pools are shared between
/// execution contexts).
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Symbol(Arc<Symbol>),
    Vector(Arc<Vector>),
    Cons(Arc<Cons>),
    Str(Arc<Str>),
}

impl Value {
    pub fn int(val: i64) -> Value {
        Value::Int(val)
    }

    pub fn float(val: f64) -> Value {
        Value::Float(val)
    }

    /// Returns a newly allocated uninterned symbol for the given name.
    /// Its function cell starts out unassigned.
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Arc::new(Symbol::new(name)))
    }

    pub fn vector(elems: Vec<Value>) -> Value {
        Value::Vector(Arc::new(Vector { elems }))
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Cons(Arc::new(Cons { car, cdr }))
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Str(Arc::new(Str {
            bytes: bytes.into(),
        }))
    }

    /// The `nil` symbol, the only false value in Emacs Lisp.
    pub fn nil() -> Value {
        NIL.clone()
    }

    /// The `t` symbol, the preferred truth value for predicates.
    pub fn t() -> Value {
        T.clone()
    }

    /// Maps a Rust boolean to the closest Emacs Lisp equivalent.
    pub fn bool(x: bool) -> Value {
        if x {
            Value::t()
        } else {
            Value::nil()
        }
    }

    /// Only true for the distinguished `nil` symbol. An uninterned symbol
    /// that happens to be named "nil" is not nil.
    pub fn is_nil(&self) -> bool {
        match (self, &*NIL) {
            (Value::Symbol(a), Value::Symbol(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Symbol(_) => "symbol",
            Value::Vector(_) => "vector",
            Value::Cons(_) => "cons",
            Value::Str(_) => "string",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Arc<Symbol>> {
        match self {
            Value::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Arc<Vector>> {
        match self {
            Value::Vector(vec) => Some(vec),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<&Arc<Cons>> {
        match self {
            Value::Cons(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Arc<Str>> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `eq` identity: structural comparison for the immediate payloads,
/// referential comparison for heap cells. Two ints with the same value are
/// eq; two conses are eq only if they are the same cell.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => Arc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Arc::ptr_eq(a, b),
            (Value::Cons(a), Value::Cons(b)) => Arc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
