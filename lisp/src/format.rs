use std::fmt::{self, Write};

use crate::Value;

/// Deterministic rendering used by tests and error diagnostics.
/// Output is not guaranteed to be prin1-compatible.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),

            Value::Float(x) => {
                let s = x.to_string();
                // Always provide a fractional part.
                if s.contains('.') {
                    f.write_str(&s)
                } else {
                    write!(f, "{s}.0")
                }
            }

            Value::Symbol(sym) => {
                if sym.name().is_empty() {
                    // Emacs Lisp notation for the empty symbol name.
                    f.write_str("##")
                } else {
                    f.write_str(sym.name())
                }
            }

            Value::Vector(vec) => write!(f, "[{}]", render_slice(&vec.elems)),

            Value::Cons(cell) => write!(f, "({} . {})", cell.car, cell.cdr),

            // Raw bytes between double quotes; embedded quotes pass through
            // verbatim, without escaping.
            Value::Str(s) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(&s.bytes))
            }
        }
    }
}

/// Renders all values and joins them with a single space.
pub fn render_slice(values: &[Value]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_values() {
        let tests: &[(Value, &str)] = &[
            (Value::int(0), "0"),
            (Value::int(64), "64"),
            (Value::int(-64), "-64"),
            (Value::float(0.0), "0.0"),
            (Value::float(64.0), "64.0"),
            (Value::float(-64.0), "-64.0"),
            (Value::float(0.55), "0.55"),
            (Value::float(64.55), "64.55"),
            (Value::float(-64.55), "-64.55"),
            (Value::symbol("nil"), "nil"),
            (Value::symbol(""), "##"),
            (Value::symbol("symbol-name"), "symbol-name"),
            (Value::vector(vec![]), "[]"),
            (
                Value::vector(vec![Value::int(1), Value::symbol("foo")]),
                "[1 foo]",
            ),
            (
                Value::vector(vec![
                    Value::float(0.4),
                    Value::vector(vec![Value::float(1.0)]),
                    Value::vector(vec![]),
                    Value::float(0.3),
                ]),
                "[0.4 [1.0] [] 0.3]",
            ),
            (
                Value::vector(vec![Value::vector(vec![Value::vector(vec![])])]),
                "[[[]]]",
            ),
        ];

        for (i, (value, want)) in tests.iter().enumerate() {
            assert_eq!(&value.to_string(), want, "test {i}");
        }
    }

    #[test]
    fn render_cons() {
        let pair = Value::cons(Value::int(1), Value::int(2));
        assert_eq!(pair.to_string(), "(1 . 2)");

        let list = Value::cons(
            Value::int(1),
            Value::cons(Value::symbol("two"), Value::nil()),
        );
        assert_eq!(list.to_string(), "(1 . (two . nil))");
    }

    #[test]
    fn render_strings() {
        assert_eq!(Value::string(*b"hello").to_string(), "\"hello\"");
        assert_eq!(Value::string(*b"").to_string(), "\"\"");
        // Embedded quotes come through verbatim.
        assert_eq!(Value::string(*b"a\"b").to_string(), "\"a\"b\"");
    }

    #[test]
    fn render_slice_joins_with_spaces() {
        assert_eq!(render_slice(&[]), "");
        let values = [Value::int(1), Value::float(2.5), Value::symbol("x")];
        assert_eq!(render_slice(&values), "1 2.5 x");
    }

    #[test]
    fn float_rendering_round_trips() {
        for x in [0.0f64, 0.5, -3.25, 1234.5678, 1e9] {
            let s = Value::float(x).to_string();
            assert!(s.contains('.'), "`{s}` misses fractional part");
            assert_eq!(s.parse::<f64>().unwrap(), x);
        }
    }
}
