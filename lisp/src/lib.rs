mod format;
mod objects;
mod value;

pub use format::render_slice;
pub use objects::{Cons, Str, Symbol, Vector};
pub use value::Value;
