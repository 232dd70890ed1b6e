mod context;
mod error;
mod eval;
mod func;
mod registry;

pub use context::{Context, DEFAULT_CALL_DEPTH, DEFAULT_STACK_SLOTS};
pub use error::{EvalError, NativeError};
pub use eval::eval;
pub use func::Func;
pub use registry::{NativeFn, Registry};
