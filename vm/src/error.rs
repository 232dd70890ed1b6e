use core::fmt;

use lisp::Value;

/// An error reported by a native function.
///
/// Carries only a message; the evaluator wraps it into
/// [`EvalError::Native`] and unwinds, which is the throw-like effect the
/// language-level binding layer builds on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    message: String,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for NativeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for NativeError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NativeError {}

/// Why an evaluation run failed.
///
/// Normal termination is not an error: `eval` returns `Ok` with the final
/// stack pointer when it reaches the stop trailer. Everything here is fatal
/// for the current run; the execution context stays memory-safe and can be
/// reused from a fresh stack pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The function body misses the trailing stop bytes.
    MissingStopByte,
    /// An unassigned (or reserved) opcode byte was about to be evaluated.
    BadOpcode { pc: usize, op: u8 },
    /// An instruction fetch ran past the end of the body.
    TruncatedCode { pc: usize },
    /// A branch target outside the body.
    BadJump { pc: usize, target: i64 },
    /// A constant pool index outside the pool.
    BadConstant { pc: usize, idx: usize },
    /// No free data stack slot left.
    StackOverflow,
    /// An operation needed more operands than the stack holds.
    StackUnderflow { pc: usize },
    /// The call depth exceeded the frame stack capacity.
    FrameOverflow,
    /// An operand had the wrong dynamic type.
    TypeError {
        pc: usize,
        expected: &'static str,
        got: Value,
    },
    /// A call through a symbol whose function cell designates no compiled
    /// function.
    UnboundFunction { name: String },
    /// A native call through a symbol whose function cell designates no
    /// native function.
    UnboundNative { name: String },
    /// A native function signalled an error.
    Native(NativeError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStopByte => {
                write!(f, "code misses the trailing stop bytes")
            }
            Self::BadOpcode { pc, op } => {
                write!(f, "unexpected opcode 0x{op:02x} at pc={pc}")
            }
            Self::TruncatedCode { pc } => {
                write!(f, "code truncated at pc={pc}")
            }
            Self::BadJump { pc, target } => {
                write!(f, "branch at pc={pc} to invalid target {target}")
            }
            Self::BadConstant { pc, idx } => {
                write!(f, "constant index {idx} out of range at pc={pc}")
            }
            Self::StackOverflow => write!(f, "data stack overflow"),
            Self::StackUnderflow { pc } => {
                write!(f, "data stack underflow at pc={pc}")
            }
            Self::FrameOverflow => write!(f, "call depth limit exceeded"),
            Self::TypeError { pc, expected, got } => {
                write!(
                    f,
                    "expected {expected}, got {} at pc={pc}",
                    got.type_name()
                )
            }
            Self::UnboundFunction { name } => {
                write!(f, "`{name}` designates no function")
            }
            Self::UnboundNative { name } => {
                write!(f, "`{name}` designates no native function")
            }
            Self::Native(err) => write!(f, "native function failed: {err}"),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Native(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NativeError> for EvalError {
    fn from(err: NativeError) -> Self {
        Self::Native(err)
    }
}
