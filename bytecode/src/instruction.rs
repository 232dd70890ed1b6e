use core::fmt;

/// A decoded instruction with all operands resolved to their widest types.
///
/// Operands are widened regardless of which encoding form carried them: a
/// `StackRef` decoded from the embedded, B-, or W-form opcode always holds a
/// `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Push a copy of the top of stack.
    Dup,
    /// Pop one cell.
    Discard,
    /// Pop `n` cells.
    DiscardN { n: u8 },
    /// Push a copy of the cell `n + 1` slots below the top.
    StackRef { n: u16 },
    /// Pop the top and store it `n` slots below the (pre-pop) top.
    StackSet { n: u16 },
    /// Push constant pool entry `idx`.
    Constant { idx: u16 },
    /// Unconditional absolute branch.
    Goto { target: u16 },
    /// Pop; branch when the popped cell is nil.
    GotoIfNil { target: u16 },
    /// Pop; branch when the popped cell is not nil.
    GotoIfNonNil { target: u16 },
    /// Branch and keep the top when it is nil; otherwise pop it.
    GotoIfNilElsePop { target: u16 },
    /// Branch and keep the top when it is not nil; otherwise pop it.
    GotoIfNonNilElsePop { target: u16 },
    /// Unconditional relative branch. The offset is measured from the end
    /// of the instruction.
    RGoto { offset: i8 },
    RGotoIfNil { offset: i8 },
    RGotoIfNonNil { offset: i8 },
    RGotoIfNilElsePop { offset: i8 },
    RGotoIfNonNilElsePop { offset: i8 },
    /// Call the compiled function designated by the symbol below the `argc`
    /// arguments.
    Call { argc: u16 },
    /// Return to the calling frame, replacing the callee symbol slot with
    /// the top of stack.
    Return,
    /// Pop cdr, pop car, push the new cons cell.
    Cons,
    /// Pop `n` cells, push the list built from them.
    List { n: u8 },
    /// Pop `n` strings, push their concatenation.
    Concat { n: u8 },
    /// Increment the top of stack.
    Add1,
    /// Reserved variable environment family.
    VarRef { idx: u16 },
    VarSet { idx: u16 },
    VarBind { idx: u8 },
    Unbind { n: u16 },
    /// Call the native function designated by the symbol below the `argc`
    /// arguments.
    NativeCall { argc: u16 },
    /// Terminate evaluation.
    Stop,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dup => write!(f, "Dup"),
            Self::Discard => write!(f, "Discard"),
            Self::DiscardN { n } => write!(f, "DiscardN {n}"),
            Self::StackRef { n } => write!(f, "StackRef {n}"),
            Self::StackSet { n } => write!(f, "StackSet {n}"),
            Self::Constant { idx } => write!(f, "Constant #{idx}"),
            Self::Goto { target } => write!(f, "Goto @{target}"),
            Self::GotoIfNil { target } => write!(f, "GotoIfNil @{target}"),
            Self::GotoIfNonNil { target } => {
                write!(f, "GotoIfNonNil @{target}")
            }
            Self::GotoIfNilElsePop { target } => {
                write!(f, "GotoIfNilElsePop @{target}")
            }
            Self::GotoIfNonNilElsePop { target } => {
                write!(f, "GotoIfNonNilElsePop @{target}")
            }
            Self::RGoto { offset } => write!(f, "RGoto {offset:+}"),
            Self::RGotoIfNil { offset } => write!(f, "RGotoIfNil {offset:+}"),
            Self::RGotoIfNonNil { offset } => {
                write!(f, "RGotoIfNonNil {offset:+}")
            }
            Self::RGotoIfNilElsePop { offset } => {
                write!(f, "RGotoIfNilElsePop {offset:+}")
            }
            Self::RGotoIfNonNilElsePop { offset } => {
                write!(f, "RGotoIfNonNilElsePop {offset:+}")
            }
            Self::Call { argc } => write!(f, "Call {argc}"),
            Self::Return => write!(f, "Return"),
            Self::Cons => write!(f, "Cons"),
            Self::List { n } => write!(f, "List {n}"),
            Self::Concat { n } => write!(f, "Concat {n}"),
            Self::Add1 => write!(f, "Add1"),
            Self::VarRef { idx } => write!(f, "VarRef #{idx}"),
            Self::VarSet { idx } => write!(f, "VarSet #{idx}"),
            Self::VarBind { idx } => write!(f, "VarBind #{idx}"),
            Self::Unbind { n } => write!(f, "Unbind {n}"),
            Self::NativeCall { argc } => write!(f, "NativeCall {argc}"),
            Self::Stop => write!(f, "Stop"),
        }
    }
}
