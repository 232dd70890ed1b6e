use std::sync::Arc;

use bytecode::op::{self, ext};
use lisp::Value;

use crate::context::{Context, Frame};
use crate::error::EvalError;
use crate::func::Func;
use crate::registry::Registry;

/// Entry assertions that valid code never trips. Checked once per run, so
/// they stay on in release builds.
const SAFETY_CHECK: bool = true;

/// What an extended instruction asks the main loop to do next.
enum ExtFlow {
    Continue { sp: usize },
    Stop,
}

/// Runs `entry` starting at offset 0 with stack pointer `sp` (the first
/// free slot of the context's data stack).
///
/// Returns the stack pointer at normal termination, i.e. when control
/// reaches the stop trailer that every well-formed body ends with. Any
/// [`EvalError`] is fatal for the run; the context stays memory-safe and
/// can be reused from a fresh stack pointer.
pub fn eval(
    ctx: &mut Context,
    entry: &Arc<Func>,
    sp: usize,
) -> Result<usize, EvalError> {
    let _span = tracing::trace_span!(
        "eval",
        sp,
        code_len = entry.code().len()
    )
    .entered();

    let stack = &mut *ctx.stack;
    let frames = &mut ctx.frames;
    let max_call_depth = ctx.max_call_depth;
    let registry = &*ctx.registry;

    if sp > stack.len() {
        return Err(EvalError::StackOverflow);
    }
    if SAFETY_CHECK && !entry.has_stop_trailer() {
        return Err(EvalError::MissingStopByte);
    }

    // The zero frame points at the stop trailer, so a Return executed at
    // the outermost activation terminates the run instead of unwinding
    // into a caller that does not exist.
    frames.clear();
    frames.push(Frame {
        pc: entry.code().len().saturating_sub(2),
        fp: 0,
        func: entry.clone(),
    });

    let mut fun = entry.clone();
    let mut sp = sp;
    let mut pc = 0usize;

    loop {
        let opcode = fetch_byte(fun.code(), pc)?;
        match opcode {
            op::EXT => {
                match eval_ext(registry, stack, sp, fun.code(), pc + 1)? {
                    ExtFlow::Stop => return Ok(sp),
                    ExtFlow::Continue { sp: new_sp } => {
                        sp = new_sp;
                        let ext_op = fun.code()[pc + 1];
                        pc += op::EXT_WIDTH[ext_op as usize] as usize;
                    }
                }
            }

            op::DUP => {
                let value = ref_below_top(stack, sp, 0, pc)?;
                sp = push(stack, sp, value)?;
                pc += 1;
            }

            op::DISCARD => {
                sp = drop_cells(sp, 1, pc)?;
                pc += 1;
            }
            op::DISCARD_B => {
                let n = fetch_b(fun.code(), pc)?;
                sp = drop_cells(sp, n, pc)?;
                pc += 2;
            }

            op::STACK_REF1..=op::STACK_REF5 => {
                let value = ref_below_top(stack, sp, opcode as usize, pc)?;
                sp = push(stack, sp, value)?;
                pc += 1;
            }
            op::STACK_REF_B => {
                let n = fetch_b(fun.code(), pc)?;
                let value = ref_below_top(stack, sp, n, pc)?;
                sp = push(stack, sp, value)?;
                pc += 2;
            }
            op::STACK_REF_W => {
                let n = fetch_w(fun.code(), pc)?;
                let value = ref_below_top(stack, sp, n, pc)?;
                sp = push(stack, sp, value)?;
                pc += 3;
            }

            op::STACK_SET_B => {
                let n = fetch_b(fun.code(), pc)?;
                sp = stack_set(stack, sp, n, pc)?;
                pc += 2;
            }
            op::STACK_SET_W => {
                let n = fetch_w(fun.code(), pc)?;
                sp = stack_set(stack, sp, n, pc)?;
                pc += 3;
            }

            op::CONSTANT_W => {
                let idx = fetch_w(fun.code(), pc)?;
                let value = fetch_const(fun.consts(), idx, pc)?;
                sp = push(stack, sp, value)?;
                pc += 3;
            }
            op::CONSTANT0..=u8::MAX => {
                let idx = (opcode - op::CONSTANT0) as usize;
                let value = fetch_const(fun.consts(), idx, pc)?;
                sp = push(stack, sp, value)?;
                pc += 1;
            }

            op::GOTO_W => {
                pc = fetch_w(fun.code(), pc)?;
            }
            op::GOTO_IF_NIL_W => {
                sp = drop_cells(sp, 1, pc)?;
                if stack[sp].is_nil() {
                    pc = fetch_w(fun.code(), pc)?;
                } else {
                    pc += 3;
                }
            }
            op::GOTO_IF_NON_NIL_W => {
                sp = drop_cells(sp, 1, pc)?;
                if stack[sp].is_nil() {
                    pc += 3;
                } else {
                    pc = fetch_w(fun.code(), pc)?;
                }
            }
            op::GOTO_IF_NIL_ELSE_POP_W => {
                if top_is_nil(stack, sp, pc)? {
                    pc = fetch_w(fun.code(), pc)?;
                } else {
                    sp -= 1;
                    pc += 3;
                }
            }
            op::GOTO_IF_NON_NIL_ELSE_POP_W => {
                if top_is_nil(stack, sp, pc)? {
                    sp -= 1;
                    pc += 3;
                } else {
                    pc = fetch_w(fun.code(), pc)?;
                }
            }

            op::RGOTO_B => {
                pc = rel_target(fun.code(), pc)?;
            }
            op::RGOTO_IF_NIL_B => {
                sp = drop_cells(sp, 1, pc)?;
                if stack[sp].is_nil() {
                    pc = rel_target(fun.code(), pc)?;
                } else {
                    pc += 2;
                }
            }
            op::RGOTO_IF_NON_NIL_B => {
                sp = drop_cells(sp, 1, pc)?;
                if stack[sp].is_nil() {
                    pc += 2;
                } else {
                    pc = rel_target(fun.code(), pc)?;
                }
            }
            op::RGOTO_IF_NIL_ELSE_POP_B => {
                if top_is_nil(stack, sp, pc)? {
                    pc = rel_target(fun.code(), pc)?;
                } else {
                    sp -= 1;
                    pc += 2;
                }
            }
            op::RGOTO_IF_NON_NIL_ELSE_POP_B => {
                if top_is_nil(stack, sp, pc)? {
                    sp -= 1;
                    pc += 2;
                } else {
                    pc = rel_target(fun.code(), pc)?;
                }
            }

            op::CALL0..=op::CALL5 => {
                let argc = (opcode - op::CALL0) as usize;
                fun = enter_call(
                    registry,
                    frames,
                    stack,
                    sp,
                    argc,
                    pc,
                    fun,
                    max_call_depth,
                )?;
                pc = 0;
            }
            op::CALL_B => {
                let argc = fetch_b(fun.code(), pc)?;
                fun = enter_call(
                    registry,
                    frames,
                    stack,
                    sp,
                    argc,
                    pc + 1,
                    fun,
                    max_call_depth,
                )?;
                pc = 0;
            }
            op::CALL_W => {
                let argc = fetch_w(fun.code(), pc)?;
                fun = enter_call(
                    registry,
                    frames,
                    stack,
                    sp,
                    argc,
                    pc + 2,
                    fun,
                    max_call_depth,
                )?;
                pc = 0;
            }

            op::RETURN => {
                let frame =
                    frames.pop().expect("running loop always holds a frame");
                if frames.is_empty() {
                    // Outermost return: control transfers to the stop
                    // trailer, terminating the run.
                    return Ok(sp);
                }
                if sp == 0 {
                    return Err(EvalError::StackUnderflow { pc });
                }
                // The return value replaces the callee symbol slot.
                stack[frame.fp - 1] = stack[sp - 1].clone();
                sp = frame.fp;
                fun = frame.func;
                pc = frame.pc + 1;
            }

            op::CONS => {
                if sp < 2 {
                    return Err(EvalError::StackUnderflow { pc });
                }
                let cdr = stack[sp - 1].clone();
                let car = stack[sp - 2].clone();
                stack[sp - 2] = Value::cons(car, cdr);
                sp -= 1;
                pc += 1;
            }

            op::LIST_B => {
                let n = fetch_b(fun.code(), pc)?;
                if n > sp {
                    return Err(EvalError::StackUnderflow { pc });
                }
                let mut list = Value::nil();
                for value in stack[sp - n..sp].iter().rev() {
                    list = Value::cons(value.clone(), list);
                }
                sp -= n;
                sp = push(stack, sp, list)?;
                pc += 2;
            }

            op::CONCAT_B => {
                let n = fetch_b(fun.code(), pc)?;
                if n > sp {
                    return Err(EvalError::StackUnderflow { pc });
                }
                let mut bytes = Vec::new();
                for value in &stack[sp - n..sp] {
                    match value {
                        Value::Str(s) => bytes.extend_from_slice(&s.bytes),
                        other => {
                            return Err(EvalError::TypeError {
                                pc,
                                expected: "string",
                                got: other.clone(),
                            })
                        }
                    }
                }
                sp -= n;
                sp = push(stack, sp, Value::string(bytes))?;
                pc += 2;
            }

            op::ADD1 => {
                if sp == 0 {
                    return Err(EvalError::StackUnderflow { pc });
                }
                match &mut stack[sp - 1] {
                    Value::Int(n) => *n = n.wrapping_add(1),
                    Value::Float(x) => *x += 1.0,
                    // Non-numeric cells are left untouched.
                    _ => {}
                }
                pc += 1;
            }

            // Everything unassigned, including the reserved variable
            // environment family.
            _ => return Err(EvalError::BadOpcode { pc, op: opcode }),
        }
    }
}

/// Runs the single instruction selected by the byte after the [`op::EXT`]
/// prefix. Kept out of the main loop to preserve the code density of the
/// opcodes that execute more frequently.
fn eval_ext(
    registry: &Registry,
    stack: &mut [Value],
    sp: usize,
    code: &[u8],
    ext_pc: usize,
) -> Result<ExtFlow, EvalError> {
    let ext_op = fetch_byte(code, ext_pc)?;
    match ext_op {
        ext::STOP => Ok(ExtFlow::Stop),

        ext::NATIVE_CALL0..=ext::NATIVE_CALL5 => {
            let argc = (ext_op - ext::NATIVE_CALL0) as usize;
            let sp = native_call(registry, stack, sp, argc, ext_pc)?;
            Ok(ExtFlow::Continue { sp })
        }
        ext::NATIVE_CALL_B => {
            let argc = fetch_b(code, ext_pc)?;
            let sp = native_call(registry, stack, sp, argc, ext_pc)?;
            Ok(ExtFlow::Continue { sp })
        }
        ext::NATIVE_CALL_W => {
            let argc = fetch_w(code, ext_pc)?;
            let sp = native_call(registry, stack, sp, argc, ext_pc)?;
            Ok(ExtFlow::Continue { sp })
        }

        _ => Err(EvalError::BadOpcode {
            pc: ext_pc,
            op: ext_op,
        }),
    }
}

/// Invokes the native function designated by the symbol sitting below the
/// `argc` arguments. The native receives the window `stack[base..sp]` with
/// the symbol in slot 0; on success the arguments are consumed and the
/// symbol slot holds whatever the native left there.
fn native_call(
    registry: &Registry,
    stack: &mut [Value],
    sp: usize,
    argc: usize,
    pc: usize,
) -> Result<usize, EvalError> {
    let base = sp
        .checked_sub(argc + 1)
        .ok_or(EvalError::StackUnderflow { pc })?;
    let fsym = match &stack[base] {
        Value::Symbol(sym) => sym.clone(),
        other => {
            return Err(EvalError::TypeError {
                pc,
                expected: "symbol",
                got: other.clone(),
            })
        }
    };

    let native = registry.native(fsym.func_id()).ok_or_else(|| {
        EvalError::UnboundNative {
            name: fsym.name().to_string(),
        }
    })?;

    native(&mut stack[base..sp]).map_err(|err| {
        tracing::trace!(target: "eval", "native `{}` failed: {}", fsym.name(), err);
        EvalError::Native(err)
    })?;

    Ok(sp - argc)
}

/// Records the caller into a fresh frame and resolves the callee function.
/// `resume_pc` must address the last byte of the call instruction; the
/// uniform return rule resumes at `resume_pc + 1`.
#[allow(clippy::too_many_arguments)]
fn enter_call(
    registry: &Registry,
    frames: &mut Vec<Frame>,
    stack: &[Value],
    sp: usize,
    argc: usize,
    resume_pc: usize,
    caller: Arc<Func>,
    max_call_depth: usize,
) -> Result<Arc<Func>, EvalError> {
    let sym_slot = sp
        .checked_sub(argc + 1)
        .ok_or(EvalError::StackUnderflow { pc: resume_pc })?;
    let fsym = match &stack[sym_slot] {
        Value::Symbol(sym) => sym.clone(),
        other => {
            return Err(EvalError::TypeError {
                pc: resume_pc,
                expected: "symbol",
                got: other.clone(),
            })
        }
    };

    let callee = registry.func(fsym.func_id()).ok_or_else(|| {
        EvalError::UnboundFunction {
            name: fsym.name().to_string(),
        }
    })?;

    if frames.len() >= max_call_depth {
        return Err(EvalError::FrameOverflow);
    }
    frames.push(Frame {
        pc: resume_pc,
        fp: sp - argc,
        func: caller,
    });
    Ok(callee)
}

#[inline]
fn fetch_byte(code: &[u8], at: usize) -> Result<u8, EvalError> {
    code.get(at)
        .copied()
        .ok_or(EvalError::TruncatedCode { pc: at })
}

/// Returns the 8-bit instruction argument at offset `pc`.
#[inline]
fn fetch_b(code: &[u8], pc: usize) -> Result<usize, EvalError> {
    Ok(fetch_byte(code, pc + 1)? as usize)
}

/// Returns the 16-bit little-endian instruction argument at offset `pc`.
#[inline]
fn fetch_w(code: &[u8], pc: usize) -> Result<usize, EvalError> {
    let lo = fetch_byte(code, pc + 1)?;
    let hi = fetch_byte(code, pc + 2)?;
    Ok(u16::from_le_bytes([lo, hi]) as usize)
}

#[inline]
fn fetch_const(
    consts: &[Value],
    idx: usize,
    pc: usize,
) -> Result<Value, EvalError> {
    consts
        .get(idx)
        .cloned()
        .ok_or(EvalError::BadConstant { pc, idx })
}

/// Target of a relative branch: signed 8-bit offset from the end of the
/// two-byte instruction.
#[inline]
fn rel_target(code: &[u8], pc: usize) -> Result<usize, EvalError> {
    let offset = fetch_byte(code, pc + 1)? as i8;
    let target = pc as i64 + 2 + offset as i64;
    if target < 0 {
        return Err(EvalError::BadJump { pc, target });
    }
    Ok(target as usize)
}

#[inline]
fn push(
    stack: &mut [Value],
    sp: usize,
    value: Value,
) -> Result<usize, EvalError> {
    match stack.get_mut(sp) {
        Some(slot) => {
            *slot = value;
            Ok(sp + 1)
        }
        None => Err(EvalError::StackOverflow),
    }
}

/// Copy of the cell `n` slots below the top of stack (`n = 0` is the top).
#[inline]
fn ref_below_top(
    stack: &[Value],
    sp: usize,
    n: usize,
    pc: usize,
) -> Result<Value, EvalError> {
    let at = sp
        .checked_sub(n + 1)
        .ok_or(EvalError::StackUnderflow { pc })?;
    Ok(stack[at].clone())
}

#[inline]
fn drop_cells(sp: usize, n: usize, pc: usize) -> Result<usize, EvalError> {
    sp.checked_sub(n).ok_or(EvalError::StackUnderflow { pc })
}

/// Pop the top and store it `n` slots below the pre-pop top.
#[inline]
fn stack_set(
    stack: &mut [Value],
    sp: usize,
    n: usize,
    pc: usize,
) -> Result<usize, EvalError> {
    if n + 1 > sp {
        return Err(EvalError::StackUnderflow { pc });
    }
    stack[sp - 1 - n] = stack[sp - 1].clone();
    Ok(sp - 1)
}

#[inline]
fn top_is_nil(
    stack: &[Value],
    sp: usize,
    pc: usize,
) -> Result<bool, EvalError> {
    if sp == 0 {
        return Err(EvalError::StackUnderflow { pc });
    }
    Ok(stack[sp - 1].is_nil())
}
