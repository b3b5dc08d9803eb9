//! LLVM intrinsics that reach the builtin layer
//!
//! `llvm.memcpy.*`, `llvm.memset.*` and `llvm.fmuladd.*` are matched by
//! prefix since their names carry the operand types. Lifetime markers and
//! debug-info intrinsics carry no runtime behaviour.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::{Result, SimError};
use crate::memory::Memory;
use crate::value::TypedValue;
use tracing::error;

/// `llvm.memcpy(dest, src, len, ...)`.
fn memcpy(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let dest = call.pointer(0)?;
    let src = call.pointer(1)?;
    let size = call.uint(2, 0)?;
    Memory::copy_between(call.memory_for(0)?, dest, call.memory_for(1)?, src, size)
}

/// `llvm.memset(dest, value, len, ...)`.
fn memset(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let dest = call.pointer(0)?;
    let value = call.uint(1, 0)? as u8;
    let size = call.uint(2, 0)?;
    call.memory_for(0)?.fill(value, dest, size)
}

fn no_op(_call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    Ok(())
}

fn trap(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    error!(global_id = ?call.geometry().global_id, "trap instruction reached");
    Err(SimError::Trap)
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("llvm.dbg.declare", Builtin::Call(no_op));
    registry.add("llvm.dbg.value", Builtin::Call(no_op));
    registry.add("llvm.lifetime.start", Builtin::Call(no_op));
    registry.add("llvm.lifetime.end", Builtin::Call(no_op));
    registry.add("llvm.trap", Builtin::Call(trap));

    registry.add_prefix("llvm.memcpy", Builtin::Call(memcpy));
    registry.add_prefix("llvm.memset", Builtin::Call(memset));
    registry.add_prefix("llvm.fmuladd", Builtin::F3(f64::mul_add));
}
