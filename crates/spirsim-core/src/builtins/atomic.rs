//! `atomic_*` / `atom_*` builtins
//!
//! Each builtin performs one 32-bit read-modify-write on the memory the
//! pointer argument refers to and returns the previous value. Unaligned
//! addresses are logged as errors and the operation still runs.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::{Result, SimError};
use crate::memory::Memory;
use crate::value::TypedValue;
use tracing::error;

type Rmw = fn(&Memory, u64, u32) -> Result<u32>;

fn checked_address(call: &Call<'_>) -> Result<u64> {
    let address = call.pointer(0)?;
    if address & 0x3 != 0 {
        let err = SimError::MisalignedAtomic { address, size: 4 };
        error!(builtin = call.name(), error = %err, "unaligned address on atomic operation");
    }
    Ok(address)
}

fn rmw(call: &Call<'_>, result: &mut TypedValue, op: Rmw) -> Result<()> {
    let address = checked_address(call)?;
    let value = call.uint(1, 0)? as u32;
    let old = op(call.memory_for(0)?, address, value)?;
    result.set_uint(0, old as u64);
    Ok(())
}

fn atomic_add(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_add)
}

fn atomic_and(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_and)
}

fn atomic_max(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_max)
}

fn atomic_min(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_min)
}

fn atomic_or(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_or)
}

fn atomic_sub(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_sub)
}

fn atomic_xchg(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_xchg)
}

fn atomic_xor(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    rmw(call, result, Memory::atomic_xor)
}

fn atomic_inc(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let address = checked_address(call)?;
    let old = call.memory_for(0)?.atomic_inc(address)?;
    result.set_uint(0, old as u64);
    Ok(())
}

fn atomic_dec(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let address = checked_address(call)?;
    let old = call.memory_for(0)?.atomic_dec(address)?;
    result.set_uint(0, old as u64);
    Ok(())
}

fn atomic_cmpxchg(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let address = checked_address(call)?;
    let compare = call.uint(1, 0)? as u32;
    let value = call.uint(2, 0)? as u32;
    let old = call.memory_for(0)?.atomic_cmpxchg(address, compare, value)?;
    result.set_uint(0, old as u64);
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    let table: [(&'static str, &'static str, super::registry::Handler); 11] = [
        ("atom_add", "atomic_add", atomic_add),
        ("atom_and", "atomic_and", atomic_and),
        ("atom_cmpxchg", "atomic_cmpxchg", atomic_cmpxchg),
        ("atom_dec", "atomic_dec", atomic_dec),
        ("atom_inc", "atomic_inc", atomic_inc),
        ("atom_max", "atomic_max", atomic_max),
        ("atom_min", "atomic_min", atomic_min),
        ("atom_or", "atomic_or", atomic_or),
        ("atom_sub", "atomic_sub", atomic_sub),
        ("atom_xchg", "atomic_xchg", atomic_xchg),
        ("atom_xor", "atomic_xor", atomic_xor),
    ];
    for (legacy, name, handler) in table {
        registry.add(legacy, Builtin::Call(handler));
        registry.add(name, Builtin::Call(handler));
    }
}
