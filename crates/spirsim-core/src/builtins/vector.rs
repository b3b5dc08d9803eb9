//! Vector data load/store and shuffles
//!
//! `vloadN(offset, p)` reads the N-lane vector at `p + offset * N` elements;
//! `vstoreN(data, offset, p)` is the mirror. The `_half` variants convert
//! through IEEE binary16, and the aligned `vloada_half`/`vstorea_half`
//! variants step three-lane vectors with a four-lane stride.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::fenv::{self, RoundingMode};
use crate::value::TypedValue;
use half::f16;

const HALF_SIZE: u64 = 2;

// ================================================================================================
// Plain Loads and Stores
// ================================================================================================

fn vload(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let offset = call.uint(0, 0)?;
    let address = call.element_address(1, offset, result.byte_len() as u64)?;
    call.memory_for(1)?.load(result.bytes_mut(), address)
}

fn vstore(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let data = call.value(0)?;
    let offset = call.uint(1, 0)?;
    let address = call.element_address(2, offset, data.byte_len() as u64)?;
    call.memory_for(2)?.store(data.bytes(), address)
}

// ================================================================================================
// Half Loads and Stores
// ================================================================================================

/// Bytes between consecutive vectors of `lanes` halves.
fn half_stride(name: &str, aligned_prefix: &str, lanes: usize) -> u64 {
    let lanes = if lanes == 3 && name.starts_with(aligned_prefix) {
        4
    } else {
        lanes as u64
    };
    lanes * HALF_SIZE
}

fn vload_half(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let offset = call.uint(0, 0)?;
    let lanes = result.num();
    let address = call.element_address(1, offset, half_stride(call.name(), "vloada", lanes))?;

    let mut halves = vec![0u16; lanes];
    call.memory_for(1)?.load(bytemuck::cast_slice_mut(&mut halves), address)?;
    for (i, bits) in halves.into_iter().enumerate() {
        result.set_float(i, f16::from_bits(bits).to_f64());
    }
    Ok(())
}

fn vstore_half(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    // The device rounds to nearest even unless the name asks otherwise.
    let mode = RoundingMode::from_name(call.name()).unwrap_or_default();
    let lanes = call.width(0)?;
    let halves = (0..lanes)
        .map(|i| Ok(fenv::to_half_bits(call.float(0, i)?, mode)))
        .collect::<Result<Vec<u16>>>()?;

    let offset = call.uint(1, 0)?;
    let address = call.element_address(2, offset, half_stride(call.name(), "vstorea", lanes))?;
    call.memory_for(2)?.store(bytemuck::cast_slice(&halves), address)
}

// ================================================================================================
// Shuffles
// ================================================================================================

fn shuffle(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let width = call.width(0)? as u64;
    for i in 0..result.num() {
        let index = call.uint(1, i)? % width;
        result.set_uint(i, call.uint(0, index as usize)?);
    }
    Ok(())
}

fn shuffle2(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let width = if call.is_vector(0) { call.width(0)? as u64 } else { 1 };
    for i in 0..result.num() {
        let index = call.uint(2, i)? % (2 * width);
        let lane = if index >= width {
            call.uint(1, (index - width) as usize)?
        } else {
            call.uint(0, index as usize)?
        };
        result.set_uint(i, lane);
    }
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("shuffle", Builtin::Call(shuffle));
    registry.add("shuffle2", Builtin::Call(shuffle2));

    registry.add_prefix("vload_half", Builtin::Call(vload_half));
    registry.add_prefix("vloada_half", Builtin::Call(vload_half));
    registry.add_prefix("vstore_half", Builtin::Call(vstore_half));
    registry.add_prefix("vstorea_half", Builtin::Call(vstore_half));
    registry.add_prefix("vload", Builtin::Call(vload));
    registry.add_prefix("vstore", Builtin::Call(vstore));
}
