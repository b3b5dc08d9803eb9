//! Work-item functions: ids, sizes and dimensions of the NDRange

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::value::TypedValue;
use crate::workitem::WorkItemGeometry;

/// Answer a per-dimension query; dimensions past 2 read as 0.
fn dimension_query(
    call: &Call<'_>,
    result: &mut TypedValue,
    field: fn(&WorkItemGeometry) -> [u64; 3],
) -> Result<()> {
    let dim = call.uint(0, 0)?;
    let value = usize::try_from(dim)
        .ok()
        .and_then(|dim| field(call.geometry()).get(dim).copied())
        .unwrap_or(0);
    result.set_uint(0, value);
    Ok(())
}

fn get_global_id(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.global_id)
}

fn get_global_size(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.global_size)
}

fn get_global_offset(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.global_offset)
}

fn get_group_id(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.group_id)
}

fn get_local_id(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.local_id)
}

fn get_local_size(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.local_size)
}

fn get_num_groups(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    dimension_query(call, result, |g| g.num_groups)
}

fn get_work_dim(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_uint(0, call.geometry().work_dim as u64);
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("get_global_id", Builtin::Call(get_global_id));
    registry.add("get_global_size", Builtin::Call(get_global_size));
    registry.add("get_global_offset", Builtin::Call(get_global_offset));
    registry.add("get_group_id", Builtin::Call(get_group_id));
    registry.add("get_local_id", Builtin::Call(get_local_id));
    registry.add("get_local_size", Builtin::Call(get_local_size));
    registry.add("get_num_groups", Builtin::Call(get_num_groups));
    registry.add("get_work_dim", Builtin::Call(get_work_dim));
}
