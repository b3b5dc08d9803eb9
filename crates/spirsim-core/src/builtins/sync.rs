//! Synchronization and work-group async copies
//!
//! Barriers and async copies are handed to the work-group through
//! [`WorkItemEnv`](crate::workitem::WorkItemEnv). Memory fences and
//! `prefetch` have nothing to do in a sequentially consistent simulator.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::{Result, SimError};
use crate::memory::AddressSpace;
use crate::value::TypedValue;
use crate::workitem::{AsyncCopy, AsyncCopyKind};

/// Fence flag for local memory.
pub const CLK_LOCAL_MEM_FENCE: u32 = 0x1;
/// Fence flag for global memory.
pub const CLK_GLOBAL_MEM_FENCE: u32 = 0x2;

/// Size in bytes of an event id in device memory.
const EVENT_SIZE: u64 = 8;

fn barrier(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let fence = call.uint(0, 0)? as u32;
    call.env_mut().barrier(fence, &[]);
    Ok(())
}

fn no_op(_call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    Ok(())
}

/// `async_work_group_copy(dest, src, num, event)` and the strided form
/// `async_work_group_strided_copy(dest, src, num, stride, event)`.
fn async_work_group_copy(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let dest = call.pointer(0)?;
    let src = call.pointer(1)?;
    let num_elements = call.uint(2, 0)?;
    let (stride, event_arg) = if call.name() == "async_work_group_strided_copy" {
        (call.uint(3, 0)?, 4)
    } else {
        (1, 3)
    };
    let event = call.uint(event_arg, 0)?;

    // The stride applies to whichever side lives in global memory.
    let (kind, src_stride, dest_stride) = if call.address_space(0) == AddressSpace::Local {
        (AsyncCopyKind::GlobalToLocal, stride, 1)
    } else {
        (AsyncCopyKind::LocalToGlobal, 1, stride)
    };

    let copy = AsyncCopy {
        kind,
        dest,
        src,
        element_size: call.pointee_size(0),
        num_elements,
        src_stride,
        dest_stride,
        event,
    };
    let event = call.env_mut().async_copy(copy)?;
    result.set_uint(0, event);
    Ok(())
}

fn wait_group_events(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let count = call.uint(0, 0)?;
    let list = call.pointer(1)?;
    let memory = call.memory_for(1)?;

    let size = count
        .checked_mul(EVENT_SIZE)
        .ok_or_else(|| SimError::invalid_address(memory.address_space(), list, u64::MAX))?;
    let events: Vec<u64> = memory
        .read_bytes(list, size)?
        .chunks_exact(EVENT_SIZE as usize)
        .map(|chunk| {
            let mut bytes = [0u8; EVENT_SIZE as usize];
            bytes.copy_from_slice(chunk);
            u64::from_le_bytes(bytes)
        })
        .collect();
    call.env_mut().barrier(CLK_LOCAL_MEM_FENCE, &events);
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("barrier", Builtin::Call(barrier));
    registry.add("mem_fence", Builtin::Call(no_op));
    registry.add("read_mem_fence", Builtin::Call(no_op));
    registry.add("write_mem_fence", Builtin::Call(no_op));
    registry.add("async_work_group_copy", Builtin::Call(async_work_group_copy));
    registry.add("async_work_group_strided_copy", Builtin::Call(async_work_group_copy));
    registry.add("wait_group_events", Builtin::Call(wait_group_events));
    registry.add("prefetch", Builtin::Call(no_op));
}
