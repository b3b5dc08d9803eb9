//! Work-items running on separate threads against shared memory

use rayon::prelude::*;
use spirsim_core::builtins::{BuiltinRegistry, Operand, OperandList};
use spirsim_core::fenv::{self, RoundingMode};
use spirsim_core::memory::{AddressSpace, Memory};
use spirsim_core::value::TypedValue;
use spirsim_core::workitem::StandaloneWorkItem;
use spirsim_core::Result;
use std::sync::Arc;

const WORK_ITEMS: u64 = 512;

fn dispatch_on(
    registry: &BuiltinRegistry,
    global: &Arc<Memory>,
    name: &str,
    overload: &str,
    operands: OperandList,
) -> Result<TypedValue> {
    let mut item = StandaloneWorkItem::new(Arc::clone(global));
    let mut result = TypedValue::scalar(4);
    registry.dispatch(name, overload, &operands, &mut item, &mut result)?;
    Ok(result)
}

#[test]
fn test_parallel_atomic_add_is_exact() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let global = Arc::new(Memory::new(AddressSpace::Global));
    let counter = global.allocate_buffer(4)?;

    let mut previous = (0..WORK_ITEMS)
        .into_par_iter()
        .map(|_| {
            let operands = OperandList::new()
                .with(Operand::pointer(AddressSpace::Global, counter, 4))
                .with(Operand::uint(4, 1));
            dispatch_on(&registry, &global, "atomic_add", "PU3AS1jj", operands).map(|old| old.get_uint(0))
        })
        .collect::<Result<Vec<u64>>>()?;

    // Every work-item observed a distinct previous value.
    previous.sort_unstable();
    assert_eq!(previous, (0..WORK_ITEMS).collect::<Vec<_>>());
    assert_eq!(global.read_bytes(counter, 4)?, (WORK_ITEMS as u32).to_le_bytes().to_vec());
    Ok(())
}

#[test]
fn test_parallel_cmpxchg_lock_admits_one_winner() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let global = Arc::new(Memory::new(AddressSpace::Global));
    let lock = global.allocate_buffer(4)?;

    let winners = (1..=WORK_ITEMS)
        .into_par_iter()
        .map(|id| {
            let operands = OperandList::new()
                .with(Operand::pointer(AddressSpace::Global, lock, 4))
                .with(Operand::uint(4, 0))
                .with(Operand::uint(4, id));
            dispatch_on(&registry, &global, "atomic_cmpxchg", "PU3AS1jjj", operands).map(|old| old.get_uint(0) == 0)
        })
        .collect::<Result<Vec<bool>>>()?;

    assert_eq!(winners.iter().filter(|&&won| won).count(), 1);
    Ok(())
}

#[test]
fn test_rounding_mode_is_per_thread() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let global = Arc::new(Memory::new(AddressSpace::Global));

    let results = (0..64)
        .into_par_iter()
        .map(|i| {
            let name = if i % 2 == 0 { "convert_int_rtp" } else { "convert_int_rtn" };
            let operands = OperandList::new().with(Operand::float(4, 1.5));
            let converted = dispatch_on(&registry, &global, name, "f", operands)?.get_sint(0);
            Ok((i, converted, fenv::current()))
        })
        .collect::<Result<Vec<_>>>()?;

    for (i, converted, mode) in results {
        assert_eq!(converted, if i % 2 == 0 { 2 } else { 1 });
        assert_eq!(mode, RoundingMode::NearestEven);
    }
    Ok(())
}
