//! Builtin dispatch and memory access benchmarks
//!
//! Measures the per-call cost an interpreter pays for:
//! - name resolution plus a scalar math builtin
//! - a 32-bit atomic on global memory
//! - bounds-checked loads and stores of varying size

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spirsim_core::builtins::{BuiltinRegistry, Operand, OperandList};
use spirsim_core::memory::{AddressSpace, Memory};
use spirsim_core::value::TypedValue;
use spirsim_core::workitem::StandaloneWorkItem;
use std::sync::Arc;

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let registry = BuiltinRegistry::new();
    let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));

    let operands = OperandList::new().with(Operand::float_vector(4, &[0.1, 0.2, 0.3, 0.4]));
    group.bench_function("cos_float4", |b| {
        let mut result = TypedValue::new(4, 4);
        b.iter(|| {
            let _ = registry.dispatch("cos", "Dv4_f", black_box(&operands), &mut item, &mut result);
            black_box(result.get_float(0));
        });
    });

    // Prefix-matched names take the slower path through the prefix table.
    let operands = OperandList::new().with(Operand::float(4, 2.5));
    group.bench_function("convert_int_rtp", |b| {
        let mut result = TypedValue::scalar(4);
        b.iter(|| {
            let _ = registry.dispatch("convert_int_rtp", "f", black_box(&operands), &mut item, &mut result);
            black_box(result.get_sint(0));
        });
    });

    let global = Arc::clone(item.global_memory());
    let Ok(counter) = global.allocate_buffer(4) else {
        return;
    };
    let operands = OperandList::new()
        .with(Operand::pointer(AddressSpace::Global, counter, 4))
        .with(Operand::uint(4, 1));
    group.bench_function("atomic_add", |b| {
        let mut result = TypedValue::scalar(4);
        b.iter(|| {
            let _ = registry.dispatch("atomic_add", "PU3AS1jj", black_box(&operands), &mut item, &mut result);
        });
    });

    group.finish();
}

fn benchmark_memory_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_access");
    let memory = Memory::new(AddressSpace::Global);
    let Ok(buffer) = memory.allocate_buffer(1 << 16) else {
        return;
    };

    for size in [4usize, 64, 4_096, 65_536] {
        let data = vec![0x5au8; size];
        group.bench_with_input(BenchmarkId::new("store", size), &size, |b, _| {
            b.iter(|| black_box(memory.store(black_box(&data), buffer)));
        });

        let mut dest = vec![0u8; size];
        group.bench_with_input(BenchmarkId::new("load", size), &size, |b, _| {
            b.iter(|| black_box(memory.load(black_box(&mut dest), buffer)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_dispatch, benchmark_memory_access);
criterion_main!(benches);
