//! End-to-end builtin tests
//!
//! Each test drives the public dispatch entry point the way an interpreter
//! would: operands in, a result value out, memory observed afterwards.

use spirsim_core::builtins::{BuiltinRegistry, Operand, OperandList};
use spirsim_core::fenv::{self, RoundingMode};
use spirsim_core::image::{ChannelOrder, ChannelType, Image, ImageDesc, ImageFormat, ImageTable, CLK_ADDRESS_CLAMP};
use spirsim_core::memory::{AddressSpace, Memory};
use spirsim_core::value::TypedValue;
use spirsim_core::workitem::StandaloneWorkItem;
use spirsim_core::Result;
use std::sync::Arc;

fn create_test_item() -> StandaloneWorkItem {
    spirsim_tracing::init_test_tracing();
    StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)))
}

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ============================================================================
// Atomics
// ============================================================================

#[test]
fn test_atomic_xor_complements_every_word() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();
    let global = Arc::clone(item.global_memory());
    let buffer = global.allocate_buffer(256)?;

    let pattern: Vec<u32> = (0..64).map(|i| i * 0x0101_0101).collect();
    let bytes: Vec<u8> = pattern.iter().flat_map(|w| w.to_le_bytes()).collect();
    global.store(&bytes, buffer)?;

    for i in 0..64u64 {
        let operands = OperandList::new()
            .with(Operand::pointer(AddressSpace::Global, buffer + i * 4, 4))
            .with(Operand::uint(4, 0xFFFF_FFFF));
        let mut old = TypedValue::scalar(4);
        registry.dispatch("atomic_xor", "PU3AS1jj", &operands, &mut item, &mut old)?;
        assert_eq!(old.get_uint(0), pattern[i as usize] as u64);
    }

    let expected: Vec<u32> = pattern.iter().map(|w| !w).collect();
    assert_eq!(words(&global.read_bytes(buffer, 256)?), expected);
    Ok(())
}

#[test]
fn test_atomic_on_invalid_address_leaves_result() -> Result<()> {
    let mut item = create_test_item();
    let operands = OperandList::new()
        .with(Operand::pointer(AddressSpace::Global, 0x40, 4))
        .with(Operand::uint(4, 1));
    let mut old = TypedValue::from_uints(4, &[77]);
    BuiltinRegistry::new().dispatch("atomic_inc", "PU3AS1j", &operands, &mut item, &mut old)?;
    assert_eq!(old.get_uint(0), 77);
    Ok(())
}

// ============================================================================
// Integer and Common Functions
// ============================================================================

#[test]
fn test_saturating_integer_arithmetic() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();

    let mut r = TypedValue::scalar(1);
    let operands = OperandList::new().with(Operand::uint(1, 250)).with(Operand::uint(1, 10));
    registry.dispatch("add_sat", "hh", &operands, &mut item, &mut r)?;
    assert_eq!(r.get_uint(0), 255);

    let operands = OperandList::new().with(Operand::sint(1, 120)).with(Operand::sint(1, 50));
    registry.dispatch("add_sat", "cc", &operands, &mut item, &mut r)?;
    assert_eq!(r.get_sint(0), 127);

    let mut r = TypedValue::new(4, 4);
    let operands = OperandList::new()
        .with(Operand::sint_vector(4, &[-10, 0, 5, 20]))
        .with(Operand::sint(4, -2))
        .with(Operand::sint(4, 8));
    registry.dispatch("clamp", "Dv4_iii", &operands, &mut item, &mut r)?;
    let lanes: Vec<i64> = (0..4).map(|i| r.get_sint(i)).collect();
    assert_eq!(lanes, vec![-2, 0, 5, 8]);
    Ok(())
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn test_conversion_rounding_is_scoped() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();
    assert_eq!(fenv::current(), RoundingMode::NearestEven);

    let mut r = TypedValue::scalar(4);
    let operands = OperandList::new().with(Operand::float(4, 2.5));
    registry.dispatch("convert_int_rtp", "f", &operands, &mut item, &mut r)?;
    assert_eq!(r.get_sint(0), 3);
    assert_eq!(fenv::current(), RoundingMode::NearestEven);

    registry.dispatch("convert_int_rte", "f", &operands, &mut item, &mut r)?;
    assert_eq!(r.get_sint(0), 2);

    registry.dispatch("convert_int", "f", &operands, &mut item, &mut r)?;
    assert_eq!(r.get_sint(0), 2);
    Ok(())
}

// ============================================================================
// Vector Data
// ============================================================================

#[test]
fn test_vstore_half_then_vload_half() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();
    let buffer = item.private_memory().allocate_buffer(16)?;

    let operands = OperandList::new()
        .with(Operand::float_vector(4, &[1.0, -2.0, 0.5, 65504.0]))
        .with(Operand::uint(8, 1))
        .with(Operand::pointer(AddressSpace::Private, buffer, 2));
    let mut unused = TypedValue::scalar(4);
    registry.dispatch("vstore_half4", "Dv4_fmPDh", &operands, &mut item, &mut unused)?;

    let mut loaded = TypedValue::new(4, 4);
    let operands = OperandList::new()
        .with(Operand::uint(8, 1))
        .with(Operand::pointer(AddressSpace::Private, buffer, 2));
    registry.dispatch("vload_half4", "mPKDh", &operands, &mut item, &mut loaded)?;
    let lanes: Vec<f64> = (0..4).map(|i| loaded.get_float(i)).collect();
    assert_eq!(lanes, vec![1.0, -2.0, 0.5, 65504.0]);
    Ok(())
}

// ============================================================================
// Images
// ============================================================================

#[test]
fn test_image_border_colour() -> Result<()> {
    let global = Arc::new(Memory::new(AddressSpace::Global));
    let format = ImageFormat::new(ChannelOrder::Rgb, ChannelType::UnormInt8);
    let desc = ImageDesc::image_2d(2, 1);
    let address = global.allocate_buffer(Image::new(0, format, desc).byte_size() as u64)?;
    global.store(&[255, 0, 0, 0, 255, 0], address)?;

    let mut table = ImageTable::new();
    let handle = table.register(Image::new(address, format, desc));
    let mut item = StandaloneWorkItem::new(global).with_images(table);
    let registry = BuiltinRegistry::new();

    let read = |item: &mut StandaloneWorkItem, x: f64| -> Result<Vec<f64>> {
        let operands = OperandList::new()
            .with(Operand::image(handle))
            .with(Operand::sampler(CLK_ADDRESS_CLAMP))
            .with(Operand::float_vector(4, &[x, 0.0]));
        let mut r = TypedValue::new(4, 4);
        registry.dispatch("read_imagef", "11ocl_image2d11ocl_samplerDv2_f", &operands, item, &mut r)?;
        Ok((0..4).map(|i| r.get_float(i)).collect())
    };

    assert_eq!(read(&mut item, 1.0)?, vec![0.0, 1.0, 0.0, 1.0]);
    assert_eq!(read(&mut item, 9.0)?, vec![0.0, 0.0, 0.0, 1.0]);

    // Without a sampler there is no addressing mode; outside texels are border.
    let operands = OperandList::new()
        .with(Operand::image(handle))
        .with(Operand::sint_vector(4, &[-1, 0]));
    let mut r = TypedValue::new(4, 4);
    registry.dispatch("read_imagef", "11ocl_image2dDv2_i", &operands, &mut item, &mut r)?;
    assert_eq!((0..4).map(|i| r.get_float(i)).collect::<Vec<_>>(), vec![0.0, 0.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn test_oversized_kernel_lengths_are_recovered() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();
    let buffer = item.global_memory().allocate_buffer(16)?;
    item.global_memory().store(&[0x11; 16], buffer)?;

    let operands = OperandList::new()
        .with(Operand::pointer(AddressSpace::Global, buffer, 1))
        .with(Operand::uint(1, 0xAB))
        .with(Operand::uint(8, 1 << 46));
    let mut r = TypedValue::scalar(4);
    registry.dispatch("llvm.memset.p1i8.i64", "", &operands, &mut item, &mut r)?;

    let operands = OperandList::new()
        .with(Operand::uint(8, u64::MAX))
        .with(Operand::pointer(AddressSpace::Global, buffer, 4));
    let mut loaded = TypedValue::new(4, 4);
    registry.dispatch("vload4", "mPU3AS1Kf", &operands, &mut item, &mut loaded)?;

    assert_eq!(item.global_memory().read_bytes(buffer, 16)?, vec![0x11; 16]);
    Ok(())
}

// ============================================================================
// Output and Dispatch
// ============================================================================

#[test]
fn test_printf_with_work_item_id() -> Result<()> {
    let registry = BuiltinRegistry::new();
    let mut item = create_test_item();
    let format = "item %d: %5.2f %v2d\n";
    let address = item.global_memory().allocate_buffer(format.len() as u64 + 1)?;
    item.global_memory().store(format.as_bytes(), address)?;

    let mut id = TypedValue::scalar(8);
    let operands = OperandList::new().with(Operand::uint(4, 0));
    registry.dispatch("get_global_id", "j", &operands, &mut item, &mut id)?;

    let operands = OperandList::new()
        .with(Operand::pointer(AddressSpace::Constant, address, 1))
        .with(Operand::sint(4, id.get_sint(0)))
        .with(Operand::float(8, 3.14159))
        .with(Operand::sint_vector(4, &[1, 2]));
    let mut r = TypedValue::scalar(4);
    registry.dispatch("printf", "PU3AS2cz", &operands, &mut item, &mut r)?;
    assert_eq!(item.output_text(), "item 0:  3.14 1,2\n");
    assert_eq!(r.get_sint(0), 0);
    Ok(())
}

#[test]
fn test_unknown_builtin_is_fatal() {
    let mut item = create_test_item();
    let mut r = TypedValue::scalar(4);
    let outcome = BuiltinRegistry::new().dispatch("no_such_builtin", "", &OperandList::new(), &mut item, &mut r);
    assert!(outcome.is_err());
}
