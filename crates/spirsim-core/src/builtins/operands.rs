//! Operand access for builtin handlers
//!
//! Handlers never see the interpreter's instruction representation. They
//! read arguments through [`Operands`], which exposes each argument's
//! current value plus the static type facts a builtin needs (vector or
//! scalar, pointer address space, pointee size).
//!
//! [`OperandList`] is a self-contained implementation used by tests and by
//! hosts that marshal arguments themselves.

use crate::image::ImageHandle;
use crate::memory::AddressSpace;
use crate::value::TypedValue;

/// Read-only view of a call site's arguments.
pub trait Operands {
    /// Number of arguments.
    fn count(&self) -> usize;

    /// Current value of argument `index`.
    fn value(&self, index: usize) -> Option<&TypedValue>;

    /// Whether argument `index` has vector type.
    fn is_vector(&self, index: usize) -> bool;

    /// Address space of a pointer argument, `None` for non-pointers.
    fn address_space(&self, index: usize) -> Option<AddressSpace>;

    /// Byte size of the type a pointer argument points to.
    fn pointee_size(&self, index: usize) -> u64;
}

/// One argument with its type facts.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub value: TypedValue,
    pub vector: bool,
    pub address_space: Option<AddressSpace>,
    pub pointee_size: u64,
}

impl Operand {
    /// Scalar or vector operand from an existing value.
    pub fn from_value(value: TypedValue) -> Self {
        Self {
            vector: value.num() > 1,
            value,
            address_space: None,
            pointee_size: 0,
        }
    }

    /// Unsigned scalar of `size` bytes.
    pub fn uint(size: usize, value: u64) -> Self {
        Self::from_value(TypedValue::from_uints(size, &[value]))
    }

    /// Signed scalar of `size` bytes.
    pub fn sint(size: usize, value: i64) -> Self {
        Self::from_value(TypedValue::from_sints(size, &[value]))
    }

    /// Floating-point scalar of `size` bytes.
    pub fn float(size: usize, value: f64) -> Self {
        Self::from_value(TypedValue::from_floats(size, &[value]))
    }

    /// Integer vector with `size`-byte lanes.
    pub fn uint_vector(size: usize, lanes: &[u64]) -> Self {
        Self::from_value(TypedValue::from_uints(size, lanes)).vector()
    }

    /// Signed integer vector with `size`-byte lanes.
    pub fn sint_vector(size: usize, lanes: &[i64]) -> Self {
        Self::from_value(TypedValue::from_sints(size, lanes)).vector()
    }

    /// Floating-point vector with `size`-byte lanes.
    pub fn float_vector(size: usize, lanes: &[f64]) -> Self {
        Self::from_value(TypedValue::from_floats(size, lanes)).vector()
    }

    /// Pointer into `space` whose pointee is `pointee_size` bytes.
    pub fn pointer(space: AddressSpace, address: u64, pointee_size: u64) -> Self {
        Self {
            value: TypedValue::pointer(address),
            vector: false,
            address_space: Some(space),
            pointee_size,
        }
    }

    /// Image argument.
    pub fn image(handle: ImageHandle) -> Self {
        Self::uint(8, handle.0)
    }

    /// Sampler argument (raw bitfield).
    pub fn sampler(bits: u32) -> Self {
        Self::uint(4, bits as u64)
    }

    /// Mark as vector-typed even with a single lane.
    pub fn vector(mut self) -> Self {
        self.vector = true;
        self
    }
}

/// Owned argument list implementing [`Operands`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperandList {
    operands: Vec<Operand>,
}

impl OperandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument (builder style).
    pub fn with(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn push(&mut self, operand: Operand) {
        self.operands.push(operand);
    }
}

impl From<Vec<Operand>> for OperandList {
    fn from(operands: Vec<Operand>) -> Self {
        Self { operands }
    }
}

impl Operands for OperandList {
    fn count(&self) -> usize {
        self.operands.len()
    }

    fn value(&self, index: usize) -> Option<&TypedValue> {
        self.operands.get(index).map(|op| &op.value)
    }

    fn is_vector(&self, index: usize) -> bool {
        self.operands.get(index).is_some_and(|op| op.vector)
    }

    fn address_space(&self, index: usize) -> Option<AddressSpace> {
        self.operands.get(index).and_then(|op| op.address_space)
    }

    fn pointee_size(&self, index: usize) -> u64 {
        self.operands.get(index).map_or(0, |op| op.pointee_size)
    }
}
