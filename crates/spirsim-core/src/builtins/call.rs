//! Per-invocation context handed to builtin handlers

use super::operands::Operands;
use super::overload::{self, ArgType};
use crate::error::{Result, SimError};
use crate::image::{Image, ImageHandle, ImageTable};
use crate::memory::{AddressSpace, Memory};
use crate::value::TypedValue;
use crate::workitem::{WorkItemEnv, WorkItemGeometry};
use tracing::error;

/// One builtin call: the called name, its overload suffix, the argument
/// view and the calling work-item.
///
/// Lane accessors broadcast scalars: asking for lane `i` of a one-lane
/// argument returns lane 0, which covers the mixed vector/scalar overloads
/// such as `fmax(float4, float)` and `ldexp(float4, int)`.
pub struct Call<'a> {
    name: &'a str,
    overload: &'a str,
    operands: &'a dyn Operands,
    env: &'a mut dyn WorkItemEnv,
}

impl<'a> Call<'a> {
    pub fn new(name: &'a str, overload: &'a str, operands: &'a dyn Operands, env: &'a mut dyn WorkItemEnv) -> Self {
        Self {
            name,
            overload,
            operands,
            env,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn overload(&self) -> &str {
        self.overload
    }

    /// Error for an overload this handler does not implement.
    pub fn unsupported(&self) -> SimError {
        SimError::unsupported_overload(self.name, self.overload)
    }

    // ============================================================================================
    // Operands
    // ============================================================================================

    pub fn operand_count(&self) -> usize {
        self.operands.count()
    }

    pub fn value(&self, index: usize) -> Result<&TypedValue> {
        self.operands.value(index).ok_or(SimError::OperandOutOfRange {
            index,
            count: self.operands.count(),
        })
    }

    pub fn is_vector(&self, index: usize) -> bool {
        self.operands.is_vector(index)
    }

    /// Lane count of argument `index`.
    pub fn width(&self, index: usize) -> Result<usize> {
        Ok(self.value(index)?.num())
    }

    fn lane_of(value: &TypedValue, lane: usize) -> usize {
        if lane < value.num() {
            lane
        } else {
            0
        }
    }

    pub fn uint(&self, index: usize, lane: usize) -> Result<u64> {
        let value = self.value(index)?;
        Ok(value.get_uint(Self::lane_of(value, lane)))
    }

    pub fn sint(&self, index: usize, lane: usize) -> Result<i64> {
        let value = self.value(index)?;
        Ok(value.get_sint(Self::lane_of(value, lane)))
    }

    pub fn float(&self, index: usize, lane: usize) -> Result<f64> {
        let value = self.value(index)?;
        Ok(value.get_float(Self::lane_of(value, lane)))
    }

    /// Address held by pointer argument `index`.
    pub fn pointer(&self, index: usize) -> Result<u64> {
        Ok(self.value(index)?.get_pointer(0))
    }

    /// Address of element `element` of `stride` bytes past pointer argument
    /// `index`. Kernel offsets that wrap the address space are rejected.
    pub fn element_address(&self, index: usize, element: u64, stride: u64) -> Result<u64> {
        let base = self.pointer(index)?;
        element
            .checked_mul(stride)
            .and_then(|offset| base.checked_add(offset))
            .ok_or_else(|| {
                let space = self.address_space(index);
                error!(builtin = self.name, %space, base = format_args!("{base:#018x}"), element, "address overflow");
                SimError::invalid_address(space, base, stride)
            })
    }

    /// Address space of pointer argument `index` (private when untagged).
    pub fn address_space(&self, index: usize) -> AddressSpace {
        self.operands.address_space(index).unwrap_or(AddressSpace::Private)
    }

    pub fn pointee_size(&self, index: usize) -> u64 {
        self.operands.pointee_size(index)
    }

    /// First parameter type from the overload suffix.
    pub fn arg_type(&self) -> Result<ArgType> {
        overload::first_arg(self.overload).ok_or_else(|| self.unsupported())
    }

    /// First parameter's element letter.
    pub fn arg_letter(&self) -> Result<char> {
        overload::first_letter(self.overload).ok_or_else(|| self.unsupported())
    }

    // ============================================================================================
    // Environment
    // ============================================================================================

    /// Memory for `space`; constant falls back to global.
    pub fn memory(&self, space: AddressSpace) -> Result<&Memory> {
        self.env
            .memory(space)
            .or_else(|| match space {
                AddressSpace::Constant => self.env.memory(AddressSpace::Global),
                _ => None,
            })
            .ok_or(SimError::MissingAddressSpace(space.tag()))
    }

    /// Memory that pointer argument `index` points into.
    pub fn memory_for(&self, index: usize) -> Result<&Memory> {
        self.memory(self.address_space(index))
    }

    pub fn images(&self) -> &ImageTable {
        self.env.images()
    }

    /// Image named by argument `index`.
    pub fn image(&self, index: usize) -> Result<&Image> {
        let handle = ImageHandle(self.uint(index, 0)?);
        self.env.images().get(handle)
    }

    pub fn geometry(&self) -> &WorkItemGeometry {
        self.env.geometry()
    }

    pub fn env_mut(&mut self) -> &mut dyn WorkItemEnv {
        &mut *self.env
    }
}
