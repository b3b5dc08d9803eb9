//! Error types for memory and builtin operations

use crate::memory::AddressSpace;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while servicing memory requests or builtin calls
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// Allocation rejected (zero size, too large, or no buffer id left)
    #[error("failed to allocate {size} bytes in {space} memory: {reason}")]
    AllocationFailure {
        space: AddressSpace,
        size: u64,
        reason: &'static str,
    },

    /// Access to an unallocated buffer or past the end of one
    #[error("invalid {size}-byte access to {space} memory at {address:#018x}")]
    InvalidAddress { space: AddressSpace, address: u64, size: u64 },

    /// Atomic operand not 4-byte aligned
    #[error("misaligned {size}-byte atomic access at {address:#018x}")]
    MisalignedAtomic { address: u64, size: u64 },

    /// A builtin was called with an operand type it does not implement
    #[error("unsupported overload '{overload}' for builtin '{builtin}'")]
    UnsupportedOverload { builtin: String, overload: String },

    /// No registered handler matches the called name
    #[error("unresolved builtin '{0}'")]
    UnresolvedBuiltin(String),

    /// The kernel executed a trap instruction
    #[error("kernel trapped (llvm.trap)")]
    Trap,

    /// Image channel order / data type pair the simulator cannot decode
    #[error("unsupported image format: channel order {order:#x}, data type {data_type:#x}")]
    UnsupportedImageFormat { order: u32, data_type: u32 },

    /// Sampler bitfield with an unknown addressing or filter mode
    #[error("unsupported sampler {0:#x}")]
    UnsupportedSampler(u32),

    /// Image handle not present in the image table
    #[error("invalid image handle {0}")]
    InvalidImage(u64),

    /// An operand points into an address space the work-item cannot reach
    #[error("address space {0} is not available to this work-item")]
    MissingAddressSpace(u32),

    /// Host-side range of a transfer command outside the host buffer
    #[error("host access out of bounds: offset {offset} + size {size} > host size {host_size}")]
    HostOutOfBounds { offset: u64, size: u64, host_size: usize },

    /// Operand index past the end of the argument list
    #[error("operand {index} requested but call has {count} operands")]
    OperandOutOfRange { index: usize, count: usize },
}

impl SimError {
    /// Create an unsupported overload error
    pub fn unsupported_overload(builtin: impl Into<String>, overload: impl Into<String>) -> Self {
        Self::UnsupportedOverload {
            builtin: builtin.into(),
            overload: overload.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(space: AddressSpace, address: u64, size: u64) -> Self {
        Self::InvalidAddress { space, address, size }
    }

    /// Whether the error aborts the current builtin invocation.
    ///
    /// Memory errors are reported and the work-item carries on; everything
    /// else unwinds to the interpreter.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::AllocationFailure { .. } | Self::InvalidAddress { .. } | Self::MisalignedAtomic { .. }
        )
    }
}
