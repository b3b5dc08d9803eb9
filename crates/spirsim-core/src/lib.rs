//! # spirsim-core - Memory and Builtins for an OpenCL Kernel Simulator
//!
//! The device side of a functional OpenCL simulator: the memory every
//! address space is backed by, and the builtin functions kernels call.
//! The instruction interpreter, the work-group scheduler and the host API
//! live elsewhere and talk to this crate through [`workitem::WorkItemEnv`].
//!
//! ## Architecture
//!
//! - [`memory`] - segmented virtual memory. An address packs a 16-bit
//!   buffer id above a 48-bit offset; every access is bounds checked
//!   against one live buffer. Invalid accesses are logged and fail without
//!   side effects, so a faulty kernel never corrupts the simulator.
//! - [`builtins`] - name-based dispatch to atomic, image, vector, math,
//!   conversion, relational, synchronization and `printf` builtins.
//! - [`image`] - image descriptors, samplers and the handle table.
//! - [`value`] - the lane array used for every operand and result.
//! - [`fenv`] - per-thread rounding mode used by conversions.
//! - [`config`] - environment-driven memory dumps.
//!
//! ## Example
//!
//! ```
//! use spirsim_core::builtins::{BuiltinRegistry, Operand, OperandList};
//! use spirsim_core::memory::{AddressSpace, Memory};
//! use spirsim_core::value::TypedValue;
//! use spirsim_core::workitem::StandaloneWorkItem;
//! use std::sync::Arc;
//!
//! let global = Arc::new(Memory::new(AddressSpace::Global));
//! let counter = global.allocate_buffer(4)?;
//!
//! let registry = BuiltinRegistry::new();
//! let mut item = StandaloneWorkItem::new(Arc::clone(&global));
//! let operands = OperandList::new()
//!     .with(Operand::pointer(AddressSpace::Global, counter, 4))
//!     .with(Operand::uint(4, 5));
//! let mut old = TypedValue::scalar(4);
//! registry.dispatch("atomic_add", "PU3AS1jj", &operands, &mut item, &mut old)?;
//!
//! assert_eq!(old.get_uint(0), 0);
//! assert_eq!(global.read_bytes(counter, 4)?, vec![5, 0, 0, 0]);
//! # Ok::<(), spirsim_core::SimError>(())
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod fenv;
pub mod image;
pub mod memory;
pub mod value;
pub mod workitem;

// Re-export primary types
pub use builtins::{BuiltinRegistry, Call, Operand, OperandList, Operands};
pub use config::{DiagnosticsConfig, OutputMask};
pub use error::{Result, SimError};
pub use image::{Image, ImageHandle, ImageTable, Sampler};
pub use memory::{AddressSpace, HostBuffer, Memory};
pub use value::TypedValue;
pub use workitem::{StandaloneWorkItem, WorkItemEnv, WorkItemGeometry};
