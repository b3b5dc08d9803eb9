//! Builtin functions callable from kernels
//!
//! [`BuiltinRegistry`] maps demangled builtin names to implementations.
//! Each family lives in its own module and installs itself through a
//! `register` function. Handlers see their arguments through [`Call`],
//! which wraps the [`Operands`] of the call site and the invoking
//! work-item's [`WorkItemEnv`](crate::workitem::WorkItemEnv).

pub mod call;
pub mod elementwise;
pub mod operands;
pub mod overload;
pub mod registry;

mod atomic;
mod common;
mod conversion;
mod geometric;
mod image;
mod integer;
mod llvm;
mod math;
mod printf;
mod relational;
mod sync;
mod vector;
mod workitem;

pub use call::Call;
pub use integer::{smul_hi64, umul_hi64};
pub use operands::{Operand, OperandList, Operands};
pub use overload::{ArgType, ElementType};
pub use registry::{Builtin, BuiltinRegistry, Handler};
pub use sync::{CLK_GLOBAL_MEM_FENCE, CLK_LOCAL_MEM_FENCE};
