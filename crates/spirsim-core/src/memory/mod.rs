//! Device memory: address layout, per-space buffer manager, transfer commands

pub mod address;
pub mod commands;
pub mod manager;

pub use address::{decode, encode, AddressSpace, MAX_BUFFER_SIZE, MAX_NUM_BUFFERS, NULL_ADDRESS};
pub use commands::{BufferCommand, CommandOutput};
pub use manager::{HostBuffer, MappedRegion, Memory};
