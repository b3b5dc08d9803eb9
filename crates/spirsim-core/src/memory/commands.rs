//! Host-side buffer transfer commands
//!
//! A host command queue drains these against the device's global memory.
//! Rectangular variants walk `region[1] × region[2]` rows of `region[0]`
//! bytes; the row at `(y, z)` starts at
//! `base + offset[0] + y * offset[1] + z * offset[2]`, so `offset[1]` and
//! `offset[2]` are the row and slice pitches.

use super::manager::Memory;
use crate::error::{Result, SimError};
use tracing::debug;

/// A transfer between host and device memory, or within device memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferCommand {
    /// Copy `size` bytes from `src` to `dst`.
    Copy { src: u64, dst: u64, size: u64 },
    /// Copy a 3D region between two pitched buffers.
    CopyRect {
        src: u64,
        dst: u64,
        src_offset: [u64; 3],
        dst_offset: [u64; 3],
        region: [u64; 3],
    },
    /// Repeat `pattern` over `size` bytes starting at `address`.
    Fill { address: u64, pattern: Vec<u8>, size: u64 },
    /// Read `size` bytes back to the host.
    Read { address: u64, size: u64 },
    /// Read a 3D region into a host buffer of `host_size` bytes.
    ReadRect {
        address: u64,
        buffer_offset: [u64; 3],
        host_offset: [u64; 3],
        region: [u64; 3],
        host_size: usize,
    },
    /// Write `data` to device memory at `address`.
    Write { address: u64, data: Vec<u8> },
    /// Write a 3D region from the pitched host buffer `data`.
    WriteRect {
        address: u64,
        buffer_offset: [u64; 3],
        host_offset: [u64; 3],
        region: [u64; 3],
        data: Vec<u8>,
    },
}

/// What a command hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    None,
    Bytes(Vec<u8>),
}

/// Start of row `(y, z)`, or `None` when the pitches overflow.
#[inline]
fn row_start(base: u64, offset: &[u64; 3], y: u64, z: u64) -> Option<u64> {
    base.checked_add(offset[0])?
        .checked_add(y.checked_mul(offset[1])?)?
        .checked_add(z.checked_mul(offset[2])?)
}

fn device_row(memory: &Memory, base: u64, offset: &[u64; 3], y: u64, z: u64, len: u64) -> Result<u64> {
    row_start(base, offset, y, z).ok_or_else(|| SimError::invalid_address(memory.address_space(), base, len))
}

fn host_row(host_size: usize, offset: &[u64; 3], y: u64, z: u64, len: u64) -> Result<std::ops::Range<usize>> {
    let start = row_start(0, offset, y, z);
    let end = start
        .and_then(|start| start.checked_add(len))
        .filter(|&end| end <= host_size as u64);
    match (start, end) {
        (Some(start), Some(end)) => Ok(start as usize..end as usize),
        _ => Err(SimError::HostOutOfBounds {
            offset: start.unwrap_or(u64::MAX),
            size: len,
            host_size,
        }),
    }
}

impl BufferCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Copy { .. } => "copy",
            Self::CopyRect { .. } => "copy_rect",
            Self::Fill { .. } => "fill",
            Self::Read { .. } => "read",
            Self::ReadRect { .. } => "read_rect",
            Self::Write { .. } => "write",
            Self::WriteRect { .. } => "write_rect",
        }
    }

    /// Run the command against `memory`.
    ///
    /// Each row or pattern repetition is an independent memory operation;
    /// the first invalid one stops the command.
    pub fn execute(&self, memory: &Memory) -> Result<CommandOutput> {
        debug!(command = self.name(), space = %memory.address_space(), "executing buffer command");

        match self {
            Self::Copy { src, dst, size } => {
                memory.copy(*dst, *src, *size)?;
                Ok(CommandOutput::None)
            }

            Self::CopyRect {
                src,
                dst,
                src_offset,
                dst_offset,
                region,
            } => {
                for z in 0..region[2] {
                    for y in 0..region[1] {
                        let from = device_row(memory, *src, src_offset, y, z, region[0])?;
                        let to = device_row(memory, *dst, dst_offset, y, z, region[0])?;
                        memory.copy(to, from, region[0])?;
                    }
                }
                Ok(CommandOutput::None)
            }

            Self::Fill { address, pattern, size } => {
                if !pattern.is_empty() {
                    let step = pattern.len() as u64;
                    for i in 0..size / step {
                        let target = address
                            .checked_add(i * step)
                            .ok_or_else(|| SimError::invalid_address(memory.address_space(), *address, *size))?;
                        memory.store(pattern, target)?;
                    }
                }
                Ok(CommandOutput::None)
            }

            Self::Read { address, size } => Ok(CommandOutput::Bytes(memory.read_bytes(*address, *size)?)),

            Self::ReadRect {
                address,
                buffer_offset,
                host_offset,
                region,
                host_size,
            } => {
                let mut host = vec![0u8; *host_size];
                for z in 0..region[2] {
                    for y in 0..region[1] {
                        let rows = host_row(*host_size, host_offset, y, z, region[0])?;
                        let from = device_row(memory, *address, buffer_offset, y, z, region[0])?;
                        memory.load(&mut host[rows], from)?;
                    }
                }
                Ok(CommandOutput::Bytes(host))
            }

            Self::Write { address, data } => {
                memory.store(data, *address)?;
                Ok(CommandOutput::None)
            }

            Self::WriteRect {
                address,
                buffer_offset,
                host_offset,
                region,
                data,
            } => {
                for z in 0..region[2] {
                    for y in 0..region[1] {
                        let rows = host_row(data.len(), host_offset, y, z, region[0])?;
                        let to = device_row(memory, *address, buffer_offset, y, z, region[0])?;
                        memory.store(&data[rows], to)?;
                    }
                }
                Ok(CommandOutput::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;

    fn create_test_memory() -> (Memory, u64) {
        let memory = Memory::new(AddressSpace::Global);
        let address = memory.allocate_buffer(64).unwrap();
        (memory, address)
    }

    #[test]
    fn test_fill_repeats_pattern() {
        let (memory, address) = create_test_memory();
        let fill = BufferCommand::Fill {
            address,
            pattern: vec![0xAB, 0xCD],
            size: 7,
        };
        assert_eq!(fill.execute(&memory).unwrap(), CommandOutput::None);

        let read = BufferCommand::Read { address, size: 8 };
        assert_eq!(
            read.execute(&memory).unwrap(),
            CommandOutput::Bytes(vec![0xAB, 0xCD, 0xAB, 0xCD, 0xAB, 0xCD, 0, 0])
        );
    }

    #[test]
    fn test_oversized_read_fails_before_allocating() {
        let (memory, address) = create_test_memory();
        let read = BufferCommand::Read {
            address,
            size: u64::MAX,
        };
        assert!(matches!(read.execute(&memory), Err(SimError::InvalidAddress { .. })));
    }

    #[test]
    fn test_overflowing_pitch_is_rejected() {
        let (memory, address) = create_test_memory();
        let copy = BufferCommand::CopyRect {
            src: address,
            dst: address + 32,
            src_offset: [0, u64::MAX, 0],
            dst_offset: [0, 2, 0],
            region: [2, 2, 1],
        };
        assert!(matches!(copy.execute(&memory), Err(SimError::InvalidAddress { .. })));

        let read = BufferCommand::ReadRect {
            address,
            buffer_offset: [0, 4, 0],
            host_offset: [0, 0, u64::MAX],
            region: [2, 1, 2],
            host_size: 16,
        };
        assert!(matches!(read.execute(&memory), Err(SimError::HostOutOfBounds { .. })));
    }

    #[test]
    fn test_write_then_copy() {
        let (memory, address) = create_test_memory();
        BufferCommand::Write {
            address,
            data: vec![1, 2, 3, 4],
        }
        .execute(&memory)
        .unwrap();
        BufferCommand::Copy {
            src: address,
            dst: address + 32,
            size: 4,
        }
        .execute(&memory)
        .unwrap();
        assert_eq!(memory.read_bytes(address + 32, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rect_commands_use_pitches() {
        let (memory, address) = create_test_memory();
        // 2x2 block of 2-byte rows from a host image with an 4-byte pitch.
        let host: Vec<u8> = (0..8).collect();
        BufferCommand::WriteRect {
            address,
            buffer_offset: [1, 8, 0],
            host_offset: [0, 4, 0],
            region: [2, 2, 1],
            data: host,
        }
        .execute(&memory)
        .unwrap();
        assert_eq!(memory.read_bytes(address, 12).unwrap(), vec![0, 0, 1, 0, 0, 0, 0, 0, 0, 4, 5, 0]);

        BufferCommand::CopyRect {
            src: address,
            dst: address + 32,
            src_offset: [1, 8, 0],
            dst_offset: [0, 2, 0],
            region: [2, 2, 1],
        }
        .execute(&memory)
        .unwrap();
        assert_eq!(memory.read_bytes(address + 32, 4).unwrap(), vec![0, 1, 4, 5]);

        let read = BufferCommand::ReadRect {
            address: address + 32,
            buffer_offset: [0, 2, 0],
            host_offset: [1, 3, 0],
            region: [2, 2, 1],
            host_size: 6,
        };
        assert_eq!(
            read.execute(&memory).unwrap(),
            CommandOutput::Bytes(vec![0, 0, 1, 0, 4, 5])
        );
    }

    #[test]
    fn test_out_of_range_rows_fail() {
        let (memory, address) = create_test_memory();
        let read = BufferCommand::ReadRect {
            address,
            buffer_offset: [0, 4, 0],
            host_offset: [0, 4, 0],
            region: [4, 2, 1],
            host_size: 6,
        };
        assert!(matches!(read.execute(&memory), Err(SimError::HostOutOfBounds { .. })));

        let copy = BufferCommand::Copy {
            src: address,
            dst: address + 60,
            size: 8,
        };
        assert!(matches!(copy.execute(&memory), Err(SimError::InvalidAddress { .. })));
    }
}
