//! Segmented memory manager backing one address space
//!
//! Every address space (global, constant, local, private) owns a [`Memory`]
//! instance. A memory is a table of buffer slots indexed by the buffer-id
//! field of a virtual address (see [`super::address`]).
//!
//! # Storage
//!
//! Buffer bytes live in `Arc<[AtomicU8]>`. Plain loads and stores touch
//! each byte with relaxed atomic operations, so work-items running on
//! different threads may interleave at byte granularity. A data race in
//! the simulated kernel is therefore observable in memory but is never
//! undefined behaviour in the simulator.
//!
//! # Locking
//!
//! ```text
//! slot table   RwLock   read:  load / store / copy / map / atomics
//!                       write: allocate / deallocate / clear
//! atomic lock  Mutex    held for the duration of one read-modify-write
//! ```
//!
//! Atomics take the atomic lock before the table read lock. No path takes
//! them in the opposite order.

use super::address::{decode, encode, AddressSpace, MAX_BUFFER_SIZE, MAX_NUM_BUFFERS};
use crate::error::{Result, SimError};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

type Bytes = Arc<[AtomicU8]>;

fn zeroed_bytes(len: usize) -> Option<Bytes> {
    let mut storage: Vec<AtomicU8> = Vec::new();
    storage.try_reserve_exact(len).ok()?;
    storage.resize_with(len, || AtomicU8::new(0));
    Some(Arc::from(storage))
}

fn bytes_from(src: &[u8]) -> Bytes {
    src.iter().map(|&b| AtomicU8::new(b)).collect()
}

#[inline]
fn read_into(src: &[AtomicU8], dest: &mut [u8]) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d = s.load(Ordering::Relaxed);
    }
}

#[inline]
fn write_from(dest: &[AtomicU8], src: &[u8]) {
    for (d, &s) in dest.iter().zip(src) {
        d.store(s, Ordering::Relaxed);
    }
}

// ================================================================================================
// Host Buffers
// ================================================================================================

/// Host-owned storage that can be attached to a [`Memory`] without copying.
///
/// Cloning a `HostBuffer` clones the handle, not the bytes. Writes made by
/// the device are visible through every handle and vice versa.
#[derive(Clone, Debug)]
pub struct HostBuffer {
    data: Bytes,
}

impl HostBuffer {
    /// Zero-filled host buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            data: (0..len).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Host buffer initialised from `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes_from(bytes) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy bytes starting at `offset` into `dest`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the buffer.
    pub fn read(&self, offset: usize, dest: &mut [u8]) {
        read_into(&self.data[offset..offset + dest.len()], dest);
    }

    /// Copy `src` into the buffer starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range runs past the end of the buffer.
    pub fn write(&self, offset: usize, src: &[u8]) {
        write_from(&self.data[offset..offset + src.len()], src);
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}

// ================================================================================================
// Mapped Regions
// ================================================================================================

/// A validated window into one buffer, returned by [`Memory::map_buffer`].
///
/// The region keeps the underlying storage alive even if the buffer is
/// deallocated afterwards; writes after deallocation are simply lost.
#[derive(Clone, Debug)]
pub struct MappedRegion {
    data: Bytes,
    start: usize,
    len: usize,
}

impl MappedRegion {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn window(&self, offset: usize, len: usize) -> &[AtomicU8] {
        assert!(offset + len <= self.len, "access outside mapped region");
        &self.data[self.start + offset..self.start + offset + len]
    }

    /// Copy bytes from `offset` within the region into `dest`.
    ///
    /// # Panics
    ///
    /// Panics if the range leaves the mapped region.
    pub fn read(&self, offset: usize, dest: &mut [u8]) {
        read_into(self.window(offset, dest.len()), dest);
    }

    /// Copy `src` into the region at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range leaves the mapped region.
    pub fn write(&self, offset: usize, src: &[u8]) {
        write_from(self.window(offset, src.len()), src);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len];
        self.read(0, &mut out);
        out
    }
}

// ================================================================================================
// Slot Table
// ================================================================================================

#[derive(Clone, Default)]
struct Buffer {
    size: u64,
    host_backed: bool,
    data: Option<Bytes>,
}

impl Buffer {
    fn is_live(&self) -> bool {
        self.data.is_some()
    }
}

struct SlotTable {
    buffers: Vec<Buffer>,
    free_ids: VecDeque<usize>,
    total_allocated: u64,
}

impl SlotTable {
    fn new() -> Self {
        Self {
            // Slot 0 is never handed out so address 0 stays invalid.
            buffers: vec![Buffer::default()],
            free_ids: VecDeque::new(),
            total_allocated: 0,
        }
    }

    fn next_id(&mut self) -> Option<usize> {
        if let Some(id) = self.free_ids.pop_front() {
            return Some(id);
        }
        if self.buffers.len() >= MAX_NUM_BUFFERS {
            return None;
        }
        self.buffers.push(Buffer::default());
        Some(self.buffers.len() - 1)
    }

    /// Storage and starting index for `size` bytes at `address`, if the span is valid.
    fn span(&self, address: u64, size: u64) -> Option<(&Bytes, usize)> {
        let (id, offset) = decode(address);
        let buffer = self.buffers.get(id)?;
        let data = buffer.data.as_ref()?;
        let end = offset.checked_add(size)?;
        if end > buffer.size {
            return None;
        }
        Some((data, offset as usize))
    }
}

// ================================================================================================
// Memory
// ================================================================================================

/// Byte-addressable store for one address space.
///
/// `Memory` is `Send + Sync`; share it between work-items with `Arc<Memory>`.
pub struct Memory {
    space: AddressSpace,
    table: RwLock<SlotTable>,
    atomic_lock: Mutex<()>,
}

impl Memory {
    /// Create an empty memory for the given address space.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            table: RwLock::new(SlotTable::new()),
            atomic_lock: Mutex::new(()),
        }
    }

    /// Largest buffer a single allocation may request.
    pub const fn max_alloc_size() -> u64 {
        MAX_BUFFER_SIZE
    }

    pub fn address_space(&self) -> AddressSpace {
        self.space
    }

    /// Bytes currently allocated across all live buffers.
    pub fn total_allocated(&self) -> u64 {
        self.table.read().total_allocated
    }

    fn invalid(&self, op: &'static str, address: u64, size: u64) -> SimError {
        error!(
            op,
            space = %self.space,
            address = format_args!("{address:#018x}"),
            size,
            "invalid memory access"
        );
        SimError::invalid_address(self.space, address, size)
    }

    fn allocation_failure(&self, size: u64, reason: &'static str) -> SimError {
        error!(space = %self.space, size, reason, "buffer allocation failed");
        SimError::AllocationFailure {
            space: self.space,
            size,
            reason,
        }
    }

    // ============================================================================================
    // Allocation
    // ============================================================================================

    /// Allocate a zero-filled buffer and return its base address.
    ///
    /// Freed buffer ids are reused first-in first-out before the table grows.
    ///
    /// # Errors
    ///
    /// `AllocationFailure` when `size` is zero, exceeds [`Memory::max_alloc_size`],
    /// the host cannot provide the bytes, or every buffer id is in use.
    pub fn allocate_buffer(&self, size: u64) -> Result<u64> {
        if size == 0 {
            return Err(self.allocation_failure(size, "zero-sized allocation"));
        }
        if size > MAX_BUFFER_SIZE {
            return Err(self.allocation_failure(size, "exceeds maximum buffer size"));
        }
        let data = usize::try_from(size)
            .ok()
            .and_then(zeroed_bytes)
            .ok_or_else(|| self.allocation_failure(size, "out of host memory"))?;

        self.install(size, false, data)
    }

    /// Attach host-owned storage as a new buffer without copying it.
    ///
    /// # Errors
    ///
    /// `AllocationFailure` when the host buffer is empty or no buffer id is free.
    pub fn create_host_buffer(&self, host: &HostBuffer) -> Result<u64> {
        let size = host.len() as u64;
        if size == 0 {
            return Err(self.allocation_failure(size, "zero-sized allocation"));
        }
        self.install(size, true, Arc::clone(&host.data))
    }

    fn install(&self, size: u64, host_backed: bool, data: Bytes) -> Result<u64> {
        let mut table = self.table.write();
        let id = match table.next_id() {
            Some(id) => id,
            None => {
                drop(table);
                return Err(self.allocation_failure(size, "no free buffer ids"));
            }
        };
        table.buffers[id] = Buffer {
            size,
            host_backed,
            data: Some(data),
        };
        table.total_allocated += size;

        let address = encode(id, 0);
        debug!(space = %self.space, id, size, host_backed, "buffer allocated");
        Ok(address)
    }

    /// Release the buffer containing `address`.
    ///
    /// Host-backed storage is detached, not freed. Releasing an unallocated
    /// buffer logs an error and changes nothing.
    pub fn deallocate_buffer(&self, address: u64) -> Result<()> {
        let (id, _) = decode(address);
        let mut table = self.table.write();
        let live = id != 0 && table.buffers.get(id).is_some_and(Buffer::is_live);
        if !live {
            drop(table);
            return Err(self.invalid("deallocate", address, 0));
        }

        let released = std::mem::take(&mut table.buffers[id]);
        table.total_allocated -= released.size;
        table.free_ids.push_back(id);
        debug!(
            space = %self.space,
            id,
            size = released.size,
            host_backed = released.host_backed,
            "buffer released"
        );
        Ok(())
    }

    /// Release every buffer and forget the free list.
    pub fn clear(&self) {
        let mut table = self.table.write();
        *table = SlotTable::new();
        debug!(space = %self.space, "memory cleared");
    }

    // ============================================================================================
    // Access
    // ============================================================================================

    /// Whether `size` bytes starting at `address` lie inside one live buffer.
    pub fn is_address_valid(&self, address: u64, size: u64) -> bool {
        self.table.read().span(address, size).is_some()
    }

    /// Copy `dest.len()` bytes from `address` into `dest`.
    ///
    /// On failure `dest` is left untouched.
    pub fn load(&self, dest: &mut [u8], address: u64) -> Result<()> {
        let size = dest.len() as u64;
        let table = self.table.read();
        let (data, start) = table.span(address, size).ok_or_else(|| self.invalid("load", address, size))?;
        read_into(&data[start..start + dest.len()], dest);
        Ok(())
    }

    /// Copy `src` into memory starting at `address`.
    ///
    /// On failure memory is left untouched.
    pub fn store(&self, src: &[u8], address: u64) -> Result<()> {
        let size = src.len() as u64;
        let table = self.table.read();
        let (data, start) = table.span(address, size).ok_or_else(|| self.invalid("store", address, size))?;
        write_from(&data[start..start + src.len()], src);
        Ok(())
    }

    /// Read `size` bytes into a fresh vector.
    ///
    /// The span is validated before anything is allocated.
    pub fn read_bytes(&self, address: u64, size: u64) -> Result<Vec<u8>> {
        let table = self.table.read();
        let (data, start) = table.span(address, size).ok_or_else(|| self.invalid("load", address, size))?;
        let mut out = vec![0u8; size as usize];
        read_into(&data[start..start + out.len()], &mut out);
        Ok(out)
    }

    /// Set `size` bytes starting at `address` to `value`.
    ///
    /// On failure memory is left untouched.
    pub fn fill(&self, value: u8, address: u64, size: u64) -> Result<()> {
        let table = self.table.read();
        let (data, start) = table.span(address, size).ok_or_else(|| self.invalid("fill", address, size))?;
        for byte in &data[start..start + size as usize] {
            byte.store(value, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `size` bytes between two spans of this memory.
    ///
    /// Both spans are validated before any byte moves. Bytes are copied in
    /// ascending address order.
    pub fn copy(&self, dest: u64, src: u64, size: u64) -> Result<()> {
        let table = self.table.read();
        let (src_data, src_start) = table.span(src, size).ok_or_else(|| self.invalid("copy", src, size))?;
        let (dest_data, dest_start) = table.span(dest, size).ok_or_else(|| self.invalid("copy", dest, size))?;
        let len = size as usize;
        for i in 0..len {
            let byte = src_data[src_start + i].load(Ordering::Relaxed);
            dest_data[dest_start + i].store(byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `size` bytes from `src` in `src_mem` to `dest` in `dest_mem`.
    ///
    /// The source is staged through a temporary buffer so the two slot
    /// tables are never locked at the same time.
    pub fn copy_between(dest_mem: &Memory, dest: u64, src_mem: &Memory, src: u64, size: u64) -> Result<()> {
        if std::ptr::eq(dest_mem, src_mem) {
            return dest_mem.copy(dest, src, size);
        }
        if !dest_mem.is_address_valid(dest, size) {
            return Err(dest_mem.invalid("copy", dest, size));
        }
        let staged = src_mem.read_bytes(src, size)?;
        dest_mem.store(&staged, dest)
    }

    /// Direct view of `size` bytes at `address + offset`, for bulk host access.
    ///
    /// Returns `None` (and logs) when the span is not inside one live buffer.
    pub fn map_buffer(&self, address: u64, offset: u64, size: u64) -> Option<MappedRegion> {
        let Some(target) = address.checked_add(offset) else {
            let _ = self.invalid("map", address, size);
            return None;
        };
        let table = self.table.read();
        match table.span(target, size) {
            Some((data, start)) => Some(MappedRegion {
                data: Arc::clone(data),
                start,
                len: size as usize,
            }),
            None => {
                drop(table);
                let _ = self.invalid("map", target, size);
                None
            }
        }
    }

    // ============================================================================================
    // Atomics
    // ============================================================================================

    /// Read-modify-write the 32-bit little-endian word at `address`.
    ///
    /// Returns the previous value. Alignment is the caller's concern.
    fn atomic_rmw(&self, op: &'static str, address: u64, update: impl FnOnce(u32) -> u32) -> Result<u32> {
        let _guard = self.atomic_lock.lock();
        let table = self.table.read();
        let (data, start) = table.span(address, 4).ok_or_else(|| self.invalid(op, address, 4))?;
        let word = &data[start..start + 4];

        let mut bytes = [0u8; 4];
        read_into(word, &mut bytes);
        let old = u32::from_le_bytes(bytes);
        write_from(word, &update(old).to_le_bytes());
        Ok(old)
    }

    pub fn atomic_add(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_add", address, |old| old.wrapping_add(value))
    }

    pub fn atomic_sub(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_sub", address, |old| old.wrapping_sub(value))
    }

    pub fn atomic_and(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_and", address, |old| old & value)
    }

    pub fn atomic_or(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_or", address, |old| old | value)
    }

    pub fn atomic_xor(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_xor", address, |old| old ^ value)
    }

    pub fn atomic_xchg(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_xchg", address, |_| value)
    }

    pub fn atomic_inc(&self, address: u64) -> Result<u32> {
        self.atomic_rmw("atomic_inc", address, |old| old.wrapping_add(1))
    }

    pub fn atomic_dec(&self, address: u64) -> Result<u32> {
        self.atomic_rmw("atomic_dec", address, |old| old.wrapping_sub(1))
    }

    /// Unsigned maximum.
    pub fn atomic_max(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_max", address, |old| old.max(value))
    }

    /// Unsigned minimum.
    pub fn atomic_min(&self, address: u64, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_min", address, |old| old.min(value))
    }

    /// Store `value` if the word equals `compare`; always returns the old word.
    pub fn atomic_cmpxchg(&self, address: u64, compare: u32, value: u32) -> Result<u32> {
        self.atomic_rmw("atomic_cmpxchg", address, |old| if old == compare { value } else { old })
    }

    // ============================================================================================
    // Diagnostics
    // ============================================================================================

    /// Write a hex dump of every live buffer to `out`.
    pub fn dump_to(&self, out: &mut dyn Write) -> io::Result<()> {
        const ROW: usize = 16;

        writeln!(out, "{} memory:", self.space)?;
        let table = self.table.read();
        for (id, buffer) in table.buffers.iter().enumerate() {
            let Some(data) = &buffer.data else { continue };
            let mut row = [0u8; ROW];
            for (row_index, chunk) in data.chunks(ROW).enumerate() {
                let bytes = &mut row[..chunk.len()];
                read_into(chunk, bytes);
                write!(out, "{:#018x}:", encode(id, (row_index * ROW) as u64))?;
                for byte in bytes.iter() {
                    write!(out, " {byte:02x}")?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// Hex dump of every live buffer, emitted through the logging layer.
    pub fn dump(&self) {
        let mut text = Vec::new();
        let (written, _) = spirsim_tracing::timed_block!("memory_dump", { self.dump_to(&mut text) });
        if written.is_err() {
            return;
        }
        for line in String::from_utf8_lossy(&text).lines() {
            info!(space = %self.space, "{line}");
        }
    }
}

impl Clone for Memory {
    /// Snapshot of this memory. Owned buffers are deep-copied; host-backed
    /// buffers keep sharing the host's storage.
    fn clone(&self) -> Self {
        let table = self.table.read();
        let buffers = table
            .buffers
            .iter()
            .map(|buffer| match (&buffer.data, buffer.host_backed) {
                (Some(data), false) => Buffer {
                    size: buffer.size,
                    host_backed: false,
                    data: Some(data.iter().map(|b| AtomicU8::new(b.load(Ordering::Relaxed))).collect()),
                },
                _ => buffer.clone(),
            })
            .collect();

        Self {
            space: self.space,
            table: RwLock::new(SlotTable {
                buffers,
                free_ids: table.free_ids.clone(),
                total_allocated: table.total_allocated,
            }),
            atomic_lock: Mutex::new(()),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read();
        f.debug_struct("Memory")
            .field("space", &self.space)
            .field("buffers", &table.buffers.iter().filter(|b| b.is_live()).count())
            .field("total_allocated", &table.total_allocated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_memory() -> Memory {
        Memory::new(AddressSpace::Global)
    }

    #[test]
    fn test_allocation_returns_offset_zero_addresses() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(64).unwrap();
        let b = memory.allocate_buffer(32).unwrap();

        assert_eq!(decode(a), (1, 0));
        assert_eq!(decode(b), (2, 0));
        assert_eq!(memory.total_allocated(), 96);
        assert!(memory.is_address_valid(a, 64));
        assert!(!memory.is_address_valid(a, 65));
        assert!(memory.is_address_valid(b + 31, 1));
    }

    #[test]
    fn test_allocation_rejects_bad_sizes() {
        let memory = create_test_memory();
        assert!(matches!(
            memory.allocate_buffer(0),
            Err(SimError::AllocationFailure { .. })
        ));
        assert!(matches!(
            memory.allocate_buffer(MAX_BUFFER_SIZE + 1),
            Err(SimError::AllocationFailure { .. })
        ));
        assert_eq!(memory.total_allocated(), 0);
    }

    #[test]
    fn test_freed_ids_reused_fifo() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(8).unwrap();
        let b = memory.allocate_buffer(8).unwrap();
        let _c = memory.allocate_buffer(8).unwrap();

        memory.deallocate_buffer(b).unwrap();
        memory.deallocate_buffer(a).unwrap();
        assert!(!memory.is_address_valid(a, 1));

        assert_eq!(decode(memory.allocate_buffer(4).unwrap()).0, 2);
        assert_eq!(decode(memory.allocate_buffer(4).unwrap()).0, 1);
        assert_eq!(decode(memory.allocate_buffer(4).unwrap()).0, 4);
    }

    #[test]
    fn test_double_free_is_noop() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(16).unwrap();
        memory.deallocate_buffer(a).unwrap();
        assert!(memory.deallocate_buffer(a).is_err());
        assert!(memory.deallocate_buffer(0).is_err());
        assert_eq!(memory.total_allocated(), 0);
    }

    #[test]
    fn test_new_buffers_are_zeroed() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(16).unwrap();
        memory.store(&[0xAA; 16], a).unwrap();
        memory.deallocate_buffer(a).unwrap();

        let b = memory.allocate_buffer(16).unwrap();
        assert_eq!(memory.read_bytes(b, 16).unwrap(), vec![0; 16]);
    }

    #[test]
    fn test_out_of_bounds_load_leaves_dest() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(8).unwrap();
        let mut dest = [7u8; 4];
        let err = memory.load(&mut dest, a + 6).unwrap_err();
        assert!(matches!(err, SimError::InvalidAddress { size: 4, .. }));
        assert_eq!(dest, [7; 4]);
        assert!(memory.store(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn test_fill_and_read_validate_first() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(16).unwrap();
        memory.fill(0xAB, a + 4, 8).unwrap();
        assert_eq!(memory.read_bytes(a, 16).unwrap()[3..14], [0, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0, 0]);

        // Kernel-sized requests far past the buffer fail without touching anything.
        assert!(matches!(memory.fill(0xFF, a, 1 << 46), Err(SimError::InvalidAddress { .. })));
        assert!(matches!(memory.read_bytes(a, u64::MAX), Err(SimError::InvalidAddress { .. })));
        assert!(memory.map_buffer(a, u64::MAX, 1).is_none());
        assert_eq!(memory.read_bytes(a, 4).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_copy_within_and_between() {
        let global = create_test_memory();
        let local = Memory::new(AddressSpace::Local);
        let src = global.allocate_buffer(8).unwrap();
        let dst = global.allocate_buffer(8).unwrap();
        let shared = local.allocate_buffer(8).unwrap();
        global.store(&[1, 2, 3, 4, 5, 6, 7, 8], src).unwrap();

        global.copy(dst, src + 4, 4).unwrap();
        assert_eq!(global.read_bytes(dst, 4).unwrap(), vec![5, 6, 7, 8]);

        Memory::copy_between(&local, shared, &global, src, 8).unwrap();
        assert_eq!(local.read_bytes(shared, 8).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        assert!(Memory::copy_between(&local, shared + 4, &global, src, 8).is_err());
        assert!(global.copy(dst, src, 9).is_err());
    }

    #[test]
    fn test_host_buffer_shares_bytes() {
        let memory = create_test_memory();
        let host = HostBuffer::from_bytes(&[1, 2, 3, 4]);
        let address = memory.create_host_buffer(&host).unwrap();
        assert_eq!(memory.total_allocated(), 4);

        memory.store(&[9], address + 1).unwrap();
        assert_eq!(host.to_vec(), vec![1, 9, 3, 4]);

        host.write(3, &[42]);
        assert_eq!(memory.read_bytes(address + 3, 1).unwrap(), vec![42]);

        memory.deallocate_buffer(address).unwrap();
        assert_eq!(host.to_vec(), vec![1, 9, 3, 42]);
    }

    #[test]
    fn test_map_buffer_views_live_bytes() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(16).unwrap();
        let region = memory.map_buffer(a, 4, 8).unwrap();
        region.write(0, &[0xDE, 0xAD]);
        assert_eq!(memory.read_bytes(a + 4, 2).unwrap(), vec![0xDE, 0xAD]);
        assert_eq!(region.len(), 8);
        assert!(memory.map_buffer(a, 12, 8).is_none());
    }

    #[test]
    fn test_atomics_return_old_value() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(8).unwrap();
        memory.store(&10u32.to_le_bytes(), a).unwrap();

        assert_eq!(memory.atomic_add(a, 5).unwrap(), 10);
        assert_eq!(memory.atomic_cmpxchg(a, 15, 99).unwrap(), 15);
        assert_eq!(memory.atomic_cmpxchg(a, 15, 1).unwrap(), 99);
        assert_eq!(memory.atomic_max(a, u32::MAX).unwrap(), 99);
        assert_eq!(memory.atomic_min(a, 3).unwrap(), u32::MAX);
        assert_eq!(memory.atomic_dec(a).unwrap(), 3);
        assert_eq!(memory.atomic_sub(a, 3).unwrap(), 2);
        assert_eq!(memory.atomic_inc(a).unwrap(), u32::MAX);
        assert_eq!(memory.atomic_xchg(a, 0x0F0F).unwrap(), 0);
        assert_eq!(memory.atomic_or(a, 0xF000).unwrap(), 0x0F0F);
        assert_eq!(memory.atomic_and(a, 0xFF00).unwrap(), 0xFF0F);
        assert_eq!(memory.atomic_xor(a, 0xFFFF).unwrap(), 0xFF00);
        assert_eq!(memory.read_bytes(a, 4).unwrap(), 0x00FFu32.to_le_bytes().to_vec());

        assert!(memory.atomic_add(a + 6, 1).is_err());
    }

    #[test]
    fn test_clone_is_deep_for_owned_buffers() {
        let memory = create_test_memory();
        let owned = memory.allocate_buffer(4).unwrap();
        let host = HostBuffer::new(4);
        let shared = memory.create_host_buffer(&host).unwrap();

        let snapshot = memory.clone();
        memory.store(&[1, 1, 1, 1], owned).unwrap();
        snapshot.store(&[2, 2, 2, 2], shared).unwrap();

        assert_eq!(snapshot.read_bytes(owned, 4).unwrap(), vec![0; 4]);
        assert_eq!(memory.read_bytes(shared, 4).unwrap(), vec![2; 4]);
        assert_eq!(snapshot.total_allocated(), 8);
    }

    #[test]
    fn test_clear_resets_table() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(4).unwrap();
        memory.clear();
        assert!(!memory.is_address_valid(a, 1));
        assert_eq!(memory.total_allocated(), 0);
        assert_eq!(decode(memory.allocate_buffer(4).unwrap()).0, 1);
    }

    #[test]
    fn test_dump_lists_live_buffers() {
        let memory = create_test_memory();
        let a = memory.allocate_buffer(4).unwrap();
        memory.store(&[0x01, 0x02, 0xab, 0xff], a).unwrap();

        let mut out = Vec::new();
        memory.dump_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("global memory:"));
        assert!(text.contains("0x0001000000000000: 01 02 ab ff"));
        memory.dump();
    }
}
