//! Work-item environment seen by builtins
//!
//! The interpreter that drives control flow, and the work-group scheduler
//! behind barriers and async copies, are outside this crate. Builtins reach
//! them through [`WorkItemEnv`]:
//!
//! - `memory(space)`: the [`Memory`] instances the work-item can address
//! - `images()`: the launch's image table
//! - `geometry()`: ids and sizes answered by `get_global_id` and friends
//! - `output()`: where `printf` writes
//! - `async_copy` / `barrier`: hand-offs to the work-group
//!
//! [`StandaloneWorkItem`] implements the trait for a single work-item with
//! no group around it: async copies complete immediately and barriers are
//! only recorded. Tests and single-item hosts use it directly.

use crate::error::{Result, SimError};
use crate::image::ImageTable;
use crate::memory::{AddressSpace, Memory};
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

// ================================================================================================
// Geometry
// ================================================================================================

/// NDRange position of one work-item. Unused dimensions have size 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItemGeometry {
    pub work_dim: u32,
    pub global_id: [u64; 3],
    pub global_size: [u64; 3],
    pub global_offset: [u64; 3],
    pub group_id: [u64; 3],
    pub local_id: [u64; 3],
    pub local_size: [u64; 3],
    pub num_groups: [u64; 3],
}

impl WorkItemGeometry {
    /// Derive group and local ids for the item at `global_id`.
    pub fn new(
        work_dim: u32,
        global_size: [u64; 3],
        local_size: [u64; 3],
        global_offset: [u64; 3],
        global_id: [u64; 3],
    ) -> Self {
        let mut geometry = Self {
            work_dim,
            global_id,
            global_size,
            global_offset,
            group_id: [0; 3],
            local_id: [0; 3],
            local_size,
            num_groups: [1; 3],
        };
        for dim in 0..3 {
            let local = local_size[dim].max(1);
            let linear = global_id[dim].saturating_sub(global_offset[dim]);
            geometry.local_size[dim] = local;
            geometry.local_id[dim] = linear % local;
            geometry.group_id[dim] = linear / local;
            geometry.num_groups[dim] = global_size[dim].max(1).div_ceil(local);
        }
        geometry
    }
}

impl Default for WorkItemGeometry {
    fn default() -> Self {
        Self::new(1, [1; 3], [1; 3], [0; 3], [0; 3])
    }
}

// ================================================================================================
// Environment Trait
// ================================================================================================

/// Direction of a work-group async copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncCopyKind {
    GlobalToLocal,
    LocalToGlobal,
}

/// An `async_work_group_(strided_)copy` request.
///
/// Strides are in elements. `event` is the event argument passed by the
/// kernel; zero asks for a new event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncCopy {
    pub kind: AsyncCopyKind,
    pub dest: u64,
    pub src: u64,
    pub element_size: u64,
    pub num_elements: u64,
    pub src_stride: u64,
    pub dest_stride: u64,
    pub event: u64,
}

/// Capabilities a builtin may use from the invoking work-item.
pub trait WorkItemEnv {
    /// Memory backing `space`, if the work-item can address it.
    fn memory(&self, space: AddressSpace) -> Option<&Memory>;

    fn images(&self) -> &ImageTable;

    fn geometry(&self) -> &WorkItemGeometry;

    /// Sink for `printf` output.
    fn output(&mut self) -> &mut dyn Write;

    /// Register an async copy with the work-group. Returns the event id.
    fn async_copy(&mut self, copy: AsyncCopy) -> Result<u64>;

    /// Suspend at a barrier with the given fence flags, waiting on `events`.
    fn barrier(&mut self, fence: u32, events: &[u64]);
}

// ================================================================================================
// Standalone Work-Item
// ================================================================================================

/// A barrier reached by a [`StandaloneWorkItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierRecord {
    pub fence: u32,
    pub events: Vec<u64>,
}

/// Single work-item environment with immediate async copies.
#[derive(Debug)]
pub struct StandaloneWorkItem {
    private: Arc<Memory>,
    local: Arc<Memory>,
    global: Arc<Memory>,
    constant: Option<Arc<Memory>>,
    images: ImageTable,
    geometry: WorkItemGeometry,
    output: Vec<u8>,
    barriers: Vec<BarrierRecord>,
    last_event: u64,
}

impl StandaloneWorkItem {
    /// Work-item over `global`, with fresh private and local memories.
    pub fn new(global: Arc<Memory>) -> Self {
        Self {
            private: Arc::new(Memory::new(AddressSpace::Private)),
            local: Arc::new(Memory::new(AddressSpace::Local)),
            global,
            constant: None,
            images: ImageTable::new(),
            geometry: WorkItemGeometry::default(),
            output: Vec::new(),
            barriers: Vec::new(),
            last_event: 0,
        }
    }

    /// Share an existing local memory (e.g. with other items of a group).
    pub fn with_local(mut self, local: Arc<Memory>) -> Self {
        self.local = local;
        self
    }

    /// Use a dedicated constant memory instead of global.
    pub fn with_constant(mut self, constant: Arc<Memory>) -> Self {
        self.constant = Some(constant);
        self
    }

    pub fn with_geometry(mut self, geometry: WorkItemGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_images(mut self, images: ImageTable) -> Self {
        self.images = images;
        self
    }

    pub fn images_mut(&mut self) -> &mut ImageTable {
        &mut self.images
    }

    pub fn private_memory(&self) -> &Arc<Memory> {
        &self.private
    }

    pub fn local_memory(&self) -> &Arc<Memory> {
        &self.local
    }

    pub fn global_memory(&self) -> &Arc<Memory> {
        &self.global
    }

    /// Everything printed so far, lossily decoded.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Drain the printf buffer.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn barriers(&self) -> &[BarrierRecord] {
        &self.barriers
    }
}

impl WorkItemEnv for StandaloneWorkItem {
    fn memory(&self, space: AddressSpace) -> Option<&Memory> {
        match space {
            AddressSpace::Private => Some(&*self.private),
            AddressSpace::Local => Some(&*self.local),
            AddressSpace::Global => Some(&*self.global),
            AddressSpace::Constant => self.constant.as_deref(),
        }
    }

    fn images(&self) -> &ImageTable {
        &self.images
    }

    fn geometry(&self) -> &WorkItemGeometry {
        &self.geometry
    }

    fn output(&mut self) -> &mut dyn Write {
        &mut self.output
    }

    fn async_copy(&mut self, copy: AsyncCopy) -> Result<u64> {
        let (dest_mem, src_mem) = match copy.kind {
            AsyncCopyKind::GlobalToLocal => (&self.local, &self.global),
            AsyncCopyKind::LocalToGlobal => (&self.global, &self.local),
        };
        for i in 0..copy.num_elements {
            let dest = strided(dest_mem, copy.dest, i, copy.dest_stride, copy.element_size)?;
            let src = strided(src_mem, copy.src, i, copy.src_stride, copy.element_size)?;
            Memory::copy_between(dest_mem, dest, src_mem, src, copy.element_size)?;
        }

        let event = if copy.event != 0 {
            copy.event
        } else {
            self.last_event += 1;
            self.last_event
        };
        debug!(event, kind = ?copy.kind, elements = copy.num_elements, "async copy complete");
        Ok(event)
    }

    fn barrier(&mut self, fence: u32, events: &[u64]) {
        debug!(fence, events = events.len(), "barrier");
        self.barriers.push(BarrierRecord {
            fence,
            events: events.to_vec(),
        });
    }
}

/// Address of element `i` of a strided async-copy operand.
fn strided(memory: &Memory, base: u64, i: u64, stride: u64, element_size: u64) -> Result<u64> {
    i.checked_mul(stride)
        .and_then(|n| n.checked_mul(element_size))
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| SimError::invalid_address(memory.address_space(), base, element_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_derivation() {
        let geometry = WorkItemGeometry::new(2, [16, 8, 1], [4, 4, 1], [2, 0, 0], [7, 5, 0]);
        assert_eq!(geometry.local_id, [1, 1, 0]);
        assert_eq!(geometry.group_id, [1, 1, 0]);
        assert_eq!(geometry.num_groups, [4, 2, 1]);
    }

    #[test]
    fn test_constant_falls_through_when_absent() {
        let item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        assert!(item.memory(AddressSpace::Constant).is_none());
        assert_eq!(
            item.memory(AddressSpace::Local).map(Memory::address_space),
            Some(AddressSpace::Local)
        );
    }

    #[test]
    fn test_strided_async_copy_and_events() {
        let global = Arc::new(Memory::new(AddressSpace::Global));
        let src = global.allocate_buffer(16).unwrap();
        global.store(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15], src).unwrap();

        let mut item = StandaloneWorkItem::new(Arc::clone(&global));
        let dest = item.local_memory().allocate_buffer(8).unwrap();

        let event = item
            .async_copy(AsyncCopy {
                kind: AsyncCopyKind::GlobalToLocal,
                dest,
                src,
                element_size: 2,
                num_elements: 4,
                src_stride: 2,
                dest_stride: 1,
                event: 0,
            })
            .unwrap();
        assert_eq!(event, 1);
        assert_eq!(
            item.local_memory().read_bytes(dest, 8).unwrap(),
            vec![0, 1, 4, 5, 8, 9, 12, 13]
        );

        item.barrier(1, &[event]);
        assert_eq!(
            item.barriers(),
            &[BarrierRecord {
                fence: 1,
                events: vec![1]
            }]
        );
    }

    #[test]
    fn test_async_copy_with_wrapping_stride_fails() {
        let global = Arc::new(Memory::new(AddressSpace::Global));
        let src = global.allocate_buffer(16).unwrap();
        let mut item = StandaloneWorkItem::new(Arc::clone(&global));
        let dest = item.local_memory().allocate_buffer(8).unwrap();

        let outcome = item.async_copy(AsyncCopy {
            kind: AsyncCopyKind::GlobalToLocal,
            dest,
            src,
            element_size: 4,
            num_elements: 2,
            src_stride: u64::MAX,
            dest_stride: 1,
            event: 0,
        });
        assert!(matches!(outcome, Err(SimError::InvalidAddress { .. })));
    }
}
