//! Virtual address layout shared by every address space
//!
//! A device address is a `u64` split into two fields:
//!
//! ```text
//!  63            48 47                                      0
//! ┌────────────────┬─────────────────────────────────────────┐
//! │   buffer id    │                 offset                  │
//! └────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! Buffer id 0 is never handed out, so address 0 always decodes to an
//! unallocated slot and acts as the null pointer.

use std::fmt;

/// Bits reserved for the buffer index.
pub const BUFFER_ID_BITS: u32 = 16;
/// Bits reserved for the byte offset within a buffer.
pub const OFFSET_BITS: u32 = 64 - BUFFER_ID_BITS;
/// Mask selecting the offset field.
pub const OFFSET_MASK: u64 = u64::MAX >> BUFFER_ID_BITS;
/// Number of buffer slots per memory instance (slot 0 included).
pub const MAX_NUM_BUFFERS: usize = 1 << BUFFER_ID_BITS;
/// Largest size a single buffer may have.
pub const MAX_BUFFER_SIZE: u64 = 1 << OFFSET_BITS;
/// The null address.
pub const NULL_ADDRESS: u64 = 0;

/// Compose an address from a buffer id and a byte offset.
///
/// Offsets wider than [`OFFSET_BITS`] are truncated.
#[inline]
pub fn encode(buffer_id: usize, offset: u64) -> u64 {
    ((buffer_id as u64) << OFFSET_BITS) | (offset & OFFSET_MASK)
}

/// Split an address into `(buffer_id, offset)`.
#[inline]
pub fn decode(address: u64) -> (usize, u64) {
    ((address >> OFFSET_BITS) as usize, address & OFFSET_MASK)
}

// ================================================================================================
// Address Spaces
// ================================================================================================

/// The four memory regions a kernel can address.
///
/// Discriminants follow the SPIR address-space numbering carried by
/// pointer operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AddressSpace {
    Private = 0,
    Global = 1,
    Constant = 2,
    Local = 3,
}

impl AddressSpace {
    /// Map a numeric address-space tag to the enum.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Private),
            1 => Some(Self::Global),
            2 => Some(Self::Constant),
            3 => Some(Self::Local),
            _ => None,
        }
    }

    /// Numeric tag of this address space.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Lowercase name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Global => "global",
            Self::Constant => "constant",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_constants() {
        assert_eq!(OFFSET_BITS, 48);
        assert_eq!(MAX_NUM_BUFFERS, 65_536);
        assert_eq!(MAX_BUFFER_SIZE, 1u64 << 48);
        assert_eq!(OFFSET_MASK, 0x0000_FFFF_FFFF_FFFF);
    }

    #[test]
    fn encode_places_id_in_high_bits() {
        assert_eq!(encode(1, 0), 0x0001_0000_0000_0000);
        assert_eq!(encode(0xFFFF, 0x10), 0xFFFF_0000_0000_0010);
        assert_eq!(decode(0x0002_0000_0000_0100), (2, 0x100));
    }

    #[test]
    fn null_decodes_to_reserved_slot() {
        assert_eq!(decode(NULL_ADDRESS), (0, 0));
    }

    #[test]
    fn address_space_tags() {
        for space in [
            AddressSpace::Private,
            AddressSpace::Global,
            AddressSpace::Constant,
            AddressSpace::Local,
        ] {
            assert_eq!(AddressSpace::from_tag(space.tag()), Some(space));
        }
        assert_eq!(AddressSpace::from_tag(4), None);
        assert_eq!(AddressSpace::Global.to_string(), "global");
    }
}
