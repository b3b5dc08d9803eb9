//! Typed lane values exchanged between the register file and builtins
//!
//! A [`TypedValue`] is a small fixed-capacity array of up to 16 lanes, each
//! 1, 2, 4 or 8 bytes wide, stored little-endian. Every operand handed to a
//! builtin and every builtin result uses this representation, whether it is
//! a scalar, a vector, or a pointer.

use half::f16;
use std::fmt;

/// Maximum number of lanes in a vector value.
pub const MAX_LANES: usize = 16;
/// Widest supported lane, in bytes.
pub const MAX_LANE_SIZE: usize = 8;
/// Storage capacity of a [`TypedValue`].
pub const VALUE_CAPACITY: usize = MAX_LANES * MAX_LANE_SIZE;

/// A scalar or vector value with an element size and lane count.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TypedValue {
    size: usize,
    num: usize,
    data: [u8; VALUE_CAPACITY],
}

impl TypedValue {
    /// Zero value of `num` lanes of `size` bytes each.
    ///
    /// # Panics
    ///
    /// Panics if `size * num` exceeds [`VALUE_CAPACITY`] or either is zero.
    pub fn new(size: usize, num: usize) -> Self {
        assert!(size > 0 && num > 0, "typed value must have at least one non-empty lane");
        assert!(size * num <= VALUE_CAPACITY, "typed value of {num} x {size} bytes exceeds capacity");
        Self {
            size,
            num,
            data: [0; VALUE_CAPACITY],
        }
    }

    /// Single-lane value.
    pub fn scalar(size: usize) -> Self {
        Self::new(size, 1)
    }

    /// Value whose lanes are copied from `bytes` (little-endian).
    pub fn from_bytes(size: usize, num: usize, bytes: &[u8]) -> Self {
        let mut value = Self::new(size, num);
        let len = value.byte_len().min(bytes.len());
        value.data[..len].copy_from_slice(&bytes[..len]);
        value
    }

    /// Integer value, one lane per element of `lanes`, each truncated to `size` bytes.
    pub fn from_uints(size: usize, lanes: &[u64]) -> Self {
        let mut value = Self::new(size, lanes.len());
        for (lane, &v) in lanes.iter().enumerate() {
            value.set_uint(lane, v);
        }
        value
    }

    /// Signed integer value, one lane per element of `lanes`.
    pub fn from_sints(size: usize, lanes: &[i64]) -> Self {
        let mut value = Self::new(size, lanes.len());
        for (lane, &v) in lanes.iter().enumerate() {
            value.set_sint(lane, v);
        }
        value
    }

    /// Floating-point value (`size` 2, 4 or 8), one lane per element of `lanes`.
    pub fn from_floats(size: usize, lanes: &[f64]) -> Self {
        let mut value = Self::new(size, lanes.len());
        for (lane, &v) in lanes.iter().enumerate() {
            value.set_float(lane, v);
        }
        value
    }

    /// Pointer-sized value holding `address`.
    pub fn pointer(address: u64) -> Self {
        Self::from_uints(8, &[address])
    }

    /// Bytes per lane.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of lanes.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Total payload in bytes (`size * num`).
    pub fn byte_len(&self) -> usize {
        self.size * self.num
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.byte_len()]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        &mut self.data[..len]
    }

    #[inline]
    fn lane(&self, lane: usize) -> &[u8] {
        let start = lane * self.size;
        &self.data[start..start + self.size]
    }

    #[inline]
    fn lane_mut(&mut self, lane: usize) -> &mut [u8] {
        let start = lane * self.size;
        &mut self.data[start..start + self.size]
    }

    // ============================================================================================
    // Lane Reads
    // ============================================================================================

    /// Lane as an unsigned integer, zero-extended to 64 bits.
    pub fn get_uint(&self, lane: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[..self.size].copy_from_slice(self.lane(lane));
        u64::from_le_bytes(bytes)
    }

    /// Lane as a signed integer, sign-extended to 64 bits.
    pub fn get_sint(&self, lane: usize) -> i64 {
        let shift = 64 - 8 * self.size as u32;
        ((self.get_uint(lane) << shift) as i64) >> shift
    }

    /// Lane as a float. Two-byte lanes are IEEE half precision.
    pub fn get_float(&self, lane: usize) -> f64 {
        let bits = self.get_uint(lane);
        match self.size {
            2 => f16::from_bits(bits as u16).to_f64(),
            4 => f32::from_bits(bits as u32) as f64,
            8 => f64::from_bits(bits),
            _ => bits as f64,
        }
    }

    /// Lane as a device address.
    pub fn get_pointer(&self, lane: usize) -> u64 {
        self.get_uint(lane)
    }

    // ============================================================================================
    // Lane Writes
    // ============================================================================================

    /// Store the low `size` bytes of `value` into a lane.
    pub fn set_uint(&mut self, lane: usize, value: u64) {
        let size = self.size;
        self.lane_mut(lane).copy_from_slice(&value.to_le_bytes()[..size]);
    }

    /// Store the low `size` bytes of `value` into a lane.
    pub fn set_sint(&mut self, lane: usize, value: i64) {
        self.set_uint(lane, value as u64);
    }

    /// Store a float into a lane, narrowing to the lane's precision with
    /// round-to-nearest-even.
    pub fn set_float(&mut self, lane: usize, value: f64) {
        let bits = match self.size {
            2 => f16::from_f64(value).to_bits() as u64,
            4 => (value as f32).to_bits() as u64,
            8 => value.to_bits(),
            _ => value as u64,
        };
        self.set_uint(lane, bits);
    }

    pub fn set_pointer(&mut self, lane: usize, address: u64) {
        self.set_uint(lane, address);
    }

    /// Copy `bytes` into the payload starting at byte `offset`.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.bytes_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedValue({}x{}B:", self.num, self.size)?;
        for lane in 0..self.num {
            write!(f, " {:#x}", self.get_uint(lane))?;
        }
        write!(f, ")")
    }
}
