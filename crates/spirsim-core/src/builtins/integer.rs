//! Integer functions
//!
//! Lanes arrive widened to 64 bits (zero-extended for unsigned overloads,
//! sign-extended for signed ones) and are truncated back to the result lane
//! size on store. Saturating and high-half operations therefore need the
//! lane width, which comes from the result value.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::value::TypedValue;

/// Signedness of the first parameter; non-integer overloads are rejected.
fn is_signed(call: &Call<'_>) -> Result<bool> {
    let element = call.arg_type()?.element;
    if element.is_float() {
        return Err(call.unsupported());
    }
    Ok(element.is_signed())
}

fn unsigned_max(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

fn signed_range(size: usize) -> (i64, i64) {
    if size >= 8 {
        (i64::MIN, i64::MAX)
    } else {
        let half = 1i64 << (size * 8 - 1);
        (-half, half - 1)
    }
}

// ================================================================================================
// High Multiply
// ================================================================================================

/// High 64 bits of the 128-bit product, from 32-bit partial products.
pub fn umul_hi64(x: u64, y: u64) -> u64 {
    const LOW: u64 = 0xFFFF_FFFF;
    let (xl, xh) = (x & LOW, x >> 32);
    let (yl, yh) = (y & LOW, y >> 32);

    let a = xh * yl + ((xl * yl) >> 32);
    let b = (((a & LOW) + xl * yh) >> 32) + (a >> 32);
    xh * yh + b
}

/// Signed high half: the unsigned one minus the two's-complement correction.
pub fn smul_hi64(x: i64, y: i64) -> i64 {
    let mut hi = umul_hi64(x as u64, y as u64) as i64;
    if x < 0 {
        hi = hi.wrapping_sub(y);
    }
    if y < 0 {
        hi = hi.wrapping_sub(x);
    }
    hi
}

fn umul_hi(x: u64, y: u64, bits: u32) -> u64 {
    if bits >= 64 {
        umul_hi64(x, y)
    } else {
        x.wrapping_mul(y) >> bits
    }
}

fn smul_hi(x: i64, y: i64, bits: u32) -> i64 {
    if bits >= 64 {
        smul_hi64(x, y)
    } else {
        x.wrapping_mul(y) >> bits
    }
}

// ================================================================================================
// Builtins
// ================================================================================================

fn abs(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    for i in 0..result.num() {
        let value = if signed {
            call.sint(0, i)?.unsigned_abs()
        } else {
            call.uint(0, i)?
        };
        result.set_uint(i, value);
    }
    Ok(())
}

fn abs_diff(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    for i in 0..result.num() {
        let value = if signed {
            call.sint(0, i)?.abs_diff(call.sint(1, i)?)
        } else {
            call.uint(0, i)?.abs_diff(call.uint(1, i)?)
        };
        result.set_uint(i, value);
    }
    Ok(())
}

fn add_sat(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    let size = result.size();
    for i in 0..result.num() {
        if signed {
            let (a, b) = (call.sint(0, i)?, call.sint(1, i)?);
            let sum = if size >= 8 {
                let sum = a.wrapping_add(b);
                if (a < 0) == (b < 0) && (sum < 0) != (a < 0) {
                    if a < 0 {
                        i64::MIN
                    } else {
                        i64::MAX
                    }
                } else {
                    sum
                }
            } else {
                let (lo, hi) = signed_range(size);
                (a + b).clamp(lo, hi)
            };
            result.set_sint(i, sum);
        } else {
            let sum = call.uint(0, i)?.saturating_add(call.uint(1, i)?);
            result.set_uint(i, sum.min(unsigned_max(size)));
        }
    }
    Ok(())
}

fn sub_sat(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    let size = result.size();
    for i in 0..result.num() {
        if signed {
            let (a, b) = (call.sint(0, i)?, call.sint(1, i)?);
            let diff = if size >= 8 {
                let diff = a.wrapping_sub(b);
                if (a < 0) != (b < 0) && (diff < 0) != (a < 0) {
                    if a < 0 {
                        i64::MIN
                    } else {
                        i64::MAX
                    }
                } else {
                    diff
                }
            } else {
                let (lo, hi) = signed_range(size);
                (a - b).clamp(lo, hi)
            };
            result.set_sint(i, diff);
        } else {
            result.set_uint(i, call.uint(0, i)?.saturating_sub(call.uint(1, i)?));
        }
    }
    Ok(())
}

fn mad_sat(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    let size = result.size();
    for i in 0..result.num() {
        if signed {
            let (lo, hi) = signed_range(size);
            let wide = call.sint(0, i)? as i128 * call.sint(1, i)? as i128 + call.sint(2, i)? as i128;
            result.set_sint(i, wide.clamp(lo as i128, hi as i128) as i64);
        } else {
            let wide = call.uint(0, i)? as u128 * call.uint(1, i)? as u128 + call.uint(2, i)? as u128;
            result.set_uint(i, wide.min(unsigned_max(size) as u128) as u64);
        }
    }
    Ok(())
}

fn clz(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let unused = 64 - 8 * result.size() as u32;
    for i in 0..result.num() {
        let x = call.uint(0, i)?;
        result.set_uint(i, (x.leading_zeros() - unused) as u64);
    }
    Ok(())
}

fn hadd(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    for i in 0..result.num() {
        if signed {
            let (a, b) = (call.sint(0, i)?, call.sint(1, i)?);
            result.set_sint(i, (a >> 1) + (b >> 1) + (a & b & 1));
        } else {
            let sum = call.uint(0, i)? as u128 + call.uint(1, i)? as u128;
            result.set_uint(i, (sum >> 1) as u64);
        }
    }
    Ok(())
}

fn rhadd(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    for i in 0..result.num() {
        if signed {
            let (a, b) = (call.sint(0, i)?, call.sint(1, i)?);
            result.set_sint(i, (a >> 1) + (b >> 1) + ((a | b) & 1));
        } else {
            let sum = call.uint(0, i)? as u128 + call.uint(1, i)? as u128 + 1;
            result.set_uint(i, (sum >> 1) as u64);
        }
    }
    Ok(())
}

fn mul_hi(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    let bits = 8 * result.size() as u32;
    for i in 0..result.num() {
        if signed {
            result.set_sint(i, smul_hi(call.sint(0, i)?, call.sint(1, i)?, bits));
        } else {
            result.set_uint(i, umul_hi(call.uint(0, i)?, call.uint(1, i)?, bits));
        }
    }
    Ok(())
}

fn mad_hi(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let signed = is_signed(call)?;
    let bits = 8 * result.size() as u32;
    for i in 0..result.num() {
        if signed {
            let hi = smul_hi(call.sint(0, i)?, call.sint(1, i)?, bits);
            result.set_sint(i, hi.wrapping_add(call.sint(2, i)?));
        } else {
            let hi = umul_hi(call.uint(0, i)?, call.uint(1, i)?, bits);
            result.set_uint(i, hi.wrapping_add(call.uint(2, i)?));
        }
    }
    Ok(())
}

fn rotate(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let width = 8 * result.size() as u64;
    for i in 0..result.num() {
        let value = call.uint(0, i)?;
        let left = call.uint(1, i)? % width;
        let rotated = if left == 0 {
            value
        } else {
            (value << left) | (value >> (width - left))
        };
        result.set_uint(i, rotated);
    }
    Ok(())
}

fn upsample(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let shift = 4 * result.size() as u32;
    for i in 0..result.num() {
        result.set_uint(i, (call.uint(0, i)? << shift) | call.uint(1, i)?);
    }
    Ok(())
}

fn mad24(a: u64, b: u64, c: u64) -> u64 {
    a.wrapping_mul(b).wrapping_add(c)
}

fn mul24(a: u64, b: u64) -> u64 {
    a.wrapping_mul(b)
}

fn popcount(x: u64) -> u64 {
    x.count_ones() as u64
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("abs", Builtin::Call(abs));
    registry.add("abs_diff", Builtin::Call(abs_diff));
    registry.add("add_sat", Builtin::Call(add_sat));
    registry.add("clz", Builtin::Call(clz));
    registry.add("hadd", Builtin::Call(hadd));
    registry.add("mad24", Builtin::U3(mad24));
    registry.add("mad_hi", Builtin::Call(mad_hi));
    registry.add("mad_sat", Builtin::Call(mad_sat));
    registry.add("mul24", Builtin::U2(mul24));
    registry.add("mul_hi", Builtin::Call(mul_hi));
    registry.add("popcount", Builtin::U1(popcount));
    registry.add("rhadd", Builtin::Call(rhadd));
    registry.add("rotate", Builtin::Call(rotate));
    registry.add("sub_sat", Builtin::Call(sub_sat));
    registry.add("upsample", Builtin::Call(upsample));
}
