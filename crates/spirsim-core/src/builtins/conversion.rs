//! Explicit conversions: `convert_<type>[_sat][_rte|_rtz|_rtp|_rtn]`
//!
//! The destination type comes from the result lane size and from which
//! prefix matched (`convert_u*` is unsigned, the catch-all `convert_` is
//! signed). Float to integer conversions round toward zero unless the name
//! carries a rounding suffix; the mode is installed with a
//! [`RoundingGuard`] for the duration of the call.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::fenv::{self, RoundingGuard, RoundingMode};
use crate::value::TypedValue;

/// Kind of the source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Unsigned,
    Signed,
    Float,
}

fn source(call: &Call<'_>) -> Result<Source> {
    match call.arg_letter()? {
        'h' | 't' | 'j' | 'm' => Ok(Source::Unsigned),
        'c' | 'a' | 's' | 'i' | 'l' => Ok(Source::Signed),
        'f' | 'd' | 'D' => Ok(Source::Float),
        _ => Err(call.unsupported()),
    }
}

/// Lane `i` of the source as a double.
fn source_float(call: &Call<'_>, kind: Source, i: usize) -> Result<f64> {
    Ok(match kind {
        Source::Unsigned => call.uint(0, i)? as f64,
        Source::Signed => call.sint(0, i)? as f64,
        Source::Float => call.float(0, i)?,
    })
}

fn is_saturating(name: &str) -> bool {
    name.contains("_sat")
}

// ================================================================================================
// To Floating Point
// ================================================================================================

fn convert_float(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let kind = source(call)?;
    let mode = RoundingMode::from_name(call.name()).unwrap_or_default();
    for i in 0..result.num() {
        let x = source_float(call, kind, i)?;
        if result.size() == 4 {
            result.set_float(i, fenv::to_f32(x, mode) as f64);
        } else {
            result.set_float(i, x);
        }
    }
    Ok(())
}

fn convert_half(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let kind = source(call)?;
    let mode = RoundingMode::from_name(call.name()).unwrap_or_default();
    for i in 0..result.num() {
        let x = source_float(call, kind, i)?;
        result.set_uint(i, fenv::to_half_bits(x, mode) as u64);
    }
    Ok(())
}

// ================================================================================================
// To Integer
// ================================================================================================

/// Round a float with the current mode. NaN converts to 0.
fn round_float(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        fenv::rint(x)
    }
}

fn unsigned_max(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * size)) - 1
    }
}

fn signed_range(size: usize) -> (i64, i64) {
    if size >= 8 {
        (i64::MIN, i64::MAX)
    } else {
        let max = (1i64 << (8 * size - 1)) - 1;
        (-max - 1, max)
    }
}

fn convert_uint(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let kind = source(call)?;
    let sat = is_saturating(call.name());
    let max = unsigned_max(result.size());
    let _guard = RoundingGuard::new(RoundingMode::from_name(call.name()).unwrap_or(RoundingMode::TowardZero));

    for i in 0..result.num() {
        let r = match kind {
            Source::Unsigned => {
                let u = call.uint(0, i)?;
                if sat {
                    u.min(max)
                } else {
                    u
                }
            }
            Source::Signed => {
                let s = call.sint(0, i)?;
                if sat {
                    s.clamp(0, max.min(i64::MAX as u64) as i64) as u64
                } else {
                    s as u64
                }
            }
            Source::Float if sat => round_float(call.float(0, i)?.clamp(0.0, max as f64)) as u64,
            Source::Float => {
                let r = round_float(call.float(0, i)?);
                if r < 0.0 {
                    r as i64 as u64
                } else {
                    r as u64
                }
            }
        };
        result.set_uint(i, r);
    }
    Ok(())
}

fn convert_sint(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let kind = source(call)?;
    let sat = is_saturating(call.name());
    let (min, max) = signed_range(result.size());
    let _guard = RoundingGuard::new(RoundingMode::from_name(call.name()).unwrap_or(RoundingMode::TowardZero));

    for i in 0..result.num() {
        let r = match kind {
            Source::Unsigned => {
                let u = call.uint(0, i)?;
                if sat {
                    u.min(max as u64) as i64
                } else {
                    u as i64
                }
            }
            Source::Signed => {
                let s = call.sint(0, i)?;
                if sat {
                    s.clamp(min, max)
                } else {
                    s
                }
            }
            Source::Float if sat => round_float(call.float(0, i)?.clamp(min as f64, max as f64)) as i64,
            Source::Float => round_float(call.float(0, i)?) as i64,
        };
        result.set_sint(i, r);
    }
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add_prefix("convert_half", Builtin::Call(convert_half));
    registry.add_prefix("convert_float", Builtin::Call(convert_float));
    registry.add_prefix("convert_double", Builtin::Call(convert_float));
    registry.add_prefix("convert_u", Builtin::Call(convert_uint));
    registry.add_prefix("convert_", Builtin::Call(convert_sint));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Operand, OperandList};
    use crate::memory::{AddressSpace, Memory};
    use crate::workitem::StandaloneWorkItem;
    use std::sync::Arc;

    fn convert(name: &str, overload: &str, arg: Operand, mut result: TypedValue) -> TypedValue {
        let registry = BuiltinRegistry::new();
        let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        registry
            .dispatch(name, overload, &OperandList::new().with(arg), &mut item, &mut result)
            .unwrap();
        result
    }

    #[test]
    fn test_float_to_int_rounding_suffixes() {
        let x = || Operand::float(4, 2.5);
        assert_eq!(convert("convert_int_rte", "f", x(), TypedValue::scalar(4)).get_sint(0), 2);
        assert_eq!(convert("convert_int_rtp", "f", x(), TypedValue::scalar(4)).get_sint(0), 3);
        assert_eq!(convert("convert_int_rtn", "f", x(), TypedValue::scalar(4)).get_sint(0), 2);
        assert_eq!(convert("convert_int", "f", x(), TypedValue::scalar(4)).get_sint(0), 2);

        let negative = Operand::float(4, -2.5);
        assert_eq!(convert("convert_int", "f", negative.clone(), TypedValue::scalar(4)).get_sint(0), -2);
        assert_eq!(convert("convert_int_rtn", "f", negative, TypedValue::scalar(4)).get_sint(0), -3);
        assert_eq!(fenv::current(), RoundingMode::NearestEven);
    }

    #[test]
    fn test_saturating_unsigned() {
        let r = convert("convert_uchar_sat", "i", Operand::sint(4, 300), TypedValue::scalar(1));
        assert_eq!(r.get_uint(0), 255);
        let r = convert("convert_uchar_sat", "i", Operand::sint(4, -5), TypedValue::scalar(1));
        assert_eq!(r.get_uint(0), 0);
        let r = convert("convert_ushort_sat", "f", Operand::float(4, 1e9), TypedValue::scalar(2));
        assert_eq!(r.get_uint(0), 0xFFFF);
        let r = convert("convert_uint_sat", "f", Operand::float(4, f64::NAN), TypedValue::scalar(4));
        assert_eq!(r.get_uint(0), 0);
        let r = convert("convert_ulong_sat", "d", Operand::float(8, 1e30), TypedValue::scalar(8));
        assert_eq!(r.get_uint(0), u64::MAX);
    }

    #[test]
    fn test_saturating_signed() {
        let r = convert("convert_char_sat", "j", Operand::uint(4, 200), TypedValue::scalar(1));
        assert_eq!(r.get_sint(0), 127);
        let r = convert("convert_short_sat", "i", Operand::sint(4, -40000), TypedValue::scalar(2));
        assert_eq!(r.get_sint(0), -32768);
        let r = convert("convert_int_sat_rte", "d", Operand::float(8, -1e12), TypedValue::scalar(4));
        assert_eq!(r.get_sint(0), i32::MIN as i64);
    }

    #[test]
    fn test_non_saturating_wraps() {
        let r = convert("convert_uchar", "i", Operand::sint(4, 300), TypedValue::scalar(1));
        assert_eq!(r.get_uint(0), 44);
        let r = convert("convert_uint", "i", Operand::sint(4, -1), TypedValue::scalar(4));
        assert_eq!(r.get_uint(0), 0xFFFF_FFFF);
    }

    #[test]
    fn test_vector_conversion() {
        let arg = Operand::float_vector(4, &[0.9, -0.9, 7.5, 1e10]);
        let r = convert("convert_char4_sat", "Dv4_f", arg, TypedValue::new(1, 4));
        assert_eq!((0..4).map(|i| r.get_sint(i)).collect::<Vec<_>>(), vec![0, 0, 7, 127]);
    }

    #[test]
    fn test_to_float_directed() {
        let x = 1.0 + 2f64.powi(-30);
        let up = convert("convert_float_rtp", "d", Operand::float(8, x), TypedValue::scalar(4));
        assert_eq!(up.get_float(0) as f32, f32::from_bits(1.0f32.to_bits() + 1));
        let nearest = convert("convert_float", "d", Operand::float(8, x), TypedValue::scalar(4));
        assert_eq!(nearest.get_float(0), 1.0);

        let d = convert("convert_double", "i", Operand::sint(4, -7), TypedValue::scalar(8));
        assert_eq!(d.get_float(0), -7.0);
    }

    #[test]
    fn test_to_half() {
        let x = 1.0 + 2f64.powi(-12);
        let rtz = convert("convert_half_rtz", "f", Operand::float(4, x), TypedValue::scalar(2));
        let rtp = convert("convert_half_rtp", "f", Operand::float(4, x), TypedValue::scalar(2));
        assert_eq!(rtz.get_float(0), 1.0);
        assert_eq!(rtp.get_uint(0), rtz.get_uint(0) + 1);
    }
}
