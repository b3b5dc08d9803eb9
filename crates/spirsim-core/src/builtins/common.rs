//! Common functions: `clamp`, `min`, `max`, `mix`, `step`, `smoothstep`,
//! `degrees`, `radians`, `sign`

use super::call::Call;
use super::elementwise;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::value::TypedValue;
use std::f64::consts::PI;

fn max_of<T: PartialOrd>(a: T, b: T) -> T {
    if a > b {
        a
    } else {
        b
    }
}

fn min_of<T: PartialOrd>(a: T, b: T) -> T {
    if a < b {
        a
    } else {
        b
    }
}

fn clamp_of<T: PartialOrd>(x: T, lo: T, hi: T) -> T {
    min_of(max_of(x, lo), hi)
}

fn degrees(x: f64) -> f64 {
    x * (180.0 / PI)
}

fn radians(x: f64) -> f64 {
    x * (PI / 180.0)
}

/// `sign` keeps the sign of zero and maps NaN to 0.
fn sign(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x
    }
}

enum Family {
    Float,
    Unsigned,
    Signed,
}

fn family(call: &Call<'_>) -> Result<Family> {
    match call.arg_letter()? {
        'f' | 'd' | 'D' => Ok(Family::Float),
        'h' | 't' | 'j' | 'm' => Ok(Family::Unsigned),
        'c' | 'a' | 's' | 'i' | 'l' => Ok(Family::Signed),
        _ => Err(call.unsupported()),
    }
}

fn clamp(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    match family(call)? {
        // A vector bound is applied lane by lane, a scalar bound is broadcast.
        Family::Float if call.is_vector(1) => elementwise::f3(call, result, clamp_of::<f64>),
        Family::Float => {
            let (lo, hi) = (call.float(1, 0)?, call.float(2, 0)?);
            for i in 0..result.num() {
                result.set_float(i, clamp_of(call.float(0, i)?, lo, hi));
            }
            Ok(())
        }
        Family::Unsigned => elementwise::u3(call, result, clamp_of::<u64>),
        Family::Signed => elementwise::s3(call, result, clamp_of::<i64>),
    }
}

fn max(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    match family(call)? {
        Family::Float if call.is_vector(1) => elementwise::f2(call, result, f64::max),
        Family::Float => {
            let y = call.float(1, 0)?;
            for i in 0..result.num() {
                result.set_float(i, max_of(call.float(0, i)?, y));
            }
            Ok(())
        }
        Family::Unsigned => elementwise::u2(call, result, max_of::<u64>),
        Family::Signed => elementwise::s2(call, result, max_of::<i64>),
    }
}

fn min(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    match family(call)? {
        Family::Float if call.is_vector(1) => elementwise::f2(call, result, f64::min),
        Family::Float => {
            let y = call.float(1, 0)?;
            for i in 0..result.num() {
                result.set_float(i, min_of(call.float(0, i)?, y));
            }
            Ok(())
        }
        Family::Unsigned => elementwise::u2(call, result, min_of::<u64>),
        Family::Signed => elementwise::s2(call, result, min_of::<i64>),
    }
}

fn mix(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (x, y, a) = (call.float(0, i)?, call.float(1, i)?, call.float(2, i)?);
        result.set_float(i, x + (y - x) * a);
    }
    Ok(())
}

fn smoothstep(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (edge0, edge1, x) = (call.float(0, i)?, call.float(1, i)?, call.float(2, i)?);
        let t = clamp_of((x - edge0) / (edge1 - edge0), 0.0, 1.0);
        result.set_float(i, t * t * (3.0 - 2.0 * t));
    }
    Ok(())
}

fn step(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (edge, x) = (call.float(0, i)?, call.float(1, i)?);
        result.set_float(i, if x < edge { 0.0 } else { 1.0 });
    }
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("clamp", Builtin::Call(clamp));
    registry.add("degrees", Builtin::F1(degrees));
    registry.add("max", Builtin::Call(max));
    registry.add("min", Builtin::Call(min));
    registry.add("mix", Builtin::Call(mix));
    registry.add("radians", Builtin::F1(radians));
    registry.add("sign", Builtin::F1(sign));
    registry.add("smoothstep", Builtin::Call(smoothstep));
    registry.add("step", Builtin::Call(step));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Operand, OperandList};
    use crate::memory::{AddressSpace, Memory};
    use crate::workitem::StandaloneWorkItem;
    use std::sync::Arc;

    fn run(name: &str, overload: &str, args: Vec<Operand>, mut result: TypedValue) -> TypedValue {
        let registry = BuiltinRegistry::new();
        let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        registry
            .dispatch(name, overload, &OperandList::from(args), &mut item, &mut result)
            .unwrap();
        result
    }

    #[test]
    fn test_integer_clamp() {
        let args = vec![Operand::uint(4, 5), Operand::uint(4, 1), Operand::uint(4, 3)];
        assert_eq!(run("clamp", "jjj", args, TypedValue::scalar(4)).get_uint(0), 3);

        let args = vec![Operand::sint(4, -5), Operand::sint(4, -1), Operand::sint(4, 3)];
        assert_eq!(run("clamp", "iii", args, TypedValue::scalar(4)).get_sint(0), -1);
    }

    #[test]
    fn test_float_clamp_with_scalar_bounds() {
        let args = vec![
            Operand::float_vector(4, &[-2.0, 0.5, 7.0]),
            Operand::float(4, 0.0),
            Operand::float(4, 1.0),
        ];
        let result = run("clamp", "Dv3_fff", args, TypedValue::new(4, 3));
        assert_eq!(
            (0..3).map(|i| result.get_float(i)).collect::<Vec<_>>(),
            vec![0.0, 0.5, 1.0]
        );
    }

    #[test]
    fn test_vector_max_ignores_nan() {
        let args = vec![
            Operand::float_vector(4, &[f64::NAN, 1.0]),
            Operand::float_vector(4, &[2.0, 3.0]),
        ];
        let result = run("max", "Dv2_fS_", args, TypedValue::new(4, 2));
        assert_eq!(result.get_float(0), 2.0);
        assert_eq!(result.get_float(1), 3.0);
    }

    #[test]
    fn test_signed_min() {
        let args = vec![Operand::sint(1, -128), Operand::sint(1, 5)];
        assert_eq!(run("min", "cc", args, TypedValue::scalar(1)).get_sint(0), -128);
    }

    #[test]
    fn test_sign_and_step() {
        assert_eq!(sign(-3.0), -1.0);
        assert!(sign(-0.0).is_sign_negative());
        assert_eq!(sign(f64::NAN), 0.0);

        let args = vec![Operand::float(4, 0.5), Operand::float_vector(4, &[0.25, 0.75])];
        let result = run("step", "fDv2_f", args, TypedValue::new(4, 2));
        assert_eq!(result.get_float(0), 0.0);
        assert_eq!(result.get_float(1), 1.0);
    }

    #[test]
    fn test_mix_and_smoothstep() {
        let args = vec![Operand::float(4, 2.0), Operand::float(4, 4.0), Operand::float(4, 0.25)];
        assert_eq!(run("mix", "fff", args, TypedValue::scalar(4)).get_float(0), 2.5);

        let args = vec![Operand::float(4, 0.0), Operand::float(4, 1.0), Operand::float(4, 0.5)];
        assert_eq!(run("smoothstep", "fff", args, TypedValue::scalar(4)).get_float(0), 0.5);
    }

    #[test]
    fn test_unsupported_overload() {
        let registry = BuiltinRegistry::new();
        let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        let mut result = TypedValue::scalar(4);
        let operands = OperandList::new().with(Operand::uint(4, 1)).with(Operand::uint(4, 2));
        let err = registry
            .dispatch("max", "PU3AS1j", &operands, &mut item, &mut result)
            .unwrap_err();
        assert!(matches!(err, crate::error::SimError::UnsupportedOverload { .. }));
    }
}
