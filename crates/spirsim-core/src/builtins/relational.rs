//! Relational functions
//!
//! Comparisons return `1`/`0` for scalars and `-1`/`0` per lane for vectors.
//! `all`, `any` and vector `select` test the most significant bit of each
//! lane.

use super::call::Call;
use super::elementwise::{self, relational_true};
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::value::TypedValue;
use half::f16;

fn is_equal(x: f64, y: f64) -> bool {
    x == y
}

fn is_not_equal(x: f64, y: f64) -> bool {
    x != y
}

fn is_greater(x: f64, y: f64) -> bool {
    x > y
}

fn is_greater_equal(x: f64, y: f64) -> bool {
    x >= y
}

fn is_less(x: f64, y: f64) -> bool {
    x < y
}

fn is_less_equal(x: f64, y: f64) -> bool {
    x <= y
}

fn is_less_greater(x: f64, y: f64) -> bool {
    x < y || x > y
}

fn is_ordered(x: f64, y: f64) -> bool {
    !x.is_nan() && !y.is_nan()
}

fn is_unordered(x: f64, y: f64) -> bool {
    x.is_nan() || y.is_nan()
}

fn is_finite(x: f64) -> bool {
    x.is_finite()
}

fn is_inf(x: f64) -> bool {
    x.is_infinite()
}

fn is_nan(x: f64) -> bool {
    x.is_nan()
}

fn sign_bit(x: f64) -> bool {
    x.is_sign_negative()
}

/// `isnormal` is judged at the argument's own precision: a subnormal float
/// widens to a normal double.
fn isnormal(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let size = call.value(0)?.size();
    let t = relational_true(result);
    for i in 0..result.num() {
        let x = call.float(0, i)?;
        let normal = match size {
            2 => f16::from_f64(x).is_normal(),
            4 => (x as f32).is_normal(),
            _ => x.is_normal(),
        };
        result.set_sint(i, if normal { t } else { 0 });
    }
    Ok(())
}

/// Number of lanes `all`/`any` inspect.
fn tested_lanes(call: &Call<'_>) -> Result<usize> {
    if call.is_vector(0) {
        call.width(0)
    } else {
        Ok(1)
    }
}

fn all(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut every = true;
    for i in 0..tested_lanes(call)? {
        every &= call.sint(0, i)? < 0;
    }
    result.set_sint(0, every as i64);
    Ok(())
}

fn any(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut some = false;
    for i in 0..tested_lanes(call)? {
        some |= call.sint(0, i)? < 0;
    }
    result.set_sint(0, some as i64);
    Ok(())
}

fn select_bits(a: u64, b: u64, c: u64) -> u64 {
    (a & !c) | (b & c)
}

/// `bitselect` on IEEE doubles, through their bit patterns.
fn bitselect_f64(a: f64, b: f64, c: f64) -> f64 {
    f64::from_bits(select_bits(a.to_bits(), b.to_bits(), c.to_bits()))
}

fn bitselect_f32(a: f32, b: f32, c: f32) -> f32 {
    let bits = select_bits(a.to_bits() as u64, b.to_bits() as u64, c.to_bits() as u64);
    f32::from_bits(bits as u32)
}

fn bitselect(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    match call.arg_letter()? {
        'd' => elementwise::f3(call, result, bitselect_f64),
        'f' => {
            for i in 0..result.num() {
                let (a, b, c) = (call.float(0, i)?, call.float(1, i)?, call.float(2, i)?);
                result.set_float(i, bitselect_f32(a as f32, b as f32, c as f32) as f64);
            }
            Ok(())
        }
        // Half lanes are selected through their raw bits like integers.
        'D' | 'h' | 't' | 'j' | 'm' | 'c' | 'a' | 's' | 'i' | 'l' => elementwise::u3(call, result, select_bits),
        _ => Err(call.unsupported()),
    }
}

fn select(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let letter = call.arg_letter()?;
    let vector = result.num() > 1;
    for i in 0..result.num() {
        let c = call.sint(2, i)?;
        let pick = if vector { c < 0 } else { c != 0 };
        let source = if pick { 1 } else { 0 };
        match letter {
            'f' | 'd' | 'D' => result.set_float(i, call.float(source, i)?),
            'h' | 't' | 'j' | 'm' | 'c' | 'a' | 's' | 'i' | 'l' => result.set_sint(i, call.sint(source, i)?),
            _ => return Err(call.unsupported()),
        }
    }
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("all", Builtin::Call(all));
    registry.add("any", Builtin::Call(any));
    registry.add("bitselect", Builtin::Call(bitselect));
    registry.add("select", Builtin::Call(select));

    registry.add("isequal", Builtin::Rel2(is_equal));
    registry.add("isnotequal", Builtin::Rel2(is_not_equal));
    registry.add("isgreater", Builtin::Rel2(is_greater));
    registry.add("isgreaterequal", Builtin::Rel2(is_greater_equal));
    registry.add("isless", Builtin::Rel2(is_less));
    registry.add("islessequal", Builtin::Rel2(is_less_equal));
    registry.add("islessgreater", Builtin::Rel2(is_less_greater));
    registry.add("isordered", Builtin::Rel2(is_ordered));
    registry.add("isunordered", Builtin::Rel2(is_unordered));
    registry.add("isfinite", Builtin::Rel1(is_finite));
    registry.add("isinf", Builtin::Rel1(is_inf));
    registry.add("isnan", Builtin::Rel1(is_nan));
    registry.add("isnormal", Builtin::Call(isnormal));
    registry.add("signbit", Builtin::Rel1(sign_bit));
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
    fn test_comparison_truth_values() {
        let scalar = run(
            "isless",
            "ff",
            vec![Operand::float(4, 1.0), Operand::float(4, 2.0)],
            TypedValue::scalar(4),
        );
        assert_eq!(scalar.get_sint(0), 1);

        let vector = run(
            "isless",
            "Dv2_fS_",
            vec![
                Operand::float_vector(4, &[1.0, 3.0]),
                Operand::float_vector(4, &[2.0, 2.0]),
            ],
            TypedValue::new(4, 2),
        );
        assert_eq!(vector.get_sint(0), -1);
        assert_eq!(vector.get_sint(1), 0);
    }

    #[test]
    fn test_nan_is_unordered() {
        let args = vec![Operand::float(8, f64::NAN), Operand::float(8, 1.0)];
        assert_eq!(run("isunordered", "dd", args.clone(), TypedValue::scalar(4)).get_sint(0), 1);
        assert_eq!(run("islessgreater", "dd", args.clone(), TypedValue::scalar(4)).get_sint(0), 0);
        assert_eq!(run("isnotequal", "dd", args, TypedValue::scalar(4)).get_sint(0), 1);
    }

    #[test]
    fn test_isnormal_uses_argument_precision() {
        let subnormal = f32::from_bits(1) as f64;
        let result = run("isnormal", "f", vec![Operand::float(4, subnormal)], TypedValue::scalar(4));
        assert_eq!(result.get_sint(0), 0);
        let result = run("isnormal", "d", vec![Operand::float(8, subnormal)], TypedValue::scalar(4));
        assert_eq!(result.get_sint(0), 1);
    }

    #[test]
    fn test_all_any_test_sign_bits() {
        let mixed = Operand::sint_vector(1, &[-1, 0, -128, 5]);
        assert_eq!(run("all", "Dv4_c", vec![mixed.clone()], TypedValue::scalar(4)).get_sint(0), 0);
        assert_eq!(run("any", "Dv4_c", vec![mixed], TypedValue::scalar(4)).get_sint(0), 1);

        let set = Operand::sint_vector(4, &[-1, i32::MIN as i64]);
        assert_eq!(run("all", "Dv2_i", vec![set], TypedValue::scalar(4)).get_sint(0), 1);
        assert_eq!(run("any", "i", vec![Operand::sint(4, 1)], TypedValue::scalar(4)).get_sint(0), 0);
    }

    #[test]
    fn test_bitselect() {
        let args = vec![Operand::uint(4, 0xFF00_FF00), Operand::uint(4, 0x00FF_00FF), Operand::uint(4, 0x0F0F_0F0F)];
        assert_eq!(run("bitselect", "jjj", args, TypedValue::scalar(4)).get_uint(0), 0xF00F_F00F);

        // Sign bit from b, everything else from a.
        let args = vec![Operand::float(4, 2.0), Operand::float(4, -1.0), Operand::float(4, -0.0)];
        assert_eq!(run("bitselect", "fff", args, TypedValue::scalar(4)).get_float(0), -2.0);
        let args = vec![Operand::float(8, 2.0), Operand::float(8, -1.0), Operand::float(8, -0.0)];
        assert_eq!(run("bitselect", "ddd", args, TypedValue::scalar(8)).get_float(0), -2.0);
        assert_eq!(bitselect_f64(1.5, 3.0, 0.0), 1.5);
    }

    #[test]
    fn test_select_scalar_and_vector() {
        let args = vec![Operand::sint(4, 10), Operand::sint(4, 20), Operand::sint(4, 2)];
        assert_eq!(run("select", "iii", args, TypedValue::scalar(4)).get_sint(0), 20);

        // Vector conditions look at the top bit only.
        let args = vec![
            Operand::float_vector(4, &[1.0, 2.0]),
            Operand::float_vector(4, &[3.0, 4.0]),
            Operand::sint_vector(4, &[2, -1]),
        ];
        let result = run("select", "Dv2_fS_Dv2_i", args, TypedValue::new(4, 2));
        assert_eq!(result.get_float(0), 1.0);
        assert_eq!(result.get_float(1), 4.0);
    }
}
