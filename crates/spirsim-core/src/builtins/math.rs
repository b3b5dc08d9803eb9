//! Math functions
//!
//! Every lane is computed in double precision and narrowed to the result
//! lane type on store. Functions `std` lacks come from `libm`. Builtins with
//! a pointer output (`fract`, `frexp`, `lgamma_r`, `modf`, `remquo`,
//! `sincos`) write one lane per element through the pointer argument.
//! `half_*` and `native_*` variants share the full-precision code.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::fenv;
use crate::value::TypedValue;
use std::f64::consts::PI;

// ================================================================================================
// Scalar Functions
// ================================================================================================

fn acospi(x: f64) -> f64 {
    x.acos() / PI
}

fn asinpi(x: f64) -> f64 {
    x.asin() / PI
}

fn atanpi(x: f64) -> f64 {
    x.atan() / PI
}

fn atan2pi(y: f64, x: f64) -> f64 {
    y.atan2(x) / PI
}

fn cospi(x: f64) -> f64 {
    (x * PI).cos()
}

fn sinpi(x: f64) -> f64 {
    (x * PI).sin()
}

fn tanpi(x: f64) -> f64 {
    (x * PI).tan()
}

fn exp10(x: f64) -> f64 {
    10f64.powf(x)
}

fn divide(x: f64, y: f64) -> f64 {
    x / y
}

fn recip(x: f64) -> f64 {
    1.0 / x
}

fn rsqrt(x: f64) -> f64 {
    1.0 / x.sqrt()
}

/// Unbiased exponent of `x` as a float.
fn logb(x: f64) -> f64 {
    if x == 0.0 {
        f64::NEG_INFINITY
    } else if x.is_infinite() {
        f64::INFINITY
    } else if x.is_nan() {
        x
    } else {
        libm::ilogb(x) as f64
    }
}

fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

fn maxmag(x: f64, y: f64) -> f64 {
    let (ax, ay) = (x.abs(), y.abs());
    if ax > ay {
        x
    } else if ay > ax {
        y
    } else {
        x.max(y)
    }
}

fn minmag(x: f64, y: f64) -> f64 {
    let (ax, ay) = (x.abs(), y.abs());
    if ax < ay {
        x
    } else if ay < ax {
        y
    } else {
        x.min(y)
    }
}

// ================================================================================================
// Integer-Argument Functions
// ================================================================================================

fn ilogb(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        result.set_sint(i, libm::ilogb(call.float(0, i)?) as i64);
    }
    Ok(())
}

fn ldexp(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let exponent = call.sint(1, i)?.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        result.set_float(i, libm::ldexp(call.float(0, i)?, exponent));
    }
    Ok(())
}

fn nan(_call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        result.set_float(i, f64::NAN);
    }
    Ok(())
}

fn pown(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let n = call.sint(1, i)? as i32;
        result.set_float(i, call.float(0, i)?.powf(n as f64));
    }
    Ok(())
}

fn rootn(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let n = call.sint(1, i)? as i32;
        result.set_float(i, call.float(0, i)?.powf(1.0 / n as f64));
    }
    Ok(())
}

// ================================================================================================
// Pointer-Output Functions
// ================================================================================================

/// Store `value` as lane `element` of the `size`-byte float array at operand `pointer`.
fn store_float(call: &Call<'_>, pointer: usize, element: usize, size: usize, value: f64) -> Result<()> {
    let address = call.element_address(pointer, element as u64, size as u64)?;
    let mut lane = TypedValue::scalar(size);
    lane.set_float(0, value);
    call.memory_for(pointer)?.store(lane.bytes(), address)
}

fn store_int(call: &Call<'_>, pointer: usize, element: usize, value: i32) -> Result<()> {
    let address = call.element_address(pointer, element as u64, 4)?;
    call.memory_for(pointer)?.store(&value.to_le_bytes(), address)
}

fn fract(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let size = result.size();
    // Largest value below 1.0 at the result's precision.
    let below_one = if size == 8 {
        f64::from_bits(0x3FEF_FFFF_FFFF_FFFF)
    } else {
        f32::from_bits(0x3F7F_FFFF) as f64
    };
    for i in 0..result.num() {
        let x = call.float(0, i)?;
        let floor = x.floor();
        store_float(call, 1, i, size, floor)?;
        result.set_float(i, (x - floor).min(below_one));
    }
    Ok(())
}

fn frexp(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (mantissa, exponent) = libm::frexp(call.float(0, i)?);
        store_int(call, 1, i, exponent)?;
        result.set_float(i, mantissa);
    }
    Ok(())
}

fn lgamma_r(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (value, sign) = libm::lgamma_r(call.float(0, i)?);
        store_int(call, 1, i, if sign < 0 { -1 } else { 1 })?;
        result.set_float(i, value);
    }
    Ok(())
}

fn modf(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let size = result.size();
    for i in 0..result.num() {
        let x = call.float(0, i)?;
        let integral = x.trunc();
        let fractional = if x.is_infinite() { 0.0 } else { x - integral };
        store_float(call, 1, i, size, integral)?;
        result.set_float(i, fractional.copysign(x));
    }
    Ok(())
}

fn remquo(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    for i in 0..result.num() {
        let (remainder, quotient) = libm::remquo(call.float(0, i)?, call.float(1, i)?);
        store_int(call, 2, i, quotient)?;
        result.set_float(i, remainder);
    }
    Ok(())
}

fn sincos(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let size = result.size();
    for i in 0..result.num() {
        let (sin, cos) = call.float(0, i)?.sin_cos();
        store_float(call, 1, i, size, cos)?;
        result.set_float(i, sin);
    }
    Ok(())
}

// ================================================================================================
// Registration
// ================================================================================================

pub(super) fn register(registry: &mut BuiltinRegistry) {
    let unary: [(&'static str, fn(f64) -> f64); 42] = [
        ("acos", f64::acos),
        ("acosh", f64::acosh),
        ("acospi", acospi),
        ("asin", f64::asin),
        ("asinh", f64::asinh),
        ("asinpi", asinpi),
        ("atan", f64::atan),
        ("atanh", f64::atanh),
        ("atanpi", atanpi),
        ("cbrt", f64::cbrt),
        ("ceil", f64::ceil),
        ("cos", f64::cos),
        ("cosh", f64::cosh),
        ("cospi", cospi),
        ("erfc", libm::erfc),
        ("erf", libm::erf),
        ("exp", f64::exp),
        ("exp2", f64::exp2),
        ("exp10", exp10),
        ("expm1", f64::exp_m1),
        ("fabs", f64::abs),
        ("floor", f64::floor),
        ("lgamma", libm::lgamma),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("log1p", f64::ln_1p),
        ("logb", logb),
        ("rint", fenv::rint),
        ("round", f64::round),
        ("rsqrt", rsqrt),
        ("sin", f64::sin),
        ("sinh", f64::sinh),
        ("sinpi", sinpi),
        ("sqrt", f64::sqrt),
        ("tan", f64::tan),
        ("tanh", f64::tanh),
        ("tanpi", tanpi),
        ("tgamma", libm::tgamma),
        ("trunc", f64::trunc),
        ("native_recip", recip),
        ("half_recip", recip),
    ];
    for (name, f) in unary {
        registry.add(name, Builtin::F1(f));
    }

    let binary: [(&'static str, fn(f64, f64) -> f64); 16] = [
        ("atan2", f64::atan2),
        ("atan2pi", atan2pi),
        ("copysign", f64::copysign),
        ("fdim", libm::fdim),
        ("fmax", f64::max),
        ("fmin", f64::min),
        ("fmod", fmod),
        ("hypot", f64::hypot),
        ("maxmag", maxmag),
        ("minmag", minmag),
        ("nextafter", libm::nextafter),
        ("pow", f64::powf),
        ("powr", f64::powf),
        ("remainder", libm::remainder),
        ("half_divide", divide),
        ("native_divide", divide),
    ];
    for (name, f) in binary {
        registry.add(name, Builtin::F2(f));
    }

    registry.add("fma", Builtin::F3(f64::mul_add));
    registry.add("mad", Builtin::F3(f64::mul_add));

    // Reduced-precision variants run at full precision.
    let reduced: [(&'static str, &'static str, Builtin); 12] = [
        ("half_cos", "native_cos", Builtin::F1(f64::cos)),
        ("half_exp", "native_exp", Builtin::F1(f64::exp)),
        ("half_exp2", "native_exp2", Builtin::F1(f64::exp2)),
        ("half_exp10", "native_exp10", Builtin::F1(exp10)),
        ("half_log", "native_log", Builtin::F1(f64::ln)),
        ("half_log2", "native_log2", Builtin::F1(f64::log2)),
        ("half_log10", "native_log10", Builtin::F1(f64::log10)),
        ("half_powr", "native_powr", Builtin::F2(f64::powf)),
        ("half_rsqrt", "native_rsqrt", Builtin::F1(rsqrt)),
        ("half_sin", "native_sin", Builtin::F1(f64::sin)),
        ("half_sqrt", "native_sqrt", Builtin::F1(f64::sqrt)),
        ("half_tan", "native_tan", Builtin::F1(f64::tan)),
    ];
    for (half, native, builtin) in reduced {
        registry.add(half, builtin);
        registry.add(native, builtin);
    }

    registry.add("fract", Builtin::Call(fract));
    registry.add("frexp", Builtin::Call(frexp));
    registry.add("ilogb", Builtin::Call(ilogb));
    registry.add("ldexp", Builtin::Call(ldexp));
    registry.add("lgamma_r", Builtin::Call(lgamma_r));
    registry.add("modf", Builtin::Call(modf));
    registry.add("nan", Builtin::Call(nan));
    registry.add("pown", Builtin::Call(pown));
    registry.add("remquo", Builtin::Call(remquo));
    registry.add("rootn", Builtin::Call(rootn));
    registry.add("sincos", Builtin::Call(sincos));
}
