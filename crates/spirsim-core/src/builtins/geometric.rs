//! Geometric functions over float vectors
//!
//! Reductions (`dot`, `distance`, `length`) run over the lanes of the first
//! argument; the result is a scalar.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::Result;
use crate::value::TypedValue;

fn cross(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let u = [call.float(0, 0)?, call.float(0, 1)?, call.float(0, 2)?];
    let v = [call.float(1, 0)?, call.float(1, 1)?, call.float(1, 2)?];
    result.set_float(0, u[1] * v[2] - u[2] * v[1]);
    result.set_float(1, u[2] * v[0] - u[0] * v[2]);
    result.set_float(2, u[0] * v[1] - u[1] * v[0]);
    if result.num() > 3 {
        result.set_float(3, 0.0);
    }
    Ok(())
}

fn dot(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut sum = 0.0;
    for i in 0..call.width(0)? {
        sum += call.float(0, i)? * call.float(1, i)?;
    }
    result.set_float(0, sum);
    Ok(())
}

fn distance(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut sum = 0.0;
    for i in 0..call.width(0)? {
        let diff = call.float(0, i)? - call.float(1, i)?;
        sum += diff * diff;
    }
    result.set_float(0, sum.sqrt());
    Ok(())
}

fn length(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut sum = 0.0;
    for i in 0..call.width(0)? {
        let x = call.float(0, i)?;
        sum += x * x;
    }
    result.set_float(0, sum.sqrt());
    Ok(())
}

fn normalize(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let mut sum = 0.0;
    for i in 0..result.num() {
        let x = call.float(0, i)?;
        sum += x * x;
    }
    let length = sum.sqrt();
    for i in 0..result.num() {
        result.set_float(i, call.float(0, i)? / length);
    }
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("cross", Builtin::Call(cross));
    registry.add("dot", Builtin::Call(dot));
    registry.add("distance", Builtin::Call(distance));
    registry.add("length", Builtin::Call(length));
    registry.add("normalize", Builtin::Call(normalize));
    registry.add("fast_distance", Builtin::Call(distance));
    registry.add("fast_length", Builtin::Call(length));
    registry.add("fast_normalize", Builtin::Call(normalize));
}
