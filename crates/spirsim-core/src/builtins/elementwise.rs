//! Lane-wise application of scalar functions
//!
//! Most math and integer builtins are a scalar function applied to every
//! lane of the result. These helpers read lane `i` of each argument
//! (broadcasting scalars), call the function and store the result.

use super::call::Call;
use crate::error::Result;
use crate::value::TypedValue;

pub fn f1(call: &Call<'_>, result: &mut TypedValue, func: fn(f64) -> f64) -> Result<()> {
    for i in 0..result.num() {
        result.set_float(i, func(call.float(0, i)?));
    }
    Ok(())
}

pub fn f2(call: &Call<'_>, result: &mut TypedValue, func: fn(f64, f64) -> f64) -> Result<()> {
    for i in 0..result.num() {
        result.set_float(i, func(call.float(0, i)?, call.float(1, i)?));
    }
    Ok(())
}

pub fn f3(call: &Call<'_>, result: &mut TypedValue, func: fn(f64, f64, f64) -> f64) -> Result<()> {
    for i in 0..result.num() {
        result.set_float(i, func(call.float(0, i)?, call.float(1, i)?, call.float(2, i)?));
    }
    Ok(())
}

pub fn u1(call: &Call<'_>, result: &mut TypedValue, func: fn(u64) -> u64) -> Result<()> {
    for i in 0..result.num() {
        result.set_uint(i, func(call.uint(0, i)?));
    }
    Ok(())
}

pub fn u2(call: &Call<'_>, result: &mut TypedValue, func: fn(u64, u64) -> u64) -> Result<()> {
    for i in 0..result.num() {
        result.set_uint(i, func(call.uint(0, i)?, call.uint(1, i)?));
    }
    Ok(())
}

pub fn u3(call: &Call<'_>, result: &mut TypedValue, func: fn(u64, u64, u64) -> u64) -> Result<()> {
    for i in 0..result.num() {
        result.set_uint(i, func(call.uint(0, i)?, call.uint(1, i)?, call.uint(2, i)?));
    }
    Ok(())
}

pub fn s1(call: &Call<'_>, result: &mut TypedValue, func: fn(i64) -> i64) -> Result<()> {
    for i in 0..result.num() {
        result.set_sint(i, func(call.sint(0, i)?));
    }
    Ok(())
}

pub fn s2(call: &Call<'_>, result: &mut TypedValue, func: fn(i64, i64) -> i64) -> Result<()> {
    for i in 0..result.num() {
        result.set_sint(i, func(call.sint(0, i)?, call.sint(1, i)?));
    }
    Ok(())
}

pub fn s3(call: &Call<'_>, result: &mut TypedValue, func: fn(i64, i64, i64) -> i64) -> Result<()> {
    for i in 0..result.num() {
        result.set_sint(i, func(call.sint(0, i)?, call.sint(1, i)?, call.sint(2, i)?));
    }
    Ok(())
}

/// Truth value of a relational result: all bits set for vectors, 1 for scalars.
pub fn relational_true(result: &TypedValue) -> i64 {
    if result.num() > 1 {
        -1
    } else {
        1
    }
}

pub fn rel1(call: &Call<'_>, result: &mut TypedValue, func: fn(f64) -> bool) -> Result<()> {
    let t = relational_true(result);
    for i in 0..result.num() {
        result.set_sint(i, if func(call.float(0, i)?) { t } else { 0 });
    }
    Ok(())
}

pub fn rel2(call: &Call<'_>, result: &mut TypedValue, func: fn(f64, f64) -> bool) -> Result<()> {
    let t = relational_true(result);
    for i in 0..result.num() {
        result.set_sint(i, if func(call.float(0, i)?, call.float(1, i)?) { t } else { 0 });
    }
    Ok(())
}
