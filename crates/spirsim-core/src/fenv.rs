//! Floating-point rounding environment for conversion builtins
//!
//! Conversions such as `convert_int_rtp` or `vstore_half_rtz` select a
//! rounding direction for the duration of one builtin call. The host FPU
//! mode is not touched: the current mode is a thread-local value and every
//! rounding-sensitive operation in this crate consults it explicitly.
//!
//! A [`RoundingGuard`] sets the mode and restores the previous one when it
//! is dropped, so early returns and `?` never leak a directed mode into the
//! next builtin.

use half::f16;
use std::cell::Cell;

/// IEEE rounding directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// Round to nearest, ties to even (`_rte`).
    #[default]
    NearestEven,
    /// Round toward zero (`_rtz`).
    TowardZero,
    /// Round toward positive infinity (`_rtp`).
    Upward,
    /// Round toward negative infinity (`_rtn`).
    Downward,
}

impl RoundingMode {
    /// Rounding mode named by a `_rte`/`_rtz`/`_rtp`/`_rtn` suffix anywhere in `name`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.contains("_rte") {
            Some(Self::NearestEven)
        } else if name.contains("_rtz") {
            Some(Self::TowardZero)
        } else if name.contains("_rtp") {
            Some(Self::Upward)
        } else if name.contains("_rtn") {
            Some(Self::Downward)
        } else {
            None
        }
    }

    /// Round `x` to an integral value in this mode.
    pub fn round(self, x: f64) -> f64 {
        match self {
            Self::NearestEven => x.round_ties_even(),
            Self::TowardZero => x.trunc(),
            Self::Upward => x.ceil(),
            Self::Downward => x.floor(),
        }
    }
}

thread_local! {
    static MODE: Cell<RoundingMode> = const { Cell::new(RoundingMode::NearestEven) };
}

/// Rounding mode in effect on this thread.
pub fn current() -> RoundingMode {
    MODE.with(Cell::get)
}

/// Scoped override of the thread's rounding mode.
#[must_use = "the rounding mode is restored as soon as the guard is dropped"]
pub struct RoundingGuard {
    previous: RoundingMode,
}

impl RoundingGuard {
    pub fn new(mode: RoundingMode) -> Self {
        let previous = MODE.with(|m| m.replace(mode));
        Self { previous }
    }
}

impl Drop for RoundingGuard {
    fn drop(&mut self) {
        MODE.with(|m| m.set(self.previous));
    }
}

/// Round to an integral value using the current mode (C `rint`).
pub fn rint(x: f64) -> f64 {
    current().round(x)
}

// ================================================================================================
// Directed Narrowing
// ================================================================================================

// Step a sign-magnitude bit pattern one ulp up or down in value.
fn step_bits(bits: u64, sign_bit: u64, up: bool) -> u64 {
    let negative = bits & sign_bit != 0;
    let magnitude = bits & !sign_bit;
    match (negative, up) {
        (false, true) => bits + 1,
        (true, false) => bits + 1,
        (false, false) if magnitude == 0 => sign_bit | 1,
        (true, true) if magnitude == 0 => 1,
        _ => bits - 1,
    }
}

// Adjust a round-to-nearest result so it honours `mode`.
fn direct(nearest: f64, exact: f64, bits: u64, sign_bit: u64, mode: RoundingMode) -> u64 {
    if nearest == exact || exact.is_nan() {
        return bits;
    }
    match mode {
        RoundingMode::Upward if nearest < exact => step_bits(bits, sign_bit, true),
        RoundingMode::Downward if nearest > exact => step_bits(bits, sign_bit, false),
        RoundingMode::TowardZero if nearest.abs() > exact.abs() => step_bits(bits, sign_bit, nearest < 0.0),
        _ => bits,
    }
}

/// Narrow `x` to single precision in the given mode.
pub fn to_f32(x: f64, mode: RoundingMode) -> f32 {
    let nearest = x as f32;
    let bits = direct(nearest as f64, x, nearest.to_bits() as u64, 1 << 31, mode);
    f32::from_bits(bits as u32)
}

/// Narrow `x` to half precision bits in the given mode.
pub fn to_half_bits(x: f64, mode: RoundingMode) -> u16 {
    let nearest = f16::from_f64(x);
    let bits = direct(nearest.to_f64(), x, nearest.to_bits() as u64, 1 << 15, mode);
    bits as u16
}
