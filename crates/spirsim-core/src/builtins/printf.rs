//! `printf` with C formatting semantics
//!
//! The format string is read out of device memory and rendered into a byte
//! buffer that is written to the work-item's output sink in one piece.
//! Supported directives: flags `-+ #0`, width and precision (literal or
//! `*`), the vector specifier `vN`, length modifiers (accepted and ignored,
//! operands are already typed), and conversions `d i o u x X c s p f F e E
//! g G a A %`.
//!
//! A directive cut off by the end of the string is emitted as literal text
//! and ends the output.

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::{Result, SimError};
use crate::memory::Memory;
use crate::value::TypedValue;
use tracing::warn;

/// Conversion characters `printf` understands.
const CONVERSIONS: &[u8] = b"diouxXcspfFeEgGaA%";

/// Longest string read for a format or `%s` argument.
const MAX_STRING_LEN: u64 = 1 << 20;

/// Bytes of the NUL-terminated string at `address`.
fn read_c_string(memory: &Memory, address: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    for offset in 0..MAX_STRING_LEN {
        let at = address
            .checked_add(offset)
            .ok_or_else(|| SimError::invalid_address(memory.address_space(), address, offset))?;
        memory.load(&mut byte, at)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(bytes)
}

// ================================================================================================
// Directive Parsing
// ================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    /// Taken from the next argument (`*`).
    Arg,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Directive {
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    vector: Option<usize>,
    conversion: u8,
}

fn parse_number(bytes: &[u8], pos: &mut usize) -> usize {
    let mut n = 0usize;
    while let Some(d) = bytes.get(*pos).filter(|b| b.is_ascii_digit()) {
        n = n.saturating_mul(10).saturating_add((d - b'0') as usize);
        *pos += 1;
    }
    n
}

/// Parse the directive following a `%`. Returns the directive and the
/// number of bytes it spans, or `None` if the string ends first.
fn parse_directive(bytes: &[u8]) -> Option<(Directive, usize)> {
    let mut pos = 0;
    let mut flags = Flags::default();
    loop {
        match *bytes.get(pos)? {
            b'-' => flags.left = true,
            b'+' => flags.plus = true,
            b' ' => flags.space = true,
            b'#' => flags.alt = true,
            b'0' => flags.zero = true,
            _ => break,
        }
        pos += 1;
    }

    let width = match *bytes.get(pos)? {
        b'*' => {
            pos += 1;
            Some(Count::Arg)
        }
        b if b.is_ascii_digit() => Some(Count::Fixed(parse_number(bytes, &mut pos))),
        _ => None,
    };

    let mut precision = None;
    if *bytes.get(pos)? == b'.' {
        pos += 1;
        if *bytes.get(pos)? == b'*' {
            pos += 1;
            precision = Some(Count::Arg);
        } else {
            precision = Some(Count::Fixed(parse_number(bytes, &mut pos)));
        }
    }

    let mut vector = None;
    if *bytes.get(pos)? == b'v' {
        pos += 1;
        vector = Some(parse_number(bytes, &mut pos).max(1));
    }

    while matches!(*bytes.get(pos)?, b'h' | b'l' | b'L' | b'q' | b'j' | b'z' | b't') {
        pos += 1;
    }

    let conversion = *bytes.get(pos)?;
    Some((
        Directive {
            flags,
            width,
            precision,
            vector,
            conversion,
        },
        pos + 1,
    ))
}

// ================================================================================================
// Rendering
// ================================================================================================

/// Directive with `*` counts resolved.
#[derive(Debug, Clone, Copy)]
struct Spec {
    flags: Flags,
    width: usize,
    precision: Option<usize>,
    conversion: u8,
}

/// Emit `prefix` and `body` padded to the spec's width. Zero padding goes
/// between the prefix (sign, `0x`) and the body.
fn pad(out: &mut Vec<u8>, spec: &Spec, prefix: &[u8], body: &[u8], zero_ok: bool) {
    let len = prefix.len() + body.len();
    let fill = spec.width.saturating_sub(len);
    if spec.flags.left {
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
        out.resize(out.len() + fill, b' ');
    } else if spec.flags.zero && zero_ok {
        out.extend_from_slice(prefix);
        out.resize(out.len() + fill, b'0');
        out.extend_from_slice(body);
    } else {
        out.resize(out.len() + fill, b' ');
        out.extend_from_slice(prefix);
        out.extend_from_slice(body);
    }
}

fn sign_prefix(negative: bool, flags: &Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

fn format_signed(out: &mut Vec<u8>, spec: &Spec, value: i64) {
    let digits = integer_digits(spec, value.unsigned_abs().to_string(), value == 0);
    let prefix = sign_prefix(value < 0, &spec.flags);
    pad(out, spec, prefix.as_bytes(), digits.as_bytes(), spec.precision.is_none());
}

fn format_unsigned(out: &mut Vec<u8>, spec: &Spec, value: u64) {
    let (digits, prefix) = match spec.conversion {
        b'o' => (format!("{value:o}"), ""),
        b'x' => (format!("{value:x}"), if spec.flags.alt && value != 0 { "0x" } else { "" }),
        b'X' => (format!("{value:X}"), if spec.flags.alt && value != 0 { "0X" } else { "" }),
        _ => (value.to_string(), ""),
    };
    let mut digits = integer_digits(spec, digits, value == 0);
    if spec.conversion == b'o' && spec.flags.alt && !digits.starts_with('0') {
        digits.insert(0, '0');
    }
    pad(out, spec, prefix.as_bytes(), digits.as_bytes(), spec.precision.is_none());
}

/// Apply an integer precision: minimum digit count, and no digits at all
/// for a zero value with precision 0.
fn integer_digits(spec: &Spec, digits: String, zero: bool) -> String {
    match spec.precision {
        Some(0) if zero => String::new(),
        Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
        _ => digits,
    }
}

/// `d.ddde±XX` with at least two exponent digits.
fn exponent_form(x: f64, precision: usize, alt: bool) -> String {
    let formatted = format!("{x:.precision$e}");
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let point = if alt && precision == 0 { "." } else { "" };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}{point}e{sign}{:02}", exponent.unsigned_abs())
}

/// Drop trailing fractional zeros (and a bare point) ahead of any exponent.
fn strip_zeros(s: &str) -> String {
    let (number, exponent) = match s.find('e') {
        Some(at) => s.split_at(at),
        None => (s, ""),
    };
    if !number.contains('.') {
        return s.to_string();
    }
    let trimmed = number.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{exponent}")
}

fn general_form(x: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    let exponent = if x == 0.0 {
        0
    } else {
        let scientific = format!("{x:.prec$e}", prec = p - 1);
        scientific
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i64>().ok())
            .unwrap_or(0)
    };
    let body = if (p as i64) > exponent && exponent >= -4 {
        let decimals = (p as i64 - 1 - exponent) as usize;
        let mut fixed = format!("{x:.decimals$}");
        if alt && decimals == 0 {
            fixed.push('.');
        }
        fixed
    } else {
        exponent_form(x, p - 1, alt)
    };
    if alt {
        body
    } else {
        strip_zeros(&body)
    }
}

/// Hexadecimal significand and binary exponent of a non-negative finite
/// double, rounded to `precision` hex digits when given.
fn hex_form(x: f64, precision: Option<usize>, alt: bool) -> (String, String) {
    const MANTISSA_DIGITS: usize = 13;
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7FF) as i64;
    let mut mantissa = bits & ((1u64 << 52) - 1);
    let (mut lead, exponent) = match (x == 0.0, biased) {
        (true, _) => (0u64, 0i64),
        (false, 0) => (0, -1022),
        (false, _) => (1, biased - 1023),
    };

    let digits = match precision {
        Some(p) if p < MANTISSA_DIGITS => {
            let shift = 4 * (MANTISSA_DIGITS - p) as u32;
            let rest = mantissa & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            mantissa >>= shift;
            if rest > half || (rest == half && mantissa & 1 == 1) {
                mantissa += 1;
                if mantissa >> (4 * p) != 0 {
                    mantissa &= (1u64 << (4 * p)) - 1;
                    lead += 1;
                }
            }
            if p == 0 {
                String::new()
            } else {
                format!("{mantissa:0p$x}")
            }
        }
        Some(p) => format!("{mantissa:013x}{}", "0".repeat(p - MANTISSA_DIGITS)),
        None => format!("{mantissa:013x}").trim_end_matches('0').to_string(),
    };

    let point = if digits.is_empty() && !alt { "" } else { "." };
    let sign = if exponent < 0 { '-' } else { '+' };
    (
        format!("{lead}{point}{digits}"),
        format!("p{sign}{}", exponent.unsigned_abs()),
    )
}

fn format_float(out: &mut Vec<u8>, spec: &Spec, value: f64) {
    let upper = spec.conversion.is_ascii_uppercase();
    let sign = sign_prefix(value.is_sign_negative(), &spec.flags);
    let x = value.abs();

    if !x.is_finite() {
        let text = match (x.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        pad(out, spec, sign.as_bytes(), text.as_bytes(), false);
        return;
    }

    let precision = spec.precision.unwrap_or(6);
    let (prefix, body) = match spec.conversion.to_ascii_lowercase() {
        b'e' => (sign.to_string(), exponent_form(x, precision, spec.flags.alt)),
        b'g' => (sign.to_string(), general_form(x, precision, spec.flags.alt)),
        b'a' => {
            let (significand, exponent) = hex_form(x, spec.precision, spec.flags.alt);
            (format!("{sign}0x"), format!("{significand}{exponent}"))
        }
        _ => {
            let mut fixed = format!("{x:.precision$}");
            if spec.flags.alt && precision == 0 {
                fixed.push('.');
            }
            (sign.to_string(), fixed)
        }
    };

    let (prefix, body) = if upper {
        (prefix.to_ascii_uppercase(), body.to_ascii_uppercase())
    } else {
        (prefix, body)
    };
    pad(out, spec, prefix.as_bytes(), body.as_bytes(), true);
}

/// Render one directive, consuming its arguments starting at `*next`.
fn render(call: &Call<'_>, directive: &Directive, next: &mut usize, out: &mut Vec<u8>) -> Result<()> {
    let mut take = || {
        let index = *next;
        *next += 1;
        index
    };

    let mut flags = directive.flags;
    let width = match directive.width {
        Some(Count::Fixed(w)) => w,
        Some(Count::Arg) => {
            let w = call.sint(take(), 0)?;
            flags.left |= w < 0;
            w.unsigned_abs() as usize
        }
        None => 0,
    };
    let precision = match directive.precision {
        Some(Count::Fixed(p)) => Some(p),
        Some(Count::Arg) => usize::try_from(call.sint(take(), 0)?).ok(),
        None => None,
    };
    let spec = Spec {
        flags,
        width,
        precision,
        conversion: directive.conversion,
    };

    if spec.conversion == b'%' {
        out.push(b'%');
        return Ok(());
    }

    let arg = take();
    for lane in 0..directive.vector.unwrap_or(1) {
        if lane > 0 {
            out.push(b',');
        }
        match spec.conversion {
            b'd' | b'i' => format_signed(out, &spec, call.sint(arg, lane)?),
            b'o' | b'u' | b'x' | b'X' => format_unsigned(out, &spec, call.uint(arg, lane)?),
            b'f' | b'F' | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => format_float(out, &spec, call.float(arg, lane)?),
            b'c' => pad(out, &spec, b"", &[call.uint(arg, lane)? as u8], false),
            b'p' => {
                let address = format!("{:x}", call.pointer(arg)?);
                pad(out, &spec, b"0x", address.as_bytes(), true);
            }
            b's' => {
                let mut text = read_c_string(call.memory_for(arg)?, call.pointer(arg)?)?;
                if let Some(p) = spec.precision {
                    text.truncate(p);
                }
                pad(out, &spec, b"", &text, false);
            }
            _ => return Err(call.unsupported()),
        }
    }
    Ok(())
}

fn printf(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let format = read_c_string(call.memory_for(0)?, call.pointer(0)?)?;
    let mut out = Vec::with_capacity(format.len());
    let mut next = 1;
    let mut pos = 0;
    while pos < format.len() {
        if format[pos] != b'%' {
            out.push(format[pos]);
            pos += 1;
            continue;
        }
        match parse_directive(&format[pos + 1..]) {
            // Unknown conversions are echoed verbatim.
            Some((directive, len)) if !CONVERSIONS.contains(&directive.conversion) => {
                out.extend_from_slice(&format[pos..pos + 1 + len]);
                pos += 1 + len;
            }
            Some((directive, len)) => {
                render(call, &directive, &mut next, &mut out)?;
                pos += 1 + len;
            }
            None => {
                out.extend_from_slice(&format[pos..]);
                break;
            }
        }
    }

    if let Err(err) = call.env_mut().output().write_all(&out) {
        warn!(error = %err, "failed to write printf output");
    }
    result.set_sint(0, 0);
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("printf", Builtin::Call(printf));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Operand, OperandList};
    use crate::memory::AddressSpace;
    use crate::workitem::StandaloneWorkItem;
    use std::sync::Arc;

    /// Store `text` NUL-terminated in global memory; returns a pointer operand.
    fn create_test_string(item: &StandaloneWorkItem, text: &str) -> Operand {
        let global = item.global_memory();
        let address = global.allocate_buffer(text.len() as u64 + 1).unwrap();
        global.store(text.as_bytes(), address).unwrap();
        Operand::pointer(AddressSpace::Global, address, 1)
    }

    fn print(format: &str, args: Vec<Operand>) -> String {
        let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        let mut operands = OperandList::new().with(create_test_string(&item, format));
        for arg in args {
            operands.push(arg);
        }
        let mut result = TypedValue::scalar(4);
        BuiltinRegistry::new()
            .dispatch("printf", "PU3AS2cz", &operands, &mut item, &mut result)
            .unwrap();
        item.output_text()
    }

    #[test]
    fn test_integers() {
        let out = print(
            "x=%d y=%u h=%#x o=%#o\n",
            vec![Operand::sint(4, -5), Operand::uint(4, 42), Operand::uint(4, 255), Operand::uint(4, 8)],
        );
        assert_eq!(out, "x=-5 y=42 h=0xff o=010\n");

        let out = print(
            "%05d|%+d|% d|%.3d|%-4d|%.0d",
            vec![
                Operand::sint(4, 42),
                Operand::sint(4, 7),
                Operand::sint(4, 7),
                Operand::sint(4, 5),
                Operand::sint(4, 3),
                Operand::sint(4, 0),
            ],
        );
        assert_eq!(out, "00042|+7| 7|005|3   |");
    }

    #[test]
    fn test_floats() {
        let out = print(
            "%5.2f|%-6.1e|%g|%g|%g",
            vec![
                Operand::float(8, 3.14159),
                Operand::float(8, 1234.5),
                Operand::float(8, 0.0001),
                Operand::float(8, 1e20),
                Operand::float(8, 100000.0),
            ],
        );
        assert_eq!(out, " 3.14|1.2e+03|0.0001|1e+20|100000");

        let out = print("%f %E", vec![Operand::float(4, 0.5), Operand::float(8, -2.0)]);
        assert_eq!(out, "0.500000 -2.000000E+00");
    }

    #[test]
    fn test_hex_floats() {
        let out = print("%a %A %.1a", vec![Operand::float(8, 1.0), Operand::float(8, 3.0), Operand::float(8, 1.0)]);
        assert_eq!(out, "0x1p+0 0X1.8P+1 0x1.0p+0");
    }

    #[test]
    fn test_non_finite() {
        let out = print(
            "%f %F %05f",
            vec![
                Operand::float(8, f64::INFINITY),
                Operand::float(8, f64::NAN),
                Operand::float(8, f64::NEG_INFINITY),
            ],
        );
        assert_eq!(out, "inf NAN  -inf");
    }

    #[test]
    fn test_vectors() {
        let out = print("%v4hld", vec![Operand::sint_vector(4, &[1, -2, 3, 4])]);
        assert_eq!(out, "1,-2,3,4");
        let out = print("%v2hlf", vec![Operand::float_vector(4, &[0.5, 1.25])]);
        assert_eq!(out, "0.500000,1.250000");
    }

    #[test]
    fn test_strings_chars_and_star() {
        let mut item = StandaloneWorkItem::new(Arc::new(Memory::new(AddressSpace::Global)));
        let format = create_test_string(&item, "[%s|%.2s|%3c|%*d]");
        let text = create_test_string(&item, "hello");
        let operands = OperandList::new()
            .with(format)
            .with(text.clone())
            .with(text)
            .with(Operand::uint(1, b'A' as u64))
            .with(Operand::sint(4, 4))
            .with(Operand::sint(4, 7));
        let mut result = TypedValue::scalar(4);
        BuiltinRegistry::new()
            .dispatch("printf", "PU3AS2cz", &operands, &mut item, &mut result)
            .unwrap();
        assert_eq!(item.output_text(), "[hello|he|  A|   7]");
    }

    #[test]
    fn test_truncated_directive_flushes_literal() {
        assert_eq!(print("abc%5", vec![]), "abc%5");
        assert_eq!(print("100%", vec![]), "100%");
        assert_eq!(print("%d%%", vec![Operand::sint(4, 9)]), "9%");
    }

    #[test]
    fn test_unknown_conversion_is_echoed() {
        assert_eq!(print("a%kb", vec![Operand::sint(4, 1)]), "a%kb");
    }

    #[test]
    fn test_string_at_end_of_address_space() {
        let memory = Memory::new(AddressSpace::Global);
        assert!(matches!(
            read_c_string(&memory, u64::MAX),
            Err(SimError::InvalidAddress { .. })
        ));
        let out = print("[%s]", vec![Operand::pointer(AddressSpace::Global, u64::MAX, 1)]);
        assert_eq!(out, "");
    }
}
