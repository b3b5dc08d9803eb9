//! Overload suffix decoding
//!
//! Builtin names arrive demangled, with the parameter types left as an
//! Itanium-style suffix: `h/t/j/m` for unsigned 8/16/32/64-bit integers,
//! `c/a/s/i/l` for signed ones, `Dh/f/d` for half, float and double, and
//! `Dv<N>_` in front of the element letter for an N-wide vector.
//! Handlers mostly care about the first parameter.

/// Scalar element type named by an overload letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl ElementType {
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'h' => Self::U8,
            't' => Self::U16,
            'j' => Self::U32,
            'm' => Self::U64,
            'c' | 'a' => Self::I8,
            's' => Self::I16,
            'i' => Self::I32,
            'l' => Self::I64,
            'f' => Self::F32,
            'd' => Self::F64,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32 | Self::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }
}

/// Element type and vector width of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgType {
    pub element: ElementType,
    pub width: usize,
}

fn parse_element(s: &str) -> Option<ElementType> {
    if s.starts_with("Dh") {
        return Some(ElementType::F16);
    }
    s.chars().next().and_then(ElementType::from_letter)
}

/// Type of the first parameter encoded in `overload`.
pub fn first_arg(overload: &str) -> Option<ArgType> {
    if let Some(rest) = overload.strip_prefix("Dv") {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let width = rest[..digits].parse().ok()?;
        let element = parse_element(rest[digits..].strip_prefix('_')?)?;
        return Some(ArgType { element, width });
    }
    parse_element(overload).map(|element| ArgType { element, width: 1 })
}

/// Element letter of the first parameter (`'f'` for `Dv4_f`).
///
/// Half precision reports `'D'`, so it never aliases `uchar`.
pub fn first_letter(overload: &str) -> Option<char> {
    let rest = match overload.strip_prefix("Dv") {
        Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_digit()).strip_prefix('_')?,
        None => overload,
    };
    rest.chars().next()
}
