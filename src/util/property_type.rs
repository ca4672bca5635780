//! Property types - the fixed scalar type set of the PLY format.

use std::fmt;
use std::io::{self, Write};

use byteorder::{ByteOrder, WriteBytesExt};
use bytemuck::Pod;

use super::{Error, Result};

/// Scalar storage type of a PLY property (or of a list's count / items).
///
/// The set is closed: every property in a header resolves to exactly one of
/// these, and each has a fixed width in binary bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PropertyType {
    /// Signed 8-bit integer (`char`, `int8`)
    Int8 = 0,
    /// Unsigned 8-bit integer (`uchar`, `uint8`)
    Uint8 = 1,
    /// Signed 16-bit integer (`short`, `int16`)
    Int16 = 2,
    /// Unsigned 16-bit integer (`ushort`, `uint16`)
    Uint16 = 3,
    /// Signed 32-bit integer (`int`, `int32`)
    Int32 = 4,
    /// Unsigned 32-bit integer (`uint`, `uint32`)
    Uint32 = 5,
    /// 32-bit IEEE float (`float`, `float32`)
    Float32 = 6,
    /// 64-bit IEEE float (`double`, `float64`)
    Float64 = 7,
}

/// Header tokens accepted for each type. Matching is case-sensitive.
const TYPE_TOKENS: &[(&str, PropertyType)] = &[
    ("char", PropertyType::Int8),
    ("int8", PropertyType::Int8),
    ("uchar", PropertyType::Uint8),
    ("uint8", PropertyType::Uint8),
    ("short", PropertyType::Int16),
    ("int16", PropertyType::Int16),
    ("ushort", PropertyType::Uint16),
    ("uint16", PropertyType::Uint16),
    ("int", PropertyType::Int32),
    ("int32", PropertyType::Int32),
    ("uint", PropertyType::Uint32),
    ("uint32", PropertyType::Uint32),
    ("float", PropertyType::Float32),
    ("float32", PropertyType::Float32),
    ("double", PropertyType::Float64),
    ("float64", PropertyType::Float64),
];

impl PropertyType {
    /// All property types in registry order.
    pub const ALL: [PropertyType; 8] = [
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
    ];

    /// Size in bytes of one value in a binary body.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Canonical header token, as emitted by the writer.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "char",
            Self::Uint8 => "uchar",
            Self::Int16 => "short",
            Self::Uint16 => "ushort",
            Self::Int32 => "int",
            Self::Uint32 => "uint",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    /// Sized alias token (`int8` ... `float64`).
    #[inline]
    pub const fn sized_name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Resolve a header type token.
    pub fn from_token(token: &str) -> Result<Self> {
        TYPE_TOKENS
            .iter()
            .find(|(name, _)| *name == token)
            .map(|&(_, ty)| ty)
            .ok_or_else(|| Error::UnknownType(token.to_string()))
    }

    /// Returns true for `float` / `double`.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns true for the six integer types.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Returns true for signed integers and floats.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Float32 | Self::Float64
        )
    }

    /// Whether this type may be used as a list count type.
    #[inline]
    pub const fn is_valid_count_type(self) -> bool {
        self.is_integer()
    }

    /// Largest list length representable in this type (0 for floats).
    pub const fn max_count(self) -> u64 {
        match self {
            Self::Int8 => i8::MAX as u64,
            Self::Uint8 => u8::MAX as u64,
            Self::Int16 => i16::MAX as u64,
            Self::Uint16 => u16::MAX as u64,
            Self::Int32 => i32::MAX as u64,
            Self::Uint32 => u32::MAX as u64,
            Self::Float32 | Self::Float64 => 0,
        }
    }

    /// Common storage type for two properties sharing one request.
    ///
    /// Floats widen to the widest float and integers of the same signedness
    /// widen to the widest integer. Mixing integers with floats, or signed
    /// with unsigned integers, has no common type.
    pub fn promote(self, other: Self) -> Option<Self> {
        if self == other {
            return Some(self);
        }
        let same_kind = self.is_float() == other.is_float() && self.is_signed() == other.is_signed();
        if !same_kind {
            return None;
        }
        Some(if other.width() > self.width() { other } else { self })
    }

    /// Decode one value from `bytes` (at least `width()` long).
    pub fn decode<B: ByteOrder>(self, bytes: &[u8]) -> Scalar {
        match self {
            Self::Int8 => Scalar::Int(bytes[0] as i8 as i64),
            Self::Uint8 => Scalar::Uint(bytes[0] as u64),
            Self::Int16 => Scalar::Int(B::read_i16(bytes) as i64),
            Self::Uint16 => Scalar::Uint(B::read_u16(bytes) as u64),
            Self::Int32 => Scalar::Int(B::read_i32(bytes) as i64),
            Self::Uint32 => Scalar::Uint(B::read_u32(bytes) as u64),
            Self::Float32 => Scalar::Float(B::read_f32(bytes) as f64),
            Self::Float64 => Scalar::Float(B::read_f64(bytes)),
        }
    }

    /// Encode one value as this type.
    pub fn encode<B: ByteOrder, W: Write>(self, out: &mut W, value: Scalar) -> io::Result<()> {
        match self {
            Self::Int8 => out.write_i8(value.to_i64() as i8),
            Self::Uint8 => out.write_u8(value.to_u64() as u8),
            Self::Int16 => out.write_i16::<B>(value.to_i64() as i16),
            Self::Uint16 => out.write_u16::<B>(value.to_u64() as u16),
            Self::Int32 => out.write_i32::<B>(value.to_i64() as i32),
            Self::Uint32 => out.write_u32::<B>(value.to_u64() as u32),
            Self::Float32 => out.write_f32::<B>(value.to_f64() as f32),
            Self::Float64 => out.write_f64::<B>(value.to_f64()),
        }
    }

    /// Parse an ASCII body token.
    ///
    /// Integer types reject tokens with a fractional part or exponent, and
    /// values outside the type's range.
    pub fn parse_token(self, token: &str) -> Result<Scalar> {
        let bad = || Error::body(format!("invalid {} value '{}'", self.name(), token));
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 => {
                let v: i64 = token.parse().map_err(|_| bad())?;
                let (min, max) = match self {
                    Self::Int8 => (i8::MIN as i64, i8::MAX as i64),
                    Self::Int16 => (i16::MIN as i64, i16::MAX as i64),
                    _ => (i32::MIN as i64, i32::MAX as i64),
                };
                if v < min || v > max {
                    return Err(bad());
                }
                Ok(Scalar::Int(v))
            }
            Self::Uint8 | Self::Uint16 | Self::Uint32 => {
                let v: u64 = token.parse().map_err(|_| bad())?;
                let max = match self {
                    Self::Uint8 => u8::MAX as u64,
                    Self::Uint16 => u16::MAX as u64,
                    _ => u32::MAX as u64,
                };
                if v > max {
                    return Err(bad());
                }
                Ok(Scalar::Uint(v))
            }
            Self::Float32 => {
                // Parse at f32 width directly; going through f64 rounds twice.
                let v: f32 = token.parse().map_err(|_| bad())?;
                if v.is_infinite() && !is_infinity_literal(token) {
                    return Err(bad());
                }
                Ok(Scalar::Float(v as f64))
            }
            Self::Float64 => {
                let v: f64 = token.parse().map_err(|_| bad())?;
                if v.is_infinite() && !is_infinity_literal(token) {
                    return Err(bad());
                }
                Ok(Scalar::Float(v))
            }
        }
    }

    /// Write one value as an ASCII token.
    ///
    /// Floats use the shortest representation that round-trips at this width.
    pub fn write_token<W: Write>(self, out: &mut W, value: Scalar) -> io::Result<()> {
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 => write!(out, "{}", value.to_i64()),
            Self::Uint8 | Self::Uint16 | Self::Uint32 => write!(out, "{}", value.to_u64()),
            Self::Float32 => write!(out, "{}", value.to_f64() as f32),
            Self::Float64 => write!(out, "{}", value.to_f64()),
        }
    }
}

/// `inf` / `infinity` in any case, optionally signed.
fn is_infinity_literal(token: &str) -> bool {
    let digits = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
    digits.eq_ignore_ascii_case("inf") || digits.eq_ignore_ascii_case("infinity")
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single decoded value, wide enough to carry any property type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Scalar {
    #[inline]
    pub fn to_i64(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Uint(v) => v as i64,
            Self::Float(v) => v as i64,
        }
    }

    #[inline]
    pub fn to_u64(self) -> u64 {
        match self {
            Self::Int(v) => v as u64,
            Self::Uint(v) => v,
            Self::Float(v) => v as u64,
        }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Uint(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Interpret as a list length. Negative and fractional values are rejected.
    pub fn as_count(self) -> Option<u64> {
        match self {
            Self::Int(v) => u64::try_from(v).ok(),
            Self::Uint(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

// === Rust scalar mapping ===

/// Rust types that can back a PLY column.
pub trait PlyScalar: Pod + Copy + Default + PartialEq + fmt::Debug {
    /// The matching registry type.
    const PROPERTY_TYPE: PropertyType;

    /// Widen into the common value model.
    fn to_scalar(self) -> Scalar;
}

macro_rules! impl_ply_scalar {
    ($t:ty, $pt:ident, $variant:ident, $wide:ty) => {
        impl PlyScalar for $t {
            const PROPERTY_TYPE: PropertyType = PropertyType::$pt;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::$variant(self as $wide)
            }
        }
    };
}

impl_ply_scalar!(i8, Int8, Int, i64);
impl_ply_scalar!(u8, Uint8, Uint, u64);
impl_ply_scalar!(i16, Int16, Int, i64);
impl_ply_scalar!(u16, Uint16, Uint, u64);
impl_ply_scalar!(i32, Int32, Int, i64);
impl_ply_scalar!(u32, Uint32, Uint, u64);
impl_ply_scalar!(f32, Float32, Float, f64);
impl_ply_scalar!(f64, Float64, Float, f64);
