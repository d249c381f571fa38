//! Fixed-width integer encoding with explicit byte order.
//!
//! Every wire field is a [`PackedInt`]: a value tagged with its width and
//! signedness. Construction from an arbitrary integer is range-checked,
//! so a value that would silently truncate is rejected up front.
//!
//! ```text
//! encode([U8(0x11), U16(1200), U16(825)])
//!   → 11 | b0 04 | 39 03          (little-endian, no padding)
//! ```

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::HeiError;

// ── ByteOrder ────────────────────────────────────────────────────

/// Byte order used when serialising multi-byte integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Whatever the host CPU uses.
    Native,
    /// Least significant byte first. The protocol always uses this.
    #[default]
    LittleEndian,
    /// Most significant byte first.
    BigEndian,
}

// ── IntFormat ────────────────────────────────────────────────────

/// Width and signedness of a packed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntFormat {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl IntFormat {
    /// Encoded size in bytes.
    pub const fn width(self) -> usize {
        match self {
            IntFormat::I8 | IntFormat::U8 => 1,
            IntFormat::I16 | IntFormat::U16 => 2,
            IntFormat::I32 | IntFormat::U32 => 4,
            IntFormat::I64 | IntFormat::U64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            IntFormat::I8 | IntFormat::I16 | IntFormat::I32 | IntFormat::I64
        )
    }

    /// Smallest representable value.
    pub const fn min(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.width() * 8 - 1))
        } else {
            0
        }
    }

    /// Largest representable value.
    pub const fn max(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.width() * 8 - 1)) - 1
        } else {
            (1i128 << (self.width() * 8)) - 1
        }
    }

    /// Sum of the widths of `formats`.
    pub fn total_width(formats: &[IntFormat]) -> usize {
        formats.iter().map(|f| f.width()).sum()
    }
}

impl fmt::Display for IntFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntFormat::I8 => "i8",
            IntFormat::U8 => "u8",
            IntFormat::I16 => "i16",
            IntFormat::U16 => "u16",
            IntFormat::I32 => "i32",
            IntFormat::U32 => "u32",
            IntFormat::I64 => "i64",
            IntFormat::U64 => "u64",
        };
        f.write_str(name)
    }
}

// ── PackedInt ────────────────────────────────────────────────────

/// An integer tagged with the exact wire format it is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedInt {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl PackedInt {
    /// Wrap `value` as `format`, rejecting values outside its range.
    pub fn new(format: IntFormat, value: impl Into<i128>) -> Result<Self, HeiError> {
        let value = value.into();
        if value < format.min() || value > format.max() {
            return Err(HeiError::Range {
                format,
                value,
                min: format.min(),
                max: format.max(),
            });
        }

        // The range check above makes every cast lossless.
        Ok(match format {
            IntFormat::I8 => PackedInt::I8(value as i8),
            IntFormat::U8 => PackedInt::U8(value as u8),
            IntFormat::I16 => PackedInt::I16(value as i16),
            IntFormat::U16 => PackedInt::U16(value as u16),
            IntFormat::I32 => PackedInt::I32(value as i32),
            IntFormat::U32 => PackedInt::U32(value as u32),
            IntFormat::I64 => PackedInt::I64(value as i64),
            IntFormat::U64 => PackedInt::U64(value as u64),
        })
    }

    pub fn format(&self) -> IntFormat {
        match self {
            PackedInt::I8(_) => IntFormat::I8,
            PackedInt::U8(_) => IntFormat::U8,
            PackedInt::I16(_) => IntFormat::I16,
            PackedInt::U16(_) => IntFormat::U16,
            PackedInt::I32(_) => IntFormat::I32,
            PackedInt::U32(_) => IntFormat::U32,
            PackedInt::I64(_) => IntFormat::I64,
            PackedInt::U64(_) => IntFormat::U64,
        }
    }

    /// The value widened to `i128`.
    pub fn value(&self) -> i128 {
        match *self {
            PackedInt::I8(v) => v.into(),
            PackedInt::U8(v) => v.into(),
            PackedInt::I16(v) => v.into(),
            PackedInt::U16(v) => v.into(),
            PackedInt::I32(v) => v.into(),
            PackedInt::U32(v) => v.into(),
            PackedInt::I64(v) => v.into(),
            PackedInt::U64(v) => v.into(),
        }
    }

    fn put<B: BufMut>(&self, dst: &mut B, order: ByteOrder) {
        macro_rules! put {
            ($v:expr, $le:ident, $be:ident, $ne:ident) => {
                match order {
                    ByteOrder::LittleEndian => dst.$le($v),
                    ByteOrder::BigEndian => dst.$be($v),
                    ByteOrder::Native => dst.$ne($v),
                }
            };
        }

        match *self {
            PackedInt::I8(v) => dst.put_i8(v),
            PackedInt::U8(v) => dst.put_u8(v),
            PackedInt::I16(v) => put!(v, put_i16_le, put_i16, put_i16_ne),
            PackedInt::U16(v) => put!(v, put_u16_le, put_u16, put_u16_ne),
            PackedInt::I32(v) => put!(v, put_i32_le, put_i32, put_i32_ne),
            PackedInt::U32(v) => put!(v, put_u32_le, put_u32, put_u32_ne),
            PackedInt::I64(v) => put!(v, put_i64_le, put_i64, put_i64_ne),
            PackedInt::U64(v) => put!(v, put_u64_le, put_u64, put_u64_ne),
        }
    }

    fn get<B: Buf>(src: &mut B, format: IntFormat, order: ByteOrder) -> Self {
        macro_rules! get {
            ($le:ident, $be:ident, $ne:ident) => {
                match order {
                    ByteOrder::LittleEndian => src.$le(),
                    ByteOrder::BigEndian => src.$be(),
                    ByteOrder::Native => src.$ne(),
                }
            };
        }

        match format {
            IntFormat::I8 => PackedInt::I8(src.get_i8()),
            IntFormat::U8 => PackedInt::U8(src.get_u8()),
            IntFormat::I16 => PackedInt::I16(get!(get_i16_le, get_i16, get_i16_ne)),
            IntFormat::U16 => PackedInt::U16(get!(get_u16_le, get_u16, get_u16_ne)),
            IntFormat::I32 => PackedInt::I32(get!(get_i32_le, get_i32, get_i32_ne)),
            IntFormat::U32 => PackedInt::U32(get!(get_u32_le, get_u32, get_u32_ne)),
            IntFormat::I64 => PackedInt::I64(get!(get_i64_le, get_i64, get_i64_ne)),
            IntFormat::U64 => PackedInt::U64(get!(get_u64_le, get_u64, get_u64_ne)),
        }
    }
}

// Native integers convert infallibly into their own format, and back out
// only when the formats match.
macro_rules! packed_int_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PackedInt {
                fn from(v: $ty) -> Self {
                    PackedInt::$variant(v)
                }
            }

            impl TryFrom<PackedInt> for $ty {
                type Error = HeiError;

                fn try_from(v: PackedInt) -> Result<Self, Self::Error> {
                    match v {
                        PackedInt::$variant(inner) => Ok(inner),
                        _ => Err(HeiError::ProtocolViolation("integer format mismatch")),
                    }
                }
            }
        )*
    };
}

packed_int_conversions! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

// ── encode / decode ──────────────────────────────────────────────

/// Encode `values` little-endian, back to back.
pub fn encode(values: &[PackedInt]) -> Vec<u8> {
    encode_with_order(ByteOrder::default(), values)
}

pub fn encode_with_order(order: ByteOrder, values: &[PackedInt]) -> Vec<u8> {
    let len = values.iter().map(|v| v.format().width()).sum();
    let mut out = Vec::with_capacity(len);
    encode_into(&mut out, order, values);
    out
}

/// Append `values` to an existing buffer.
pub fn encode_into<B: BufMut>(dst: &mut B, order: ByteOrder, values: &[PackedInt]) {
    for value in values {
        value.put(dst, order);
    }
}

/// Decode one value per entry of `formats`, little-endian.
///
/// Bytes past the expected layout are left untouched.
pub fn decode(bytes: &[u8], formats: &[IntFormat]) -> Result<Vec<PackedInt>, HeiError> {
    decode_with_order(ByteOrder::default(), bytes, formats)
}

pub fn decode_with_order(
    order: ByteOrder,
    mut bytes: &[u8],
    formats: &[IntFormat],
) -> Result<Vec<PackedInt>, HeiError> {
    let expected = IntFormat::total_width(formats);
    if bytes.len() < expected {
        return Err(HeiError::Format {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(formats
        .iter()
        .map(|&format| PackedInt::get(&mut bytes, format, order))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_range_is_enforced() {
        assert!(PackedInt::new(IntFormat::U8, 256).is_err());
        assert!(PackedInt::new(IntFormat::U8, -1).is_err());
        assert_eq!(PackedInt::new(IntFormat::U8, 0).unwrap(), PackedInt::U8(0));
        assert_eq!(PackedInt::new(IntFormat::U8, 255).unwrap(), PackedInt::U8(255));
    }

    #[test]
    fn signed_bounds() {
        assert_eq!(IntFormat::I16.min(), -32768);
        assert_eq!(IntFormat::I16.max(), 32767);
        assert_eq!(IntFormat::U64.max(), u64::MAX as i128);
        assert!(PackedInt::new(IntFormat::I8, -129).is_err());
        assert!(PackedInt::new(IntFormat::I64, i64::MIN).is_ok());
    }

    #[test]
    fn range_error_names_the_format() {
        let err = PackedInt::new(IntFormat::U16, 70_000).unwrap_err();
        assert!(matches!(err, HeiError::Range { format: IntFormat::U16, value: 70_000, .. }));
        assert!(err.to_string().contains("u16"));
    }

    #[test]
    fn encode_is_little_endian_without_padding() {
        let bytes = encode(&[0x11u8.into(), 1200u16.into(), 825u16.into(), 0xDEAD_BEEFu32.into()]);
        assert_eq!(bytes, [0x11, 0xB0, 0x04, 0x39, 0x03, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn big_endian_order() {
        let bytes = encode_with_order(ByteOrder::BigEndian, &[0x0102u16.into(), (-2i32).into()]);
        assert_eq!(bytes, [0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn decode_restores_mixed_values() {
        let values = vec![
            PackedInt::I8(-5),
            PackedInt::U8(200),
            PackedInt::I16(-1234),
            PackedInt::U16(65535),
            PackedInt::I32(i32::MIN),
            PackedInt::U32(3_300_000),
            PackedInt::I64(-42),
            PackedInt::U64(u64::MAX),
        ];
        let formats: Vec<_> = values.iter().map(PackedInt::format).collect();
        let bytes = encode(&values);
        assert_eq!(bytes.len(), 1 + 1 + 2 + 2 + 4 + 4 + 8 + 8);
        assert_eq!(decode(&bytes, &formats).unwrap(), values);
    }

    #[test]
    fn decode_short_input_fails() {
        let err = decode(&[0x01, 0x02, 0x03], &[IntFormat::U8, IntFormat::U32]).unwrap_err();
        assert!(matches!(err, HeiError::Format { expected: 5, actual: 3 }));
    }

    #[test]
    fn try_from_checks_format() {
        assert_eq!(u16::try_from(PackedInt::U16(7)).unwrap(), 7);
        assert!(u32::try_from(PackedInt::U16(7)).is_err());
    }
}
