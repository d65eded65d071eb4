//! [BSON Decimal128](https://github.com/mongodb/specifications/blob/master/source/bson-decimal128/decimal128.md)
//! data type representation.

use std::fmt;

/// A 128-bit decimal floating point value, treated as an opaque pair of
/// 64-bit halves. This crate stores and round-trips the bit layout; it does
/// not implement decimal arithmetic or string conversion.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    /// The raw bytes in wire order: low 64 bits little-endian, then high 64
    /// bits little-endian.
    bytes: [u8; 16],
}

impl Decimal128 {
    /// Constructs from the raw 16 bytes as laid out on the wire.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Returns the raw wire-order bytes.
    pub const fn bytes(&self) -> [u8; 16] {
        self.bytes
    }

    /// Constructs from the high and low 64-bit halves.
    pub fn from_parts(high: u64, low: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&low.to_le_bytes());
        bytes[8..].copy_from_slice(&high.to_le_bytes());
        Self { bytes }
    }

    /// The high 64 bits (sign, combination, and exponent fields).
    pub fn high(&self) -> u64 {
        u64::from_le_bytes(self.bytes[8..].try_into().unwrap())
    }

    /// The low 64 bits of the coefficient.
    pub fn low(&self) -> u64 {
        u64::from_le_bytes(self.bytes[..8].try_into().unwrap())
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decimal128")
            .field("high", &format_args!("{:#018x}", self.high()))
            .field("low", &format_args!("{:#018x}", self.low()))
            .finish()
    }
}
