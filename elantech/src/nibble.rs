//! A very simple u4/nibble implementation.
//!
//! Elantech packs a lot of its identification data into half bytes: the IC
//! body version, the per-axis resolution codes and the high bits of the
//! coordinate maxima.

/// Represents an unsigned 4-bit value (nibble) encoded as a byte.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct U4(u8);

impl U4 {
    /// Constructs a nibble from the 4 low/rightmost bits of a byte.
    pub fn from_lo(raw: u8) -> Self {
        Self(raw & 0x0f)
    }

    /// Constructs a nibble from the 4 high/leftmost bits of a byte.
    pub fn from_hi(raw: u8) -> Self {
        Self(raw >> 4)
    }

    /// Constructs a byte with the nibble set as the 4 low/rightmost bits.
    pub fn to_lo(self) -> u8 {
        self.0
    }

    /// Widens the nibble to the 12-bit value it forms when placed above a
    /// full byte, as used by coordinate maxima.
    pub fn above_byte(self, lo: u8) -> u16 {
        u16::from(self.0) << 8 | u16::from(lo)
    }
}

impl From<U4> for u32 {
    fn from(value: U4) -> Self {
        value.0.into()
    }
}
