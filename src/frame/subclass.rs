//! Subclass packing.
//!
//! Byte 11 of a full frame holds either a literal subclass below 0x80 or,
//! with the top bit set, the exponent of a power of two. Exactly 0x80 is
//! written as `0x87` (2^7).

/// Largest byte that unpacks to a valid subclass (`0x80 | 31`).
const MAX_PACKED: u8 = 0x9f;

/// Pack a subclass value into its wire byte.
///
/// Returns `None` for values above 0x80 that are not a single power of two.
pub fn pack_subclass(value: u32) -> Option<u8> {
    if value < 0x80 {
        return Some(value as u8);
    }
    if value == 0x80 {
        return Some(0x87);
    }
    if value.is_power_of_two() {
        return Some(0x80 | value.trailing_zeros() as u8);
    }
    None
}

/// Unpack a wire byte into its subclass value.
///
/// Returns `None` for bytes above `0x9f`.
pub fn unpack_subclass(byte: u8) -> Option<u32> {
    match byte {
        0..=0x7f => Some(u32::from(byte)),
        0x80..=MAX_PACKED => Some(1u32 << (byte & 0x1f)),
        _ => None,
    }
}
