//! Packed binary-coded-decimal helpers.
//!
//! Every calendar register of the MCP79412 stores its value as two decimal
//! digits: the units digit in the low nibble and the tens digit in the high
//! nibble. The tens digit is narrowed per register (seconds keep three bits,
//! months keep one) so that the remaining high bits can carry status flags.

/// Error returned when a value does not fit in two decimal digits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BcdError {
    /// The value is greater than 99.
    OutOfRange,
}

/// Returns the mask for a tens digit that is `width` bits wide.
///
/// Widths of 4 or more select the whole high nibble.
pub const fn tens_mask(width: u8) -> u8 {
    if width >= 4 {
        0x0F
    } else {
        (1 << width) - 1
    }
}

/// Encodes `value` (0-99) as packed BCD.
///
/// # Errors
///
/// Returns [`BcdError::OutOfRange`] if `value` is greater than 99. Narrower
/// register fields must be range-checked by the caller.
pub fn encode(value: u8) -> Result<u8, BcdError> {
    if value > 99 {
        return Err(BcdError::OutOfRange);
    }
    let tens = value / 10;
    let units = value % 10;
    Ok(units | (tens << 4))
}

/// Decodes a packed BCD byte whose tens digit is `tens_width` bits wide.
///
/// Bits above the tens digit are ignored, so status flags that share the
/// register do not leak into the value.
pub fn decode(byte: u8, tens_width: u8) -> u8 {
    let units = byte & 0x0F;
    let tens = (byte >> 4) & tens_mask(tens_width);
    tens * 10 + units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_values() {
        assert_eq!(encode(0).unwrap(), 0x00);
        assert_eq!(encode(9).unwrap(), 0x09);
        assert_eq!(encode(10).unwrap(), 0x10);
        assert_eq!(encode(45).unwrap(), 0x45);
        assert_eq!(encode(59).unwrap(), 0x59);
        assert_eq!(encode(99).unwrap(), 0x99);
    }

    #[test]
    fn test_encode_out_of_range() {
        assert_eq!(encode(100), Err(BcdError::OutOfRange));
        assert_eq!(encode(255), Err(BcdError::OutOfRange));
    }

    #[test]
    fn test_decode_respects_tens_width() {
        // ST bit (bit 7) set on a seconds register reading 45
        assert_eq!(decode(0xC5, 3), 45);
        // LPYR bit (bit 5) set on a month register reading 12
        assert_eq!(decode(0x32, 1), 12);
        // date register with garbage in bits 7:6
        assert_eq!(decode(0xF1, 2), 31);
        assert_eq!(decode(0x99, 4), 99);
    }

    #[test]
    fn test_tens_mask() {
        assert_eq!(tens_mask(0), 0x00);
        assert_eq!(tens_mask(1), 0x01);
        assert_eq!(tens_mask(2), 0x03);
        assert_eq!(tens_mask(3), 0x07);
        assert_eq!(tens_mask(4), 0x0F);
        assert_eq!(tens_mask(7), 0x0F);
    }

    #[test]
    fn test_round_trip_per_field_width() {
        // (tens width, largest value the field holds)
        for (width, max) in [(3u8, 59u8), (2, 31), (2, 23), (1, 12), (4, 99)] {
            for value in 0..=max {
                assert_eq!(decode(encode(value).unwrap(), width), value);
            }
        }
    }
}
