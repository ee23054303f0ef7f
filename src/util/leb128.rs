//! Little-endian base 128 integers
//!
//! Dex files only ever use 32-bit LEB128 values, so an encoding is at most 5 bytes long. Only the
//! low 4 bits of a fifth byte contribute to the value, but a fifth byte which still has its
//! continuation bit set is always an error.

/// Longest legal encoding of a 32-bit value
pub const MAX_LEB128_LEN: usize = 5;

/// Why an encoded integer could not be read
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Leb128Error {
    /// Input ended before the final byte (the one without a continuation bit)
    Truncated,

    /// More than [`MAX_LEB128_LEN`] bytes
    TooLong,
}

/// Decode an unsigned value, returning it along with the number of bytes consumed
pub fn decode_unsigned(data: &[u8]) -> Result<(u32, usize), Leb128Error> {
    let mut result: u32 = 0;
    for (idx, byte) in data.iter().take(MAX_LEB128_LEN).enumerate() {
        result |= ((byte & 0x7f) as u32).wrapping_shl(7 * idx as u32);
        if byte & 0x80 == 0 {
            return Ok((result, idx + 1));
        }
    }
    if data.len() < MAX_LEB128_LEN {
        Err(Leb128Error::Truncated)
    } else {
        Err(Leb128Error::TooLong)
    }
}

/// Decode a signed value, returning it along with the number of bytes consumed
pub fn decode_signed(data: &[u8]) -> Result<(i32, usize), Leb128Error> {
    let mut result: u32 = 0;
    for (idx, byte) in data.iter().take(MAX_LEB128_LEN).enumerate() {
        let shift = 7 * idx as u32;
        result |= ((byte & 0x7f) as u32).wrapping_shl(shift);
        if byte & 0x80 == 0 {
            // Sign extend from the last payload bit actually read
            let bits = shift + 7;
            if bits < 32 && byte & 0x40 != 0 {
                result |= u32::MAX << bits;
            }
            return Ok((result as i32, idx + 1));
        }
    }
    if data.len() < MAX_LEB128_LEN {
        Err(Leb128Error::Truncated)
    } else {
        Err(Leb128Error::TooLong)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsigned_values() {
        assert_eq!(decode_unsigned(&[0x00]), Ok((0, 1)));
        assert_eq!(decode_unsigned(&[0x01]), Ok((1, 1)));
        assert_eq!(decode_unsigned(&[0x7f]), Ok((127, 1)));
        assert_eq!(decode_unsigned(&[0x80, 0x7f]), Ok((16256, 2)));
        assert_eq!(decode_unsigned(&[0xe5, 0x8e, 0x26, 0xff]), Ok((624485, 3)));
        assert_eq!(
            decode_unsigned(&[0xff, 0xff, 0xff, 0xff, 0x0f]),
            Ok((u32::MAX, 5))
        );
    }

    #[test]
    fn signed_values() {
        assert_eq!(decode_signed(&[0x00]), Ok((0, 1)));
        assert_eq!(decode_signed(&[0x01]), Ok((1, 1)));
        assert_eq!(decode_signed(&[0x7f]), Ok((-1, 1)));
        assert_eq!(decode_signed(&[0x80, 0x7f]), Ok((-128, 2)));
        assert_eq!(decode_signed(&[0xc0, 0xbb, 0x78]), Ok((-123456, 3)));
        assert_eq!(
            decode_signed(&[0x80, 0x80, 0x80, 0x80, 0x78]),
            Ok((i32::MIN, 5))
        );
    }

    #[test]
    fn truncated_input() {
        assert_eq!(decode_unsigned(&[]), Err(Leb128Error::Truncated));
        assert_eq!(decode_unsigned(&[0x80, 0x80]), Err(Leb128Error::Truncated));
        assert_eq!(decode_signed(&[0xff]), Err(Leb128Error::Truncated));
    }

    #[test]
    fn overlong_input() {
        let six_bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        assert_eq!(decode_unsigned(&six_bytes), Err(Leb128Error::TooLong));
        assert_eq!(decode_signed(&six_bytes), Err(Leb128Error::TooLong));
    }
}
