//! Modified UTF-8, as used for all strings in dex files
//!
//! The encoding is a sequence of UTF-16 code units, each written with the one, two, or three byte
//! forms of UTF-8. The differences from standard UTF-8 are that `U+0000` is written with the two
//! byte form (so that the encoded string never contains a zero byte), and that supplementary
//! characters are written as two separately encoded surrogates instead of one four byte form.
//!
//! The helpers here operate on string data that has already passed structural verification. They
//! never panic on malformed input, but the results for malformed input are unspecified.

use std::cmp::Ordering;
use std::iter::FusedIterator;

/// Iterator over the UTF-16 code units of a modified UTF-8 string
///
/// Iteration stops at the end of the slice or at the first zero byte, whichever comes first.
#[derive(Clone, Debug)]
pub struct Units<'a> {
    bytes: &'a [u8],
}

/// Code units of a modified UTF-8 string
pub fn units(bytes: &[u8]) -> Units<'_> {
    Units { bytes }
}

impl<'a> Iterator for Units<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let (&first, rest) = self.bytes.split_first()?;
        if first == 0 {
            return None;
        }
        let (unit, consumed) = match first >> 4 {
            0x0..=0x7 => (first as u16, 1),
            0xc | 0xd => match rest {
                [second, ..] => (((first as u16 & 0x1f) << 6) | (*second as u16 & 0x3f), 2),
                _ => (first as u16, 1),
            },
            0xe => match rest {
                [second, third, ..] => (
                    ((first as u16 & 0x0f) << 12)
                        | ((*second as u16 & 0x3f) << 6)
                        | (*third as u16 & 0x3f),
                    3,
                ),
                _ => (first as u16, 1),
            },
            _ => (first as u16, 1),
        };
        self.bytes = &self.bytes[consumed..];
        Some(unit)
    }
}

impl<'a> FusedIterator for Units<'a> {}

/// Compare two strings by the values of their UTF-16 code units
///
/// This is the order string ids must appear in. Note that it differs from comparing the encoded
/// bytes: `U+0000` is encoded as `C0 80` but sorts before everything else.
pub fn compare(left: &[u8], right: &[u8]) -> Ordering {
    units(left).cmp(units(right))
}

/// Decode into a Rust string, substituting `U+FFFD` for unpaired surrogates
pub fn to_string_lossy(bytes: &[u8]) -> String {
    char::decode_utf16(units(bytes))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
