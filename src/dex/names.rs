//! Names of classes, methods, and fields
//!
//! Names are checked as sequences of UTF-16 code units (that is what the string data encodes).
//! Besides the ASCII letters, digits, `$`, `-`, and `_`, most of the rest of Unicode is allowed,
//! except for whitespace, controls, the Latin-1 specials, and unpaired surrogates.
//!
//! See <https://source.android.com/docs/core/runtime/dex-format#membername>

use std::iter::Peekable;

/// Bitmap of legal ASCII characters, indexed by code point
const ASCII_VALID_PART: [u32; 4] = [
    0x0000_0000, // 00..1f: controls
    0x03ff_2010, // 20..3f: '$', '-', '0'..'9'
    0x87ff_fffe, // 40..5f: 'A'..'Z', '_'
    0x07ff_fffe, // 60..7f: 'a'..'z'
];

fn is_valid_ascii(unit: u16) -> bool {
    ASCII_VALID_PART[(unit >> 5) as usize] & (1 << (unit & 0x1f)) != 0
}

/// Consume one character of a simple name, returning whether it was legal
///
/// Leading surrogates consume their trailing surrogate as well. An empty iterator is not legal.
pub(crate) fn take_name_part<I: Iterator<Item = u16>>(units: &mut Peekable<I>) -> bool {
    let unit = match units.next() {
        Some(unit) => unit,
        None => return false,
    };
    if unit < 0x80 {
        return is_valid_ascii(unit);
    }
    match unit >> 8 {
        // Only above the Latin-1 non-breaking space
        0x00 => unit > 0x00a0,
        // Leading surrogate must be followed by a trailing one
        0xd8..=0xdb => matches!(units.next(), Some(0xdc00..=0xdfff)),
        // Unpaired trailing surrogate
        0xdc..=0xdf => false,
        // Spaces, controls, and specials
        0x20 | 0xff => !matches!(unit & 0xfff8, 0x2000 | 0x2008 | 0x2028 | 0xfff0 | 0xfff8),
        _ => true,
    }
}

/// Check that a name is a legal field or method name
///
/// Names may be wrapped in angle brackets (eg. `<init>`, `<clinit>`), but otherwise consist only
/// of simple name characters and must not be empty.
pub fn is_valid_member_name(name: &[u16]) -> bool {
    let mut units = name.iter().copied().peekable();
    let angle_name = match units.peek() {
        None => return false,
        Some(&unit) if unit == b'<' as u16 => {
            units.next();
            true
        }
        Some(_) => false,
    };
    loop {
        match units.peek() {
            None => return !angle_name,
            Some(&unit) if unit == b'>' as u16 => {
                units.next();
                return angle_name && units.next().is_none();
            }
            Some(_) => {
                if !take_name_part(&mut units) {
                    return false;
                }
            }
        }
    }
}
