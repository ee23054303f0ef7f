use super::errors::{fail, Result};
use crate::util::leb128::{self, Leb128Error};
use byteorder::{ByteOrder, LittleEndian};

/// Utility trait for decoding fixed-size records inside dex files
///
/// Dex files have some peculiarities that make it useful to define an extra trait (instead of
/// just reading structs straight out of the buffer):
///
///   - everything is little-endian, regardless of the host
///   - the buffer is untrusted, so every read must be bounds-checked against the whole file
///
pub trait Deserialize: Sized {
    /// Number of bytes the record occupies in the file
    const SIZE: usize;

    /// Deserialize the record from the cursor, advancing it past the record
    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self>;
}

impl Deserialize for u8 {
    const SIZE: usize = 1;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.read_u8("u8")
    }
}

impl Deserialize for u16 {
    const SIZE: usize = 2;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.read_u16("u16")
    }
}

impl Deserialize for u32 {
    const SIZE: usize = 4;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.read_u32("u32")
    }
}

/// Read position inside of an immutable byte buffer
///
/// Offsets are always absolute within the buffer (which is the whole file), and every read checks
/// that it stays inside the buffer before touching any bytes.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Cursor<'a> {
        Cursor { data, pos }
    }

    /// Current absolute offset
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Check that `count` elements of `element_size` bytes starting at `start` fit in the buffer
    pub fn check_list_size(
        &self,
        start: usize,
        count: usize,
        element_size: usize,
        label: &str,
    ) -> Result<()> {
        let end = count
            .checked_mul(element_size)
            .and_then(|size| start.checked_add(size));
        match end {
            Some(end) if start <= self.data.len() && end <= self.data.len() => Ok(()),
            Some(end) => fail!(Bounds, "Bad range for {}: {:#x} to {:#x}", label, start, end),
            None => fail!(
                Bounds,
                "Bad range for {}: {:#x} plus {} elements of {} bytes overflows",
                label,
                start,
                count,
                element_size
            ),
        }
    }

    /// Check a `u32`-counted list at the cursor and move past it
    ///
    /// Only the envelope is checked: the count must be readable and the elements must fit in the
    /// buffer. Returns the count along with the offset of the first element.
    pub fn check_list(&mut self, element_size: usize, label: &str) -> Result<(u32, usize)> {
        let count = self.read_u32(label)?;
        let start = self.pos;
        self.check_list_size(start, count as usize, element_size, label)?;
        self.pos = start + count as usize * element_size;
        Ok((count, start))
    }

    /// Borrow the next `len` bytes and move past them
    pub fn take(&mut self, len: usize, label: &str) -> Result<&'a [u8]> {
        self.check_list_size(self.pos, len, 1, label)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, label: &str) -> Result<()> {
        self.take(len, label).map(|_| ())
    }

    pub fn read_u8(&mut self, label: &str) -> Result<u8> {
        Ok(self.take(1, label)?[0])
    }

    pub fn read_u16(&mut self, label: &str) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2, label)?))
    }

    pub fn read_u32(&mut self, label: &str) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4, label)?))
    }

    /// Read an unsigned little-endian value stored in `size` bytes (at most 4)
    pub fn read_sized_u32(&mut self, size: usize, label: &str) -> Result<u32> {
        debug_assert!((1..=4).contains(&size));
        Ok(LittleEndian::read_uint(self.take(size, label)?, size) as u32)
    }

    pub fn read_uleb128(&mut self, label: &str) -> Result<u32> {
        let start = self.pos;
        match leb128::decode_unsigned(&self.data[start.min(self.data.len())..]) {
            Ok((value, len)) => {
                self.pos += len;
                Ok(value)
            }
            Err(err) => Self::leb128_failure(err, start, label),
        }
    }

    pub fn read_sleb128(&mut self, label: &str) -> Result<i32> {
        let start = self.pos;
        match leb128::decode_signed(&self.data[start.min(self.data.len())..]) {
            Ok((value, len)) => {
                self.pos += len;
                Ok(value)
            }
            Err(err) => Self::leb128_failure(err, start, label),
        }
    }

    /// Read a ULEB128 value which stores an index plus one (so zero means "no index")
    pub fn read_uleb128p1(&mut self, label: &str) -> Result<Option<u32>> {
        Ok(self.read_uleb128(label)?.checked_sub(1))
    }

    /// Read a fixed-size record
    pub fn read<T: Deserialize>(&mut self) -> Result<T> {
        T::deserialize(self)
    }

    fn leb128_failure<T>(err: Leb128Error, start: usize, label: &str) -> Result<T> {
        match err {
            Leb128Error::Truncated => {
                fail!(Bounds, "Truncated LEB128 {} at {:#x}", label, start)
            }
            Leb128Error::TooLong => {
                fail!(Encoding, "LEB128 {} at {:#x} is longer than 5 bytes", label, start)
            }
        }
    }
}
