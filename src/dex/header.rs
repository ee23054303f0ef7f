use super::binary_format::{Cursor, Deserialize};
use super::errors::Result;

/// Size of the header, which is also the only legal value of `header_size`
pub const HEADER_SIZE: usize = 0x70;

/// Value of `endian_tag` in little-endian files (the only ones accepted)
pub const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// Value of `endian_tag` in byte-swapped files
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x7856_3412;

/// First four bytes of the magic
pub const MAGIC: [u8; 4] = *b"dex\n";

/// Versions (bytes 4 to 7 of the magic) that this verifier understands
pub const SUPPORTED_VERSIONS: [[u8; 4]; 2] = [*b"035\0", *b"037\0"];

/// Marker for "no index" in 32-bit index fields
pub const NO_INDEX: u32 = 0xffff_ffff;

/// Offset of the first byte covered by the checksum
pub const CHECKSUM_START: usize = 12;

/// Header at the very start of the file
///
/// See <https://source.android.com/docs/core/runtime/dex-format#header-item>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Header {
    pub magic: [u8; 8],

    /// Adler-32 of everything after this field
    pub checksum: u32,

    /// SHA-1 of everything after this field (not checked)
    pub signature: [u8; 20],

    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header {
    /// Version part of the magic (eg. `b"035\0"`)
    pub fn version(&self) -> [u8; 4] {
        [self.magic[4], self.magic[5], self.magic[6], self.magic[7]]
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic[..4] == MAGIC
    }

    pub fn has_supported_version(&self) -> bool {
        SUPPORTED_VERSIONS.contains(&self.version())
    }

    /// Exclusive end of the data section (widened, since the header is not yet trusted)
    pub fn data_end(&self) -> u64 {
        self.data_off as u64 + self.data_size as u64
    }
}

impl Deserialize for Header {
    const SIZE: usize = HEADER_SIZE;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut magic = [0; 8];
        magic.copy_from_slice(cursor.take(8, "header magic")?);
        let checksum = cursor.read_u32("header checksum")?;
        let mut signature = [0; 20];
        signature.copy_from_slice(cursor.take(20, "header signature")?);

        Ok(Header {
            magic,
            checksum,
            signature,
            file_size: cursor.read_u32("file_size")?,
            header_size: cursor.read_u32("header_size")?,
            endian_tag: cursor.read_u32("endian_tag")?,
            link_size: cursor.read_u32("link_size")?,
            link_off: cursor.read_u32("link_off")?,
            map_off: cursor.read_u32("map_off")?,
            string_ids_size: cursor.read_u32("string_ids_size")?,
            string_ids_off: cursor.read_u32("string_ids_off")?,
            type_ids_size: cursor.read_u32("type_ids_size")?,
            type_ids_off: cursor.read_u32("type_ids_off")?,
            proto_ids_size: cursor.read_u32("proto_ids_size")?,
            proto_ids_off: cursor.read_u32("proto_ids_off")?,
            field_ids_size: cursor.read_u32("field_ids_size")?,
            field_ids_off: cursor.read_u32("field_ids_off")?,
            method_ids_size: cursor.read_u32("method_ids_size")?,
            method_ids_off: cursor.read_u32("method_ids_off")?,
            class_defs_size: cursor.read_u32("class_defs_size")?,
            class_defs_off: cursor.read_u32("class_defs_off")?,
            data_size: cursor.read_u32("data_size")?,
            data_off: cursor.read_u32("data_off")?,
        })
    }
}
