//! The two verification passes
//!
//! [`Verifier`] owns all of the state of one verification: the decoded header, the sections
//! listed in the map, the [`OffsetMap`] built by the structural pass, and the set of classes
//! defined by the file. The passes themselves are split across submodules, each adding methods
//! to [`Verifier`].

mod code;
mod debug_info;
mod encoded;
mod header;
mod inter;
mod intra;

pub use encoded::MAX_ENCODED_VALUE_DEPTH;

use super::binary_format::{Cursor, Deserialize};
use super::descriptors::{ParseDescriptor, TypeDescriptor};
use super::errors::{fail, Error, ErrorKind, Result};
use super::header::{Header, HEADER_SIZE};
use super::items::{FieldId, MethodId, StringId, TypeId};
use super::map::{ItemType, MapSection};
use super::offset_map::OffsetMap;
use crate::util::mutf8;
use std::collections::HashSet;

pub struct Verifier<'a> {
    data: &'a [u8],
    header: Header,

    /// Sections from the map, in file order (filled in by the map check)
    sections: Vec<MapSection>,

    /// Kinds of the data items found during the structural pass
    offsets: OffsetMap,

    /// Type indices of the classes defined so far in the class defs table
    defined_classes: HashSet<u32>,
}

impl<'a> Verifier<'a> {
    /// Decode the header of a buffer, without checking anything beyond its presence
    pub fn new(data: &'a [u8]) -> Result<Verifier<'a>> {
        if data.len() < HEADER_SIZE {
            fail!(
                Bounds,
                "File too short to hold a header: {} bytes, expected at least {:#x}",
                data.len(),
                HEADER_SIZE
            );
        }
        let header: Header = Cursor::new(data, 0).read()?;
        Ok(Verifier {
            data,
            header,
            sections: vec![],
            offsets: OffsetMap::new(),
            defined_classes: HashSet::new(),
        })
    }

    /// Run every check, stopping at the first failure
    ///
    /// On success, returns the kinds of all of the data items found in the file.
    pub fn run(mut self) -> Result<OffsetMap> {
        self.check_header()?;
        self.check_map()?;
        self.check_intra_sections()?;
        self.check_inter_sections()?;
        Ok(self.offsets)
    }

    fn cursor(&self, pos: usize) -> Cursor<'a> {
        Cursor::new(self.data, pos)
    }

    fn check_index(index: u32, limit: u32, label: &str) -> Result<()> {
        if index >= limit {
            fail!(Reference, "Bad index for {}: {:#x} >= {:#x}", label, index, limit);
        }
        Ok(())
    }

    /// Read row `index` of an id table, checking the index against the table size first
    fn read_id<T: Deserialize>(
        &self,
        table_off: u32,
        table_size: u32,
        index: u32,
        label: &str,
    ) -> Result<T> {
        Self::check_index(index, table_size, label)?;
        self.cursor(table_off as usize + index as usize * T::SIZE).read()
    }

    fn string_id(&self, index: u32, label: &str) -> Result<StringId> {
        let header = &self.header;
        self.read_id(header.string_ids_off, header.string_ids_size, index, label)
    }

    fn type_id(&self, index: u32, label: &str) -> Result<TypeId> {
        let header = &self.header;
        self.read_id(header.type_ids_off, header.type_ids_size, index, label)
    }

    fn field_id(&self, index: u32, label: &str) -> Result<FieldId> {
        let header = &self.header;
        self.read_id(header.field_ids_off, header.field_ids_size, index, label)
    }

    fn method_id(&self, index: u32, label: &str) -> Result<MethodId> {
        let header = &self.header;
        self.read_id(header.method_ids_off, header.method_ids_size, index, label)
    }

    /// Encoded bytes of the string data at an offset (without the length or the terminating NUL)
    ///
    /// The offset must already be classified as string data.
    fn string_data(&self, offset: u32) -> Result<&'a [u8]> {
        let mut cursor = self.cursor(offset as usize);
        cursor.read_uleb128("string utf16_size")?;
        let start = cursor.pos();
        match self.data[start..].iter().position(|byte| *byte == 0) {
            Some(len) => Ok(&self.data[start..start + len]),
            None => fail!(Bounds, "Unterminated string data at {:#x}", offset),
        }
    }

    /// Load string `index`, after checking that its string data was verified
    fn load_string(&self, index: u32, label: &str) -> Result<&'a [u8]> {
        let string_id = self.string_id(index, label)?;
        self.offsets
            .check(string_id.string_data_off, ItemType::StringDataItem)?;
        self.string_data(string_id.string_data_off)
    }

    /// Load string `index` as UTF-16 code units
    fn load_units(&self, index: u32, label: &str) -> Result<Vec<u16>> {
        Ok(mutf8::units(self.load_string(index, label)?).collect())
    }

    /// Load and parse the descriptor of type `index`
    fn load_type_descriptor(
        &self,
        index: u32,
        label: &str,
    ) -> Result<(TypeDescriptor, Vec<u16>)> {
        let type_id = self.type_id(index, label)?;
        let units = self.load_units(type_id.descriptor_idx, label)?;
        match TypeDescriptor::parse(&units) {
            Ok(descriptor) => Ok((descriptor, units)),
            Err(reason) => Err(Error::new(
                ErrorKind::Reference,
                format!(
                    "Invalid type descriptor '{}' for {}: {}",
                    String::from_utf16_lossy(&units),
                    label,
                    reason
                ),
            )),
        }
    }

    /// Load type `index`, which must be a class type (not a primitive or an array)
    fn load_class_descriptor(&self, index: u32, label: &str) -> Result<()> {
        let (descriptor, units) = self.load_type_descriptor(index, label)?;
        if !descriptor.is_class() {
            fail!(
                Reference,
                "Invalid class descriptor '{}' for {}",
                String::from_utf16_lossy(&units),
                label
            );
        }
        Ok(())
    }
}

/// Round `offset` up to a multiple of `alignment` (which must be a power of two)
fn align_up(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}
