use super::Verifier;
use crate::dex::errors::{fail, Result};
use crate::dex::header::{
    CHECKSUM_START, ENDIAN_CONSTANT, HEADER_SIZE, REVERSE_ENDIAN_CONSTANT,
};
use crate::dex::map::{ItemType, MapItem, MapSection};
use crate::dex::offset_map::OffsetMap;
use crate::dex::Deserialize;
use crate::util::adler32;

/// Most type ids and proto ids a file can have (they are referenced through 16-bit indices)
const MAX_16_BIT_TABLE_SIZE: u32 = 65535;

impl<'a> Verifier<'a> {
    pub(super) fn check_header(&self) -> Result<()> {
        let header = &self.header;

        if !header.has_valid_magic() {
            fail!(Header, "Bad file magic: {:02x?}", &header.magic[..4]);
        }
        if !header.has_supported_version() {
            fail!(
                Header,
                "Unknown dex version: {:?}",
                String::from_utf8_lossy(&header.version())
            );
        }

        if header.file_size as usize != self.data.len() {
            fail!(
                Header,
                "Bad file size ({}, expected {})",
                self.data.len(),
                header.file_size
            );
        }

        let checksum = adler32(&self.data[CHECKSUM_START..]);
        if checksum != header.checksum {
            fail!(
                Header,
                "Bad checksum ({:08x}, expected {:08x})",
                checksum,
                header.checksum
            );
        }

        match header.endian_tag {
            ENDIAN_CONSTANT => (),
            REVERSE_ENDIAN_CONSTANT => fail!(Header, "Big-endian files are not supported"),
            other => fail!(Header, "Unexpected endian_tag: {:#x}", other),
        }

        if header.header_size as usize != HEADER_SIZE {
            fail!(
                Header,
                "Bad header size: {:#x}, expected {:#x}",
                header.header_size,
                HEADER_SIZE
            );
        }

        if header.map_off == 0 {
            fail!(Header, "Missing map: map_off is 0");
        }

        self.check_valid_offset_and_size(header.link_off, header.link_size, 1, 0, "link")?;
        self.check_valid_offset_and_size(header.map_off, 1, MapItem::SIZE, 4, "map")?;
        self.check_valid_offset_and_size(
            header.string_ids_off,
            header.string_ids_size,
            4,
            4,
            "string-ids",
        )?;
        self.check_valid_offset_and_size(
            header.type_ids_off,
            header.type_ids_size,
            4,
            4,
            "type-ids",
        )?;
        self.check_valid_offset_and_size(
            header.proto_ids_off,
            header.proto_ids_size,
            12,
            4,
            "proto-ids",
        )?;
        self.check_valid_offset_and_size(
            header.field_ids_off,
            header.field_ids_size,
            8,
            4,
            "field-ids",
        )?;
        self.check_valid_offset_and_size(
            header.method_ids_off,
            header.method_ids_size,
            8,
            4,
            "method-ids",
        )?;
        self.check_valid_offset_and_size(
            header.class_defs_off,
            header.class_defs_size,
            32,
            4,
            "class-defs",
        )?;
        self.check_valid_offset_and_size(header.data_off, header.data_size, 1, 0, "data")?;

        if header.type_ids_size > MAX_16_BIT_TABLE_SIZE {
            fail!(
                Header,
                "Size({}) should not exceed {} for type-ids",
                header.type_ids_size,
                MAX_16_BIT_TABLE_SIZE
            );
        }
        if header.proto_ids_size > MAX_16_BIT_TABLE_SIZE {
            fail!(
                Header,
                "Size({}) should not exceed {} for proto-ids",
                header.proto_ids_size,
                MAX_16_BIT_TABLE_SIZE
            );
        }

        let map_off = header.map_off as u64;
        if map_off < header.data_off as u64 || map_off >= header.data_end() {
            fail!(
                Header,
                "Map at {:#x} is outside of the data section [{:#x}, {:#x})",
                map_off,
                header.data_off,
                header.data_end()
            );
        }

        log::trace!("Header of {} bytes is valid", self.data.len());
        Ok(())
    }

    /// Check one of the `(size, off)` pairs of the header
    ///
    /// A table with no elements must have a zero offset. Otherwise, the table must start after the
    /// header, be aligned, and fit entirely in the file.
    fn check_valid_offset_and_size(
        &self,
        offset: u32,
        size: u32,
        element_size: usize,
        alignment: usize,
        label: &str,
    ) -> Result<()> {
        if size == 0 {
            if offset != 0 {
                fail!(
                    Header,
                    "Offset({:#x}) should be zero when size is zero for {}",
                    offset,
                    label
                );
            }
            return Ok(());
        }
        if (offset as usize) < HEADER_SIZE {
            fail!(
                Header,
                "Offset({:#x}) should be after header({:#x}) for {}",
                offset,
                HEADER_SIZE,
                label
            );
        }
        if alignment != 0 && offset as usize % alignment != 0 {
            fail!(
                Header,
                "Offset({:#x}) should be aligned by {} for {}",
                offset,
                alignment,
                label
            );
        }
        let end = offset as u64 + size as u64 * element_size as u64;
        if end > self.data.len() as u64 {
            fail!(
                Header,
                "Offset({:#x}) plus {} elements of {} bytes should be within file size({:#x}) for {}",
                offset,
                size,
                element_size,
                self.data.len(),
                label
            );
        }
        Ok(())
    }

    /// Check the map list, and collect its sections
    pub(super) fn check_map(&mut self) -> Result<()> {
        let header = &self.header;
        let file_size = self.data.len() as u64;

        let mut cursor = self.cursor(header.map_off as usize);
        let (count, _) = cursor.check_list(MapItem::SIZE, "map list")?;
        cursor.set_pos(header.map_off as usize + 4);

        let mut sections: Vec<MapSection> = Vec::with_capacity(count as usize);
        let mut used_bits: u32 = 0;
        let mut data_items_left: u32 = header.data_size;

        for i in 0..count {
            let item: MapItem = cursor.read()?;

            if let Some(previous) = sections.last() {
                if item.offset <= previous.offset {
                    fail!(
                        Ordering,
                        "Out of order map item: {:#x} then {:#x}",
                        previous.offset,
                        item.offset
                    );
                }
            }
            if item.offset as u64 >= file_size {
                fail!(
                    Bounds,
                    "Map item {} after end of file: {:#x}, size {:#x}",
                    i,
                    item.offset,
                    file_size
                );
            }

            let item_type = match ItemType::from_raw(item.item_type) {
                Some(item_type) => item_type,
                None => fail!(Encoding, "Unknown map section type {:#x}", item.item_type),
            };
            if used_bits & item_type.bit() != 0 {
                fail!(Ordering, "Duplicate map section of type {}", item_type);
            }
            used_bits |= item_type.bit();

            if item.size == 0 {
                fail!(Encoding, "Empty map section of type {}", item_type);
            }
            if item.offset as usize % item_type.alignment() != 0 {
                fail!(
                    Alignment,
                    "Map section of type {} at {:#x} is not {}-byte aligned",
                    item_type,
                    item.offset,
                    item_type.alignment()
                );
            }
            if let Some(element_size) = item_type.fixed_size() {
                let end = item.offset as u64 + item.size as u64 * element_size as u64;
                if end > file_size {
                    fail!(
                        Bounds,
                        "Map section of type {} at {:#x} with {} items ends after end of file",
                        item_type,
                        item.offset,
                        item.size
                    );
                }
            }

            if item_type.is_data_section() {
                if (item.offset as u64) < header.data_off as u64
                    || item.offset as u64 >= header.data_end()
                {
                    fail!(
                        Bounds,
                        "Map section of type {} at {:#x} is outside of the data section",
                        item_type,
                        item.offset
                    );
                }
                if item.size > data_items_left {
                    fail!(
                        Bounds,
                        "Too many items in data section: {} more than data_size allows",
                        item.size - data_items_left
                    );
                }
                data_items_left -= item.size;
            }

            sections.push(MapSection {
                item_type,
                count: item.size,
                offset: item.offset,
            });
        }

        let find = |item_type: ItemType| sections.iter().find(|s| s.item_type == item_type);

        match find(ItemType::HeaderItem) {
            None => fail!(Header, "Map is missing header entry"),
            Some(section) if section.offset != 0 || section.count != 1 => fail!(
                Header,
                "Map header entry should be at 0 with 1 item, not at {:#x} with {}",
                section.offset,
                section.count
            ),
            Some(_) => (),
        }
        match find(ItemType::MapList) {
            None => fail!(Header, "Map is missing map_list entry"),
            Some(section) if section.offset != header.map_off || section.count != 1 => fail!(
                Header,
                "Map map_list entry should be at {:#x} with 1 item, not at {:#x} with {}",
                header.map_off,
                section.offset,
                section.count
            ),
            Some(_) => (),
        }

        let id_tables = [
            (ItemType::StringIdItem, header.string_ids_off, header.string_ids_size),
            (ItemType::TypeIdItem, header.type_ids_off, header.type_ids_size),
            (ItemType::ProtoIdItem, header.proto_ids_off, header.proto_ids_size),
            (ItemType::FieldIdItem, header.field_ids_off, header.field_ids_size),
            (ItemType::MethodIdItem, header.method_ids_off, header.method_ids_size),
            (ItemType::ClassDefItem, header.class_defs_off, header.class_defs_size),
        ];
        for (item_type, offset, size) in id_tables {
            match find(item_type) {
                None if size != 0 => fail!(Header, "Map is missing {} entry", item_type),
                None => (),
                Some(section) if section.count != size => fail!(
                    Header,
                    "Map {} size mismatch: {} in the map, {} in the header",
                    item_type,
                    section.count,
                    size
                ),
                Some(section) if section.offset != offset => fail!(
                    Header,
                    "Map {} offset mismatch: {:#x} in the map, {:#x} in the header",
                    item_type,
                    section.offset,
                    offset
                ),
                Some(_) => (),
            }
        }

        let data_items = (header.data_size - data_items_left) as usize;
        log::trace!(
            "Map lists {} sections with {} data items",
            sections.len(),
            data_items
        );
        self.sections = sections;
        self.offsets = OffsetMap::with_capacity(data_items);
        Ok(())
    }
}
