use super::{align_up, Verifier};
use crate::dex::access_flags::{FieldAccessFlags, MethodAccessFlags};
use crate::dex::binary_format::Cursor;
use crate::dex::class_data::{ClassDataReader, MemberGroup};
use crate::dex::errors::{fail, Result};
use crate::dex::header::HEADER_SIZE;
use crate::dex::items::{AnnotationsDirectoryHeader, MemberAnnotation, StringId};
use crate::dex::map::{ItemType, MapItem, MapSection};
use crate::dex::Deserialize;

impl<'a> Verifier<'a> {
    /// Structural pass: walk every section in file order, checking each item on its own
    pub(super) fn check_intra_sections(&mut self) -> Result<()> {
        let mut offset: usize = 0;
        let sections = self.sections.clone();

        for section in sections {
            let section_offset = section.offset as usize;
            if offset < section_offset {
                self.check_padding(offset, section_offset, section.item_type)?;
            } else if offset > section_offset {
                fail!(
                    Ordering,
                    "Section overlap or out-of-order map: {:#x}, {:#x}",
                    offset,
                    section_offset
                );
            }

            log::trace!(
                "Checking {} {} items at {:#x}",
                section.count,
                section.item_type,
                section.offset
            );
            offset = match section.item_type {
                ItemType::HeaderItem => HEADER_SIZE,
                _ => self.check_intra_section_iterate(&section)?,
            };

            if section.item_type.is_data_section() && offset as u64 > self.header.data_end() {
                fail!(
                    Bounds,
                    "{} section ends at {:#x}, after the end of the data section {:#x}",
                    section.item_type,
                    offset,
                    self.header.data_end()
                );
            }
        }
        Ok(())
    }

    /// Bytes between the end of one item and the start of the next must all be zero
    fn check_padding(
        &self,
        offset: usize,
        aligned_offset: usize,
        item_type: ItemType,
    ) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let padding = cursor.take(aligned_offset - offset, "padding")?;
        if let Some(pos) = padding.iter().position(|byte| *byte != 0) {
            fail!(
                Alignment,
                "Non-zero padding {:#x} before section of type {} at offset {:#x}",
                padding[pos],
                item_type,
                offset + pos
            );
        }
        Ok(())
    }

    /// Check every item in a section, returning the offset right after the last item
    fn check_intra_section_iterate(&mut self, section: &MapSection) -> Result<usize> {
        let item_type = section.item_type;
        let mut offset = section.offset as usize;

        for i in 0..section.count {
            let aligned_offset = align_up(offset, item_type.alignment());
            if aligned_offset > offset {
                self.check_padding(offset, aligned_offset, item_type)?;
            }
            offset = aligned_offset;

            let mut cursor = self.cursor(offset);
            match item_type {
                ItemType::HeaderItem => fail!(Header, "Header cannot be iterated as a section"),
                ItemType::StringIdItem => self.check_string_id(&mut cursor, i)?,
                ItemType::TypeIdItem => cursor.skip(4, "type_id_item")?,
                ItemType::ProtoIdItem => cursor.skip(12, "proto_id_item")?,
                ItemType::FieldIdItem => cursor.skip(8, "field_id_item")?,
                ItemType::MethodIdItem => cursor.skip(8, "method_id_item")?,
                ItemType::ClassDefItem => cursor.skip(32, "class_def_item")?,
                ItemType::MapList => {
                    cursor.check_list(MapItem::SIZE, "map_list")?;
                }
                ItemType::TypeList => self.check_type_list(&mut cursor)?,
                ItemType::AnnotationSetRefList => {
                    cursor.check_list(4, "annotation_set_ref_list")?;
                }
                ItemType::AnnotationSetItem => {
                    cursor.check_list(4, "annotation_set_item")?;
                }
                ItemType::ClassDataItem => self.check_class_data(&mut cursor)?,
                ItemType::CodeItem => self.check_code_item(&mut cursor)?,
                ItemType::StringDataItem => Self::check_string_data(&mut cursor)?,
                ItemType::DebugInfoItem => self.check_debug_info(&mut cursor)?,
                ItemType::AnnotationItem => self.check_annotation_item(&mut cursor)?,
                ItemType::EncodedArrayItem => self.check_encoded_array(&mut cursor, 0)?,
                ItemType::AnnotationsDirectoryItem => {
                    self.check_annotations_directory(&mut cursor)?
                }
            }

            if item_type.is_data_section() {
                self.offsets.record(offset as u32, item_type)?;
            }
            offset = cursor.pos();
        }
        Ok(offset)
    }

    fn check_string_id(&self, cursor: &mut Cursor<'a>, index: u32) -> Result<()> {
        let string_id: StringId = cursor.read()?;
        let string_data_off = string_id.string_data_off as u64;
        if string_data_off < self.header.data_off as u64
            || string_data_off >= self.header.data_end()
            || string_data_off >= self.data.len() as u64
        {
            fail!(
                Bounds,
                "Bad string_data_off {:#x} for string id {}: outside of data section [{:#x}, {:#x})",
                string_data_off,
                index,
                self.header.data_off,
                self.header.data_end()
            );
        }
        Ok(())
    }

    fn check_type_list(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        let (count, start) = cursor.check_list(2, "type_list")?;
        let mut entries = self.cursor(start);
        for _ in 0..count {
            let type_idx = entries.read_u16("type_list entry")?;
            Self::check_index(type_idx as u32, self.header.type_ids_size, "type_list entry")?;
        }
        Ok(())
    }

    /// Check a MUTF-8 string: its declared length must match its contents exactly
    fn check_string_data(cursor: &mut Cursor<'a>) -> Result<()> {
        let size = cursor.read_uleb128("string utf16_size")?;
        for _ in 0..size {
            let byte = cursor.read_u8("string data")?;
            match byte >> 4 {
                0x0..=0x7 => {
                    if byte == 0 {
                        fail!(
                            Encoding,
                            "String data shorter than indicated utf16_size {:#x}",
                            size
                        );
                    }
                }
                0x8..=0xb | 0xf => {
                    fail!(
                        Encoding,
                        "Illegal start byte {:#x} in string data at {:#x}",
                        byte,
                        cursor.pos() - 1
                    );
                }
                0xc | 0xd => {
                    let second = Self::read_continuation_byte(cursor)?;
                    let value = ((byte as u16 & 0x1f) << 6) | (second as u16 & 0x3f);
                    if value != 0 && value < 0x80 {
                        fail!(
                            Encoding,
                            "Illegal representation for value {:#x} in string data",
                            value
                        );
                    }
                }
                _ => {
                    let second = Self::read_continuation_byte(cursor)?;
                    let third = Self::read_continuation_byte(cursor)?;
                    let value = ((byte as u16 & 0x0f) << 12)
                        | ((second as u16 & 0x3f) << 6)
                        | (third as u16 & 0x3f);
                    if value < 0x800 {
                        fail!(
                            Encoding,
                            "Illegal representation for value {:#x} in string data",
                            value
                        );
                    }
                }
            }
        }
        if cursor.read_u8("string data terminator")? != 0 {
            fail!(Encoding, "String longer than indicated size {:#x}", size);
        }
        Ok(())
    }

    fn read_continuation_byte(cursor: &mut Cursor<'a>) -> Result<u8> {
        let byte = cursor.read_u8("string data")?;
        if byte & 0xc0 != 0x80 {
            fail!(
                Encoding,
                "Illegal continuation byte {:#x} in string data at {:#x}",
                byte,
                cursor.pos() - 1
            );
        }
        Ok(byte)
    }

    fn check_class_data(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        let mut reader = ClassDataReader::new(self.data, cursor.pos())?;
        while let Some(member) = reader.next_member()? {
            if !member.first_in_group && member.index_delta == 0 {
                fail!(
                    Ordering,
                    "Out-of-order {} index: {:#x} is duplicated",
                    member.group.name(),
                    member.index
                );
            }

            if member.group.is_field() {
                Self::check_index(member.index, self.header.field_ids_size, "class_data field")?;
                let flags = match FieldAccessFlags::from_bits(member.access_flags) {
                    Some(flags) => flags,
                    None => fail!(
                        Encoding,
                        "Bad class_data_item field access_flags {:#x}",
                        member.access_flags
                    ),
                };
                let expect_static = member.group == MemberGroup::StaticFields;
                if flags.contains(FieldAccessFlags::STATIC) != expect_static {
                    fail!(
                        Encoding,
                        "Static/instance field mismatch for field {:#x} with access_flags {:#x}",
                        member.index,
                        member.access_flags
                    );
                }
            } else {
                Self::check_index(member.index, self.header.method_ids_size, "class_data method")?;
                let flags = match MethodAccessFlags::from_bits(member.access_flags) {
                    Some(flags) => flags,
                    None => fail!(
                        Encoding,
                        "Bad class_data_item method access_flags {:#x}",
                        member.access_flags
                    ),
                };
                let expect_direct = member.group == MemberGroup::DirectMethods;
                if flags.is_direct() != expect_direct {
                    fail!(
                        Encoding,
                        "Direct/virtual method mismatch for method {:#x} with access_flags {:#x}",
                        member.index,
                        member.access_flags
                    );
                }
                if flags.contains(MethodAccessFlags::SYNCHRONIZED)
                    && !flags.contains(MethodAccessFlags::NATIVE)
                {
                    fail!(
                        Encoding,
                        "Method {:#x} is synchronized without being native",
                        member.index
                    );
                }
                match (flags.expects_code(), member.code_off) {
                    (true, 0) => fail!(
                        Reference,
                        "Method {:#x} with access_flags {:#x} is missing a code item",
                        member.index,
                        member.access_flags
                    ),
                    (false, code_off) if code_off != 0 => fail!(
                        Reference,
                        "Native or abstract method {:#x} has a code item at {:#x}",
                        member.index,
                        code_off
                    ),
                    _ => (),
                }
            }
        }
        cursor.set_pos(reader.pos());
        Ok(())
    }

    fn check_annotation_item(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        match cursor.read_u8("annotation visibility")? {
            0 | 1 | 2 => (),
            other => fail!(Encoding, "Bad annotation visibility: {:#x}", other),
        }
        self.check_encoded_annotation(cursor, 0)
    }

    fn check_annotations_directory(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        let directory: AnnotationsDirectoryHeader = cursor.read()?;
        let lists = [
            (directory.fields_size, self.header.field_ids_size, "field_annotation"),
            (directory.methods_size, self.header.method_ids_size, "method_annotation"),
            (
                directory.parameters_size,
                self.header.method_ids_size,
                "parameter_annotation",
            ),
        ];
        for (count, limit, label) in lists {
            cursor.check_list_size(cursor.pos(), count as usize, MemberAnnotation::SIZE, label)?;
            let mut previous: Option<u32> = None;
            for _ in 0..count {
                let entry: MemberAnnotation = cursor.read()?;
                Self::check_index(entry.member_idx, limit, label)?;
                if let Some(previous) = previous {
                    if previous >= entry.member_idx {
                        fail!(
                            Ordering,
                            "Out-of-order {} index: {:#x} then {:#x}",
                            label,
                            previous,
                            entry.member_idx
                        );
                    }
                }
                previous = Some(entry.member_idx);
            }
        }
        Ok(())
    }
}
