use super::binary_format::{Cursor, Deserialize};
use super::errors::Result;
use std::fmt;

/// Kinds of items a dex file can contain, as listed in its map
///
/// [0]: https://source.android.com/docs/core/runtime/dex-format#type-codes
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ItemType {
    HeaderItem,
    StringIdItem,
    TypeIdItem,
    ProtoIdItem,
    FieldIdItem,
    MethodIdItem,
    ClassDefItem,
    MapList,
    TypeList,
    AnnotationSetRefList,
    AnnotationSetItem,
    ClassDataItem,
    CodeItem,
    StringDataItem,
    DebugInfoItem,
    AnnotationItem,
    EncodedArrayItem,
    AnnotationsDirectoryItem,
}

impl ItemType {
    pub const fn from_raw(raw: u16) -> Option<ItemType> {
        Some(match raw {
            0x0000 => ItemType::HeaderItem,
            0x0001 => ItemType::StringIdItem,
            0x0002 => ItemType::TypeIdItem,
            0x0003 => ItemType::ProtoIdItem,
            0x0004 => ItemType::FieldIdItem,
            0x0005 => ItemType::MethodIdItem,
            0x0006 => ItemType::ClassDefItem,
            0x1000 => ItemType::MapList,
            0x1001 => ItemType::TypeList,
            0x1002 => ItemType::AnnotationSetRefList,
            0x1003 => ItemType::AnnotationSetItem,
            0x2000 => ItemType::ClassDataItem,
            0x2001 => ItemType::CodeItem,
            0x2002 => ItemType::StringDataItem,
            0x2003 => ItemType::DebugInfoItem,
            0x2004 => ItemType::AnnotationItem,
            0x2005 => ItemType::EncodedArrayItem,
            0x2006 => ItemType::AnnotationsDirectoryItem,
            _ => return None,
        })
    }

    pub const fn to_raw(self) -> u16 {
        match self {
            ItemType::HeaderItem => 0x0000,
            ItemType::StringIdItem => 0x0001,
            ItemType::TypeIdItem => 0x0002,
            ItemType::ProtoIdItem => 0x0003,
            ItemType::FieldIdItem => 0x0004,
            ItemType::MethodIdItem => 0x0005,
            ItemType::ClassDefItem => 0x0006,
            ItemType::MapList => 0x1000,
            ItemType::TypeList => 0x1001,
            ItemType::AnnotationSetRefList => 0x1002,
            ItemType::AnnotationSetItem => 0x1003,
            ItemType::ClassDataItem => 0x2000,
            ItemType::CodeItem => 0x2001,
            ItemType::StringDataItem => 0x2002,
            ItemType::DebugInfoItem => 0x2003,
            ItemType::AnnotationItem => 0x2004,
            ItemType::EncodedArrayItem => 0x2005,
            ItemType::AnnotationsDirectoryItem => 0x2006,
        }
    }

    /// Name used in the format documentation (and in diagnostics)
    pub const fn name(self) -> &'static str {
        match self {
            ItemType::HeaderItem => "header_item",
            ItemType::StringIdItem => "string_id_item",
            ItemType::TypeIdItem => "type_id_item",
            ItemType::ProtoIdItem => "proto_id_item",
            ItemType::FieldIdItem => "field_id_item",
            ItemType::MethodIdItem => "method_id_item",
            ItemType::ClassDefItem => "class_def_item",
            ItemType::MapList => "map_list",
            ItemType::TypeList => "type_list",
            ItemType::AnnotationSetRefList => "annotation_set_ref_list",
            ItemType::AnnotationSetItem => "annotation_set_item",
            ItemType::ClassDataItem => "class_data_item",
            ItemType::CodeItem => "code_item",
            ItemType::StringDataItem => "string_data_item",
            ItemType::DebugInfoItem => "debug_info_item",
            ItemType::AnnotationItem => "annotation_item",
            ItemType::EncodedArrayItem => "encoded_array_item",
            ItemType::AnnotationsDirectoryItem => "annotations_directory_item",
        }
    }

    /// Everything except the header and the id tables lives in the data section
    pub const fn is_data_section(self) -> bool {
        !matches!(
            self,
            ItemType::HeaderItem
                | ItemType::StringIdItem
                | ItemType::TypeIdItem
                | ItemType::ProtoIdItem
                | ItemType::FieldIdItem
                | ItemType::MethodIdItem
                | ItemType::ClassDefItem
        )
    }

    /// Required alignment of every item of this kind
    pub const fn alignment(self) -> usize {
        match self {
            ItemType::ClassDataItem
            | ItemType::StringDataItem
            | ItemType::DebugInfoItem
            | ItemType::AnnotationItem
            | ItemType::EncodedArrayItem => 1,
            _ => 4,
        }
    }

    /// Size of each item, for the kinds where every item has the same size
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            ItemType::HeaderItem => Some(super::header::HEADER_SIZE),
            ItemType::StringIdItem | ItemType::TypeIdItem => Some(4),
            ItemType::ProtoIdItem => Some(12),
            ItemType::FieldIdItem | ItemType::MethodIdItem => Some(8),
            ItemType::ClassDefItem => Some(32),
            _ => None,
        }
    }

    /// Bit used to track which kinds have already been seen in the map
    pub(crate) const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry in the map list
///
/// The `item_type` is kept raw: unknown kinds are a verification failure, not a decoding one.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MapItem {
    pub item_type: u16,
    pub unused: u16,
    pub size: u32,
    pub offset: u32,
}

impl Deserialize for MapItem {
    const SIZE: usize = 12;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(MapItem {
            item_type: cursor.read_u16("map_item type")?,
            unused: cursor.read_u16("map_item unused")?,
            size: cursor.read_u32("map_item size")?,
            offset: cursor.read_u32("map_item offset")?,
        })
    }
}

/// Map entry whose kind and envelope have been validated
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MapSection {
    pub item_type: ItemType,
    pub count: u32,
    pub offset: u32,
}
