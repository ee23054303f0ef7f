//! Fixed-size records found in the id tables and at the start of some data items

use super::binary_format::{Cursor, Deserialize};
use super::errors::Result;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct StringId {
    pub string_data_off: u32,
}

impl Deserialize for StringId {
    const SIZE: usize = 4;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(StringId {
            string_data_off: cursor.read_u32("string_data_off")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TypeId {
    pub descriptor_idx: u32,
}

impl Deserialize for TypeId {
    const SIZE: usize = 4;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(TypeId {
            descriptor_idx: cursor.read_u32("descriptor_idx")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ProtoId {
    pub shorty_idx: u32,
    pub return_type_idx: u32,

    /// Offset of a type list, or 0 if there are no parameters
    pub parameters_off: u32,
}

impl Deserialize for ProtoId {
    const SIZE: usize = 12;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(ProtoId {
            shorty_idx: cursor.read_u32("shorty_idx")?,
            return_type_idx: cursor.read_u32("return_type_idx")?,
            parameters_off: cursor.read_u32("parameters_off")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct FieldId {
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

impl Deserialize for FieldId {
    const SIZE: usize = 8;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(FieldId {
            class_idx: cursor.read_u16("field class_idx")?,
            type_idx: cursor.read_u16("field type_idx")?,
            name_idx: cursor.read_u32("field name_idx")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MethodId {
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

impl Deserialize for MethodId {
    const SIZE: usize = 8;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(MethodId {
            class_idx: cursor.read_u16("method class_idx")?,
            proto_idx: cursor.read_u16("method proto_idx")?,
            name_idx: cursor.read_u32("method name_idx")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClassDef {
    pub class_idx: u32,
    pub access_flags: u32,

    /// Type index of the superclass, or `NO_INDEX`
    pub superclass_idx: u32,
    pub interfaces_off: u32,

    /// String index of the source file name, or `NO_INDEX`
    pub source_file_idx: u32,
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

impl Deserialize for ClassDef {
    const SIZE: usize = 32;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(ClassDef {
            class_idx: cursor.read_u32("class_idx")?,
            access_flags: cursor.read_u32("access_flags")?,
            superclass_idx: cursor.read_u32("superclass_idx")?,
            interfaces_off: cursor.read_u32("interfaces_off")?,
            source_file_idx: cursor.read_u32("source_file_idx")?,
            annotations_off: cursor.read_u32("annotations_off")?,
            class_data_off: cursor.read_u32("class_data_off")?,
            static_values_off: cursor.read_u32("static_values_off")?,
        })
    }
}

/// Header of a code item (the instructions, tries, and handlers follow it)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CodeItemHeader {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub tries_size: u16,
    pub debug_info_off: u32,

    /// Length of the instructions, in 16-bit code units
    pub insns_size: u32,
}

impl Deserialize for CodeItemHeader {
    const SIZE: usize = 16;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(CodeItemHeader {
            registers_size: cursor.read_u16("registers_size")?,
            ins_size: cursor.read_u16("ins_size")?,
            outs_size: cursor.read_u16("outs_size")?,
            tries_size: cursor.read_u16("tries_size")?,
            debug_info_off: cursor.read_u32("debug_info_off")?,
            insns_size: cursor.read_u32("insns_size")?,
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TryItem {
    pub start_addr: u32,
    pub insn_count: u16,

    /// Offset of the handler, relative to the start of the handler list
    pub handler_off: u16,
}

impl Deserialize for TryItem {
    const SIZE: usize = 8;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(TryItem {
            start_addr: cursor.read_u32("try start_addr")?,
            insn_count: cursor.read_u16("try insn_count")?,
            handler_off: cursor.read_u16("try handler_off")?,
        })
    }
}

/// Header of an annotations directory (the member lists follow it)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AnnotationsDirectoryHeader {
    pub class_annotations_off: u32,
    pub fields_size: u32,
    pub methods_size: u32,
    pub parameters_size: u32,
}

impl Deserialize for AnnotationsDirectoryHeader {
    const SIZE: usize = 16;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(AnnotationsDirectoryHeader {
            class_annotations_off: cursor.read_u32("class_annotations_off")?,
            fields_size: cursor.read_u32("annotated fields_size")?,
            methods_size: cursor.read_u32("annotated methods_size")?,
            parameters_size: cursor.read_u32("annotated parameters_size")?,
        })
    }
}

/// Entry of one of the member lists in an annotations directory
///
/// Field, method, and parameter annotations share this layout: a member index, then an offset to
/// an annotation set (or, for parameters, an annotation set ref list).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemberAnnotation {
    pub member_idx: u32,
    pub annotations_off: u32,
}

impl Deserialize for MemberAnnotation {
    const SIZE: usize = 8;

    fn deserialize(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(MemberAnnotation {
            member_idx: cursor.read_u32("annotated member_idx")?,
            annotations_off: cursor.read_u32("member annotations_off")?,
        })
    }
}
