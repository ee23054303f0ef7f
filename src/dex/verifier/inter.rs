use super::{align_up, Verifier};
use crate::dex::access_flags::ClassAccessFlags;
use crate::dex::class_data::{ClassDataMember, ClassDataReader};
use crate::dex::descriptors::{check_shorty_match, FieldType, TypeDescriptor};
use crate::dex::errors::{fail, Error, ErrorKind, Result};
use crate::dex::header::NO_INDEX;
use crate::dex::items::{
    AnnotationsDirectoryHeader, ClassDef, CodeItemHeader, FieldId, MemberAnnotation, MethodId,
    ProtoId, StringId, TypeId,
};
use crate::dex::map::{ItemType, MapSection};
use crate::dex::names::is_valid_member_name;
use crate::util::mutf8;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Checker for one item of a data section, returning the offset right after the item
type DataItemCheck<'a> = fn(&Verifier<'a>, usize) -> Result<usize>;

impl<'a> Verifier<'a> {
    /// Reference pass: walk the sections again, checking how items refer to each other
    pub(super) fn check_inter_sections(&mut self) -> Result<()> {
        let sections = self.sections.clone();
        for section in &sections {
            let offset = section.offset as usize;
            let count = section.count;
            log::trace!(
                "Checking references of {} {} items at {:#x}",
                count,
                section.item_type,
                offset
            );
            match section.item_type {
                ItemType::StringIdItem => self.check_inter_string_ids(offset, count)?,
                ItemType::TypeIdItem => self.check_inter_type_ids(offset, count)?,
                ItemType::ProtoIdItem => self.check_inter_proto_ids(offset, count)?,
                ItemType::FieldIdItem => self.check_inter_field_ids(offset, count)?,
                ItemType::MethodIdItem => self.check_inter_method_ids(offset, count)?,
                ItemType::ClassDefItem => self.check_inter_class_defs(offset, count)?,
                ItemType::AnnotationSetRefList => self.check_inter_data_section(
                    section,
                    Self::check_inter_annotation_set_ref_list,
                )?,
                ItemType::AnnotationSetItem => {
                    self.check_inter_data_section(section, Self::check_inter_annotation_set)?
                }
                ItemType::ClassDataItem => {
                    self.check_inter_data_section(section, Self::check_inter_class_data)?
                }
                ItemType::AnnotationsDirectoryItem => self.check_inter_data_section(
                    section,
                    Self::check_inter_annotations_directory,
                )?,
                _ => (),
            }
        }
        Ok(())
    }

    fn check_inter_data_section(
        &self,
        section: &MapSection,
        check: DataItemCheck<'a>,
    ) -> Result<()> {
        let mut offset = section.offset as usize;
        for _ in 0..section.count {
            offset = align_up(offset, section.item_type.alignment());
            self.offsets.check(offset as u32, section.item_type)?;
            offset = check(self, offset)?;
        }
        Ok(())
    }

    fn check_inter_string_ids(&self, offset: usize, count: u32) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let mut previous: Option<&[u8]> = None;
        for _ in 0..count {
            let string_id: StringId = cursor.read()?;
            self.offsets
                .check(string_id.string_data_off, ItemType::StringDataItem)?;
            let string = self.string_data(string_id.string_data_off)?;
            if let Some(previous) = previous {
                if mutf8::compare(previous, string) != Ordering::Less {
                    fail!(
                        Ordering,
                        "Out-of-order string_ids: '{}' then '{}'",
                        mutf8::to_string_lossy(previous),
                        mutf8::to_string_lossy(string)
                    );
                }
            }
            previous = Some(string);
        }
        Ok(())
    }

    fn check_inter_type_ids(&self, offset: usize, count: u32) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let mut previous: Option<u32> = None;
        for i in 0..count {
            let type_id: TypeId = cursor.read()?;
            self.load_type_descriptor(i, "type_id descriptor_idx")?;
            if let Some(previous) = previous {
                if previous >= type_id.descriptor_idx {
                    fail!(
                        Ordering,
                        "Out-of-order type_ids: {:#x} then {:#x}",
                        previous,
                        type_id.descriptor_idx
                    );
                }
            }
            previous = Some(type_id.descriptor_idx);
        }
        Ok(())
    }

    fn check_inter_proto_ids(&self, offset: usize, count: u32) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let mut previous: Option<(u32, Vec<u16>)> = None;
        for i in 0..count {
            let proto: ProtoId = cursor.read()?;
            let shorty = self.load_units(proto.shorty_idx, "proto_id shorty_idx")?;
            let (return_type, _) =
                self.load_type_descriptor(proto.return_type_idx, "proto_id return_type_idx")?;
            let parameters = self.load_type_list(proto.parameters_off)?;

            let (return_shorty, parameter_shorties) = match shorty.split_first() {
                Some(split) => split,
                None => fail!(Reference, "Empty shorty for proto {:#x}", i),
            };
            check_shorty_match(*return_shorty, &return_type, true)
                .map_err(|reason| shorty_mismatch(i, reason))?;
            if parameter_shorties.len() != parameters.len() {
                fail!(
                    Reference,
                    "Mismatched parameter count for proto {:#x}: shorty '{}' has {}, type list has {}",
                    i,
                    String::from_utf16_lossy(&shorty),
                    parameter_shorties.len(),
                    parameters.len()
                );
            }
            for (shorty_char, type_idx) in parameter_shorties.iter().zip(&parameters) {
                let (parameter, _) =
                    self.load_type_descriptor(*type_idx as u32, "proto_id parameter")?;
                check_shorty_match(*shorty_char, &parameter, false)
                    .map_err(|reason| shorty_mismatch(i, reason))?;
            }

            let key = (proto.return_type_idx, parameters);
            if let Some(previous) = &previous {
                if *previous >= key {
                    fail!(
                        Ordering,
                        "Out-of-order proto_id {:#x}: return type {:#x} with parameters {:?}",
                        i,
                        key.0,
                        key.1
                    );
                }
            }
            previous = Some(key);
        }
        Ok(())
    }

    fn check_inter_field_ids(&self, offset: usize, count: u32) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let mut previous: Option<(u16, u32, u16)> = None;
        for i in 0..count {
            let field: FieldId = cursor.read()?;
            self.load_class_descriptor(field.class_idx as u32, "field_id class_idx")?;

            let (field_type, _) =
                self.load_type_descriptor(field.type_idx as u32, "field_id type_idx")?;
            if field_type == TypeDescriptor::Void {
                fail!(Reference, "Invalid void type for field {:#x}", i);
            }

            let name = self.load_units(field.name_idx, "field_id name_idx")?;
            if !is_valid_member_name(&name) {
                fail!(
                    Reference,
                    "Invalid field name: '{}'",
                    String::from_utf16_lossy(&name)
                );
            }

            let key = (field.class_idx, field.name_idx, field.type_idx);
            if let Some(previous) = previous {
                if previous >= key {
                    fail!(
                        Ordering,
                        "Out-of-order field_ids at {:#x}: {:?} then {:?}",
                        i,
                        previous,
                        key
                    );
                }
            }
            previous = Some(key);
        }
        Ok(())
    }

    fn check_inter_method_ids(&self, offset: usize, count: u32) -> Result<()> {
        let mut cursor = self.cursor(offset);
        let mut previous: Option<(u16, u32, u16)> = None;
        for i in 0..count {
            let method: MethodId = cursor.read()?;

            let (class, units) =
                self.load_type_descriptor(method.class_idx as u32, "method_id class_idx")?;
            if !matches!(class, TypeDescriptor::Field(FieldType::Ref(_))) {
                fail!(
                    Reference,
                    "Invalid method class descriptor '{}'",
                    String::from_utf16_lossy(&units)
                );
            }

            let name = self.load_units(method.name_idx, "method_id name_idx")?;
            if !is_valid_member_name(&name) {
                fail!(
                    Reference,
                    "Invalid method name: '{}'",
                    String::from_utf16_lossy(&name)
                );
            }
            Self::check_index(
                method.proto_idx as u32,
                self.header.proto_ids_size,
                "method_id proto_idx",
            )?;

            let key = (method.class_idx, method.name_idx, method.proto_idx);
            if let Some(previous) = previous {
                if previous >= key {
                    fail!(
                        Ordering,
                        "Out-of-order method_ids at {:#x}: {:?} then {:?}",
                        i,
                        previous,
                        key
                    );
                }
            }
            previous = Some(key);
        }
        Ok(())
    }

    fn check_inter_class_defs(&mut self, offset: usize, count: u32) -> Result<()> {
        // Position of the first definition of each class, for the "defined earlier" checks
        let mut definitions: HashMap<u32, u32> = HashMap::with_capacity(count as usize);
        let mut cursor = self.cursor(offset);
        for i in 0..count {
            let class_def: ClassDef = cursor.read()?;
            definitions.entry(class_def.class_idx).or_insert(i);
        }

        let mut cursor = self.cursor(offset);
        for i in 0..count {
            let class_def: ClassDef = cursor.read()?;
            self.check_inter_class_def(i, &class_def, &definitions)?;
        }
        Ok(())
    }

    fn check_inter_class_def(
        &mut self,
        position: u32,
        class_def: &ClassDef,
        definitions: &HashMap<u32, u32>,
    ) -> Result<()> {
        let class_idx = class_def.class_idx;
        self.load_class_descriptor(class_idx, "class_def class_idx")?;

        if class_def.access_flags & !ClassAccessFlags::JAVA_FLAGS_MASK != 0 {
            fail!(
                Encoding,
                "Bad class access_flags {:#x} for class {:#x}",
                class_def.access_flags,
                class_idx
            );
        }
        let flags = ClassAccessFlags::from_bits_truncate(class_def.access_flags);
        let is_interface = flags.contains(ClassAccessFlags::INTERFACE);
        if is_interface && !flags.contains(ClassAccessFlags::ABSTRACT) {
            fail!(Encoding, "Interface class {:#x} is not abstract", class_idx);
        }
        if flags.contains(ClassAccessFlags::ANNOTATION) && !is_interface {
            fail!(Encoding, "Annotation class {:#x} is not an interface", class_idx);
        }
        if flags.contains(ClassAccessFlags::FINAL | ClassAccessFlags::ABSTRACT) {
            fail!(Encoding, "Class {:#x} is both final and abstract", class_idx);
        }

        if !self.defined_classes.insert(class_idx) {
            fail!(Ordering, "Redefinition of class with type idx {:#x}", class_idx);
        }

        if class_def.superclass_idx != NO_INDEX {
            if class_def.superclass_idx == class_idx {
                fail!(
                    Reference,
                    "Class with same type idx as its superclass: {:#x}",
                    class_idx
                );
            }
            self.load_class_descriptor(class_def.superclass_idx, "class_def superclass_idx")?;
            let superclass_idx = class_def.superclass_idx;
            check_defined_earlier(position, superclass_idx, definitions, "superclass")?;
        }

        let interfaces = self.load_type_list(class_def.interfaces_off)?;
        let mut seen_interfaces = HashSet::with_capacity(interfaces.len());
        for interface in interfaces {
            let interface = interface as u32;
            self.load_class_descriptor(interface, "class_def interface")?;
            if !seen_interfaces.insert(interface) {
                fail!(
                    Ordering,
                    "Duplicate interface {:#x} for class {:#x}",
                    interface,
                    class_idx
                );
            }
            check_defined_earlier(position, interface, definitions, "interface")?;
        }

        if class_def.source_file_idx != NO_INDEX {
            Self::check_index(
                class_def.source_file_idx,
                self.header.string_ids_size,
                "class_def source_file_idx",
            )?;
        }

        if class_def.annotations_off != 0 {
            self.offsets
                .check(class_def.annotations_off, ItemType::AnnotationsDirectoryItem)?;
            let owner = self.find_annotations_directory_definer(class_def.annotations_off)?;
            if let Some(owner) = owner {
                if owner != class_idx {
                    fail!(
                        Reference,
                        "Invalid defining class for annotations directory at {:#x}: owned by {:#x}, used by {:#x}",
                        class_def.annotations_off,
                        owner,
                        class_idx
                    );
                }
            }
        }

        if class_def.class_data_off != 0 {
            self.offsets
                .check(class_def.class_data_off, ItemType::ClassDataItem)?;
            if let Some(owner) = self.find_class_data_definer(class_def.class_data_off)? {
                if owner != class_idx {
                    fail!(
                        Reference,
                        "Invalid class data definer at {:#x}: members belong to {:#x}, used by {:#x}",
                        class_def.class_data_off,
                        owner,
                        class_idx
                    );
                }
            }
        }

        if class_def.static_values_off != 0 {
            self.offsets
                .check(class_def.static_values_off, ItemType::EncodedArrayItem)?;
        }
        Ok(())
    }

    fn check_inter_annotation_set_ref_list(&self, offset: usize) -> Result<usize> {
        let mut cursor = self.cursor(offset);
        let count = cursor.read_u32("annotation_set_ref_list size")?;
        for _ in 0..count {
            let annotations_off = cursor.read_u32("annotation_set_ref_item")?;
            if annotations_off != 0 {
                self.offsets
                    .check(annotations_off, ItemType::AnnotationSetItem)?;
            }
        }
        Ok(cursor.pos())
    }

    fn check_inter_annotation_set(&self, offset: usize) -> Result<usize> {
        let mut cursor = self.cursor(offset);
        let count = cursor.read_u32("annotation_set_item size")?;
        let mut previous: Option<u32> = None;
        for _ in 0..count {
            let annotation_off = cursor.read_u32("annotation_off_item")?;
            self.offsets
                .check(annotation_off, ItemType::AnnotationItem)?;

            // Skip the visibility byte
            let mut annotation = self.cursor(annotation_off as usize + 1);
            let type_idx = annotation.read_uleb128("annotation type_idx")?;
            if let Some(previous) = previous {
                if previous >= type_idx {
                    fail!(
                        Ordering,
                        "Out-of-order annotation types in set at {:#x}: {:#x} then {:#x}",
                        offset,
                        previous,
                        type_idx
                    );
                }
            }
            previous = Some(type_idx);
        }
        Ok(cursor.pos())
    }

    fn check_inter_class_data(&self, offset: usize) -> Result<usize> {
        let mut reader = ClassDataReader::new(self.data, offset)?;
        let mut owner: Option<u32> = None;
        while let Some(member) = reader.next_member()? {
            let member_owner = self.member_owner(&member)?;
            match owner {
                None => owner = Some(member_owner),
                Some(owner) if owner != member_owner => fail!(
                    Reference,
                    "Mismatched defining class for class_data_item at {:#x}: {} {:#x} belongs to {:#x}, expected {:#x}",
                    offset,
                    member.group.name(),
                    member.index,
                    member_owner,
                    owner
                ),
                Some(_) => (),
            }

            if !member.group.is_field() && member.code_off != 0 {
                self.offsets.check(member.code_off, ItemType::CodeItem)?;
                let code: CodeItemHeader = self.cursor(member.code_off as usize).read()?;
                if code.debug_info_off != 0 {
                    self.offsets
                        .check(code.debug_info_off, ItemType::DebugInfoItem)?;
                }
            }
        }
        Ok(reader.pos())
    }

    fn check_inter_annotations_directory(&self, offset: usize) -> Result<usize> {
        let mut cursor = self.cursor(offset);
        let directory: AnnotationsDirectoryHeader = cursor.read()?;
        if directory.class_annotations_off != 0 {
            self.offsets
                .check(directory.class_annotations_off, ItemType::AnnotationSetItem)?;
        }

        let owner = self.find_annotations_directory_definer(offset as u32)?;
        let check_owner = |class_idx: u16, label: &str| -> Result<()> {
            if owner != Some(class_idx as u32) {
                fail!(
                    Reference,
                    "Mismatched defining class for {} in annotations directory at {:#x}: {:#x}",
                    label,
                    offset,
                    class_idx
                );
            }
            Ok(())
        };

        for _ in 0..directory.fields_size {
            let entry: MemberAnnotation = cursor.read()?;
            let field = self.field_id(entry.member_idx, "field_annotation field_idx")?;
            check_owner(field.class_idx, "field_annotation")?;
            self.offsets
                .check(entry.annotations_off, ItemType::AnnotationSetItem)?;
        }
        for _ in 0..directory.methods_size {
            let entry: MemberAnnotation = cursor.read()?;
            let method = self.method_id(entry.member_idx, "method_annotation method_idx")?;
            check_owner(method.class_idx, "method_annotation")?;
            self.offsets
                .check(entry.annotations_off, ItemType::AnnotationSetItem)?;
        }
        for _ in 0..directory.parameters_size {
            let entry: MemberAnnotation = cursor.read()?;
            let method = self.method_id(entry.member_idx, "parameter_annotation method_idx")?;
            check_owner(method.class_idx, "parameter_annotation")?;
            self.offsets
                .check(entry.annotations_off, ItemType::AnnotationSetRefList)?;
        }
        Ok(cursor.pos())
    }

    /// Parameters or interfaces listed in a type list, or nothing if the offset is 0
    fn load_type_list(&self, offset: u32) -> Result<Vec<u16>> {
        if offset == 0 {
            return Ok(vec![]);
        }
        self.offsets.check(offset, ItemType::TypeList)?;
        let mut cursor = self.cursor(offset as usize);
        let count = cursor.read_u32("type_list size")?;
        (0..count)
            .map(|_| cursor.read_u16("type_list entry"))
            .collect()
    }

    /// Type index of the class declaring a class data member
    fn member_owner(&self, member: &ClassDataMember) -> Result<u32> {
        let class_idx = if member.group.is_field() {
            self.field_id(member.index, "class_data field")?.class_idx
        } else {
            self.method_id(member.index, "class_data method")?.class_idx
        };
        Ok(class_idx as u32)
    }

    /// Class owning the first member of a class data item (if it has any members)
    fn find_class_data_definer(&self, offset: u32) -> Result<Option<u32>> {
        let mut reader = ClassDataReader::new(self.data, offset as usize)?;
        match reader.next_member()? {
            None => Ok(None),
            Some(member) => self.member_owner(&member).map(Some),
        }
    }

    /// Class owning the first member annotated in an annotations directory (if any)
    fn find_annotations_directory_definer(&self, offset: u32) -> Result<Option<u32>> {
        let mut cursor = self.cursor(offset as usize);
        let directory: AnnotationsDirectoryHeader = cursor.read()?;
        if directory.fields_size != 0 {
            let entry: MemberAnnotation = cursor.read()?;
            let field = self.field_id(entry.member_idx, "field_annotation field_idx")?;
            return Ok(Some(field.class_idx as u32));
        }
        if directory.methods_size != 0 || directory.parameters_size != 0 {
            let entry: MemberAnnotation = cursor.read()?;
            let method = self.method_id(entry.member_idx, "method_annotation method_idx")?;
            return Ok(Some(method.class_idx as u32));
        }
        Ok(None)
    }
}

fn shorty_mismatch(proto: u32, reason: String) -> Error {
    Error::new(
        ErrorKind::Reference,
        format!("{} in proto {:#x}", reason, proto),
    )
}

/// Superclasses and interfaces defined in the same file must be defined before their subclasses
fn check_defined_earlier(
    position: u32,
    type_idx: u32,
    definitions: &HashMap<u32, u32>,
    label: &str,
) -> Result<()> {
    if let Some(&definition) = definitions.get(&type_idx) {
        if definition >= position {
            fail!(
                Reference,
                "Invalid class definition ordering: class def {} has {} {:#x} defined at class def {}",
                position,
                label,
                type_idx,
                definition
            );
        }
    }
    Ok(())
}
