//! Assemble small dex files for the integration tests
//!
//! Every table and data item is described with plain indices (eg. a class def names the class
//! data it uses by its position in [`DexBuilder::class_data`]), then [`DexBuilder::build`] lays
//! everything out in one valid order, fills in the header and map, and computes the checksum.
//! Tests then corrupt the bytes through the returned [`Layout`].

#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};
use dexverify::dex::{HEADER_SIZE, NO_INDEX};
use dexverify::util::adler32;

pub struct Proto {
    pub shorty_idx: u32,
    pub return_type_idx: u32,
    pub parameters: Option<usize>,
}

pub struct ClassDefSpec {
    pub class_idx: u32,
    pub access_flags: u32,
    pub superclass_idx: u32,
    pub interfaces: Option<usize>,
    pub source_file_idx: u32,
    pub annotations: Option<usize>,
    pub class_data: Option<usize>,
    pub static_values: Option<usize>,
}

impl ClassDefSpec {
    pub fn new(class_idx: u32, superclass_idx: u32) -> ClassDefSpec {
        ClassDefSpec {
            class_idx,
            access_flags: 0x0001,
            superclass_idx,
            interfaces: None,
            source_file_idx: NO_INDEX,
            annotations: None,
            class_data: None,
            static_values: None,
        }
    }
}

pub struct CodeItemSpec {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub debug_info: Option<usize>,
    pub insns: Vec<u16>,

    /// `(start_addr, insn_count, handler_off)`
    pub tries: Vec<(u32, u16, u16)>,

    /// Encoded catch handler list, written as is after the tries
    pub handlers: Vec<u8>,
}

impl CodeItemSpec {
    /// Single `return-void`
    pub fn return_void(registers_size: u16) -> CodeItemSpec {
        CodeItemSpec {
            registers_size,
            ins_size: registers_size,
            outs_size: 0,
            debug_info: None,
            insns: vec![0x000e],
            tries: vec![],
            handlers: vec![],
        }
    }
}

/// Members of a class data item, with absolute indices (the builder delta-encodes them)
#[derive(Default)]
pub struct ClassDataSpec {
    pub static_fields: Vec<(u32, u32)>,
    pub instance_fields: Vec<(u32, u32)>,
    pub direct_methods: Vec<(u32, u32, Option<usize>)>,
    pub virtual_methods: Vec<(u32, u32, Option<usize>)>,
}

#[derive(Default)]
pub struct AnnotationsDirectorySpec {
    pub class_annotations: Option<usize>,

    /// `(field_idx, annotation set)`
    pub fields: Vec<(u32, usize)>,

    /// `(method_idx, annotation set)`
    pub methods: Vec<(u32, usize)>,

    /// `(method_idx, annotation set ref list)`
    pub parameters: Vec<(u32, usize)>,
}

#[derive(Default)]
pub struct DexBuilder {
    pub strings: Vec<String>,

    /// Descriptor string index of every type
    pub type_ids: Vec<u32>,
    pub protos: Vec<Proto>,

    /// `(class_idx, type_idx, name_idx)`
    pub fields: Vec<(u16, u16, u32)>,

    /// `(class_idx, proto_idx, name_idx)`
    pub methods: Vec<(u16, u16, u32)>,
    pub class_defs: Vec<ClassDefSpec>,

    /// Raw debug info items
    pub debug_infos: Vec<Vec<u8>>,

    /// Raw annotation items (visibility byte included)
    pub annotations: Vec<Vec<u8>>,

    /// Raw encoded array items
    pub encoded_arrays: Vec<Vec<u8>>,
    pub type_lists: Vec<Vec<u16>>,

    /// Indices into `annotations`
    pub annotation_sets: Vec<Vec<usize>>,

    /// Indices into `annotation_sets`
    pub annotation_set_ref_lists: Vec<Vec<Option<usize>>>,
    pub annotations_directories: Vec<AnnotationsDirectorySpec>,
    pub code_items: Vec<CodeItemSpec>,
    pub class_data: Vec<ClassDataSpec>,
}

/// Where things ended up in the built file
#[derive(Default, Debug)]
pub struct Layout {
    pub string_ids_off: usize,
    pub type_ids_off: usize,
    pub proto_ids_off: usize,
    pub field_ids_off: usize,
    pub method_ids_off: usize,
    pub class_defs_off: usize,
    pub data_off: usize,
    pub map_off: usize,

    /// Number of entries in the map
    pub map_size: usize,

    pub string_data: Vec<usize>,
    pub debug_infos: Vec<usize>,
    pub annotations: Vec<usize>,
    pub encoded_arrays: Vec<usize>,
    pub type_lists: Vec<usize>,
    pub annotation_sets: Vec<usize>,
    pub annotation_set_ref_lists: Vec<usize>,
    pub annotations_directories: Vec<usize>,
    pub code_items: Vec<usize>,
    pub class_data: Vec<usize>,
}

impl DexBuilder {
    pub fn new() -> DexBuilder {
        DexBuilder::default()
    }

    /// Lay out the file, returning its bytes and where each item ended up
    pub fn build(&self) -> (Vec<u8>, Layout) {
        let mut layout = Layout::default();
        let mut out = vec![0u8; HEADER_SIZE];
        let mut map: Vec<(u16, u32, usize)> = vec![(0x0000, 1, 0)];

        // Id tables are reserved now, and filled in once the data section offsets are known
        let id_tables = [
            (0x0001, self.strings.len(), 4),
            (0x0002, self.type_ids.len(), 4),
            (0x0003, self.protos.len(), 12),
            (0x0004, self.fields.len(), 8),
            (0x0005, self.methods.len(), 8),
            (0x0006, self.class_defs.len(), 32),
        ];
        let mut id_offsets = [0usize; 6];
        for (i, (item_type, count, size)) in id_tables.into_iter().enumerate() {
            if count != 0 {
                id_offsets[i] = out.len();
                map.push((item_type, count as u32, out.len()));
                out.resize(out.len() + count * size, 0);
            }
        }
        layout.string_ids_off = id_offsets[0];
        layout.type_ids_off = id_offsets[1];
        layout.proto_ids_off = id_offsets[2];
        layout.field_ids_off = id_offsets[3];
        layout.method_ids_off = id_offsets[4];
        layout.class_defs_off = id_offsets[5];
        layout.data_off = out.len();

        for string in &self.strings {
            layout.string_data.push(out.len());
            let (units, bytes) = encode_mutf8(string);
            uleb128(units, &mut out);
            out.extend_from_slice(&bytes);
            out.push(0);
        }
        push_section(&mut map, 0x2002, &layout.string_data);

        for debug_info in &self.debug_infos {
            layout.debug_infos.push(out.len());
            out.extend_from_slice(debug_info);
        }
        push_section(&mut map, 0x2003, &layout.debug_infos);

        for annotation in &self.annotations {
            layout.annotations.push(out.len());
            out.extend_from_slice(annotation);
        }
        push_section(&mut map, 0x2004, &layout.annotations);

        for encoded_array in &self.encoded_arrays {
            layout.encoded_arrays.push(out.len());
            out.extend_from_slice(encoded_array);
        }
        push_section(&mut map, 0x2005, &layout.encoded_arrays);

        for type_list in &self.type_lists {
            align(&mut out);
            layout.type_lists.push(out.len());
            u32_le(type_list.len() as u32, &mut out);
            for type_idx in type_list {
                out.extend_from_slice(&type_idx.to_le_bytes());
            }
        }
        push_section(&mut map, 0x1001, &layout.type_lists);

        for annotation_set in &self.annotation_sets {
            align(&mut out);
            layout.annotation_sets.push(out.len());
            u32_le(annotation_set.len() as u32, &mut out);
            for annotation in annotation_set {
                u32_le(layout.annotations[*annotation] as u32, &mut out);
            }
        }
        push_section(&mut map, 0x1003, &layout.annotation_sets);

        for ref_list in &self.annotation_set_ref_lists {
            align(&mut out);
            layout.annotation_set_ref_lists.push(out.len());
            u32_le(ref_list.len() as u32, &mut out);
            for set in ref_list {
                u32_le(offset_of(&layout.annotation_sets, *set), &mut out);
            }
        }
        push_section(&mut map, 0x1002, &layout.annotation_set_ref_lists);

        for directory in &self.annotations_directories {
            align(&mut out);
            layout.annotations_directories.push(out.len());
            u32_le(
                offset_of(&layout.annotation_sets, directory.class_annotations),
                &mut out,
            );
            u32_le(directory.fields.len() as u32, &mut out);
            u32_le(directory.methods.len() as u32, &mut out);
            u32_le(directory.parameters.len() as u32, &mut out);
            for (field_idx, set) in &directory.fields {
                u32_le(*field_idx, &mut out);
                u32_le(layout.annotation_sets[*set] as u32, &mut out);
            }
            for (method_idx, set) in &directory.methods {
                u32_le(*method_idx, &mut out);
                u32_le(layout.annotation_sets[*set] as u32, &mut out);
            }
            for (method_idx, ref_list) in &directory.parameters {
                u32_le(*method_idx, &mut out);
                u32_le(layout.annotation_set_ref_lists[*ref_list] as u32, &mut out);
            }
        }
        push_section(&mut map, 0x2006, &layout.annotations_directories);

        for code in &self.code_items {
            align(&mut out);
            layout.code_items.push(out.len());
            out.extend_from_slice(&code.registers_size.to_le_bytes());
            out.extend_from_slice(&code.ins_size.to_le_bytes());
            out.extend_from_slice(&code.outs_size.to_le_bytes());
            out.extend_from_slice(&(code.tries.len() as u16).to_le_bytes());
            u32_le(offset_of(&layout.debug_infos, code.debug_info), &mut out);
            u32_le(code.insns.len() as u32, &mut out);
            for insn in &code.insns {
                out.extend_from_slice(&insn.to_le_bytes());
            }
            if !code.tries.is_empty() {
                if code.insns.len() % 2 == 1 {
                    out.extend_from_slice(&[0, 0]);
                }
                for (start_addr, insn_count, handler_off) in &code.tries {
                    u32_le(*start_addr, &mut out);
                    out.extend_from_slice(&insn_count.to_le_bytes());
                    out.extend_from_slice(&handler_off.to_le_bytes());
                }
                out.extend_from_slice(&code.handlers);
            }
        }
        push_section(&mut map, 0x2001, &layout.code_items);

        for class_data in &self.class_data {
            layout.class_data.push(out.len());
            uleb128(class_data.static_fields.len() as u32, &mut out);
            uleb128(class_data.instance_fields.len() as u32, &mut out);
            uleb128(class_data.direct_methods.len() as u32, &mut out);
            uleb128(class_data.virtual_methods.len() as u32, &mut out);
            for fields in [&class_data.static_fields, &class_data.instance_fields] {
                let mut previous = 0;
                for (field_idx, access_flags) in fields {
                    uleb128(field_idx.wrapping_sub(previous), &mut out);
                    uleb128(*access_flags, &mut out);
                    previous = *field_idx;
                }
            }
            for methods in [&class_data.direct_methods, &class_data.virtual_methods] {
                let mut previous = 0;
                for (method_idx, access_flags, code) in methods {
                    uleb128(method_idx.wrapping_sub(previous), &mut out);
                    uleb128(*access_flags, &mut out);
                    uleb128(offset_of(&layout.code_items, *code), &mut out);
                    previous = *method_idx;
                }
            }
        }
        push_section(&mut map, 0x2000, &layout.class_data);

        align(&mut out);
        layout.map_off = out.len();
        map.push((0x1000, 1, out.len()));
        layout.map_size = map.len();
        u32_le(map.len() as u32, &mut out);
        for (item_type, size, offset) in &map {
            out.extend_from_slice(&item_type.to_le_bytes());
            out.extend_from_slice(&[0, 0]);
            u32_le(*size, &mut out);
            u32_le(*offset as u32, &mut out);
        }

        self.fill_id_tables(&mut out, &layout);
        self.fill_header(&mut out, &layout);
        fix_checksum(&mut out);
        (out, layout)
    }

    fn fill_id_tables(&self, out: &mut [u8], layout: &Layout) {
        for (i, string_data) in layout.string_data.iter().enumerate() {
            put_u32(out, layout.string_ids_off + i * 4, *string_data as u32);
        }
        for (i, descriptor_idx) in self.type_ids.iter().enumerate() {
            put_u32(out, layout.type_ids_off + i * 4, *descriptor_idx);
        }
        for (i, proto) in self.protos.iter().enumerate() {
            let base = layout.proto_ids_off + i * 12;
            put_u32(out, base, proto.shorty_idx);
            put_u32(out, base + 4, proto.return_type_idx);
            put_u32(out, base + 8, offset_of(&layout.type_lists, proto.parameters));
        }
        for (i, (class_idx, type_idx, name_idx)) in self.fields.iter().enumerate() {
            let base = layout.field_ids_off + i * 8;
            LittleEndian::write_u16(&mut out[base..], *class_idx);
            LittleEndian::write_u16(&mut out[base + 2..], *type_idx);
            put_u32(out, base + 4, *name_idx);
        }
        for (i, (class_idx, proto_idx, name_idx)) in self.methods.iter().enumerate() {
            let base = layout.method_ids_off + i * 8;
            LittleEndian::write_u16(&mut out[base..], *class_idx);
            LittleEndian::write_u16(&mut out[base + 2..], *proto_idx);
            put_u32(out, base + 4, *name_idx);
        }
        for (i, class_def) in self.class_defs.iter().enumerate() {
            let base = layout.class_defs_off + i * 32;
            let fields = [
                class_def.class_idx,
                class_def.access_flags,
                class_def.superclass_idx,
                offset_of(&layout.type_lists, class_def.interfaces),
                class_def.source_file_idx,
                offset_of(&layout.annotations_directories, class_def.annotations),
                offset_of(&layout.class_data, class_def.class_data),
                offset_of(&layout.encoded_arrays, class_def.static_values),
            ];
            for (j, value) in fields.into_iter().enumerate() {
                put_u32(out, base + j * 4, value);
            }
        }
    }

    fn fill_header(&self, out: &mut [u8], layout: &Layout) {
        let file_size = out.len() as u32;
        out[..8].copy_from_slice(b"dex\n035\0");
        put_u32(out, 32, file_size);
        put_u32(out, 36, HEADER_SIZE as u32);
        put_u32(out, 40, 0x1234_5678);
        put_u32(out, 52, layout.map_off as u32);

        let tables = [
            (self.strings.len(), layout.string_ids_off),
            (self.type_ids.len(), layout.type_ids_off),
            (self.protos.len(), layout.proto_ids_off),
            (self.fields.len(), layout.field_ids_off),
            (self.methods.len(), layout.method_ids_off),
            (self.class_defs.len(), layout.class_defs_off),
        ];
        for (i, (size, offset)) in tables.into_iter().enumerate() {
            put_u32(out, 56 + i * 8, size as u32);
            put_u32(out, 60 + i * 8, offset as u32);
        }
        put_u32(out, 104, file_size - layout.data_off as u32);
        put_u32(out, 108, layout.data_off as u32);
    }
}

/// Recompute the checksum after the bytes were modified
pub fn fix_checksum(bytes: &mut [u8]) {
    let checksum = adler32(&bytes[12..]);
    put_u32(bytes, 8, checksum);
}

pub fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut bytes[offset..offset + 4], value);
}

pub fn uleb128(mut value: u32, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn sleb128(mut value: i32, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encode a string in modified UTF-8, returning its length in UTF-16 code units
pub fn encode_mutf8(string: &str) -> (u32, Vec<u8>) {
    let mut units = 0;
    let mut bytes = vec![];
    for unit in string.encode_utf16() {
        units += 1;
        match unit {
            0x01..=0x7f => bytes.push(unit as u8),
            0x00 | 0x80..=0x7ff => {
                bytes.push(0xc0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                bytes.push(0xe0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    (units, bytes)
}

fn align(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn u32_le(value: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn offset_of(offsets: &[usize], index: Option<usize>) -> u32 {
    index.map_or(0, |index| offsets[index] as u32)
}

fn push_section(map: &mut Vec<(u16, u32, usize)>, item_type: u16, offsets: &[usize]) {
    if let Some(first) = offsets.first() {
        map.push((item_type, offsets.len() as u32, *first));
    }
}

/// Strings of [`sample`], in sorted order
pub const SAMPLE_STRINGS: [&str; 8] = [
    "<init>",
    "I",
    "LFoo;",
    "LI",
    "Ljava/lang/Object;",
    "V",
    "bar",
    "value",
];

pub const STR_INIT: u32 = 0;
pub const STR_VALUE: u32 = 7;

pub const TYPE_INT: u32 = 0;
pub const TYPE_FOO: u32 = 1;
pub const TYPE_OBJECT: u32 = 2;

/// A file with a single class, roughly:
///
/// ```java,ignore
/// public class Foo {
///     private int value;
///     public Foo() {}
///     public Object bar(int value) { try { ... } catch (Object e) { ... } }
/// }
/// ```
pub fn sample() -> DexBuilder {
    let mut builder = DexBuilder::new();
    builder.strings = SAMPLE_STRINGS.iter().map(|s| s.to_string()).collect();
    builder.type_ids = vec![1, 2, 4, 5];
    builder.type_lists = vec![vec![TYPE_INT as u16]];
    builder.protos = vec![
        Proto {
            shorty_idx: 3,
            return_type_idx: TYPE_OBJECT,
            parameters: Some(0),
        },
        Proto {
            shorty_idx: 5,
            return_type_idx: 3,
            parameters: None,
        },
    ];
    builder.fields = vec![(TYPE_FOO as u16, TYPE_INT as u16, STR_VALUE)];
    builder.methods = vec![(TYPE_FOO as u16, 1, STR_INIT), (TYPE_FOO as u16, 0, 6)];

    builder.debug_infos = vec![vec![
        0x01, // line_start
        0x01, // parameters_size
        0x08, // parameter name: "value"
        0x07, // DBG_SET_PROLOGUE_END
        0x0e, // special opcode
        0x00, // DBG_END_SEQUENCE
    ]];
    builder.code_items = vec![
        CodeItemSpec::return_void(1),
        CodeItemSpec {
            registers_size: 2,
            ins_size: 2,
            outs_size: 0,
            debug_info: Some(0),
            insns: vec![0x0000, 0x0000, 0x0011],
            tries: vec![(0, 2, 1)],
            handlers: vec![
                0x01, // handlers_size
                0x01, // one typed catch
                0x02, // type_idx: Object
                0x02, // addr
            ],
        },
    ];
    builder.class_data = vec![ClassDataSpec {
        static_fields: vec![],
        instance_fields: vec![(0, 0x0002)],
        direct_methods: vec![(0, 0x1_0001, Some(0))],
        virtual_methods: vec![(1, 0x0001, Some(1))],
    }];

    let mut class_def = ClassDefSpec::new(TYPE_FOO, TYPE_OBJECT);
    class_def.class_data = Some(0);
    builder.class_defs = vec![class_def];
    builder
}

/// [`sample`], with annotations on the class, its field, `bar`, and `bar`'s parameter, as well as
/// static values
pub fn sample_with_annotations() -> DexBuilder {
    let mut builder = sample();
    builder.annotations = vec![vec![
        0x01, // visibility: runtime
        0x02, // type_idx: Object
        0x01, // size
        0x07, // name_idx: "value"
        0x04, 0x2a, // int 42
    ]];
    builder.encoded_arrays = vec![vec![
        0x02, // size
        0x04, 0x07, // int 7
        0x17, 0x07, // string "value"
    ]];
    builder.annotation_sets = vec![vec![0]];
    builder.annotation_set_ref_lists = vec![vec![Some(0)]];
    builder.annotations_directories = vec![AnnotationsDirectorySpec {
        class_annotations: Some(0),
        fields: vec![(0, 0)],
        methods: vec![(1, 0)],
        parameters: vec![(1, 0)],
    }];
    builder.class_defs[0].annotations = Some(0);
    builder.class_defs[0].static_values = Some(0);
    builder
}

/// A file with only strings and type ids, where type `i` has descriptor `strings[descriptors[i]]`
pub fn types_only(strings: &[&str], descriptors: &[u32]) -> DexBuilder {
    let mut builder = DexBuilder::new();
    builder.strings = strings.iter().map(|s| s.to_string()).collect();
    builder.type_ids = descriptors.to_vec();
    builder
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
