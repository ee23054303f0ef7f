//! Encoded values, arrays, and annotations
//!
//! These form a recursive grammar: arrays hold values and annotations hold named values, while a
//! value can itself be an array or an annotation. Recursion is capped at
//! [`MAX_ENCODED_VALUE_DEPTH`] levels so that adversarial nesting cannot exhaust the stack.

use super::Verifier;
use crate::dex::binary_format::Cursor;
use crate::dex::errors::{fail, Result};

/// Deepest nesting of arrays and annotations inside of encoded values
pub const MAX_ENCODED_VALUE_DEPTH: usize = 256;

const VALUE_BYTE: u8 = 0x00;
const VALUE_SHORT: u8 = 0x02;
const VALUE_CHAR: u8 = 0x03;
const VALUE_INT: u8 = 0x04;
const VALUE_LONG: u8 = 0x06;
const VALUE_FLOAT: u8 = 0x10;
const VALUE_DOUBLE: u8 = 0x11;
const VALUE_STRING: u8 = 0x17;
const VALUE_TYPE: u8 = 0x18;
const VALUE_FIELD: u8 = 0x19;
const VALUE_METHOD: u8 = 0x1a;
const VALUE_ENUM: u8 = 0x1b;
const VALUE_ARRAY: u8 = 0x1c;
const VALUE_ANNOTATION: u8 = 0x1d;
const VALUE_NULL: u8 = 0x1e;
const VALUE_BOOLEAN: u8 = 0x1f;

impl<'a> Verifier<'a> {
    pub(super) fn check_encoded_array(&self, cursor: &mut Cursor<'a>, depth: usize) -> Result<()> {
        Self::check_depth(depth)?;
        let size = cursor.read_uleb128("encoded_array size")?;
        for _ in 0..size {
            self.check_encoded_value(cursor, depth)?;
        }
        Ok(())
    }

    pub(super) fn check_encoded_annotation(
        &self,
        cursor: &mut Cursor<'a>,
        depth: usize,
    ) -> Result<()> {
        Self::check_depth(depth)?;
        let type_idx = cursor.read_uleb128("encoded_annotation type_idx")?;
        Self::check_index(type_idx, self.header.type_ids_size, "encoded_annotation type_idx")?;

        let size = cursor.read_uleb128("encoded_annotation size")?;
        let mut previous: Option<u32> = None;
        for _ in 0..size {
            let name_idx = cursor.read_uleb128("annotation_element name_idx")?;
            Self::check_index(
                name_idx,
                self.header.string_ids_size,
                "annotation_element name_idx",
            )?;
            if let Some(previous) = previous {
                if previous >= name_idx {
                    fail!(
                        Ordering,
                        "Out-of-order annotation_element name_idx: {:#x} then {:#x}",
                        previous,
                        name_idx
                    );
                }
            }
            previous = Some(name_idx);
            self.check_encoded_value(cursor, depth)?;
        }
        Ok(())
    }

    fn check_encoded_value(&self, cursor: &mut Cursor<'a>, depth: usize) -> Result<()> {
        let header_byte = cursor.read_u8("encoded_value header")?;
        let value_type = header_byte & 0x1f;
        let value_arg = header_byte >> 5;
        let size = value_arg as usize + 1;

        match value_type {
            VALUE_BYTE => {
                Self::check_value_arg(value_arg, 0, "byte")?;
                cursor.skip(size, "encoded byte")?;
            }
            VALUE_SHORT | VALUE_CHAR => {
                Self::check_value_arg(value_arg, 1, "short or char")?;
                cursor.skip(size, "encoded short or char")?;
            }
            VALUE_INT | VALUE_FLOAT => {
                Self::check_value_arg(value_arg, 3, "int or float")?;
                cursor.skip(size, "encoded int or float")?;
            }
            VALUE_LONG | VALUE_DOUBLE => cursor.skip(size, "encoded long or double")?,
            VALUE_STRING => {
                Self::check_value_arg(value_arg, 3, "string")?;
                let idx = cursor.read_sized_u32(size, "encoded string")?;
                Self::check_index(idx, self.header.string_ids_size, "encoded_value string")?;
            }
            VALUE_TYPE => {
                Self::check_value_arg(value_arg, 3, "type")?;
                let idx = cursor.read_sized_u32(size, "encoded type")?;
                Self::check_index(idx, self.header.type_ids_size, "encoded_value type")?;
            }
            VALUE_FIELD | VALUE_ENUM => {
                Self::check_value_arg(value_arg, 3, "field or enum")?;
                let idx = cursor.read_sized_u32(size, "encoded field")?;
                Self::check_index(idx, self.header.field_ids_size, "encoded_value field")?;
            }
            VALUE_METHOD => {
                Self::check_value_arg(value_arg, 3, "method")?;
                let idx = cursor.read_sized_u32(size, "encoded method")?;
                Self::check_index(idx, self.header.method_ids_size, "encoded_value method")?;
            }
            VALUE_ARRAY => {
                Self::check_value_arg(value_arg, 0, "array")?;
                self.check_encoded_array(cursor, depth + 1)?;
            }
            VALUE_ANNOTATION => {
                Self::check_value_arg(value_arg, 0, "annotation")?;
                self.check_encoded_annotation(cursor, depth + 1)?;
            }
            VALUE_NULL => Self::check_value_arg(value_arg, 0, "null")?,
            VALUE_BOOLEAN => Self::check_value_arg(value_arg, 1, "boolean")?,
            other => fail!(Encoding, "Bogus encoded_value value_type {:#x}", other),
        }
        Ok(())
    }

    fn check_value_arg(value_arg: u8, max: u8, label: &str) -> Result<()> {
        if value_arg > max {
            fail!(Encoding, "Bad encoded_value {} size {}", label, value_arg);
        }
        Ok(())
    }

    fn check_depth(depth: usize) -> Result<()> {
        if depth > MAX_ENCODED_VALUE_DEPTH {
            fail!(
                Encoding,
                "Encoded values nested more than {} levels deep",
                MAX_ENCODED_VALUE_DEPTH
            );
        }
        Ok(())
    }
}
