//! Decoding of class data items
//!
//! A class data item is four ULEB128 group sizes followed by the members of each group. Member
//! indices are delta encoded within a group, so the reader accumulates them and reports absolute
//! field or method indices. Both verification passes walk class data through [`ClassDataReader`].

use super::binary_format::Cursor;
use super::errors::{fail, Result};

/// Groups of members, in the order they appear in the item
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MemberGroup {
    StaticFields,
    InstanceFields,
    DirectMethods,
    VirtualMethods,
}

impl MemberGroup {
    const ALL: [MemberGroup; 4] = [
        MemberGroup::StaticFields,
        MemberGroup::InstanceFields,
        MemberGroup::DirectMethods,
        MemberGroup::VirtualMethods,
    ];

    pub fn is_field(self) -> bool {
        matches!(self, MemberGroup::StaticFields | MemberGroup::InstanceFields)
    }

    pub fn name(self) -> &'static str {
        match self {
            MemberGroup::StaticFields => "static field",
            MemberGroup::InstanceFields => "instance field",
            MemberGroup::DirectMethods => "direct method",
            MemberGroup::VirtualMethods => "virtual method",
        }
    }
}

/// One `encoded_field` or `encoded_method`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClassDataMember {
    pub group: MemberGroup,

    /// Absolute index into the field or method id table
    pub index: u32,

    /// Difference from the previous index in the group (or the index itself, for the first)
    pub index_delta: u32,

    /// Whether this is the first member of its group
    pub first_in_group: bool,

    pub access_flags: u32,

    /// Offset of the code item (always 0 for fields)
    pub code_off: u32,
}

pub struct ClassDataReader<'a> {
    cursor: Cursor<'a>,
    sizes: [u32; 4],
    group: usize,
    remaining: u32,
    previous_index: Option<u32>,
}

impl<'a> ClassDataReader<'a> {
    /// Start reading the class data item at `offset`, decoding its group sizes
    pub fn new(data: &'a [u8], offset: usize) -> Result<ClassDataReader<'a>> {
        let mut cursor = Cursor::new(data, offset);
        let sizes = [
            cursor.read_uleb128("static_fields_size")?,
            cursor.read_uleb128("instance_fields_size")?,
            cursor.read_uleb128("direct_methods_size")?,
            cursor.read_uleb128("virtual_methods_size")?,
        ];
        Ok(ClassDataReader {
            cursor,
            sizes,
            group: 0,
            remaining: sizes[0],
            previous_index: None,
        })
    }

    /// Offset of the next unread byte (the end of the item, once all members are read)
    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    /// Decode the next member, or `None` once every group is exhausted
    pub fn next_member(&mut self) -> Result<Option<ClassDataMember>> {
        while self.remaining == 0 {
            self.group += 1;
            if self.group >= MemberGroup::ALL.len() {
                return Ok(None);
            }
            self.remaining = self.sizes[self.group];
            self.previous_index = None;
        }
        let group = MemberGroup::ALL[self.group];

        let index_delta = self.cursor.read_uleb128("member index_diff")?;
        let access_flags = self.cursor.read_uleb128("member access_flags")?;
        let code_off = if group.is_field() {
            0
        } else {
            self.cursor.read_uleb128("method code_off")?
        };

        let index = match self.previous_index {
            None => index_delta,
            Some(previous) => match previous.checked_add(index_delta) {
                Some(index) => index,
                None => fail!(
                    Encoding,
                    "Overflow in {} index: {} plus {}",
                    group.name(),
                    previous,
                    index_delta
                ),
            },
        };
        let first_in_group = self.previous_index.is_none();

        self.previous_index = Some(index);
        self.remaining -= 1;

        Ok(Some(ClassDataMember {
            group,
            index,
            index_delta,
            first_in_group,
            access_flags,
            code_off,
        }))
    }
}
