use super::errors::{fail, Result};
use super::map::ItemType;
use std::collections::HashMap;

/// Classification of data section offsets by the kind of item that starts there
///
/// Filled in by the structural pass, then consulted by the reference pass whenever one item
/// points at another. Offset 0 is the header and never a legal item reference, so it is never
/// recorded.
#[derive(Default, Debug)]
pub struct OffsetMap {
    items: HashMap<u32, ItemType>,
}

impl OffsetMap {
    pub fn new() -> OffsetMap {
        OffsetMap::default()
    }

    pub fn with_capacity(capacity: usize) -> OffsetMap {
        OffsetMap {
            items: HashMap::with_capacity(capacity),
        }
    }

    /// Record that an item of some kind starts at an offset
    ///
    /// Each offset holds at most one item, so recording the same offset twice fails.
    pub fn record(&mut self, offset: u32, item_type: ItemType) -> Result<()> {
        if offset == 0 {
            fail!(
                Bounds,
                "Offset 0 cannot hold a {}; it is the header",
                item_type
            );
        }
        if let Some(existing) = self.items.insert(offset, item_type) {
            self.items.insert(offset, existing);
            fail!(
                Ordering,
                "Offset {:#x} already holds a {} and cannot also hold a {}",
                offset,
                existing,
                item_type
            );
        }
        Ok(())
    }

    pub fn lookup(&self, offset: u32) -> Option<ItemType> {
        self.items.get(&offset).copied()
    }

    /// Check that an item of the expected kind starts at an offset
    pub fn check(&self, offset: u32, expected: ItemType) -> Result<()> {
        match self.lookup(offset) {
            None => fail!(
                Reference,
                "No data map entry found @ {:#x}; expected {}",
                offset,
                expected
            ),
            Some(found) if found != expected => fail!(
                Reference,
                "Unexpected data map entry @ {:#x}; expected {}, found {}",
                offset,
                expected,
                found
            ),
            Some(_) => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
