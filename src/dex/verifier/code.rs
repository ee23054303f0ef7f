use super::Verifier;
use crate::dex::binary_format::Cursor;
use crate::dex::errors::{fail, Result};
use crate::dex::items::{CodeItemHeader, TryItem};
use crate::dex::Deserialize;

/// Exclusive upper bound on the number of handlers of a code item
const MAX_HANDLERS: u32 = 65536;

/// Largest number of typed catch clauses in one handler
const MAX_HANDLER_SIZE: i32 = 65536;

impl<'a> Verifier<'a> {
    /// Check a code item: its header, then the instructions, tries, and handlers
    ///
    /// Instructions themselves are not decoded, only bounds-checked.
    pub(super) fn check_code_item(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        let code: CodeItemHeader = cursor.read()?;

        if code.ins_size > code.registers_size {
            fail!(
                Bounds,
                "ins_size ({}) > registers_size ({})",
                code.ins_size,
                code.registers_size
            );
        }
        if code.outs_size > 5 && code.outs_size > code.registers_size {
            fail!(
                Bounds,
                "outs_size ({}) > registers_size ({})",
                code.outs_size,
                code.registers_size
            );
        }

        cursor.check_list_size(cursor.pos(), code.insns_size as usize, 2, "insns")?;
        cursor.skip(code.insns_size as usize * 2, "insns")?;

        if code.tries_size == 0 {
            return Ok(());
        }

        // Try items are 4-byte aligned
        if code.insns_size & 1 != 0 {
            let padding = cursor.read_u16("insns padding")?;
            if padding != 0 {
                fail!(Alignment, "Non-zero padding after insns: {:#x}", padding);
            }
        }

        let tries_start = cursor.pos();
        cursor.check_list_size(tries_start, code.tries_size as usize, TryItem::SIZE, "try_items")?;
        cursor.skip(code.tries_size as usize * TryItem::SIZE, "try_items")?;

        let handler_offsets = self.check_handlers(cursor, code.insns_size)?;

        let mut tries = self.cursor(tries_start);
        let mut last_end: u64 = 0;
        for _ in 0..code.tries_size {
            let try_item: TryItem = tries.read()?;
            let start = try_item.start_addr as u64;
            let end = start + try_item.insn_count as u64;

            if start < last_end {
                fail!(
                    Ordering,
                    "Out-of-order try: starts at {:#x}, previous try ends at {:#x}",
                    start,
                    last_end
                );
            }
            if start >= code.insns_size as u64 {
                fail!(
                    Bounds,
                    "Invalid start_addr: {:#x} with insns_size {:#x}",
                    start,
                    code.insns_size
                );
            }
            if end > code.insns_size as u64 {
                fail!(
                    Bounds,
                    "Invalid insn_count: try from {:#x} to {:#x} with insns_size {:#x}",
                    start,
                    end,
                    code.insns_size
                );
            }
            if handler_offsets.binary_search(&(try_item.handler_off as u32)).is_err() {
                fail!(
                    Reference,
                    "Bogus handler offset: {:#x}",
                    try_item.handler_off
                );
            }
            last_end = end;
        }
        Ok(())
    }

    /// Check the encoded catch handler list, returning the offset of every handler (relative to
    /// the start of the list, in increasing order)
    fn check_handlers(&self, cursor: &mut Cursor<'a>, insns_size: u32) -> Result<Vec<u32>> {
        let list_start = cursor.pos();
        let handlers_size = cursor.read_uleb128("handlers_size")?;
        if handlers_size == 0 || handlers_size >= MAX_HANDLERS {
            fail!(Bounds, "Invalid handlers_size: {}", handlers_size);
        }

        let mut handler_offsets = Vec::with_capacity(handlers_size as usize);
        for _ in 0..handlers_size {
            handler_offsets.push((cursor.pos() - list_start) as u32);

            let size = cursor.read_sleb128("handler size")?;
            if !(-MAX_HANDLER_SIZE..=MAX_HANDLER_SIZE).contains(&size) {
                fail!(Bounds, "Invalid exception handler size: {}", size);
            }
            let has_catch_all = size <= 0;

            for _ in 0..size.unsigned_abs() {
                let type_idx = cursor.read_uleb128("handler type_idx")?;
                Self::check_index(type_idx, self.header.type_ids_size, "handler type_idx")?;
                Self::check_handler_address(cursor, insns_size)?;
            }
            if has_catch_all {
                Self::check_handler_address(cursor, insns_size)?;
            }
        }
        Ok(handler_offsets)
    }

    fn check_handler_address(cursor: &mut Cursor<'a>, insns_size: u32) -> Result<()> {
        let addr = cursor.read_uleb128("handler addr")?;
        if addr >= insns_size {
            fail!(
                Bounds,
                "Invalid handler addr: {:#x} with insns_size {:#x}",
                addr,
                insns_size
            );
        }
        Ok(())
    }
}
