use super::Verifier;
use crate::dex::binary_format::Cursor;
use crate::dex::errors::{fail, Result};

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;

/// Registers are numbered with 16 bits
const MAX_REGISTER: u32 = 65535;

/// Most parameter names a debug info item can list
const MAX_PARAMETERS: u32 = 65536;

impl<'a> Verifier<'a> {
    /// Check a debug info item: the header, then the state machine bytecode up to the end marker
    pub(super) fn check_debug_info(&self, cursor: &mut Cursor<'a>) -> Result<()> {
        cursor.read_uleb128("debug_info line_start")?;
        let parameters_size = cursor.read_uleb128("debug_info parameters_size")?;
        if parameters_size > MAX_PARAMETERS {
            fail!(Bounds, "Invalid parameters_size: {:#x}", parameters_size);
        }
        for _ in 0..parameters_size {
            self.check_optional_string(cursor, "debug_info_item parameter_name")?;
        }

        loop {
            match cursor.read_u8("debug_info opcode")? {
                DBG_END_SEQUENCE => return Ok(()),
                DBG_ADVANCE_PC => {
                    cursor.read_uleb128("DBG_ADVANCE_PC addr_diff")?;
                }
                DBG_ADVANCE_LINE => {
                    cursor.read_sleb128("DBG_ADVANCE_LINE line_diff")?;
                }
                DBG_START_LOCAL => {
                    Self::check_register(cursor, "DBG_START_LOCAL")?;
                    self.check_optional_string(cursor, "DBG_START_LOCAL name_idx")?;
                    self.check_optional_type(cursor, "DBG_START_LOCAL type_idx")?;
                }
                DBG_START_LOCAL_EXTENDED => {
                    Self::check_register(cursor, "DBG_START_LOCAL_EXTENDED")?;
                    self.check_optional_string(cursor, "DBG_START_LOCAL_EXTENDED name_idx")?;
                    self.check_optional_type(cursor, "DBG_START_LOCAL_EXTENDED type_idx")?;
                    self.check_optional_string(cursor, "DBG_START_LOCAL_EXTENDED sig_idx")?;
                }
                DBG_END_LOCAL => Self::check_register(cursor, "DBG_END_LOCAL")?,
                DBG_RESTART_LOCAL => Self::check_register(cursor, "DBG_RESTART_LOCAL")?,
                DBG_SET_PROLOGUE_END | DBG_SET_EPILOGUE_BEGIN => (),
                DBG_SET_FILE => self.check_optional_string(cursor, "DBG_SET_FILE name_idx")?,

                // Special opcodes adjust both the line and the address, and take no operands
                _ => (),
            }
        }
    }

    fn check_register(cursor: &mut Cursor<'a>, label: &str) -> Result<()> {
        let register = cursor.read_uleb128(label)?;
        if register > MAX_REGISTER {
            fail!(Bounds, "Bad register for {}: {:#x}", label, register);
        }
        Ok(())
    }

    /// Check a ULEB128p1 string index (where `NO_INDEX` is encoded as 0)
    fn check_optional_string(&self, cursor: &mut Cursor<'a>, label: &str) -> Result<()> {
        if let Some(string_idx) = cursor.read_uleb128p1(label)? {
            Self::check_index(string_idx, self.header.string_ids_size, label)?;
        }
        Ok(())
    }

    fn check_optional_type(&self, cursor: &mut Cursor<'a>, label: &str) -> Result<()> {
        if let Some(type_idx) = cursor.read_uleb128p1(label)? {
            Self::check_index(type_idx, self.header.type_ids_size, label)?;
        }
        Ok(())
    }
}
