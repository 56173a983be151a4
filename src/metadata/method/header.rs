//! The fixed header of a `code_item`.
//!
//! ```text
//! offset 0  (u16) registers_size
//! offset 2  (u16) ins_size
//! offset 4  (u16) outs_size
//! offset 6  (u16) tries_size
//! offset 8  (u32) debug_info_off
//! offset 12 (u32) insns_size       -- in 16-bit code units
//! offset 16 ..    insns
//! ```

use crate::{file::DexBuffer, Result};

const REGISTERS_SIZE_OFFSET: usize = 0;
const INS_SIZE_OFFSET: usize = 2;
const OUTS_SIZE_OFFSET: usize = 4;
const TRIES_SIZE_OFFSET: usize = 6;
const DEBUG_INFO_OFFSET: usize = 8;
const INSTRUCTIONS_SIZE_OFFSET: usize = 12;

/// Size of the fixed header in bytes; the instructions start right after it.
pub const CODE_HEADER_SIZE: usize = 16;
/// Size of one `try_item` in bytes.
pub const TRY_ITEM_SIZE: usize = 8;

/// The header fields of a code record and the offsets derived from them.
///
/// All fields are read once on construction. The derived offsets are pure functions of
/// these fields and are recomputed on every call.
///
/// # Examples
///
/// ```rust
/// use dexscope::metadata::method::CodeHeader;
/// use dexscope::DexBuffer;
///
/// let mut data = vec![0u8; 4];
/// // registers_size=3, tries_size=1, insns_size=3
/// data.extend_from_slice(&[3, 0, 1, 0, 1, 0, 1, 0, 0, 0, 0, 0, 3, 0, 0, 0]);
///
/// let header = CodeHeader::read(DexBuffer::new(&data), 4)?;
/// assert_eq!(header.register_count(), 3);
/// assert_eq!(header.instructions_start_offset(), 20);
/// assert_eq!(header.instructions_end_offset()?, 26);
/// assert_eq!(header.tries_start_offset()?, 28);
/// assert_eq!(header.handler_list_start_offset()?, 36);
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeHeader {
    code_offset: usize,
    registers_size: u16,
    ins_size: u16,
    outs_size: u16,
    tries_size: u16,
    debug_info_offset: u32,
    instructions_size: u32,
}

impl CodeHeader {
    /// Reads the header of the code record at `code_offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the 16 header bytes do not fit in the buffer,
    /// or [`crate::Error::Malformed`] if `insns_size` or `debug_info_off` exceed `i32::MAX`.
    pub fn read(buffer: DexBuffer<'_>, code_offset: usize) -> Result<Self> {
        match code_offset.checked_add(CODE_HEADER_SIZE) {
            Some(end) if end <= buffer.len() => {}
            _ => return Err(out_of_bounds_error!()),
        }

        Ok(CodeHeader {
            code_offset,
            registers_size: buffer.read_u16(code_offset + REGISTERS_SIZE_OFFSET)?,
            ins_size: buffer.read_u16(code_offset + INS_SIZE_OFFSET)?,
            outs_size: buffer.read_u16(code_offset + OUTS_SIZE_OFFSET)?,
            tries_size: buffer.read_u16(code_offset + TRIES_SIZE_OFFSET)?,
            debug_info_offset: buffer.read_small_uint(code_offset + DEBUG_INFO_OFFSET)?,
            instructions_size: buffer.read_small_uint(code_offset + INSTRUCTIONS_SIZE_OFFSET)?,
        })
    }

    /// Offset of the code record in the buffer.
    #[must_use]
    pub fn code_offset(&self) -> usize {
        self.code_offset
    }

    /// Number of registers used by the method.
    #[must_use]
    pub fn register_count(&self) -> u16 {
        self.registers_size
    }

    /// Number of words of incoming arguments.
    #[must_use]
    pub fn ins_size(&self) -> u16 {
        self.ins_size
    }

    /// Number of words of outgoing argument space required for invocations.
    #[must_use]
    pub fn outs_size(&self) -> u16 {
        self.outs_size
    }

    /// Number of try items; `0` when the method has no exception handling.
    #[must_use]
    pub fn tries_size(&self) -> u16 {
        self.tries_size
    }

    /// Absolute offset of the debug information; `0` when there is none.
    #[must_use]
    pub fn debug_info_offset(&self) -> u32 {
        self.debug_info_offset
    }

    /// Size of the instruction stream in 16-bit code units.
    #[must_use]
    pub fn instructions_size(&self) -> u32 {
        self.instructions_size
    }

    /// Byte offset of the first instruction.
    #[must_use]
    pub fn instructions_start_offset(&self) -> usize {
        self.code_offset + CODE_HEADER_SIZE
    }

    /// Byte offset just past the last instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the offset does not fit in `usize`.
    pub fn instructions_end_offset(&self) -> Result<usize> {
        (self.instructions_size as usize)
            .checked_mul(2)
            .and_then(|len| self.instructions_start_offset().checked_add(len))
            .ok_or(out_of_bounds_error!())
    }

    /// Byte offset of the first try item: the instruction end rounded up to a multiple of 4.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the offset does not fit in `usize`.
    pub fn tries_start_offset(&self) -> Result<usize> {
        self.instructions_end_offset()?
            .checked_add(3)
            .map(|end| end & !3)
            .ok_or(out_of_bounds_error!())
    }

    /// Byte offset of the `encoded_catch_handler_list` following the try items.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the offset does not fit in `usize`.
    pub fn handler_list_start_offset(&self) -> Result<usize> {
        self.tries_start_offset()?
            .checked_add(usize::from(self.tries_size) * TRY_ITEM_SIZE)
            .ok_or(out_of_bounds_error!())
    }
}
