//! Try blocks and catch handlers of a method body.
//!
//! The try items follow the instruction stream at the next 4-byte boundary. Each one refers
//! by relative offset into the `encoded_catch_handler_list` that follows the try items:
//!
//! ```text
//! try_item (8 bytes)
//!     u32 start_addr        -- code-unit address
//!     u16 insn_count        -- code units covered
//!     u16 handler_off       -- relative to the start of the handler list
//!
//! encoded_catch_handler
//!     sleb128 size          -- abs(size) typed handlers; size <= 0 adds a catch-all
//!     encoded_type_addr_pair[abs(size)]
//!         uleb128 type_idx
//!         uleb128 addr
//!     uleb128 catch_all_addr -- only when size <= 0
//! ```
//!
//! Several try items may share one handler record.

use crate::{
    config::DecoderConfig,
    file::DexBuffer,
    metadata::method::{header::TRY_ITEM_SIZE, MethodContext},
    Error, Result,
};

/// One catch handler of a try block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionHandler {
    /// Type index of the caught exception; `None` for the catch-all handler
    pub exception_type_index: Option<u32>,
    /// Code-unit address of the handler code
    pub handler_address: u32,
}

impl ExceptionHandler {
    /// Returns `true` for the catch-all handler.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.exception_type_index.is_none()
    }

    /// Resolves the descriptor of the caught exception type.
    ///
    /// Returns `None` for the catch-all handler and for indices the context cannot resolve.
    #[must_use]
    pub fn exception_type<'c, C: MethodContext + ?Sized>(&self, context: &'c C) -> Option<&'c str> {
        context.type_descriptor(self.exception_type_index?)
    }
}

/// The try blocks of a method body.
///
/// Entries are read on demand by index; nothing is read when the table is created. A method
/// without try items gets the empty table, for which no offset beyond the instruction
/// stream is ever computed.
#[derive(Debug, Clone, Copy)]
pub struct TryBlocks<'a> {
    buffer: DexBuffer<'a>,
    tries_start: usize,
    handlers_start: usize,
    count: usize,
    instructions_size: u32,
    config: DecoderConfig,
}

impl<'a> TryBlocks<'a> {
    /// Creates a table of `count` try items starting at `tries_start`, with the handler list
    /// at `handlers_start`.
    #[must_use]
    pub fn new(
        buffer: DexBuffer<'a>,
        tries_start: usize,
        handlers_start: usize,
        count: u16,
        instructions_size: u32,
        config: DecoderConfig,
    ) -> Self {
        TryBlocks {
            buffer,
            tries_start,
            handlers_start,
            count: usize::from(count),
            instructions_size,
            config,
        }
    }

    /// The table of a method without try items.
    #[must_use]
    pub fn empty(buffer: DexBuffer<'a>) -> Self {
        TryBlocks {
            buffer,
            tries_start: 0,
            handlers_start: 0,
            count: 0,
            instructions_size: 0,
            config: DecoderConfig::default(),
        }
    }

    /// Number of try blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the method has no try blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reads the try block at `index`.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`, [`Error::OutOfBounds`] if the
    /// try item does not fit in the buffer or its offset overflows, and [`Error::Malformed`]
    /// for an oversized start address, or a range past the instruction stream when
    /// [`DecoderConfig::validate_try_ranges`] is set.
    pub fn get(&self, index: usize) -> Result<TryBlock<'a>> {
        if index >= self.count {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.count,
            });
        }

        let offset = index
            .checked_mul(TRY_ITEM_SIZE)
            .and_then(|relative| self.tries_start.checked_add(relative))
            .filter(|offset| offset.checked_add(TRY_ITEM_SIZE).is_some())
            .ok_or(out_of_bounds_error!())?;
        let start_address = self.buffer.read_small_uint(offset)?;
        let code_unit_count = self.buffer.read_u16(offset + 4)?;
        let handler_offset = self.buffer.read_u16(offset + 6)?;

        if self.config.validate_try_ranges
            && u64::from(start_address) + u64::from(code_unit_count)
                > u64::from(self.instructions_size)
        {
            return Err(malformed_error!(
                "Try block {} [{:#x}, +{:#x}) exceeds the instruction stream of {:#x} code units",
                index,
                start_address,
                code_unit_count,
                self.instructions_size
            ));
        }

        Ok(TryBlock {
            buffer: self.buffer,
            start_address,
            code_unit_count,
            handler_offset,
            handlers_start: self.handlers_start,
            max_catch_handlers: self.config.max_catch_handlers,
        })
    }

    /// Iterates over all try blocks in table order.
    pub fn iter(&self) -> impl Iterator<Item = Result<TryBlock<'a>>> + '_ {
        (0..self.count).map(move |index| self.get(index))
    }
}

/// A protected range of code and a reference to its catch handlers.
///
/// The handlers are only decoded when [`TryBlock::handlers`] is called.
#[derive(Debug, Clone, Copy)]
pub struct TryBlock<'a> {
    buffer: DexBuffer<'a>,
    start_address: u32,
    code_unit_count: u16,
    handler_offset: u16,
    handlers_start: usize,
    max_catch_handlers: u32,
}

impl TryBlock<'_> {
    /// Code-unit address of the first covered instruction.
    #[must_use]
    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    /// Number of code units covered.
    #[must_use]
    pub fn code_unit_count(&self) -> u16 {
        self.code_unit_count
    }

    /// Code-unit address just past the covered range.
    #[must_use]
    pub fn end_address(&self) -> u32 {
        // start_address is at most i32::MAX
        self.start_address + u32::from(self.code_unit_count)
    }

    /// Returns `true` if `address` lies in the covered range.
    #[must_use]
    pub fn covers(&self, address: u32) -> bool {
        address >= self.start_address && address < self.end_address()
    }

    /// Offset of the handler record, relative to the start of the handler list.
    #[must_use]
    pub fn handler_offset(&self) -> u16 {
        self.handler_offset
    }

    /// Absolute byte offset of the handler record.
    #[must_use]
    pub fn handler_record_offset(&self) -> usize {
        self.handlers_start
            .saturating_add(usize::from(self.handler_offset))
    }

    /// Decodes the handler record: the typed handlers in order, then the catch-all if any.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the record runs past the buffer, or
    /// [`Error::Malformed`] for an invalid LEB128 value or a handler count above
    /// [`DecoderConfig::max_catch_handlers`].
    pub fn handlers(&self) -> Result<Vec<ExceptionHandler>> {
        let offset = self.handler_record_offset();
        let result = self.read_handlers(offset);
        if let Err(error) = &result {
            log::debug!("catch handler record at {offset:#x} failed to decode: {error}");
        }
        result
    }

    fn read_handlers(&self, offset: usize) -> Result<Vec<ExceptionHandler>> {
        let mut reader = self.buffer.reader(offset)?;

        let size = reader.read_sleb128()?;
        let typed = size.unsigned_abs();
        if typed > self.max_catch_handlers {
            return Err(malformed_error!(
                "Catch handler record at {:#x} declares {} handlers",
                offset,
                typed
            ));
        }

        let mut handlers = Vec::with_capacity((typed as usize).min(16) + 1);
        for _ in 0..typed {
            let type_index = reader.read_small_uleb128()?;
            let address = reader.read_small_uleb128()?;
            handlers.push(ExceptionHandler {
                exception_type_index: Some(type_index),
                handler_address: address,
            });
        }

        if size <= 0 {
            handlers.push(ExceptionHandler {
                exception_type_index: None,
                handler_address: reader.read_small_uleb128()?,
            });
        }

        Ok(handlers)
    }

    /// Address of the catch-all handler, if the record has one.
    ///
    /// # Errors
    /// See [`TryBlock::handlers`].
    pub fn catch_all_address(&self) -> Result<Option<u32>> {
        Ok(self
            .handlers()?
            .last()
            .filter(|handler| handler.is_catch_all())
            .map(|handler| handler.handler_address))
    }
}
