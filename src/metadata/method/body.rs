//! Lazy view of one method body (`code_item`) in a DEX image.
//!
//! A [`MethodBody`] reads only the fixed 16-byte header when it is created. The
//! instruction stream, the try blocks with their catch handlers and the debug information
//! are decoded when they are asked for, each time they are asked for.
//!
//! # Examples
//!
//! ```rust
//! use dexscope::{MethodBody, NoContext};
//!
//! // registers_size=2, ins_size=0, outs_size=0, tries_size=0, debug_info_off=0, insns_size=1
//! let mut data = vec![2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0];
//! data.extend_from_slice(&[0x0e, 0x00]); // return-void
//!
//! let body = MethodBody::new(&data, 0, &NoContext)?;
//! assert_eq!(body.register_count(), 2);
//! assert_eq!(body.instructions().collect_all()?.len(), 1);
//! assert!(body.try_blocks()?.is_empty());
//! assert_eq!(body.debug_items().count(), 0);
//! # Ok::<(), dexscope::Error>(())
//! ```

use crate::{
    config::DecoderConfig,
    file::DexBuffer,
    metadata::{
        debuginfo::{DebugInfo, DebugItems},
        method::{
            CodeHeader, InstructionStream, MethodContext, MethodParameter, NoContext, TryBlock,
            TryBlocks,
        },
    },
    Result,
};

/// The body of one method.
///
/// The handle borrows the buffer and the method context; every view it hands out borrows
/// them for the same lifetime and none of them caches decoded data. Handles are cheap to
/// copy and can be shared across threads when the context can.
#[derive(Debug)]
pub struct MethodBody<'a, C: ?Sized = NoContext> {
    buffer: DexBuffer<'a>,
    header: CodeHeader,
    instructions_end: usize,
    context: &'a C,
    config: DecoderConfig,
}

impl<C: ?Sized> Clone for MethodBody<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for MethodBody<'_, C> {}

impl<'a, C: MethodContext + ?Sized> MethodBody<'a, C> {
    /// Opens the method body at `code_offset` with the default [`DecoderConfig`].
    ///
    /// # Arguments
    /// * `buffer` - The DEX image, or any byte slice containing the code record
    /// * `code_offset` - Absolute offset of the `code_item`
    /// * `context` - The method the body belongs to
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header does not fit in the buffer, or
    /// [`crate::Error::Malformed`] for header fields out of range.
    pub fn new(
        buffer: impl Into<DexBuffer<'a>>,
        code_offset: usize,
        context: &'a C,
    ) -> Result<Self> {
        Self::with_config(buffer, code_offset, context, DecoderConfig::default())
    }

    /// Opens the method body at `code_offset` with an explicit [`DecoderConfig`].
    ///
    /// # Errors
    /// See [`MethodBody::new`].
    pub fn with_config(
        buffer: impl Into<DexBuffer<'a>>,
        code_offset: usize,
        context: &'a C,
        config: DecoderConfig,
    ) -> Result<Self> {
        let buffer = buffer.into();
        let header = CodeHeader::read(buffer, code_offset)?;
        let instructions_end = header.instructions_end_offset()?;

        log::trace!(
            "method body at {:#x}: {} registers, {} code units, {} tries, debug info at {:#x}",
            code_offset,
            header.register_count(),
            header.instructions_size(),
            header.tries_size(),
            header.debug_info_offset()
        );

        Ok(MethodBody {
            buffer,
            header,
            instructions_end,
            context,
            config,
        })
    }

    /// The decoded header fields.
    #[must_use]
    pub fn header(&self) -> &CodeHeader {
        &self.header
    }

    /// Number of registers used by the method.
    #[must_use]
    pub fn register_count(&self) -> u16 {
        self.header.register_count()
    }

    /// Absolute offset of the code record.
    #[must_use]
    pub fn code_offset(&self) -> usize {
        self.header.code_offset()
    }

    /// The buffer the body is read from.
    #[must_use]
    pub fn buffer(&self) -> DexBuffer<'a> {
        self.buffer
    }

    /// The method this body belongs to.
    #[must_use]
    pub fn context(&self) -> &'a C {
        self.context
    }

    /// The decoder limits in effect.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The instruction stream. Nothing is decoded until it is iterated.
    #[must_use]
    pub fn instructions(&self) -> InstructionStream<'a> {
        InstructionStream::new(
            self.buffer,
            self.header.instructions_start_offset(),
            self.instructions_end,
        )
    }

    /// The try blocks of the method.
    ///
    /// A method without try items gets an empty table; no byte past the instruction
    /// stream is read for it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table offsets do not fit in `usize`.
    pub fn try_blocks(&self) -> Result<TryBlocks<'a>> {
        if self.header.tries_size() == 0 {
            return Ok(TryBlocks::empty(self.buffer));
        }

        let tries_start = self.header.tries_start_offset()?;
        let handlers_start = self.header.handler_list_start_offset()?;
        log::trace!(
            "method body at {:#x}: {} try items at {:#x}, handler list at {:#x}",
            self.code_offset(),
            self.header.tries_size(),
            tries_start,
            handlers_start
        );

        Ok(TryBlocks::new(
            self.buffer,
            tries_start,
            handlers_start,
            self.header.tries_size(),
            self.header.instructions_size(),
            self.config,
        ))
    }

    /// The innermost try block covering the instruction at `address`, if any.
    ///
    /// Try items are sorted by start address and do not overlap, so the first covering
    /// entry is the only one.
    ///
    /// # Errors
    /// Propagates errors from reading the try items.
    pub fn try_block_at(&self, address: u32) -> Result<Option<TryBlock<'a>>> {
        for block in self.try_blocks()?.iter() {
            let block = block?;
            if block.covers(address) {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// The debug information handle; empty when `debug_info_off` is `0`.
    #[must_use]
    pub fn debug_info(&self) -> DebugInfo<'a, C> {
        DebugInfo::resolve_with_config(
            self.buffer,
            self.header.debug_info_offset(),
            self.context,
            self.header.register_count(),
            self.config,
        )
    }

    /// Starts a traversal of the debug items.
    #[must_use]
    pub fn debug_items(&self) -> DebugItems<'a, C> {
        self.debug_info().items()
    }

    /// The declared parameters of the method with their debug names.
    ///
    /// # Errors
    /// Returns an error if the debug information header is damaged.
    pub fn parameters_with_names(&self) -> Result<Vec<MethodParameter<'a>>> {
        self.debug_info().parameters_with_names()
    }
}
