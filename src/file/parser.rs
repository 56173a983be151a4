//! Low-level byte stream parser for DEX structure decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data parser
//! for reading DEX structures: fixed-width little-endian fields, and the LEB128 variable-length
//! integers used by handler lists and debug information.
//!
//! # Architecture
//!
//! The parser maintains a position within a byte slice. Positions are always *absolute*
//! offsets into that slice, so a parser created over a whole DEX image with
//! [`crate::file::parser::Parser::at`] reports the same offsets that the format stores.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Align to byte boundaries
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::peek_le`] - Peek at primitive types without advancing
//!
//! ## LEB128 Methods
//! - [`crate::file::parser::Parser::read_uleb128`] - Unsigned LEB128, full `u32` range
//! - [`crate::file::parser::Parser::read_small_uleb128`] - Unsigned LEB128 limited to `i32::MAX`
//! - [`crate::file::parser::Parser::read_sleb128`] - Signed LEB128
//! - [`crate::file::parser::Parser::read_uleb128p1`] - `uleb128p1` index, `None` for `NO_INDEX`
//!
//! # Usage Examples
//!
//! ```rust
//! use dexscope::Parser;
//!
//! let data = [0x01, 0x02, 0xE5, 0x8E, 0x26, 0x7F];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u16>()?, 0x0201);
//! assert_eq!(parser.read_uleb128()?, 624_485);
//! assert_eq!(parser.read_sleb128()?, -1);
//! # Ok::<(), dexscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, DexIO},
    Result,
};

/// A generic binary data parser for reading DEX structures.
///
/// `Parser` provides a cursor-based interface for reading little-endian binary data. The
/// parser maintains an internal position cursor and bounds-checks every read, so malformed
/// or truncated data is reported as an error instead of a panic.
///
/// # Examples
///
/// ```rust
/// use dexscope::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::at(&data, 4)?;
///
/// let value = parser.read_le::<u32>()?;
/// assert_eq!(value, 0x08070605);
/// assert_eq!(parser.pos(), 8);
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] positioned at the start of a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Create a new [`crate::file::parser::Parser`] positioned at `pos`.
    ///
    /// Unlike [`Parser::seek`], `pos` may equal the data length; such a parser is simply
    /// exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the data length.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(Parser {
            data,
            position: pos,
        })
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at a value of type `T` in little-endian format without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn peek_le<T: DexIO>(&self) -> Result<T> {
        let mut temp_position = self.position;
        read_le_at::<T>(self.data, &mut temp_position)
    }

    /// Align the position to a specific boundary.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: DexIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read an unsigned LEB128 value covering the full `u32` range.
    ///
    /// At most five bytes are consumed. The fifth byte may only contribute the four remaining
    /// bits of a `u32` and must not carry a continuation flag.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data, or
    /// [`crate::Error::Malformed`] if it is longer than five bytes or overflows `u32`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::Parser;
    ///
    /// let mut parser = Parser::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    /// assert_eq!(parser.read_uleb128()?, u32::MAX);
    /// # Ok::<(), dexscope::Error>(())
    /// ```
    pub fn read_uleb128(&mut self) -> Result<u32> {
        let start = self.position;
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let byte = self.read_le::<u8>()?;

            if shift == 28 {
                if byte & 0x80 != 0 {
                    return Err(malformed_error!("Invalid uleb128 at offset {:#x}", start));
                }
                if byte > 0x0F {
                    return Err(malformed_error!(
                        "Encountered uleb128 that is out of range at offset {:#x}",
                        start
                    ));
                }
            }

            value |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read an unsigned LEB128 value that must fit a non-negative `i32`.
    ///
    /// This is the encoding used for sizes, counts and addresses; values above `i32::MAX`
    /// indicate a corrupt image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data, or
    /// [`crate::Error::Malformed`] if the value is out of range.
    pub fn read_small_uleb128(&mut self) -> Result<u32> {
        let start = self.position;
        let value = self.read_uleb128()?;
        if value > i32::MAX as u32 {
            return Err(malformed_error!(
                "Encountered uleb128 that is out of range at offset {:#x}",
                start
            ));
        }

        Ok(value)
    }

    /// Read a signed LEB128 value.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data, or
    /// [`crate::Error::Malformed`] if it is longer than five bytes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::Parser;
    ///
    /// let mut parser = Parser::new(&[0x80, 0x7F, 0x3F]);
    /// assert_eq!(parser.read_sleb128()?, -128);
    /// assert_eq!(parser.read_sleb128()?, 63);
    /// # Ok::<(), dexscope::Error>(())
    /// ```
    pub fn read_sleb128(&mut self) -> Result<i32> {
        let start = self.position;
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            let byte = self.read_le::<u8>()?;

            if shift == 28 && byte & 0x80 != 0 {
                return Err(malformed_error!("Invalid sleb128 at offset {:#x}", start));
            }

            value |= u32::from(byte & 0x7F) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                if shift < 32 && byte & 0x40 != 0 {
                    value |= u32::MAX << shift;
                }
                #[allow(clippy::cast_possible_wrap)]
                return Ok(value as i32);
            }
        }
    }

    /// Read a `uleb128p1` encoded index.
    ///
    /// The stored value is the index plus one, so an encoded `0` stands for `NO_INDEX` and is
    /// returned as `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data, or
    /// [`crate::Error::Malformed`] for an invalid encoding.
    pub fn read_uleb128p1(&mut self) -> Result<Option<u32>> {
        Ok(self.read_uleb128()?.checked_sub(1))
    }
}
