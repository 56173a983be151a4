//! DEX image access and byte-level reading.
//!
//! This module provides the byte-access layer every other part of the crate is built on. It
//! abstracts over where the image lives (a memory-mapped file or an owned buffer) and exposes
//! a cheap, copyable view with absolute-offset reads.
//!
//! # Architecture
//!
//! - **Backend system** - Pluggable data sources (disk files, memory buffers)
//! - **Image handle** - [`crate::file::DexFile`] owns a backend and hands out buffer views
//! - **Buffer view** - [`crate::file::DexBuffer`] is a `Copy` borrow of the raw bytes with
//!   fixed-width reads at arbitrary offsets
//! - **Cursor** - [`crate::file::parser::Parser`] reads sequentially, including LEB128 values
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::DexFile`] - An image loaded from disk or memory
//! - [`crate::file::DexBuffer`] - Borrowed view used by all decoders
//! - [`crate::file::Backend`] - Trait for different data sources
//!
//! ## Backend Implementations
//! - [`crate::file::Physical`] - Memory-mapped file backend for disk access
//! - [`crate::file::Memory`] - In-memory buffer backend
//!
//! # Examples
//!
//! ```rust,no_run
//! use dexscope::{DexFile, MethodBody, NoContext};
//! use std::path::Path;
//!
//! let file = DexFile::from_file(Path::new("classes.dex"))?;
//!
//! // The code offset comes from the class_data_item of the method
//! let body = MethodBody::new(file.buffer(), 0x1f0, &NoContext)?;
//! println!("{} registers", body.register_count());
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`crate::file::DexFile`] is [`std::marker::Send`] and [`std::marker::Sync`]; the
//! [`crate::file::DexBuffer`] views it hands out can be shared freely across threads.

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use std::path::Path;

use crate::{file::parser::Parser, Error::Empty, Result};

/// Backend trait for file data sources.
///
/// This trait abstracts over different data sources (files, memory buffers) to provide a
/// unified interface for reading image data. Implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A DEX image, loaded from disk or from memory.
///
/// `DexFile` owns its backing storage and performs no format validation beyond rejecting
/// empty input; locating method code records is the job of the container layer. Decoders
/// borrow the bytes through [`DexFile::buffer`].
///
/// # Examples
///
/// ```rust
/// use dexscope::DexFile;
///
/// let file = DexFile::from_mem(vec![0x64, 0x65, 0x78, 0x0a])?;
/// assert_eq!(file.len(), 4);
/// assert_eq!(file.buffer().read_u16(0)?, 0x6564);
/// # Ok::<(), dexscope::Error>(())
/// ```
pub struct DexFile {
    data: Box<dyn Backend>,
}

impl DexFile {
    /// Loads an image from disk using memory-mapped I/O.
    ///
    /// # Arguments
    ///
    /// * `file` - Path to the image on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or if it is empty.
    pub fn from_file(file: &Path) -> Result<DexFile> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads an image from a memory buffer.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes of the image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the buffer is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<DexFile> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<DexFile> {
        if data.len() == 0 {
            return Err(Empty);
        }

        log::trace!("loaded image of {} bytes", data.len());
        Ok(DexFile {
            data: Box::new(data),
        })
    }

    /// Returns the total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a slice of the image data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Returns a borrowed view of the image for the decoders.
    #[must_use]
    pub fn buffer(&self) -> DexBuffer<'_> {
        DexBuffer::new(self.data.data())
    }
}

/// A read-only, copyable view over the bytes of a DEX image.
///
/// All offsets are absolute offsets into the image. Reads are bounds-checked and never
/// panic. Since the view is just a borrowed slice it is [`Copy`], so every decoder can keep
/// its own handle without coordinating with others.
///
/// # Examples
///
/// ```rust
/// use dexscope::DexBuffer;
///
/// let bytes = [0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x80];
/// let buffer = DexBuffer::new(&bytes);
///
/// assert_eq!(buffer.read_u16(0)?, 2);
/// assert_eq!(buffer.read_u32(2)?, 1);
/// assert!(buffer.read_small_uint(4).is_err());
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DexBuffer<'a> {
    data: &'a [u8],
}

impl<'a> DexBuffer<'a> {
    /// Creates a view over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        DexBuffer { data }
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the length of the underlying data in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the view has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads a little-endian `u16` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read leaves the buffer.
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let mut offset = offset;
        io::read_le_at::<u16>(self.data, &mut offset)
    }

    /// Reads a little-endian `u32` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read leaves the buffer.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut offset = offset;
        io::read_le_at::<u32>(self.data, &mut offset)
    }

    /// Reads a little-endian `u32` at `offset` that must fit a non-negative `i32`.
    ///
    /// Sizes and offsets in the format are bounded this way; anything larger can only come
    /// from a corrupt image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read leaves the buffer, or
    /// [`crate::Error::Malformed`] if the value exceeds `i32::MAX`.
    pub fn read_small_uint(&self, offset: usize) -> Result<u32> {
        let value = self.read_u32(offset)?;
        if value > i32::MAX as u32 {
            return Err(malformed_error!(
                "Encountered small uint that is out of range at offset {:#x}",
                offset
            ));
        }

        Ok(value)
    }

    /// Returns a [`Parser`] positioned at the absolute `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `offset` is beyond the end of the buffer.
    pub fn reader(&self, offset: usize) -> Result<Parser<'a>> {
        Parser::at(self.data, offset)
    }
}

impl<'a> From<&'a [u8]> for DexBuffer<'a> {
    fn from(data: &'a [u8]) -> Self {
        DexBuffer::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for DexBuffer<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        DexBuffer::new(data.as_slice())
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for DexBuffer<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        DexBuffer::new(data.as_slice())
    }
}
