//! Physical file backend for memory-mapped I/O.
//!
//! This module provides the [`crate::file::Physical`] backend that implements the
//! [`crate::file::Backend`] trait for images on disk. The file is mapped into the address
//! space read-only, so a multi-megabyte DEX image costs nothing until its pages are touched,
//! which is what makes lazy per-method decoding worthwhile.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use dexscope::{Backend, Physical};
//! use std::path::Path;
//!
//! let physical = Physical::new(Path::new("classes.dex"))?;
//! let magic = physical.data_slice(0, 4)?;
//! assert_eq!(magic, b"dex\n");
//! # Ok::<(), dexscope::Error>(())
//! ```

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
///
/// All access operations include bounds checking.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the image on disk. Accepts `&Path`, `&str`, `String`, or `PathBuf`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        Self::from_std_file(file)
    }

    /// Creates a new physical file backend from an opened [`std::fs::File`].
    ///
    /// # Arguments
    /// * `file` - An opened file handle
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if memory mapping fails.
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_std_file(file: fs::File) -> Result<Physical> {
        // The mapping is read-only; modifying the file while mapped is undefined behaviour
        // that the caller has to rule out.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|error| Error(error.to_string()))?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
