//! Low-level byte order and safe reading utilities for DEX parsing.
//!
//! This module provides endian-aware, bounds-checked reads of primitive types from byte
//! buffers. Every multi-byte value in a DEX image is little-endian, so only little-endian
//! reading is offered.
//!
//! # Key Components
//!
//! - [`crate::file::io::DexIO`] - Trait defining the byte-array conversion for primitive types
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//!
//! ## Supported Types
//! The [`crate::file::io::DexIO`] trait is implemented for `u8`, `i8`, `u16`, `i16`, `u32`,
//! `i32`, `u64` and `i64`.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use dexscope::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u16 = read_le_at(&data, &mut offset)?; // offset: 2 -> 4
//! let third: u32 = read_le_at(&data, &mut offset)?;  // offset: 4 -> 8
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! assert_eq!(offset, 8);
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if there are insufficient bytes in the
//! buffer, including when the offset arithmetic itself would overflow.
//!
//! # Thread Safety
//!
//! All functions are pure and operate on shared slices; they can be called concurrently.

use crate::Result;

/// Trait for implementing type-specific safe binary data reading operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait DexIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_dex_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl DexIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_dex_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
}

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the buffer is shorter than `T`.
pub fn read_le<T: DexIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read. On failure it is left untouched.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Thread Safety
///
/// Each thread should use its own offset variable.
pub fn read_le_at<T: DexIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}
