// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # dexscope
//!
//! A lazy decoder for the method bodies of Android DEX images.
//!
//! Given the bytes of a DEX image and the offset of a method's `code_item`, `dexscope`
//! exposes the body as a set of views that decode only what is asked for: the header
//! fields, the instruction stream, the try blocks with their catch handlers, and the debug
//! information. Nothing is decoded up front and nothing is cached, so a body handle is a
//! few words on the stack and can be created for every method of an image at no cost.
//!
//! ## Features
//!
//! - **Lazy, restartable views** - iterate instructions and debug items as often as needed
//! - **Random access to try blocks** - catch handlers decode per block, on demand
//! - **Format-level Dalvik decoding** - every instruction format including payloads
//! - **Debug state machine** - line table, local variables and parameter names
//! - **Hostile input safe** - every read is bounds-checked, counts are limited by
//!   [`DecoderConfig`], and errors carry the byte offset they were found at
//! - **Zero-copy** - views borrow the image; memory-mapped files via [`DexFile`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dexscope::prelude::*;
//!
//! // registers_size=2, tries_size=0, debug_info_off=0, insns_size=1
//! let mut data = vec![2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0];
//! data.extend_from_slice(&[0x00, 0x00]); // nop
//!
//! let body = MethodBody::new(&data, 0, &NoContext)?;
//! assert_eq!(body.register_count(), 2);
//!
//! let instructions = body.instructions().collect_all()?;
//! assert_eq!(instructions.len(), 1);
//! assert!(body.try_blocks()?.is_empty());
//! assert_eq!(body.debug_items().count(), 0);
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Image loading ([`DexFile`]), the borrowed [`DexBuffer`] view and the
//!   LEB128-aware [`Parser`]
//! - [`disassembler`] - The Dalvik instruction decoder
//! - [`metadata::method`] - [`MethodBody`] and its header, instruction and try block views
//! - [`metadata::debuginfo`] - The debug information decoder
//! - [`config`] - Decoder limits
//!
//! The container layer that locates `code_item`s (the class definitions of the image) is
//! not part of this crate. It supplies what a body does not record about its method, such
//! as the access flags and parameter types, through the [`MethodContext`] trait.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). A failure inside a lazy view is
//! yielded by that view only; other views of the same body, and other bodies of the same
//! image, are unaffected:
//!
//! ```rust
//! use dexscope::{Error, MethodBody, NoContext};
//!
//! // insns_size=1, but the code unit is an unused opcode
//! let mut data = vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0];
//! data.extend_from_slice(&[0x3e, 0x00]);
//!
//! let body = MethodBody::new(&data, 0, &NoContext)?;
//! match body.instructions().collect_all() {
//!     Err(Error::MalformedInstruction { offset, message }) => {
//!         println!("bad instruction at {offset:#x}: {message}");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert!(body.try_blocks()?.is_empty());
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run method_body --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dexscope::prelude::*;
///
/// let context = NoContext;
/// assert!(context.access_flags().contains(AccessFlags::STATIC));
/// ```
pub mod prelude;

/// Decoder limits and optional validation
pub mod config;

/// Image loading, buffer views and the byte cursor
pub mod file;

/// Dalvik instruction decoding
///
/// The decoder works at the level of instruction formats: it determines the length and the
/// operands of every instruction, including the switch and array payloads embedded in the
/// instruction stream.
///
/// # Examples
///
/// ```rust
/// use dexscope::{disassembler::{decode_instruction, Operands}, Parser};
///
/// let bytecode = &[0x12, 0x31]; // const/4 v1, #3
/// let mut parser = Parser::new(bytecode);
/// let instruction = decode_instruction(&mut parser, 0)?;
///
/// assert_eq!(instruction.operands, Operands::Literal { a: 1, literal: 3 });
/// # Ok::<(), dexscope::Error>(())
/// ```
pub mod disassembler;

/// Method bodies and debug information
pub mod metadata;

/// `dexscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dexscope` Error type
///
/// The main error type for all operations in this crate. Errors found while decoding carry
/// the byte offset they refer to where one exists.
pub use error::Error;

/// Decoder limits and optional checks, see [`config::DecoderConfig`].
pub use config::DecoderConfig;

/// Image loading and byte-level access.
///
/// # Example
///
/// ```rust
/// use dexscope::{DexBuffer, Parser};
///
/// let data = [0xE5, 0x8E, 0x26];
/// let mut parser = DexBuffer::new(&data).reader(0)?;
/// assert_eq!(parser.read_uleb128()?, 624_485);
/// assert!(!parser.has_more_data());
///
/// let mut parser = Parser::new(&data);
/// parser.seek(2)?;
/// assert_eq!(parser.read_le::<u8>()?, 0x26);
/// # Ok::<(), dexscope::Error>(())
/// ```
pub use file::{parser::Parser, Backend, DexBuffer, DexFile, Memory, Physical};

/// The method body view and the method context it needs.
pub use metadata::method::{MethodBody, MethodContext, NoContext};
