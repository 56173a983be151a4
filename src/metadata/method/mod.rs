//! Method bodies of a DEX image.
//!
//! A method body (`code_item`) consists of a fixed header, the instruction stream, an
//! optional table of try blocks with their catch handlers, and a reference to the debug
//! information. This module exposes each part as a lazy view over the image buffer:
//!
//! - [`CodeHeader`] - the header fields and the offsets derived from them
//! - [`InstructionStream`] - restartable iteration over the decoded instructions
//! - [`TryBlocks`] - random access to the try blocks; handlers decode on demand
//! - [`crate::metadata::debuginfo::DebugInfo`] - the debug state machine
//!
//! [`MethodBody`] ties them together for one method.
//!
//! # Examples
//!
//! ```rust
//! use dexscope::metadata::method::MethodBody;
//! use dexscope::NoContext;
//!
//! // registers_size=1, tries_size=1, insns_size=2: nop; return-void
//! let mut data = vec![1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 2, 0, 0, 0];
//! data.extend_from_slice(&[0x00, 0x00, 0x0e, 0x00]);
//! // try item [0, +1) -> handler at relative offset 1
//! data.extend_from_slice(&[0, 0, 0, 0, 1, 0, 1, 0]);
//! // handler list: 1 record, catch-all only at address 1
//! data.extend_from_slice(&[0x01, 0x00, 0x01]);
//!
//! let body = MethodBody::new(&data, 0, &NoContext)?;
//! let block = body.try_blocks()?.get(0)?;
//! assert!(block.covers(0));
//! assert_eq!(block.catch_all_address()?, Some(1));
//! # Ok::<(), dexscope::Error>(())
//! ```

mod body;
mod exceptions;
mod header;
mod instructions;
mod types;

pub use body::MethodBody;
pub use exceptions::{ExceptionHandler, TryBlock, TryBlocks};
pub use header::{CodeHeader, CODE_HEADER_SIZE, TRY_ITEM_SIZE};
pub use instructions::{InstructionStream, Instructions};
pub(crate) use types::is_wide;
pub use types::{AccessFlags, MethodContext, MethodParameter, NoContext};
