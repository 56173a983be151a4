//! # dexscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dexscope library.
//!
//! ```rust
//! use dexscope::prelude::*;
//!
//! let data = [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0x0e, 0x00];
//! let body = MethodBody::new(&data, 0, &NoContext)?;
//! for instruction in &body.instructions() {
//!     let instruction: Instruction = instruction?;
//!     assert_eq!(instruction.format, Format::F10x);
//! }
//! # Ok::<(), dexscope::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dexscope operations
pub use crate::Error;

/// The result type used throughout dexscope
pub use crate::Result;

/// Limits and optional checks for lazy decoding
pub use crate::DecoderConfig;

// ================================================================================================
// Buffers
// ================================================================================================

/// Image loading and byte-level access
pub use crate::{DexBuffer, DexFile, Parser};

// ================================================================================================
// Method Bodies
// ================================================================================================

/// The method body and its views
pub use crate::metadata::method::{
    CodeHeader, ExceptionHandler, InstructionStream, MethodBody, TryBlock, TryBlocks,
};

/// The method a body belongs to
pub use crate::metadata::method::{AccessFlags, MethodContext, MethodParameter, NoContext};

/// Debug information
pub use crate::metadata::debuginfo::{DebugInfo, DebugItem, LocalInfo};

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction decoding
pub use crate::disassembler::{Format, Instruction, InstructionDecoder, Operands, Payload};
