//! Dalvik instruction decoding at the format level.
//!
//! This module turns the packed 16-bit code units of a method body into [`Instruction`]s.
//! Decoding is driven purely by the instruction *format*: the opcode byte selects one of the
//! Dalvik formats, which determines the instruction length and the operand layout. Mnemonics
//! and opcode semantics are not modelled.
//!
//! # Key Types
//! - [`Instruction`] - A decoded instruction with its position, format and operands
//! - [`Format`] - The encoding format, with the opcode to format table
//! - [`Operands`] - Operands by shape (registers, literals, branch offsets, pool indices)
//! - [`Payload`] - Switch tables and array data embedded in the instruction stream
//! - [`InstructionDecoder`] - Seam used by [`crate::metadata::method::InstructionStream`]
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//!
//! # Example
//! ```rust
//! use dexscope::disassembler::{decode_instruction, Format};
//! use dexscope::Parser;
//!
//! let bytecode = &[0x00, 0x00, 0x0e, 0x00]; // nop, return-void
//! let mut parser = Parser::new(bytecode);
//!
//! let first = decode_instruction(&mut parser, 0)?;
//! let second = decode_instruction(&mut parser, 1)?;
//! assert_eq!(first.format, Format::F10x);
//! assert_eq!(second.opcode, 0x0e);
//! # Ok::<(), dexscope::Error>(())
//! ```

mod decoder;
mod format;
mod instruction;

pub use decoder::{decode_instruction, DalvikDecoder, InstructionDecoder};
pub use format::Format;
pub use instruction::{Instruction, Operands, Payload, RegisterList};
