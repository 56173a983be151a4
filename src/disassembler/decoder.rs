//! Format-level Dalvik instruction decoder.
//!
//! The decoder reads the first code unit, looks up the [`Format`] of its opcode byte and
//! extracts the operands that format carries. It knows nothing about what an opcode does,
//! which keeps it small and makes the opcode table the only Dalvik-version-specific part.

use crate::{
    disassembler::{Format, Instruction, Operands, Payload, RegisterList},
    file::parser::Parser,
    Result,
};

const PACKED_SWITCH_IDENT: u16 = 0x0100;
const SPARSE_SWITCH_IDENT: u16 = 0x0200;
const ARRAY_DATA_IDENT: u16 = 0x0300;

/// Decodes one instruction at a time from a [`Parser`].
///
/// This is the seam between the instruction stream of a method body and the actual
/// instruction encoding. [`DalvikDecoder`] is the stock implementation.
pub trait InstructionDecoder {
    /// Decodes the instruction at the parser position and advances past it.
    ///
    /// # Arguments
    /// * `parser` - Positioned at the first code unit of the instruction
    /// * `address` - Code-unit address of the instruction within its method
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the instruction runs past the buffer, or
    /// [`crate::Error::MalformedInstruction`] if the encoding is invalid.
    fn decode_one<'a>(&self, parser: &mut Parser<'a>, address: u32) -> Result<Instruction<'a>>;
}

/// The format-level Dalvik decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DalvikDecoder;

impl InstructionDecoder for DalvikDecoder {
    fn decode_one<'a>(&self, parser: &mut Parser<'a>, address: u32) -> Result<Instruction<'a>> {
        decode_instruction(parser, address)
    }
}

/// Decodes a single Dalvik instruction.
///
/// # Arguments
/// * `parser` - Positioned at the first code unit of the instruction
/// * `address` - Code-unit address recorded in the returned [`Instruction`]
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the end of the parser
/// data, or [`crate::Error::MalformedInstruction`] for unused opcodes, unknown payload
/// identifiers and invalid register counts.
///
/// # Examples
///
/// ```rust
/// use dexscope::disassembler::{decode_instruction, Format, Operands};
/// use dexscope::Parser;
///
/// // invoke-virtual {v1, v2}, method@0003
/// let bytecode = [0x6e, 0x20, 0x03, 0x00, 0x21, 0x00];
/// let mut parser = Parser::new(&bytecode);
///
/// let instruction = decode_instruction(&mut parser, 0)?;
/// assert_eq!(instruction.format, Format::F35c);
/// assert_eq!(instruction.size, 3);
/// if let Operands::InvokeList { registers, index } = instruction.operands {
///     assert_eq!(registers.as_slice(), &[1, 2]);
///     assert_eq!(index, 3);
/// }
/// assert_eq!(parser.pos(), 6);
/// # Ok::<(), dexscope::Error>(())
/// ```
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn decode_instruction<'a>(parser: &mut Parser<'a>, address: u32) -> Result<Instruction<'a>> {
    let offset = parser.pos();
    let unit = parser.read_le::<u16>()?;
    let opcode = unit as u8;
    let high = unit >> 8;

    let Some(format) = Format::for_opcode(opcode) else {
        return Err(malformed_instruction_error!(
            offset,
            "Unused opcode {:#04x}",
            opcode
        ));
    };

    if opcode == 0x00 && high != 0 {
        return decode_payload(parser, offset, address, unit);
    }

    let operands = match format {
        Format::F10x => Operands::None,
        Format::F10t => Operands::Branch {
            offset: i32::from(high as u8 as i8),
        },
        Format::F11n => Operands::Literal {
            a: high & 0x0F,
            // Arithmetic shift sign-extends the top nibble
            literal: i64::from((unit as i16) >> 12),
        },
        Format::F11x => Operands::Register { a: high },
        Format::F12x => Operands::RegisterPair {
            a: high & 0x0F,
            b: unit >> 12,
        },
        Format::F20t => Operands::Branch {
            offset: i32::from(parser.read_le::<i16>()?),
        },
        Format::F21c => Operands::Index {
            a: high,
            index: u32::from(parser.read_le::<u16>()?),
        },
        Format::F21h => {
            let value = i64::from(parser.read_le::<i16>()?);
            let shift = if opcode == 0x19 { 48 } else { 16 };
            Operands::Literal {
                a: high,
                literal: value << shift,
            }
        }
        Format::F21s => Operands::Literal {
            a: high,
            literal: i64::from(parser.read_le::<i16>()?),
        },
        Format::F21t => Operands::RegisterBranch {
            a: high,
            offset: i32::from(parser.read_le::<i16>()?),
        },
        Format::F22b => {
            let b = parser.read_le::<u8>()?;
            let literal = parser.read_le::<i8>()?;
            Operands::RegisterPairLiteral {
                a: high,
                b: u16::from(b),
                literal: i32::from(literal),
            }
        }
        Format::F22c => Operands::RegisterPairIndex {
            a: high & 0x0F,
            b: unit >> 12,
            index: u32::from(parser.read_le::<u16>()?),
        },
        Format::F22s => Operands::RegisterPairLiteral {
            a: high & 0x0F,
            b: unit >> 12,
            literal: i32::from(parser.read_le::<i16>()?),
        },
        Format::F22t => Operands::RegisterPairBranch {
            a: high & 0x0F,
            b: unit >> 12,
            offset: i32::from(parser.read_le::<i16>()?),
        },
        Format::F22x => Operands::RegisterPair {
            a: high,
            b: parser.read_le::<u16>()?,
        },
        Format::F23x => {
            let b = parser.read_le::<u8>()?;
            let c = parser.read_le::<u8>()?;
            Operands::RegisterTriple {
                a: high,
                b: u16::from(b),
                c: u16::from(c),
            }
        }
        Format::F30t => Operands::Branch {
            offset: parser.read_le::<i32>()?,
        },
        Format::F31c => Operands::Index {
            a: high,
            index: parser.read_le::<u32>()?,
        },
        Format::F31i => Operands::Literal {
            a: high,
            literal: i64::from(parser.read_le::<i32>()?),
        },
        Format::F31t => Operands::RegisterBranch {
            a: high,
            offset: parser.read_le::<i32>()?,
        },
        Format::F32x => Operands::RegisterPair {
            a: parser.read_le::<u16>()?,
            b: parser.read_le::<u16>()?,
        },
        Format::F35c => {
            let index = u32::from(parser.read_le::<u16>()?);
            let registers = read_register_list(parser, offset, unit)?;
            Operands::InvokeList { registers, index }
        }
        Format::F3rc => Operands::InvokeRange {
            count: high,
            index: u32::from(parser.read_le::<u16>()?),
            first: parser.read_le::<u16>()?,
        },
        Format::F45cc => {
            let index = u32::from(parser.read_le::<u16>()?);
            let registers = read_register_list(parser, offset, unit)?;
            let proto = parser.read_le::<u16>()?;
            Operands::PolymorphicList {
                registers,
                index,
                proto,
            }
        }
        Format::F4rcc => Operands::PolymorphicRange {
            count: high,
            index: u32::from(parser.read_le::<u16>()?),
            first: parser.read_le::<u16>()?,
            proto: parser.read_le::<u16>()?,
        },
        Format::F51l => Operands::Literal {
            a: high,
            literal: parser.read_le::<i64>()?,
        },
        Format::PackedSwitchPayload | Format::SparseSwitchPayload | Format::ArrayPayload => {
            return Err(malformed_instruction_error!(
                offset,
                "Opcode {:#04x} cannot use a payload format",
                opcode
            ))
        }
    };

    Ok(Instruction {
        offset,
        address,
        opcode,
        format,
        size: (parser.pos() - offset) / 2,
        operands,
    })
}

/// Reads the `F|E|D|C` code unit of a `35c`/`45cc` instruction; `unit` is the first code unit
/// carrying the count `A` and register `G`.
fn read_register_list(parser: &mut Parser, offset: usize, unit: u16) -> Result<RegisterList> {
    #[allow(clippy::cast_possible_truncation)]
    let count = (unit >> 12) as u8;
    if count > 5 {
        return Err(malformed_instruction_error!(
            offset,
            "Invalid register count {}",
            count
        ));
    }

    let fedc = parser.read_le::<u16>()?;
    #[allow(clippy::cast_possible_truncation)]
    let registers = [
        (fedc & 0x0F) as u8,
        ((fedc >> 4) & 0x0F) as u8,
        ((fedc >> 8) & 0x0F) as u8,
        (fedc >> 12) as u8,
        ((unit >> 8) & 0x0F) as u8,
    ];

    Ok(RegisterList::new(registers, count))
}

fn decode_payload<'a>(
    parser: &mut Parser<'a>,
    offset: usize,
    address: u32,
    ident: u16,
) -> Result<Instruction<'a>> {
    let (format, payload) = match ident {
        PACKED_SWITCH_IDENT => {
            let size = usize::from(parser.read_le::<u16>()?);
            let first_key = parser.read_le::<i32>()?;
            let targets = take(parser, size * 4)?;
            (
                Format::PackedSwitchPayload,
                Payload::PackedSwitch { first_key, targets },
            )
        }
        SPARSE_SWITCH_IDENT => {
            let size = usize::from(parser.read_le::<u16>()?);
            let keys = take(parser, size * 4)?;
            let targets = take(parser, size * 4)?;
            (
                Format::SparseSwitchPayload,
                Payload::SparseSwitch { keys, targets },
            )
        }
        ARRAY_DATA_IDENT => {
            let element_width = parser.read_le::<u16>()?;
            let element_count = parser.read_le::<u32>()?;
            let Some(len) = usize::from(element_width).checked_mul(element_count as usize) else {
                return Err(out_of_bounds_error!());
            };
            let array = take(parser, len)?;
            // Element data is padded to a whole code unit
            if len % 2 != 0 {
                parser.advance_by(1)?;
            }
            (
                Format::ArrayPayload,
                Payload::ArrayData {
                    element_width,
                    element_count,
                    data: array,
                },
            )
        }
        _ => {
            return Err(malformed_instruction_error!(
                offset,
                "Unknown payload identifier {:#06x}",
                ident
            ))
        }
    };

    Ok(Instruction {
        offset,
        address,
        opcode: 0x00,
        format,
        size: (parser.pos() - offset) / 2,
        operands: Operands::Payload(payload),
    })
}

fn take<'a>(parser: &mut Parser<'a>, len: usize) -> Result<&'a [u8]> {
    let start = parser.pos();
    parser.advance_by(len)?;
    Ok(&parser.data()[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn decode(bytes: &[u8]) -> Result<Instruction<'_>> {
        let mut parser = Parser::new(bytes);
        decode_instruction(&mut parser, 0)
    }

    #[test]
    fn test_decode_nop() {
        let instruction = decode(&[0x00, 0x00]).unwrap();

        assert_eq!(instruction.offset, 0);
        assert_eq!(instruction.opcode, 0x00);
        assert_eq!(instruction.format, Format::F10x);
        assert_eq!(instruction.size, 1);
        assert_eq!(instruction.operands, Operands::None);
    }

    #[test]
    fn test_decode_records_position() {
        // return-void at byte offset 4, code address 2
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x0e, 0x00];
        let mut parser = Parser::at(&bytes, 4).unwrap();

        let instruction = DalvikDecoder.decode_one(&mut parser, 2).unwrap();
        assert_eq!(instruction.offset, 4);
        assert_eq!(instruction.address, 2);
        assert_eq!(parser.pos(), 6);
    }

    #[test]
    fn test_decode_nibble_formats() {
        // move v3, v4
        let instruction = decode(&[0x01, 0x43]).unwrap();
        assert_eq!(instruction.operands, Operands::RegisterPair { a: 3, b: 4 });

        // const/4 v2, #7
        let instruction = decode(&[0x12, 0x72]).unwrap();
        assert_eq!(instruction.operands, Operands::Literal { a: 2, literal: 7 });

        // const/4 v0, #-8
        let instruction = decode(&[0x12, 0x80]).unwrap();
        assert_eq!(instruction.operands, Operands::Literal { a: 0, literal: -8 });
    }

    #[test]
    fn test_decode_literals() {
        // const/16 v1, #-2
        let instruction = decode(&[0x13, 0x01, 0xFE, 0xFF]).unwrap();
        assert_eq!(instruction.format, Format::F21s);
        assert_eq!(instruction.operands, Operands::Literal { a: 1, literal: -2 });

        // const/high16 v0, #0x12340000
        let instruction = decode(&[0x15, 0x00, 0x34, 0x12]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::Literal {
                a: 0,
                literal: 0x1234_0000
            }
        );

        // const-wide/high16 v2, #0x4000000000000000
        let instruction = decode(&[0x19, 0x02, 0x00, 0x40]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::Literal {
                a: 2,
                literal: 0x4000_0000_0000_0000
            }
        );

        // const-wide v0, #0x0102030405060708
        let instruction =
            decode(&[0x18, 0x00, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]).unwrap();
        assert_eq!(instruction.size, 5);
        assert_eq!(
            instruction.operands,
            Operands::Literal {
                a: 0,
                literal: 0x0102_0304_0506_0708
            }
        );

        // add-int/lit8 v1, v2, #-1
        let instruction = decode(&[0xd8, 0x01, 0x02, 0xFF]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::RegisterPairLiteral {
                a: 1,
                b: 2,
                literal: -1
            }
        );
    }

    #[test]
    fn test_decode_branches() {
        // goto -2
        let instruction = decode(&[0x28, 0xFE]).unwrap();
        assert_eq!(instruction.operands, Operands::Branch { offset: -2 });

        // if-eqz v5, +0x10
        let instruction = decode(&[0x38, 0x05, 0x10, 0x00]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::RegisterBranch { a: 5, offset: 16 }
        );
        assert_eq!(instruction.branch_target(), Some(16));

        // if-ne v1, v2, -4
        let instruction = decode(&[0x33, 0x21, 0xFC, 0xFF]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::RegisterPairBranch {
                a: 1,
                b: 2,
                offset: -4
            }
        );

        // goto/32 +0x10000
        let instruction = decode(&[0x2a, 0x00, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(instruction.size, 3);
        assert_eq!(instruction.operands, Operands::Branch { offset: 0x10000 });
    }

    #[test]
    fn test_decode_indices() {
        // const-string v0, string@0x0042
        let instruction = decode(&[0x1a, 0x00, 0x42, 0x00]).unwrap();
        assert_eq!(instruction.operands, Operands::Index { a: 0, index: 0x42 });

        // const-string/jumbo v1, string@0x00012345
        let instruction = decode(&[0x1b, 0x01, 0x45, 0x23, 0x01, 0x00]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::Index {
                a: 1,
                index: 0x12345
            }
        );

        // iget v0, v1, field@0x0007
        let instruction = decode(&[0x52, 0x10, 0x07, 0x00]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::RegisterPairIndex { a: 0, b: 1, index: 7 }
        );

        // aget v1, v2, v3
        let instruction = decode(&[0x44, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::RegisterTriple { a: 1, b: 2, c: 3 }
        );
    }

    #[test]
    fn test_decode_invokes() {
        // invoke-static {v0, v1, v2, v3, v4}, method@0x0009
        let instruction = decode(&[0x71, 0x54, 0x09, 0x00, 0x10, 0x32]).unwrap();
        match instruction.operands {
            Operands::InvokeList { registers, index } => {
                assert_eq!(registers.as_slice(), &[0, 1, 2, 3, 4]);
                assert_eq!(index, 9);
            }
            other => panic!("Unexpected operands {other:?}"),
        }

        // invoke-virtual/range {v16 .. v18}, method@0x0100
        let instruction = decode(&[0x74, 0x03, 0x00, 0x01, 0x10, 0x00]).unwrap();
        assert_eq!(
            instruction.operands,
            Operands::InvokeRange {
                first: 16,
                count: 3,
                index: 0x100
            }
        );

        // invoke-polymorphic {v1, v2}, method@0x0004, proto@0x0005
        let instruction = decode(&[0xfa, 0x20, 0x04, 0x00, 0x21, 0x00, 0x05, 0x00]).unwrap();
        assert_eq!(instruction.size, 4);
        match instruction.operands {
            Operands::PolymorphicList {
                registers,
                index,
                proto,
            } => {
                assert_eq!(registers.as_slice(), &[1, 2]);
                assert_eq!(index, 4);
                assert_eq!(proto, 5);
            }
            other => panic!("Unexpected operands {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_register_count() {
        let result = decode(&[0x6e, 0x60, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(
            result,
            Err(Error::MalformedInstruction { offset: 0, .. })
        ));
    }

    #[test]
    fn test_decode_unused_opcode() {
        let bytes = [0x00, 0x00, 0x3e, 0x00];
        let mut parser = Parser::at(&bytes, 2).unwrap();

        let result = decode_instruction(&mut parser, 1);
        assert!(matches!(
            result,
            Err(Error::MalformedInstruction { offset: 2, .. })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        // const/16 with its literal missing
        assert!(matches!(decode(&[0x13, 0x00]), Err(Error::OutOfBounds)));
        assert!(matches!(decode(&[0x00]), Err(Error::OutOfBounds)));
    }

    #[test]
    fn test_decode_packed_switch_payload() {
        let bytes = [
            0x00, 0x01, // ident
            0x02, 0x00, // size
            0x0A, 0x00, 0x00, 0x00, // first_key
            0x05, 0x00, 0x00, 0x00, // target 0
            0x09, 0x00, 0x00, 0x00, // target 1
        ];
        let instruction = decode(&bytes).unwrap();

        assert_eq!(instruction.format, Format::PackedSwitchPayload);
        assert!(instruction.is_payload());
        assert_eq!(instruction.size, 4 + 2 * 2);
        match instruction.operands {
            Operands::Payload(payload) => {
                let entries: Vec<_> = payload.switch_entries().collect();
                assert_eq!(entries, vec![(10, 5), (11, 9)]);
            }
            other => panic!("Unexpected operands {other:?}"),
        }
    }

    #[test]
    fn test_decode_sparse_switch_payload() {
        let bytes = [
            0x00, 0x02, // ident
            0x01, 0x00, // size
            0xFF, 0xFF, 0xFF, 0xFF, // key -1
            0x20, 0x00, 0x00, 0x00, // target
        ];
        let instruction = decode(&bytes).unwrap();

        assert_eq!(instruction.format, Format::SparseSwitchPayload);
        assert_eq!(instruction.size, 2 + 4);
    }

    #[test]
    fn test_decode_array_payload() {
        let bytes = [
            0x00, 0x03, // ident
            0x01, 0x00, // element_width
            0x03, 0x00, 0x00, 0x00, // element_count
            0xAA, 0xBB, 0xCC, 0x00, // data + padding
        ];
        let mut parser = Parser::new(&bytes);
        let instruction = decode_instruction(&mut parser, 0).unwrap();

        assert_eq!(instruction.format, Format::ArrayPayload);
        assert_eq!(instruction.size, 4 + 2);
        assert_eq!(parser.pos(), bytes.len());
        match instruction.operands {
            Operands::Payload(payload) => {
                assert_eq!(payload.array_element(2), Some(&[0xCC][..]));
            }
            other => panic!("Unexpected operands {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_payload() {
        assert!(matches!(
            decode(&[0x00, 0x04, 0x00, 0x00]),
            Err(Error::MalformedInstruction { offset: 0, .. })
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        // packed-switch claiming 4 targets with only one present
        let bytes = [
            0x00, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        ];
        assert!(matches!(decode(&bytes), Err(Error::OutOfBounds)));
    }
}
