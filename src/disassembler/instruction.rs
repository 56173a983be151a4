//! Decoded instruction representation.
//!
//! An [`Instruction`] is the tagged result of decoding one Dalvik instruction: where it sits,
//! which [`Format`] it has, and the operands that format carries. Payload pseudo-instructions
//! borrow their tables straight from the image.

use crate::disassembler::Format;

/// Up to five argument registers of a `35c` or `45cc` instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RegisterList {
    registers: [u8; 5],
    count: u8,
}

impl RegisterList {
    /// Builds a list from the first `count` entries of `registers`.
    ///
    /// `count` is clamped to five.
    #[must_use]
    pub fn new(registers: [u8; 5], count: u8) -> Self {
        RegisterList {
            registers,
            count: count.min(5),
        }
    }

    /// Returns the registers in argument order.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.registers[..self.count as usize]
    }

    /// Returns the number of argument registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns `true` when the instruction takes no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The data of a payload pseudo-instruction, borrowed from the image.
///
/// The tables are kept as raw little-endian bytes and decoded on access.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Payload<'a> {
    /// Jump table for `packed-switch`: consecutive keys starting at `first_key`.
    PackedSwitch {
        /// The key of the first target
        first_key: i32,
        /// `size` little-endian `i32` branch offsets
        targets: &'a [u8],
    },
    /// Jump table for `sparse-switch`: sorted keys with one target each.
    SparseSwitch {
        /// `size` little-endian `i32` keys
        keys: &'a [u8],
        /// `size` little-endian `i32` branch offsets
        targets: &'a [u8],
    },
    /// Initial data for `fill-array-data`.
    ArrayData {
        /// Width of one element in bytes
        element_width: u16,
        /// Number of elements
        element_count: u32,
        /// `element_width * element_count` bytes of element data
        data: &'a [u8],
    },
}

impl<'a> Payload<'a> {
    /// Returns the `(key, branch offset)` pairs of a switch payload, in table order.
    ///
    /// Branch offsets are relative to the switch instruction that references the payload,
    /// not to the payload itself. Array payloads yield nothing.
    pub fn switch_entries(&self) -> impl Iterator<Item = (i32, i32)> + 'a {
        let (keys, targets, first_key): (&'a [u8], &'a [u8], i32) = match *self {
            Payload::PackedSwitch { first_key, targets } => (&[], targets, first_key),
            Payload::SparseSwitch { keys, targets } => (keys, targets, 0),
            Payload::ArrayData { .. } => (&[], &[], 0),
        };

        targets
            .chunks_exact(4)
            .enumerate()
            .map(move |(index, target)| {
                let key = match keys.get(index * 4..index * 4 + 4) {
                    Some(key) => read_i32(key),
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    None => first_key.wrapping_add(index as i32),
                };
                (key, read_i32(target))
            })
    }

    /// Returns the bytes of array element `index`, if present.
    #[must_use]
    pub fn array_element(&self, index: usize) -> Option<&'a [u8]> {
        match *self {
            Payload::ArrayData {
                element_width,
                data,
                ..
            } => {
                let width = element_width as usize;
                let start = index.checked_mul(width)?;
                data.get(start..start.checked_add(width)?)
            }
            _ => None,
        }
    }
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    i32::from_le_bytes(raw)
}

/// The operands of a decoded instruction, by operand shape.
///
/// Register numbers are widened to `u16`; the number of bits actually available to them
/// depends on the format. Branch offsets are signed and counted in code units relative to
/// the address of the instruction itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operands<'a> {
    /// `10x`
    None,
    /// `11x`
    Register {
        /// vA
        a: u16,
    },
    /// `12x`, `22x`, `32x`
    RegisterPair {
        /// vA
        a: u16,
        /// vB
        b: u16,
    },
    /// `23x`
    RegisterTriple {
        /// vA
        a: u16,
        /// vB
        b: u16,
        /// vC
        c: u16,
    },
    /// `11n`, `21s`, `21h`, `31i`, `51l`
    Literal {
        /// Destination register
        a: u16,
        /// Sign-extended literal, already shifted for `21h`
        literal: i64,
    },
    /// `22b`, `22s`
    RegisterPairLiteral {
        /// vA
        a: u16,
        /// vB
        b: u16,
        /// Sign-extended literal
        literal: i32,
    },
    /// `10t`, `20t`, `30t`
    Branch {
        /// Branch offset in code units
        offset: i32,
    },
    /// `21t`, `31t`
    RegisterBranch {
        /// Tested or switched register
        a: u16,
        /// Branch offset, or payload offset for `31t`, in code units
        offset: i32,
    },
    /// `22t`
    RegisterPairBranch {
        /// vA
        a: u16,
        /// vB
        b: u16,
        /// Branch offset in code units
        offset: i32,
    },
    /// `21c`, `31c`
    Index {
        /// vA
        a: u16,
        /// Constant pool index
        index: u32,
    },
    /// `22c`
    RegisterPairIndex {
        /// vA
        a: u16,
        /// vB
        b: u16,
        /// Constant pool index
        index: u32,
    },
    /// `35c`
    InvokeList {
        /// Argument registers
        registers: RegisterList,
        /// Method, type or call site index
        index: u32,
    },
    /// `3rc`
    InvokeRange {
        /// First argument register
        first: u16,
        /// Number of argument registers
        count: u16,
        /// Method, type or call site index
        index: u32,
    },
    /// `45cc`
    PolymorphicList {
        /// Argument registers
        registers: RegisterList,
        /// Method index
        index: u32,
        /// Prototype index
        proto: u16,
    },
    /// `4rcc`
    PolymorphicRange {
        /// First argument register
        first: u16,
        /// Number of argument registers
        count: u16,
        /// Method index
        index: u32,
        /// Prototype index
        proto: u16,
    },
    /// Payload pseudo-instructions
    Payload(Payload<'a>),
}

/// A single decoded Dalvik instruction.
///
/// # Examples
///
/// ```rust
/// use dexscope::disassembler::{decode_instruction, Format, Operands};
/// use dexscope::Parser;
///
/// // const/4 v1, #-1
/// let mut parser = Parser::new(&[0x12, 0xF1]);
/// let instruction = decode_instruction(&mut parser, 0)?;
///
/// assert_eq!(instruction.format, Format::F11n);
/// assert_eq!(instruction.size, 1);
/// assert_eq!(instruction.operands, Operands::Literal { a: 1, literal: -1 });
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instruction<'a> {
    /// Absolute byte offset of the first code unit in the image
    pub offset: usize,
    /// Address in code units, relative to the start of the instruction stream
    pub address: u32,
    /// The opcode byte (`0x00` for payloads)
    pub opcode: u8,
    /// The encoding format
    pub format: Format,
    /// Size in 16-bit code units
    pub size: usize,
    /// The decoded operands
    pub operands: Operands<'a>,
}

impl Instruction<'_> {
    /// Size of the instruction in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.size * 2
    }

    /// Returns `true` for payload pseudo-instructions.
    #[must_use]
    pub fn is_payload(&self) -> bool {
        self.format.is_payload()
    }

    /// Address of the instruction that follows this one, in code units.
    #[must_use]
    pub fn next_address(&self) -> u64 {
        u64::from(self.address) + self.size as u64
    }

    /// The code-unit address a branch, or the payload a `31t` instruction refers to.
    ///
    /// Returns `None` for instructions without a branch offset, and for targets that would
    /// lie before the start of the stream.
    #[must_use]
    pub fn branch_target(&self) -> Option<u32> {
        let offset = match self.operands {
            Operands::Branch { offset }
            | Operands::RegisterBranch { offset, .. }
            | Operands::RegisterPairBranch { offset, .. } => offset,
            _ => return None,
        };

        let target = i64::from(self.address) + i64::from(offset);
        u32::try_from(target).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_list() {
        let list = RegisterList::new([4, 5, 6, 0, 0], 3);
        assert_eq!(list.as_slice(), &[4, 5, 6]);
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());

        let clamped = RegisterList::new([1, 2, 3, 4, 5], 9);
        assert_eq!(clamped.len(), 5);
        assert!(RegisterList::default().is_empty());
    }

    #[test]
    fn test_packed_switch_entries() {
        let targets = [0x05, 0x00, 0x00, 0x00, 0xFE, 0xFF, 0xFF, 0xFF];
        let payload = Payload::PackedSwitch {
            first_key: 10,
            targets: &targets,
        };

        let entries: Vec<_> = payload.switch_entries().collect();
        assert_eq!(entries, vec![(10, 5), (11, -2)]);
    }

    #[test]
    fn test_sparse_switch_entries() {
        let keys = [0x64, 0x00, 0x00, 0x00, 0xC8, 0x00, 0x00, 0x00];
        let targets = [0x03, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00];
        let payload = Payload::SparseSwitch {
            keys: &keys,
            targets: &targets,
        };

        let entries: Vec<_> = payload.switch_entries().collect();
        assert_eq!(entries, vec![(100, 3), (200, 7)]);
        assert_eq!(payload.array_element(0), None);
    }

    #[test]
    fn test_array_elements() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00];
        let payload = Payload::ArrayData {
            element_width: 2,
            element_count: 3,
            data: &data,
        };

        assert_eq!(payload.array_element(1), Some(&[0x02, 0x00][..]));
        assert_eq!(payload.array_element(3), None);
        assert_eq!(payload.switch_entries().count(), 0);
    }

    #[test]
    fn test_branch_target() {
        let mut instruction = Instruction {
            offset: 0x40,
            address: 8,
            opcode: 0x28,
            format: Format::F10t,
            size: 1,
            operands: Operands::Branch { offset: -3 },
        };
        assert_eq!(instruction.branch_target(), Some(5));
        assert_eq!(instruction.next_address(), 9);
        assert_eq!(instruction.byte_len(), 2);

        instruction.operands = Operands::Branch { offset: -9 };
        assert_eq!(instruction.branch_target(), None);

        instruction.operands = Operands::None;
        assert_eq!(instruction.branch_target(), None);
    }
}
