//! Dalvik instruction formats and the opcode to format table.
//!
//! Every Dalvik opcode is encoded in one of a fixed set of formats. The format name encodes
//! the shape: the first digit is the size in 16-bit code units, the second the number of
//! registers, and the trailing letter the kind of extra data (`x` none, `n`/`s`/`i`/`l`/`h`
//! literals, `t` branch target, `c` constant pool index, `r` register range).
//!
//! The table below maps each opcode byte to its format only; mnemonics and semantics are out
//! of scope for this crate.

use strum::{EnumCount, EnumIter, IntoStaticStr};

/// The encoding format of a Dalvik instruction.
///
/// # Examples
///
/// ```rust
/// use dexscope::disassembler::Format;
///
/// // const-wide (0x18) is the only 5 code unit instruction
/// let format = Format::for_opcode(0x18).unwrap();
/// assert_eq!(format, Format::F51l);
/// assert_eq!(format.size_in_code_units(), Some(5));
/// assert_eq!(format.name(), "51l");
///
/// // 0x3e is unused
/// assert!(Format::for_opcode(0x3e).is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum Format {
    /// `ØØ|op`
    #[strum(serialize = "10x")]
    F10x,
    /// `AA|op`, 8 bit branch offset
    #[strum(serialize = "10t")]
    F10t,
    /// `B|A|op`, 4 bit literal
    #[strum(serialize = "11n")]
    F11n,
    /// `AA|op`
    #[strum(serialize = "11x")]
    F11x,
    /// `B|A|op`
    #[strum(serialize = "12x")]
    F12x,
    /// `ØØ|op AAAA`
    #[strum(serialize = "20t")]
    F20t,
    /// `AA|op BBBB`, pool index
    #[strum(serialize = "21c")]
    F21c,
    /// `AA|op BBBB`, high bits of a literal
    #[strum(serialize = "21h")]
    F21h,
    /// `AA|op BBBB`, 16 bit literal
    #[strum(serialize = "21s")]
    F21s,
    /// `AA|op BBBB`, 16 bit branch offset
    #[strum(serialize = "21t")]
    F21t,
    /// `AA|op CC|BB`, 8 bit literal
    #[strum(serialize = "22b")]
    F22b,
    /// `B|A|op CCCC`, pool index
    #[strum(serialize = "22c")]
    F22c,
    /// `B|A|op CCCC`, 16 bit literal
    #[strum(serialize = "22s")]
    F22s,
    /// `B|A|op CCCC`, 16 bit branch offset
    #[strum(serialize = "22t")]
    F22t,
    /// `AA|op BBBB`
    #[strum(serialize = "22x")]
    F22x,
    /// `AA|op CC|BB`
    #[strum(serialize = "23x")]
    F23x,
    /// `ØØ|op AAAAlo AAAAhi`
    #[strum(serialize = "30t")]
    F30t,
    /// `AA|op BBBBlo BBBBhi`, 32 bit pool index
    #[strum(serialize = "31c")]
    F31c,
    /// `AA|op BBBBlo BBBBhi`, 32 bit literal
    #[strum(serialize = "31i")]
    F31i,
    /// `AA|op BBBBlo BBBBhi`, offset of a payload
    #[strum(serialize = "31t")]
    F31t,
    /// `ØØ|op AAAA BBBB`
    #[strum(serialize = "32x")]
    F32x,
    /// `A|G|op BBBB F|E|D|C`, up to five argument registers
    #[strum(serialize = "35c")]
    F35c,
    /// `AA|op BBBB CCCC`, register range
    #[strum(serialize = "3rc")]
    F3rc,
    /// `A|G|op BBBB F|E|D|C HHHH`, argument registers plus prototype
    #[strum(serialize = "45cc")]
    F45cc,
    /// `AA|op BBBB CCCC HHHH`, register range plus prototype
    #[strum(serialize = "4rcc")]
    F4rcc,
    /// `AA|op BBBBlo BBBB BBBB BBBBhi`, 64 bit literal
    #[strum(serialize = "51l")]
    F51l,
    /// `packed-switch` payload, introduced by identifier `0x0100`
    #[strum(serialize = "packed-switch-payload")]
    PackedSwitchPayload,
    /// `sparse-switch` payload, introduced by identifier `0x0200`
    #[strum(serialize = "sparse-switch-payload")]
    SparseSwitchPayload,
    /// `fill-array-data` payload, introduced by identifier `0x0300`
    #[strum(serialize = "array-payload")]
    ArrayPayload,
}

impl Format {
    /// Returns the format used by `opcode`, or `None` for unused opcodes.
    ///
    /// Payload formats are never returned here; they share opcode `0x00` with `nop` and are
    /// told apart by the identifier byte.
    #[must_use]
    pub fn for_opcode(opcode: u8) -> Option<Format> {
        OPCODE_FORMATS[opcode as usize]
    }

    /// Returns the fixed size of this format in 16-bit code units.
    ///
    /// Payload formats have a size that depends on their content and return `None`.
    #[must_use]
    pub fn size_in_code_units(self) -> Option<usize> {
        match self {
            Format::F10x | Format::F10t | Format::F11n | Format::F11x | Format::F12x => Some(1),
            Format::F20t
            | Format::F21c
            | Format::F21h
            | Format::F21s
            | Format::F21t
            | Format::F22b
            | Format::F22c
            | Format::F22s
            | Format::F22t
            | Format::F22x
            | Format::F23x => Some(2),
            Format::F30t
            | Format::F31c
            | Format::F31i
            | Format::F31t
            | Format::F32x
            | Format::F35c
            | Format::F3rc => Some(3),
            Format::F45cc | Format::F4rcc => Some(4),
            Format::F51l => Some(5),
            Format::PackedSwitchPayload | Format::SparseSwitchPayload | Format::ArrayPayload => {
                None
            }
        }
    }

    /// Returns `true` for the variable-length payload pseudo-formats.
    #[must_use]
    pub fn is_payload(self) -> bool {
        self.size_in_code_units().is_none()
    }

    /// Returns the conventional name of the format, e.g. `"22c"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const fn format_of(opcode: u8) -> Option<Format> {
    match opcode {
        0x00 | 0x0e => Some(Format::F10x),
        0x01 | 0x04 | 0x07 | 0x21 | 0x7b..=0x8f | 0xb0..=0xcf => Some(Format::F12x),
        0x02 | 0x05 | 0x08 => Some(Format::F22x),
        0x03 | 0x06 | 0x09 => Some(Format::F32x),
        0x0a..=0x0d | 0x0f..=0x11 | 0x1d | 0x1e | 0x27 => Some(Format::F11x),
        0x12 => Some(Format::F11n),
        0x13 | 0x16 => Some(Format::F21s),
        0x14 | 0x17 => Some(Format::F31i),
        0x15 | 0x19 => Some(Format::F21h),
        0x18 => Some(Format::F51l),
        0x1a | 0x1c | 0x1f | 0x22 | 0x60..=0x6d | 0xfe | 0xff => Some(Format::F21c),
        0x1b => Some(Format::F31c),
        0x20 | 0x23 | 0x52..=0x5f => Some(Format::F22c),
        0x24 | 0x6e..=0x72 | 0xfc => Some(Format::F35c),
        0x25 | 0x74..=0x78 | 0xfd => Some(Format::F3rc),
        0x26 | 0x2b | 0x2c => Some(Format::F31t),
        0x28 => Some(Format::F10t),
        0x29 => Some(Format::F20t),
        0x2a => Some(Format::F30t),
        0x2d..=0x31 | 0x44..=0x51 | 0x90..=0xaf => Some(Format::F23x),
        0x32..=0x37 => Some(Format::F22t),
        0x38..=0x3d => Some(Format::F21t),
        0xd0..=0xd7 => Some(Format::F22s),
        0xd8..=0xe2 => Some(Format::F22b),
        0xfa => Some(Format::F45cc),
        0xfb => Some(Format::F4rcc),
        // 0x3e..=0x43, 0x73, 0x79, 0x7a, 0xe3..=0xf9
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn build_opcode_formats() -> [Option<Format>; 256] {
    let mut table = [None; 256];
    let mut opcode = 0;
    while opcode < 256 {
        table[opcode] = format_of(opcode as u8);
        opcode += 1;
    }
    table
}

/// Format of every opcode byte, `None` for unused opcodes.
static OPCODE_FORMATS: [Option<Format>; 256] = build_opcode_formats();

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_unused_opcodes() {
        let unused: Vec<u8> = (0..=255u8)
            .filter(|&opcode| Format::for_opcode(opcode).is_none())
            .collect();

        let mut expected: Vec<u8> = (0x3e..=0x43).collect();
        expected.extend([0x73, 0x79, 0x7a]);
        expected.extend(0xe3..=0xf9);

        assert_eq!(unused, expected);
    }

    #[test]
    fn test_representative_opcodes() {
        assert_eq!(Format::for_opcode(0x00), Some(Format::F10x)); // nop
        assert_eq!(Format::for_opcode(0x01), Some(Format::F12x)); // move
        assert_eq!(Format::for_opcode(0x0e), Some(Format::F10x)); // return-void
        assert_eq!(Format::for_opcode(0x12), Some(Format::F11n)); // const/4
        assert_eq!(Format::for_opcode(0x1a), Some(Format::F21c)); // const-string
        assert_eq!(Format::for_opcode(0x1b), Some(Format::F31c)); // const-string/jumbo
        assert_eq!(Format::for_opcode(0x2b), Some(Format::F31t)); // packed-switch
        assert_eq!(Format::for_opcode(0x6e), Some(Format::F35c)); // invoke-virtual
        assert_eq!(Format::for_opcode(0x74), Some(Format::F3rc)); // invoke-virtual/range
        assert_eq!(Format::for_opcode(0xd8), Some(Format::F22b)); // add-int/lit8
        assert_eq!(Format::for_opcode(0xfa), Some(Format::F45cc)); // invoke-polymorphic
        assert_eq!(Format::for_opcode(0xff), Some(Format::F21c)); // const-method-type
    }

    #[test]
    fn test_sizes_match_names() {
        for format in Format::iter() {
            match format.size_in_code_units() {
                Some(size) => {
                    let first = format.name().as_bytes()[0] - b'0';
                    assert_eq!(size, first as usize, "format {format}");
                }
                None => assert!(format.is_payload()),
            }
        }
        assert_eq!(Format::COUNT, 29);
    }
}
