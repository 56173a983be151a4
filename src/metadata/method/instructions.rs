//! Lazy traversal of the instruction stream of a method.

use crate::{
    disassembler::{DalvikDecoder, Instruction, InstructionDecoder},
    file::{parser::Parser, DexBuffer},
    Error, Result,
};

/// The instruction stream of a method body, `[instructions_start, instructions_end)`.
///
/// Nothing is decoded until the stream is iterated. Every call to [`InstructionStream::iter`]
/// starts a fresh traversal at the first instruction, so the stream can be walked any number
/// of times and each walk yields the same instructions in the same order.
///
/// # Examples
///
/// ```rust
/// use dexscope::{MethodBody, NoContext};
///
/// // registers_size=1, insns_size=2: nop; return-void
/// let mut data = vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0];
/// data.extend_from_slice(&[0x00, 0x00, 0x0e, 0x00]);
///
/// let body = MethodBody::new(&data, 0, &NoContext)?;
/// let stream = body.instructions();
///
/// let mut iter = stream.iter();
/// for instruction in iter.by_ref() {
///     let instruction = instruction?;
///     println!("{:#06x}: format {}", instruction.address, instruction.format);
/// }
/// assert_eq!(iter.pos(), stream.end_offset());
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct InstructionStream<'a, D = DalvikDecoder> {
    buffer: DexBuffer<'a>,
    start: usize,
    end: usize,
    decoder: D,
}

impl<'a> InstructionStream<'a, DalvikDecoder> {
    /// Creates a stream over `[start, end)` decoded with the [`DalvikDecoder`].
    #[must_use]
    pub fn new(buffer: DexBuffer<'a>, start: usize, end: usize) -> Self {
        InstructionStream {
            buffer,
            start,
            end,
            decoder: DalvikDecoder,
        }
    }
}

impl<'a, D: InstructionDecoder> InstructionStream<'a, D> {
    /// Replaces the instruction decoder.
    #[must_use]
    pub fn with_decoder<T: InstructionDecoder>(self, decoder: T) -> InstructionStream<'a, T> {
        InstructionStream {
            buffer: self.buffer,
            start: self.start,
            end: self.end,
            decoder,
        }
    }

    /// Byte offset of the first instruction.
    #[must_use]
    pub fn start_offset(&self) -> usize {
        self.start
    }

    /// Byte offset just past the last instruction.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.end
    }

    /// Size of the stream in 16-bit code units; `0` when `end` does not lie past `start`.
    #[must_use]
    pub fn size_in_code_units(&self) -> usize {
        self.end.saturating_sub(self.start) / 2
    }

    /// Returns `true` if the stream has no code units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Starts a new traversal at the first instruction.
    #[must_use]
    pub fn iter(&self) -> Instructions<'_, 'a, D> {
        Instructions {
            buffer: self.buffer,
            decoder: &self.decoder,
            start: self.start,
            end: self.end,
            position: self.start,
            failed: false,
        }
    }

    /// Decodes the whole stream.
    ///
    /// # Errors
    /// Returns the first error encountered, see [`Instructions`].
    pub fn collect_all(&self) -> Result<Vec<Instruction<'a>>> {
        self.iter().collect()
    }
}

impl<'s, 'a, D: InstructionDecoder> IntoIterator for &'s InstructionStream<'a, D> {
    type Item = Result<Instruction<'a>>;
    type IntoIter = Instructions<'s, 'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One traversal of an [`InstructionStream`].
///
/// The iterator yields `Ok` for every instruction in program order and ends when the
/// position reaches the end of the stream exactly. It yields a single `Err` and then stops
/// when:
///
/// - the buffer ends before the declared stream does ([`Error::OutOfBounds`]),
/// - the bytes do not encode a valid instruction ([`Error::MalformedInstruction`]),
/// - an instruction extends past the end of the stream ([`Error::MalformedInstruction`]).
///
/// Instructions are never truncated to fit the stream.
#[derive(Debug, Clone)]
pub struct Instructions<'s, 'a, D> {
    buffer: DexBuffer<'a>,
    decoder: &'s D,
    start: usize,
    end: usize,
    position: usize,
    failed: bool,
}

impl<D> Instructions<'_, '_, D> {
    /// Current byte position: the offset of the next instruction to decode.
    ///
    /// After a complete traversal this equals the end offset of the stream.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    fn straddling(&self, offset: usize, size: Option<usize>) -> Error {
        match size {
            Some(size) => malformed_instruction_error!(
                offset,
                "Instruction of {} code units extends past the end of the instruction stream at {:#x}",
                size,
                self.end
            ),
            None => malformed_instruction_error!(
                offset,
                "Instruction extends past the end of the instruction stream at {:#x}",
                self.end
            ),
        }
    }

    fn fail<T>(&mut self, error: Error) -> Option<Result<T>> {
        self.failed = true;
        log::debug!(
            "instruction stream [{:#x}, {:#x}) failed at {:#x}: {}",
            self.start,
            self.end,
            self.position,
            error
        );
        Some(Err(error))
    }
}

impl<'a, D: InstructionDecoder> Iterator for Instructions<'_, 'a, D> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.end {
            return None;
        }

        let offset = self.position;
        #[allow(clippy::cast_possible_truncation)]
        let address = ((offset - self.start) / 2) as u32;

        // A stream that lies inside the buffer is decoded from a view ending at the stream
        // end, so a read past it means the instruction straddles the end.
        let data = self.buffer.data();
        let bounded = self.end <= data.len();
        let view = if bounded { &data[..self.end] } else { data };

        let mut parser = match Parser::at(view, offset) {
            Ok(parser) => parser,
            Err(error) => return self.fail(error),
        };

        match self.decoder.decode_one(&mut parser, address) {
            Ok(instruction) => {
                if parser.pos() <= offset {
                    let error = malformed_instruction_error!(offset, "Decoder consumed no code units");
                    return self.fail(error);
                }
                if parser.pos() > self.end {
                    let error = self.straddling(offset, Some(instruction.size));
                    return self.fail(error);
                }

                self.position = parser.pos();
                Some(Ok(instruction))
            }
            Err(Error::OutOfBounds) if bounded => {
                let error = self.straddling(offset, None);
                self.fail(error)
            }
            Err(Error::Malformed { message, .. }) => {
                self.fail(Error::MalformedInstruction { offset, message })
            }
            Err(error) => self.fail(error),
        }
    }
}

impl<D: InstructionDecoder> std::iter::FusedIterator for Instructions<'_, '_, D> {}
