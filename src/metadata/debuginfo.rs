//! Debug information of a method: line table, local variables and parameter names.
//!
//! A `debug_info_item` starts with a small header followed by a byte-coded state machine:
//!
//! ```text
//! uleb128   line_start
//! uleb128   parameters_size
//! uleb128p1 parameter_names[parameters_size]
//! u8[]      bytecode, terminated by DBG_END_SEQUENCE
//! ```
//!
//! The state machine tracks a code address and a line number. Opcodes `0x00`-`0x09` emit
//! or adjust state explicitly; every opcode from `0x0a` up is a *special opcode* that
//! advances both address and line by an amount encoded in the opcode itself and emits a
//! line-table entry.
//!
//! # Local variable table
//!
//! The decoder keeps one slot per register so that `END_LOCAL` and `RESTART_LOCAL`, which
//! only carry a register number, can report which variable they refer to. Before the first
//! opcode the slots of the incoming arguments are filled in: the arguments occupy the last
//! registers of the frame, `this` first for instance methods, and `long`/`double`
//! arguments take two registers.
//!
//! # Examples
//!
//! ```rust
//! use dexscope::metadata::debuginfo::{DebugInfo, DebugItem};
//! use dexscope::{DexBuffer, NoContext};
//!
//! // line_start=10, no parameters, special opcode (+1 address, +0 line), end
//! let data = [0x00, 0x0a, 0x00, 0x0a + 4 + 15, 0x00];
//! let info = DebugInfo::resolve(DexBuffer::new(&data), 1, &NoContext, 1);
//!
//! let items: Vec<_> = info.items().collect::<Result<_, _>>()?;
//! assert_eq!(items, vec![DebugItem::LineNumber { address: 1, line: 10 }]);
//! # Ok::<(), dexscope::Error>(())
//! ```

use crate::{
    config::DecoderConfig,
    file::{parser::Parser, DexBuffer},
    metadata::method::{is_wide, AccessFlags, MethodContext, MethodParameter},
    Error, Result,
};

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;
const DBG_FIRST_SPECIAL: u8 = 0x0a;
const DBG_LINE_BASE: i32 = -4;
const DBG_LINE_RANGE: u8 = 15;

/// Name, type and generic signature of a local variable.
///
/// Any part may be missing: the image may not record it, or the index may not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalInfo<'a> {
    /// Variable name
    pub name: Option<&'a str>,
    /// Type descriptor
    pub type_descriptor: Option<&'a str>,
    /// Generic signature
    pub signature: Option<&'a str>,
}

/// One event of the debug state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugItem<'a> {
    /// A local variable becomes live in `register`
    StartLocal {
        /// Code-unit address
        address: u32,
        /// Register holding the variable
        register: u32,
        /// The variable
        local: LocalInfo<'a>,
    },
    /// The variable in `register` goes out of scope
    EndLocal {
        /// Code-unit address
        address: u32,
        /// Register holding the variable
        register: u32,
        /// The variable that ended, as known from the local table
        local: LocalInfo<'a>,
    },
    /// A previously ended variable is live again in `register`
    RestartLocal {
        /// Code-unit address
        address: u32,
        /// Register holding the variable
        register: u32,
        /// The restarted variable, as known from the local table
        local: LocalInfo<'a>,
    },
    /// End of the method prologue; a good place for a method breakpoint
    PrologueEnd {
        /// Code-unit address
        address: u32,
    },
    /// Start of the method epilogue
    EpilogueBegin {
        /// Code-unit address
        address: u32,
    },
    /// Subsequent line entries refer to another source file
    SetSourceFile {
        /// Code-unit address
        address: u32,
        /// Source file name
        source_file: Option<&'a str>,
    },
    /// A line-table entry
    LineNumber {
        /// Code-unit address
        address: u32,
        /// Source line number
        line: i32,
    },
}

impl DebugItem<'_> {
    /// Code-unit address the item applies to.
    #[must_use]
    pub fn address(&self) -> u32 {
        match *self {
            DebugItem::StartLocal { address, .. }
            | DebugItem::EndLocal { address, .. }
            | DebugItem::RestartLocal { address, .. }
            | DebugItem::PrologueEnd { address }
            | DebugItem::EpilogueBegin { address }
            | DebugItem::SetSourceFile { address, .. }
            | DebugItem::LineNumber { address, .. } => address,
        }
    }
}

/// The debug information handle of a method.
///
/// A debug offset of `0` means the method has no debug information. The handle is then
/// empty: it yields no items and reports every parameter without a name, without reading
/// any byte of the buffer.
#[derive(Debug)]
pub struct DebugInfo<'a, C: ?Sized> {
    buffer: DexBuffer<'a>,
    offset: Option<usize>,
    context: &'a C,
    register_count: u16,
    config: DecoderConfig,
}

impl<C: ?Sized> Clone for DebugInfo<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for DebugInfo<'_, C> {}

impl<'a, C: MethodContext + ?Sized> DebugInfo<'a, C> {
    /// Resolves the debug information at `offset` for a method with `register_count`
    /// registers. An `offset` of `0` yields the empty handle.
    #[must_use]
    pub fn resolve(
        buffer: DexBuffer<'a>,
        offset: u32,
        context: &'a C,
        register_count: u16,
    ) -> Self {
        Self::resolve_with_config(
            buffer,
            offset,
            context,
            register_count,
            DecoderConfig::default(),
        )
    }

    /// Like [`DebugInfo::resolve`], with explicit decoder limits.
    #[must_use]
    pub fn resolve_with_config(
        buffer: DexBuffer<'a>,
        offset: u32,
        context: &'a C,
        register_count: u16,
        config: DecoderConfig,
    ) -> Self {
        DebugInfo {
            buffer,
            offset: (offset != 0).then_some(offset as usize),
            context,
            register_count,
            config,
        }
    }

    /// Returns `true` if the method has debug information.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.offset.is_some()
    }

    /// Absolute offset of the `debug_info_item`, if present.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Starts a traversal of the debug items.
    ///
    /// The header is read when the first item is requested; errors there are yielded like
    /// any other decoding error.
    #[must_use]
    pub fn items(&self) -> DebugItems<'a, C> {
        DebugItems {
            info: *self,
            state: None,
            done: self.offset.is_none(),
        }
    }

    /// Reads the parameter name indices of the header and resolves them.
    ///
    /// Entries are `None` for `NO_INDEX` and for indices the context cannot resolve.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] or [`Error::Malformed`] if the header is damaged.
    pub fn parameter_names(&self) -> Result<Vec<Option<&'a str>>> {
        let Some(offset) = self.offset else {
            return Ok(Vec::new());
        };

        let mut reader = self.buffer.reader(offset)?;
        let header = DebugHeader::read(&mut reader)?;
        Ok(header
            .parameter_names
            .iter()
            .map(|index| index.and_then(|index| self.context.string(index)))
            .collect())
    }

    /// Pairs every declared parameter of the method with its name.
    ///
    /// Parameters come from the method context; names are matched by position. Without
    /// debug information every name is `None`.
    ///
    /// # Errors
    /// See [`DebugInfo::parameter_names`].
    pub fn parameters_with_names(&self) -> Result<Vec<MethodParameter<'a>>> {
        let names = self.parameter_names()?;

        Ok(self
            .context
            .parameter_types()
            .iter()
            .enumerate()
            .map(|(index, type_descriptor)| MethodParameter {
                type_descriptor: type_descriptor.as_str(),
                name: names.get(index).copied().flatten(),
            })
            .collect())
    }
}

struct DebugHeader {
    line_start: u32,
    parameter_names: Vec<Option<u32>>,
}

impl DebugHeader {
    fn read(reader: &mut Parser) -> Result<Self> {
        let line_start = reader.read_uleb128()?;
        let parameters_size = reader.read_small_uleb128()?;

        // Each name takes at least one byte
        let remaining = reader.len() - reader.pos();
        let mut parameter_names = Vec::with_capacity((parameters_size as usize).min(remaining));
        for _ in 0..parameters_size {
            parameter_names.push(reader.read_uleb128p1()?);
        }

        Ok(DebugHeader {
            line_start,
            parameter_names,
        })
    }
}

#[derive(Clone, Copy)]
enum LocalSlot<'a> {
    Live(LocalInfo<'a>),
    Ended(LocalInfo<'a>),
}

impl<'a> LocalSlot<'a> {
    fn info(&self) -> LocalInfo<'a> {
        match *self {
            LocalSlot::Live(info) | LocalSlot::Ended(info) => info,
        }
    }
}

struct MachineState<'a> {
    reader: Parser<'a>,
    locals: Vec<LocalSlot<'a>>,
    address: u32,
    line: i32,
    emitted: usize,
}

/// One traversal of the debug items of a method.
///
/// Yields items in bytecode order until `DBG_END_SEQUENCE`. After an error the iterator
/// yields nothing more.
pub struct DebugItems<'a, C: ?Sized> {
    info: DebugInfo<'a, C>,
    state: Option<MachineState<'a>>,
    done: bool,
}

impl<'a, C: MethodContext + ?Sized> DebugItems<'a, C> {
    fn start(&self, offset: usize) -> Result<MachineState<'a>> {
        log::trace!("decoding debug info at {offset:#x}");

        let mut reader = self.info.buffer.reader(offset)?;
        let header = DebugHeader::read(&mut reader)?;
        #[allow(clippy::cast_possible_wrap)]
        let line = header.line_start as i32;

        Ok(MachineState {
            reader,
            locals: self.initial_locals(&header),
            address: 0,
            line,
            emitted: 0,
        })
    }

    /// Slots of the incoming arguments, right-aligned in the register frame.
    fn initial_locals(&self, header: &DebugHeader) -> Vec<LocalSlot<'a>> {
        let context = self.info.context;
        let register_count = usize::from(self.info.register_count);
        let mut locals = vec![LocalSlot::Live(LocalInfo::default()); register_count];

        let mut arguments = Vec::new();
        if !context.access_flags().contains(AccessFlags::STATIC) {
            arguments.push(LocalInfo {
                name: Some("this"),
                type_descriptor: Some(context.defining_class()),
                signature: None,
            });
        }
        for (index, type_descriptor) in context.parameter_types().iter().enumerate() {
            let name = header
                .parameter_names
                .get(index)
                .copied()
                .flatten()
                .and_then(|index| context.string(index));
            arguments.push(LocalInfo {
                name,
                type_descriptor: Some(type_descriptor.as_str()),
                signature: None,
            });
        }

        let width: usize = arguments
            .iter()
            .map(|argument| match argument.type_descriptor {
                Some(descriptor) if is_wide(descriptor) => 2,
                _ => 1,
            })
            .sum();

        // Arguments that do not fit the frame are dropped
        let Some(mut register) = register_count.checked_sub(width) else {
            return locals;
        };
        for argument in arguments {
            locals[register] = LocalSlot::Live(argument);
            register += match argument.type_descriptor {
                Some(descriptor) if is_wide(descriptor) => 2,
                _ => 1,
            };
        }

        locals
    }

    fn string(&self, index: Option<u32>) -> Option<&'a str> {
        index.and_then(|index| self.info.context.string(index))
    }

    fn type_descriptor(&self, index: Option<u32>) -> Option<&'a str> {
        index.and_then(|index| self.info.context.type_descriptor(index))
    }

    fn step(&mut self, state: &mut MachineState<'a>) -> Result<Option<DebugItem<'a>>> {
        loop {
            let opcode = state.reader.read_le::<u8>()?;
            let address = state.address;

            let item = match opcode {
                DBG_END_SEQUENCE => return Ok(None),
                DBG_ADVANCE_PC => {
                    let delta = state.reader.read_small_uleb128()?;
                    state.address = state.address.wrapping_add(delta);
                    continue;
                }
                DBG_ADVANCE_LINE => {
                    let delta = state.reader.read_sleb128()?;
                    state.line = state.line.wrapping_add(delta);
                    continue;
                }
                DBG_START_LOCAL | DBG_START_LOCAL_EXTENDED => {
                    let register = state.reader.read_small_uleb128()?;
                    let name = state.reader.read_uleb128p1()?;
                    let type_index = state.reader.read_uleb128p1()?;
                    let signature = if opcode == DBG_START_LOCAL_EXTENDED {
                        state.reader.read_uleb128p1()?
                    } else {
                        None
                    };

                    let local = LocalInfo {
                        name: self.string(name),
                        type_descriptor: self.type_descriptor(type_index),
                        signature: self.string(signature),
                    };
                    if let Some(slot) = state.locals.get_mut(register as usize) {
                        *slot = LocalSlot::Live(local);
                    }
                    DebugItem::StartLocal {
                        address,
                        register,
                        local,
                    }
                }
                DBG_END_LOCAL => {
                    let register = state.reader.read_small_uleb128()?;
                    let local = match state.locals.get_mut(register as usize) {
                        Some(slot) => match *slot {
                            LocalSlot::Live(info) => {
                                *slot = LocalSlot::Ended(info);
                                info
                            }
                            // Ending an ended local carries nothing and keeps the table entry
                            LocalSlot::Ended(_) => LocalInfo::default(),
                        },
                        None => LocalInfo::default(),
                    };
                    DebugItem::EndLocal {
                        address,
                        register,
                        local,
                    }
                }
                DBG_RESTART_LOCAL => {
                    let register = state.reader.read_small_uleb128()?;
                    let local = match state.locals.get_mut(register as usize) {
                        Some(slot) => {
                            let info = slot.info();
                            *slot = LocalSlot::Live(info);
                            info
                        }
                        None => LocalInfo::default(),
                    };
                    DebugItem::RestartLocal {
                        address,
                        register,
                        local,
                    }
                }
                DBG_SET_PROLOGUE_END => DebugItem::PrologueEnd { address },
                DBG_SET_EPILOGUE_BEGIN => DebugItem::EpilogueBegin { address },
                DBG_SET_FILE => {
                    let name = state.reader.read_uleb128p1()?;
                    DebugItem::SetSourceFile {
                        address,
                        source_file: self.string(name),
                    }
                }
                special => {
                    let adjusted = special - DBG_FIRST_SPECIAL;
                    state.address = state
                        .address
                        .wrapping_add(u32::from(adjusted / DBG_LINE_RANGE));
                    state.line = state
                        .line
                        .wrapping_add(DBG_LINE_BASE + i32::from(adjusted % DBG_LINE_RANGE));
                    DebugItem::LineNumber {
                        address: state.address,
                        line: state.line,
                    }
                }
            };

            return Ok(Some(item));
        }
    }
}

impl<'a, C: MethodContext + ?Sized> Iterator for DebugItems<'a, C> {
    type Item = Result<DebugItem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut state = match self.state.take() {
            Some(state) => state,
            None => {
                let offset = self.info.offset?;
                match self.start(offset) {
                    Ok(state) => state,
                    Err(error) => return self.fail(error),
                }
            }
        };

        if state.emitted >= self.info.config.max_debug_items {
            // Opcodes that emit nothing may still precede the END_SEQUENCE
            return match self.step(&mut state) {
                Ok(None) => {
                    self.done = true;
                    None
                }
                Ok(Some(_)) => self.fail(malformed_error!(
                    "Debug info exceeds {} items",
                    self.info.config.max_debug_items
                )),
                Err(error) => self.fail(error),
            };
        }

        match self.step(&mut state) {
            Ok(Some(item)) => {
                state.emitted += 1;
                self.state = Some(state);
                Some(Ok(item))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => self.fail(error),
        }
    }
}

impl<'a, C: MethodContext + ?Sized> DebugItems<'a, C> {
    fn fail<T>(&mut self, error: Error) -> Option<Result<T>> {
        self.done = true;
        log::debug!(
            "debug info at {:#x} failed to decode: {}",
            self.info.offset.unwrap_or_default(),
            error
        );
        Some(Err(error))
    }
}

impl<C: MethodContext + ?Sized> std::iter::FusedIterator for DebugItems<'_, C> {}
