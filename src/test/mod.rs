//! Shared helpers for the unit tests: a code record assembler and a method context.

use crate::metadata::method::{AccessFlags, MethodContext};

/// Encodes `value` as unsigned LEB128.
pub fn uleb128(mut value: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

/// Encodes `value` as signed LEB128.
pub fn sleb128(mut value: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

enum HandlerRef {
    Record(usize),
    Offset(u16),
}

/// Assembles a `code_item` byte by byte.
///
/// Layout: header, instructions, padding to 4 bytes (only with try items), try items,
/// handler list, then the debug info if one was given.
#[derive(Default)]
pub struct CodeItemBuilder {
    registers: u16,
    ins: u16,
    outs: u16,
    tries_size: Option<u16>,
    debug_info_offset: u32,
    debug_info: Option<Vec<u8>>,
    instructions: Vec<u16>,
    handlers: Vec<(Vec<(u32, u32)>, Option<u32>)>,
    raw_handler_list: Option<Vec<u8>>,
    tries: Vec<(u32, u16, HandlerRef)>,
}

impl CodeItemBuilder {
    /// Create an empty code record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `registers_size`
    pub fn registers(mut self, count: u16) -> Self {
        self.registers = count;
        self
    }

    /// Set `ins_size`
    pub fn ins(mut self, count: u16) -> Self {
        self.ins = count;
        self
    }

    /// Set `outs_size`
    pub fn outs(mut self, count: u16) -> Self {
        self.outs = count;
        self
    }

    /// Override `tries_size` regardless of the try items added
    pub fn tries_size(mut self, count: u16) -> Self {
        self.tries_size = Some(count);
        self
    }

    /// Set `debug_info_off` to a fixed value
    pub fn debug_info_offset(mut self, offset: u32) -> Self {
        self.debug_info_offset = offset;
        self
    }

    /// Append a debug info item and point `debug_info_off` at it
    pub fn debug_info(mut self, bytes: &[u8]) -> Self {
        self.debug_info = Some(bytes.to_vec());
        self
    }

    /// Set the instruction code units
    pub fn instructions(mut self, units: &[u16]) -> Self {
        self.instructions = units.to_vec();
        self
    }

    /// Add a handler record with typed `(type_idx, addr)` pairs and an optional catch-all
    pub fn catch_handler(mut self, typed: &[(u32, u32)], catch_all: Option<u32>) -> Self {
        self.handlers.push((typed.to_vec(), catch_all));
        self
    }

    /// Use `bytes` as the complete handler list, size prefix included
    pub fn raw_handler_list(mut self, bytes: &[u8]) -> Self {
        self.raw_handler_list = Some(bytes.to_vec());
        self
    }

    /// Add a try item referring to the handler record added as number `record`
    pub fn try_block(mut self, start: u32, count: u16, record: usize) -> Self {
        self.tries.push((start, count, HandlerRef::Record(record)));
        self
    }

    /// Add a try item with a literal `handler_off`
    pub fn try_block_raw(mut self, start: u32, count: u16, handler_offset: u16) -> Self {
        self.tries
            .push((start, count, HandlerRef::Offset(handler_offset)));
        self
    }

    /// Assemble the record at offset 0
    pub fn build(self) -> Vec<u8> {
        self.build_at(&[])
    }

    /// Assemble the record right after `prefix`
    pub fn build_at(self, prefix: &[u8]) -> Vec<u8> {
        let mut data = prefix.to_vec();
        let header_at = data.len();

        let tries_size = self.tries_size.unwrap_or(self.tries.len() as u16);
        data.extend_from_slice(&self.registers.to_le_bytes());
        data.extend_from_slice(&self.ins.to_le_bytes());
        data.extend_from_slice(&self.outs.to_le_bytes());
        data.extend_from_slice(&tries_size.to_le_bytes());
        data.extend_from_slice(&self.debug_info_offset.to_le_bytes());
        data.extend_from_slice(&(self.instructions.len() as u32).to_le_bytes());
        for unit in &self.instructions {
            data.extend_from_slice(&unit.to_le_bytes());
        }

        if !self.tries.is_empty() || self.raw_handler_list.is_some() {
            while data.len() % 4 != 0 {
                data.push(0);
            }

            let mut list = uleb128(self.handlers.len() as u32);
            let mut records = Vec::new();
            for (typed, catch_all) in &self.handlers {
                records.push(list.len() as u16);
                let size = typed.len() as i32;
                list.extend(sleb128(if catch_all.is_some() { -size } else { size }));
                for (type_index, address) in typed {
                    list.extend(uleb128(*type_index));
                    list.extend(uleb128(*address));
                }
                if let Some(address) = catch_all {
                    list.extend(uleb128(*address));
                }
            }
            let list = self.raw_handler_list.unwrap_or(list);

            for (start, count, handler) in &self.tries {
                let handler_offset = match handler {
                    HandlerRef::Record(record) => records[*record],
                    HandlerRef::Offset(offset) => *offset,
                };
                data.extend_from_slice(&start.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
                data.extend_from_slice(&handler_offset.to_le_bytes());
            }
            data.extend(list);
        }

        if let Some(debug_info) = self.debug_info {
            let offset = data.len() as u32;
            data[header_at + 8..header_at + 12].copy_from_slice(&offset.to_le_bytes());
            data.extend(debug_info);
        }

        data
    }
}

/// A [`MethodContext`] with literal pools, static by default.
#[derive(Debug, Clone)]
pub struct TestContext {
    access_flags: AccessFlags,
    class: String,
    parameters: Vec<String>,
    strings: Vec<String>,
    types: Vec<String>,
}

impl TestContext {
    /// A static method `LTest;->m()` with empty pools
    pub fn new() -> Self {
        TestContext {
            access_flags: AccessFlags::STATIC,
            class: "LTest;".to_string(),
            parameters: Vec::new(),
            strings: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Set the access flags
    pub fn with_access_flags(mut self, flags: AccessFlags) -> Self {
        self.access_flags = flags;
        self
    }

    /// Set the defining class descriptor
    pub fn with_class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    /// Set the parameter type descriptors
    pub fn with_parameters(mut self, parameters: &[&str]) -> Self {
        self.parameters = parameters.iter().map(ToString::to_string).collect();
        self
    }

    /// Set the string pool
    pub fn with_strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(ToString::to_string).collect();
        self
    }

    /// Set the type pool
    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(ToString::to_string).collect();
        self
    }
}

impl MethodContext for TestContext {
    fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    fn defining_class(&self) -> &str {
        &self.class
    }

    fn parameter_types(&self) -> &[String] {
        &self.parameters
    }

    fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    fn type_descriptor(&self, index: u32) -> Option<&str> {
        self.types.get(index as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_encoding() {
        assert_eq!(uleb128(0), vec![0x00]);
        assert_eq!(uleb128(127), vec![0x7F]);
        assert_eq!(uleb128(128), vec![0x80, 0x01]);
        assert_eq!(sleb128(-1), vec![0x7F]);
        assert_eq!(sleb128(-128), vec![0x80, 0x7F]);
        assert_eq!(sleb128(64), vec![0xC0, 0x00]);
    }

    #[test]
    fn test_handler_offsets() {
        let data = CodeItemBuilder::new()
            .instructions(&[0x0000])
            .catch_handler(&[(1, 2)], None)
            .catch_handler(&[], Some(3))
            .try_block(0, 1, 1)
            .build();

        // header 16 + one unit 2, padded to 20, one try item
        assert_eq!(&data[26..28], &[4, 0]);
        assert_eq!(&data[28..], &[2, 1, 1, 2, 0, 3]);
    }
}
