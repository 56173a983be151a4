//! Shared helpers for the integration tests: a small DEX image writer and a method context.

#![allow(dead_code)]

use dexscope::{metadata::method::AccessFlags, MethodContext};

/// Size of the DEX file header that precedes all data in an image.
pub const DEX_HEADER_SIZE: usize = 0x70;

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

pub fn sleb128(mut value: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

/// Encodes an `encoded_catch_handler_list` and returns it with the relative offset of
/// each record.
pub fn handler_list(records: &[(&[(u32, u32)], Option<u32>)]) -> (Vec<u8>, Vec<u16>) {
    let mut list = uleb128(records.len() as u32);
    let mut offsets = Vec::new();
    for (typed, catch_all) in records {
        offsets.push(list.len() as u16);
        let size = typed.len() as i32;
        list.extend(sleb128(if catch_all.is_some() { -size } else { size }));
        for (type_index, address) in typed.iter() {
            list.extend(uleb128(*type_index));
            list.extend(uleb128(*address));
        }
        if let Some(address) = catch_all {
            list.extend(uleb128(*address));
        }
    }
    (list, offsets)
}

/// One `code_item` to be placed in an image.
#[derive(Clone, Default)]
pub struct CodeItem {
    pub registers: u16,
    pub ins: u16,
    pub outs: u16,
    pub insns: Vec<u16>,
    pub tries: Vec<(u32, u16, u16)>,
    pub handlers: Vec<u8>,
    pub debug_info: Option<Vec<u8>>,
}

impl CodeItem {
    pub fn new(registers: u16, insns: &[u16]) -> Self {
        CodeItem {
            registers,
            insns: insns.to_vec(),
            ..CodeItem::default()
        }
    }

    pub fn with_try(mut self, start: u32, count: u16, handler_offset: u16) -> Self {
        self.tries.push((start, count, handler_offset));
        self
    }

    pub fn with_handlers(mut self, list: Vec<u8>) -> Self {
        self.handlers = list;
        self
    }

    pub fn with_debug_info(mut self, bytes: Vec<u8>) -> Self {
        self.debug_info = Some(bytes);
        self
    }

    /// Appends the item to `image`, its debug info first, and returns the code offset.
    pub fn write_to(&self, image: &mut Vec<u8>) -> usize {
        let debug_offset = match &self.debug_info {
            Some(bytes) => {
                let offset = image.len() as u32;
                image.extend_from_slice(bytes);
                offset
            }
            None => 0,
        };

        while image.len() % 4 != 0 {
            image.push(0);
        }
        let code_offset = image.len();

        image.extend_from_slice(&self.registers.to_le_bytes());
        image.extend_from_slice(&self.ins.to_le_bytes());
        image.extend_from_slice(&self.outs.to_le_bytes());
        image.extend_from_slice(&(self.tries.len() as u16).to_le_bytes());
        image.extend_from_slice(&debug_offset.to_le_bytes());
        image.extend_from_slice(&(self.insns.len() as u32).to_le_bytes());
        for unit in &self.insns {
            image.extend_from_slice(&unit.to_le_bytes());
        }

        if !self.tries.is_empty() {
            while image.len() % 4 != 0 {
                image.push(0);
            }
            for (start, count, handler_offset) in &self.tries {
                image.extend_from_slice(&start.to_le_bytes());
                image.extend_from_slice(&count.to_le_bytes());
                image.extend_from_slice(&handler_offset.to_le_bytes());
            }
            image.extend_from_slice(&self.handlers);
        }

        code_offset
    }
}

/// Builds an image of a DEX header followed by `items`; returns it with the code offsets.
pub fn image(items: &[CodeItem]) -> (Vec<u8>, Vec<usize>) {
    let mut data = b"dex\n035\0".to_vec();
    data.resize(DEX_HEADER_SIZE, 0xCD);

    let offsets = items.iter().map(|item| item.write_to(&mut data)).collect();
    (data, offsets)
}

/// The method a code item belongs to, with the pools of its image.
#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: AccessFlags,
    pub class: String,
    pub parameters: Vec<String>,
    pub strings: Vec<String>,
    pub types: Vec<String>,
}

impl Method {
    pub fn new(access_flags: AccessFlags, class: &str, parameters: &[&str]) -> Self {
        Method {
            access_flags,
            class: class.to_string(),
            parameters: parameters.iter().map(ToString::to_string).collect(),
            strings: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn with_strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(ToString::to_string).collect();
        self
    }
}

impl MethodContext for Method {
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
