use std::collections::HashMap;

use log::{debug, info};
use thiserror::Error;

use crate::tree::Module;

pub mod reader;
pub mod instructions;
pub mod linker;
mod language_types;
mod utils;

mod types_section;
mod imports_section;
mod functions_section;
mod tables_section;
mod memory_section;
mod globals_section;
mod exports_section;
mod start_section;
mod elements_section;
mod code_section;
mod data_section;

pub use self::code_section::decode_function_body;
pub use self::reader::Reader;

const MAGIC_NUMBER: u32 = 0x6d736100;
const VERSION: u32 = 0x1;

pub mod section {
    pub const CUSTOM: u8 = 0;
    pub const TYPE: u8 = 1;
    pub const IMPORT: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const TABLE: u8 = 4;
    pub const MEMORY: u8 = 5;
    pub const GLOBAL: u8 = 6;
    pub const EXPORT: u8 = 7;
    pub const START: u8 = 8;
    pub const ELEMENT: u8 = 9;
    pub const CODE: u8 = 10;
    pub const DATA: u8 = 11;
}

/// Every decode failure is fatal to the whole module and names the absolute
/// byte offset where it was detected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("bad module header at offset {offset}: expected \\0asm version 1")]
    BadHeader { offset: usize },
    #[error("malformed varint{bits} at offset {offset}")]
    MalformedVarint { offset: usize, bits: u32 },
    #[error("illegal opcode 0x{opcode:02x} at offset {offset}")]
    IllegalOpcode { offset: usize, opcode: u8 },
    #[error("if block terminated by opcode 0x{opcode:02x} at offset {offset}, expected else or end")]
    MalformedIfBlock { offset: usize, opcode: u8 },
    #[error("branch at offset {offset} targets depth {depth} with {open} block(s) open")]
    InvalidBranchTarget { offset: usize, depth: u32, open: usize },
    #[error("function body has trailing bytes at offset {offset}")]
    UnexpectedTrailingBytes { offset: usize },
    #[error("function type at offset {offset} declares {count} results, at most 1 is supported")]
    UnsupportedResultArity { offset: usize, count: u32 },
    #[error("more than one {kind} declared at offset {offset}")]
    LimitMultiplicityViolation { offset: usize, kind: &'static str },
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("unknown section id {id} at offset {offset}")]
    UnknownSectionId { offset: usize, id: u8 },
    #[error("section {id} at offset {offset} is out of order or repeated")]
    SectionOutOfOrder { offset: usize, id: u8 },
    #[error("section {id} payload not fully consumed, stopped at offset {offset}")]
    SectionLengthMismatch { offset: usize, id: u8 },
    #[error("invalid value type 0x{byte:02x} at offset {offset}")]
    InvalidValueType { offset: usize, byte: u8 },
    #[error("invalid type form 0x{form:02x} at offset {offset}")]
    InvalidTypeForm { offset: usize, form: u8 },
    #[error("invalid element type 0x{byte:02x} at offset {offset}")]
    InvalidElementType { offset: usize, byte: u8 },
    #[error("invalid external kind {kind} at offset {offset}")]
    InvalidExternalKind { offset: usize, kind: u8 },
    #[error("{what} index {index} at offset {offset} must be 0")]
    InvalidIndex { offset: usize, what: &'static str, index: u32 },
    #[error("reserved byte at offset {offset} must be zero")]
    NonZeroReserved { offset: usize },
    #[error("else at offset {offset} does not close an if block")]
    UnexpectedElse { offset: usize },
    #[error("blocks nested too deeply at offset {offset}")]
    NestingTooDeep { offset: usize },
    #[error("invalid constant expression opcode 0x{opcode:02x} at offset {offset}")]
    InvalidInitExpression { offset: usize, opcode: u8 },
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("too many locals ({count}) declared at offset {offset}")]
    TooManyLocals { offset: usize, count: u64 },
}

impl ParseError {
    pub fn offset(&self) -> usize {
        match *self {
            ParseError::BadHeader { offset }
            | ParseError::MalformedVarint { offset, .. }
            | ParseError::IllegalOpcode { offset, .. }
            | ParseError::MalformedIfBlock { offset, .. }
            | ParseError::InvalidBranchTarget { offset, .. }
            | ParseError::UnexpectedTrailingBytes { offset }
            | ParseError::UnsupportedResultArity { offset, .. }
            | ParseError::LimitMultiplicityViolation { offset, .. }
            | ParseError::UnexpectedEof { offset }
            | ParseError::UnknownSectionId { offset, .. }
            | ParseError::SectionOutOfOrder { offset, .. }
            | ParseError::SectionLengthMismatch { offset, .. }
            | ParseError::InvalidValueType { offset, .. }
            | ParseError::InvalidTypeForm { offset, .. }
            | ParseError::InvalidElementType { offset, .. }
            | ParseError::InvalidExternalKind { offset, .. }
            | ParseError::InvalidIndex { offset, .. }
            | ParseError::NonZeroReserved { offset }
            | ParseError::UnexpectedElse { offset }
            | ParseError::NestingTooDeep { offset }
            | ParseError::InvalidInitExpression { offset, .. }
            | ParseError::InvalidUtf8 { offset }
            | ParseError::TooManyLocals { offset, .. } => offset,
        }
    }
}

type SectionParser = fn(&mut Reader, &mut Module) -> Result<(), ParseError>;

/// Splits a module into sections and hands each payload to its reader.
pub struct ModuleParser {
    sections: HashMap<u8, SectionParser>,
}

impl Default for ModuleParser {
    fn default() -> ModuleParser {
        let mut sections: HashMap<u8, SectionParser> = HashMap::new();
        sections.insert(section::TYPE, types_section::parse);
        sections.insert(section::IMPORT, imports_section::parse);
        sections.insert(section::FUNCTION, functions_section::parse);
        sections.insert(section::TABLE, tables_section::parse);
        sections.insert(section::MEMORY, memory_section::parse);
        sections.insert(section::GLOBAL, globals_section::parse);
        sections.insert(section::EXPORT, exports_section::parse);
        sections.insert(section::START, start_section::parse);
        sections.insert(section::ELEMENT, elements_section::parse);
        sections.insert(section::CODE, code_section::parse);
        sections.insert(section::DATA, data_section::parse);
        ModuleParser { sections }
    }
}

impl ModuleParser {
    pub fn parse_module(&self, bytes: &[u8]) -> Result<Module, ParseError> {
        info!("Parsing WebAssembly module ({} bytes)", bytes.len());
        let mut reader = Reader::new(bytes);
        let magic_number = reader
            .read_u32_le()
            .map_err(|_| ParseError::BadHeader { offset: 0 })?;
        if magic_number != MAGIC_NUMBER {
            return Err(ParseError::BadHeader { offset: 0 });
        }
        let version = reader
            .read_u32_le()
            .map_err(|_| ParseError::BadHeader { offset: 4 })?;
        if version != VERSION {
            return Err(ParseError::BadHeader { offset: 4 });
        }

        let mut module = Module {
            version,
            ..Module::default()
        };
        self.parse_sections(&mut reader, &mut module)?;
        Ok(module)
    }

    fn parse_sections(&self, reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
        let mut last_id = section::CUSTOM;
        while !reader.is_empty() {
            let offset = reader.position();
            let id = reader.read_varuint7()?;
            let length = reader.read_varuint32()? as usize;
            let mut payload = reader.sub_reader(length)?;
            if id == section::CUSTOM {
                debug!("Skipping custom section at offset {} ({} bytes)", offset, length);
                continue;
            }
            let parser_function = match self.sections.get(&id) {
                Some(func) => func,
                None => return Err(ParseError::UnknownSectionId { offset, id }),
            };
            if id <= last_id {
                return Err(ParseError::SectionOutOfOrder { offset, id });
            }
            last_id = id;
            debug!("Parsing section {} at offset {} ({} bytes)", id, offset, length);
            parser_function(&mut payload, module)?;
            payload.expect_end(|offset| ParseError::SectionLengthMismatch { offset, id })?;
        }
        Ok(())
    }
}

/// Decodes a complete module binary.
pub fn parse(bytes: &[u8]) -> Result<Module, ParseError> {
    ModuleParser::default().parse_module(bytes)
}
