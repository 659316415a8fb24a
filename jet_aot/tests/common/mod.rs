//! Assembles small binary modules for the integration tests.

#![allow(dead_code)]

use leb::WriteLEB;

pub const I32: u8 = 0x7f;
pub const I64: u8 = 0x7e;
pub const F32: u8 = 0x7d;
pub const F64: u8 = 0x7c;

pub fn varuint(out: &mut Vec<u8>, value: u64) {
    out.write_varuint(value).unwrap();
}

pub fn varint(out: &mut Vec<u8>, value: i64) {
    out.write_varint(value).unwrap();
}

fn vector(out: &mut Vec<u8>, items: &[Vec<u8>]) {
    varuint(out, items.len() as u64);
    for item in items {
        out.extend_from_slice(item);
    }
}

fn name(out: &mut Vec<u8>, text: &str) {
    varuint(out, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

pub struct Function {
    pub type_index: u32,
    pub locals: Vec<(u32, u8)>,
    pub code: Vec<u8>,
}

/// A module with one of each section at most, emitted in canonical order.
#[derive(Default)]
pub struct ModuleBuilder {
    types: Vec<Vec<u8>>,
    imports: Vec<Vec<u8>>,
    functions: Vec<Function>,
    memory: Option<(u32, Option<u32>)>,
    globals: Vec<Vec<u8>>,
    exports: Vec<Vec<u8>>,
    start: Option<u32>,
    data: Vec<Vec<u8>>,
}

impl ModuleBuilder {
    pub fn new() -> ModuleBuilder {
        ModuleBuilder::default()
    }

    pub fn signature(mut self, params: &[u8], results: &[u8]) -> ModuleBuilder {
        let mut entry = vec![0x60];
        varuint(&mut entry, params.len() as u64);
        entry.extend_from_slice(params);
        varuint(&mut entry, results.len() as u64);
        entry.extend_from_slice(results);
        self.types.push(entry);
        self
    }

    pub fn import_function(mut self, module: &str, field: &str, type_index: u32) -> ModuleBuilder {
        let mut entry = Vec::new();
        name(&mut entry, module);
        name(&mut entry, field);
        entry.push(0x00);
        varuint(&mut entry, u64::from(type_index));
        self.imports.push(entry);
        self
    }

    pub fn function(mut self, type_index: u32, locals: &[(u32, u8)], code: &[u8]) -> ModuleBuilder {
        self.functions.push(Function {
            type_index,
            locals: locals.to_vec(),
            code: code.to_vec(),
        });
        self
    }

    pub fn memory(mut self, initial: u32, maximum: Option<u32>) -> ModuleBuilder {
        self.memory = Some((initial, maximum));
        self
    }

    /// A mutable i32 global.
    pub fn global_i32(mut self, value: i32) -> ModuleBuilder {
        let mut entry = vec![I32, 0x01, 0x41];
        varint(&mut entry, i64::from(value));
        entry.push(0x0b);
        self.globals.push(entry);
        self
    }

    pub fn export_function(mut self, field: &str, index: u32) -> ModuleBuilder {
        let mut entry = Vec::new();
        name(&mut entry, field);
        entry.push(0x00);
        varuint(&mut entry, u64::from(index));
        self.exports.push(entry);
        self
    }

    pub fn start(mut self, index: u32) -> ModuleBuilder {
        self.start = Some(index);
        self
    }

    pub fn data(mut self, offset: i32, bytes: &[u8]) -> ModuleBuilder {
        let mut entry = vec![0x00, 0x41];
        varint(&mut entry, i64::from(offset));
        entry.push(0x0b);
        varuint(&mut entry, bytes.len() as u64);
        entry.extend_from_slice(bytes);
        self.data.push(entry);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = header();
        if !self.types.is_empty() {
            section(&mut out, 1, |payload| vector(payload, &self.types));
        }
        if !self.imports.is_empty() {
            section(&mut out, 2, |payload| vector(payload, &self.imports));
        }
        if !self.functions.is_empty() {
            section(&mut out, 3, |payload| {
                varuint(payload, self.functions.len() as u64);
                for function in &self.functions {
                    varuint(payload, u64::from(function.type_index));
                }
            });
        }
        if let Some((initial, maximum)) = self.memory {
            section(&mut out, 5, |payload| {
                varuint(payload, 1);
                limits(payload, initial, maximum);
            });
        }
        if !self.globals.is_empty() {
            section(&mut out, 6, |payload| vector(payload, &self.globals));
        }
        if !self.exports.is_empty() {
            section(&mut out, 7, |payload| vector(payload, &self.exports));
        }
        if let Some(start) = self.start {
            section(&mut out, 8, |payload| varuint(payload, u64::from(start)));
        }
        if !self.functions.is_empty() {
            section(&mut out, 10, |payload| {
                let bodies: Vec<Vec<u8>> = self.functions.iter().map(body).collect();
                vector(payload, &bodies);
            });
        }
        if !self.data.is_empty() {
            section(&mut out, 11, |payload| vector(payload, &self.data));
        }
        out
    }
}

pub fn header() -> Vec<u8> {
    vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
}

pub fn section(out: &mut Vec<u8>, id: u8, fill: impl FnOnce(&mut Vec<u8>)) {
    let mut payload = Vec::new();
    fill(&mut payload);
    out.push(id);
    varuint(out, payload.len() as u64);
    out.extend_from_slice(&payload);
}

fn limits(out: &mut Vec<u8>, initial: u32, maximum: Option<u32>) {
    match maximum {
        Some(maximum) => {
            out.push(0x01);
            varuint(out, u64::from(initial));
            varuint(out, u64::from(maximum));
        }
        None => {
            out.push(0x00);
            varuint(out, u64::from(initial));
        }
    }
}

/// A sized function body: local groups, then code.
fn body(function: &Function) -> Vec<u8> {
    let mut contents = Vec::new();
    varuint(&mut contents, function.locals.len() as u64);
    for &(count, value_type) in &function.locals {
        varuint(&mut contents, u64::from(count));
        contents.push(value_type);
    }
    contents.extend_from_slice(&function.code);
    let mut sized = Vec::new();
    varuint(&mut sized, contents.len() as u64);
    sized.extend_from_slice(&contents);
    sized
}
