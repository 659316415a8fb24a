//! The "jet" target: a typed, label-based stack bytecode in the style of a
//! managed VM's intermediate language.

use std::fmt;

use crate::tree::data::DataSegment;
use crate::tree::elements::ElementSegment;
use crate::tree::exports::ExportEntry;
use crate::tree::globals::Global;
use crate::tree::imports::{ImportDesc, ImportEntry};
use crate::tree::language_types::{ExternalKind, FunctionType, MemoryType, TableType, ValueType};

pub mod builder;
pub mod ops;

pub use self::builder::JetBuilder;
pub use self::ops::{Op, Target};

/// One compiled function body.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub index: u32,
    pub signature: FunctionType,
    pub locals: Vec<ValueType>,
    pub code: Vec<Op>,
}

/// Everything needed to instantiate and run a compiled module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assembly {
    pub name: String,
    pub types: Vec<FunctionType>,
    pub imports: Vec<ImportEntry>,
    pub table: Option<TableType>,
    pub memory: Option<MemoryType>,
    pub globals: Vec<Global>,
    pub exports: Vec<ExportEntry>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    /// Defined functions, numbered after the imported ones.
    pub functions: Vec<CompiledFunction>,
}

impl Assembly {
    pub fn imported_function_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|import| matches!(import.desc, ImportDesc::Function(_)))
            .count()
    }

    pub fn imported_function(&self, index: u32) -> Option<(&ImportEntry, u32)> {
        self.imports
            .iter()
            .filter_map(|import| match import.desc {
                ImportDesc::Function(type_index) => Some((import, type_index)),
                _ => None,
            })
            .nth(index as usize)
    }

    pub fn function(&self, index: u32) -> Option<&CompiledFunction> {
        let imported = self.imported_function_count();
        (index as usize)
            .checked_sub(imported)
            .and_then(|position| self.functions.get(position))
    }

    pub fn signature(&self, index: u32) -> Option<&FunctionType> {
        match self.imported_function(index) {
            Some((_, type_index)) => self.types.get(type_index as usize),
            None => self.function(index).map(|function| &function.signature),
        }
    }

    pub fn export(&self, name: &str) -> Option<ExternalKind> {
        self.exports
            .iter()
            .find(|export| export.field == name)
            .map(|export| export.kind)
    }
}

fn write_limits(f: &mut fmt::Formatter, initial: u32, maximum: Option<u32>) -> fmt::Result {
    write!(f, "{}", initial)?;
    if let Some(maximum) = maximum {
        write!(f, " max {}", maximum)?;
    }
    Ok(())
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, ".assembly {}", self.name)?;
        for import in &self.imports {
            write!(f, ".import \"{}\" \"{}\" ", import.module, import.field)?;
            match import.desc {
                ImportDesc::Function(type_index) => match self.types.get(type_index as usize) {
                    Some(signature) => writeln!(f, "func {}", signature)?,
                    None => writeln!(f, "func type{}", type_index)?,
                },
                ImportDesc::Table(table) => {
                    f.write_str("table ")?;
                    write_limits(f, table.limits.initial, table.limits.maximum)?;
                    writeln!(f)?;
                }
                ImportDesc::Memory(memory) => {
                    f.write_str("memory ")?;
                    write_limits(f, memory.limits.initial, memory.limits.maximum)?;
                    writeln!(f)?;
                }
                ImportDesc::Global(global) => {
                    writeln!(f, "global {}{}", if global.mutable { "mut " } else { "" }, global.content_type)?
                }
            }
        }
        if let Some(memory) = self.memory {
            f.write_str(".memory ")?;
            write_limits(f, memory.limits.initial, memory.limits.maximum)?;
            writeln!(f)?;
        }
        if let Some(table) = self.table {
            f.write_str(".table ")?;
            write_limits(f, table.limits.initial, table.limits.maximum)?;
            writeln!(f)?;
        }
        for (index, global) in self.globals.iter().enumerate() {
            writeln!(
                f,
                ".global {} {}{} = {:?}",
                index,
                if global.constraints.mutable { "mut " } else { "" },
                global.constraints.content_type,
                global.value
            )?;
        }
        for export in &self.exports {
            writeln!(f, ".export \"{}\" {:?}", export.field, export.kind)?;
        }
        if let Some(start) = self.start {
            writeln!(f, ".entrypoint func{}", start)?;
        }
        for element in &self.elements {
            writeln!(f, ".elem {:?} {:?}", element.offset, element.elements)?;
        }
        for data in &self.data {
            writeln!(f, ".data {:?} {} bytes", data.offset, data.data.len())?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

impl fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, ".method func{} {}", self.index, self.signature)?;
        writeln!(f, "{{")?;
        if !self.locals.is_empty() {
            f.write_str("  .locals (")?;
            for (i, local) in self.locals.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", local)?;
            }
            writeln!(f, ")")?;
        }
        for (position, op) in self.code.iter().enumerate() {
            writeln!(f, "  {}: {}", Target(position as u32), op)?;
        }
        writeln!(f, "}}")
    }
}
