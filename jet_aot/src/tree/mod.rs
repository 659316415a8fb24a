pub mod data;
pub mod elements;
pub mod exports;
pub mod globals;
pub mod imports;
pub mod instructions;
pub mod language_types;

use self::data::DataSegment;
use self::elements::ElementSegment;
use self::exports::ExportEntry;
use self::globals::Global;
use self::imports::{ImportDesc, ImportEntry};
use self::instructions::FunctionBody;
use self::language_types::{FunctionType, GlobalType, MemoryType, TableType};

/// A fully decoded module. Built once by the parser and read-only afterwards.
///
/// Function and global indices span imports first, then definitions, the
/// same way the binary format numbers them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub version: u32,
    pub types: Vec<FunctionType>,
    pub imports: Vec<ImportEntry>,
    /// Type index of every function defined by the module.
    pub functions: Vec<u32>,
    pub table: Option<TableType>,
    pub memory: Option<MemoryType>,
    pub globals: Vec<Global>,
    pub exports: Vec<ExportEntry>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    pub bodies: Vec<FunctionBody>,
}

impl Module {
    pub fn imported_functions(&self) -> impl Iterator<Item = (&ImportEntry, u32)> {
        self.imports.iter().filter_map(|import| match import.desc {
            ImportDesc::Function(type_index) => Some((import, type_index)),
            _ => None,
        })
    }

    pub fn imported_globals(&self) -> impl Iterator<Item = (&ImportEntry, GlobalType)> {
        self.imports.iter().filter_map(|import| match import.desc {
            ImportDesc::Global(global_type) => Some((import, global_type)),
            _ => None,
        })
    }

    pub fn imported_function_count(&self) -> usize {
        self.imported_functions().count()
    }

    pub fn imported_global_count(&self) -> usize {
        self.imported_globals().count()
    }

    pub fn function_count(&self) -> usize {
        self.imported_function_count() + self.functions.len()
    }

    pub fn global_count(&self) -> usize {
        self.imported_global_count() + self.globals.len()
    }

    /// Type index of a function in the combined function index space.
    pub fn function_type_index(&self, index: u32) -> Option<u32> {
        let index = index as usize;
        let imported = self.imported_function_count();
        if index < imported {
            self.imported_functions().nth(index).map(|(_, type_index)| type_index)
        } else {
            self.functions.get(index - imported).copied()
        }
    }

    pub fn function_type(&self, index: u32) -> Option<&FunctionType> {
        self.function_type_index(index)
            .and_then(|type_index| self.types.get(type_index as usize))
    }

    pub fn global_type(&self, index: u32) -> Option<GlobalType> {
        let index = index as usize;
        let imported = self.imported_global_count();
        if index < imported {
            self.imported_globals().nth(index).map(|(_, global_type)| global_type)
        } else {
            self.globals.get(index - imported).map(|global| global.constraints)
        }
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some() || self.imports.iter().any(|i| matches!(i.desc, ImportDesc::Table(_)))
    }

    pub fn has_memory(&self) -> bool {
        self.memory.is_some() || self.imports.iter().any(|i| matches!(i.desc, ImportDesc::Memory(_)))
    }
}
