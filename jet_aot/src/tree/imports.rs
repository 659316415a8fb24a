use crate::tree::language_types::{GlobalType, MemoryType, TableType};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportEntry {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImportDesc {
    /// Index into the type section.
    Function(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}
