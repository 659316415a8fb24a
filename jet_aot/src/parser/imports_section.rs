use crate::parser::{ParseError, Reader};
use crate::tree::imports::{ImportDesc, ImportEntry};
use crate::tree::language_types::{GlobalType, MemoryType, TableType};
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        let entry_offset = reader.position();
        let module_name = reader.read_string()?;
        let field = reader.read_string()?;
        let kind_offset = reader.position();
        let desc = match reader.read_u8()? {
            0 => ImportDesc::Function(reader.read_varuint32()?),
            1 => {
                if module.has_table() {
                    return Err(ParseError::LimitMultiplicityViolation { offset: entry_offset, kind: "table" });
                }
                ImportDesc::Table(TableType::parse(reader)?)
            }
            2 => {
                if module.has_memory() {
                    return Err(ParseError::LimitMultiplicityViolation { offset: entry_offset, kind: "memory" });
                }
                ImportDesc::Memory(MemoryType::parse(reader)?)
            }
            3 => ImportDesc::Global(GlobalType::parse(reader)?),
            kind => return Err(ParseError::InvalidExternalKind { offset: kind_offset, kind }),
        };
        module.imports.push(ImportEntry {
            module: module_name,
            field,
            desc,
        });
    }
    Ok(())
}
