use crate::parser::{ParseError, Reader};
use crate::tree::exports::ExportEntry;
use crate::tree::language_types::ExternalKind;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        let field = reader.read_string()?;
        let kind = ExternalKind::parse(reader)?;
        module.exports.push(ExportEntry { field, kind });
    }
    Ok(())
}
