use crate::parser::{ParseError, Reader};
use crate::tree::language_types::TableType;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let offset = reader.position();
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        if module.has_table() {
            return Err(ParseError::LimitMultiplicityViolation { offset, kind: "table" });
        }
        module.table = Some(TableType::parse(reader)?);
    }
    Ok(())
}
