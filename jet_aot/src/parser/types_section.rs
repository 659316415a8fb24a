use crate::parser::utils::capacity;
use crate::parser::{ParseError, Reader};
use crate::tree::language_types::FunctionType;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    module.types.reserve(capacity(count, reader));
    for _ in 0..count {
        module.types.push(FunctionType::parse(reader)?);
    }
    Ok(())
}
