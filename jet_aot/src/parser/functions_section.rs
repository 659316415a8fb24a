use crate::parser::utils::capacity;
use crate::parser::{ParseError, Reader};
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    module.functions.reserve(capacity(count, reader));
    for _ in 0..count {
        module.functions.push(reader.read_varuint32()?);
    }
    Ok(())
}
