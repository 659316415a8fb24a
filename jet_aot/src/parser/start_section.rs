use crate::parser::{ParseError, Reader};
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    module.start = Some(reader.read_varuint32()?);
    Ok(())
}
