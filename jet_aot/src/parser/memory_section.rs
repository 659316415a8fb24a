use crate::parser::{ParseError, Reader};
use crate::tree::language_types::MemoryType;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let offset = reader.position();
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        if module.has_memory() {
            return Err(ParseError::LimitMultiplicityViolation { offset, kind: "memory" });
        }
        module.memory = Some(MemoryType::parse(reader)?);
    }
    Ok(())
}
