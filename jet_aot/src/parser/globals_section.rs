use crate::parser::utils::read_init_expr;
use crate::parser::{ParseError, Reader};
use crate::tree::globals::Global;
use crate::tree::language_types::GlobalType;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        let constraints = GlobalType::parse(reader)?;
        module.globals.push(Global {
            constraints,
            value: read_init_expr(reader)?,
        });
    }
    Ok(())
}
