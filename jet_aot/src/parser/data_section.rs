use crate::parser::utils::read_init_expr;
use crate::parser::{ParseError, Reader};
use crate::tree::data::DataSegment;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        let offset = reader.position();
        let index = reader.read_varuint32()?;
        if index != 0 {
            return Err(ParseError::InvalidIndex { offset, what: "memory", index });
        }
        let init_expr = read_init_expr(reader)?;
        let size = reader.read_varuint32()? as usize;
        let data = reader.read_bytes(size)?.to_vec();
        module.data.push(DataSegment {
            index,
            offset: init_expr,
            data,
        });
    }
    Ok(())
}
