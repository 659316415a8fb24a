use crate::parser::utils::{capacity, read_init_expr};
use crate::parser::{ParseError, Reader};
use crate::tree::elements::ElementSegment;
use crate::tree::Module;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for _ in 0..count {
        let offset = reader.position();
        let index = reader.read_varuint32()?;
        if index != 0 {
            return Err(ParseError::InvalidIndex { offset, what: "table", index });
        }
        let init_expr = read_init_expr(reader)?;
        let num_elem = reader.read_varuint32()?;
        let mut elements = Vec::with_capacity(capacity(num_elem, reader));
        for _ in 0..num_elem {
            elements.push(reader.read_varuint32()?);
        }
        module.elements.push(ElementSegment {
            index,
            offset: init_expr,
            elements,
        });
    }
    Ok(())
}
