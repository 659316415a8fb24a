use crate::parser::{ParseError, Reader};
use crate::tree::language_types::InitExpression;

const END: u8 = 0x0b;

/// A constant expression: one `*.const` or `get_global` followed by `end`.
pub fn read_init_expr(reader: &mut Reader) -> Result<InitExpression, ParseError> {
    let offset = reader.position();
    let expr = match reader.read_u8()? {
        0x41 => InitExpression::I32Const(reader.read_varint32()?),
        0x42 => InitExpression::I64Const(reader.read_varint64()?),
        0x43 => InitExpression::F32Const(reader.read_f32()?),
        0x44 => InitExpression::F64Const(reader.read_f64()?),
        0x23 => InitExpression::GetGlobal(reader.read_varuint32()?),
        opcode => return Err(ParseError::InvalidInitExpression { offset, opcode }),
    };
    let offset = reader.position();
    match reader.read_u8()? {
        END => Ok(expr),
        opcode => Err(ParseError::InvalidInitExpression { offset, opcode }),
    }
}

/// Caps a preallocation by what the remaining input could possibly hold.
pub fn capacity(count: u32, reader: &Reader) -> usize {
    (count as usize).min(reader.remaining())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_expressions() {
        let bytes = [0x41, 0x7f, 0x0b, 0x23, 0x02, 0x0b];
        let mut reader = Reader::new(&bytes);
        assert_eq!(read_init_expr(&mut reader).unwrap(), InitExpression::I32Const(-1));
        assert_eq!(read_init_expr(&mut reader).unwrap(), InitExpression::GetGlobal(2));
    }

    #[test]
    fn missing_end_is_rejected() {
        let bytes = [0x41, 0x00, 0x41];
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            read_init_expr(&mut reader),
            Err(ParseError::InvalidInitExpression { offset: 2, opcode: 0x41 })
        ));
    }

    #[test]
    fn non_constant_opcode_is_rejected() {
        let bytes = [0x6a, 0x0b];
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            read_init_expr(&mut reader),
            Err(ParseError::InvalidInitExpression { offset: 0, opcode: 0x6a })
        ));
    }
}
