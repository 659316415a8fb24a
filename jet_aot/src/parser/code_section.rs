use log::debug;

use crate::parser::linker::FunctionDecoder;
use crate::parser::{ParseError, Reader};
use crate::tree::instructions::FunctionBody;
use crate::tree::language_types::ValueType;
use crate::tree::Module;

/// Upper bound on the locals a single function may declare.
const MAX_LOCALS: u64 = 50_000;

pub fn parse(reader: &mut Reader, module: &mut Module) -> Result<(), ParseError> {
    let count = reader.read_varuint32()?;
    for index in 0..count {
        let body_size = reader.read_varuint32()? as usize;
        let body = reader.sub_reader(body_size)?;
        debug!("Decoding function body {} ({} bytes)", index, body_size);
        module.bodies.push(decode_function_body(body)?);
    }
    Ok(())
}

/// Decodes one body: the local declarations followed by the linked
/// instruction sequence, which must end exactly where the body does.
pub fn decode_function_body(mut reader: Reader) -> Result<FunctionBody, ParseError> {
    let group_count = reader.read_varuint32()?;
    let mut locals = vec![];
    let mut total: u64 = 0;
    for _ in 0..group_count {
        let offset = reader.position();
        let local_quantity = reader.read_varuint32()?;
        total += u64::from(local_quantity);
        if total > MAX_LOCALS {
            return Err(ParseError::TooManyLocals { offset, count: total });
        }
        let local_type = ValueType::parse(&mut reader)?;
        locals.extend(std::iter::repeat(local_type).take(local_quantity as usize));
    }
    let mut body = FunctionDecoder::new(&mut reader).decode()?;
    reader.expect_end(|offset| ParseError::UnexpectedTrailingBytes { offset })?;
    body.locals = locals;
    Ok(body)
}
