//! Single-instruction decoding. Control instructions that refer to enclosing
//! blocks come back unlinked as an `Operator`; the linker resolves them.

use log::trace;

use crate::parser::utils::capacity;
use crate::parser::{ParseError, Reader};
use crate::tree::instructions::{
    Control, Instruction, Memory, MemoryImmediate, MemoryOp, Numeric, NumericOp, Parametric, Variable,
};
use crate::tree::language_types::BlockType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Control,
    Parametric,
    Variable,
    Memory,
    Numeric,
}

/// Inclusive opcode range of each family.
const FAMILIES: [(Family, u8, u8); 5] = [
    (Family::Control, 0x00, 0x11),
    (Family::Parametric, 0x1a, 0x1b),
    (Family::Variable, 0x20, 0x24),
    (Family::Memory, 0x28, 0x40),
    (Family::Numeric, 0x41, 0xbf),
];

impl Family {
    pub fn classify(opcode: u8) -> Option<Family> {
        FAMILIES
            .iter()
            .find(|&&(_, low, high)| low <= opcode && opcode <= high)
            .map(|&(family, _, _)| family)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    BrTable { targets: Vec<u32>, default: u32 },
    Plain(Instruction),
}

/// One decoded instruction along with where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub offset: usize,
    pub opcode: u8,
    pub operator: Operator,
}

pub fn read_operator(reader: &mut Reader) -> Result<Decoded, ParseError> {
    let offset = reader.position();
    let opcode = reader.read_u8()?;
    let illegal = ParseError::IllegalOpcode { offset, opcode };
    let operator = match Family::classify(opcode) {
        Some(Family::Control) => read_control(reader, opcode).ok_or(illegal)??,
        Some(Family::Parametric) => Operator::Plain(Instruction::Parametric(match opcode {
            0x1a => Parametric::Drop,
            _ => Parametric::Select,
        })),
        Some(Family::Variable) => {
            let index = reader.read_varuint32()?;
            Operator::Plain(Instruction::Variable(match opcode {
                0x20 => Variable::GetLocal(index),
                0x21 => Variable::SetLocal(index),
                0x22 => Variable::TeeLocal(index),
                0x23 => Variable::GetGlobal(index),
                _ => Variable::SetGlobal(index),
            }))
        }
        Some(Family::Memory) => Operator::Plain(Instruction::Memory(read_memory(reader, opcode)?)),
        Some(Family::Numeric) => Operator::Plain(Instruction::Numeric(read_numeric(reader, opcode).ok_or(illegal)??)),
        None => return Err(illegal),
    };
    trace!("0x{:02x} at {}: {:?}", opcode, offset, operator);
    Ok(Decoded { offset, opcode, operator })
}

fn read_reserved(reader: &mut Reader) -> Result<(), ParseError> {
    let offset = reader.position();
    match reader.read_u8()? {
        0 => Ok(()),
        _ => Err(ParseError::NonZeroReserved { offset }),
    }
}

/// `None` for the unassigned bytes inside the control range.
fn read_control(reader: &mut Reader, opcode: u8) -> Option<Result<Operator, ParseError>> {
    let plain = |control| Ok::<_, ParseError>(Operator::Plain(Instruction::Control(control)));
    let result = match opcode {
        0x00 => plain(Control::Unreachable),
        0x01 => plain(Control::Nop),
        0x02 => BlockType::parse(reader).map(Operator::Block),
        0x03 => BlockType::parse(reader).map(Operator::Loop),
        0x04 => BlockType::parse(reader).map(Operator::If),
        0x05 => Ok(Operator::Else),
        0x0b => Ok(Operator::End),
        0x0c => reader.read_varuint32().map(Operator::Br),
        0x0d => reader.read_varuint32().map(Operator::BrIf),
        0x0e => read_br_table(reader),
        0x0f => plain(Control::Return),
        0x10 => reader.read_varuint32().map(|index| Operator::Plain(Instruction::Control(Control::Call(index)))),
        0x11 => read_call_indirect(reader),
        _ => return None,
    };
    Some(result)
}

fn read_call_indirect(reader: &mut Reader) -> Result<Operator, ParseError> {
    let type_index = reader.read_varuint32()?;
    read_reserved(reader)?;
    Ok(Operator::Plain(Instruction::Control(Control::CallIndirect(type_index))))
}

fn read_br_table(reader: &mut Reader) -> Result<Operator, ParseError> {
    let count = reader.read_varuint32()?;
    let mut targets = Vec::with_capacity(capacity(count, reader));
    for _ in 0..count {
        targets.push(reader.read_varuint32()?);
    }
    let default = reader.read_varuint32()?;
    Ok(Operator::BrTable { targets, default })
}

fn read_memory(reader: &mut Reader, opcode: u8) -> Result<Memory, ParseError> {
    match opcode {
        0x3f => {
            read_reserved(reader)?;
            Ok(Memory::CurrentMemory)
        }
        0x40 => {
            read_reserved(reader)?;
            Ok(Memory::GrowMemory)
        }
        _ => {
            let op = MemoryOp::from_opcode(opcode).ok_or(ParseError::IllegalOpcode {
                offset: reader.position() - 1,
                opcode,
            })?;
            let flags = reader.read_varuint32()?;
            let offset = reader.read_varuint32()?;
            Ok(Memory::Access(op, MemoryImmediate { flags, offset }))
        }
    }
}

fn read_numeric(reader: &mut Reader, opcode: u8) -> Option<Result<Numeric, ParseError>> {
    let result = match opcode {
        0x41 => reader.read_varint32().map(Numeric::I32Const),
        0x42 => reader.read_varint64().map(Numeric::I64Const),
        0x43 => reader.read_f32().map(Numeric::F32Const),
        0x44 => reader.read_f64().map(Numeric::F64Const),
        _ => Ok(Numeric::Op(NumericOp::from_opcode(opcode)?)),
    };
    Some(result)
}
