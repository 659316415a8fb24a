use crate::parser::utils::capacity;
use crate::parser::{ParseError, Reader};
use crate::tree::language_types::{
    BlockType, ExternalKind, FunctionType, GlobalType, MemoryType, ResizableLimits, TableType, ValueType,
};

const FUNC_FORM: u8 = 0x60;
const ANYFUNC: u8 = 0x70;
const EMPTY_BLOCK: u8 = 0x40;

impl ValueType {
    pub fn parse(reader: &mut Reader) -> Result<ValueType, ParseError> {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        ValueType::from_byte(byte).ok_or(ParseError::InvalidValueType { offset, byte })
    }
}

impl BlockType {
    pub fn parse(reader: &mut Reader) -> Result<BlockType, ParseError> {
        let offset = reader.position();
        match reader.read_u8()? {
            EMPTY_BLOCK => Ok(BlockType::Empty),
            byte => match ValueType::from_byte(byte) {
                Some(value_type) => Ok(BlockType::Value(value_type)),
                None => Err(ParseError::InvalidValueType { offset, byte }),
            },
        }
    }
}

impl FunctionType {
    pub fn parse(reader: &mut Reader) -> Result<FunctionType, ParseError> {
        let offset = reader.position();
        let form = reader.read_u8()?;
        if form != FUNC_FORM {
            return Err(ParseError::InvalidTypeForm { offset, form });
        }
        let param_count = reader.read_varuint32()?;
        let mut params = Vec::with_capacity(capacity(param_count, reader));
        for _ in 0..param_count {
            params.push(ValueType::parse(reader)?);
        }
        let return_offset = reader.position();
        let return_count = reader.read_varuint32()?;
        if return_count > 1 {
            return Err(ParseError::UnsupportedResultArity {
                offset: return_offset,
                count: return_count,
            });
        }
        let mut results = vec![];
        if return_count == 1 {
            results.push(ValueType::parse(reader)?);
        }
        Ok(FunctionType { params, results })
    }
}

impl ExternalKind {
    pub fn parse(reader: &mut Reader) -> Result<ExternalKind, ParseError> {
        let offset = reader.position();
        let kind = reader.read_u8()?;
        let index = reader.read_varuint32()?;
        match kind {
            0 => Ok(ExternalKind::Function(index)),
            1 => Ok(ExternalKind::Table(index)),
            2 => Ok(ExternalKind::Memory(index)),
            3 => Ok(ExternalKind::Global(index)),
            _ => Err(ParseError::InvalidExternalKind { offset, kind }),
        }
    }
}

impl ResizableLimits {
    pub fn parse(reader: &mut Reader) -> Result<ResizableLimits, ParseError> {
        let has_maximum = reader.read_varuint1()?;
        let initial = reader.read_varuint32()?;
        let maximum = if has_maximum {
            Some(reader.read_varuint32()?)
        } else {
            None
        };
        Ok(ResizableLimits { initial, maximum })
    }
}

impl TableType {
    pub fn parse(reader: &mut Reader) -> Result<TableType, ParseError> {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        if byte != ANYFUNC {
            return Err(ParseError::InvalidElementType { offset, byte });
        }
        Ok(TableType {
            limits: ResizableLimits::parse(reader)?,
        })
    }
}

impl MemoryType {
    pub fn parse(reader: &mut Reader) -> Result<MemoryType, ParseError> {
        Ok(MemoryType {
            limits: ResizableLimits::parse(reader)?,
        })
    }
}

impl GlobalType {
    pub fn parse(reader: &mut Reader) -> Result<GlobalType, ParseError> {
        let content_type = ValueType::parse(reader)?;
        let mutable = reader.read_varuint1()?;
        Ok(GlobalType { content_type, mutable })
    }
}
