//! Page-granular linear memory and the typed accessors jet code calls into.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::runtime::Trap;
use crate::tree::instructions::MemoryOp;
use crate::tree::language_types::ValueType;
use crate::value::Value;

pub const PAGE_SIZE: usize = 65536;
/// Largest page count a 32-bit address space can hold.
pub const MAX_PAGES: u32 = 65536;

/// A typed load or store, selected by memory opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    Load32BitAsSigned32,
    Load64BitAsSigned64,
    LoadSingle,
    LoadDouble,
    Load8BitAsSigned32,
    Load8BitAsUnsigned32,
    Load16BitAsSigned32,
    Load16BitAsUnsigned32,
    Load8BitAsSigned64,
    Load8BitAsUnsigned64,
    Load16BitAsSigned64,
    Load16BitAsUnsigned64,
    Load32BitAsSigned64,
    Load32BitAsUnsigned64,
    Store32BitFrom32,
    Store64BitFrom64,
    StoreSingle,
    StoreDouble,
    Store8BitFrom32,
    Store16BitFrom32,
    Store8BitFrom64,
    Store16BitFrom64,
    Store32BitFrom64,
}

impl Accessor {
    pub fn for_op(op: MemoryOp) -> Accessor {
        match op {
            MemoryOp::I32Load => Accessor::Load32BitAsSigned32,
            MemoryOp::I64Load => Accessor::Load64BitAsSigned64,
            MemoryOp::F32Load => Accessor::LoadSingle,
            MemoryOp::F64Load => Accessor::LoadDouble,
            MemoryOp::I32Load8S => Accessor::Load8BitAsSigned32,
            MemoryOp::I32Load8U => Accessor::Load8BitAsUnsigned32,
            MemoryOp::I32Load16S => Accessor::Load16BitAsSigned32,
            MemoryOp::I32Load16U => Accessor::Load16BitAsUnsigned32,
            MemoryOp::I64Load8S => Accessor::Load8BitAsSigned64,
            MemoryOp::I64Load8U => Accessor::Load8BitAsUnsigned64,
            MemoryOp::I64Load16S => Accessor::Load16BitAsSigned64,
            MemoryOp::I64Load16U => Accessor::Load16BitAsUnsigned64,
            MemoryOp::I64Load32S => Accessor::Load32BitAsSigned64,
            MemoryOp::I64Load32U => Accessor::Load32BitAsUnsigned64,
            MemoryOp::I32Store => Accessor::Store32BitFrom32,
            MemoryOp::I64Store => Accessor::Store64BitFrom64,
            MemoryOp::F32Store => Accessor::StoreSingle,
            MemoryOp::F64Store => Accessor::StoreDouble,
            MemoryOp::I32Store8 => Accessor::Store8BitFrom32,
            MemoryOp::I32Store16 => Accessor::Store16BitFrom32,
            MemoryOp::I64Store8 => Accessor::Store8BitFrom64,
            MemoryOp::I64Store16 => Accessor::Store16BitFrom64,
            MemoryOp::I64Store32 => Accessor::Store32BitFrom64,
        }
    }

    pub fn is_store(self) -> bool {
        matches!(
            self,
            Accessor::Store32BitFrom32
                | Accessor::Store64BitFrom64
                | Accessor::StoreSingle
                | Accessor::StoreDouble
                | Accessor::Store8BitFrom32
                | Accessor::Store16BitFrom32
                | Accessor::Store8BitFrom64
                | Accessor::Store16BitFrom64
                | Accessor::Store32BitFrom64
        )
    }

    /// Bytes touched in memory.
    pub fn width(self) -> usize {
        match self {
            Accessor::Load8BitAsSigned32
            | Accessor::Load8BitAsUnsigned32
            | Accessor::Load8BitAsSigned64
            | Accessor::Load8BitAsUnsigned64
            | Accessor::Store8BitFrom32
            | Accessor::Store8BitFrom64 => 1,
            Accessor::Load16BitAsSigned32
            | Accessor::Load16BitAsUnsigned32
            | Accessor::Load16BitAsSigned64
            | Accessor::Load16BitAsUnsigned64
            | Accessor::Store16BitFrom32
            | Accessor::Store16BitFrom64 => 2,
            Accessor::Load32BitAsSigned32
            | Accessor::LoadSingle
            | Accessor::Load32BitAsSigned64
            | Accessor::Load32BitAsUnsigned64
            | Accessor::Store32BitFrom32
            | Accessor::StoreSingle
            | Accessor::Store32BitFrom64 => 4,
            Accessor::Load64BitAsSigned64
            | Accessor::LoadDouble
            | Accessor::Store64BitFrom64
            | Accessor::StoreDouble => 8,
        }
    }

    /// Type of the value loaded, or of the value a store consumes.
    pub fn value_type(self) -> ValueType {
        match self {
            Accessor::LoadSingle | Accessor::StoreSingle => ValueType::F32,
            Accessor::LoadDouble | Accessor::StoreDouble => ValueType::F64,
            Accessor::Load32BitAsSigned32
            | Accessor::Load8BitAsSigned32
            | Accessor::Load8BitAsUnsigned32
            | Accessor::Load16BitAsSigned32
            | Accessor::Load16BitAsUnsigned32
            | Accessor::Store32BitFrom32
            | Accessor::Store8BitFrom32
            | Accessor::Store16BitFrom32 => ValueType::I32,
            _ => ValueType::I64,
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One growable little-endian byte buffer, sized in 64 KiB pages.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    maximum: u32,
}

impl LinearMemory {
    pub fn new(initial_pages: u32, maximum: Option<u32>) -> Result<LinearMemory, Trap> {
        let maximum = maximum.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        if initial_pages > maximum {
            return Err(Trap::MemoryLimitExceeded { pages: initial_pages, maximum });
        }
        Ok(LinearMemory {
            bytes: vec![0; initial_pages as usize * PAGE_SIZE],
            maximum,
        })
    }

    pub fn current_pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Grows by `delta` pages and returns the previous page count, or `None`
    /// (leaving memory untouched) when that would pass the maximum.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let old_pages = self.current_pages();
        let new_pages = old_pages.checked_add(delta)?;
        if new_pages > self.maximum {
            debug!("Refusing to grow memory from {} by {} pages", old_pages, delta);
            return None;
        }
        let new_len = new_pages as usize * PAGE_SIZE;
        if self.bytes.try_reserve_exact(new_len - self.bytes.len()).is_err() {
            debug!("Could not allocate {} pages", new_pages);
            return None;
        }
        self.bytes.resize(new_len, 0);
        debug!("Grew memory from {} to {} pages", old_pages, new_pages);
        Some(old_pages)
    }

    /// `width` bytes at `address + offset`, computed without wrapping.
    fn range(&self, address: u32, offset: u32, width: usize) -> Result<std::ops::Range<usize>, Trap> {
        let start = u64::from(address) + u64::from(offset);
        let end = start + width as u64;
        if end > self.bytes.len() as u64 {
            return Err(Trap::OutOfBoundsAccess { address: start, size: width });
        }
        Ok(start as usize..end as usize)
    }

    pub fn load(&self, accessor: Accessor, address: u32, offset: u32) -> Result<Value, Trap> {
        let range = self.range(address, offset, accessor.width())?;
        let bytes = &self.bytes[range];
        let value = match accessor {
            Accessor::Load32BitAsSigned32 => Value::I32(LittleEndian::read_i32(bytes)),
            Accessor::Load64BitAsSigned64 => Value::I64(LittleEndian::read_i64(bytes)),
            Accessor::LoadSingle => Value::F32(LittleEndian::read_f32(bytes)),
            Accessor::LoadDouble => Value::F64(LittleEndian::read_f64(bytes)),
            Accessor::Load8BitAsSigned32 => Value::I32(i32::from(bytes[0] as i8)),
            Accessor::Load8BitAsUnsigned32 => Value::I32(i32::from(bytes[0])),
            Accessor::Load16BitAsSigned32 => Value::I32(i32::from(LittleEndian::read_i16(bytes))),
            Accessor::Load16BitAsUnsigned32 => Value::I32(i32::from(LittleEndian::read_u16(bytes))),
            Accessor::Load8BitAsSigned64 => Value::I64(i64::from(bytes[0] as i8)),
            Accessor::Load8BitAsUnsigned64 => Value::I64(i64::from(bytes[0])),
            Accessor::Load16BitAsSigned64 => Value::I64(i64::from(LittleEndian::read_i16(bytes))),
            Accessor::Load16BitAsUnsigned64 => Value::I64(i64::from(LittleEndian::read_u16(bytes))),
            Accessor::Load32BitAsSigned64 => Value::I64(i64::from(LittleEndian::read_i32(bytes))),
            Accessor::Load32BitAsUnsigned64 => Value::I64(i64::from(LittleEndian::read_u32(bytes))),
            _ => return Err(Trap::TypeMismatch { expected: accessor.value_type() }),
        };
        Ok(value)
    }

    pub fn store(&mut self, accessor: Accessor, address: u32, offset: u32, value: Value) -> Result<(), Trap> {
        let range = self.range(address, offset, accessor.width())?;
        let bytes = &mut self.bytes[range];
        match (accessor, value) {
            (Accessor::Store32BitFrom32, Value::I32(v)) => LittleEndian::write_i32(bytes, v),
            (Accessor::Store16BitFrom32, Value::I32(v)) => LittleEndian::write_u16(bytes, v as u16),
            (Accessor::Store8BitFrom32, Value::I32(v)) => bytes[0] = v as u8,
            (Accessor::Store64BitFrom64, Value::I64(v)) => LittleEndian::write_i64(bytes, v),
            (Accessor::Store32BitFrom64, Value::I64(v)) => LittleEndian::write_u32(bytes, v as u32),
            (Accessor::Store16BitFrom64, Value::I64(v)) => LittleEndian::write_u16(bytes, v as u16),
            (Accessor::Store8BitFrom64, Value::I64(v)) => bytes[0] = v as u8,
            (Accessor::StoreSingle, Value::F32(v)) => LittleEndian::write_f32(bytes, v),
            (Accessor::StoreDouble, Value::F64(v)) => LittleEndian::write_f64(bytes, v),
            _ => return Err(Trap::TypeMismatch { expected: accessor.value_type() }),
        }
        Ok(())
    }

    /// Copies a data segment into place.
    pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<(), Trap> {
        let range = self.range(address, 0, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read_bytes(&self, address: u32, len: usize) -> Result<&[u8], Trap> {
        let range = self.range(address, 0, len)?;
        Ok(&self.bytes[range])
    }
}
