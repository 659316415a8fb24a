use std::io::Cursor;
use std::str;

use byteorder::{LittleEndian, ReadBytesExt};
use leb::{LebError, ReadLEB};

use crate::parser::ParseError;

/// Byte cursor over a module, or over a slice of one. Positions reported in
/// errors are absolute file offsets.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    base: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader::at(bytes, 0)
    }

    fn at(bytes: &'a [u8], base: usize) -> Reader<'a> {
        Reader {
            cursor: Cursor::new(bytes),
            base,
        }
    }

    pub fn position(&self) -> usize {
        self.base + self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn eof(&self) -> ParseError {
        ParseError::UnexpectedEof {
            offset: self.position(),
        }
    }

    fn leb_error(&self, start: usize, error: LebError) -> ParseError {
        match error {
            LebError::Unterminated { bits } | LebError::Overflow { bits } => {
                ParseError::MalformedVarint { offset: start, bits }
            }
            LebError::Io(_) => self.eof(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.cursor.read_u8().map_err(|_| self.eof())
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.cursor.get_ref().get(self.cursor.position() as usize).copied()
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ParseError> {
        self.cursor.read_u32::<LittleEndian>().map_err(|_| self.eof())
    }

    pub fn read_f32(&mut self) -> Result<f32, ParseError> {
        self.cursor.read_f32::<LittleEndian>().map_err(|_| self.eof())
    }

    pub fn read_f64(&mut self) -> Result<f64, ParseError> {
        self.cursor.read_f64::<LittleEndian>().map_err(|_| self.eof())
    }

    pub fn read_varuint(&mut self, bits: u32) -> Result<u64, ParseError> {
        let start = self.position();
        self.cursor.read_varuint(bits).map_err(|e| self.leb_error(start, e))
    }

    pub fn read_varint(&mut self, bits: u32) -> Result<i64, ParseError> {
        let start = self.position();
        self.cursor.read_varint(bits).map_err(|e| self.leb_error(start, e))
    }

    pub fn read_varuint1(&mut self) -> Result<bool, ParseError> {
        Ok(self.read_varuint(1)? == 1)
    }

    pub fn read_varuint7(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_varuint(7)? as u8)
    }

    pub fn read_varuint32(&mut self) -> Result<u32, ParseError> {
        Ok(self.read_varuint(32)? as u32)
    }

    pub fn read_varint7(&mut self) -> Result<i8, ParseError> {
        Ok(self.read_varint(7)? as i8)
    }

    pub fn read_varint32(&mut self) -> Result<i32, ParseError> {
        Ok(self.read_varint(32)? as i32)
    }

    pub fn read_varint64(&mut self) -> Result<i64, ParseError> {
        self.read_varint(64)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if len > self.remaining() {
            return Err(self.eof());
        }
        let start = self.cursor.position() as usize;
        let bytes: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&bytes[start..start + len])
    }

    /// A varuint32 length followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, ParseError> {
        let len = self.read_varuint32()? as usize;
        let offset = self.position();
        let bytes = self.read_bytes(len)?;
        match str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(ParseError::InvalidUtf8 { offset }),
        }
    }

    /// Splits off the next `len` bytes as an independent reader.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>, ParseError> {
        let base = self.position();
        let bytes = self.read_bytes(len)?;
        Ok(Reader::at(bytes, base))
    }

    /// Fails unless every byte has been consumed.
    pub fn expect_end(&self, error: impl FnOnce(usize) -> ParseError) -> Result<(), ParseError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(error(self.position()))
        }
    }
}
