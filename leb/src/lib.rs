//! LEB128 variable-length integers, limited to N bits and represented by at
//! most ceil(N/7) bytes.

use std::io::{self, Read, Write};

use thiserror::Error;

const CONTINUE_MASK: u8 = 0x80;
const VALUE_MASK: u8 = 0x7F;
const SIGN_MASK: u8 = 0x40;

#[derive(Debug, Error)]
pub enum LebError {
    #[error("varint{bits} did not terminate within its byte budget")]
    Unterminated { bits: u32 },
    #[error("LEB128 value does not fit in {bits} bits")]
    Overflow { bits: u32 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Number of bytes an N-bit varint may occupy.
pub fn max_bytes(bits: u32) -> u32 {
    (bits + 6) / 7
}

fn next_byte<R: Read + ?Sized>(reader: &mut R) -> Result<u8, LebError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Reads the raw payload bits. Returns the value, the number of bits shifted
/// in, and the payload of the terminating byte.
fn read_raw<R: Read + ?Sized>(reader: &mut R, bits: u32) -> Result<(u64, u32, u8), LebError> {
    if bits == 0 || bits > 64 {
        return Err(LebError::Overflow { bits });
    }
    let mut result: u64 = 0;
    let mut shift = 0;
    for _ in 0..max_bytes(bits) {
        let byte = next_byte(reader)?;
        result |= u64::from(byte & VALUE_MASK) << shift;
        shift += 7;
        if byte & CONTINUE_MASK == 0 {
            return Ok((result, shift, byte & VALUE_MASK));
        }
    }
    Err(LebError::Unterminated { bits })
}

/// How many payload bits of the terminating byte fall inside the width.
fn used_bits(bits: u32, shift: u32) -> u32 {
    (bits + 7 - shift).min(7)
}

pub fn unsigned<R: Read + ?Sized>(reader: &mut R, bits: u32) -> Result<u64, LebError> {
    let (result, shift, last) = read_raw(reader, bits)?;
    if last >> used_bits(bits, shift) != 0 {
        return Err(LebError::Overflow { bits });
    }
    Ok(result)
}

pub fn signed<R: Read + ?Sized>(reader: &mut R, bits: u32) -> Result<i64, LebError> {
    let (mut result, shift, last) = read_raw(reader, bits)?;
    // Bits from the sign bit up must all repeat it.
    let used = used_bits(bits, shift);
    let high = last >> (used - 1);
    if high != 0 && high != VALUE_MASK >> (used - 1) {
        return Err(LebError::Overflow { bits });
    }
    if shift < bits && last & SIGN_MASK != 0 {
        result |= !0u64 << shift;
    }
    if bits < 64 {
        let unused = 64 - bits;
        return Ok(((result << unused) as i64) >> unused);
    }
    Ok(result as i64)
}

pub trait ReadLEB: Read {
    fn read_varuint(&mut self, bits: u32) -> Result<u64, LebError> {
        unsigned(self, bits)
    }

    fn read_varint(&mut self, bits: u32) -> Result<i64, LebError> {
        signed(self, bits)
    }
}

impl<R: Read + ?Sized> ReadLEB for R {}

pub trait WriteLEB: Write {
    /// Writes the minimal encoding of `value`.
    fn write_varuint(&mut self, mut value: u64) -> io::Result<usize> {
        let mut written = 0;
        loop {
            let mut byte = (value as u8) & VALUE_MASK;
            value >>= 7;
            if value != 0 {
                byte |= CONTINUE_MASK;
            }
            self.write_all(&[byte])?;
            written += 1;
            if value == 0 {
                return Ok(written);
            }
        }
    }

    /// Writes the minimal encoding of `value`.
    fn write_varint(&mut self, mut value: i64) -> io::Result<usize> {
        let mut written = 0;
        loop {
            let byte = (value as u8) & VALUE_MASK;
            value >>= 7;
            let done = (value == 0 && byte & SIGN_MASK == 0) || (value == -1 && byte & SIGN_MASK != 0);
            self.write_all(&[if done { byte } else { byte | CONTINUE_MASK }])?;
            written += 1;
            if done {
                return Ok(written);
            }
        }
    }
}

impl<W: Write + ?Sized> WriteLEB for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn varuint(bits: u32, bytes: Vec<u8>) -> Result<u64, LebError> {
        Cursor::new(bytes).read_varuint(bits)
    }

    fn varint(bits: u32, bytes: Vec<u8>) -> Result<i64, LebError> {
        Cursor::new(bytes).read_varint(bits)
    }

    fn encoded_unsigned(value: u64) -> Vec<u8> {
        let mut out = vec![];
        out.write_varuint(value).unwrap();
        out
    }

    fn encoded_signed(value: i64) -> Vec<u8> {
        let mut out = vec![];
        out.write_varint(value).unwrap();
        out
    }

    #[test]
    fn unsigned_reads_single_bytes() {
        assert_eq!(varuint(1, vec![0]).unwrap(), 0);
        assert_eq!(varuint(1, vec![1]).unwrap(), 1);
        assert_eq!(varuint(7, vec![7]).unwrap(), 7);
        assert_eq!(varuint(7, vec![127]).unwrap(), 127);
    }

    #[test]
    fn unsigned_reads_500() {
        assert_eq!(varuint(32, vec![0b1111_0100, 0b0000_0011]).unwrap(), 500);
    }

    #[test]
    fn unsigned_accepts_padding() {
        assert_eq!(varuint(32, vec![0x83, 0x80, 0x00]).unwrap(), 3);
    }

    #[test]
    fn unsigned_rejects_unterminated() {
        match varuint(7, vec![0x80, 0x00]) {
            Err(LebError::Unterminated { bits: 7 }) => {}
            other => panic!("expected unterminated, got {:?}", other),
        }
        match varuint(32, vec![0xff, 0xff, 0xff, 0xff, 0xff, 0x01]) {
            Err(LebError::Unterminated { bits: 32 }) => {}
            other => panic!("expected unterminated, got {:?}", other),
        }
    }

    #[test]
    fn unsigned_rejects_values_wider_than_the_budget() {
        assert!(matches!(varuint(1, vec![2]), Err(LebError::Overflow { bits: 1 })));
        assert!(matches!(
            varuint(32, vec![0xff, 0xff, 0xff, 0xff, 0x1f]),
            Err(LebError::Overflow { bits: 32 })
        ));
    }

    #[test]
    fn tenth_byte_of_a_u64_holds_a_single_bit() {
        let mut bytes = vec![0xff; 9];
        bytes.push(0x03);
        assert!(matches!(varuint(64, bytes), Err(LebError::Overflow { bits: 64 })));
    }

    #[test]
    fn signed_final_byte_must_repeat_the_sign() {
        assert!(matches!(
            varint(32, vec![0xff, 0xff, 0xff, 0xff, 0x0f]),
            Err(LebError::Overflow { bits: 32 })
        ));
        assert!(matches!(
            varint(32, vec![0x80, 0x80, 0x80, 0x80, 0x70]),
            Err(LebError::Overflow { bits: 32 })
        ));
        let mut bytes = vec![0x80; 9];
        bytes.push(0x02);
        assert!(matches!(varint(64, bytes), Err(LebError::Overflow { bits: 64 })));
        assert!(matches!(varint(1, vec![0x02]), Err(LebError::Overflow { bits: 1 })));
    }

    #[test]
    fn unsupported_widths_are_errors() {
        assert!(matches!(varuint(0, vec![0]), Err(LebError::Overflow { bits: 0 })));
        assert!(matches!(varuint(65, vec![0]), Err(LebError::Overflow { bits: 65 })));
        assert!(matches!(varint(65, vec![0]), Err(LebError::Overflow { bits: 65 })));
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        assert!(matches!(varuint(32, vec![0x80]), Err(LebError::Io(_))));
        assert!(matches!(varuint(32, vec![]), Err(LebError::Io(_))));
    }

    #[test]
    fn signed_minus_one_is_sign_extended() {
        assert_eq!(varint(32, vec![0x7f]).unwrap(), -1);
        assert_eq!(varint(64, vec![0x7f]).unwrap(), -1);
        assert_eq!(varint(7, vec![0x7f]).unwrap(), -1);
    }

    #[test]
    fn signed_full_width_encoding_keeps_its_sign() {
        assert_eq!(varint(32, vec![0xff, 0xff, 0xff, 0xff, 0x7f]).unwrap(), -1);
        assert_eq!(varint(32, vec![0x80, 0x80, 0x80, 0x80, 0x78]).unwrap(), i32::MIN as i64);
        assert_eq!(varint(32, vec![0xff, 0xff, 0xff, 0xff, 0x07]).unwrap(), i32::MAX as i64);
    }

    #[test]
    fn signed_positive_with_sign_bit_clear() {
        assert_eq!(varint(32, vec![0x3f]).unwrap(), 63);
        assert_eq!(varint(32, vec![0xc0, 0x00]).unwrap(), 64);
        assert_eq!(varint(32, vec![0x40]).unwrap(), -64);
    }

    #[test]
    fn values_survive_encoding() {
        let unsigned_values: &[(u32, u64)] = &[
            (7, 0),
            (7, 127),
            (32, 128),
            (32, 624_485),
            (32, u64::from(u32::MAX)),
            (64, u64::MAX),
            (64, 1 << 63),
        ];
        for &(bits, value) in unsigned_values {
            assert_eq!(varuint(bits, encoded_unsigned(value)).unwrap(), value, "varuint{}", bits);
        }

        let signed_values: &[(u32, i64)] = &[
            (7, -64),
            (7, 63),
            (32, -123_456),
            (32, i64::from(i32::MIN)),
            (32, i64::from(i32::MAX)),
            (64, i64::MIN),
            (64, i64::MAX),
            (64, -1),
        ];
        for &(bits, value) in signed_values {
            assert_eq!(varint(bits, encoded_signed(value)).unwrap(), value, "varint{}", bits);
        }
    }

    #[test]
    fn minimal_encodings() {
        assert_eq!(encoded_unsigned(0), vec![0]);
        assert_eq!(encoded_unsigned(624_485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(encoded_signed(-1), vec![0x7f]);
        assert_eq!(encoded_signed(-123_456), vec![0xc0, 0xbb, 0x78]);
        assert_eq!(encoded_signed(64), vec![0xc0, 0x00]);
    }
}
