//! Fixed-width immediate values embedded in the instruction stream.

use core::fmt;

use crate::error::DecodeError;
use crate::reader::ByteReader;

/// A decoded immediate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Sign-extended 8/16/32-bit integer, also used for indices.
    Int(i32),
    F32(f32),
    F64(f64),
}

impl Immediate {
    /// Numeric value widened to f64.
    pub fn as_f64(self) -> f64 {
        match self {
            Immediate::Int(v) => v as f64,
            Immediate::F32(v) => v as f64,
            Immediate::F64(v) => v,
        }
    }
}

impl From<i32> for Immediate {
    fn from(v: i32) -> Self {
        Immediate::Int(v)
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int(v) => write!(f, "{}", v),
            Immediate::F32(v) => write!(f, "{}", v),
            Immediate::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Integer or floating-point interpretation of the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateKind {
    Integer,
    Float,
}

/// Read a `width`-byte immediate at the reader's position.
///
/// Integers of width 1, 2 and 4 are read as signed values; width 8 is not
/// supported by this format version. Floats must be 4 or 8 bytes wide. All
/// values are in host byte order.
pub fn decode_immediate(
    reader: &mut ByteReader<'_>,
    width: u8,
    kind: ImmediateKind,
) -> Result<Immediate, DecodeError> {
    let offset = reader.position();
    let exhausted = DecodeError::StreamExhausted {
        offset,
        opcode: None,
    };

    match (kind, width) {
        (ImmediateKind::Integer, 1) => reader
            .read_array::<1>()
            .map(|b| Immediate::Int(i8::from_ne_bytes(b) as i32))
            .ok_or(exhausted),
        (ImmediateKind::Integer, 2) => reader
            .read_array::<2>()
            .map(|b| Immediate::Int(i16::from_ne_bytes(b) as i32))
            .ok_or(exhausted),
        (ImmediateKind::Integer, 4) => reader
            .read_array::<4>()
            .map(|b| Immediate::Int(i32::from_ne_bytes(b)))
            .ok_or(exhausted),
        (ImmediateKind::Integer, 8) => Err(DecodeError::Unimplemented {
            offset,
            opcode: None,
            feature: "64-bit integer immediate",
        }),
        (ImmediateKind::Float, 4) => reader
            .read_array::<4>()
            .map(|b| Immediate::F32(f32::from_ne_bytes(b)))
            .ok_or(exhausted),
        (ImmediateKind::Float, 8) => reader
            .read_array::<8>()
            .map(|b| Immediate::F64(f64::from_ne_bytes(b)))
            .ok_or(exhausted),
        (kind, width) => Err(DecodeError::InvalidImmediateWidth {
            offset,
            opcode: None,
            width,
            float: kind == ImmediateKind::Float,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn decode(bytes: &[u8], width: u8, kind: ImmediateKind) -> Result<Immediate, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        decode_immediate(&mut reader, width, kind)
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(decode(&[0x02], 1, ImmediateKind::Integer), Ok(Immediate::Int(2)));
        assert_eq!(decode(&[0xFF], 1, ImmediateKind::Integer), Ok(Immediate::Int(-1)));
        assert_eq!(
            decode(&260i32.to_ne_bytes(), 4, ImmediateKind::Integer),
            Ok(Immediate::Int(260))
        );
        assert_eq!(
            decode(&(-300i16).to_ne_bytes(), 2, ImmediateKind::Integer),
            Ok(Immediate::Int(-300))
        );
    }

    #[test]
    fn test_integer_round_trip() {
        for v in [i8::MIN, -1, 0, 1, 0x55, i8::MAX] {
            assert_eq!(
                decode(&v.to_ne_bytes(), 1, ImmediateKind::Integer),
                Ok(Immediate::Int(v as i32))
            );
        }
        for v in [i16::MIN, -2, 0, 0x1234, i16::MAX] {
            assert_eq!(
                decode(&v.to_ne_bytes(), 2, ImmediateKind::Integer),
                Ok(Immediate::Int(v as i32))
            );
        }
        for v in [i32::MIN, -70000, 0, 0x0102_0304, i32::MAX] {
            assert_eq!(
                decode(&v.to_ne_bytes(), 4, ImmediateKind::Integer),
                Ok(Immediate::Int(v))
            );
        }
    }

    #[test]
    fn test_float_widths() {
        // 0x42147ff3 ~= 37.12495
        let bytes = f32::from_bits(0x4214_7FF3).to_ne_bytes();
        let value = decode(&bytes, 4, ImmediateKind::Float).unwrap();
        assert_eq!((value.as_f64() * 1000.0) as i64, 37124);

        let bytes = (-0.125f64).to_ne_bytes();
        assert_eq!(decode(&bytes, 8, ImmediateKind::Float), Ok(Immediate::F64(-0.125)));
    }

    #[test]
    fn test_sequential_reads() {
        let mut bytes = Vec::new();
        bytes.push(0x02);
        bytes.extend_from_slice(&260i32.to_ne_bytes());
        bytes.extend_from_slice(&1.5f32.to_ne_bytes());

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            decode_immediate(&mut reader, 1, ImmediateKind::Integer),
            Ok(Immediate::Int(2))
        );
        assert_eq!(
            decode_immediate(&mut reader, 4, ImmediateKind::Integer),
            Ok(Immediate::Int(260))
        );
        assert_eq!(
            decode_immediate(&mut reader, 4, ImmediateKind::Float),
            Ok(Immediate::F32(1.5))
        );
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_i64_is_unimplemented() {
        let result = decode(&[0u8; 8], 8, ImmediateKind::Integer);
        assert!(matches!(
            result,
            Err(DecodeError::Unimplemented { offset: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_widths() {
        assert_eq!(
            decode(&[0u8; 2], 2, ImmediateKind::Float),
            Err(DecodeError::InvalidImmediateWidth {
                offset: 0,
                opcode: None,
                width: 2,
                float: true
            })
        );
        assert!(matches!(
            decode(&[0u8; 3], 3, ImmediateKind::Integer),
            Err(DecodeError::InvalidImmediateWidth { float: false, .. })
        ));
    }

    #[test]
    fn test_truncated_immediate() {
        let mut reader = ByteReader::new(&[0x01, 0x02]);
        assert_eq!(
            decode_immediate(&mut reader, 4, ImmediateKind::Integer),
            Err(DecodeError::StreamExhausted {
                offset: 0,
                opcode: None
            })
        );
        assert!(reader.has_overread());
        assert_eq!(
            decode(&[], 1, ImmediateKind::Integer),
            Err(DecodeError::StreamExhausted {
                offset: 0,
                opcode: None
            })
        );
    }
}
