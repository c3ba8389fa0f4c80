//! Descriptor-driven binary codec.
//!
//! [`encode`] and [`decode`] interpret a parsed [`Descriptor`] against a list
//! of typed [`Value`]s.  All integers are big-endian.  Length-prefixed
//! fields (strings and integer vectors) carry a 4-byte count.
//!
//! Decoding never allocates on the strength of a length read from the wire
//! until that length has passed both the configured limit and the
//! remaining-bytes check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::descriptor::{Descriptor, DescriptorError, Instruction, Width};

/// Default upper bound for one whole message, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Default upper bound for one length-prefixed field: bytes for a string,
/// elements for a vector.
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Errors that can occur during message encoding or decoding.
///
/// Every variant is recoverable: the caller's answer is to drop the
/// connection the bytes came from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A literal byte of the descriptor did not match the input.
    #[error("format mismatch at offset {offset}: expected 0x{expected:02X}, found 0x{found:02X}")]
    FormatMismatch { offset: usize, expected: u8, found: u8 },

    /// A declared length is larger than the configured maximum.
    #[error("declared length {declared} exceeds limit {max}")]
    LengthExceedsLimit { declared: usize, max: usize },

    /// The input ended before a field was complete.
    #[error("unexpected end of data: need {needed} more bytes, {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    /// A value's type does not match the descriptor field it was given for.
    #[error("value {index} does not match descriptor field (expected {expected})")]
    ValueMismatch { index: usize, expected: &'static str },

    /// Wrong number of values for the descriptor.
    #[error("descriptor has {expected} fields, got {got} values")]
    ValueCount { expected: usize, got: usize },

    /// A field value cannot be represented on the wire, or a decoded value
    /// is out of range for its field.
    #[error("value {value} out of range for field '{field}'")]
    ValueOutOfRange { field: &'static str, value: u64 },

    /// The 4-byte message code is not in the catalog.
    #[error("unknown message code {}", String::from_utf8_lossy(.0))]
    UnknownMessage([u8; 4]),

    /// Bytes remain after a complete message.
    #[error("{extra} trailing bytes after message")]
    TrailingBytes { extra: usize },

    /// A descriptor in the message catalog failed to parse.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),

    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidString,
}

/// Size limits applied while decoding.
///
/// Deserializable so applications can embed it directly as the
/// `[protocol]` section of their config file; missing keys take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecLimits {
    pub max_message_size: usize,
    pub max_field_length: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer1(u8),
    Integer2(u16),
    Integer4(u32),
    IntegerVector1(Vec<u8>),
    IntegerVector2(Vec<u16>),
    IntegerVector4(Vec<u32>),
    ByteString(Vec<u8>),
}

impl Value {
    /// Widens any integer value to `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::Integer1(v) => Some(u32::from(v)),
            Value::Integer2(v) => Some(u32::from(v)),
            Value::Integer4(v) => Some(v),
            _ => None,
        }
    }

    fn matches(&self, instruction: &Instruction) -> bool {
        matches!(
            (self, instruction),
            (Value::Integer1(_), Instruction::Integer(Width::One))
                | (Value::Integer2(_), Instruction::Integer(Width::Two))
                | (Value::Integer4(_), Instruction::Integer(Width::Four))
                | (Value::IntegerVector1(_), Instruction::IntegerVector(Width::One))
                | (Value::IntegerVector2(_), Instruction::IntegerVector(Width::Two))
                | (Value::IntegerVector4(_), Instruction::IntegerVector(Width::Four))
                | (Value::ByteString(_), Instruction::ByteString)
        )
    }

    fn encoded_len(&self) -> usize {
        match self {
            Value::Integer1(_) => 1,
            Value::Integer2(_) => 2,
            Value::Integer4(_) => 4,
            Value::IntegerVector1(v) => LENGTH_PREFIX + v.len(),
            Value::IntegerVector2(v) => LENGTH_PREFIX + v.len() * 2,
            Value::IntegerVector4(v) => LENGTH_PREFIX + v.len() * 4,
            Value::ByteString(v) => LENGTH_PREFIX + v.len(),
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Computes the exact encoded size of `values` under `descriptor`.
///
/// # Errors
///
/// [`ProtocolError::ValueCount`] or [`ProtocolError::ValueMismatch`] if the
/// values do not fit the descriptor.
pub fn encoded_size(descriptor: &Descriptor, values: &[Value]) -> Result<usize, ProtocolError> {
    let expected = descriptor.field_count();
    if values.len() != expected {
        return Err(ProtocolError::ValueCount {
            expected,
            got: values.len(),
        });
    }

    let mut size = 0;
    let mut next = values.iter().enumerate();
    for instruction in descriptor.instructions() {
        match instruction {
            Instruction::Literal(bytes) => size += bytes.len(),
            field => {
                let (index, value) = next.next().ok_or(ProtocolError::ValueCount {
                    expected,
                    got: values.len(),
                })?;
                if !value.matches(field) {
                    return Err(ProtocolError::ValueMismatch {
                        index,
                        expected: field_name(field),
                    });
                }
                size += value.encoded_len();
            }
        }
    }
    Ok(size)
}

/// Encodes `values` under `descriptor`.
///
/// The size is computed and checked first; the buffer is allocated once.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the values do not fit the descriptor or a
/// length prefix overflows 32 bits.
pub fn encode(descriptor: &Descriptor, values: &[Value]) -> Result<Vec<u8>, ProtocolError> {
    let size = encoded_size(descriptor, values)?;
    let mut buf = Vec::with_capacity(size);
    let mut next = values.iter();

    for instruction in descriptor.instructions() {
        if let Instruction::Literal(bytes) = instruction {
            buf.extend_from_slice(bytes);
            continue;
        }
        // Count and types were validated by encoded_size.
        let Some(value) = next.next() else { break };
        match value {
            Value::Integer1(v) => buf.push(*v),
            Value::Integer2(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Integer4(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::IntegerVector1(v) => {
                write_length(&mut buf, v.len())?;
                buf.extend_from_slice(v);
            }
            Value::IntegerVector2(v) => {
                write_length(&mut buf, v.len())?;
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Value::IntegerVector4(v) => {
                write_length(&mut buf, v.len())?;
                v.iter().for_each(|x| buf.extend_from_slice(&x.to_be_bytes()));
            }
            Value::ByteString(v) => {
                write_length(&mut buf, v.len())?;
                buf.extend_from_slice(v);
            }
        }
    }

    debug_assert_eq!(buf.len(), size);
    Ok(buf)
}

fn write_length(buf: &mut Vec<u8>, len: usize) -> Result<(), ProtocolError> {
    let len = u32::try_from(len).map_err(|_| ProtocolError::ValueOutOfRange {
        field: "length",
        value: len as u64,
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn field_name(instruction: &Instruction) -> &'static str {
    match instruction {
        Instruction::Literal(_) => "literal",
        Instruction::Integer(Width::One) => "1-byte integer",
        Instruction::Integer(Width::Two) => "2-byte integer",
        Instruction::Integer(Width::Four) => "4-byte integer",
        Instruction::IntegerVector(Width::One) => "1-byte integer vector",
        Instruction::IntegerVector(Width::Two) => "2-byte integer vector",
        Instruction::IntegerVector(Width::Four) => "4-byte integer vector",
        Instruction::ByteString => "byte string",
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one message laid out by `descriptor` from the start of `bytes`.
///
/// Returns the values and the number of bytes consumed.  Bytes past the
/// end of the descriptor are left alone; whether they are an error is the
/// caller's decision.
///
/// # Errors
///
/// - [`ProtocolError::FormatMismatch`] when a literal byte differs.
/// - [`ProtocolError::LengthExceedsLimit`] when a length prefix is above
///   `limits.max_field_length`.  Nothing is allocated for that field.
/// - [`ProtocolError::UnexpectedEnd`] when the input is shorter than a
///   field claims.
pub fn decode(
    descriptor: &Descriptor,
    bytes: &[u8],
    limits: &CodecLimits,
) -> Result<(Vec<Value>, usize), ProtocolError> {
    let mut reader = Reader::new(bytes);
    let mut values = Vec::with_capacity(descriptor.field_count());

    for instruction in descriptor.instructions() {
        match instruction {
            Instruction::Literal(expected) => reader.expect_literal(expected)?,
            Instruction::Integer(width) => values.push(match width {
                Width::One => Value::Integer1(reader.read_u8()?),
                Width::Two => Value::Integer2(reader.read_u16()?),
                Width::Four => Value::Integer4(reader.read_u32()?),
            }),
            Instruction::IntegerVector(width) => {
                let count = reader.read_length(limits.max_field_length)?;
                reader.require(vector_span(count, *width, limits.max_field_length)?)?;
                values.push(match width {
                    Width::One => Value::IntegerVector1(reader.take(count)?.to_vec()),
                    Width::Two => Value::IntegerVector2(
                        (0..count).map(|_| reader.read_u16()).collect::<Result<_, _>>()?,
                    ),
                    Width::Four => Value::IntegerVector4(
                        (0..count).map(|_| reader.read_u32()).collect::<Result<_, _>>()?,
                    ),
                });
            }
            Instruction::ByteString => {
                let len = reader.read_length(limits.max_field_length)?;
                values.push(Value::ByteString(reader.take(len)?.to_vec()));
            }
        }
    }

    Ok((values, reader.position()))
}

/// Bytes occupied by `count` elements of `width`.  A product that does not
/// fit in `usize` is reported as over the limit.
fn vector_span(count: usize, width: Width, max: usize) -> Result<usize, ProtocolError> {
    count
        .checked_mul(width.bytes())
        .ok_or(ProtocolError::LengthExceedsLimit {
            declared: count,
            max,
        })
}

/// Bounds-checked big-endian cursor over a byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn require(&self, needed: usize) -> Result<(), ProtocolError> {
        if needed > self.remaining() {
            return Err(ProtocolError::UnexpectedEnd {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.require(n)?;
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a 4-byte length prefix and checks it against `max`.
    fn read_length(&mut self, max: usize) -> Result<usize, ProtocolError> {
        let declared = self.read_u32()? as usize;
        if declared > max {
            return Err(ProtocolError::LengthExceedsLimit { declared, max });
        }
        Ok(declared)
    }

    fn expect_literal(&mut self, expected: &[u8]) -> Result<(), ProtocolError> {
        for &want in expected {
            let offset = self.pos;
            let found = self.read_u8()?;
            if found != want {
                return Err(ProtocolError::FormatMismatch {
                    offset,
                    expected: want,
                    found,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(s: &str) -> Descriptor {
        Descriptor::parse(s).expect("valid descriptor")
    }

    #[test]
    fn test_encode_integers_big_endian() {
        // Arrange
        let d = desc("AB%1i%2i%4i");
        let values = [Value::Integer1(0x01), Value::Integer2(0x0203), Value::Integer4(0x04050607)];

        // Act
        let bytes = encode(&d, &values).expect("encode");

        // Assert
        assert_eq!(bytes, [b'A', b'B', 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(encoded_size(&d, &values), Ok(bytes.len()));
    }

    #[test]
    fn test_encode_vectors_and_strings_carry_length_prefix() {
        let d = desc("%2I%s");
        let bytes = encode(
            &d,
            &[Value::IntegerVector2(vec![1, 0x0203]), Value::ByteString(b"hi".to_vec())],
        )
        .expect("encode");
        assert_eq!(bytes, [0, 0, 0, 2, 0, 1, 2, 3, 0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_round_trip_all_field_kinds() {
        // Arrange
        let d = desc("X%1i%2i%4i%1I%2I%4I%sY");
        let values = vec![
            Value::Integer1(200),
            Value::Integer2(65000),
            Value::Integer4(4_000_000_000),
            Value::IntegerVector1(vec![1, 2, 3]),
            Value::IntegerVector2(vec![]),
            Value::IntegerVector4(vec![7, u32::MAX]),
            Value::ByteString("héllo".as_bytes().to_vec()),
        ];

        // Act
        let bytes = encode(&d, &values).expect("encode");
        let (decoded, consumed) = decode(&d, &bytes, &CodecLimits::default()).expect("decode");

        // Assert
        assert_eq!(decoded, values);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_encode_rejects_wrong_value_count() {
        let d = desc("%2i%2i");
        assert_eq!(
            encode(&d, &[Value::Integer2(1)]),
            Err(ProtocolError::ValueCount { expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_encode_rejects_width_mismatch() {
        let d = desc("%2i");
        assert_eq!(
            encode(&d, &[Value::Integer4(1)]),
            Err(ProtocolError::ValueMismatch {
                index: 0,
                expected: "2-byte integer"
            })
        );
    }

    #[test]
    fn test_decode_literal_mismatch_is_format_error() {
        let d = desc("DKDN%2i");
        let err = decode(&d, b"DKUP\x00\x01", &CodecLimits::default()).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FormatMismatch {
                offset: 2,
                expected: b'D',
                found: b'U'
            }
        );
    }

    #[test]
    fn test_decode_short_integer_is_unexpected_end() {
        let d = desc("%4i");
        assert_eq!(
            decode(&d, &[0, 1], &CodecLimits::default()),
            Err(ProtocolError::UnexpectedEnd {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_decode_string_over_limit_fails_before_reading_body() {
        // Arrange: the body is absent, so only a pre-read limit check can
        // produce LengthExceedsLimit instead of UnexpectedEnd.
        let d = desc("%s");
        let limits = CodecLimits {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_field_length: 65_536,
        };
        let bytes = 50_000_000u32.to_be_bytes();

        // Act
        let result = decode(&d, &bytes, &limits);

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::LengthExceedsLimit {
                declared: 50_000_000,
                max: 65_536
            })
        );
    }

    #[test]
    fn test_vector_span_overflow_is_length_error() {
        assert_eq!(vector_span(3, Width::Four, 8), Ok(12));
        assert_eq!(
            vector_span(usize::MAX, Width::Two, usize::MAX),
            Err(ProtocolError::LengthExceedsLimit {
                declared: usize::MAX,
                max: usize::MAX
            })
        );
    }

    #[test]
    fn test_decode_vector_limit_counts_elements() {
        let d = desc("%4I");
        let limits = CodecLimits {
            max_message_size: 1024,
            max_field_length: 2,
        };
        let mut bytes = 3u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0; 12]);
        assert_eq!(
            decode(&d, &bytes, &limits),
            Err(ProtocolError::LengthExceedsLimit { declared: 3, max: 2 })
        );
    }

    #[test]
    fn test_decode_vector_claiming_more_than_available() {
        let d = desc("%2I");
        let mut bytes = 4u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 1, 0, 2]);
        assert_eq!(
            decode(&d, &bytes, &CodecLimits::default()),
            Err(ProtocolError::UnexpectedEnd {
                needed: 8,
                available: 4
            })
        );
    }

    #[test]
    fn test_decode_reports_consumed_and_leaves_rest() {
        let d = desc("%1i");
        let (values, consumed) = decode(&d, &[9, 10, 11], &CodecLimits::default()).expect("decode");
        assert_eq!(values, vec![Value::Integer1(9)]);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_as_u32_widens_integers() {
        assert_eq!(Value::Integer1(7).as_u32(), Some(7));
        assert_eq!(Value::Integer2(0xFFFF).as_u32(), Some(0xFFFF));
        assert_eq!(Value::ByteString(vec![]).as_u32(), None);
    }
}
