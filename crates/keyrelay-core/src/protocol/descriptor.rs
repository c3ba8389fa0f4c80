//! The format-descriptor language.
//!
//! A descriptor is a short string that describes the byte layout of one
//! message:
//!
//! | Directive          | Meaning                                               |
//! |--------------------|-------------------------------------------------------|
//! | `%1i` `%2i` `%4i`  | big-endian unsigned integer of 1, 2 or 4 bytes        |
//! | `%i`               | same as `%4i`                                         |
//! | `%1I` `%2I` `%4I`  | 4-byte element count, then that many integers         |
//! | `%I`               | same as `%4I`                                         |
//! | `%s`               | 4-byte byte count, then that many bytes               |
//! | `%%`               | a literal `%`                                         |
//! | anything else      | a literal byte that must match exactly on decode      |
//!
//! Descriptors are parsed once into a list of [`Instruction`]s; encoding and
//! decoding interpret that list against typed values and never look at the
//! string again.

use std::fmt;

use thiserror::Error;

/// Problems in a descriptor string.  These are programming errors in the
/// message catalog, never a runtime condition of the peer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// The descriptor ends right after `%` or `%<width>`.
    #[error("descriptor ends inside a directive at offset {offset}")]
    Truncated { offset: usize },

    /// A width other than 1, 2 or 4.
    #[error("invalid integer width '{width}' at offset {offset}")]
    InvalidWidth { offset: usize, width: char },

    /// A directive letter other than `i`, `I` or `s`.
    #[error("unknown directive '%{directive}' at offset {offset}")]
    UnknownDirective { offset: usize, directive: char },
}

/// Byte width of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    One,
    Two,
    Four,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }

    fn from_digit(ch: char) -> Option<Self> {
        match ch {
            '1' => Some(Width::One),
            '2' => Some(Width::Two),
            '4' => Some(Width::Four),
            _ => None,
        }
    }
}

/// One step of a parsed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Bytes that are written verbatim and must match verbatim.
    Literal(Vec<u8>),
    Integer(Width),
    IntegerVector(Width),
    ByteString,
}

impl Instruction {
    /// `true` for instructions that consume a value.
    pub fn is_field(&self) -> bool {
        !matches!(self, Instruction::Literal(_))
    }
}

/// A parsed descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct Descriptor {
    source: String,
    instructions: Vec<Instruction>,
}

impl Descriptor {
    /// Parses `source`.  Adjacent literal bytes are merged into one
    /// [`Instruction::Literal`].
    pub fn parse(source: &str) -> Result<Self, DescriptorError> {
        let mut instructions = Vec::new();
        let mut literal = Vec::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            if ch != '%' {
                let mut utf8 = [0u8; 4];
                literal.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                continue;
            }

            let (_, next) = chars.next().ok_or(DescriptorError::Truncated { offset })?;
            if next == '%' {
                literal.push(b'%');
                continue;
            }

            let (width, directive) = match Width::from_digit(next) {
                Some(width) => {
                    let (_, directive) = chars.next().ok_or(DescriptorError::Truncated { offset })?;
                    (Some(width), directive)
                }
                None if next.is_ascii_digit() => {
                    return Err(DescriptorError::InvalidWidth { offset, width: next });
                }
                None => (None, next),
            };

            let instruction = match (directive, width) {
                ('i', w) => Instruction::Integer(w.unwrap_or(Width::Four)),
                ('I', w) => Instruction::IntegerVector(w.unwrap_or(Width::Four)),
                ('s', None) => Instruction::ByteString,
                (directive, _) => {
                    return Err(DescriptorError::UnknownDirective { offset, directive });
                }
            };

            if !literal.is_empty() {
                instructions.push(Instruction::Literal(std::mem::take(&mut literal)));
            }
            instructions.push(instruction);
        }

        if !literal.is_empty() {
            instructions.push(Instruction::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            instructions,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of values an encode call needs and a decode call yields.
    pub fn field_count(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_field()).count()
    }

    /// The descriptor string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The literal bytes the descriptor starts with, if any.
    pub fn prefix(&self) -> &[u8] {
        match self.instructions.first() {
            Some(Instruction::Literal(bytes)) => bytes,
            _ => &[],
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor({:?})", self.source)
    }
}
