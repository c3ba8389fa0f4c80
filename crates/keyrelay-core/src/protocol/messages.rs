//! The message catalog.
//!
//! Every message is described by one descriptor string (see
//! [`descriptor`](super::descriptor)).  Apart from the two greeting messages,
//! which start with the protocol name, each begins with a 4-byte ASCII code.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::keymap::{KeyId, ModifierMask};
use crate::protocol::codec::{self, CodecLimits, ProtocolError, Value};
use crate::protocol::descriptor::{Descriptor, DescriptorError};

// ── Protocol constants ────────────────────────────────────────────────────────

pub const PROTOCOL_MAJOR: u16 = 1;
pub const PROTOCOL_MINOR: u16 = 6;

/// Literal prefix of the greeting messages.
pub const GREETING: &[u8] = b"Synergy";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 24800;

pub const BUTTON_LEFT: u8 = 1;
pub const BUTTON_MIDDLE: u8 = 2;
pub const BUTTON_RIGHT: u8 = 3;

// ── Message kinds ─────────────────────────────────────────────────────────────

/// Every message in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Hello,
    HelloBack,
    NoOp,
    Close,
    Enter,
    Leave,
    ScreenSaver,
    ResetOptions,
    InfoAck,
    KeepAlive,
    KeyDown,
    KeyRepeat,
    KeyUp,
    MouseDown,
    MouseUp,
    MouseMove,
    MouseRelativeMove,
    MouseWheel,
    QueryInfo,
    Info,
    SetOptions,
    IncompatibleVersion,
    Busy,
    Unknown,
    Bad,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [MessageKind; 25] = [
        MessageKind::Hello,
        MessageKind::HelloBack,
        MessageKind::NoOp,
        MessageKind::Close,
        MessageKind::Enter,
        MessageKind::Leave,
        MessageKind::ScreenSaver,
        MessageKind::ResetOptions,
        MessageKind::InfoAck,
        MessageKind::KeepAlive,
        MessageKind::KeyDown,
        MessageKind::KeyRepeat,
        MessageKind::KeyUp,
        MessageKind::MouseDown,
        MessageKind::MouseUp,
        MessageKind::MouseMove,
        MessageKind::MouseRelativeMove,
        MessageKind::MouseWheel,
        MessageKind::QueryInfo,
        MessageKind::Info,
        MessageKind::SetOptions,
        MessageKind::IncompatibleVersion,
        MessageKind::Busy,
        MessageKind::Unknown,
        MessageKind::Bad,
    ];

    /// The descriptor string for this kind.
    pub const fn format(self) -> &'static str {
        match self {
            MessageKind::Hello => "Synergy%2i%2i",
            MessageKind::HelloBack => "Synergy%2i%2i%s",
            MessageKind::NoOp => "CNOP",
            MessageKind::Close => "CBYE",
            MessageKind::Enter => "CINN%2i%2i%4i%2i",
            MessageKind::Leave => "COUT",
            MessageKind::ScreenSaver => "CSEC%1i",
            MessageKind::ResetOptions => "CROP",
            MessageKind::InfoAck => "CIAK",
            MessageKind::KeepAlive => "CALV",
            MessageKind::KeyDown => "DKDN%2i%2i%2i",
            MessageKind::KeyRepeat => "DKRP%2i%2i%2i%2i",
            MessageKind::KeyUp => "DKUP%2i%2i%2i",
            MessageKind::MouseDown => "DMDN%1i",
            MessageKind::MouseUp => "DMUP%1i",
            MessageKind::MouseMove => "DMMV%2i%2i",
            MessageKind::MouseRelativeMove => "DMRM%2i%2i",
            MessageKind::MouseWheel => "DMWM%2i%2i",
            MessageKind::QueryInfo => "QINF",
            MessageKind::Info => "DINF%2i%2i%2i%2i%2i%2i%2i",
            MessageKind::SetOptions => "DSOP%4I",
            MessageKind::IncompatibleVersion => "EICV%2i%2i",
            MessageKind::Busy => "EBSY",
            MessageKind::Unknown => "EUNK",
            MessageKind::Bad => "EBAD",
        }
    }

    /// The parsed descriptor.  Parsed once per process.
    pub fn descriptor(self) -> Result<&'static Descriptor, ProtocolError> {
        static PARSED: OnceLock<Vec<Result<Descriptor, DescriptorError>>> = OnceLock::new();
        let parsed = PARSED.get_or_init(|| {
            MessageKind::ALL
                .iter()
                .map(|kind| Descriptor::parse(kind.format()))
                .collect()
        });
        match &parsed[self as usize] {
            Ok(descriptor) => Ok(descriptor),
            Err(e) => Err(ProtocolError::InvalidDescriptor(e.clone())),
        }
    }

    /// Looks a kind up by its 4-byte code.  The greetings have no code.
    pub fn from_code(code: [u8; 4]) -> Option<MessageKind> {
        MessageKind::ALL
            .into_iter()
            .filter(|kind| !kind.is_greeting())
            .find(|kind| kind.format().as_bytes().starts_with(&code))
    }

    pub const fn is_greeting(self) -> bool {
        matches!(self, MessageKind::Hello | MessageKind::HelloBack)
    }

    /// Keyboard and mouse messages.  These are subject to the event order
    /// guard; everything else is control traffic.
    pub const fn is_input(self) -> bool {
        matches!(
            self,
            MessageKind::KeyDown
                | MessageKind::KeyRepeat
                | MessageKind::KeyUp
                | MessageKind::MouseDown
                | MessageKind::MouseUp
                | MessageKind::MouseMove
                | MessageKind::MouseRelativeMove
                | MessageKind::MouseWheel
        )
    }
}

// ── Message payloads ──────────────────────────────────────────────────────────

/// Screen shape a client reports in reply to [`Message::QueryInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub mouse_x: i16,
    pub mouse_y: i16,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello { major: u16, minor: u16 },
    HelloBack { major: u16, minor: u16, name: String },
    NoOp,
    Close,
    Enter { x: i16, y: i16, sequence: u32, mask: ModifierMask },
    Leave,
    ScreenSaver { active: bool },
    ResetOptions,
    InfoAck,
    KeepAlive,
    KeyDown { id: KeyId, mask: ModifierMask, button: u16 },
    KeyRepeat { id: KeyId, mask: ModifierMask, count: u16, button: u16 },
    KeyUp { id: KeyId, mask: ModifierMask, button: u16 },
    MouseDown { button: u8 },
    MouseUp { button: u8 },
    MouseMove { x: i16, y: i16 },
    MouseRelativeMove { dx: i16, dy: i16 },
    MouseWheel { x_delta: i16, y_delta: i16 },
    QueryInfo,
    Info(ScreenInfo),
    SetOptions(Vec<(u32, u32)>),
    IncompatibleVersion { major: u16, minor: u16 },
    Busy,
    Unknown,
    Bad,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello { .. } => MessageKind::Hello,
            Message::HelloBack { .. } => MessageKind::HelloBack,
            Message::NoOp => MessageKind::NoOp,
            Message::Close => MessageKind::Close,
            Message::Enter { .. } => MessageKind::Enter,
            Message::Leave => MessageKind::Leave,
            Message::ScreenSaver { .. } => MessageKind::ScreenSaver,
            Message::ResetOptions => MessageKind::ResetOptions,
            Message::InfoAck => MessageKind::InfoAck,
            Message::KeepAlive => MessageKind::KeepAlive,
            Message::KeyDown { .. } => MessageKind::KeyDown,
            Message::KeyRepeat { .. } => MessageKind::KeyRepeat,
            Message::KeyUp { .. } => MessageKind::KeyUp,
            Message::MouseDown { .. } => MessageKind::MouseDown,
            Message::MouseUp { .. } => MessageKind::MouseUp,
            Message::MouseMove { .. } => MessageKind::MouseMove,
            Message::MouseRelativeMove { .. } => MessageKind::MouseRelativeMove,
            Message::MouseWheel { .. } => MessageKind::MouseWheel,
            Message::QueryInfo => MessageKind::QueryInfo,
            Message::Info(_) => MessageKind::Info,
            Message::SetOptions(_) => MessageKind::SetOptions,
            Message::IncompatibleVersion { .. } => MessageKind::IncompatibleVersion,
            Message::Busy => MessageKind::Busy,
            Message::Unknown => MessageKind::Unknown,
            Message::Bad => MessageKind::Bad,
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind().is_input()
    }

    /// The greeting a server sends for this protocol version.
    pub fn hello() -> Self {
        Message::Hello {
            major: PROTOCOL_MAJOR,
            minor: PROTOCOL_MINOR,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, ProtocolError> {
        let values = match self {
            Message::Hello { major, minor } | Message::IncompatibleVersion { major, minor } => {
                vec![Value::Integer2(*major), Value::Integer2(*minor)]
            }
            Message::HelloBack { major, minor, name } => vec![
                Value::Integer2(*major),
                Value::Integer2(*minor),
                Value::ByteString(name.as_bytes().to_vec()),
            ],
            Message::Enter { x, y, sequence, mask } => vec![
                signed(*x),
                signed(*y),
                Value::Integer4(*sequence),
                Value::Integer2(mask.to_wire()),
            ],
            Message::ScreenSaver { active } => vec![Value::Integer1(u8::from(*active))],
            Message::KeyDown { id, mask, button } | Message::KeyUp { id, mask, button } => vec![
                Value::Integer2(key_to_wire(*id)?),
                Value::Integer2(mask.to_wire()),
                Value::Integer2(*button),
            ],
            Message::KeyRepeat {
                id,
                mask,
                count,
                button,
            } => vec![
                Value::Integer2(key_to_wire(*id)?),
                Value::Integer2(mask.to_wire()),
                Value::Integer2(*count),
                Value::Integer2(*button),
            ],
            Message::MouseDown { button } | Message::MouseUp { button } => {
                vec![Value::Integer1(*button)]
            }
            Message::MouseMove { x, y } => vec![signed(*x), signed(*y)],
            Message::MouseRelativeMove { dx, dy } => vec![signed(*dx), signed(*dy)],
            Message::MouseWheel { x_delta, y_delta } => vec![signed(*x_delta), signed(*y_delta)],
            Message::Info(info) => vec![
                signed(info.x),
                signed(info.y),
                Value::Integer2(info.width),
                Value::Integer2(info.height),
                Value::Integer2(0),
                signed(info.mouse_x),
                signed(info.mouse_y),
            ],
            Message::SetOptions(options) => vec![Value::IntegerVector4(
                options.iter().flat_map(|&(k, v)| [k, v]).collect(),
            )],
            Message::NoOp
            | Message::Close
            | Message::Leave
            | Message::ResetOptions
            | Message::InfoAck
            | Message::KeepAlive
            | Message::QueryInfo
            | Message::Busy
            | Message::Unknown
            | Message::Bad => Vec::new(),
        };
        Ok(values)
    }

    fn from_values(kind: MessageKind, values: Vec<Value>) -> Result<Self, ProtocolError> {
        let mut f = Fields::new(values);
        let message = match kind {
            MessageKind::Hello => Message::Hello {
                major: f.u16()?,
                minor: f.u16()?,
            },
            MessageKind::HelloBack => Message::HelloBack {
                major: f.u16()?,
                minor: f.u16()?,
                name: String::from_utf8(f.bytes()?).map_err(|_| ProtocolError::InvalidString)?,
            },
            MessageKind::NoOp => Message::NoOp,
            MessageKind::Close => Message::Close,
            MessageKind::Enter => Message::Enter {
                x: f.i16()?,
                y: f.i16()?,
                sequence: f.u32()?,
                mask: ModifierMask::from_wire(f.u16()?),
            },
            MessageKind::Leave => Message::Leave,
            MessageKind::ScreenSaver => Message::ScreenSaver {
                active: f.u8()? != 0,
            },
            MessageKind::ResetOptions => Message::ResetOptions,
            MessageKind::InfoAck => Message::InfoAck,
            MessageKind::KeepAlive => Message::KeepAlive,
            MessageKind::KeyDown => Message::KeyDown {
                id: KeyId(u32::from(f.u16()?)),
                mask: ModifierMask::from_wire(f.u16()?),
                button: f.u16()?,
            },
            MessageKind::KeyRepeat => Message::KeyRepeat {
                id: KeyId(u32::from(f.u16()?)),
                mask: ModifierMask::from_wire(f.u16()?),
                count: f.u16()?,
                button: f.u16()?,
            },
            MessageKind::KeyUp => Message::KeyUp {
                id: KeyId(u32::from(f.u16()?)),
                mask: ModifierMask::from_wire(f.u16()?),
                button: f.u16()?,
            },
            MessageKind::MouseDown => Message::MouseDown { button: f.u8()? },
            MessageKind::MouseUp => Message::MouseUp { button: f.u8()? },
            MessageKind::MouseMove => Message::MouseMove {
                x: f.i16()?,
                y: f.i16()?,
            },
            MessageKind::MouseRelativeMove => Message::MouseRelativeMove {
                dx: f.i16()?,
                dy: f.i16()?,
            },
            MessageKind::MouseWheel => Message::MouseWheel {
                x_delta: f.i16()?,
                y_delta: f.i16()?,
            },
            MessageKind::QueryInfo => Message::QueryInfo,
            MessageKind::Info => {
                let x = f.i16()?;
                let y = f.i16()?;
                let width = f.u16()?;
                let height = f.u16()?;
                let _reserved = f.u16()?;
                Message::Info(ScreenInfo {
                    x,
                    y,
                    width,
                    height,
                    mouse_x: f.i16()?,
                    mouse_y: f.i16()?,
                })
            }
            MessageKind::SetOptions => {
                let flat = f.u32_vec()?;
                if flat.len() % 2 != 0 {
                    return Err(ProtocolError::ValueOutOfRange {
                        field: "options.len",
                        value: flat.len() as u64,
                    });
                }
                Message::SetOptions(flat.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            }
            MessageKind::IncompatibleVersion => Message::IncompatibleVersion {
                major: f.u16()?,
                minor: f.u16()?,
            },
            MessageKind::Busy => Message::Busy,
            MessageKind::Unknown => Message::Unknown,
            MessageKind::Bad => Message::Bad,
        };
        Ok(message)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `msg` into its wire bytes (without the frame length prefix).
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if a key id does not fit the 16-bit
/// wire field.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let descriptor = msg.kind().descriptor()?;
    codec::encode(descriptor, &msg.to_values()?)
}

/// Decodes exactly one message from `bytes`.
///
/// The two greetings share a prefix; a greeting followed by a name is a
/// [`Message::HelloBack`], otherwise a [`Message::Hello`].
///
/// # Errors
///
/// Any [`ProtocolError`]; bytes left over after the message are
/// [`ProtocolError::TrailingBytes`].
pub fn decode_message(bytes: &[u8], limits: &CodecLimits) -> Result<Message, ProtocolError> {
    if bytes.len() > limits.max_message_size {
        return Err(ProtocolError::LengthExceedsLimit {
            declared: bytes.len(),
            max: limits.max_message_size,
        });
    }

    let kind = identify(bytes)?;
    let (values, consumed) = codec::decode(kind.descriptor()?, bytes, limits)?;
    if consumed != bytes.len() {
        return Err(ProtocolError::TrailingBytes {
            extra: bytes.len() - consumed,
        });
    }
    Message::from_values(kind, values)
}

fn identify(bytes: &[u8]) -> Result<MessageKind, ProtocolError> {
    if bytes.starts_with(GREETING) {
        let hello_len = GREETING.len() + 4;
        return Ok(if bytes.len() > hello_len {
            MessageKind::HelloBack
        } else {
            MessageKind::Hello
        });
    }
    let code: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::UnexpectedEnd {
            needed: 4,
            available: bytes.len(),
        })?;
    MessageKind::from_code(code).ok_or(ProtocolError::UnknownMessage(code))
}

fn key_to_wire(id: KeyId) -> Result<u16, ProtocolError> {
    u16::try_from(id.0).map_err(|_| ProtocolError::ValueOutOfRange {
        field: "key_id",
        value: u64::from(id.0),
    })
}

fn signed(v: i16) -> Value {
    Value::Integer2(v as u16)
}

/// Pulls typed values off a decoded field list in order.
struct Fields {
    values: std::vec::IntoIter<Value>,
    index: usize,
}

impl Fields {
    fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<Value, ProtocolError> {
        let index = self.index;
        self.index += 1;
        self.values
            .next()
            .ok_or(ProtocolError::ValueMismatch { index, expected })
    }

    fn mismatch(&self, expected: &'static str) -> ProtocolError {
        ProtocolError::ValueMismatch {
            index: self.index - 1,
            expected,
        }
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        match self.next("1-byte integer")? {
            Value::Integer1(v) => Ok(v),
            _ => Err(self.mismatch("1-byte integer")),
        }
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        match self.next("2-byte integer")? {
            Value::Integer2(v) => Ok(v),
            _ => Err(self.mismatch("2-byte integer")),
        }
    }

    fn i16(&mut self) -> Result<i16, ProtocolError> {
        self.u16().map(|v| v as i16)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        match self.next("4-byte integer")? {
            Value::Integer4(v) => Ok(v),
            _ => Err(self.mismatch("4-byte integer")),
        }
    }

    fn u32_vec(&mut self) -> Result<Vec<u32>, ProtocolError> {
        match self.next("4-byte integer vector")? {
            Value::IntegerVector4(v) => Ok(v),
            _ => Err(self.mismatch("4-byte integer vector")),
        }
    }

    fn bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        match self.next("byte string")? {
            Value::ByteString(v) => Ok(v),
            _ => Err(self.mismatch("byte string")),
        }
    }
}
