//! Wire protocol: descriptor grammar, typed codec, message catalog, framing.

pub mod codec;
pub mod descriptor;
pub mod framing;
pub mod messages;

pub use codec::{decode, encode, encoded_size, CodecLimits, ProtocolError, Value};
pub use descriptor::{Descriptor, DescriptorError, Instruction, Width};
pub use framing::{encode_frame, frame, FrameDecoder, FRAME_HEADER_LEN};
pub use messages::*;
