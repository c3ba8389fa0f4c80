//! Length-prefixed framing.
//!
//! On the stream every message is preceded by its length as a 4-byte
//! big-endian integer.  [`FrameDecoder`] buffers raw socket reads and hands
//! out whole frames; it never reserves memory for a frame whose declared
//! length is above the configured maximum.

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{encode_message, Message};

/// Size of the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Wraps `payload` in a frame.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if the payload does not fit a 32-bit
/// length.
pub fn frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::ValueOutOfRange {
        field: "frame length",
        value: payload.len() as u64,
    })?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encodes `msg` and wraps it in a frame.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    frame(&encode_message(msg)?)
}

/// Reassembles frames from a byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame: usize,
}

impl FrameDecoder {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Appends bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame payload, or `None` if more bytes are
    /// needed.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::LengthExceedsLimit`] when the next frame declares a
    /// length above the maximum.  The stream cannot be resynchronised after
    /// this; drop the connection.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let Some(header) = self.buf.get(..FRAME_HEADER_LEN) else {
            return Ok(None);
        };
        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if declared > self.max_frame {
            return Err(ProtocolError::LengthExceedsLimit {
                declared,
                max: self.max_frame,
            });
        }
        if self.buf.len() < FRAME_HEADER_LEN + declared {
            return Ok(None);
        }

        let payload = self.buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + declared].to_vec();
        self.buf.drain(..FRAME_HEADER_LEN + declared);
        Ok(Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prefixes_length() {
        assert_eq!(frame(b"CALV"), Ok(vec![0, 0, 0, 4, b'C', b'A', b'L', b'V']));
    }

    #[test]
    fn test_decoder_waits_for_whole_frame() {
        // Arrange
        let mut decoder = FrameDecoder::new(64);
        let bytes = frame(b"CNOP").expect("frame");

        // Act / Assert
        decoder.extend(&bytes[..3]);
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.extend(&bytes[3..6]);
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.extend(&bytes[6..]);
        assert_eq!(decoder.next_frame(), Ok(Some(b"CNOP".to_vec())));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_splits_back_to_back_frames() {
        let mut decoder = FrameDecoder::new(64);
        let mut bytes = frame(b"CALV").expect("frame");
        bytes.extend(frame(b"COUT").expect("frame"));
        decoder.extend(&bytes);
        assert_eq!(decoder.next_frame(), Ok(Some(b"CALV".to_vec())));
        assert_eq!(decoder.next_frame(), Ok(Some(b"COUT".to_vec())));
        assert_eq!(decoder.next_frame(), Ok(None));
    }

    #[test]
    fn test_oversized_frame_is_rejected_from_header_alone() {
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&50_000_000u32.to_be_bytes());
        assert_eq!(
            decoder.next_frame(),
            Err(ProtocolError::LengthExceedsLimit {
                declared: 50_000_000,
                max: 1024
            })
        );
    }

    #[test]
    fn test_empty_frame() {
        let mut decoder = FrameDecoder::new(16);
        decoder.extend(&[0, 0, 0, 0]);
        assert_eq!(decoder.next_frame(), Ok(Some(Vec::new())));
    }

    #[test]
    fn test_encode_frame_wraps_message() {
        let bytes = encode_frame(&Message::KeepAlive).expect("encode");
        assert_eq!(bytes, b"\x00\x00\x00\x04CALV");
    }
}
