use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::MessageType;

/// Frame header: type (4) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded message type. Unknown codes decode as `Invalid`.
    pub kind: MessageType,
    /// Raw type code as it appeared on the wire.
    pub code: u32,
    /// The codec-encoded message body.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: MessageType, body: impl Into<Bytes>) -> Self {
        Self {
            kind,
            code: kind.code(),
            body: body.into(),
        }
    }

    /// A hang-up frame (empty body).
    pub fn hang_up() -> Self {
        Self::new(MessageType::HangUp, Bytes::new())
    }

    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬─────────────────┐
/// │ Type         │ Length       │ Body            │
/// │ (4B LE u32)  │ (4B LE u32)  │ (Length bytes)  │
/// └──────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_frame(code: u32, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_u32_le(code);
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut header = &src[..HEADER_SIZE];
    let code = header.get_u32_le();
    let body_len = header.get_u32_le() as usize;

    if body_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len).freeze();

    Ok(Some(Frame {
        kind: MessageType::from_code(code),
        code,
        body,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
