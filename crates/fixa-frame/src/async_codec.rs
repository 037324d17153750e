//! `tokio_util::codec` adapter for the fixa frame format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;

/// Frame codec for use with `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FixaCodec {
    max_payload_size: usize,
}

impl FixaCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for FixaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixaCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for FixaCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if frame.body.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.body.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(frame.code, &frame.body, dst)
    }
}
