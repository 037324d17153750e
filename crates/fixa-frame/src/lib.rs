//! Type-tagged, length-prefixed message framing.
//!
//! Every message on a fixa connection is framed with:
//! - A 4-byte little-endian message type
//! - A 4-byte little-endian body length
//!
//! followed by exactly `length` bytes of codec-encoded body. Readers only
//! ever hand out complete frames.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FixaCodec;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use message::MessageType;
pub use reader::FrameReader;
pub use writer::{FrameWriter, SharedFrameWriter};
