//! Byte-stream adapters for the fixa session protocol.
//!
//! The session layer only needs an ordered, reliable, bidirectional byte
//! stream that can be cloned into a read half and a write half and shut down
//! from another thread. This crate provides that over:
//! - TCP (the local-network transport between a device and its controller)
//! - Unix domain socket pairs (in-process wiring, mostly for tests)
//!
//! Everything above this layer works in terms of [`FixaStream`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::FixaStream;
pub use tcp::TcpTransport;
