use std::time::Duration;

use fixa_wire::{FixableId, ValueKind};

use crate::session::SessionState;

/// Errors that can occur in device and controller sessions.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] fixa_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] fixa_frame::FrameError),

    /// A message body could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] fixa_wire::WireError),

    /// The device did not register a fixable with this id.
    #[error("unknown fixable {0}")]
    UnknownFixable(FixableId),

    /// The value does not fit the fixable's declared kind.
    #[error("fixable {id} holds {}, not {found}", .expected.map_or("no value", ValueKind::name))]
    KindMismatch {
        id: FixableId,
        expected: Option<ValueKind>,
        found: ValueKind,
    },

    /// The operation needs a live session.
    #[error("session is not live (state: {0})")]
    NotLive(SessionState),

    /// The session closed while waiting on it.
    #[error("session closed")]
    Closed,

    /// Waiting on the session timed out.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, PeerError>;
