/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body exceeds the configured maximum size.
    #[error("frame body too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the error means the other end went away, rather than a local
    /// or protocol failure.
    pub fn is_peer_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(err) => fixa_transport::error::is_peer_closed_kind(err.kind()),
            Self::PayloadTooLarge { .. } => false,
        }
    }
}

impl From<fixa_transport::TransportError> for FrameError {
    fn from(err: fixa_transport::TransportError) -> Self {
        match err {
            fixa_transport::TransportError::Io(io)
            | fixa_transport::TransportError::Accept(io) => FrameError::Io(io),
            fixa_transport::TransportError::Bind { source, .. }
            | fixa_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
            fixa_transport::TransportError::Shutdown => FrameError::ConnectionClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
