use std::io::ErrorKind;
use std::net::SocketAddr;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the device endpoint.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was shut down locally.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether this error means the peer closed or cancelled the connection,
    /// as opposed to a genuine transport failure.
    pub fn is_peer_closed(&self) -> bool {
        match self {
            Self::Io(err) | Self::Accept(err) => is_peer_closed_kind(err.kind()),
            Self::Shutdown => true,
            Self::Bind { .. } | Self::Connect { .. } => false,
        }
    }
}

/// I/O error kinds that indicate an orderly or abrupt close by the other end.
pub fn is_peer_closed_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

pub type Result<T> = std::result::Result<T, TransportError>;
