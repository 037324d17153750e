use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::FixaStream;

/// TCP listener for the device side of a session.
///
/// Binding to port 0 picks an ephemeral port; [`TcpTransport::local_addr`]
/// reports the one actually in use so it can be advertised.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%local_addr, "listening for controller over tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<FixaStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted controller connection");
        Ok(stream.into())
    }

    /// Connect to a listening device (blocking).
    pub fn connect(addr: impl ToSocketAddrs) -> Result<FixaStream> {
        Self::connect_within(addr, None)
    }

    /// Connect with an upper bound on the connection attempt.
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<FixaStream> {
        Self::connect_within(addr, Some(timeout))
    }

    /// Try each resolved address in turn, optionally bounding every attempt.
    ///
    /// Returns the error from the last address tried.
    pub fn connect_within(
        addr: impl ToSocketAddrs,
        timeout: Option<Duration>,
    ) -> Result<FixaStream> {
        let mut last_err = None;
        for addr in addr.to_socket_addrs()? {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected to device");
                    return Ok(stream.into());
                }
                Err(source) => last_err = Some(TransportError::Connect { addr, source }),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "address resolved to no socket addresses",
            ))
        }))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
