use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// A connected byte stream; implements Read + Write.
///
/// Cloning (via [`FixaStream::try_clone`]) yields a second handle on the same
/// socket so one thread can block in `read` while another writes or shuts the
/// connection down.
pub struct FixaStream {
    inner: FixaStreamInner,
}

enum FixaStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for FixaStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            FixaStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for FixaStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            FixaStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            FixaStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for FixaStream {
    fn from(stream: TcpStream) -> Self {
        // Updates are tiny and latency-sensitive.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%err, "could not disable nagle on tcp stream");
        }
        Self {
            inner: FixaStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for FixaStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: FixaStreamInner::Unix(stream),
        }
    }
}

impl FixaStream {
    /// Create a connected pair of in-process streams.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((left.into(), right.into()))
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            FixaStreamInner::Tcp(stream) => FixaStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => FixaStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Shut down both directions of the connection.
    ///
    /// Any thread blocked reading from a clone of this stream wakes up with
    /// EOF. Shutting down an already-closed stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            FixaStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            FixaStreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            FixaStreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
            #[cfg(unix)]
            FixaStreamInner::Unix(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Human-readable description of the remote end, for logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            FixaStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<unknown>".to_string()),
            #[cfg(unix)]
            FixaStreamInner::Unix(_) => "unix-socket".to_string(),
        }
    }
}

impl std::fmt::Debug for FixaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            FixaStreamInner::Tcp(_) => f
                .debug_struct("FixaStream")
                .field("type", &"tcp")
                .field("peer", &self.peer_label())
                .finish(),
            #[cfg(unix)]
            FixaStreamInner::Unix(_) => f.debug_struct("FixaStream").field("type", &"unix").finish(),
        }
    }
}
