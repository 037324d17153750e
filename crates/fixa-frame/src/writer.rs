use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use fixa_transport::FixaStream;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::MessageType;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking), preserving its raw type code.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_raw(frame.code, frame.body.as_ref())
    }

    /// Encode and send a message body under the given type.
    pub fn send(&mut self, kind: MessageType, body: &[u8]) -> Result<()> {
        self.write_raw(kind.code(), body)
    }

    fn write_raw(&mut self, code: u32, body: &[u8]) -> Result<()> {
        if body.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(code, body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        trace!(code, len = body.len(), "frame sent");
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<FixaStream> {
    /// Create a frame writer for `FixaStream` and apply write timeout from config.
    pub fn with_config_stream(inner: FixaStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

/// A frame writer shared between threads.
///
/// Whole frames are written under one lock, so concurrent senders never
/// interleave header and body bytes.
pub struct SharedFrameWriter<T = FixaStream> {
    inner: Arc<Mutex<FrameWriter<T>>>,
}

impl<T> Clone for SharedFrameWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Write> SharedFrameWriter<T> {
    pub fn new(writer: FrameWriter<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encode and send a message body under the given type.
    pub fn send(&self, kind: MessageType, body: &[u8]) -> Result<()> {
        self.lock().send(kind, body)
    }

    /// Write a complete frame.
    pub fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.lock().write_frame(frame)
    }

    /// Run `f` with exclusive access to the underlying writer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut FrameWriter<T>) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, FrameWriter<T>> {
        // Poisoning only means another sender panicked; the buffer is reset per frame.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> std::fmt::Debug for SharedFrameWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFrameWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::codec::{decode_frame, HEADER_SIZE};
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .send(MessageType::UpdateFixables, br#"{"updates":{}}"#)
            .unwrap();

        let mut wire = written(writer);
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.kind, MessageType::UpdateFixables);
        assert_eq!(frame.body.as_ref(), br#"{"updates":{}}"#);
        assert!(wire.is_empty());
    }

    #[test]
    fn write_multiple_frames_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(MessageType::RegisterFixables, b"one").unwrap();
        writer.send(MessageType::UpdateFixables, b"two").unwrap();
        writer.send(MessageType::HangUp, b"").unwrap();

        let mut wire = written(writer);
        let f1 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!((f1.kind, f1.body.as_ref()), (MessageType::RegisterFixables, b"one".as_ref()));
        assert_eq!((f2.kind, f2.body.as_ref()), (MessageType::UpdateFixables, b"two".as_ref()));
        assert_eq!(f3.kind, MessageType::HangUp);
        assert_eq!(f3.wire_size(), HEADER_SIZE);
    }

    #[test]
    fn write_frame_keeps_raw_code() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame {
            kind: MessageType::Invalid,
            code: 42,
            body: bytes::Bytes::from_static(b"abc"),
        };
        writer.write_frame(&frame).unwrap();

        let mut wire = written(writer);
        let decoded = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(decoded.code, 42);
        assert_eq!(decoded.kind, MessageType::Invalid);
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(MessageType::UpdateFixables, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(MessageType::HangUp, b"").unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block() {
        let sink = FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        };
        let mut writer = FrameWriter::new(sink);
        writer.send(MessageType::UpdateFixables, b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE + 5);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(MessageType::UpdateFixables, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn written_bytes_read_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(MessageType::RegisterFixables, b"z").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(wire));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.kind, MessageType::RegisterFixables);
        assert_eq!(frame.body.as_ref(), b"z");
    }

    #[test]
    fn shared_writer_never_interleaves_frames() {
        let shared = SharedFrameWriter::new(FrameWriter::new(Cursor::new(Vec::<u8>::new())));
        let threads: Vec<_> = (0..4u8)
            .map(|n| {
                let writer = shared.clone();
                thread::spawn(move || {
                    let body = vec![b'a' + n; 512];
                    for _ in 0..25 {
                        writer.send(MessageType::UpdateFixables, &body).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let wire = shared.with_writer(|w| w.get_ref().get_ref().clone());
        let mut reader = FrameReader::new(Cursor::new(wire));
        let mut count = 0;
        while let Ok(frame) = reader.read_frame() {
            let first = frame.body[0];
            assert!(frame.body.iter().all(|b| *b == first));
            count += 1;
        }
        assert_eq!(count, 100);
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_stream() {
        let (left, _right) = FixaStream::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let writer = FrameWriter::with_config_stream(left, cfg).unwrap();
        assert_eq!(
            writer.config().write_timeout,
            Some(std::time::Duration::from_millis(10))
        );
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails once with each queued error kind before accepting writes.
    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
