//! Device side of a session: announce the registry, apply incoming edits.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fixa_frame::{FrameReader, FrameWriter, MessageType, SharedFrameWriter};
use fixa_registry::Registry;
use fixa_transport::{FixaStream, TcpTransport, TransportError};
use fixa_wire::{FixableId, UpdateMessage};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::session::{SessionState, SessionStatus};

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The device endpoint. Serves one controller at a time; a new connection
/// supersedes the current one.
///
/// Cheap to clone; clones share the same registry and session.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    registry: Registry,
    config: DeviceConfig,
    listening: AtomicBool,
    current: Mutex<Option<Arc<DeviceSession>>>,
    update_subscribers: Mutex<Vec<Sender<Vec<FixableId>>>>,
    next_session: AtomicU64,
}

/// One accepted controller connection.
pub struct DeviceSession {
    id: u64,
    peer: String,
    status: SessionStatus,
    cancelled: AtomicBool,
    stream: FixaStream,
    writer: SharedFrameWriter,
}

impl DeviceSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address of the controller.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> SessionState {
        self.status.get()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Whether a newer connection replaced this one.
    pub fn is_superseded(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn send(&self, kind: MessageType, body: &[u8]) -> Result<()> {
        if self.is_superseded() {
            debug!(session = self.id, frame_type = %kind, "dropping send on superseded session");
            return Ok(());
        }
        self.writer.send(kind, body)?;
        Ok(())
    }

    /// Stop applying this session's updates. Set while `current` is held.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        if let Err(err) = self.stream.shutdown() {
            debug!(session = self.id, %err, "shutdown failed");
        }
        self.status.set(SessionState::Closed);
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("superseded", &self.is_superseded())
            .finish()
    }
}

impl Device {
    pub fn new(registry: Registry, config: DeviceConfig) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                registry,
                config,
                listening: AtomicBool::new(false),
                current: Mutex::new(None),
                update_subscribers: Mutex::new(Vec::new()),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// Take over `stream` as the active session and send the registration.
    ///
    /// Any previous session is closed first and none of its later updates
    /// are applied.
    pub fn attach(&self, stream: FixaStream) -> Result<Arc<DeviceSession>> {
        let frame_config = self.inner.config.frame.clone();
        let reader = FrameReader::with_config_stream(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream.try_clone()?, frame_config)?;

        let session = Arc::new(DeviceSession {
            id: self.inner.next_session.fetch_add(1, Ordering::Relaxed),
            peer: stream.peer_label(),
            status: SessionStatus::new(SessionState::HandshakePending),
            cancelled: AtomicBool::new(false),
            stream,
            writer: SharedFrameWriter::new(writer),
        });

        let previous = {
            let mut current = self.inner.lock_current();
            let previous = current.replace(Arc::clone(&session));
            if let Some(previous) = &previous {
                previous.cancel();
            }
            previous
        };
        if let Some(previous) = previous {
            if !previous.status.is_closed() {
                info!(
                    session = previous.id,
                    peer = %previous.peer,
                    "superseding controller session"
                );
            }
            previous.close();
        }
        info!(session = session.id, peer = %session.peer, "controller attached");

        let inner = Arc::clone(&self.inner);
        let reader_session = Arc::clone(&session);
        let spawned = thread::Builder::new()
            .name(format!("fixa-device-{}", session.id))
            .spawn(move || inner.read_loop(&reader_session, reader));
        if let Err(err) = spawned {
            session.close();
            return Err(TransportError::Io(err).into());
        }

        if let Err(err) = self.send_registration(&session) {
            warn!(session = session.id, %err, "failed to send registration");
            session.close();
            return Err(err);
        }
        Ok(session)
    }

    fn send_registration(&self, session: &DeviceSession) -> Result<()> {
        let registration = self
            .inner
            .registry
            .registration(self.inner.config.stream_name.as_str());
        let body = registration.encode()?;
        session.send(MessageType::RegisterFixables, &body)?;
        debug!(
            session = session.id,
            fixables = registration.fixables.len(),
            bytes = body.len(),
            "registration sent"
        );
        Ok(())
    }

    /// Accept controllers on `listener` for as long as the process runs.
    /// Failed accepts are logged and retried.
    pub fn listen(&self, listener: &TcpTransport) -> Result<()> {
        self.accept_loop(|| listener.accept(), &AtomicBool::new(false))
    }

    /// Run the accept loop on a background thread.
    pub fn spawn_listener(&self, listener: TcpTransport) -> Result<ListenerHandle> {
        let addr = listener.local_addr();
        let stop = Arc::new(AtomicBool::new(false));
        let device = self.clone();
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("fixa-listener".to_string())
            .spawn(move || device.accept_loop(|| listener.accept(), &flag))
            .map_err(TransportError::Io)?;

        Ok(ListenerHandle {
            addr,
            stop,
            thread: Some(thread),
        })
    }

    fn accept_loop(
        &self,
        mut accept: impl FnMut() -> fixa_transport::Result<FixaStream>,
        stop: &AtomicBool,
    ) -> Result<()> {
        self.inner.listening.store(true, Ordering::SeqCst);
        while !stop.load(Ordering::SeqCst) {
            let stream = match accept() {
                Ok(stream) => stream,
                Err(err) => {
                    if !stop.load(Ordering::SeqCst) {
                        warn!(%err, "accept failed, retrying");
                        thread::sleep(ACCEPT_RETRY_DELAY);
                    }
                    continue;
                }
            };
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if let Err(err) = self.attach(stream) {
                warn!(%err, "failed to start controller session");
            }
        }
        self.inner.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Receive the ids applied by each incoming update.
    pub fn subscribe_updates(&self) -> Receiver<Vec<FixableId>> {
        let (tx, rx) = mpsc::channel();
        self.inner
            .update_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// The active (or most recent) session.
    pub fn session(&self) -> Option<Arc<DeviceSession>> {
        self.inner.lock_current().clone()
    }

    pub fn state(&self) -> SessionState {
        let session = self.session();
        match session {
            Some(session) if !session.status.is_closed() => session.state(),
            _ if self.inner.listening.load(Ordering::SeqCst) => SessionState::Listening,
            Some(_) => SessionState::Closed,
            None => SessionState::Idle,
        }
    }

    /// Tell the controller we are leaving and close the session.
    pub fn hang_up(&self) -> Result<()> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        if session.status.is_closed() {
            return Ok(());
        }
        let sent = session.send(MessageType::HangUp, &[]);
        session.close();
        info!(session = session.id, "hung up on controller");
        sent
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("stream_name", &self.inner.config.stream_name)
            .field("state", &self.state())
            .field("fixables", &self.inner.registry.len())
            .finish()
    }
}

impl DeviceInner {
    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<DeviceSession>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_loop(&self, session: &DeviceSession, mut reader: FrameReader<FixaStream>) {
        loop {
            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    if session.is_superseded() || session.status.is_closed() {
                        debug!(session = session.id, "reader stopped after local close");
                    } else if err.is_peer_closed() {
                        info!(session = session.id, peer = %session.peer, "controller disconnected");
                    } else {
                        warn!(session = session.id, peer = %session.peer, %err, "session failed");
                    }
                    break;
                }
            };
            if session.is_superseded() {
                break;
            }
            session.status.set(SessionState::Live);

            match frame.kind {
                MessageType::UpdateFixables => {
                    let update = match UpdateMessage::decode(&frame.body) {
                        Ok(update) => update,
                        Err(err) => {
                            warn!(session = session.id, %err, "malformed update, closing session");
                            break;
                        }
                    };
                    if !self.apply(session, update) {
                        break;
                    }
                }
                MessageType::HangUp => {
                    info!(session = session.id, "controller hung up");
                    break;
                }
                MessageType::RegisterFixables | MessageType::Invalid => {
                    warn!(
                        session = session.id,
                        frame_type = %frame.kind,
                        code = frame.code,
                        "ignoring unexpected frame"
                    );
                }
            }
        }
        session.close();
    }

    /// Apply a decoded update unless the session has been superseded.
    fn apply(&self, session: &DeviceSession, update: UpdateMessage) -> bool {
        let applied = {
            let _current = self.lock_current();
            if session.is_superseded() {
                return false;
            }
            self.registry.apply_all(update.updates)
        };
        debug!(session = session.id, applied = applied.len(), "update applied");
        if !applied.is_empty() {
            self.notify(applied);
        }
        true
    }

    fn notify(&self, applied: Vec<FixableId>) {
        self.update_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(applied.clone()).is_ok());
    }
}

/// Background accept loop started by [`Device::spawn_listener`].
pub struct ListenerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit. The active
    /// session, if any, is left running.
    pub fn stop(mut self) -> Result<()> {
        self.signal_stop();
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => Ok(()),
        }
    }

    fn signal_stop(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        // accept() only returns on a connection; make one.
        let wake = match self.addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.addr.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), self.addr.port())
            }
            _ => self.addr,
        };
        if let Err(err) = TcpTransport::connect(wake) {
            debug!(%err, "could not wake listener");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.signal_stop();
        }
    }
}
