//! Controller side of a session: mirror the device's fixables and push edits.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use fixa_frame::{FrameReader, FrameWriter, MessageType, SharedFrameWriter};
use fixa_transport::{FixaStream, TcpTransport, TransportError};
use fixa_wire::{
    FixableConfig, FixableId, FixableValue, RegistrationMessage, UpdateMessage, ValueKind,
    WireError,
};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{PeerError, Result};
use crate::session::{SessionState, SessionStatus};
use crate::throttle::FlushTimer;

/// Something the controller observed on its session.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The device registered its fixables; the session is live.
    SessionStarted {
        stream_name: String,
        fixables: Vec<(FixableId, FixableConfig)>,
    },
    /// The device pushed new values.
    ValuesUpdated {
        updates: BTreeMap<FixableId, FixableValue>,
    },
    /// The session closed, from either side.
    SessionEnded,
}

/// The controller endpoint for one device connection.
///
/// `set` records edits locally; they reach the device in coalesced
/// `UpdateFixables` messages, at most one per throttle interval.
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    peer: String,
    status: SessionStatus,
    stream: FixaStream,
    writer: SharedFrameWriter,
    mirror: Mutex<Option<Mirror>>,
    flush_lock: Mutex<()>,
    timer: OnceLock<FlushTimer>,
    events: Mutex<Vec<Sender<ControllerEvent>>>,
    ended: AtomicBool,
}

/// Local copy of the device's registration.
struct Mirror {
    registration: RegistrationMessage,
    kinds: HashMap<FixableId, Option<ValueKind>>,
    dirty: BTreeSet<FixableId>,
}

impl Controller {
    /// Connect to a device over TCP.
    pub fn connect(addr: impl ToSocketAddrs, config: ControllerConfig) -> Result<Self> {
        let stream = TcpTransport::connect_within(addr, config.connect_timeout)?;
        Self::attach(stream, config)
    }

    /// Run the controller side of a session over an established stream.
    pub fn attach(stream: FixaStream, config: ControllerConfig) -> Result<Self> {
        let reader = FrameReader::with_config_stream(stream.try_clone()?, config.frame.clone())?;
        let writer = FrameWriter::with_config_stream(stream.try_clone()?, config.frame.clone())?;
        let interval = config.throttle_interval;

        let inner = Arc::new(ControllerInner {
            peer: stream.peer_label(),
            config,
            status: SessionStatus::new(SessionState::HandshakePending),
            stream,
            writer: SharedFrameWriter::new(writer),
            mirror: Mutex::new(None),
            flush_lock: Mutex::new(()),
            timer: OnceLock::new(),
            events: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
        });

        if !interval.is_zero() {
            let weak = Arc::downgrade(&inner);
            let timer = FlushTimer::spawn(interval, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush_logged();
                }
            })
            .map_err(TransportError::Io)?;
            let _ = inner.timer.set(timer);
        }

        let reader_inner = Arc::clone(&inner);
        thread::Builder::new()
            .name("fixa-controller".to_string())
            .spawn(move || reader_inner.read_loop(reader))
            .map_err(TransportError::Io)?;

        info!(peer = %inner.peer, "connected to device");
        Ok(Self { inner })
    }

    pub fn state(&self) -> SessionState {
        self.inner.status.get()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.inner.status
    }

    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Block until the device has registered, then return its registration.
    pub fn wait_live(&self, timeout: Duration) -> Result<RegistrationMessage> {
        let reached = self.inner.status.wait_until(timeout, |state| {
            matches!(state, SessionState::Live | SessionState::Closed)
        });
        match reached {
            Some(SessionState::Live) => self.snapshot().ok_or(PeerError::Closed),
            Some(_) => Err(PeerError::Closed),
            None => Err(PeerError::Timeout(timeout)),
        }
    }

    /// The mirrored registration with current values, once live.
    pub fn snapshot(&self) -> Option<RegistrationMessage> {
        self.inner
            .lock_mirror()
            .as_ref()
            .map(|mirror| mirror.registration.clone())
    }

    /// Last known value of `id`.
    pub fn value(&self, id: &str) -> Option<FixableValue> {
        self.inner
            .lock_mirror()
            .as_ref()
            .and_then(|mirror| mirror.registration.values.get(id).copied())
    }

    /// Receive session events from now on.
    pub fn subscribe_events(&self) -> Receiver<ControllerEvent> {
        let (tx, rx) = mpsc::channel();
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Record an edit and schedule it for the device.
    pub fn set(&self, id: &str, value: impl Into<FixableValue>) -> Result<()> {
        let value = value.into();
        let state = self.inner.status.get();
        if state != SessionState::Live {
            return Err(PeerError::NotLive(state));
        }
        if !value.is_finite() {
            return Err(WireError::NonFinite {
                context: id.to_string(),
            }
            .into());
        }

        {
            let mut guard = self.inner.lock_mirror();
            let mirror = guard.as_mut().ok_or(PeerError::NotLive(state))?;
            let Some((key, expected)) = mirror.kinds.get_key_value(id) else {
                return Err(PeerError::UnknownFixable(id.into()));
            };
            if *expected != Some(value.kind()) {
                return Err(PeerError::KindMismatch {
                    id: key.clone(),
                    expected: *expected,
                    found: value.kind(),
                });
            }
            let key = key.clone();
            mirror.registration.values.insert(key.clone(), value);
            mirror.dirty.insert(key);
        }

        match self.inner.timer.get() {
            Some(timer) => timer.arm(),
            None => {
                self.inner.flush()?;
            }
        }
        Ok(())
    }

    /// Send pending edits now instead of waiting for the throttle.
    ///
    /// Returns how many entries were sent.
    pub fn flush_now(&self) -> Result<usize> {
        self.inner.flush()
    }

    /// Flush pending edits, send `HangUp` and close the connection.
    pub fn disconnect(&self) -> Result<()> {
        if self.inner.status.is_closed() {
            return Ok(());
        }
        let flushed = self.inner.flush();
        let sent = self
            .inner
            .writer
            .send(MessageType::HangUp, &[])
            .map_err(PeerError::from);
        self.inner.close();
        info!(peer = %self.inner.peer, "disconnected from device");
        flushed.and(sent)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("peer", &self.inner.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl ControllerInner {
    fn lock_mirror(&self) -> MutexGuard<'_, Option<Mirror>> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_loop(&self, mut reader: FrameReader<FixaStream>) {
        loop {
            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    if self.status.is_closed() {
                        debug!(peer = %self.peer, "reader stopped after local close");
                    } else if err.is_peer_closed() {
                        info!(peer = %self.peer, "device disconnected");
                    } else {
                        warn!(peer = %self.peer, %err, "session failed");
                    }
                    break;
                }
            };

            match frame.kind {
                MessageType::RegisterFixables => {
                    if self.status.is_live() {
                        warn!(peer = %self.peer, "ignoring registration on a live session");
                        continue;
                    }
                    match RegistrationMessage::decode(&frame.body) {
                        Ok(registration) => self.on_registration(registration),
                        Err(err) => {
                            warn!(peer = %self.peer, %err, "malformed registration, closing session");
                            break;
                        }
                    }
                }
                MessageType::UpdateFixables => {
                    if !self.status.is_live() {
                        warn!(peer = %self.peer, "ignoring update before registration");
                        continue;
                    }
                    match UpdateMessage::decode(&frame.body) {
                        Ok(update) => self.on_update(update),
                        Err(err) => {
                            warn!(peer = %self.peer, %err, "malformed update, closing session");
                            break;
                        }
                    }
                }
                MessageType::HangUp => {
                    info!(peer = %self.peer, "device hung up");
                    break;
                }
                MessageType::Invalid => {
                    warn!(peer = %self.peer, code = frame.code, "ignoring unknown frame type");
                }
            }
        }
        self.finish();
    }

    fn on_registration(&self, registration: RegistrationMessage) {
        let echo = UpdateMessage {
            updates: registration.values.clone(),
        };
        let event = ControllerEvent::SessionStarted {
            stream_name: registration.stream_name.clone(),
            fixables: registration.fixables.clone(),
        };
        let kinds = registration
            .flatten()
            .into_iter()
            .map(|(id, config)| (id.clone(), config.kind()))
            .collect();
        info!(
            peer = %self.peer,
            stream = %registration.stream_name,
            fixables = registration.fixables.len(),
            "device registered"
        );

        // The echo must reach the device before any edit can be flushed.
        {
            let _flushing = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
            *self.lock_mirror() = Some(Mirror {
                registration,
                kinds,
                dirty: BTreeSet::new(),
            });
            match echo.encode() {
                Ok(body) => {
                    if let Err(err) = self.writer.send(MessageType::UpdateFixables, &body) {
                        warn!(peer = %self.peer, %err, "failed to echo registered values");
                    }
                }
                Err(err) => warn!(peer = %self.peer, %err, "failed to encode registered values"),
            }
            self.status.set(SessionState::Live);
        }
        self.emit(event);
    }

    fn on_update(&self, update: UpdateMessage) {
        let mut accepted = BTreeMap::new();
        {
            let mut guard = self.lock_mirror();
            let Some(mirror) = guard.as_mut() else {
                return;
            };
            for (id, value) in update.updates {
                match mirror.kinds.get(&id) {
                    Some(expected) if *expected == Some(value.kind()) => {
                        mirror.registration.values.insert(id.clone(), value);
                        accepted.insert(id, value);
                    }
                    Some(_) => warn!(id = %id, found = %value.kind(), "ignoring value of the wrong kind"),
                    None => warn!(id = %id, "ignoring value for unknown fixable"),
                }
            }
        }
        if !accepted.is_empty() {
            debug!(peer = %self.peer, entries = accepted.len(), "device pushed values");
            self.emit(ControllerEvent::ValuesUpdated { updates: accepted });
        }
    }

    /// Send every dirty entry with its latest value in one message.
    fn flush(&self) -> Result<usize> {
        let _flushing = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let update: UpdateMessage = {
            let mut guard = self.lock_mirror();
            let Some(mirror) = guard.as_mut() else {
                return Ok(0);
            };
            let dirty = std::mem::take(&mut mirror.dirty);
            dirty
                .into_iter()
                .filter_map(|id| {
                    let value = mirror.registration.values.get(&id).copied()?;
                    Some((id, value))
                })
                .collect()
        };
        if update.is_empty() {
            return Ok(0);
        }
        if !self.status.is_live() {
            debug!(peer = %self.peer, entries = update.len(), "session not live, dropping edits");
            return Ok(0);
        }

        let body = update.encode()?;
        self.writer.send(MessageType::UpdateFixables, &body)?;
        debug!(peer = %self.peer, entries = update.len(), "edits flushed");
        Ok(update.len())
    }

    fn flush_logged(&self) {
        if let Err(err) = self.flush() {
            warn!(peer = %self.peer, %err, "failed to flush edits");
        }
    }

    fn close(&self) {
        if let Some(timer) = self.timer.get() {
            timer.stop();
        }
        if let Err(err) = self.stream.shutdown() {
            debug!(peer = %self.peer, %err, "shutdown failed");
        }
        self.status.set(SessionState::Closed);
    }

    fn finish(&self) {
        self.close();
        if !self.ended.swap(true, Ordering::SeqCst) {
            info!(peer = %self.peer, "session ended");
            self.emit(ControllerEvent::SessionEnded);
        }
    }

    fn emit(&self, event: ControllerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use fixa_frame::{Frame, FrameError};
    use fixa_wire::Color;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    /// The device end of a stream pair, driven by hand.
    struct FakeDevice {
        reader: FrameReader<FixaStream>,
        writer: FrameWriter<FixaStream>,
    }

    impl FakeDevice {
        fn new(stream: FixaStream) -> Self {
            let reader = FrameReader::new(stream.try_clone().expect("clone should succeed"));
            Self {
                reader,
                writer: FrameWriter::new(stream),
            }
        }

        fn register(&mut self) {
            let registration = RegistrationMessage {
                stream_name: "Demo".to_string(),
                fixables: vec![
                    ("Open".into(), FixableConfig::bool("Open")),
                    ("Size".into(), FixableConfig::float("Size", 0.0, 100.0)),
                    (
                        "Look".into(),
                        FixableConfig::group(
                            "Look",
                            [("Tint", FixableConfig::color("Tint"))],
                        ),
                    ),
                ],
                values: [
                    ("Open".into(), FixableValue::Bool(false)),
                    ("Size".into(), FixableValue::Float(50.0)),
                    ("Tint".into(), FixableValue::Color(Color::WHITE)),
                ]
                .into_iter()
                .collect(),
            };
            let body = registration.encode().expect("registration should encode");
            self.writer
                .send(MessageType::RegisterFixables, &body)
                .expect("send should succeed");
        }

        fn recv(&mut self) -> Frame {
            self.reader.read_frame().expect("frame should arrive")
        }

        fn recv_update(&mut self) -> UpdateMessage {
            let frame = self.recv();
            assert_eq!(frame.kind, MessageType::UpdateFixables);
            UpdateMessage::decode(&frame.body).expect("update should decode")
        }
    }

    fn pair(config: ControllerConfig) -> (Controller, FakeDevice) {
        let (controller_end, device_end) = FixaStream::pair().expect("pair should open");
        let controller = Controller::attach(controller_end, config).expect("attach should succeed");
        (controller, FakeDevice::new(device_end))
    }

    fn live_pair(config: ControllerConfig) -> (Controller, FakeDevice) {
        let (controller, mut device) = pair(config);
        device.register();
        controller.wait_live(WAIT).expect("session should go live");
        let echo = device.recv_update();
        assert_eq!(echo.len(), 3);
        (controller, device)
    }

    #[test]
    fn registration_is_echoed_back() {
        let (controller, mut device) = pair(ControllerConfig::default());
        let events = controller.subscribe_events();
        assert_eq!(controller.state(), SessionState::HandshakePending);

        device.register();
        let echo = device.recv_update();
        assert_eq!(echo.updates.get("Open"), Some(&FixableValue::Bool(false)));
        assert_eq!(echo.updates.get("Size"), Some(&FixableValue::Float(50.0)));
        assert_eq!(echo.updates.get("Tint"), Some(&FixableValue::Color(Color::WHITE)));

        match events.recv_timeout(WAIT).expect("event should arrive") {
            ControllerEvent::SessionStarted {
                stream_name,
                fixables,
            } => {
                assert_eq!(stream_name, "Demo");
                assert_eq!(fixables.len(), 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(controller.state(), SessionState::Live);
        assert_eq!(controller.value("Size"), Some(FixableValue::Float(50.0)));
    }

    #[test]
    fn set_before_live_is_rejected() {
        let (controller, _device) = pair(ControllerConfig::default());
        let err = controller.set("Open", true).unwrap_err();
        assert!(matches!(
            err,
            PeerError::NotLive(SessionState::HandshakePending)
        ));
    }

    #[test]
    fn set_validates_id_and_kind() {
        let (controller, _device) = live_pair(ControllerConfig::default());

        let err = controller.set("Missing", true).unwrap_err();
        assert!(matches!(err, PeerError::UnknownFixable(ref id) if id == "Missing"));

        let err = controller.set("Size", true).unwrap_err();
        assert!(matches!(
            err,
            PeerError::KindMismatch {
                expected: Some(ValueKind::Float),
                found: ValueKind::Bool,
                ..
            }
        ));

        let err = controller.set("Look", true).unwrap_err();
        assert!(matches!(err, PeerError::KindMismatch { expected: None, .. }));

        let err = controller.set("Size", f32::NAN).unwrap_err();
        assert!(matches!(err, PeerError::Wire(WireError::NonFinite { .. })));
        assert_eq!(controller.value("Size"), Some(FixableValue::Float(50.0)));
    }

    #[test]
    fn rapid_edits_coalesce_into_one_update() {
        let config = ControllerConfig::default().with_throttle_interval(Duration::from_millis(100));
        let (controller, mut device) = live_pair(config);

        let started = Instant::now();
        for size in [10.0_f32, 20.0, 30.0, 40.0] {
            controller.set("Size", size).expect("set should succeed");
        }
        controller.set("Open", true).expect("set should succeed");

        let update = device.recv_update();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(update.len(), 2);
        assert_eq!(update.updates.get("Size"), Some(&FixableValue::Float(40.0)));
        assert_eq!(update.updates.get("Open"), Some(&FixableValue::Bool(true)));

        // Nothing else pending.
        assert_eq!(controller.flush_now().expect("flush should succeed"), 0);
    }

    #[test]
    fn zero_interval_sends_each_edit() {
        let config = ControllerConfig::default().with_throttle_interval(Duration::ZERO);
        let (controller, mut device) = live_pair(config);

        controller.set("Size", 1.0_f32).expect("set should succeed");
        controller.set("Size", 2.0_f32).expect("set should succeed");

        assert_eq!(
            device.recv_update().updates.get("Size"),
            Some(&FixableValue::Float(1.0))
        );
        assert_eq!(
            device.recv_update().updates.get("Size"),
            Some(&FixableValue::Float(2.0))
        );
    }

    #[test]
    fn echo_is_sent_before_the_first_edit() {
        let config = ControllerConfig::default().with_throttle_interval(Duration::ZERO);
        for _ in 0..50 {
            let (controller, mut device) = pair(config.clone());
            device.register();
            controller.wait_live(WAIT).expect("session should go live");
            controller.set("Open", true).expect("set should succeed");

            let echo = device.recv_update();
            assert_eq!(echo.len(), 3);
            assert_eq!(echo.updates.get("Open"), Some(&FixableValue::Bool(false)));
            let edit = device.recv_update();
            assert_eq!(edit.len(), 1);
            assert_eq!(edit.updates.get("Open"), Some(&FixableValue::Bool(true)));
        }
    }

    #[test]
    fn flush_now_skips_the_timer() {
        let config = ControllerConfig::default().with_throttle_interval(Duration::from_secs(60));
        let (controller, mut device) = live_pair(config);

        controller
            .set("Tint", Color::rgb(1.0, 0.0, 0.0))
            .expect("set should succeed");
        assert_eq!(controller.flush_now().expect("flush should succeed"), 1);
        assert_eq!(
            device.recv_update().updates.get("Tint"),
            Some(&FixableValue::Color(Color::rgb(1.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn device_updates_refresh_the_mirror() {
        let (controller, mut device) = live_pair(ControllerConfig::default());
        let events = controller.subscribe_events();

        let mut update = UpdateMessage::new();
        update.insert("Size", FixableValue::Float(75.0));
        update.insert("Open", FixableValue::Float(1.0));
        update.insert("Ghost", FixableValue::Bool(true));
        device
            .writer
            .send(MessageType::UpdateFixables, &update.encode().unwrap())
            .expect("send should succeed");

        match events.recv_timeout(WAIT).expect("event should arrive") {
            ControllerEvent::ValuesUpdated { updates } => {
                assert_eq!(updates.len(), 1);
                assert_eq!(updates.get("Size"), Some(&FixableValue::Float(75.0)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(controller.value("Open"), Some(FixableValue::Bool(false)));
    }

    #[test]
    fn malformed_registration_closes_session() {
        let (controller, mut device) = pair(ControllerConfig::default());
        let events = controller.subscribe_events();

        device
            .writer
            .send(MessageType::RegisterFixables, br#"{"streamName":"x","fixables":[["A",{}]],"values":{}}"#)
            .expect("send should succeed");

        assert_eq!(
            events.recv_timeout(WAIT).expect("event should arrive"),
            ControllerEvent::SessionEnded
        );
        assert_eq!(controller.state(), SessionState::Closed);
        assert!(matches!(controller.wait_live(WAIT), Err(PeerError::Closed)));
    }

    #[test]
    fn device_hang_up_ends_session() {
        let (controller, mut device) = live_pair(ControllerConfig::default());
        let events = controller.subscribe_events();

        device
            .writer
            .send(MessageType::HangUp, b"")
            .expect("send should succeed");

        assert_eq!(
            events.recv_timeout(WAIT).expect("event should arrive"),
            ControllerEvent::SessionEnded
        );
        let err = controller.set("Open", true).unwrap_err();
        assert!(matches!(err, PeerError::NotLive(SessionState::Closed)));
    }

    #[test]
    fn disconnect_flushes_then_hangs_up() {
        let config = ControllerConfig::default().with_throttle_interval(Duration::from_secs(60));
        let (controller, mut device) = live_pair(config);

        controller.set("Open", true).expect("set should succeed");
        controller.disconnect().expect("disconnect should succeed");
        assert_eq!(controller.state(), SessionState::Closed);

        let update = device.recv_update();
        assert_eq!(update.updates.get("Open"), Some(&FixableValue::Bool(true)));
        assert_eq!(device.recv().kind, MessageType::HangUp);
        let err = device.reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed | FrameError::Io(_)));

        controller.disconnect().expect("second disconnect should be a no-op");
    }

    #[test]
    fn wait_live_times_out_without_registration() {
        let (controller, _device) = pair(ControllerConfig::default());
        let err = controller.wait_live(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
    }
}
