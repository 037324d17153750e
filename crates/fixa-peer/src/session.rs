use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Lifecycle of one protocol session.
///
/// `Idle → Listening → HandshakePending → Live → Closed`. `Closed` is
/// terminal for a session; a new connection gets a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Listening,
    HandshakePending,
    Live,
    Closed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::HandshakePending => "handshake-pending",
            Self::Live => "live",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared, observable session state.
///
/// Clones observe the same state. Once `Closed`, further transitions are
/// ignored.
#[derive(Clone)]
pub struct SessionStatus {
    inner: Arc<(Mutex<SessionState>, Condvar)>,
}

impl SessionStatus {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new((Mutex::new(state), Condvar::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> SessionState {
        *self.lock()
    }

    pub fn is_live(&self) -> bool {
        self.get() == SessionState::Live
    }

    pub fn is_closed(&self) -> bool {
        self.get() == SessionState::Closed
    }

    /// Move to `next`. Returns the previous state, or `None` if the session
    /// was already closed and nothing changed.
    pub(crate) fn set(&self, next: SessionState) -> Option<SessionState> {
        let mut state = self.lock();
        let previous = *state;
        if previous == SessionState::Closed {
            return None;
        }
        if previous != next {
            debug!(from = %previous, to = %next, "session state changed");
            *state = next;
            self.inner.1.notify_all();
        }
        Some(previous)
    }

    /// Block until the state is `target` or the session closes.
    ///
    /// Returns `true` if `target` was reached within `timeout`.
    pub fn wait_for(&self, target: SessionState, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state == target || state == SessionState::Closed)
            == Some(target)
    }

    /// Block until `done` accepts the state. Returns the accepted state, or
    /// `None` on timeout.
    pub fn wait_until(
        &self,
        timeout: Duration,
        mut done: impl FnMut(SessionState) -> bool,
    ) -> Option<SessionState> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if done(*state) {
                return Some(*state);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .inner
                .1
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl fmt::Debug for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionStatus").field(&self.get()).finish()
    }
}
