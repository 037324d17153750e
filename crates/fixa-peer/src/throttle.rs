//! Timer-armed flush for the controller's dirty set.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Runs a flush callback at most once per interval.
///
/// [`FlushTimer::arm`] schedules a flush `interval` from now unless one is
/// already scheduled; edits made before it fires share that flush. The
/// timer thread exits once the timer is stopped or dropped.
pub struct FlushTimer {
    shared: Arc<Shared>,
    interval: Duration,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    stopped: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FlushTimer {
    /// Start the timer thread.
    pub fn spawn(interval: Duration, flush: impl Fn() + Send + 'static) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState::default()),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("fixa-flush".to_string())
            .spawn(move || run(&worker, flush))?;
        Ok(Self { shared, interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule a flush unless one is already pending.
    pub fn arm(&self) {
        let mut state = self.shared.lock();
        if state.stopped || state.deadline.is_some() {
            return;
        }
        state.deadline = Some(Instant::now() + self.interval);
        self.shared.wake.notify_one();
    }

    /// Whether a flush is scheduled and has not run yet.
    pub fn is_armed(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    /// Cancel any pending flush and end the timer thread.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.stopped = true;
        state.deadline = None;
        self.shared.wake.notify_one();
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, flush: impl Fn()) {
    let mut state = shared.lock();
    loop {
        if state.stopped {
            return;
        }
        match state.deadline {
            None => {
                state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    state.deadline = None;
                    drop(state);
                    trace!("throttle fired");
                    flush();
                    state = shared.lock();
                } else {
                    state = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}
