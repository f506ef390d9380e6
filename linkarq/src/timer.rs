//! One-shot retransmission timer.
//!
//! A dedicated worker thread sleeps until an armed deadline and then
//! invokes the callback. `start` re-arms, `cancel` disarms; both bump an
//! epoch counter so a fire racing a cancel is a no-op and a stale fire
//! can never re-arm over a newer `start`. The callback runs without any
//! timer lock held and may itself take the caller's session mutex.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Locks a mutex, recovering the guard if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    epoch: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    tick: Condvar,
}

/// A cancellable one-shot timer backed by a worker thread.
///
/// The callback returns `Some(delay)` to re-arm itself, `None` to stay
/// idle. Dropping the timer stops the worker.
pub struct OneShotTimer {
    shared: Arc<TimerShared>,
    worker: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    /// Spawns the worker thread with the given fire callback.
    pub fn spawn<F>(mut on_fire: F) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            tick: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || {
            let mut state = lock(&worker_shared.state);
            loop {
                if state.shutdown {
                    return;
                }
                let Some(deadline) = state.deadline else {
                    state = worker_shared
                        .tick
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                    continue;
                };

                let now = Instant::now();
                if now < deadline {
                    let (next, _) = worker_shared
                        .tick
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = next;
                    continue;
                }

                let epoch = state.epoch;
                state.deadline = None;
                drop(state);

                let rearm = on_fire();

                state = lock(&worker_shared.state);
                if let Some(delay) = rearm {
                    // A start or cancel issued while the callback ran wins.
                    if state.epoch == epoch && !state.shutdown {
                        state.deadline = Some(Instant::now() + delay);
                    }
                }
            }
        });

        Self { shared, worker: Some(worker) }
    }

    /// Arms (or re-arms) the timer to fire after `delay`.
    pub fn start(&self, delay: Duration) {
        let mut state = lock(&self.shared.state);
        state.epoch += 1;
        state.deadline = Some(Instant::now() + delay);
        self.shared.tick.notify_all();
    }

    /// Disarms the timer. Cancelling an already-fired or idle timer is
    /// a no-op.
    pub fn cancel(&self) {
        let mut state = lock(&self.shared.state);
        state.epoch += 1;
        state.deadline = None;
        self.shared.tick.notify_all();
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.shared.state);
            state.shutdown = true;
            self.shared.tick.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
