//! Interval-based polling.
//!
//! A [`Poller`] runs one task on a recurring interval from a dedicated
//! background thread. The sleep is condvar-based so [`Poller::stop`]
//! cancels it promptly; stopping is idempotent and a task that is mid-run
//! is allowed to complete.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::sync;

struct Shared {
    stopped: Mutex<bool>,
    signal: Condvar,
}

/// A cancellable recurring task on its own thread.
pub struct Poller {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawns the polling thread. The first invocation of `task` happens
    /// one full `interval` after the start.
    pub fn start<F>(interval: Duration, mut task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stopped: Mutex::new(false),
            signal: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);

        let handle = std::thread::spawn(move || loop {
            let stopped = sync::lock(&thread_shared.stopped);
            let (stopped, timeout) = match thread_shared.signal.wait_timeout(stopped, interval) {
                Ok(woken) => woken,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *stopped {
                return;
            }
            if timeout.timed_out() {
                drop(stopped);
                task();
            }
        });

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Stops the poller and joins its thread. Idempotent; an in-flight
    /// task run completes first.
    pub fn stop(&mut self) {
        *sync::lock(&self.shared.stopped) = true;
        self.shared.signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
