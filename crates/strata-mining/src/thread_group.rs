//! Scoped group of named OS threads sharing one stop flag.

use crate::{MiningError, MiningResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single sleep while waiting on a stop flag.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Threads spawned together and stopped together.
///
/// Dropping the group stops and joins every thread.
pub struct ThreadGroup {
    name: String,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Arc::new(AtomicBool::new(true)),
            handles: Vec::new(),
        }
    }

    /// Spawn a thread named `<group>-<label>`. The closure receives the stop flag.
    pub fn spawn<F>(&mut self, label: &str, f: F) -> MiningResult<()>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        let thread_name = format!("{}-{}", self.name, label);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || f(running))
            .map_err(|e| MiningError::ThreadSpawn(format!("{}: {}", thread_name, e)))?;
        debug!(thread = %thread_name, "Thread spawned");
        self.handles.push(handle);
        Ok(())
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every thread to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Stop and wait for every thread.
    pub fn join(&mut self) {
        self.stop();
        let current = thread::current().id();
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "Thread panicked");
            }
        }
        if count > 0 {
            info!(group = %self.name, threads = count, "Thread group stopped");
        }
    }
}

impl Drop for ThreadGroup {
    fn drop(&mut self) {
        self.join();
    }
}

/// Sleep up to `duration`, returning early once `running` clears.
/// Returns whether the flag is still set.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
    false
}
