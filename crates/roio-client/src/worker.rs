use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{ClientError, Result};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// A named background thread with a cooperative stop flag.
pub(crate) struct Worker {
    name: &'static str,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a thread called `name`. The body receives the stop
    /// flag and must return once it reads `false`.
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))
            .map_err(|source| ClientError::Spawn { name, source })?;
        debug!(thread = name, "worker spawned");
        Ok(Self {
            name,
            running,
            handle: Some(handle),
        })
    }

    /// Clear the stop flag and join with a deadline.
    ///
    /// Returns `false` when the thread is still running at the deadline; it
    /// is then detached and left to exit on its own.
    pub(crate) fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(thread = self.name, ?timeout, "worker did not stop in time, detaching");
                return false;
            }
            thread::sleep(JOIN_POLL);
        }

        if handle.join().is_err() {
            warn!(thread = self.name, "worker panicked");
        }
        debug!(thread = self.name, "worker stopped");
        true
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_joins_cooperative_thread() {
        let mut worker = Worker::spawn("test-coop", |running| {
            while running.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();
        assert!(worker.stop(Duration::from_secs(1)));
        assert!(worker.stop(Duration::from_secs(1)));
    }

    #[test]
    fn stop_detaches_stuck_thread() {
        let mut worker = Worker::spawn("test-stuck", |_running| {
            thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        let start = Instant::now();
        assert!(!worker.stop(Duration::from_millis(30)));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn thread_is_named() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut worker = Worker::spawn("roio-test-name", move |_running| {
            let _ = tx.send(thread::current().name().map(str::to_string));
        })
        .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("roio-test-name"));
        worker.stop(Duration::from_secs(1));
    }
}
