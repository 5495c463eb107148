//! Main coordination queue.
//!
//! Loader and flush workers run off-thread and hand their results back as
//! closures. Whoever owns the queue (the UI loop, the CLI, a test) drains it,
//! so the live object graph and bus delivery only ever run on that thread.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct MainQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl Default for MainQueue {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }
}

impl MainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to run on the next drain. Never blocks.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.sender.send(Box::new(task));
    }

    /// Runs every task queued so far and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Drains tasks as they arrive until `done()` holds or `timeout` elapses.
    ///
    /// Returns the final value of `done()`.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => return done(),
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Debug for MainQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::MainQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn tasks_posted_from_other_threads_run_on_drain() {
        let queue = MainQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let worker_queue = queue.clone();
        let worker_counter = Arc::clone(&counter);
        std::thread::spawn(move || {
            worker_queue.post(move || {
                worker_counter.fetch_add(1, Ordering::SeqCst);
            });
        })
        .join()
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_until_times_out_when_condition_never_holds() {
        let queue = MainQueue::new();
        assert!(!queue.run_until(Duration::from_millis(20), || false));
    }
}
