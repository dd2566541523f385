//! A pool of single-threaded I/O executors.
//!
//! Each slot owns a current-thread tokio runtime driven by a dedicated
//! thread. A session spawned on a slot stays pinned to that thread for its
//! whole lifetime. [`IoThreadPool::get_executor`] hands out slots round-robin
//! so accepted connections spread evenly across the pool.
//!
//! The guard token plays the role of an executor work guard: a slot's thread
//! keeps its runtime alive until the guard is released by
//! [`join`](IoThreadPool::join), which then waits for the slot's outstanding
//! sessions to drain. [`stop`](IoThreadPool::stop) tears the runtimes down
//! without draining; pending sessions are dropped.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use thiserror::Error;
use tokio::runtime;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("number of worker threads cannot be 0")]
    ZeroSized,

    #[error("failed to start worker: {source}")]
    Spawn {
        #[from]
        source: std::io::Error,
    },
}

struct Slot {
    handle: runtime::Handle,
    tracker: TaskTracker,
    guard: CancellationToken,
    halt: CancellationToken,
}

/// A fixed-size pool of single-threaded executors.
pub struct IoThreadPool {
    slots: Vec<Slot>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    next_executor: AtomicUsize,
}

impl IoThreadPool {
    /// Builds a pool of `num_threads` single-threaded runtimes.
    ///
    /// Fails with [`PoolError::ZeroSized`] when `num_threads` is 0.
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        if num_threads == 0 {
            return Err(PoolError::ZeroSized);
        }

        let mut slots = Vec::with_capacity(num_threads);
        let mut threads = Vec::with_capacity(num_threads);

        for i in 0..num_threads {
            let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
            let handle = runtime.handle().clone();
            let tracker = TaskTracker::new();
            let guard = CancellationToken::new();
            let halt = CancellationToken::new();

            let thread = {
                let tracker = tracker.clone();
                let guard = guard.clone();
                let halt = halt.clone();
                thread::Builder::new().name(format!("wicket-io-{i}")).spawn(move || {
                    runtime.block_on(async {
                        tokio::select! {
                            // Guard released: drain outstanding work, then
                            // let the runtime wind down.
                            _ = guard.cancelled() => {
                                tracker.close();
                                tracker.wait().await;
                            }
                            // Forced stop: abandon pending work.
                            _ = halt.cancelled() => {}
                        }
                    });
                })?
            };

            slots.push(Slot { handle, tracker, guard, halt });
            threads.push(thread);
        }

        Ok(Self { slots, threads: Mutex::new(threads), next_executor: AtomicUsize::new(0) })
    }

    /// Round-robin scheduling.
    pub fn get_executor(&self) -> Executor<'_> {
        let idx = self.next_executor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        Executor { slot: &self.slots[idx] }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until the pool threads have completed all outstanding work.
    ///
    /// After `join()` it is unspecified whether newly submitted work will be
    /// executed.
    pub fn join(&self) {
        for slot in &self.slots {
            slot.guard.cancel();
        }
        self.join_threads();
    }

    /// Stops the pool as soon as possible. Pending work is not executed.
    pub fn stop(&self) {
        for slot in &self.slots {
            slot.halt.cancel();
        }
        self.join_threads();
    }

    fn join_threads(&self) {
        let mut threads = self.threads.lock().unwrap();
        for thread in threads.drain(..) {
            if thread.join().is_err() {
                error!("io worker thread panicked");
            }
        }
    }
}

impl Drop for IoThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One slot of the pool; spawned futures stay pinned to its thread.
pub struct Executor<'pool> {
    slot: &'pool Slot,
}

impl Executor<'_> {
    pub fn spawn<F>(&self, future: F)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.slot.tracker.spawn_on(future, &self.slot.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn zero_sized_pool_is_rejected() {
        assert!(matches!(IoThreadPool::new(0), Err(PoolError::ZeroSized)));
    }

    #[test]
    fn executors_are_handed_out_round_robin() {
        let pool = IoThreadPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();

        for _ in 0..4 {
            let tx = tx.clone();
            pool.get_executor().spawn(async move {
                let name = thread::current().name().unwrap_or_default().to_string();
                tx.send(name).unwrap();
            });
        }

        let mut names = Vec::new();
        for _ in 0..4 {
            names.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }

        assert_eq!(names[0], names[2]);
        assert_eq!(names[1], names[3]);
        assert_ne!(names[0], names[1]);
        assert!(names[0].starts_with("wicket-io-"));

        pool.join();
    }

    #[test]
    fn join_waits_for_outstanding_work() {
        let pool = IoThreadPool::new(1).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        {
            let done = done.clone();
            pool.get_executor().spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.store(true, Ordering::SeqCst);
            });
        }

        pool.join();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn tasks_run_concurrently_within_a_slot() {
        let pool = IoThreadPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..2 {
            let tx = tx.clone();
            pool.get_executor().spawn(async move {
                // Both tasks sleep; a single-threaded runtime interleaves
                // them, so the total wait stays well under the serial sum.
                tokio::time::sleep(Duration::from_millis(100)).await;
                tx.send(i).unwrap();
            });
        }

        let started = std::time::Instant::now();
        let mut received = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        received.sort_unstable();
        assert_eq!(received, vec![0, 1]);
        assert!(started.elapsed() < Duration::from_millis(190));

        pool.join();
    }
}
