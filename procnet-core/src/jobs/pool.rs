//! Worker Pools
//!
//! A worker pool runs background tasks off the evaluation thread. The pool
//! is shared: one network hands the same pool to every processor it owns,
//! and several networks may share a pool.
//!
//! Two implementations are provided:
//!
//! - [`ThreadPool`]: a tokio runtime whose blocking-thread pool executes
//!   the tasks.
//! - [`ManualPool`]: a queue that only runs tasks when told to. Tests use it
//!   to interleave worker and evaluation-thread steps deterministically.

use std::collections::VecDeque;
use std::fmt;
use std::io;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};

use crate::config::NetworkConfig;

/// A unit of work for a pool.
pub type PoolTask = Box<dyn FnOnce() + Send + 'static>;

/// Executes background tasks.
pub trait WorkerPool: Send + Sync {
    /// Queue a task for execution. Must not block on the task.
    fn enqueue(&self, task: PoolTask);
}

/// Pool backed by the blocking threads of a tokio runtime.
pub struct ThreadPool {
    runtime: Option<Runtime>,
    threads: usize,
}

impl ThreadPool {
    /// Create a pool with at most `threads` concurrently running tasks.
    pub fn new(threads: usize, thread_name: &str) -> io::Result<Self> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads)
            .thread_name(thread_name)
            .build()?;

        tracing::debug!(threads, "worker pool started");
        Ok(Self {
            runtime: Some(runtime),
            threads,
        })
    }

    /// Create a pool sized by the configuration.
    pub fn from_config(config: &NetworkConfig) -> io::Result<Self> {
        Self::new(config.resolved_worker_threads(), &config.thread_name)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl WorkerPool for ThreadPool {
    fn enqueue(&self, task: PoolTask) {
        match &self.runtime {
            // The join handle is not needed; results come back through the
            // dispatch queue.
            Some(runtime) => drop(runtime.spawn_blocking(task)),
            None => tracing::warn!("worker pool is shut down, dropping task"),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Pool that queues tasks until they are run explicitly.
#[derive(Default)]
pub struct ManualPool {
    queue: Mutex<VecDeque<PoolTask>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Run the oldest queued task. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        // Release the lock before running; tasks may enqueue more work.
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run queued tasks until the queue is empty. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }

    /// Drop all queued tasks without running them.
    pub fn discard_all(&self) -> usize {
        let mut queue = self.queue.lock();
        let count = queue.len();
        queue.clear();
        count
    }
}

impl WorkerPool for ManualPool {
    fn enqueue(&self, task: PoolTask) {
        self.queue.lock().push_back(task);
    }
}

impl fmt::Debug for ManualPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualPool")
            .field("queued", &self.len())
            .finish()
    }
}
