//! Job submissions.
//!
//! A [`Submission`] bundles the tasks of one job with the callback that
//! applies their results. Tasks run on the worker pool; the callback runs on
//! the evaluation thread with mutable access to the processor, and only if
//! the job is still the processor's latest and was not stopped.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{panic_message, ProcessError, TaskError};
use crate::processor::ProcessorBase;

use super::dispatch::JobOutcome;
use super::state::{JobState, Progress, TaskContext};

type Task<T> = Box<dyn FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static>;
type DoneFn<T> =
    Box<dyn FnOnce(&mut ProcessorBase, Vec<T>) -> Result<(), ProcessError> + Send + 'static>;

/// A set of background tasks and the callback consuming their results.
pub struct Submission<T> {
    tasks: Vec<Task<T>>,
    done: DoneFn<T>,
}

impl<T: Send + 'static> Submission<T> {
    /// Start a submission. `done` receives the results in task order.
    pub fn new<D>(done: D) -> Self
    where
        D: FnOnce(&mut ProcessorBase, Vec<T>) -> Result<(), ProcessError> + Send + 'static,
    {
        Self {
            tasks: Vec::new(),
            done: Box::new(done),
        }
    }

    /// A submission with one task whose result goes straight to `done`.
    pub fn single<F, D>(task: F, done: D) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
        D: FnOnce(&mut ProcessorBase, T) -> Result<(), ProcessError> + Send + 'static,
    {
        Self::new(move |base, mut results: Vec<T>| match results.pop() {
            Some(result) => done(base, result),
            None => Ok(()),
        })
        .task(task)
    }

    /// Add a task.
    pub fn task<F>(mut self, task: F) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
    {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<Task<T>>, Collector<T>) {
        let collector = Collector {
            results: Mutex::new((0..self.tasks.len()).map(|_| None).collect()),
            failure: Mutex::new(None),
            remaining: AtomicUsize::new(self.tasks.len()),
            done: Mutex::new(Some(self.done)),
        };
        (self.tasks, collector)
    }
}

impl<T> fmt::Debug for Submission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Gathers task results and posts the job outcome once the last task ends.
pub(crate) struct Collector<T> {
    results: Mutex<Vec<Option<T>>>,
    failure: Mutex<Option<TaskError>>,
    remaining: AtomicUsize,
    done: Mutex<Option<DoneFn<T>>>,
}

impl<T: Send + 'static> Collector<T> {
    /// Run one task on the current (worker) thread.
    pub(crate) fn run(&self, state: &Arc<JobState>, index: usize, task: Task<T>) {
        let progress = Progress::new(Arc::clone(state), index);
        let context = TaskContext::new(progress.clone());

        let result = if state.is_stopped() {
            Err(TaskError::Cancelled)
        } else {
            panic::catch_unwind(AssertUnwindSafe(|| task(&context)))
                .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(&*payload))))
        };

        match result {
            Ok(value) => {
                if let Some(slot) = self.results.lock().get_mut(index) {
                    *slot = Some(value);
                }
            }
            Err(err) => {
                let mut failure = self.failure.lock();
                // Keep the first real failure over cancellations.
                let replace = match &*failure {
                    None => true,
                    Some(TaskError::Cancelled) => err != TaskError::Cancelled,
                    Some(_) => false,
                };
                if replace {
                    *failure = Some(err);
                }
            }
        }

        progress.complete();
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish(state);
        }
    }

    /// Post the job outcome. Called exactly once, by the last task to end,
    /// or directly for a job without tasks.
    pub(crate) fn finish(&self, state: &Arc<JobState>) {
        let outcome = match self.failure.lock().take() {
            Some(TaskError::Cancelled) => JobOutcome::Cancelled,
            Some(err) => JobOutcome::Failed(err.to_string()),
            None if state.is_stopped() => JobOutcome::Cancelled,
            None => {
                let results: Vec<T> = std::mem::take(&mut *self.results.lock())
                    .into_iter()
                    .flatten()
                    .collect();
                match self.done.lock().take() {
                    Some(done) => {
                        JobOutcome::Completed(Box::new(move |base| done(base, results)))
                    }
                    None => JobOutcome::Cancelled,
                }
            }
        };
        state.finish(outcome);
    }
}
