//! Job State
//!
//! Every submitted job gets one shared [`JobState`]. Workers hold it through
//! their [`TaskContext`] to report progress and to check whether the job was
//! stopped; the owning processor's coordinator holds it to stop the job and
//! to recognise its results when they come back.
//!
//! # How Progress Works
//!
//! Each task owns one progress slot. Slots are clamped to `[0, 1]` and only
//! ever move forward, and the job's progress is the mean of its slots, so
//! the value the evaluation thread observes never decreases.
//!
//! Progress updates are coalesced. A worker posts a dispatch only when none
//! is pending; the evaluation thread clears the pending flag before reading
//! the aggregate. An update arriving after that read therefore always posts
//! a fresh dispatch, and no update is lost.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::error::TaskError;

use super::dispatch::{Dispatch, JobOutcome, ProcessorHandle};

/// Unique identifier for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Shared state of one submitted job.
pub struct JobState {
    id: JobId,
    owner: ProcessorHandle,
    progress: Mutex<Vec<f32>>,
    stopped: AtomicBool,
    dispatch_pending: AtomicBool,
    dispatch: Sender<Dispatch>,
}

impl JobState {
    pub(crate) fn new(
        owner: ProcessorHandle,
        tasks: usize,
        dispatch: Sender<Dispatch>,
    ) -> Self {
        Self {
            id: JobId::new(),
            owner,
            progress: Mutex::new(vec![0.0; tasks]),
            stopped: AtomicBool::new(false),
            dispatch_pending: AtomicBool::new(false),
            dispatch,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn owner(&self) -> &ProcessorHandle {
        &self.owner
    }

    pub fn task_count(&self) -> usize {
        self.progress.lock().len()
    }

    /// Ask the job's tasks to stop. Cooperative; tasks poll
    /// [`TaskContext::is_stopped`].
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Mean progress over all tasks. A job without tasks is complete.
    pub fn progress(&self) -> f32 {
        let slots = self.progress.lock();
        if slots.is_empty() {
            return 1.0;
        }
        slots.iter().sum::<f32>() / slots.len() as f32
    }

    pub(crate) fn report(self: &Arc<Self>, task: usize, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        {
            let mut slots = self.progress.lock();
            match slots.get_mut(task) {
                Some(slot) if value > *slot => *slot = value,
                _ => return,
            }
        }

        if !self.dispatch_pending.swap(true, Ordering::AcqRel) {
            self.post(Dispatch::Progress(Arc::clone(self)));
        }
    }

    /// Called on the evaluation thread before reading [`progress`](Self::progress).
    pub(crate) fn take_pending_dispatch(&self) {
        self.dispatch_pending.store(false, Ordering::Release);
    }

    pub(crate) fn finish(self: &Arc<Self>, outcome: JobOutcome) {
        self.post(Dispatch::Finished {
            state: Arc::clone(self),
            outcome,
        });
    }

    fn post(&self, dispatch: Dispatch) {
        if self.dispatch.send(dispatch).is_err() {
            tracing::debug!(job = %self.id, "network is gone, dropping dispatch");
        }
    }
}

impl fmt::Debug for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobState")
            .field("id", &self.id)
            .field("owner", &self.owner.identifier)
            .field("progress", &self.progress())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Progress reporter handed to one task.
#[derive(Clone)]
pub struct Progress {
    state: Arc<JobState>,
    task: usize,
}

impl Progress {
    pub(crate) fn new(state: Arc<JobState>, task: usize) -> Self {
        Self { state, task }
    }

    /// Report progress in `[0, 1]`. Values outside are clamped and values
    /// below the last report are ignored.
    pub fn set(&self, progress: f32) {
        self.state.report(self.task, progress);
    }

    pub fn set_f64(&self, progress: f64) {
        self.set(progress as f32);
    }

    /// Report `step` of `total` steps done.
    pub fn step(&self, step: usize, total: usize) {
        if total == 0 {
            self.set(1.0);
        } else {
            self.set_f64(step as f64 / total as f64);
        }
    }

    pub(crate) fn complete(&self) {
        self.set(1.0);
    }
}

/// What a task can see of its job while it runs.
pub struct TaskContext {
    progress: Progress,
}

impl TaskContext {
    pub(crate) fn new(progress: Progress) -> Self {
        Self { progress }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Check if the job was stopped or superseded.
    pub fn is_stopped(&self) -> bool {
        self.progress.state.is_stopped()
    }

    /// Returns `Err(TaskError::Cancelled)` if the job was stopped, for use
    /// with `?` inside task loops.
    pub fn check_stopped(&self) -> Result<(), TaskError> {
        if self.is_stopped() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}
