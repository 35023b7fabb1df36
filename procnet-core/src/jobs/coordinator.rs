//! Job Coordinator
//!
//! Each processor owns a [`JobCoordinator`] that tracks the jobs it has
//! submitted. The coordinator is attached when the processor joins a
//! network, which gives it the shared worker pool and the dispatch channel
//! back to the evaluation thread.
//!
//! # How Supersession Works
//!
//! Jobs are kept in submission order. Submitting a new job stops every older
//! one, and when a job finishes its results are only applied if it is still
//! the newest job and has not been stopped. Results of superseded jobs are
//! discarded, so a slow old job can never overwrite the output of a newer
//! one.
//!
//! # Delayed Submissions
//!
//! [`submit_delayed`](JobCoordinator::submit_delayed) debounces bursts of
//! requests: only the most recent request is kept, and it is submitted once
//! the configured delay has passed since that request.
//!
//! # Dispatch Options
//!
//! [`JobOptions`] change how [`dispatch`](JobCoordinator::dispatch) treats
//! a new submission:
//!
//! - `delay_dispatch` routes every dispatch through the debounce delay.
//! - `queued_dispatch` lets a running job finish; the newest request waits
//!   and is submitted once no job is left.
//! - `keep_old_results` does not stop older jobs, and applies their results
//!   as long as nothing newer has been applied yet.
//! - `delay_invalidation` keeps the previous outputs visible to downstream
//!   processors until new results arrive. The network reads it when
//!   invalidating.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::error::JobError;

use super::dispatch::{Dispatch, ProcessorHandle};
use super::pool::WorkerPool;
use super::state::{JobId, JobState};
use super::submission::Submission;

/// Things the network reports to observers after a processor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobEvent {
    Started { job: JobId, tasks: usize },
}

/// What a coordinator needs from the network it belongs to.
pub(crate) struct JobContext {
    pub pool: Arc<dyn WorkerPool>,
    pub dispatch: Sender<Dispatch>,
    pub handle: ProcessorHandle,
    pub delay: Duration,
}

/// How a processor dispatches its background work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub delay_dispatch: bool,
    pub delay_invalidation: bool,
    pub keep_old_results: bool,
    pub queued_dispatch: bool,
}

impl JobOptions {
    pub fn delay_dispatch(mut self) -> Self {
        self.delay_dispatch = true;
        self
    }

    pub fn delay_invalidation(mut self) -> Self {
        self.delay_invalidation = true;
        self
    }

    pub fn keep_old_results(mut self) -> Self {
        self.keep_old_results = true;
        self
    }

    pub fn queued_dispatch(mut self) -> Self {
        self.queued_dispatch = true;
        self
    }
}

type DelayedSubmit = Box<dyn FnOnce(&mut JobCoordinator) -> Result<JobId, JobError> + Send>;

struct Delayed {
    deadline: Instant,
    submit: DelayedSubmit,
}

/// Tracks the background jobs of one processor.
#[derive(Default)]
pub struct JobCoordinator {
    context: Option<JobContext>,
    jobs: Vec<Arc<JobState>>,
    events: Vec<JobEvent>,
    delayed: Option<Delayed>,
    options: JobOptions,
    applied: Option<JobId>,
}

impl JobCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: JobOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> JobOptions {
        self.options
    }

    pub fn set_options(&mut self, options: JobOptions) {
        self.options = options;
    }

    /// Hand work to the pool the way the options ask for.
    ///
    /// Depending on the options this submits now, debounces, or waits for
    /// the running job.
    pub fn dispatch<T: Send + 'static>(
        &mut self,
        submission: Submission<T>,
    ) -> Result<(), JobError> {
        self.dispatch_at(submission, Instant::now())
    }

    /// Like [`dispatch`](Self::dispatch), with an explicit request time.
    pub fn dispatch_at<T: Send + 'static>(
        &mut self,
        submission: Submission<T>,
        now: Instant,
    ) -> Result<(), JobError> {
        if self.options.delay_dispatch {
            return self.submit_delayed_at(submission, now);
        }
        if self.options.queued_dispatch && self.has_jobs() {
            if self.context.is_none() {
                return Err(JobError::Detached);
            }
            self.delayed = Some(Delayed {
                deadline: now,
                submit: Box::new(move |coordinator| coordinator.submit(submission)),
            });
            return Ok(());
        }
        self.submit(submission).map(|_| ())
    }

    /// Submit a job to the worker pool.
    ///
    /// Older jobs are stopped unless the options keep their results.
    pub fn submit<T: Send + 'static>(
        &mut self,
        submission: Submission<T>,
    ) -> Result<JobId, JobError> {
        let context = self.context.as_ref().ok_or(JobError::Detached)?;

        if !self.options.keep_old_results {
            for job in &self.jobs {
                job.stop();
            }
        }

        let (tasks, collector) = submission.into_parts();
        let state = Arc::new(JobState::new(
            context.handle.clone(),
            tasks.len(),
            context.dispatch.clone(),
        ));
        let id = state.id();
        tracing::debug!(
            processor = %context.handle.identifier,
            job = %id,
            tasks = tasks.len(),
            "submitting background job"
        );

        self.jobs.push(Arc::clone(&state));
        self.events.push(JobEvent::Started {
            job: id,
            tasks: tasks.len(),
        });

        let collector = Arc::new(collector);
        if tasks.is_empty() {
            collector.finish(&state);
        }
        for (index, task) in tasks.into_iter().enumerate() {
            let collector = Arc::clone(&collector);
            let state = Arc::clone(&state);
            context
                .pool
                .enqueue(Box::new(move || collector.run(&state, index, task)));
        }

        Ok(id)
    }

    /// Submit after the debounce delay, replacing any pending request.
    pub fn submit_delayed<T: Send + 'static>(
        &mut self,
        submission: Submission<T>,
    ) -> Result<(), JobError> {
        self.submit_delayed_at(submission, Instant::now())
    }

    /// Like [`submit_delayed`](Self::submit_delayed), with an explicit
    /// request time.
    pub fn submit_delayed_at<T: Send + 'static>(
        &mut self,
        submission: Submission<T>,
        now: Instant,
    ) -> Result<(), JobError> {
        let delay = self.context.as_ref().ok_or(JobError::Detached)?.delay;
        self.delayed = Some(Delayed {
            deadline: now + delay,
            submit: Box::new(move |coordinator| coordinator.submit(submission)),
        });
        Ok(())
    }

    /// Submit the pending delayed request if its deadline has passed.
    ///
    /// With `queued_dispatch` the request keeps waiting while a job runs.
    pub(crate) fn poll_delayed(&mut self, now: Instant) -> Option<Result<JobId, JobError>> {
        match &self.delayed {
            Some(delayed) if delayed.deadline <= now => {}
            _ => return None,
        }
        if self.options.queued_dispatch && self.has_jobs() {
            return None;
        }
        let delayed = self.delayed.take()?;
        Some((delayed.submit)(self))
    }

    /// Deadline of the pending delayed request.
    pub fn delayed_deadline(&self) -> Option<Instant> {
        self.delayed.as_ref().map(|d| d.deadline)
    }

    /// Stop every job and drop any pending delayed request.
    pub fn stop_jobs(&mut self) {
        for job in &self.jobs {
            job.stop();
        }
        self.delayed = None;
    }

    /// Number of jobs submitted and not yet finished.
    pub fn running_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Running jobs or a request still waiting to be submitted.
    ///
    /// Outputs are not complete while this holds.
    pub fn has_pending_work(&self) -> bool {
        self.has_jobs() || self.delayed.is_some()
    }

    /// The newest job, if any is running.
    pub fn latest(&self) -> Option<&Arc<JobState>> {
        self.jobs.last()
    }

    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub(crate) fn attach(&mut self, context: JobContext) {
        self.context = Some(context);
    }

    /// Stop everything and forget the network.
    pub(crate) fn detach(&mut self) {
        self.stop_jobs();
        self.jobs.clear();
        self.events.clear();
        self.context = None;
    }

    /// Remove a finished job. Returns true if it was the newest job.
    pub(crate) fn remove(&mut self, state: &Arc<JobState>) -> bool {
        let Some(position) = self.jobs.iter().position(|job| Arc::ptr_eq(job, state)) else {
            return false;
        };
        let is_last = position + 1 == self.jobs.len();
        self.jobs.remove(position);
        is_last
    }

    pub(crate) fn is_latest(&self, state: &Arc<JobState>) -> bool {
        self.jobs.last().is_some_and(|job| Arc::ptr_eq(job, state))
    }

    /// Check if the results of a finished job may be applied.
    ///
    /// `was_latest` is what [`remove`](Self::remove) returned for it.
    pub(crate) fn accepts(&self, state: &JobState, was_latest: bool) -> bool {
        if state.is_stopped() {
            return false;
        }
        let newer_than_applied = self.applied.map_or(true, |applied| state.id() > applied);
        newer_than_applied && (was_latest || self.options.keep_old_results)
    }

    pub(crate) fn record_applied(&mut self, job: JobId) {
        self.applied = Some(job);
    }

    pub(crate) fn take_events(&mut self) -> Vec<JobEvent> {
        std::mem::take(&mut self.events)
    }
}

impl fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("attached", &self.context.is_some())
            .field("jobs", &self.jobs)
            .field("delayed", &self.delayed.as_ref().map(|d| d.deadline))
            .field("options", &self.options)
            .finish()
    }
}
