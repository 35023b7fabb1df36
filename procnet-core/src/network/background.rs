//! Applying background work on the evaluation thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{panic_message, ProcessError};
use crate::jobs::{Dispatch, JobOutcome, JobState, ProcessorHandle};

use super::processor_network::ProcessorEntry;
use super::ProcessorNetwork;

impl ProcessorNetwork {
    /// Drain the dispatch queue and submit due delayed jobs.
    ///
    /// Call this regularly from the evaluation thread. Returns the number of
    /// dispatches and delayed submissions handled.
    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Like [`poll`](Self::poll), with an explicit current time for delayed
    /// submissions.
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(dispatch) = self.dispatch.try_next() {
            match dispatch {
                Dispatch::Progress(state) => self.apply_progress(&state),
                Dispatch::Finished { state, outcome } => self.apply_finished(&state, outcome),
            }
            handled += 1;
        }

        let due: Vec<String> = self
            .processors
            .iter()
            .filter(|(_, entry)| {
                entry
                    .processor
                    .base()
                    .jobs()
                    .delayed_deadline()
                    .is_some_and(|deadline| deadline <= now)
            })
            .map(|(identifier, _)| identifier.clone())
            .collect();
        for identifier in due {
            if let Some(entry) = self.processors.get_mut(&identifier) {
                let submitted = entry.processor.base_mut().jobs_mut().poll_delayed(now);
                if let Some(Err(err)) = submitted {
                    tracing::warn!(
                        processor = %identifier,
                        error = %err,
                        "delayed submission failed"
                    );
                }
            }
            self.drain_job_events(&identifier);
            handled += 1;
        }

        handled
    }

    /// Earliest deadline of any pending delayed submission.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.processors
            .values()
            .filter_map(|entry| entry.processor.base().jobs().delayed_deadline())
            .min()
    }

    /// Dispatches waiting to be applied by [`poll`](Self::poll).
    pub fn pending_dispatches(&self) -> usize {
        self.dispatch.len()
    }

    /// Find the live processor a handle refers to.
    fn entry_for(&mut self, handle: &ProcessorHandle) -> Option<&mut ProcessorEntry> {
        self.processors
            .get_mut(&handle.identifier)
            .filter(|entry| entry.handle == *handle)
    }

    fn apply_progress(&mut self, state: &Arc<JobState>) {
        state.take_pending_dispatch();
        let identifier = state.owner().identifier.clone();
        let Some(entry) = self.entry_for(state.owner()) else {
            tracing::debug!(
                job = %state.id(),
                processor = %identifier,
                "progress for a removed processor"
            );
            return;
        };
        if state.is_stopped() || !entry.processor.base().jobs().is_latest(state) {
            return;
        }

        let progress = state.progress();
        entry.processor.base_mut().set_progress(Some(progress));
        entry.processor.on_progress(progress);
        self.notify(|o| o.on_progress(&identifier, progress));
    }

    fn apply_finished(&mut self, state: &Arc<JobState>, outcome: JobOutcome) {
        let identifier = state.owner().identifier.clone();
        let Some(entry) = self.entry_for(state.owner()) else {
            tracing::debug!(
                job = %state.id(),
                processor = %identifier,
                "results for a removed processor dropped"
            );
            return;
        };

        let jobs = entry.processor.base_mut().jobs_mut();
        let is_latest = jobs.remove(state);
        let accepted = jobs.accepts(state, is_latest);
        let remaining = jobs.running_jobs();

        if !accepted {
            tracing::debug!(
                job = %state.id(),
                processor = %identifier,
                "discarding results of a superseded job"
            );
        } else {
            match outcome {
                JobOutcome::Completed(apply) => {
                    let base = entry.processor.base_mut();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| apply(base)))
                        .unwrap_or_else(|payload| {
                            Err(ProcessError::Panicked(panic_message(&*payload)))
                        });
                    match result {
                        Ok(()) => {
                            let base = entry.processor.base_mut();
                            let jobs = base.jobs_mut();
                            jobs.record_applied(state.id());
                            // A newer request is still on its way
                            let complete =
                                !jobs.has_pending_work() || jobs.options().keep_old_results;
                            base.set_progress(Some(1.0));
                            if complete {
                                base.validate_outports();
                            }
                            entry.processor.on_progress(1.0);

                            tracing::debug!(
                                job = %state.id(),
                                processor = %identifier,
                                "background results applied"
                            );
                            self.notify(|o| o.on_progress(&identifier, 1.0));
                            self.invalidate_dependents(&identifier);
                        }
                        Err(err) => self.fail_processor(&identifier, &err.to_string()),
                    }
                }
                JobOutcome::Failed(message) => self.fail_processor(&identifier, &message),
                JobOutcome::Cancelled => {
                    tracing::debug!(
                        job = %state.id(),
                        processor = %identifier,
                        "job cancelled"
                    );
                }
            }
        }

        self.notify(|o| o.on_background_work_finished(&identifier, remaining));
    }

    /// Put a processor into the error state after a failed job.
    fn fail_processor(&mut self, identifier: &str, message: &str) {
        if let Some(entry) = self.processors.get_mut(identifier) {
            let base = entry.processor.base_mut();
            base.clear_outports();
            base.set_error(message);
            base.set_progress(None);
        }
        tracing::error!(processor = %identifier, error = %message, "background job failed");
        self.notify(|o| o.on_processor_error(identifier, message));
    }
}
