//! Background Jobs
//!
//! Processors that are too slow to run on the evaluation thread hand their
//! work to a shared worker pool and come back for the results later.
//!
//! # Overview
//!
//! ```text
//!   process()                worker pool                  poll()
//!  ───────────              ─────────────                ────────
//!  submit(Submission) ──▶   task 0, task 1, ...   ──▶    Dispatch::Progress
//!                           (report progress,            Dispatch::Finished
//!                            check stop flag)              └─▶ done(base, results)
//! ```
//!
//! Nothing a worker produces touches a processor directly. Progress reports
//! and finished results are posted to a channel, and the network applies
//! them on the evaluation thread. A processor removed in the meantime is
//! simply not found when its results arrive, so they are dropped.

mod coordinator;
mod dispatch;
mod pool;
mod state;
mod submission;

pub use coordinator::{JobCoordinator, JobOptions};
pub use pool::{ManualPool, PoolTask, ThreadPool, WorkerPool};
pub use state::{JobId, JobState, Progress, TaskContext};
pub use submission::Submission;

pub(crate) use coordinator::{JobContext, JobEvent};
pub(crate) use dispatch::{Dispatch, DispatchQueue, JobOutcome, ProcessorHandle};
