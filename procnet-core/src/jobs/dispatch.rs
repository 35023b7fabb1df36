//! Dispatch from workers to the evaluation thread.
//!
//! Workers never touch processors directly. Everything they produce, progress
//! and finished results alike, is posted to a channel that the network drains
//! on the evaluation thread in [`poll`](crate::network::ProcessorNetwork::poll).

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::error::ProcessError;
use crate::processor::ProcessorBase;

use super::state::JobState;

/// Weak reference to a processor that owns jobs.
///
/// The generation distinguishes a removed processor from a later one that
/// reuses its identifier, so results for the old one are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessorHandle {
    pub identifier: String,
    pub generation: u64,
}

/// Applies finished results to the owning processor.
pub(crate) type ApplyFn =
    Box<dyn FnOnce(&mut ProcessorBase) -> Result<(), ProcessError> + Send + 'static>;

pub(crate) enum JobOutcome {
    Completed(ApplyFn),
    Failed(String),
    Cancelled,
}

pub(crate) enum Dispatch {
    Progress(Arc<JobState>),
    Finished {
        state: Arc<JobState>,
        outcome: JobOutcome,
    },
}

/// The channel between workers and the evaluation thread.
pub(crate) struct DispatchQueue {
    sender: Sender<Dispatch>,
    receiver: Receiver<Dispatch>,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub(crate) fn sender(&self) -> Sender<Dispatch> {
        self.sender.clone()
    }

    pub(crate) fn try_next(&self) -> Option<Dispatch> {
        match self.receiver.try_recv() {
            Ok(dispatch) => Some(dispatch),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}
