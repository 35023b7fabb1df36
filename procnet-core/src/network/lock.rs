//! Batching network changes.
//!
//! # How Locking Works
//!
//! The lock is a depth counter. While it is above zero, processors are still
//! invalidated as changes arrive, but the network holds back the
//! invalidation, evaluation and modification notifications and remembers
//! which processors became dirty. When the outermost lock is released, the
//! deferred state is flushed as a single batch: one begin/end-invalidation
//! pair, one evaluation request and one modification notice, no matter how
//! many changes were made.

use std::ops::{Deref, DerefMut};

use super::ProcessorNetwork;

impl ProcessorNetwork {
    /// Enter a batch. Locks nest.
    pub fn lock(&mut self) {
        self.lock_depth += 1;
    }

    /// Leave a batch. The outermost unlock flushes deferred notifications.
    pub fn unlock(&mut self) {
        if self.lock_depth == 0 {
            tracing::warn!("unlock called on a network that is not locked");
            return;
        }
        self.lock_depth -= 1;
        if self.lock_depth == 0 {
            self.flush_deferred();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    /// Lock the network until the returned guard is dropped.
    pub fn locked(&mut self) -> NetworkLock<'_> {
        self.lock();
        NetworkLock { network: self }
    }

    fn flush_deferred(&mut self) {
        if !self.dirty.is_empty() {
            tracing::trace!(processors = self.dirty.len(), "flushing deferred invalidation");
            self.begin_invalidation();
            self.end_invalidation();
        }
        if self.modified {
            self.modified = false;
            self.notify(|o| o.on_network_modified());
        }
    }
}

/// Scoped network lock; derefs to the network.
///
/// ```
/// # use std::sync::Arc;
/// # use procnet_core::config::NetworkConfig;
/// # use procnet_core::jobs::ManualPool;
/// # use procnet_core::network::ProcessorNetwork;
/// let mut network =
///     ProcessorNetwork::with_pool(Arc::new(ManualPool::new()), NetworkConfig::default());
/// {
///     let network = network.locked();
///     assert!(network.is_locked());
/// }
/// assert!(!network.is_locked());
/// ```
pub struct NetworkLock<'a> {
    network: &'a mut ProcessorNetwork,
}

impl Deref for NetworkLock<'_> {
    type Target = ProcessorNetwork;

    fn deref(&self) -> &ProcessorNetwork {
        self.network
    }
}

impl DerefMut for NetworkLock<'_> {
    fn deref_mut(&mut self) -> &mut ProcessorNetwork {
        self.network
    }
}

impl Drop for NetworkLock<'_> {
    fn drop(&mut self) {
        self.network.unlock();
    }
}
