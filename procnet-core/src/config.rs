//! Network Configuration
//!
//! Settings that shape the runtime rather than the graph: how large the shared
//! worker pool is and how long debounced background submissions wait.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default debounce window for delayed background submissions.
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 500;

/// Runtime configuration for a [`ProcessorNetwork`](crate::network::ProcessorNetwork).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of worker threads in the shared pool.
    /// `None` uses the available parallelism of the machine.
    pub worker_threads: Option<usize>,

    /// Debounce window for delayed background submissions, in milliseconds.
    pub debounce_delay_ms: u64,

    /// Name given to worker threads.
    pub thread_name: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            thread_name: "procnet-worker".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The debounce window as a [`Duration`].
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    /// Resolve the worker thread count.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = NetworkConfig::from_json(r#"{ "worker_threads": 3 }"#).unwrap();
        assert_eq!(config.worker_threads, Some(3));
        assert_eq!(config.debounce_delay(), Duration::from_millis(500));
        assert_eq!(config.resolved_worker_threads(), 3);
    }

    #[test]
    fn zero_threads_falls_back_to_parallelism() {
        let config = NetworkConfig {
            worker_threads: Some(0),
            ..NetworkConfig::default()
        };
        assert!(config.resolved_worker_threads() >= 1);
    }
}
