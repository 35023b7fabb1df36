//! Processor Network
//!
//! The network owns processors, the port connections between them and the
//! property links that keep their parameters in sync. It is the single entry
//! point for mutation: adding and removing processors, connecting ports,
//! linking and setting properties.
//!
//! # Overview
//!
//! ```text
//!   set_property ──▶ links ──▶ property.set ──▶ invalidate owner + downstream
//!                                                       │
//!   add/remove connection ─────────────────────────────▶┤
//!                                                       ▼
//!                                    begin/end invalidation, evaluate request
//!                                                       │
//!   Evaluator ◀─────────────────────────────────────────┘
//!      └─▶ process() in dependency order ──▶ background jobs ──▶ poll()
//! ```
//!
//! Mutations may be batched with [`ProcessorNetwork::lock`] /
//! [`ProcessorNetwork::unlock`] or the scoped [`ProcessorNetwork::locked`]
//! guard, so that many edits cause one round of notifications.

mod background;
mod evaluation;
mod linking;
mod lock;
mod observer;
mod processor_network;

pub use evaluation::{EvaluationReport, Evaluator, ProcessOutcome};
pub use lock::NetworkLock;
pub use observer::NetworkObserver;
pub use processor_network::ProcessorNetwork;
