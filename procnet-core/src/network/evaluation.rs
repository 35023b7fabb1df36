//! Evaluation
//!
//! The network does not evaluate itself. An evaluation driver asks for the
//! processors in dependency order, checks which are invalid and ready, and
//! has the network run them. [`Evaluator`] is such a driver: it listens for
//! evaluation requests and performs one pass over the network per request.
//!
//! # Processing One Processor
//!
//! 1. Each inport receives the data of its connected, ready outports.
//! 2. If the processor is at `InvalidResources`, `initialize_resources()`
//!    runs first, then `process()`. Panics are caught.
//! 3. On success the outports become valid, unless the processor handed its
//!    work to a background job or queued a delayed request; then they stay
//!    invalid until the results of the newest request arrive. On failure the outports are cleared and the processor enters
//!    the `Error` status.
//! 4. Jobs started and property changes requested during `process()` are
//!    applied afterwards.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{panic_message, NetworkError, ProcessError, Result};
use crate::invalidation::InvalidationLevel;
use crate::jobs::JobEvent;
use crate::path::{PortPath, PropertyPath};
use crate::ports::{Outport, PortData};
use crate::processor::ProcessorStatus;

use super::observer::NetworkObserver;
use super::ProcessorNetwork;

/// Result of running one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    Failed(ProcessError),
}

/// What one evaluation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    /// Processors that ran successfully, in order.
    pub processed: Vec<String>,
    /// Processors that failed, with their error messages.
    pub failed: Vec<(String, String)>,
    /// Invalid processors skipped because an input was missing.
    pub not_ready: Vec<String>,
}

impl EvaluationReport {
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty() && self.not_ready.is_empty()
    }
}

impl ProcessorNetwork {
    /// Readiness of a processor, or `None` if it is not in the network.
    pub fn status(&self, identifier: &str) -> Option<ProcessorStatus> {
        let base = self.processors.get(identifier)?.processor.base();
        if let Some(message) = base.error() {
            return Some(ProcessorStatus::Error(message.to_string()));
        }

        for inport in base.inports() {
            let path = PortPath::new(identifier, inport.identifier());
            let mut connected = false;
            for connection in self.connections_to(&path) {
                connected = true;
                if !self.outport_at(&connection.outport).is_some_and(Outport::is_ready) {
                    return Some(ProcessorStatus::NotReady(format!(
                        "inport '{}' is waiting for '{}'",
                        inport.identifier(),
                        connection.outport
                    )));
                }
            }
            if !connected && !inport.is_optional() {
                return Some(ProcessorStatus::NotReady(format!(
                    "inport '{}' is not connected",
                    inport.identifier()
                )));
            }
        }
        Some(ProcessorStatus::Ready)
    }

    /// All processors in dependency order.
    pub fn evaluation_order(&self) -> Vec<String> {
        self.graph.topological_order()
    }

    /// Run one processor now, regardless of its status.
    pub fn process_processor(&mut self, identifier: &str) -> Result<ProcessOutcome> {
        let entry = self
            .processors
            .get(identifier)
            .ok_or_else(|| NetworkError::NotInNetwork(identifier.to_string()))?;

        let inputs: Vec<SmallVec<[PortData; 1]>> = entry
            .processor
            .base()
            .inports()
            .iter()
            .map(|inport| {
                let path = PortPath::new(identifier, inport.identifier());
                self.connections_to(&path)
                    .filter_map(|connection| self.outport_at(&connection.outport))
                    .filter(|outport| outport.is_ready())
                    .filter_map(|outport| outport.data().cloned())
                    .collect()
            })
            .collect();

        let Some(entry) = self.processors.get_mut(identifier) else {
            return Err(NetworkError::NotInNetwork(identifier.to_string()));
        };
        let processor = &mut entry.processor;
        for (inport, data) in processor.base_mut().inports_mut().iter_mut().zip(inputs) {
            inport.set_inputs(data);
        }

        let level = processor.base().invalidation_level();
        tracing::trace!(processor = %identifier, ?level, "processing");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            if level >= InvalidationLevel::InvalidResources {
                processor.initialize_resources()?;
            }
            processor.process()
        }))
        .unwrap_or_else(|payload| Err(ProcessError::Panicked(panic_message(&*payload))));

        let base = processor.base_mut();
        base.set_valid();
        let mut publish = false;
        let outcome = match result {
            Ok(()) => {
                if !base.jobs().has_pending_work() {
                    base.validate_outports();
                    publish = base.jobs().options().delay_invalidation;
                }
                ProcessOutcome::Processed
            }
            Err(err) => {
                base.clear_outports();
                base.set_error(err.to_string());
                ProcessOutcome::Failed(err)
            }
        };

        if let ProcessOutcome::Failed(err) = &outcome {
            let message = err.to_string();
            tracing::error!(processor = %identifier, error = %message, "processing failed");
            self.notify(|o| o.on_processor_error(identifier, &message));
        }
        if publish {
            // Dependents kept reading the old outputs until now
            self.invalidate_dependents(identifier);
        }
        self.drain_job_events(identifier);
        self.apply_property_requests(identifier);
        Ok(outcome)
    }

    pub(super) fn drain_job_events(&mut self, identifier: &str) {
        let Some(entry) = self.processors.get_mut(identifier) else {
            return;
        };
        for event in entry.processor.base_mut().jobs_mut().take_events() {
            match event {
                JobEvent::Started { job, tasks } => {
                    tracing::debug!(
                        processor = %identifier,
                        %job,
                        tasks,
                        "background work started"
                    );
                    self.notify(|o| o.on_background_work_started(identifier, tasks));
                }
            }
        }
    }

    fn apply_property_requests(&mut self, identifier: &str) {
        let Some(entry) = self.processors.get_mut(identifier) else {
            return;
        };
        for (property, value) in entry.processor.base_mut().take_requests() {
            let path = PropertyPath::new(identifier, property.split('.'));
            if let Err(err) = self.set_property_at(&path, value) {
                tracing::warn!(
                    property = %path,
                    error = %err,
                    "requested property change rejected"
                );
            }
        }
    }

    /// Run every invalid, ready processor once, in dependency order.
    ///
    /// Does nothing while the network is locked.
    pub fn evaluate(&mut self) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        if self.is_locked() {
            return report;
        }

        for identifier in self.evaluation_order() {
            let Some(processor) = self.processor(&identifier) else {
                continue;
            };
            if processor.base().is_valid() {
                continue;
            }
            match self.status(&identifier) {
                Some(ProcessorStatus::Ready) => {}
                Some(ProcessorStatus::NotReady(_)) => {
                    report.not_ready.push(identifier);
                    continue;
                }
                Some(ProcessorStatus::Error(_)) | None => continue,
            }

            match self.process_processor(&identifier) {
                Ok(ProcessOutcome::Processed) => report.processed.push(identifier),
                Ok(ProcessOutcome::Failed(err)) => {
                    report.failed.push((identifier, err.to_string()))
                }
                Err(_) => {}
            }
        }

        tracing::debug!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            not_ready = report.not_ready.len(),
            "evaluation pass finished"
        );
        report
    }
}

/// Evaluation driver that runs the network whenever it asks to be evaluated.
///
/// ```
/// # use std::sync::Arc;
/// # use procnet_core::config::NetworkConfig;
/// # use procnet_core::jobs::ManualPool;
/// # use procnet_core::network::{Evaluator, ProcessorNetwork};
/// let mut network =
///     ProcessorNetwork::with_pool(Arc::new(ManualPool::new()), NetworkConfig::default());
/// let evaluator = Evaluator::attach(&mut network);
///
/// // ... mutate the network ...
/// if let Some(report) = evaluator.evaluate_if_requested(&mut network) {
///     println!("processed {:?}", report.processed);
/// }
/// ```
#[derive(Debug)]
pub struct Evaluator {
    requested: AtomicBool,
}

impl Evaluator {
    /// Create an evaluator and register it with the network.
    pub fn attach(network: &mut ProcessorNetwork) -> Arc<Self> {
        let evaluator = Arc::new(Self {
            requested: AtomicBool::new(true),
        });
        network.add_observer(evaluator.clone());
        evaluator
    }

    /// Check if the network asked for evaluation since the last pass.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Evaluate if the network asked for it.
    ///
    /// Returns `None` when there was no request or the network is locked.
    pub fn evaluate_if_requested(
        &self,
        network: &mut ProcessorNetwork,
    ) -> Option<EvaluationReport> {
        if network.is_locked() || !self.requested.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(network.evaluate())
    }
}

impl NetworkObserver for Evaluator {
    fn on_evaluate_request(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{Processor, ProcessorBase};
    use crate::testing::{manual_network, Bare, Broken, Recorder, Scale, Sink, Source};
    use crate::ports::Inport;

    #[test]
    fn invalidated_upstream_makes_downstream_wait() {
        let (mut network, _pool) = manual_network();
        network.add_processor(Source::new("a")).unwrap();
        network.add_processor(Sink::new("b")).unwrap();
        network.add_connection("a.outport", "b.inport").unwrap();
        assert!(!network.status("b").unwrap().is_ready());

        network.evaluate();
        assert_eq!(network.status("b"), Some(ProcessorStatus::Ready));

        network.invalidate_processor("a", InvalidationLevel::InvalidOutput).unwrap();
        assert_eq!(
            network.status("b"),
            Some(ProcessorStatus::NotReady(
                "inport 'inport' is waiting for 'a.outport'".into()
            ))
        );

        network.process_processor("a").unwrap();
        assert_eq!(network.status("b"), Some(ProcessorStatus::Ready));
        assert!(network.status("missing").is_none());
    }

    #[test]
    fn unconnected_inports_block_unless_optional() {
        let (mut network, _pool) = manual_network();
        network.add_processor(Sink::new("sink")).unwrap();
        network
            .add_processor(Bare::new(
                ProcessorBase::new("free").with_inport(Inport::of::<f64>("inport").optional()),
            ))
            .unwrap();

        let report = network.evaluate();
        assert_eq!(report.processed, vec!["free"]);
        assert_eq!(report.not_ready, vec!["sink"]);
        assert_eq!(
            network.status("sink"),
            Some(ProcessorStatus::NotReady("inport 'inport' is not connected".into()))
        );
    }

    #[test]
    fn evaluation_follows_dependencies() {
        let (mut network, _pool) = manual_network();
        // Added out of order on purpose
        network.add_processor(Sink::new("sink")).unwrap();
        network.add_processor(Scale::new("scale")).unwrap();
        network.add_processor(Source::new("source")).unwrap();
        network.add_connection("scale.outport", "sink.inport").unwrap();
        network.add_connection("source.outport", "scale.inport").unwrap();
        network.set_property("source.value", 3.0).unwrap();

        let report = network.evaluate();
        assert_eq!(report.processed, vec!["source", "scale", "sink"]);
        assert_eq!(network.processor_as::<Sink>("sink").unwrap().received, Some(6.0));

        // Nothing left to do
        assert!(network.evaluate().is_empty());
    }

    #[test]
    fn delayed_invalidation_holds_dependents_until_new_output() {
        let (mut network, _pool) = manual_network();
        network.add_processor(Source::new("a")).unwrap();
        network.add_processor(Sink::new("b")).unwrap();
        network.add_connection("a.outport", "b.inport").unwrap();
        network.evaluate();
        network
            .processor_mut("a")
            .unwrap()
            .base_mut()
            .jobs_mut()
            .set_options(crate::jobs::JobOptions::default().delay_invalidation());

        network.set_property("a.value", 4.0).unwrap();
        assert!(network.processor("b").unwrap().base().is_valid());
        assert_eq!(network.status("b"), Some(ProcessorStatus::Ready));

        // Processing a publishes the new value and only then invalidates b
        let report = network.evaluate();
        assert_eq!(report.processed, vec!["a", "b"]);
        assert_eq!(network.processor_as::<Sink>("b").unwrap().received, Some(4.0));
    }

    #[test]
    fn resources_are_initialized_once_per_resource_invalidation() {
        let (mut network, _pool) = manual_network();
        network.add_processor(Source::new("a")).unwrap();
        network.evaluate();
        network.set_property("a.value", 2.0).unwrap();
        network.evaluate();
        assert_eq!(network.processor_as::<Source>("a").unwrap().initialized, 1);
        assert_eq!(network.processor_as::<Source>("a").unwrap().processed, 2);

        network.invalidate_processor("a", InvalidationLevel::InvalidResources).unwrap();
        network.evaluate();
        assert_eq!(network.processor_as::<Source>("a").unwrap().initialized, 2);
    }

    #[test]
    fn failures_become_error_status() {
        let (mut network, _pool) = manual_network();
        network.add_processor(Broken::new("broken")).unwrap();
        network.add_processor(Sink::new("sink")).unwrap();
        network.add_connection("broken.outport", "sink.inport").unwrap();
        let recorder = Recorder::attach(&mut network);

        let report = network.evaluate();
        assert_eq!(
            report.failed,
            vec![("broken".to_string(), "broken on purpose".to_string())]
        );
        assert_eq!(report.not_ready, vec!["sink"]);
        assert_eq!(
            network.status("broken"),
            Some(ProcessorStatus::Error("broken on purpose".into()))
        );
        assert!(!network.processor("broken").unwrap().base().outports()[0].has_data());
        assert_eq!(recorder.count("error broken: broken on purpose"), 1);

        // The error is cleared by the next invalidation
        network.invalidate_processor("broken", InvalidationLevel::InvalidOutput).unwrap();
        assert!(network.processor("broken").unwrap().base().error().is_none());
    }

    struct Panicky {
        base: ProcessorBase,
    }

    impl Processor for Panicky {
        fn class_identifier(&self) -> &str {
            "test.Panicky"
        }
        fn base(&self) -> &ProcessorBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ProcessorBase {
            &mut self.base
        }
        fn process(&mut self) -> Result<(), ProcessError> {
            panic!("lost the plot");
        }
    }

    #[test]
    fn panics_do_not_escape() {
        let (mut network, _pool) = manual_network();
        network
            .add_processor(Panicky {
                base: ProcessorBase::new("p"),
            })
            .unwrap();
        let outcome = network.process_processor("p").unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Failed(ProcessError::Panicked("lost the plot".into()))
        );
        assert!(matches!(network.status("p"), Some(ProcessorStatus::Error(_))));
    }

    struct Follower {
        base: ProcessorBase,
    }

    impl Processor for Follower {
        fn class_identifier(&self) -> &str {
            "test.Follower"
        }
        fn base(&self) -> &ProcessorBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ProcessorBase {
            &mut self.base
        }
        fn process(&mut self) -> Result<(), ProcessError> {
            self.base.request_property("count", 11_i64);
            Ok(())
        }
    }

    #[test]
    fn requested_property_changes_go_through_links() {
        let (mut network, _pool) = manual_network();
        network
            .add_processor(Follower {
                base: ProcessorBase::new("f").with_property(
                    crate::properties::Property::new("count", "Count", 0_i64),
                ),
            })
            .unwrap();
        network.add_processor(Source::new("s")).unwrap();
        network.add_link("f.count", "s.count").unwrap();

        network.process_processor("f").unwrap();
        assert_eq!(network.get_property::<i64>("f.count"), Some(11));
        assert_eq!(network.get_property::<i64>("s.count"), Some(11));
    }

    #[test]
    fn evaluator_runs_on_request() {
        let (mut network, _pool) = manual_network();
        let evaluator = Evaluator::attach(&mut network);
        network.add_processor(Source::new("a")).unwrap();

        let report = evaluator.evaluate_if_requested(&mut network).unwrap();
        assert_eq!(report.processed, vec!["a"]);
        assert!(!evaluator.is_requested());
        assert!(evaluator.evaluate_if_requested(&mut network).is_none());

        network.set_property("a.value", 8.0).unwrap();
        assert!(evaluator.is_requested());
        network.lock();
        assert!(evaluator.evaluate_if_requested(&mut network).is_none());
        network.unlock();
        assert_eq!(evaluator.evaluate_if_requested(&mut network).unwrap().processed, vec!["a"]);
    }
}
