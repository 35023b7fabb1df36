//! Processors and observers shared by the unit and integration tests.
//!
//! Only the public API is used here, so the integration tests can include
//! this file as well.

use std::sync::{Arc, Once};

use parking_lot::Mutex;

use procnet_core::config::NetworkConfig;
use procnet_core::error::{NetworkError, ProcessError, TaskError};
use procnet_core::jobs::{ManualPool, Submission};
use procnet_core::network::{NetworkObserver, ProcessorNetwork};
use procnet_core::path::PropertyPath;
use procnet_core::ports::{Inport, Outport, PortConnection};
use procnet_core::processor::{Processor, ProcessorBase, ProcessorFactory};
use procnet_core::properties::{Property, PropertyLink, PropertyValue};

static LOGGING: Once = Once::new();

/// Route crate logs to the test harness. Filter with `RUST_LOG`.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn output_error(err: NetworkError) -> ProcessError {
    ProcessError::failed(err.to_string())
}

/// Writes its `value` property to `outport`.
pub struct Source {
    base: ProcessorBase,
    pub processed: usize,
    pub initialized: usize,
}

impl Source {
    pub fn new(identifier: &str) -> Self {
        Self {
            base: ProcessorBase::new(identifier)
                .with_outport(Outport::of::<f64>("outport"))
                .with_property(Property::new("value", "Value", 1.0))
                .with_property(Property::new("count", "Count", 0_i64))
                .with_property(Property::new("label", "Label", "source"))
                .with_property(Property::composite(
                    "camera",
                    "Camera",
                    vec![
                        Property::new("fov", "Field of View", 60.0),
                        Property::new("position", "Position", [0.0, 0.0, 1.0]),
                        Property::new("aspect", "Aspect Ratio", 1.0_f32),
                    ],
                )),
            processed: 0,
            initialized: 0,
        }
    }
}

impl Processor for Source {
    fn class_identifier(&self) -> &str {
        "test.Source"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn initialize_resources(&mut self) -> Result<(), ProcessError> {
        self.initialized += 1;
        Ok(())
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        self.processed += 1;
        let value = self.base.value::<f64>("value").unwrap_or_default();
        self.base.set_output("outport", value).map_err(output_error)
    }
}

/// Multiplies its input by `factor`.
pub struct Scale {
    base: ProcessorBase,
    pub processed: usize,
}

impl Scale {
    pub fn new(identifier: &str) -> Self {
        Self {
            base: ProcessorBase::new(identifier)
                .with_inport(Inport::of::<f64>("inport"))
                .with_outport(Outport::of::<f64>("outport"))
                .with_property(Property::new("factor", "Factor", 2.0)),
            processed: 0,
        }
    }
}

impl Processor for Scale {
    fn class_identifier(&self) -> &str {
        "test.Scale"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        self.processed += 1;
        let input = *self
            .base
            .input::<f64>("inport")
            .ok_or_else(|| ProcessError::MissingInput("inport".into()))?;
        let factor = self.base.value::<f64>("factor").unwrap_or(1.0);
        self.base.set_output("outport", input * factor).map_err(output_error)
    }
}

/// Remembers the last value it received.
pub struct Sink {
    base: ProcessorBase,
    pub received: Option<f64>,
}

impl Sink {
    pub fn new(identifier: &str) -> Self {
        Self {
            base: ProcessorBase::new(identifier).with_inport(Inport::of::<f64>("inport")),
            received: None,
        }
    }
}

impl Processor for Sink {
    fn class_identifier(&self) -> &str {
        "test.Sink"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        self.received = self.base.input::<f64>("inport").copied();
        Ok(())
    }
}

/// Sums `tasks` background tasks into `outport`.
///
/// Task `i` of `n` reports progress `i / (n - 1)` before finishing. Work is
/// handed over with `dispatch`, so the processor's job options apply.
pub struct Worker {
    base: ProcessorBase,
}

impl Worker {
    pub fn new(identifier: &str) -> Self {
        Self {
            base: ProcessorBase::new(identifier)
                .with_outport(Outport::of::<f64>("outport"))
                .with_property(Property::new("tasks", "Tasks", 3_i64))
                .with_property(Property::new("fail", "Fail", false)),
        }
    }
}

impl Processor for Worker {
    fn class_identifier(&self) -> &str {
        "test.Worker"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        let tasks = self.base.value::<i64>("tasks").unwrap_or(1).max(0) as usize;
        let fail = self.base.value::<bool>("fail").unwrap_or(false);

        let mut submission = Submission::new(|base: &mut ProcessorBase, results: Vec<f64>| {
            base.set_output("outport", results.iter().sum::<f64>())
                .map_err(output_error)
        });
        for index in 0..tasks {
            submission = submission.task(move |context| {
                context.check_stopped()?;
                if fail {
                    return Err(TaskError::failed("task failed"));
                }
                let step = if tasks > 1 { index as f32 / (tasks - 1) as f32 } else { 1.0 };
                context.progress().set(step);
                Ok(index as f64)
            });
        }
        self.base
            .jobs_mut()
            .dispatch(submission)
            .map_err(|err| ProcessError::failed(err.to_string()))
    }
}

/// Always fails.
pub struct Broken {
    base: ProcessorBase,
}

impl Broken {
    pub fn new(identifier: &str) -> Self {
        Self {
            base: ProcessorBase::new(identifier).with_outport(Outport::of::<f64>("outport")),
        }
    }
}

impl Processor for Broken {
    fn class_identifier(&self) -> &str {
        "test.Broken"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        Err(ProcessError::failed("broken on purpose"))
    }
}

/// A processor with whatever ports and properties the test gives it.
pub struct Bare {
    base: ProcessorBase,
}

impl Bare {
    pub fn new(base: ProcessorBase) -> Self {
        Self { base }
    }
}

impl Processor for Bare {
    fn class_identifier(&self) -> &str {
        "test.Bare"
    }

    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessorBase {
        &mut self.base
    }

    fn process(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }
}

pub fn factory() -> ProcessorFactory {
    let mut factory = ProcessorFactory::new();
    factory.register("test.Source", Source::new);
    factory.register("test.Scale", Scale::new);
    factory.register("test.Sink", Sink::new);
    factory.register("test.Worker", Worker::new);
    factory
}

/// A network whose background tasks only run when the test says so.
pub fn manual_network() -> (ProcessorNetwork, Arc<ManualPool>) {
    init_logging();
    let pool = Arc::new(ManualPool::new());
    let network = ProcessorNetwork::with_pool(pool.clone(), NetworkConfig::default());
    (network, pool)
}

/// Value on a processor's `outport`.
pub fn output(network: &ProcessorNetwork, identifier: &str) -> Option<f64> {
    network
        .processor(identifier)?
        .base()
        .outport("outport")?
        .get::<f64>()
        .copied()
}

/// Records network notifications as short strings.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn attach(network: &mut ProcessorNetwork) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        network.add_observer(recorder.clone());
        recorder
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Events starting with `prefix`.
    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.events.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Progress values reported for `processor`, in order.
    pub fn progress(&self, processor: &str) -> Vec<f32> {
        let prefix = format!("progress {processor} ");
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .filter_map(|v| v.parse().ok())
            .collect()
    }
}

impl NetworkObserver for Recorder {
    fn on_processor_added(&self, processor: &str) {
        self.push(format!("added {processor}"));
    }

    fn on_processor_will_be_removed(&self, processor: &str) {
        self.push(format!("removing {processor}"));
    }

    fn on_processor_removed(&self, processor: &str) {
        self.push(format!("removed {processor}"));
    }

    fn on_connection_added(&self, connection: &PortConnection) {
        self.push(format!("connected {connection}"));
    }

    fn on_connection_removed(&self, connection: &PortConnection) {
        self.push(format!("disconnected {connection}"));
    }

    fn on_link_added(&self, link: &PropertyLink) {
        self.push(format!("linked {link}"));
    }

    fn on_link_removed(&self, link: &PropertyLink) {
        self.push(format!("unlinked {link}"));
    }

    fn on_invalidation_begin(&self) {
        self.push("begin".into());
    }

    fn on_invalidation_end(&self) {
        self.push("end".into());
    }

    fn on_evaluate_request(&self) {
        self.push("evaluate".into());
    }

    fn on_network_modified(&self) {
        self.push("modified".into());
    }

    fn on_property_changed(&self, path: &PropertyPath, value: &PropertyValue) {
        self.push(format!("changed {path} = {value}"));
    }

    fn on_background_work_started(&self, processor: &str, tasks: usize) {
        self.push(format!("started {processor} {tasks}"));
    }

    fn on_background_work_finished(&self, processor: &str, remaining: usize) {
        self.push(format!("finished {processor} {remaining}"));
    }

    fn on_progress(&self, processor: &str, progress: f32) {
        self.push(format!("progress {processor} {progress}"));
    }

    fn on_processor_error(&self, processor: &str, message: &str) {
        self.push(format!("error {processor}: {message}"));
    }
}
