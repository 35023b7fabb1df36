//! Integration tests for network topology, propagation and batching.

mod common;

use common::{manual_network, output, Recorder, Scale, Source};
use procnet_core::error::NetworkError;
use procnet_core::invalidation::InvalidationLevel;
use procnet_core::network::Evaluator;
use procnet_core::processor::ProcessorStatus;

/// source -> scale -> scale2
fn pipeline() -> procnet_core::ProcessorNetwork {
    let (mut network, _pool) = manual_network();
    network.add_processor(Source::new("source")).unwrap();
    network.add_processor(Scale::new("scale")).unwrap();
    network.add_processor(Scale::new("scale2")).unwrap();
    network.add_connection("source.outport", "scale.inport").unwrap();
    network.add_connection("scale.outport", "scale2.inport").unwrap();
    network
}

#[test]
fn values_flow_through_the_pipeline() {
    let mut network = pipeline();
    network.set_property("source.value", 10.0).unwrap();

    let report = network.evaluate();
    assert_eq!(report.processed, vec!["source", "scale", "scale2"]);
    assert_eq!(output(&network, "scale2"), Some(40.0));
}

#[test]
fn readiness_follows_upstream_validity() {
    let mut network = pipeline();
    network.evaluate();
    assert_eq!(network.status("scale"), Some(ProcessorStatus::Ready));

    network
        .invalidate_processor("source", InvalidationLevel::InvalidOutput)
        .unwrap();
    assert!(matches!(network.status("scale"), Some(ProcessorStatus::NotReady(_))));
    assert!(!network.processor("scale2").unwrap().base().is_valid());

    network.process_processor("source").unwrap();
    assert_eq!(network.status("scale"), Some(ProcessorStatus::Ready));
}

#[test]
fn removal_cleans_up_every_edge() {
    let mut network = pipeline();
    network.add_link("source.value", "scale.factor").unwrap();
    network.add_link("scale2.factor", "scale.factor").unwrap();

    network.remove_processor("scale").unwrap();
    assert_eq!(network.connections().count(), 0);
    assert_eq!(network.links().count(), 0);
    assert!(!network.is_port_in_network("scale.inport"));

    // The freed identifier can be reused
    network.add_processor(Scale::new("scale")).unwrap();
    network.add_connection("source.outport", "scale.inport").unwrap();
    assert_eq!(network.connections().count(), 1);
}

#[test]
fn structural_errors_leave_state_unchanged() {
    let mut network = pipeline();
    let version = network.version();

    assert!(network.add_processor(Source::new("source")).is_err());
    assert!(network.add_connection("scale2.outport", "scale.inport").is_err());
    assert!(matches!(
        network.add_connection_replacing("scale2.outport", "source.inport"),
        Err(NetworkError::UnknownPort { .. })
    ));
    assert!(network.add_link("source.value", "source.camera").is_err());
    assert!(network.set_property("source.missing", 1.0).is_err());

    assert_eq!(network.version(), version);
    assert_eq!(network.len(), 3);
    assert_eq!(network.connections().count(), 2);
}

#[test]
fn batched_edits_notify_once() {
    let (mut network, _pool) = manual_network();
    let recorder = Recorder::attach(&mut network);

    {
        let mut network = network.locked();
        for i in 0..20 {
            network.add_processor(Source::new(&format!("s{i}"))).unwrap();
        }
        for i in 1..20 {
            network
                .add_link(&format!("s{}.value", i - 1), &format!("s{i}.value"))
                .unwrap();
        }
        network.set_property("s0.value", 3.0).unwrap();
        assert!(network.is_locked());
    }

    assert_eq!(recorder.count("begin"), 1);
    assert_eq!(recorder.count("end"), 1);
    assert_eq!(recorder.count("evaluate"), 1);
    assert_eq!(recorder.count("modified"), 1);
    assert_eq!(network.get_property::<f64>("s19.value"), Some(3.0));
}

#[test]
fn linked_cycles_settle() {
    let (mut network, _pool) = manual_network();
    for id in ["a", "b", "c"] {
        network.add_processor(Source::new(id)).unwrap();
    }
    network.add_link("a.value", "b.value").unwrap();
    network.add_link("b.value", "c.count").unwrap();
    network.add_link("c.count", "a.value").unwrap();

    for i in 0..100 {
        let value = f64::from(i) + 0.25;
        network.set_property("a.value", value).unwrap();
        assert_eq!(network.get_property::<f64>("b.value"), Some(value));
        assert_eq!(network.get_property::<i64>("c.count"), Some(i64::from(i)));
        // The origin keeps the value that was set
        assert_eq!(network.get_property::<f64>("a.value"), Some(value));
    }
}

#[test]
fn drifted_destinations_follow_a_repeated_set() {
    let (mut network, _pool) = manual_network();
    network.add_processor(Source::new("a")).unwrap();
    network.add_processor(Source::new("b")).unwrap();
    network.set_property("a.value", 5.0).unwrap();
    network.add_link("a.value", "b.value").unwrap();

    network.set_property("a.value", 5.0).unwrap();
    assert_eq!(network.get_property::<f64>("b.value"), Some(5.0));
}

#[test]
fn evaluator_drives_the_network() {
    let mut network = pipeline();
    let evaluator = Evaluator::attach(&mut network);

    let report = evaluator.evaluate_if_requested(&mut network).unwrap();
    assert_eq!(report.processed.len(), 3);

    network.set_property("scale2.factor", 5.0).unwrap();
    let report = evaluator.evaluate_if_requested(&mut network).unwrap();
    assert_eq!(report.processed, vec!["scale2"]);
    assert_eq!(output(&network, "scale2"), Some(10.0));
}

#[test]
fn nested_properties_link_and_persist_values() {
    let (mut network, _pool) = manual_network();
    network.add_processor(Source::new("a")).unwrap();
    network.add_processor(Source::new("b")).unwrap();
    network
        .add_bidirectional_link("a.camera.aspect", "b.camera.aspect")
        .unwrap();

    network.set_property("b.camera.aspect", 0.5_f32).unwrap();
    assert_eq!(network.get_property::<f32>("a.camera.aspect"), Some(0.5));
    assert_eq!(network.links_between_processors("a", "b").len(), 2);
}
