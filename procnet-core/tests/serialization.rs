//! Integration tests for saving, loading and upgrading documents.

mod common;

use std::sync::Arc;

use common::{factory, manual_network, output, Recorder, Scale, Source};
use parking_lot::Mutex;
use procnet_core::error::{ElementError, SerializationError};
use procnet_core::serialization::{
    document_version, parse_document, ConverterChain, Deserializer, Serializer, CURRENT_VERSION,
};
use procnet_core::ProcessorNetwork;
use serde_json::json;

/// source -> scale, with a link and some metadata.
fn scene() -> ProcessorNetwork {
    let (mut network, _pool) = manual_network();
    network.add_processor(Source::new("source")).unwrap();
    network.add_processor(Scale::new("scale")).unwrap();
    network.add_connection("source.outport", "scale.inport").unwrap();
    network.add_link("source.camera.aspect", "scale.factor").unwrap();
    network.set_property("source.value", 4.5).unwrap();
    network.set_property("source.camera.aspect", 2.5_f32).unwrap();
    let source = network.processor_mut("source").unwrap();
    source.base_mut().set_display_name("Four and a half");
    source.base_mut().metadata_mut().set("position", [10.0, -20.0]);
    network
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn saved_files_load_back_identically() {
    let network = scene();
    let path = std::env::temp_dir().join(format!("procnet-{}.json", std::process::id()));
    Serializer::new().save(&network, &path).unwrap();

    let factory = factory();
    let (mut restored, _pool) = manual_network();
    Deserializer::new(&factory).load_file(&mut restored, &path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(
        Serializer::new().serialize(&restored).unwrap(),
        Serializer::new().serialize(&network).unwrap()
    );
    let source = restored.processor("source").unwrap();
    assert_eq!(source.base().display_name(), "Four and a half");
    assert_eq!(
        source.base().metadata().get::<[f64; 2]>("position"),
        Some([10.0, -20.0])
    );
    assert!(restored.is_linked("source.camera.aspect", "scale.factor"));
}

#[test]
fn loaded_networks_evaluate() {
    let text = Serializer::new().compact().serialize(&scene()).unwrap();
    assert!(!text.contains('\n'));

    let factory = factory();
    let (mut network, _pool) = manual_network();
    Deserializer::new(&factory).load(&mut network, &text).unwrap();
    network.evaluate();
    assert_eq!(output(&network, "scale"), Some(11.25));
}

#[test]
fn loading_notifies_once() {
    let text = Serializer::new().serialize(&scene()).unwrap();
    let factory = factory();
    let (mut network, _pool) = manual_network();
    let recorder = Recorder::attach(&mut network);

    Deserializer::new(&factory).load(&mut network, &text).unwrap();
    assert_eq!(recorder.count("modified"), 1);
    assert_eq!(recorder.count("evaluate"), 1);
    assert!(!network.is_deserializing());
}

#[test]
fn appending_twice_keeps_both_copies() {
    let text = Serializer::new().serialize(&scene()).unwrap();
    let factory = factory();
    let mut network = scene();

    let renames = Deserializer::new(&factory).append(&mut network, &text).unwrap();
    assert_eq!(renames.len(), 2);
    assert_eq!(network.len(), 4);
    assert_eq!(network.connections().count(), 2);
    assert_eq!(network.links().count(), 2);

    let source = &renames["source"];
    let scale = &renames["scale"];
    assert!(network.is_connected(&format!("{source}.outport"), &format!("{scale}.inport")));
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

#[test]
fn first_version_documents_are_upgraded() {
    let text = json!({
        "version": 1,
        "processors": [
            { "identifier": "source", "type": "test.Source",
              "properties": [
                  { "identifier": "value", "type": "double", "value": "3" },
                  { "identifier": "camera", "type": "composite", "properties": [
                      { "identifier": "aspect", "type": "float", "value": "-1" }
                  ] }
              ] },
            { "identifier": "scale", "type": "test.Scale" }
        ],
        "connections": [ { "src": "source.outport", "dst": "scale.inport" } ]
    })
    .to_string();

    let factory = factory();
    let (mut network, _pool) = manual_network();
    let errors = Mutex::new(Vec::new());
    Deserializer::new(&factory)
        .with_handler(|err| errors.lock().push(err))
        .load(&mut network, &text)
        .unwrap();

    assert!(errors.lock().is_empty(), "{:?}", errors.lock());
    assert_eq!(network.get_property::<f64>("source.value"), Some(3.0));
    assert_eq!(network.get_property::<f32>("source.camera.aspect"), Some(-1.0));
    assert!(network.is_connected("source.outport", "scale.inport"));

    let saved = parse_document(&Serializer::new().serialize(&network).unwrap()).unwrap();
    assert_eq!(document_version(&saved).unwrap(), CURRENT_VERSION);
}

#[test]
fn converters_run_in_order_once_each() {
    let steps = Arc::new(Mutex::new(Vec::new()));
    let mut chain = ConverterChain::new(4);
    for version in [3, 1, 2] {
        let steps = Arc::clone(&steps);
        chain.register_fn(version, move |document| {
            steps.lock().push(version);
            let seen = document["version"].as_u64();
            if seen == Some(u64::from(version)) {
                Ok(())
            } else {
                Err(format!("expected version {version}, saw {seen:?}"))
            }
        });
    }

    let mut document = json!({ "version": 1 });
    assert_eq!(chain.upgrade(&mut document, 1).unwrap(), 4);
    assert_eq!(*steps.lock(), vec![1, 2, 3]);
    assert_eq!(document["version"], 4);

    // Already current: nothing runs
    steps.lock().clear();
    assert_eq!(chain.upgrade(&mut document, 4).unwrap(), 4);
    assert!(steps.lock().is_empty());
}

#[test]
fn fatal_documents_are_rejected() {
    let factory = factory();
    let mut network = scene();
    let before = Serializer::new().serialize(&network).unwrap();

    let newer = json!({ "version": CURRENT_VERSION + 1, "processors": [] }).to_string();
    for text in ["{ not json", r#"{ "processors": [] }"#, newer.as_str()] {
        assert!(Deserializer::new(&factory).load(&mut network, text).is_err(), "{text}");
    }
    assert!(matches!(
        Deserializer::new(&factory).load(&mut network, &newer),
        Err(SerializationError::UnsupportedVersion { .. })
    ));

    // A chain with a gap fails before converting anything
    let mut chain = ConverterChain::new(CURRENT_VERSION);
    chain.register_fn(2, |_| Ok(()));
    let old = json!({ "version": 1, "processors": [] }).to_string();
    assert!(matches!(
        Deserializer::new(&factory)
            .with_converters(chain)
            .load(&mut network, &old),
        Err(SerializationError::MissingConverter(1))
    ));

    assert_eq!(Serializer::new().serialize(&network).unwrap(), before);
}

#[test]
fn unknown_processor_types_are_reported() {
    let text = json!({
        "version": CURRENT_VERSION,
        "processors": [
            { "identifier": "mystery", "type": "test.Mystery" },
            { "identifier": "source", "type": "test.Source" }
        ],
        "connections": [ { "outport": "mystery.outport", "inport": "source.inport" } ]
    })
    .to_string();

    let factory = factory();
    let (mut network, _pool) = manual_network();
    let errors = Mutex::new(Vec::new());
    Deserializer::new(&factory)
        .with_handler(|err| errors.lock().push(err))
        .load(&mut network, &text)
        .unwrap();

    let errors = errors.into_inner();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(matches!(
        &errors[0],
        ElementError::UnknownProcessorType { class, .. } if class == "test.Mystery"
    ));
    assert_eq!(network.len(), 1);
    assert!(network.contains("source"));
}
