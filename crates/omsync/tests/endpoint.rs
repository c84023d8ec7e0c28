//! Device and controller talking over an in-memory link.

mod common;

use std::sync::{Arc, Mutex};

use omsync::core::{CoreError, ObjectDef, PropertyDef, RootDef, Value};
use omsync::{EndpointConfig, EndpointError, EndpointEvent, QueryMode};
use omsync_testkit::generators::{command_text, kind_and_value};
use omsync_testkit::{falcon_connectors, falcon_schema, Pair, RecordingConnector};
use proptest::prelude::*;

use common::{init_tracing, lights};

fn long(pair_side: &omsync::Endpoint, path: &str) -> Option<i64> {
    pair_side.root().property(path).and_then(|p| p.as_long())
}

/// Connect the pair and throw away the start-up traffic.
fn connected(mut pair: Pair) -> Pair {
    pair.settle();
    assert!(pair.device.is_connected());
    assert!(pair.controller.is_connected());
    pair.device.drain_events();
    pair.controller.drain_events();
    pair.wire.take_sent();
    pair.controller_wire.take_sent();
    pair
}

#[test]
fn test_out_of_range_assignment_rejected() {
    init_tracing();
    let mut pair = Pair::new(lights());
    pair.device.command("=lt500").unwrap();

    let err = pair.device.command("=lt70000").unwrap_err();
    assert!(matches!(
        err,
        EndpointError::Core(CoreError::InvalidValue { .. })
    ));
    assert_eq!(long(&pair.device, "lt"), Some(500));
}

#[test]
fn test_assignment_marks_dirty_and_reaches_peer() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    let outcome = pair.device.command("=lt500").unwrap();
    assert_eq!(outcome.affected, 1);
    assert!(pair.device.root().property("lt").unwrap().is_changed());

    pair.settle();
    assert_eq!(long(&pair.controller, "lt"), Some(500));
    assert_eq!(pair.device.root().changed_count(), 0);

    let sent: Vec<String> = pair
        .wire
        .take_sent()
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect();
    assert_eq!(sent, vec!["=lt500"]);
}

#[test]
fn test_query_root_marks_everything() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    let outcome = pair.device.command("?R").unwrap();
    assert_eq!(outcome.affected, 3);
    assert_eq!(pair.device.root().changed_count(), 3);

    pair.settle();
    assert_eq!(pair.device.root().changed_count(), 0);
    let sent = pair.wire.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][..], b"=lo0;=lt0;=sv0");
}

#[test]
fn test_controller_requests_snapshot_on_connect() {
    init_tracing();
    let mut pair = Pair::new(lights());
    pair.device.root_mut().set("lt", Value::Long(42)).unwrap();
    pair.device.root_mut().set("sv", Value::Long(9)).unwrap();
    pair.device.root_mut().drain_changed(&mut |_| {});

    pair.settle();
    assert_eq!(long(&pair.controller, "lt"), Some(42));
    assert_eq!(long(&pair.controller, "sv"), Some(9));
    let asked = pair
        .controller_wire
        .sent()
        .iter()
        .any(|f| &f[..] == b"?R");
    assert!(asked);
    assert!(pair
        .controller
        .drain_events()
        .iter()
        .any(|e| matches!(e, EndpointEvent::Connected)));
}

#[test]
fn test_peer_assignment_not_echoed() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    pair.controller.command("=sv7").unwrap();
    pair.settle();
    assert_eq!(long(&pair.device, "sv"), Some(7));
    assert_eq!(pair.device.root().changed_count(), 0);
    assert!(pair.wire.take_sent().is_empty());
}

#[test]
fn test_snapshot_is_batched() {
    init_tracing();
    let recorder = RecordingConnector::new();
    let mut pair = connected(Pair::with(
        falcon_schema(),
        falcon_connectors(&recorder),
        EndpointConfig::default(),
    ));
    pair.device.root_mut().set("les", Value::Long(1234)).unwrap();
    pair.device.root_mut().set("ltfc", Value::Long(0xff00ff)).unwrap();

    pair.device.command("?R").unwrap();
    pair.settle();

    let limit = pair.device.config().sync.batch_limit;
    let sent = pair.wire.take_sent();
    assert!(sent.len() > 1);
    for frame in &sent {
        assert!(frame.len() <= limit, "{} bytes", frame.len());
        let text = std::str::from_utf8(frame).unwrap();
        assert!(text.split(';').all(|f| f.starts_with('=') && f.len() > 2));
    }
    assert_eq!(long(&pair.controller, "les"), Some(1234));
    assert_eq!(long(&pair.controller, "ltfc"), Some(0xff00ff));
    // The log level stays local.
    assert!(!sent.iter().any(|f| f.starts_with(b"=dl")));
}

#[test]
fn test_connector_pushed_once_per_change() {
    init_tracing();
    let recorder = RecordingConnector::new();
    let mut pair = connected(Pair::with(
        falcon_schema(),
        falcon_connectors(&recorder),
        EndpointConfig::default(),
    ));
    recorder.take_calls();

    pair.controller.command("=les500").unwrap();
    pair.settle();
    pair.controller.command("=les500").unwrap();
    pair.settle();

    let pushes: Vec<_> = recorder
        .pushes()
        .into_iter()
        .filter(|(path, _)| path == "les")
        .collect();
    // Once on the controller, once on the device.
    assert_eq!(pushes.len(), 2);
    assert!(pushes.iter().all(|(_, v)| v == "500"));
}

#[test]
fn test_immediate_query() {
    init_tracing();
    let config = EndpointConfig {
        query_mode: QueryMode::Immediate,
        ..EndpointConfig::default()
    };
    let mut pair = connected(Pair::with(lights(), Default::default(), config));
    pair.device.root_mut().set("sv", Value::Long(9)).unwrap();
    pair.device.root_mut().drain_changed(&mut |_| {});

    let outcome = pair.device.command("?s").unwrap();
    assert_eq!(outcome.outgoing, vec!["=sv9"]);
    assert_eq!(pair.device.root().changed_count(), 0);

    pair.settle();
    assert_eq!(long(&pair.controller, "sv"), Some(9));
}

#[test]
fn test_send_command_runs_on_peer() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    pair.controller.send_command("=lt250").unwrap();
    pair.settle();
    assert_eq!(long(&pair.device, "lt"), Some(250));
    // Sent as a command, not as a change of the controller's own tree.
    assert_eq!(long(&pair.controller, "lt"), Some(0));

    assert!(matches!(
        pair.controller.send_command("x12"),
        Err(EndpointError::Core(CoreError::UnknownOperation('x')))
    ));
    assert!(matches!(
        pair.controller.send_command(""),
        Err(EndpointError::Core(CoreError::EmptyCommand))
    ));
}

#[test]
fn test_bad_peer_command_is_dropped() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    pair.controller.send_command("=zz1").unwrap();
    pair.controller.send_command("=lt99999").unwrap();
    pair.controller.send_command("=lo1").unwrap();
    pair.settle();
    assert_eq!(pair.device.root().property("lo").unwrap().as_bool(), Some(true));
    assert_eq!(long(&pair.device, "lt"), Some(0));
}

#[test]
fn test_change_observer() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    pair.device.on_change(move |p| sink.lock().unwrap().push(p.path().to_string()));

    pair.device.command("=lo1").unwrap();
    pair.device.command("=sv3").unwrap();
    pair.settle();
    assert_eq!(*seen.lock().unwrap(), vec!["lo", "sv"]);
}

#[test]
fn test_dump_returns_lines() {
    init_tracing();
    let mut pair = Pair::new(lights());
    pair.device.command("=sv4").unwrap();
    let outcome = pair.device.command("*s").unwrap();
    assert_eq!(
        outcome.lines,
        vec![
            "object path: s  name: Sound",
            "property path: sv  name: Volume  value: 4"
        ]
    );
}

#[test]
fn test_outage_and_reconnect() {
    init_tracing();
    let mut pair = connected(Pair::new(lights()));

    pair.wire.set_up(false);
    for _ in 0..300 {
        pair.step();
    }
    assert!(!pair.controller.is_connected());
    assert!(!pair.device.is_connected());

    // Changed while the link was down.
    pair.device.root_mut().set("lt", Value::Long(777)).unwrap();
    pair.device.root_mut().drain_changed(&mut |_| {});
    pair.controller_wire.take_sent();

    pair.wire.set_up(true);
    for _ in 0..300 {
        pair.step();
    }
    assert!(pair.controller.is_connected());
    assert!(pair.device.is_connected());
    assert_eq!(long(&pair.controller, "lt"), Some(777));

    let events = pair.controller.drain_events();
    let disconnected = events
        .iter()
        .position(|e| matches!(e, EndpointEvent::Disconnected));
    let connected = events
        .iter()
        .rposition(|e| matches!(e, EndpointEvent::Connected));
    assert!(disconnected < connected);
    assert!(pair
        .controller_wire
        .sent()
        .iter()
        .any(|f| &f[..] == b"?R"));
}

#[test]
fn test_refresh_sends_connector_value() {
    init_tracing();
    let recorder = RecordingConnector::new();
    let mut pair = connected(Pair::with(
        falcon_schema(),
        falcon_connectors(&recorder),
        EndpointConfig::default(),
    ));

    recorder.set_reading("av", Value::Long(66));
    assert_eq!(pair.device.refresh("av").unwrap(), 1);
    pair.settle();
    assert_eq!(long(&pair.controller, "av"), Some(66));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_any_legal_value_reaches_device((kind, value) in kind_and_value()) {
        let schema = RootDef::new().object(
            ObjectDef::new('x', "Any").property(PropertyDef::new('v', "Value", kind)),
        );
        let mut pair = connected(Pair::new(schema));

        pair.controller.root_mut().set("xv", value.clone()).unwrap();
        pair.settle();

        prop_assert_eq!(pair.device.root().property("xv").map(|p| p.value().clone()), Some(value));
        prop_assert_eq!(pair.device.root().changed_count(), 0);
    }

    #[test]
    fn test_garbage_commands_leave_link_usable(texts in prop::collection::vec(command_text(), 1..8)) {
        let mut pair = connected(Pair::new(lights()));
        for text in &texts {
            let _ = pair.controller.send_command(text);
        }
        pair.settle();

        pair.controller.command("=lt1234").unwrap();
        pair.settle();
        prop_assert_eq!(long(&pair.device, "lt"), Some(1234));
    }
}
