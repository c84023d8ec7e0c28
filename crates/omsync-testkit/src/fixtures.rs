//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use omsync::log_level::{level_property, LogLevel};
use omsync::{Endpoint, EndpointConfig};
use omsync_core::{
    Connector, ConnectorRegistry, ObjectDef, ObjectRef, Property, PropertyDef, Role, RootDef,
    Value,
};
use omsync_sync::{LinkHandle, MemoryLink, Transport};

use crate::lossy::LossyLink;

fn light(id: char, name: &str) -> ObjectDef {
    ObjectDef::new(id, name).connector("light").properties([
        PropertyDef::long('a', "Anim", 0, 100),
        PropertyDef::boolean('o', "On"),
        PropertyDef::hex('c', "Color1", 0, 0xFF_FFFF),
        PropertyDef::hex('d', "Color2", 0, 0xFF_FFFF),
        PropertyDef::long('s', "Speed", 0, 60000),
        PropertyDef::boolean('r', "Reverse"),
    ])
}

fn group(id: char, name: &str) -> ObjectDef {
    ObjectDef::new(id, name)
        .connector("group")
        .property(PropertyDef::boolean('o', "On"))
}

/// A model ship's lighting, sound and debug tree: groups of lights three
/// levels deep plus a handful of flat effector objects.
///
/// Connector names: `light`, `group`, `rectenna`, `ramp`, `sound`, `debug`.
pub fn falcon_schema() -> RootDef {
    RootDef::new()
        .object(
            ObjectDef::new('l', "Lights")
                .object(light('e', "Engine"))
                .object(light('l', "Landing"))
                .object(light('w', "Warning"))
                .object(light('r', "Ramp"))
                .object(
                    group('t', "Tubes")
                        .object(light('s', "Sconce"))
                        .object(light('f', "Floor")),
                )
                .object(
                    group('h', "Hold")
                        .object(light('y', "Bay"))
                        .object(light('b', "Bed")),
                ),
        )
        .object(ObjectDef::new('a', "Rectenna").connector("rectenna").properties([
            PropertyDef::boolean('s', "Sweep"),
            PropertyDef::long('v', "Speed", 0, 100),
            PropertyDef::long('p', "Position", 0, 100).read_only_device(),
        ]))
        .object(ObjectDef::new('r', "Ramp").connector("ramp").properties([
            PropertyDef::chars('s', "State", "RrSeE"),
            PropertyDef::long('v', "Speed", 0, 100),
        ]))
        .object(ObjectDef::new('s', "Sound").connector("sound").properties([
            PropertyDef::long('p', "Play", 0, 100).write_only_device(),
            PropertyDef::long('v', "Volume", 0, 21),
            PropertyDef::text('l', "List").read_only_device(),
        ]))
        .object(
            ObjectDef::new('d', "Debug")
                .connector("debug")
                .property(level_property('l', "LogLevel")),
        )
}

/// Registry for [`falcon_schema`] with `recorder` behind every effector
/// and a [`LogLevel`] behind `debug`.
pub fn falcon_connectors(recorder: &RecordingConnector) -> ConnectorRegistry {
    let shared: Arc<dyn Connector> = Arc::new(recorder.clone());
    let mut registry = ConnectorRegistry::new();
    for name in ["light", "group", "rectenna", "ramp", "sound"] {
        registry.register(name, Arc::clone(&shared));
    }
    registry.with("debug", Arc::new(LogLevel::default()))
}

/// A connector callback, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Object path.
    Init(String),
    /// Property path and the value pushed.
    Push(String, String),
    /// Property path.
    Pull(String),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<Call>,
    readings: HashMap<String, Value>,
}

/// A connector that records every call and answers pulls from values set
/// with [`set_reading`](Self::set_reading). Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// What the next pull of `path` reports.
    pub fn set_reading(&self, path: &str, value: Value) {
        self.lock().readings.insert(path.to_string(), value);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Only the pushes, as `(path, value)`.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Push(path, value) => Some((path.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Connector for RecordingConnector {
    fn init(&self, object: ObjectRef<'_>) {
        self.lock().calls.push(Call::Init(object.path.to_string()));
    }

    fn push(&self, _object: ObjectRef<'_>, property: &Property) {
        self.lock().calls.push(Call::Push(
            property.path().to_string(),
            property.value_string(),
        ));
    }

    fn pull(&self, _object: ObjectRef<'_>, property: &Property) -> Option<Value> {
        let mut recorded = self.lock();
        recorded.calls.push(Call::Pull(property.path().to_string()));
        recorded.readings.get(property.path()).cloned()
    }
}

/// A device and a controller joined by an in-memory link, driven on a
/// simulated clock.
pub struct Pair {
    pub device: Endpoint,
    pub controller: Endpoint,
    /// The device's end of the wire.
    pub wire: MemoryLink,
    /// The controller's end of the wire.
    pub controller_wire: MemoryLink,
    pub now: Instant,
    /// Simulated time per [`step`](Self::step).
    pub step_len: Duration,
}

impl Pair {
    pub fn new(schema: RootDef) -> Self {
        Self::with(schema, ConnectorRegistry::new(), EndpointConfig::default())
    }

    /// Both ends share `connectors` and `config`.
    pub fn with(schema: RootDef, connectors: ConnectorRegistry, config: EndpointConfig) -> Self {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (wire_a, wire_b) = MemoryLink::pair(a.clone(), b.clone());
        let links = (wire_a.clone(), wire_b.clone());
        Self::join(schema, connectors, config, (a, b), links, (wire_a, wire_b))
    }

    /// Like [`with`](Self::with), but each end loses a `loss` share of the
    /// frames it sends. The device's losses are seeded with `seed`, the
    /// controller's with `seed + 1`.
    pub fn lossy(
        schema: RootDef,
        connectors: ConnectorRegistry,
        config: EndpointConfig,
        loss: f64,
        seed: u64,
    ) -> Self {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (wire_a, wire_b) = MemoryLink::pair(a.clone(), b.clone());
        let links = (
            LossyLink::new(wire_a.clone(), a.clone(), loss, seed),
            LossyLink::new(wire_b.clone(), b.clone(), loss, seed.wrapping_add(1)),
        );
        Self::join(schema, connectors, config, (a, b), links, (wire_a, wire_b))
    }

    fn join<T: Transport + 'static>(
        schema: RootDef,
        connectors: ConnectorRegistry,
        config: EndpointConfig,
        (a, b): (LinkHandle, LinkHandle),
        (link_a, link_b): (T, T),
        (wire_a, wire_b): (MemoryLink, MemoryLink),
    ) -> Self {
        let now = Instant::now();
        let device = Endpoint::builder(Role::Device, schema.clone())
            .connectors(connectors.clone())
            .config(config.clone())
            .build_at(a, link_a, now)
            .expect("device builds");
        let controller = Endpoint::builder(Role::Controller, schema)
            .connectors(connectors)
            .config(config)
            .build_at(b, link_b, now)
            .expect("controller builds");
        Self {
            device,
            controller,
            wire: wire_a,
            controller_wire: wire_b,
            now,
            step_len: Duration::from_millis(10),
        }
    }

    /// Advance the clock, tick both ends and deliver what they sent.
    /// Returns whether either end did anything.
    pub fn step(&mut self) -> bool {
        self.now += self.step_len;
        let device = self.device.tick_at(self.now);
        let controller = self.controller.tick_at(self.now);
        self.wire.pump();
        device || controller
    }

    /// Step until both ends go quiet. Returns the number of steps taken.
    pub fn settle(&mut self) -> usize {
        for steps in 1..=10_000 {
            if !self.step() && self.wire.in_flight() == 0 {
                return steps;
            }
        }
        panic!("pair did not settle");
    }
}
