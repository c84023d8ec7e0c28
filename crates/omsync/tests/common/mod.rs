#![allow(dead_code)]

use omsync::core::{ObjectDef, PropertyDef, RootDef};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Lights with an on switch and a speed, and a sound volume.
pub fn lights() -> RootDef {
    RootDef::new()
        .object(
            ObjectDef::new('l', "Lights")
                .property(PropertyDef::boolean('o', "On"))
                .property(PropertyDef::long('t', "Speed", 0, 60000)),
        )
        .object(ObjectDef::new('s', "Sound").property(PropertyDef::long('v', "Volume", 0, 21)))
}
