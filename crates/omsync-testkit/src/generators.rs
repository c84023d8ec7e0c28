//! Proptest generators for property-based testing.

use proptest::prelude::*;

use omsync_core::{Op, PropertyKind, Value};

/// A character usable as a node id.
pub fn node_id() -> impl Strategy<Value = char> {
    prop::char::range('a', 'z')
}

/// An integer kind with a sane range in either radix.
pub fn long_kind() -> impl Strategy<Value = PropertyKind> {
    (-100_000i64..100_000, 0i64..200_000, prop_oneof![Just(10u32), Just(16u32)])
        .prop_map(|(min, span, radix)| PropertyKind::Long {
            min,
            max: min + span,
            radix,
        })
}

/// An enumerated-character kind.
pub fn char_kind() -> impl Strategy<Value = PropertyKind> {
    "[A-Za-z0-9]{1,8}".prop_map(|valid| PropertyKind::Char { valid })
}

/// Any property kind.
pub fn kind() -> impl Strategy<Value = PropertyKind> {
    prop_oneof![
        Just(PropertyKind::Bool),
        long_kind(),
        char_kind(),
        Just(PropertyKind::Text),
    ]
}

/// A value that is legal for `kind`.
pub fn legal_value(kind: &PropertyKind) -> BoxedStrategy<Value> {
    match kind.clone() {
        PropertyKind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        PropertyKind::Long { min, max, .. } => (min..=max).prop_map(Value::Long).boxed(),
        PropertyKind::Char { valid } => {
            let chars: Vec<char> = valid.chars().collect();
            prop::sample::select(chars).prop_map(Value::Char).boxed()
        }
        PropertyKind::Text => "[ -:<-~]{0,40}".prop_map(Value::Text).boxed(),
    }
}

/// A kind together with a legal value for it.
pub fn kind_and_value() -> impl Strategy<Value = (PropertyKind, Value)> {
    kind().prop_flat_map(|kind| {
        let value = legal_value(&kind);
        (Just(kind), value)
    })
}

/// Any operation character.
pub fn op() -> impl Strategy<Value = Op> {
    prop::sample::select(Op::ALL.to_vec())
}

/// Command text of the form `<op><path>`, paths not necessarily valid.
pub fn command_text() -> impl Strategy<Value = String> {
    (op(), "[a-zR]{0,4}").prop_map(|(op, path)| format!("{}{}", op.as_char(), path))
}

/// File sizes at and around multiples of `chunk`, plus zero.
pub fn file_len(chunk: usize, max_chunks: usize) -> impl Strategy<Value = usize> {
    (0..=max_chunks, prop_oneof![Just(0usize), 1..chunk]).prop_map(move |(k, r)| k * chunk + r)
}
