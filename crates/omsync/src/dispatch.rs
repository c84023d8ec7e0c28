//! The command dispatcher.
//!
//! Parses nothing itself: it takes a [`Command`], resolves its body against
//! the tree and applies the operation. On an object every operation except
//! `=` applies to each property of the subtree in tree order.

use omsync_core::command::assign_fragment;
use omsync_core::{Command, CoreError, Locator, NodeRef, Op, Property, Root};
use omsync_store::{PrefSession, PrefStore};

use crate::config::QueryMode;
use crate::error::Result;

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Issued on this endpoint.
    Local,
    /// Received from the peer. Assignments from the peer are not sent back.
    Peer,
}

/// What a command did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Path of the node the command resolved to.
    pub path: String,
    /// Properties changed, marked, saved, loaded or removed.
    pub affected: usize,
    /// Preference writes that failed.
    pub failed: usize,
    /// Lines produced by `*` and `!`.
    pub lines: Vec<String>,
    /// Fragments to send to the peer right away.
    pub outgoing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    namespace: String,
    query_mode: QueryMode,
}

impl Dispatcher {
    pub fn new(namespace: impl Into<String>, query_mode: QueryMode) -> Self {
        Self {
            namespace: namespace.into(),
            query_mode,
        }
    }

    /// Run `command` against `root`.
    ///
    /// Errors leave the tree as it was: a bad path or value changes
    /// nothing. Preference write failures are counted in the outcome rather
    /// than returned, since the values stay valid in memory.
    pub fn execute(
        &self,
        root: &mut Root,
        prefs: &dyn PrefStore,
        command: &Command,
        origin: Origin,
    ) -> Result<Outcome> {
        let body = command.body();
        let resolved = root.resolve(body)?;
        let (path, value) = body.split_at(resolved.consumed);
        let locator = resolved.locator;
        let mut outcome = Outcome {
            path: node_path(root, &locator),
            ..Outcome::default()
        };

        match command.op() {
            Op::Assign => {
                if locator.is_object() {
                    return Err(CoreError::AssignToObject(path.to_string()).into());
                }
                let changed = match origin {
                    Origin::Local => root.assign(path, value)?,
                    Origin::Peer => root.assign_from_peer(path, value)?,
                };
                outcome.affected = usize::from(changed);
            }
            Op::Query => match self.query_mode {
                QueryMode::Deferred => outcome.affected = root.mark_changed(&locator),
                QueryMode::Immediate => {
                    let role = root.role();
                    outcome.outgoing = targets(root, &locator)
                        .into_iter()
                        .filter(|p| p.flags().transmits(role))
                        .map(|p| assign_fragment(p.path(), &p.value_string()))
                        .collect();
                    outcome.affected = outcome.outgoing.len();
                }
            },
            Op::Dump => {
                if let Some(node) = root.node(&locator) {
                    match node {
                        NodeRef::Property(_) => outcome.lines.push(node.describe()),
                        NodeRef::Object(object) => {
                            object.walk(&mut |n| outcome.lines.push(n.describe()))
                        }
                    }
                }
                for line in &outcome.lines {
                    tracing::info!("{}", line);
                }
                outcome.affected = outcome.lines.len();
            }
            Op::Save => {
                let session = PrefSession::open(prefs, &self.namespace)?;
                for p in persistent(root, &locator) {
                    match session.put(p.path(), &p.value_string()) {
                        Ok(()) => outcome.affected += 1,
                        Err(e) => {
                            tracing::error!("save {}: {}", p.path(), e);
                            outcome.failed += 1;
                        }
                    }
                }
            }
            Op::Load => {
                let session = PrefSession::open(prefs, &self.namespace)?;
                let paths: Vec<String> = persistent(root, &locator)
                    .into_iter()
                    .map(|p| p.path().to_string())
                    .collect();
                for path in paths {
                    let Some(text) = session.get(&path)? else {
                        continue;
                    };
                    match root.assign(&path, &text) {
                        Ok(_) => outcome.affected += 1,
                        Err(e) => tracing::warn!("ignoring saved value: {}", e),
                    }
                }
            }
            Op::DumpSaved => {
                let session = PrefSession::open(prefs, &self.namespace)?;
                for p in persistent(root, &locator) {
                    if let Some(text) = session.get(p.path())? {
                        let line = format!("saved path: {}  name: {}  value: {}", p.path(), p.name(), text);
                        tracing::info!("{}", line);
                        outcome.lines.push(line);
                    }
                }
                outcome.affected = outcome.lines.len();
            }
            Op::RemoveSaved => {
                let session = PrefSession::open(prefs, &self.namespace)?;
                for p in persistent(root, &locator) {
                    match session.remove(p.path()) {
                        Ok(true) => outcome.affected += 1,
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!("remove {}: {}", p.path(), e);
                            outcome.failed += 1;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "{} {} ({:?}): {} affected",
            command.op(),
            outcome.path,
            origin,
            outcome.affected
        );
        Ok(outcome)
    }
}

fn node_path(root: &Root, locator: &Locator) -> String {
    match root.node(locator) {
        Some(node) if !node.path().is_empty() => node.path().to_string(),
        _ => root.id().to_string(),
    }
}

/// Properties under `locator` in tree order.
fn targets<'a>(root: &'a Root, locator: &Locator) -> Vec<&'a Property> {
    match root.node(locator) {
        Some(NodeRef::Property(p)) => vec![p],
        Some(NodeRef::Object(o)) => o.iter_properties().collect(),
        None => Vec::new(),
    }
}

fn persistent<'a>(root: &'a Root, locator: &Locator) -> Vec<&'a Property> {
    let role = root.role();
    targets(root, locator)
        .into_iter()
        .filter(|p| p.flags().persists(role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EndpointError;
    use omsync_core::{ConnectorRegistry, ObjectDef, PropertyDef, Role, RootDef};
    use omsync_store::MemoryPrefs;

    fn root() -> Root {
        RootDef::new()
            .object(
                ObjectDef::new('l', "Lights")
                    .property(PropertyDef::boolean('o', "On"))
                    .property(PropertyDef::long('t', "Speed", 0, 60000)),
            )
            .object(
                ObjectDef::new('s', "Sound")
                    .property(PropertyDef::long('v', "Volume", 0, 21))
                    .property(PropertyDef::long('p', "Peak", 0, 100).read_only_device()),
            )
            .build(Role::Device, &ConnectorRegistry::new())
            .unwrap()
    }

    fn run(
        dispatcher: &Dispatcher,
        root: &mut Root,
        prefs: &MemoryPrefs,
        text: &str,
    ) -> Result<Outcome> {
        dispatcher.execute(root, prefs, &Command::parse(text).unwrap(), Origin::Local)
    }

    #[test]
    fn test_assign_marks_dirty() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        let outcome = run(&d, &mut root, &prefs, "=lt500").unwrap();
        assert_eq!(outcome.path, "lt");
        assert_eq!(outcome.affected, 1);
        assert_eq!(root.property("lt").unwrap().as_long(), Some(500));
        assert!(root.property("lt").unwrap().is_changed());
    }

    #[test]
    fn test_assign_errors_change_nothing() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        assert!(matches!(
            run(&d, &mut root, &prefs, "=lt70000"),
            Err(EndpointError::Core(CoreError::InvalidValue { .. }))
        ));
        assert!(matches!(
            run(&d, &mut root, &prefs, "=l1"),
            Err(EndpointError::Core(CoreError::AssignToObject(_)))
        ));
        assert!(matches!(
            run(&d, &mut root, &prefs, "=x1"),
            Err(EndpointError::Core(CoreError::NodeNotFound(_)))
        ));
        assert_eq!(root.changed_count(), 0);
    }

    #[test]
    fn test_peer_assign_not_echoed() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        let command = Command::parse("=sv7").unwrap();
        d.execute(&mut root, &prefs, &command, Origin::Peer).unwrap();
        assert_eq!(root.property("sv").unwrap().as_long(), Some(7));
        assert_eq!(root.changed_count(), 0);
    }

    #[test]
    fn test_query_root_forces_all_dirty() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        let outcome = run(&d, &mut root, &prefs, "?R").unwrap();
        assert_eq!(outcome.path, "R");
        assert_eq!(outcome.affected, 4);
        assert_eq!(root.changed_count(), 4);
    }

    #[test]
    fn test_query_immediate() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Immediate), root(), MemoryPrefs::new());
        let outcome = run(&d, &mut root, &prefs, "?s").unwrap();
        assert_eq!(outcome.outgoing, vec!["=sv0", "=sp0"]);
        assert_eq!(root.changed_count(), 0);
    }

    #[test]
    fn test_dump_lines() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        let outcome = run(&d, &mut root, &prefs, "*l").unwrap();
        assert_eq!(outcome.lines.len(), 3);
        assert_eq!(outcome.lines[2], "property path: lt  name: Speed  value: 0");
    }

    #[test]
    fn test_save_load_remove() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        run(&d, &mut root, &prefs, "=sv12").unwrap();
        run(&d, &mut root, &prefs, "=sp50").unwrap();

        let saved = run(&d, &mut root, &prefs, ">s").unwrap();
        assert_eq!(saved.affected, 1, "read-only-device values are not persisted");

        run(&d, &mut root, &prefs, "=sv3").unwrap();
        let loaded = run(&d, &mut root, &prefs, "<R").unwrap();
        assert_eq!(loaded.affected, 1);
        assert_eq!(root.property("sv").unwrap().as_long(), Some(12));

        let listed = run(&d, &mut root, &prefs, "!R").unwrap();
        assert_eq!(listed.lines, vec!["saved path: sv  name: Volume  value: 12"]);

        assert_eq!(run(&d, &mut root, &prefs, "-sv").unwrap().affected, 1);
        assert!(run(&d, &mut root, &prefs, "!R").unwrap().lines.is_empty());
    }

    #[test]
    fn test_save_failure_counted() {
        let (d, mut root, prefs) = (Dispatcher::new("OM", QueryMode::Deferred), root(), MemoryPrefs::new());
        prefs.set_read_only(true).unwrap();
        run(&d, &mut root, &prefs, "=lt9").unwrap();
        let outcome = run(&d, &mut root, &prefs, ">l").unwrap();
        assert_eq!(outcome.failed, 2);
        assert_eq!(root.property("lt").unwrap().as_long(), Some(9));
    }
}
