//! Change sync: turning dirty properties into bounded packets.
//!
//! Each pass walks the tree in declaration order. Every dirty property
//! that may travel in this role becomes `=<path><value>` and has its flag
//! cleared. Fragments are joined with `;` and a packet is cut whenever the
//! next fragment would push it past the batch limit.

use omsync_core::command::assign_fragment;
use omsync_core::{Property, Root, SEPARATOR};

use crate::agent::Agent;
use crate::config::ChangeSyncConfig;

/// Accumulates fragments into packets no longer than `limit`.
///
/// A single fragment longer than the limit becomes a packet of its own.
#[derive(Debug)]
pub struct Batcher {
    limit: usize,
    current: String,
    packets: Vec<String>,
}

impl Batcher {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            current: String::new(),
            packets: Vec::new(),
        }
    }

    pub fn push(&mut self, fragment: &str) {
        if !self.current.is_empty() && self.current.len() + 1 + fragment.len() > self.limit {
            self.packets.push(std::mem::take(&mut self.current));
        }
        if !self.current.is_empty() {
            self.current.push(SEPARATOR);
        }
        self.current.push_str(fragment);
    }

    pub fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() {
            self.packets.push(self.current);
        }
        self.packets
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSync {
    config: ChangeSyncConfig,
}

impl ChangeSync {
    pub fn new(config: ChangeSyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChangeSyncConfig {
        &self.config
    }

    /// Clear every dirty flag and return the packets for the ones that may
    /// be transmitted.
    pub fn collect(&self, root: &mut Root) -> Vec<String> {
        self.collect_with(root, &mut |_| {})
    }

    /// Like [`collect`](Self::collect), calling `observer` for each property
    /// that goes out.
    pub fn collect_with(&self, root: &mut Root, observer: &mut dyn FnMut(&Property)) -> Vec<String> {
        let role = root.role();
        let mut batcher = Batcher::new(self.config.batch_limit);
        root.drain_changed(&mut |p| {
            if !p.flags().transmits(role) {
                tracing::trace!("not transmitting {} in {} role", p.path(), role);
                return;
            }
            batcher.push(&assign_fragment(p.path(), &p.value_string()));
            observer(p);
        });
        batcher.finish()
    }

    /// Run one pass and queue the packets on `agent`. Returns the number of
    /// packets queued.
    pub fn run(&self, root: &mut Root, agent: &mut Agent) -> usize {
        let mut queued = 0;
        for packet in self.collect(root) {
            match agent.queue_packet(packet) {
                Ok(()) => queued += 1,
                Err(e) => tracing::error!("dropping change packet: {}", e),
            }
        }
        queued
    }
}
