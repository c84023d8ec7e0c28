//! The Endpoint: one end of a synchronized property tree.
//!
//! An endpoint owns the tree, the delivery agent, the preference store and
//! the file-transfer state machine, and drives all of them from
//! [`tick`](Endpoint::tick). Nothing runs in the background: the link
//! driver only reports into the [`LinkHandle`] and the next tick picks that
//! up.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use omsync_core::command::query_fragment;
use omsync_core::{Command, ConnectorRegistry, Op, Property, Role, Root, RootDef, HEARTBEAT};
use omsync_store::{MemoryPrefs, PrefStore};
use omsync_sync::{
    Agent, AgentEvent, AgentStats, ChangeSync, FileTransfer, LinkHandle, SendKind, SyncError,
    TransferEvent, TransferState, Transport,
};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::EndpointConfig;
use crate::dispatch::{Dispatcher, Origin, Outcome};
use crate::error::Result;

/// Something the application may want to react to.
#[derive(Debug)]
pub enum EndpointEvent {
    Connected,
    Disconnected,
    /// A file from the peer was written in full.
    FileReceived { path: PathBuf, chunks: u32 },
    /// The peer acknowledged the last chunk of a file we sent.
    FileSent { name: String, chunks: u32 },
    /// A transfer in either direction was abandoned.
    TransferFailed(SyncError),
}

type Observer = Box<dyn FnMut(&Property) + Send>;

/// Builder for an [`Endpoint`].
pub struct EndpointBuilder {
    role: Role,
    schema: RootDef,
    connectors: ConnectorRegistry,
    prefs: Option<Box<dyn PrefStore>>,
    config: EndpointConfig,
}

impl EndpointBuilder {
    pub fn new(role: Role, schema: RootDef) -> Self {
        Self {
            role,
            schema,
            connectors: ConnectorRegistry::new(),
            prefs: None,
            config: EndpointConfig::default(),
        }
    }

    /// Connectors the schema refers to by name.
    pub fn connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = connectors;
        self
    }

    /// Where `>` and `<` keep values. Defaults to an in-memory store.
    pub fn prefs(mut self, prefs: impl PrefStore + 'static) -> Self {
        self.prefs = Some(Box::new(prefs));
        self
    }

    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the tree and run [`Endpoint::setup`].
    ///
    /// `handle` must be the handle `transport` reports completions and
    /// received frames to. Fails if the config does not fit the link; see
    /// [`EndpointConfig::validate`].
    pub fn build(self, handle: LinkHandle, transport: impl Transport + 'static) -> Result<Endpoint> {
        self.build_at(handle, transport, Instant::now())
    }

    /// Like [`build`](Self::build) with an explicit clock.
    pub fn build_at(
        self,
        handle: LinkHandle,
        transport: impl Transport + 'static,
        now: Instant,
    ) -> Result<Endpoint> {
        self.config.validate()?;
        let root = self.schema.build(self.role, &self.connectors)?;
        let agent = Agent::new(
            self.role,
            handle,
            Box::new(transport),
            self.config.agent.clone(),
            now,
        );
        let mut endpoint = Endpoint {
            dispatcher: Dispatcher::new(self.config.pref_namespace.clone(), self.config.query_mode),
            change_sync: ChangeSync::new(self.config.sync.clone()),
            transfer: FileTransfer::new(self.config.transfer.clone()),
            prefs: self
                .prefs
                .unwrap_or_else(|| Box::new(MemoryPrefs::new()) as Box<dyn PrefStore>),
            events: VecDeque::new(),
            observer: None,
            root,
            agent,
            config: self.config,
        };
        endpoint.setup();
        Ok(endpoint)
    }
}

/// One end of the link.
pub struct Endpoint {
    root: Root,
    agent: Agent,
    dispatcher: Dispatcher,
    change_sync: ChangeSync,
    transfer: FileTransfer,
    prefs: Box<dyn PrefStore>,
    config: EndpointConfig,
    events: VecDeque<EndpointEvent>,
    observer: Option<Observer>,
}

impl Endpoint {
    pub fn builder(role: Role, schema: RootDef) -> EndpointBuilder {
        EndpointBuilder::new(role, schema)
    }

    /// Bring the endpoint to its starting state.
    ///
    /// A device refreshes every property from its connectors, then applies
    /// any saved preferences on top, and announces itself with a heartbeat.
    /// A controller starts from the tree's initial values and waits for the
    /// device. Called by the builder.
    pub fn setup(&mut self) {
        if !self.root.is_device() {
            return;
        }
        let pulled = self.root.pull_all();
        tracing::debug!("pulled {} properties", pulled);

        let load = Command::new(Op::Load, self.root.id().to_string());
        match self.execute(&load, Origin::Local) {
            Ok(outcome) => tracing::info!("loaded {} saved values", outcome.affected),
            Err(e) => tracing::warn!("could not load preferences: {}", e),
        }
        if let Err(e) = self.agent.send_cmd(HEARTBEAT) {
            tracing::warn!("could not queue heartbeat: {}", e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn role(&self) -> Role {
        self.root.role()
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Mutable access to the tree. Local changes made here are sent on the
    /// next tick.
    pub fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.agent.is_connected()
    }

    /// The handle the link driver reports completions and frames to.
    pub fn handle(&self) -> &LinkHandle {
        self.agent.handle()
    }

    pub fn stats(&self) -> AgentStats {
        self.agent.stats()
    }

    pub fn transfer_state(&self) -> TransferState {
        self.transfer.state()
    }

    /// Frames and fragments still waiting to go out.
    pub fn pending_output(&self) -> usize {
        self.agent.pending_output()
    }

    /// Call `observer` for every property a change-sync pass sends.
    pub fn on_change(&mut self, observer: impl FnMut(&Property) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn drain_events(&mut self) -> Vec<EndpointEvent> {
        self.events.drain(..).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a command against the local tree.
    pub fn command(&mut self, text: &str) -> Result<Outcome> {
        let command = Command::parse(text)?;
        self.execute(&command, Origin::Local)
    }

    /// Queue a command for the peer to run.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        let command = Command::parse(text)?;
        self.agent.send_cmd(command.to_string())?;
        Ok(())
    }

    /// Re-read `path` from its connectors and send the result.
    pub fn refresh(&mut self, path: &str) -> Result<usize> {
        Ok(self.root.refresh(path)?)
    }

    fn execute(&mut self, command: &Command, origin: Origin) -> Result<Outcome> {
        let outcome = self
            .dispatcher
            .execute(&mut self.root, &*self.prefs, command, origin)?;
        for fragment in &outcome.outgoing {
            self.agent.send_cmd(fragment.as_str())?;
        }
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File transfer
    // ─────────────────────────────────────────────────────────────────────────

    /// Send `source` to the peer, to be stored there as `name`.
    pub fn start_file_transfer(&mut self, source: &Path, name: &str) -> Result<()> {
        Ok(self.transfer.start_send(source, name)?)
    }

    pub fn cancel_file_transfer(&mut self) -> bool {
        self.transfer.cancel()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Main loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one cycle.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// Run one cycle at `now`.
    ///
    /// Link reports are handled first, and a stalled file transfer is
    /// abandoned. Then, if the peer sent a command,
    /// exactly that one command is run and the cycle ends. Otherwise dirty
    /// properties are queued, the file transfer contributes its next frame
    /// and one frame is sent. Returns whether a command ran or a frame went
    /// out.
    ///
    /// May block for up to `send_timeout` waiting on the previous send.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        for event in self.agent.poll(now) {
            self.on_agent_event(event);
        }
        let stalled = self.transfer.poll(now);
        self.on_transfer_event(stalled);

        if let Some(text) = self.agent.next_command() {
            self.run_peer_command(&text);
            return true;
        }

        self.sync_changes();
        if let Some(frame) = self.transfer.next_frame() {
            if let Err(e) = self.agent.queue_file_frame(frame) {
                tracing::error!("cannot queue file frame: {}", e);
                let event = self.transfer.on_send_result(false);
                self.on_transfer_event(event);
            }
        }
        match self.agent.flush() {
            Ok(sent) => sent,
            Err(e) => {
                tracing::debug!("flush: {}", e);
                false
            }
        }
    }

    fn on_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Connection(true) => {
                if !self.root.is_device() {
                    let fragment = query_fragment(&self.root.id().to_string());
                    if let Err(e) = self.agent.send_cmd(fragment) {
                        tracing::warn!("cannot request snapshot: {}", e);
                    }
                }
                self.events.push_back(EndpointEvent::Connected);
            }
            AgentEvent::Connection(false) => self.events.push_back(EndpointEvent::Disconnected),
            AgentEvent::SendCompleted {
                kind: SendKind::File,
                success,
            } => {
                let event = self.transfer.on_send_result(success);
                self.on_transfer_event(event);
            }
            AgentEvent::SendCompleted { .. } => {}
            AgentEvent::File(frame) => {
                for event in self.transfer.handle_frame(frame) {
                    self.on_transfer_event(Some(event));
                }
            }
        }
    }

    fn on_transfer_event(&mut self, event: Option<TransferEvent>) {
        let event = match event {
            None => return,
            Some(TransferEvent::Sent { name, chunks }) => EndpointEvent::FileSent { name, chunks },
            Some(TransferEvent::Received { path, chunks }) => {
                EndpointEvent::FileReceived { path, chunks }
            }
            Some(TransferEvent::Failed(e)) => EndpointEvent::TransferFailed(e),
        };
        self.events.push_back(event);
    }

    fn run_peer_command(&mut self, text: &str) {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("peer command [{}]: {}", text, e);
                return;
            }
        };
        if let Err(e) = self.execute(&command, Origin::Peer) {
            tracing::warn!("peer command [{}]: {}", text, e);
        }
    }

    fn sync_changes(&mut self) {
        let packets = match self.observer.as_mut() {
            Some(observer) => self.change_sync.collect_with(&mut self.root, &mut **observer),
            None => self.change_sync.collect(&mut self.root),
        };
        for packet in packets {
            if let Err(e) = self.agent.queue_packet(packet) {
                tracing::error!("dropping change packet: {}", e);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Async driver
    // ─────────────────────────────────────────────────────────────────────────

    /// Tick every `period` until `shutdown` turns true or its sender is
    /// dropped. Events are discarded.
    pub async fn run(&mut self, period: Duration, shutdown: watch::Receiver<bool>) {
        self.run_with(period, shutdown, |_| {}).await
    }

    /// Like [`run`](Self::run), handing every event to `sink`.
    ///
    /// A tick may wait up to `send_timeout` on the previous send. On a
    /// multi-thread runtime that wait runs under `block_in_place`; on a
    /// current-thread runtime it holds up the other tasks for as long.
    pub async fn run_with(
        &mut self,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut sink: impl FnMut(EndpointEvent),
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("{} loop started", self.role());
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    match Handle::current().runtime_flavor() {
                        RuntimeFlavor::MultiThread => {
                            tokio::task::block_in_place(|| self.tick());
                        }
                        _ => {
                            self.tick();
                        }
                    }
                    for event in self.drain_events() {
                        sink(event);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("{} loop stopped", self.role());
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("root", &self.root)
            .field("agent", &self.agent)
            .field("transfer", &self.transfer.state())
            .field("events", &self.events.len())
            .finish()
    }
}
