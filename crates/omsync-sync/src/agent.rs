//! The delivery layer.
//!
//! The agent owns the transport and the command queues. Each tick the
//! caller first [`poll`](Agent::poll)s it to collect what the link reported,
//! then either services one received command with
//! [`next_command`](Agent::next_command) or, when there is none, sends one
//! frame with [`flush`](Agent::flush). Input always wins so a long outbound
//! backlog can never starve reception, and at most one command is serviced
//! per tick.
//!
//! Only one frame is meant to be in flight at a time. `flush` waits a
//! bounded time for the previous send to complete and then goes ahead
//! regardless; see [`LinkHandle::acquire`].

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;
use omsync_core::command::split_packet;
use omsync_core::{Role, HEARTBEAT, SEPARATOR};

use crate::config::AgentConfig;
use crate::error::{Result, SyncError};
use crate::frame::{self, FileFrame, Inbound};
use crate::heartbeat::{Beat, Heartbeat};
use crate::link::{Gate, LinkHandle};
use crate::transport::Transport;

/// What a transmission carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// Coalesced command fragments.
    Commands,
    /// A prebuilt change-sync packet.
    Packet,
    File,
}

/// Something the link reported, as seen from the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// The connection came up or went down.
    Connection(bool),
    SendCompleted { kind: SendKind, success: bool },
    /// A file-transfer frame arrived.
    File(FileFrame),
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub frames_received: u64,
    pub forced_clears: u64,
}

pub struct Agent {
    role: Role,
    config: AgentConfig,
    handle: LinkHandle,
    transport: Box<dyn Transport>,
    heartbeat: Heartbeat,
    inbound: VecDeque<String>,
    outbound: VecDeque<String>,
    packets: VecDeque<(SendKind, Bytes)>,
    in_flight: VecDeque<SendKind>,
    rejected: Vec<AgentEvent>,
    stats: AgentStats,
}

impl Agent {
    /// `handle` must be the one the transport reports to.
    pub fn new(
        role: Role,
        handle: LinkHandle,
        transport: Box<dyn Transport>,
        config: AgentConfig,
        now: Instant,
    ) -> Self {
        let heartbeat = Heartbeat::new(role, &config, now);
        Self {
            role,
            config,
            handle,
            transport,
            heartbeat,
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            packets: VecDeque::new(),
            in_flight: VecDeque::new(),
            rejected: Vec::new(),
            stats: AgentStats::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn handle(&self) -> &LinkHandle {
        &self.handle
    }

    pub fn is_connected(&self) -> bool {
        self.heartbeat.is_connected()
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.config.max_packet_len {
            return Err(SyncError::PacketTooLarge {
                len,
                max: self.config.max_packet_len,
            });
        }
        Ok(())
    }

    /// Queue a command fragment for the peer. Fragments are coalesced
    /// into as few frames as the packet limit allows.
    pub fn send_cmd(&mut self, fragment: impl Into<String>) -> Result<()> {
        let fragment = fragment.into();
        if fragment.is_empty() {
            return Ok(());
        }
        self.check_len(fragment.len())?;
        self.outbound.push_back(fragment);
        Ok(())
    }

    /// Queue a complete command packet to go out as its own frame.
    pub fn queue_packet(&mut self, packet: String) -> Result<()> {
        self.check_len(packet.len())?;
        self.packets.push_back((SendKind::Packet, Bytes::from(packet)));
        Ok(())
    }

    /// Queue a file-transfer frame.
    pub fn queue_file_frame(&mut self, frame: Bytes) -> Result<()> {
        self.check_len(frame.len())?;
        self.packets.push_back((SendKind::File, frame));
        Ok(())
    }

    /// Received commands waiting to be serviced.
    pub fn pending_input(&self) -> usize {
        self.inbound.len()
    }

    /// Fragments and frames waiting to be sent.
    pub fn pending_output(&self) -> usize {
        self.outbound.len() + self.packets.len()
    }

    /// Pop the oldest received command.
    pub fn next_command(&mut self) -> Option<String> {
        self.inbound.pop_front()
    }

    /// Collect what the link reported since the last poll and advance the
    /// heartbeat.
    pub fn poll(&mut self, now: Instant) -> Vec<AgentEvent> {
        let mut events = std::mem::take(&mut self.rejected);
        let link = self.handle.drain();

        for success in link.completions {
            let kind = self.in_flight.pop_front().unwrap_or(SendKind::Commands);
            if success {
                self.heartbeat.on_activity(now);
            } else {
                self.stats.frames_failed += 1;
                self.heartbeat.on_send_failed();
                tracing::warn!("{:?} send failed", kind);
            }
            events.push(AgentEvent::SendCompleted { kind, success });
        }

        if link.dropped > 0 {
            tracing::warn!("inbound queue full, dropped {} frames", link.dropped);
        }

        for bytes in link.frames {
            self.stats.frames_received += 1;
            self.heartbeat.on_activity(now);
            match frame::classify(&bytes) {
                Ok(Inbound::Commands(text)) => self.accept_commands(&text),
                Ok(Inbound::File(file)) => events.push(AgentEvent::File(file)),
                Ok(Inbound::PeerLog(line)) => {
                    tracing::info!(target: "omsync::peer", "{}", line);
                }
                Err(e) => tracing::warn!("dropping frame: {}", e),
            }
        }

        if self.heartbeat.poll(now) == Beat::Probe && !self.outbound.iter().any(|f| f == HEARTBEAT)
        {
            self.outbound.push_back(HEARTBEAT.to_string());
        }
        if let Some(connected) = self.heartbeat.take_change() {
            tracing::info!(
                "{} {}",
                self.role,
                if connected { "connected" } else { "disconnected" }
            );
            events.push(AgentEvent::Connection(connected));
        }
        events
    }

    fn accept_commands(&mut self, text: &str) {
        for fragment in split_packet(text) {
            if fragment == HEARTBEAT {
                tracing::trace!("heartbeat");
                continue;
            }
            tracing::debug!("recv [{}]", fragment);
            self.inbound.push_back(fragment.to_string());
        }
    }

    /// Send one frame if anything is waiting: a queued packet or file frame
    /// first, otherwise as many command fragments as fit.
    ///
    /// Returns whether a frame was handed to the transport. A rejected send
    /// is reported as an error here and as a failed
    /// [`AgentEvent::SendCompleted`] on the next poll.
    pub fn flush(&mut self) -> Result<bool> {
        let Some((kind, frame)) = self.next_frame() else {
            return Ok(false);
        };

        if self.handle.acquire(self.config.send_timeout) == Gate::Forced {
            self.stats.forced_clears += 1;
            self.in_flight.pop_front();
            tracing::warn!(
                "previous send not completed after {:?}, sending anyway",
                self.config.send_timeout
            );
        }
        self.in_flight.push_back(kind);

        if let SendKind::Commands | SendKind::Packet = kind {
            tracing::debug!("send [{}]", String::from_utf8_lossy(&frame));
        }
        match self.transport.send(&frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                Ok(true)
            }
            Err(e) => {
                self.handle.release();
                self.in_flight.pop_back();
                self.stats.frames_failed += 1;
                self.heartbeat.on_send_failed();
                self.rejected.push(AgentEvent::SendCompleted {
                    kind,
                    success: false,
                });
                tracing::warn!("{:?} send rejected: {}", kind, e);
                Err(e)
            }
        }
    }

    fn next_frame(&mut self) -> Option<(SendKind, Bytes)> {
        if let Some(packet) = self.packets.pop_front() {
            return Some(packet);
        }
        let mut frame = self.outbound.pop_front()?;
        while let Some(next) = self.outbound.front() {
            if frame.len() + 1 + next.len() > self.config.max_packet_len {
                break;
            }
            frame.push(SEPARATOR);
            if let Some(next) = self.outbound.pop_front() {
                frame.push_str(&next);
            }
        }
        Some((SendKind::Commands, Bytes::from(frame)))
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("connected", &self.is_connected())
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .field("packets", &self.packets.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryLink;
    use std::time::Duration;

    fn config() -> AgentConfig {
        AgentConfig {
            max_packet_len: 16,
            send_timeout: Duration::from_millis(5),
            ..AgentConfig::default()
        }
    }

    fn pair(now: Instant) -> (Agent, Agent, MemoryLink) {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (link_a, link_b) = MemoryLink::pair(a.clone(), b.clone());
        let device = Agent::new(Role::Device, a, Box::new(link_a.clone()), config(), now);
        let controller = Agent::new(Role::Controller, b, Box::new(link_b), config(), now);
        (device, controller, link_a)
    }

    #[test]
    fn test_coalesces_within_limit() {
        let now = Instant::now();
        let (mut device, _controller, link) = pair(now);
        device.send_cmd("=lo1").unwrap();
        device.send_cmd("=lt500").unwrap();
        device.send_cmd("=sv12").unwrap();

        assert!(device.flush().unwrap());
        link.pump();
        assert!(device.flush().unwrap());
        link.pump();
        assert!(!device.flush().unwrap());

        let sent = link.sent();
        assert_eq!(&sent[0][..], b"=lo1;=lt500");
        assert_eq!(&sent[1][..], b"=sv12");
    }

    #[test]
    fn test_oversize_fragment_rejected() {
        let (mut device, _controller, _link) = pair(Instant::now());
        assert!(matches!(
            device.send_cmd("=lt12345678901234567890"),
            Err(SyncError::PacketTooLarge { .. })
        ));
        assert_eq!(device.pending_output(), 0);
    }

    #[test]
    fn test_receive_splits_and_skips_heartbeat() {
        let now = Instant::now();
        let (mut device, mut controller, link) = pair(now);
        device.send_cmd("=lo1").unwrap();
        device.send_cmd(HEARTBEAT).unwrap();
        device.send_cmd("=sv3").unwrap();
        device.flush().unwrap();
        link.pump();

        let events = controller.poll(now);
        assert_eq!(events, vec![AgentEvent::Connection(true)]);
        assert_eq!(controller.next_command().as_deref(), Some("=lo1"));
        assert_eq!(controller.next_command().as_deref(), Some("=sv3"));
        assert_eq!(controller.next_command(), None);

        let events = device.poll(now);
        assert!(events.contains(&AgentEvent::SendCompleted {
            kind: SendKind::Commands,
            success: true
        }));
    }

    #[test]
    fn test_packets_go_first_and_alone() {
        let (mut device, _controller, link) = pair(Instant::now());
        device.send_cmd("=lo1").unwrap();
        device.queue_packet("=a1;=b2".into()).unwrap();
        device.flush().unwrap();
        link.pump();
        assert_eq!(&link.sent()[0][..], b"=a1;=b2");
    }

    #[test]
    fn test_device_heartbeat() {
        let start = Instant::now();
        let (mut device, _controller, link) = pair(start);
        device.poll(start + Duration::from_millis(1000));
        device.poll(start + Duration::from_millis(2000));
        assert_eq!(device.pending_output(), 1);
        device.flush().unwrap();
        assert_eq!(&link.sent()[0][..], b".");
    }

    #[test]
    fn test_forced_clear_when_completion_missing() {
        let (mut device, _controller, link) = pair(Instant::now());
        device.send_cmd("=lo1").unwrap();
        device.flush().unwrap();
        device.send_cmd("=lo0").unwrap();
        device.flush().unwrap();
        assert_eq!(device.stats().forced_clears, 1);
        assert_eq!(link.sent().len(), 2);
    }

    #[test]
    fn test_controller_disconnect_event() {
        let start = Instant::now();
        let (mut device, mut controller, link) = pair(start);
        device.send_cmd(".").unwrap();
        device.flush().unwrap();
        link.pump();
        assert_eq!(controller.poll(start), vec![AgentEvent::Connection(true)]);

        let late = start + Duration::from_millis(2000);
        assert_eq!(controller.poll(late), vec![AgentEvent::Connection(false)]);
    }
}
