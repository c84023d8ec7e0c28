//! Connection liveness.
//!
//! The device sends a heartbeat whenever it has been quiet for one period.
//! The controller expects to hear something at least that often and gives
//! the device a grace interval on top before declaring it gone. Any frame
//! received and any successful send count as proof of life on both sides.

use std::time::{Duration, Instant};

use omsync_core::Role;

use crate::config::AgentConfig;

/// What the timer asks of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Quiet,
    /// Send a heartbeat fragment.
    Probe,
}

#[derive(Debug)]
pub struct Heartbeat {
    role: Role,
    timeout: Duration,
    last: Instant,
    connected: bool,
    change: Option<bool>,
}

impl Heartbeat {
    pub fn new(role: Role, config: &AgentConfig, now: Instant) -> Self {
        let timeout = match role {
            Role::Device => config.heartbeat_period,
            Role::Controller => config.heartbeat_period + config.controller_grace,
        };
        Self {
            role,
            timeout,
            last: now,
            connected: false,
            change: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// A frame arrived or a send succeeded.
    pub fn on_activity(&mut self, now: Instant) {
        self.last = now;
        self.set_connected(true);
    }

    /// A send failed. The device takes this as losing the controller; the
    /// controller waits for its timer instead.
    pub fn on_send_failed(&mut self) {
        if self.role.is_device() {
            self.set_connected(false);
        }
    }

    /// Advance the timer.
    pub fn poll(&mut self, now: Instant) -> Beat {
        if now.saturating_duration_since(self.last) < self.timeout {
            return Beat::Quiet;
        }
        self.last = now;
        match self.role {
            Role::Device => Beat::Probe,
            Role::Controller => {
                self.set_connected(false);
                Beat::Quiet
            }
        }
    }

    /// The connection state if it changed since the last call.
    pub fn take_change(&mut self) -> Option<bool> {
        self.change.take()
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.change = Some(connected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AgentConfig {
        AgentConfig {
            heartbeat_period: Duration::from_millis(100),
            controller_grace: Duration::from_millis(50),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_device_probes_when_quiet() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Role::Device, &config(), start);
        assert_eq!(hb.poll(start + Duration::from_millis(99)), Beat::Quiet);
        assert_eq!(hb.poll(start + Duration::from_millis(100)), Beat::Probe);
        assert_eq!(hb.poll(start + Duration::from_millis(150)), Beat::Quiet);
    }

    #[test]
    fn test_activity_restarts_timer() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Role::Device, &config(), start);
        hb.on_activity(start + Duration::from_millis(80));
        assert_eq!(hb.poll(start + Duration::from_millis(150)), Beat::Quiet);
        assert_eq!(hb.take_change(), Some(true));
        assert_eq!(hb.take_change(), None);
    }

    #[test]
    fn test_controller_times_out_after_grace() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Role::Controller, &config(), start);
        hb.on_activity(start);
        assert_eq!(hb.take_change(), Some(true));

        assert_eq!(hb.poll(start + Duration::from_millis(149)), Beat::Quiet);
        assert!(hb.is_connected());
        assert_eq!(hb.poll(start + Duration::from_millis(150)), Beat::Quiet);
        assert!(!hb.is_connected());
        assert_eq!(hb.take_change(), Some(false));
    }

    #[test]
    fn test_device_disconnects_on_failed_send() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Role::Device, &config(), start);
        hb.on_activity(start);
        hb.take_change();
        hb.on_send_failed();
        assert_eq!(hb.take_change(), Some(false));

        let mut controller = Heartbeat::new(Role::Controller, &config(), start);
        controller.on_activity(start);
        controller.on_send_failed();
        assert!(controller.is_connected());
    }
}
