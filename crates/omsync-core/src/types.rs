//! Small shared types: peer roles, direction flags and node ids.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::{HEARTBEAT, SEPARATOR};

/// Which end of the link this tree lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The remote device that owns the effectors.
    Device,
    /// The controller that mirrors and drives the device.
    Controller,
}

impl Role {
    pub fn is_device(self) -> bool {
        matches!(self, Role::Device)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Device => f.write_str("device"),
            Role::Controller => f.write_str("controller"),
        }
    }
}

/// Direction restrictions for a property.
///
/// "Device" in the flag names is relative to the device role: a
/// `read_only_device` property is produced by the device and only read by
/// the controller, a `write_only_device` property is written by the
/// controller and never reported back by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFlags {
    /// Never transmitted to the peer.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub read_only_device: bool,
    #[serde(default)]
    pub write_only_device: bool,
}

impl PropertyFlags {
    pub const NONE: Self = Self {
        local: false,
        read_only_device: false,
        write_only_device: false,
    };

    /// Whether a dirty value may be sent to the peer from `role`.
    pub fn transmits(&self, role: Role) -> bool {
        if self.local {
            return false;
        }
        match role {
            Role::Device => !self.write_only_device,
            Role::Controller => !self.read_only_device,
        }
    }

    /// Whether a local change is pushed to the effector in `role`.
    pub fn pushes(&self, role: Role) -> bool {
        !(role.is_device() && self.read_only_device)
    }

    /// Whether the value may be refreshed from the effector in `role`.
    pub fn pulls(&self, role: Role) -> bool {
        !(role.is_device() && self.write_only_device)
    }

    /// Whether the value participates in save/load of preferences.
    pub fn persists(&self, role: Role) -> bool {
        !(role.is_device() && (self.read_only_device || self.write_only_device))
    }
}

/// Check that `id` can be used as a node id on the wire.
///
/// Ids are printable ASCII and must not collide with packet framing.
pub fn validate_id(id: char) -> Result<(), String> {
    if !id.is_ascii_graphic() {
        return Err(format!("id {:?} is not printable ASCII", id));
    }
    if id == SEPARATOR || HEARTBEAT.starts_with(id) {
        return Err(format!("id '{}' is reserved", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_default_transmit_both_ways() {
        let flags = PropertyFlags::default();
        assert!(flags.transmits(Role::Device));
        assert!(flags.transmits(Role::Controller));
    }

    #[test]
    fn test_local_never_transmits() {
        let flags = PropertyFlags {
            local: true,
            ..PropertyFlags::NONE
        };
        assert!(!flags.transmits(Role::Device));
        assert!(!flags.transmits(Role::Controller));
    }

    #[test]
    fn test_direction_flags() {
        let ro = PropertyFlags {
            read_only_device: true,
            ..PropertyFlags::NONE
        };
        assert!(ro.transmits(Role::Device));
        assert!(!ro.transmits(Role::Controller));
        assert!(!ro.pushes(Role::Device));
        assert!(!ro.persists(Role::Device));

        let wo = PropertyFlags {
            write_only_device: true,
            ..PropertyFlags::NONE
        };
        assert!(!wo.transmits(Role::Device));
        assert!(wo.transmits(Role::Controller));
        assert!(!wo.pulls(Role::Device));
        assert!(wo.pulls(Role::Controller));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id('a').is_ok());
        assert!(validate_id('0').is_ok());
        assert!(validate_id(';').is_err());
        assert!(validate_id('.').is_err());
        assert!(validate_id(' ').is_err());
        assert!(validate_id('é').is_err());
    }
}
