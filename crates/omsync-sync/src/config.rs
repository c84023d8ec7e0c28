//! Tunables for the agent, change sync and file transfer.
//!
//! Durations are written as whole milliseconds when serialized.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delivery layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Longest frame handed to the transport.
    pub max_packet_len: usize,
    /// How long a new send waits for the previous one to complete before
    /// clearing the outstanding flag anyway.
    #[serde(with = "millis")]
    pub send_timeout: Duration,
    /// Interval between device heartbeats.
    #[serde(with = "millis")]
    pub heartbeat_period: Duration,
    /// Extra silence a controller tolerates before declaring the device
    /// gone.
    #[serde(with = "millis")]
    pub controller_grace: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_packet_len: 250,
            send_timeout: Duration::from_millis(100),
            heartbeat_period: Duration::from_millis(1000),
            controller_grace: Duration::from_millis(1000),
        }
    }
}

/// Change-sync batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSyncConfig {
    /// Largest packet of `;`-joined assignments.
    pub batch_limit: usize,
}

impl Default for ChangeSyncConfig {
    fn default() -> Self {
        Self { batch_limit: 200 }
    }
}

/// File transfer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Payload bytes per data frame.
    pub chunk_size: usize,
    /// Resends of one frame before the transfer is abandoned.
    pub max_retries: u32,
    /// Longest accepted file name.
    pub max_name_len: usize,
    /// Where received files are written.
    pub inbox_dir: PathBuf,
    /// Tell the peer when retries run out.
    pub terminate_on_retry_exhausted: bool,
    /// How long either side waits for the peer's next frame before giving
    /// up on the transfer.
    #[serde(with = "millis")]
    pub ack_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 240,
            max_retries: 2,
            max_name_len: 31,
            inbox_dir: PathBuf::from("."),
            terminate_on_retry_exhausted: true,
            ack_timeout: Duration::from_millis(5000),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
