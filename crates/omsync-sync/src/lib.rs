//! # omsync Sync
//!
//! Everything between the object tree and the radio link: the delivery
//! agent, change-driven sync and the chunked file transfer.
//!
//! ## Overview
//!
//! The link is slow, lossy and carries frames of a couple of hundred bytes.
//! Both peers run the same loop, once per tick:
//!
//! 1. [`Agent::poll`] collects send completions and received frames from the
//!    [`LinkHandle`] the link driver reports to, and advances the heartbeat.
//! 2. If a received command is waiting, exactly one is serviced.
//! 3. Otherwise [`ChangeSync`] turns dirty properties into packets,
//!    [`FileTransfer`] contributes its next frame, and [`Agent::flush`]
//!    sends one frame.
//!
//! ## Key Types
//!
//! - [`Transport`] - The send half of a link driver
//! - [`LinkHandle`] - Target of the driver's completion and receive callbacks
//! - [`Agent`] - Command queues, send gate and heartbeat
//! - [`ChangeSync`] - Dirty-property scan and batching
//! - [`FileTransfer`] - The file-transfer state machine
//! - [`FileFrame`] - Binary file-transfer frames
//!
//! ## Delivery
//!
//! Delivery is best effort. Only one frame is meant to be in flight, but a
//! send that never completes is given up on after `send_timeout` and the
//! next frame goes out anyway. Lost commands are not resent; a controller
//! that reconnects asks for a full snapshot instead.

pub mod agent;
pub mod change_sync;
pub mod config;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod link;
pub mod transfer;
pub mod transport;

pub use agent::{Agent, AgentEvent, AgentStats, SendKind};
pub use change_sync::{Batcher, ChangeSync};
pub use config::{AgentConfig, ChangeSyncConfig, TransferConfig};
pub use error::{Result, SyncError};
pub use frame::{FileFrame, Inbound};
pub use heartbeat::{Beat, Heartbeat};
pub use link::{Gate, LinkEvents, LinkHandle};
pub use transfer::{FileTransfer, TransferEvent, TransferState};
pub use transport::{memory::MemoryLink, Transport};
