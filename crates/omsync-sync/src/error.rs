//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur on the link, in the agent or during a transfer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport refused or failed a send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A packet would exceed the link's maximum length.
    #[error("packet of {len} bytes exceeds limit of {max}")]
    PacketTooLarge { len: usize, max: usize },

    /// A file-transfer frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A data frame or ack carried the wrong sequence number.
    #[error("sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u32, got: u32 },

    /// The file name does not fit in a start frame.
    #[error("file name too long ({len} > {max}): {name}")]
    FileNameTooLong { name: String, len: usize, max: usize },

    /// The file name is not a plain file name.
    #[error("invalid file name: [{0}]")]
    InvalidFileName(String),

    /// A transfer is already in progress.
    #[error("file transfer already in progress")]
    TransferBusy,

    /// The file is too large to count its chunks in a frame header.
    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    /// A frame kept failing to send.
    #[error("giving up after {retries} retries at sequence {seq}")]
    RetriesExhausted { seq: u32, retries: u32 },

    /// The peer went quiet in the middle of a transfer.
    #[error("no reply from peer within {timeout_ms} ms at sequence {seq}")]
    TimedOut { seq: u32, timeout_ms: u64 },

    /// A start frame from the peer replaced our outgoing transfer.
    #[error("outgoing transfer of {0} replaced by incoming one")]
    Preempted(String),

    /// The peer ended the transfer.
    #[error("transfer terminated by peer")]
    Terminated,

    /// I/O error reading or writing a transferred file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
