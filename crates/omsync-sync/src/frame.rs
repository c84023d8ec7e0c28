//! Frame classification and the binary file-transfer codec.
//!
//! Everything on the link is a frame of at most `max_packet_len` bytes.
//! The first byte says what kind:
//!
//! ```text
//! '1'..'4'   file transfer frame (binary)
//! '['        log line forwarded by the peer
//! otherwise  ';'-joined command fragments (ASCII)
//! ```
//!
//! File frames start with an 8 byte header: the tag, three zero bytes, and
//! a little-endian `u32` whose meaning depends on the tag.
//!
//! | tag | u32 | payload |
//! |-----|-----|---------|
//! | `1` start | chunk count | file name, NUL |
//! | `2` data | sequence (from 1) | chunk bytes |
//! | `3` ack | acked sequence (0 for start) | none |
//! | `4` terminate | 0 | none |
//!
//! A bare one-byte `3` acks whatever is in flight and a bare `4`
//! terminates.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, SyncError};

pub const TAG_START: u8 = b'1';
pub const TAG_DATA: u8 = b'2';
pub const TAG_ACK: u8 = b'3';
pub const TAG_TERMINATE: u8 = b'4';

/// Marks a log line forwarded by the peer.
pub const LOG_PREFIX: u8 = b'[';

/// Size of the file frame header.
pub const HEADER_LEN: usize = 8;

/// A decoded file-transfer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFrame {
    Start { total: u32, name: String },
    Data { seq: u32, chunk: Bytes },
    /// `None` for the bare one-byte form.
    Ack { seq: Option<u32> },
    Terminate,
}

impl FileFrame {
    pub fn tag(&self) -> u8 {
        match self {
            FileFrame::Start { .. } => TAG_START,
            FileFrame::Data { .. } => TAG_DATA,
            FileFrame::Ack { .. } => TAG_ACK,
            FileFrame::Terminate => TAG_TERMINATE,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            FileFrame::Start { total, name } => {
                let mut buf = header(TAG_START, *total, name.len() + 1);
                buf.put_slice(name.as_bytes());
                buf.put_u8(0);
                buf.freeze()
            }
            FileFrame::Data { seq, chunk } => {
                let mut buf = header(TAG_DATA, *seq, chunk.len());
                buf.put_slice(chunk);
                buf.freeze()
            }
            FileFrame::Ack { seq: Some(seq) } => header(TAG_ACK, *seq, 0).freeze(),
            FileFrame::Ack { seq: None } => Bytes::from_static(&[TAG_ACK]),
            FileFrame::Terminate => header(TAG_TERMINATE, 0, 0).freeze(),
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (&tag, _) = frame
            .split_first()
            .ok_or_else(|| SyncError::MalformedFrame("empty frame".into()))?;

        if frame.len() == 1 {
            return match tag {
                TAG_ACK => Ok(FileFrame::Ack { seq: None }),
                TAG_TERMINATE => Ok(FileFrame::Terminate),
                _ => Err(SyncError::MalformedFrame(format!(
                    "tag '{}' needs a header",
                    tag as char
                ))),
            };
        }
        if frame.len() < HEADER_LEN {
            return Err(SyncError::MalformedFrame(format!(
                "short frame of {} bytes",
                frame.len()
            )));
        }

        let mut buf = &frame[4..];
        let value = buf.get_u32_le();
        let payload = &frame[HEADER_LEN..];

        match tag {
            TAG_START => {
                let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
                let name = std::str::from_utf8(&payload[..end])
                    .map_err(|_| SyncError::MalformedFrame("file name is not UTF-8".into()))?;
                Ok(FileFrame::Start {
                    total: value,
                    name: name.to_string(),
                })
            }
            TAG_DATA => Ok(FileFrame::Data {
                seq: value,
                chunk: Bytes::copy_from_slice(payload),
            }),
            TAG_ACK => Ok(FileFrame::Ack { seq: Some(value) }),
            TAG_TERMINATE => Ok(FileFrame::Terminate),
            _ => Err(SyncError::MalformedFrame(format!(
                "unknown tag 0x{:02x}",
                tag
            ))),
        }
    }
}

fn header(tag: u8, value: u32, payload: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload);
    buf.put_u8(tag);
    buf.put_bytes(0, 3);
    buf.put_u32_le(value);
    buf
}

/// A received frame, sorted by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Command text, possibly several fragments.
    Commands(String),
    File(FileFrame),
    PeerLog(String),
}

pub fn is_file_frame(frame: &[u8]) -> bool {
    matches!(frame.first().copied(), Some(TAG_START..=TAG_TERMINATE))
}

/// Sort a received frame by its first byte.
pub fn classify(frame: &[u8]) -> Result<Inbound> {
    if is_file_frame(frame) {
        return FileFrame::decode(frame).map(Inbound::File);
    }
    let text = std::str::from_utf8(frame)
        .map_err(|_| SyncError::MalformedFrame(format!("non-text frame {}", dump(frame))))?
        .trim_end_matches('\0');
    if frame.first() == Some(&LOG_PREFIX) {
        Ok(Inbound::PeerLog(text.to_string()))
    } else {
        Ok(Inbound::Commands(text.to_string()))
    }
}

/// Short hex rendering of a frame for logs.
pub fn dump(frame: &[u8]) -> String {
    const MAX: usize = 16;
    if frame.len() > MAX {
        format!("{}.. ({} bytes)", hex::encode(&frame[..MAX]), frame.len())
    } else {
        hex::encode(frame)
    }
}
