//! Chunked file transfer over the command link.
//!
//! One transfer at a time, in either direction. The sender announces the
//! file with a start frame, then sends data frames numbered from 1, each
//! only after the previous frame was acked. The receiver checks every
//! sequence number and gives up on the first gap.
//!
//! ```text
//! sender                     receiver
//!   |-- '1' total, name -------->|  truncate destination
//!   |<------------- '3' 0 -------|
//!   |-- '2' 1, chunk ----------->|  append
//!   |<------------- '3' 1 -------|
//!   |   ...                      |
//!   |-- '2' total, last chunk -->|  append, finalize
//!   |<------------- '3' total ---|
//! ```
//!
//! A failed send of any frame is retried up to `max_retries` times before
//! the transfer is abandoned. Either side may send `'4'` to end it, and
//! either side gives up when the peer stays silent for `ack_timeout`.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;

use crate::config::TransferConfig;
use crate::error::{Result, SyncError};
use crate::frame::FileFrame;

/// Where the state machine stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Sending {
        /// Sequence in flight; 0 is the start frame.
        seq: u32,
        total: u32,
        source: PathBuf,
    },
    Receiving {
        expected: u32,
        total: u32,
        destination: PathBuf,
    },
}

/// Outcome of a finished transfer.
#[derive(Debug)]
pub enum TransferEvent {
    Sent { name: String, chunks: u32 },
    Received { path: PathBuf, chunks: u32 },
    Failed(SyncError),
}

enum Active {
    Idle,
    Sending {
        seq: u32,
        total: u32,
        name: String,
        source: PathBuf,
        file: File,
    },
    Receiving {
        expected: u32,
        total: u32,
        destination: PathBuf,
        file: File,
    },
}

pub struct FileTransfer {
    config: TransferConfig,
    active: Active,
    outgoing: VecDeque<Bytes>,
    /// Last frame handed out, kept for resending.
    last_frame: Option<Bytes>,
    retries: u32,
    /// Set whenever the transfer moves; restarts the silence deadline.
    progressed: bool,
    deadline: Option<Instant>,
}

impl FileTransfer {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            active: Active::Idle,
            outgoing: VecDeque::new(),
            last_frame: None,
            retries: 0,
            progressed: false,
            deadline: None,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        match &self.active {
            Active::Idle => TransferState::Idle,
            Active::Sending {
                seq, total, source, ..
            } => TransferState::Sending {
                seq: *seq,
                total: *total,
                source: source.clone(),
            },
            Active::Receiving {
                expected,
                total,
                destination,
                ..
            } => TransferState::Receiving {
                expected: *expected,
                total: *total,
                destination: destination.clone(),
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.active, Active::Idle)
    }

    /// Start sending `source` to the peer, who stores it as `name`.
    pub fn start_send(&mut self, source: &Path, name: &str) -> Result<()> {
        if !self.is_idle() {
            return Err(SyncError::TransferBusy);
        }
        self.check_name(name)?;

        let file = File::open(source)?;
        let size = file.metadata()?.len();
        let chunk = self.config.chunk_size.max(1) as u64;
        let total = u32::try_from(size.div_ceil(chunk)).map_err(|_| SyncError::FileTooLarge(size))?;

        tracing::info!(
            "sending {} as {} ({} bytes, {} chunks)",
            source.display(),
            name,
            size,
            total
        );
        self.reset_frames();
        self.active = Active::Sending {
            seq: 0,
            total,
            name: name.to_string(),
            source: source.to_path_buf(),
            file,
        };
        self.emit(FileFrame::Start {
            total,
            name: name.to_string(),
        });
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.len() > self.config.max_name_len {
            return Err(SyncError::FileNameTooLong {
                name: name.to_string(),
                len: name.len(),
                max: self.config.max_name_len,
            });
        }
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|f| f == std::ffi::OsStr::new(name));
        if name.is_empty() || !plain || name.contains('\0') {
            return Err(SyncError::InvalidFileName(name.to_string()));
        }
        Ok(())
    }

    /// The next frame to send, if any.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        let frame = self.outgoing.pop_front()?;
        self.last_frame = Some(frame.clone());
        Some(frame)
    }

    /// Abandon whatever is in progress and tell the peer.
    pub fn cancel(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        tracing::info!("file transfer cancelled");
        self.abort(true);
        true
    }

    /// Result of sending the last frame handed out.
    pub fn on_send_result(&mut self, success: bool) -> Option<TransferEvent> {
        if success {
            self.retries = 0;
            return None;
        }
        if self.is_idle() {
            return None;
        }
        let frame = self.last_frame.clone()?;
        self.retries += 1;
        if self.retries > self.config.max_retries {
            let error = SyncError::RetriesExhausted {
                seq: self.current_seq(),
                retries: self.config.max_retries,
            };
            tracing::error!("file transfer failed: {}", error);
            self.abort(self.config.terminate_on_retry_exhausted);
            return Some(TransferEvent::Failed(error));
        }
        tracing::warn!(
            "resending file frame (retry {} of {})",
            self.retries,
            self.config.max_retries
        );
        self.outgoing.push_front(frame);
        None
    }

    fn current_seq(&self) -> u32 {
        match &self.active {
            Active::Sending { seq, .. } => *seq,
            Active::Receiving { expected, .. } => expected.saturating_sub(1),
            Active::Idle => 0,
        }
    }

    /// Abandon a transfer once the peer has been silent for `ack_timeout`.
    ///
    /// The deadline restarts on every step forward, so only a stalled
    /// transfer times out.
    pub fn poll(&mut self, now: Instant) -> Option<TransferEvent> {
        if self.is_idle() {
            self.deadline = None;
            self.progressed = false;
            return None;
        }
        let deadline = match self.deadline {
            Some(deadline) if !self.progressed => deadline,
            _ => {
                self.progressed = false;
                self.deadline = Some(now + self.config.ack_timeout);
                return None;
            }
        };
        if now < deadline {
            return None;
        }
        let error = SyncError::TimedOut {
            seq: self.current_seq(),
            timeout_ms: self.config.ack_timeout.as_millis() as u64,
        };
        tracing::error!("file transfer failed: {}", error);
        self.abort(true);
        Some(TransferEvent::Failed(error))
    }

    /// Handle a frame from the peer.
    ///
    /// Usually yields at most one event. A start frame that interrupts our
    /// own outgoing transfer reports that failure first.
    pub fn handle_frame(&mut self, frame: FileFrame) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        let result = match frame {
            FileFrame::Start { total, name } => {
                if let Some(preempted) = self.preempt() {
                    events.push(TransferEvent::Failed(preempted));
                }
                self.on_start(total, &name)
            }
            FileFrame::Data { seq, chunk } => self.on_data(seq, &chunk),
            FileFrame::Ack { seq } => self.on_ack(seq),
            FileFrame::Terminate => {
                if !self.is_idle() {
                    tracing::info!("file transfer terminated by peer");
                    self.abort(false);
                    events.push(TransferEvent::Failed(SyncError::Terminated));
                }
                return events;
            }
        };
        match result {
            Ok(event) => events.extend(event),
            Err(e) => {
                tracing::error!("file transfer failed: {}", e);
                self.abort(true);
                events.push(TransferEvent::Failed(e));
            }
        }
        events
    }

    /// Drop whatever is in progress to make way for an incoming start
    /// frame. Returns the error to report if we were sending.
    fn preempt(&mut self) -> Option<SyncError> {
        let preempted = match &self.active {
            Active::Idle => return None,
            Active::Sending { name, .. } => Some(SyncError::Preempted(name.clone())),
            Active::Receiving { .. } => None,
        };
        tracing::warn!("start frame while busy, restarting as receiver");
        self.abort(false);
        preempted
    }

    fn on_start(&mut self, total: u32, name: &str) -> Result<Option<TransferEvent>> {
        self.check_name(name)?;

        let destination = self.config.inbox_dir.join(name);
        if destination.exists() {
            fs::remove_file(&destination)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&destination)?;
        tracing::info!("receiving {} ({} chunks)", destination.display(), total);

        self.reset_frames();
        self.emit(FileFrame::Ack { seq: Some(0) });
        self.active = Active::Receiving {
            expected: 1,
            total,
            destination,
            file,
        };
        if total == 0 {
            return self.finish_receive().map(Some);
        }
        Ok(None)
    }

    fn on_data(&mut self, seq: u32, chunk: &[u8]) -> Result<Option<TransferEvent>> {
        let Active::Receiving {
            expected,
            total,
            file,
            ..
        } = &mut self.active
        else {
            tracing::warn!("data frame {} with no transfer in progress", seq);
            return Ok(None);
        };
        if seq != *expected {
            return Err(SyncError::SequenceMismatch {
                expected: *expected,
                got: seq,
            });
        }
        file.write_all(chunk)?;
        *expected += 1;
        let done = seq == *total;
        tracing::trace!("chunk {}/{} ({} bytes)", seq, total, chunk.len());

        self.emit(FileFrame::Ack { seq: Some(seq) });
        if done {
            return self.finish_receive().map(Some);
        }
        Ok(None)
    }

    fn finish_receive(&mut self) -> Result<TransferEvent> {
        let Active::Receiving {
            mut file,
            destination,
            total,
            ..
        } = std::mem::replace(&mut self.active, Active::Idle)
        else {
            return Err(SyncError::Terminated);
        };
        file.flush()?;
        file.sync_all()?;
        tracing::info!("received {}", destination.display());
        Ok(TransferEvent::Received {
            path: destination,
            chunks: total,
        })
    }

    fn on_ack(&mut self, acked: Option<u32>) -> Result<Option<TransferEvent>> {
        let chunk_size = self.config.chunk_size.max(1);
        let Active::Sending {
            seq,
            total,
            file,
            name,
            ..
        } = &mut self.active
        else {
            tracing::debug!("ack with no transfer in progress");
            return Ok(None);
        };
        let acked = acked.unwrap_or(*seq);
        if acked != *seq {
            return Err(SyncError::SequenceMismatch {
                expected: *seq,
                got: acked,
            });
        }
        if *seq == *total {
            let event = TransferEvent::Sent {
                name: std::mem::take(name),
                chunks: *total,
            };
            tracing::info!("file transfer complete");
            self.active = Active::Idle;
            self.reset_frames();
            return Ok(Some(event));
        }

        *seq += 1;
        let next = *seq;
        let mut chunk = Vec::with_capacity(chunk_size);
        Read::by_ref(file)
            .take(chunk_size as u64)
            .read_to_end(&mut chunk)?;
        self.emit(FileFrame::Data {
            seq: next,
            chunk: Bytes::from(chunk),
        });
        Ok(None)
    }

    fn emit(&mut self, frame: FileFrame) {
        self.progressed = true;
        self.outgoing.push_back(frame.encode());
    }

    fn reset_frames(&mut self) {
        self.outgoing.clear();
        self.last_frame = None;
        self.retries = 0;
    }

    /// Drop the transfer, removing a partial download.
    fn abort(&mut self, notify_peer: bool) {
        let previous = std::mem::replace(&mut self.active, Active::Idle);
        self.reset_frames();
        if let Active::Receiving { destination, file, .. } = previous {
            drop(file);
            if let Err(e) = fs::remove_file(&destination) {
                tracing::debug!("could not remove {}: {}", destination.display(), e);
            }
        }
        if notify_peer {
            self.emit(FileFrame::Terminate);
        }
    }
}

impl std::fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTransfer")
            .field("state", &self.state())
            .field("outgoing", &self.outgoing.len())
            .field("retries", &self.retries)
            .finish()
    }
}
