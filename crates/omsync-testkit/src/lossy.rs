//! A transport that loses frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use omsync_sync::{LinkHandle, Result, Transport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Wraps a transport and drops a share of the frames handed to it.
///
/// A dropped frame never reaches the inner transport; the sender is told
/// the send failed, the way a radio reports a missing link-layer ack.
pub struct LossyLink<T> {
    inner: T,
    sender: LinkHandle,
    loss: f64,
    rng: Mutex<StdRng>,
    dropped: AtomicU64,
}

impl<T: Transport> LossyLink<T> {
    /// `sender` is the handle of the side that sends through this link.
    /// `loss` is clamped into `0.0..=1.0`.
    pub fn new(inner: T, sender: LinkHandle, loss: f64, seed: u64) -> Self {
        Self {
            inner,
            sender,
            loss: loss.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Transport> Transport for LossyLink<T> {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let lose = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.loss);
        if lose {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            self.sender.on_send_complete(false);
            return Ok(());
        }
        self.inner.send(frame)
    }
}
