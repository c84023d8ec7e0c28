//! The shared state between the main loop and the link driver.
//!
//! A link driver reports back through two callbacks that may run on
//! another thread: send completion and frame reception. [`LinkHandle`] is
//! the cheap, cloneable target of those callbacks. Each callback holds the
//! lock only long enough to record what happened; the agent collects the
//! results on its next tick.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

/// Received frames held before the main loop collects them. Older frames
/// are kept and new ones dropped once full.
pub const INBOUND_CAPACITY: usize = 64;

/// Callback target for a link driver.
#[derive(Clone, Default)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<LinkState>,
    send_done: Condvar,
}

#[derive(Default)]
struct LinkState {
    outstanding: bool,
    completions: VecDeque<bool>,
    inbound: VecDeque<Bytes>,
    dropped: usize,
}

/// How the send gate was passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Nothing was in flight, or it completed in time.
    Clear,
    /// The previous send never completed; its flag was cleared anyway.
    Forced,
}

/// Everything the callbacks recorded since the last drain.
#[derive(Debug, Default)]
pub struct LinkEvents {
    /// Send results, oldest first.
    pub completions: Vec<bool>,
    pub frames: Vec<Bytes>,
    /// Frames dropped because the queue was full.
    pub dropped: usize,
}

impl LinkEvents {
    /// Any reception or successful send.
    pub fn has_activity(&self) -> bool {
        !self.frames.is_empty() || self.completions.iter().any(|ok| *ok)
    }
}

impl LinkHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Send-status callback.
    pub fn on_send_complete(&self, success: bool) {
        let mut state = self.lock();
        state.outstanding = false;
        state.completions.push_back(success);
        drop(state);
        self.shared.send_done.notify_all();
    }

    /// Receive callback.
    pub fn on_receive(&self, frame: &[u8]) {
        let mut state = self.lock();
        if state.inbound.len() >= INBOUND_CAPACITY {
            state.dropped += 1;
            return;
        }
        state.inbound.push_back(Bytes::copy_from_slice(frame));
    }

    pub fn is_outstanding(&self) -> bool {
        self.lock().outstanding
    }

    /// Wait for the previous send to complete, then mark a new one
    /// outstanding.
    ///
    /// Waits at most `timeout`. If the previous send is still outstanding
    /// after that, its flag is cleared and the caller proceeds anyway, so
    /// two frames may briefly be in flight.
    pub fn acquire(&self, timeout: Duration) -> Gate {
        let state = self.lock();
        let (mut state, waited) = self
            .shared
            .send_done
            .wait_timeout_while(state, timeout, |s| s.outstanding)
            .unwrap_or_else(PoisonError::into_inner);
        let gate = if waited.timed_out() && state.outstanding {
            Gate::Forced
        } else {
            Gate::Clear
        };
        state.outstanding = true;
        gate
    }

    /// Clear the outstanding flag for a send the transport rejected
    /// outright. No completion will arrive for it.
    pub fn release(&self) {
        self.lock().outstanding = false;
        self.shared.send_done.notify_all();
    }

    /// Take everything recorded since the last call.
    pub fn drain(&self) -> LinkEvents {
        let mut state = self.lock();
        LinkEvents {
            completions: state.completions.drain(..).collect(),
            frames: state.inbound.drain(..).collect(),
            dropped: std::mem::take(&mut state.dropped),
        }
    }
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LinkHandle")
            .field("outstanding", &state.outstanding)
            .field("completions", &state.completions.len())
            .field("inbound", &state.inbound.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_acquire_when_idle() {
        let handle = LinkHandle::new();
        assert_eq!(handle.acquire(Duration::from_millis(10)), Gate::Clear);
        assert!(handle.is_outstanding());
    }

    #[test]
    fn test_acquire_forces_after_timeout() {
        let handle = LinkHandle::new();
        handle.acquire(Duration::ZERO);
        let start = Instant::now();
        assert_eq!(handle.acquire(Duration::from_millis(20)), Gate::Forced);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(handle.is_outstanding());
    }

    #[test]
    fn test_completion_records_result() {
        let handle = LinkHandle::new();
        handle.acquire(Duration::ZERO);
        handle.on_send_complete(false);
        assert!(!handle.is_outstanding());

        let events = handle.drain();
        assert_eq!(events.completions, vec![false]);
        assert!(!events.has_activity());
        assert!(handle.drain().completions.is_empty());
    }

    #[test]
    fn test_inbound_capacity() {
        let handle = LinkHandle::new();
        for _ in 0..INBOUND_CAPACITY + 3 {
            handle.on_receive(b"=lo1");
        }
        let events = handle.drain();
        assert_eq!(events.frames.len(), INBOUND_CAPACITY);
        assert_eq!(events.dropped, 3);
        assert!(events.has_activity());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_completion_from_another_task_releases_wait() {
        let handle = LinkHandle::new();
        handle.acquire(Duration::ZERO);

        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            remote.on_send_complete(true);
        });

        let waiter = handle.clone();
        let gate = tokio::task::spawn_blocking(move || waiter.acquire(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(gate, Gate::Clear);
        assert_eq!(handle.drain().completions, vec![true]);
    }
}
