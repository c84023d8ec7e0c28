//! Transport abstraction for the radio link.
//!
//! A transport accepts one frame at a time and reports the outcome later
//! through [`LinkHandle::on_send_complete`]. Frames from the peer arrive
//! through [`LinkHandle::on_receive`]. Both callbacks may fire from inside
//! `send` or from another thread.

use crate::error::Result;

/// The send half of a link driver.
pub trait Transport: Send + Sync {
    /// Hand `frame` to the link.
    ///
    /// `Ok` means the frame was accepted and a completion will follow. An
    /// error means it was rejected and no completion will follow.
    fn send(&self, frame: &[u8]) -> Result<()>;
}

/// An in-memory link joining two handles back to back.
///
/// Frames wait on the wire until [`MemoryLink::pump`] delivers them, which
/// makes the order of events fully deterministic. With auto delivery on,
/// `send` delivers and completes before returning.
pub mod memory {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    use bytes::Bytes;

    use super::Transport;
    use crate::error::{Result, SyncError};
    use crate::frame;
    use crate::link::LinkHandle;

    struct Wire {
        ends: [LinkHandle; 2],
        in_flight: VecDeque<(usize, Bytes)>,
        sent: [Vec<Bytes>; 2],
        up: bool,
        fail_next: usize,
        auto_deliver: bool,
    }

    /// One end of an in-memory link.
    #[derive(Clone)]
    pub struct MemoryLink {
        wire: Arc<Mutex<Wire>>,
        side: usize,
    }

    /// A frame's fate on the wire.
    enum Delivery {
        Delivered { to: LinkHandle, from: LinkHandle, frame: Bytes },
        Lost { from: LinkHandle },
    }

    impl MemoryLink {
        /// Join `a` and `b`. Returns the transport for each side.
        pub fn pair(a: LinkHandle, b: LinkHandle) -> (MemoryLink, MemoryLink) {
            let wire = Arc::new(Mutex::new(Wire {
                ends: [a, b],
                in_flight: VecDeque::new(),
                sent: [Vec::new(), Vec::new()],
                up: true,
                fail_next: 0,
                auto_deliver: false,
            }));
            (
                MemoryLink {
                    wire: Arc::clone(&wire),
                    side: 0,
                },
                MemoryLink { wire, side: 1 },
            )
        }

        fn wire(&self) -> MutexGuard<'_, Wire> {
            self.wire.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Deliver every frame currently on the wire, in both directions.
        /// Returns how many frames were delivered.
        pub fn pump(&self) -> usize {
            let deliveries: Vec<Delivery> = {
                let mut wire = self.wire();
                let pending: Vec<_> = wire.in_flight.drain(..).collect();
                pending
                    .into_iter()
                    .map(|(from, frame)| wire.route(from, frame))
                    .collect()
            };
            deliveries
                .into_iter()
                .map(Delivery::complete)
                .filter(|delivered| *delivered)
                .count()
        }

        /// Take the link down (frames are lost) or bring it back up.
        pub fn set_up(&self, up: bool) {
            self.wire().up = up;
        }

        /// Lose the next `n` frames in either direction.
        pub fn fail_next(&self, n: usize) {
            self.wire().fail_next = n;
        }

        /// Deliver and complete inside `send`.
        pub fn set_auto_deliver(&self, auto: bool) {
            self.wire().auto_deliver = auto;
        }

        /// Every frame this side has sent, lost ones included.
        pub fn sent(&self) -> Vec<Bytes> {
            self.wire().sent[self.side].clone()
        }

        /// Take and clear this side's sent history.
        pub fn take_sent(&self) -> Vec<Bytes> {
            std::mem::take(&mut self.wire().sent[self.side])
        }

        /// Frames waiting on the wire.
        pub fn in_flight(&self) -> usize {
            self.wire().in_flight.len()
        }
    }

    impl Wire {
        fn route(&mut self, from: usize, frame: Bytes) -> Delivery {
            let sender = self.ends[from].clone();
            if !self.up {
                return Delivery::Lost { from: sender };
            }
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Delivery::Lost { from: sender };
            }
            Delivery::Delivered {
                to: self.ends[1 - from].clone(),
                from: sender,
                frame,
            }
        }
    }

    impl Delivery {
        fn complete(self) -> bool {
            match self {
                Delivery::Delivered { to, from, frame } => {
                    to.on_receive(&frame);
                    from.on_send_complete(true);
                    true
                }
                Delivery::Lost { from } => {
                    from.on_send_complete(false);
                    false
                }
            }
        }
    }

    impl Transport for MemoryLink {
        fn send(&self, frame: &[u8]) -> Result<()> {
            if frame.is_empty() {
                return Err(SyncError::SendFailed("empty frame".into()));
            }
            tracing::trace!("link {} send {}", self.side, frame::dump(frame));
            let frame = Bytes::copy_from_slice(frame);
            let immediate = {
                let mut wire = self.wire();
                wire.sent[self.side].push(frame.clone());
                if wire.auto_deliver {
                    Some(wire.route(self.side, frame))
                } else {
                    wire.in_flight.push_back((self.side, frame));
                    None
                }
            };
            if let Some(delivery) = immediate {
                delivery.complete();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLink;
    use super::*;
    use crate::link::LinkHandle;

    #[test]
    fn test_pump_delivers_and_completes() {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (link_a, _link_b) = MemoryLink::pair(a.clone(), b.clone());

        link_a.send(b"=lo1").unwrap();
        assert!(b.drain().frames.is_empty());
        assert_eq!(link_a.pump(), 1);

        assert_eq!(b.drain().frames, vec![bytes::Bytes::from_static(b"=lo1")]);
        assert_eq!(a.drain().completions, vec![true]);
    }

    #[test]
    fn test_down_link_fails_sends() {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (link_a, link_b) = MemoryLink::pair(a.clone(), b.clone());
        link_b.set_up(false);

        link_a.send(b".").unwrap();
        assert_eq!(link_b.pump(), 0);
        assert!(b.drain().frames.is_empty());
        assert_eq!(a.drain().completions, vec![false]);
        assert_eq!(link_a.sent().len(), 1);
    }

    #[test]
    fn test_fail_next_then_recover() {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (link_a, _link_b) = MemoryLink::pair(a.clone(), b.clone());
        link_a.fail_next(1);

        link_a.send(b"=lo1").unwrap();
        link_a.send(b"=lo0").unwrap();
        link_a.pump();
        assert_eq!(a.drain().completions, vec![false, true]);
        assert_eq!(b.drain().frames.len(), 1);
    }

    #[test]
    fn test_auto_deliver() {
        let (a, b) = (LinkHandle::new(), LinkHandle::new());
        let (link_a, _link_b) = MemoryLink::pair(a.clone(), b.clone());
        link_a.set_auto_deliver(true);

        link_a.send(b"?R").unwrap();
        assert_eq!(link_a.in_flight(), 0);
        assert_eq!(b.drain().frames.len(), 1);
        assert_eq!(a.drain().completions, vec![true]);
    }
}
