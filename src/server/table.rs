//! Bounded player table.
//!
//! A fixed arena of seats addressed by 1-based id. The table is the single
//! source of truth for membership: the acceptor admits into it, handlers and
//! the round manager look up per-slot plumbing through it, and a released id
//! becomes reusable immediately.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::protocol::{Frame, PlayerId};

/// Per-seat plumbing: the outbound frame queue drained by the connection's
/// writer task, and the shutdown signal that unparks both of its tasks.
pub(crate) struct SlotHandle {
    pub outbound: UnboundedSender<Frame>,
    pub shutdown: Arc<Notify>,
}

pub struct PlayerTable {
    slots: Mutex<Vec<Option<SlotHandle>>>,
    occupancy: Notify,
    capacity: usize,
}

impl PlayerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new((0..capacity).map(|_| None).collect()),
            occupancy: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn index(&self, id: PlayerId) -> Option<usize> {
        if id >= 1 && (id as usize) <= self.capacity {
            Some(id as usize - 1)
        } else {
            None
        }
    }

    /// Seat a new connection in the lowest free slot. Fails with
    /// [`Error::Full`] at capacity.
    pub(crate) fn admit(
        &self,
        outbound: UnboundedSender<Frame>,
        shutdown: Arc<Notify>,
    ) -> Result<PlayerId> {
        let id = {
            let mut slots = self.slots.lock();
            let free = slots.iter().position(|s| s.is_none()).ok_or(Error::Full)?;
            slots[free] = Some(SlotHandle { outbound, shutdown });
            free as PlayerId + 1
        };
        self.occupancy.notify_one();
        Ok(id)
    }

    /// Free a seat and unpark its connection tasks. Idempotent: returns
    /// false if the seat was already free.
    pub fn release(&self, id: PlayerId) -> bool {
        let Some(idx) = self.index(id) else {
            return false;
        };
        let handle = self.slots.lock()[idx].take();
        match handle {
            Some(handle) => {
                handle.shutdown.notify_waiters();
                true
            }
            None => false,
        }
    }

    /// Clone the outbound queue of one occupied seat.
    pub(crate) fn sender(&self, id: PlayerId) -> Option<UnboundedSender<Frame>> {
        let idx = self.index(id)?;
        self.slots.lock()[idx].as_ref().map(|s| s.outbound.clone())
    }

    /// Snapshot of every occupied seat's outbound queue, taken under the
    /// table lock and used after releasing it.
    pub(crate) fn snapshot(&self) -> Vec<(PlayerId, UnboundedSender<Frame>)> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref()
                    .map(|s| (idx as PlayerId + 1, s.outbound.clone()))
            })
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// Park until the next admission signal. A signal posted before the
    /// wait is not lost: `admit` stores a permit.
    pub async fn occupancy_changed(&self) {
        self.occupancy.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn plumbing() -> (UnboundedSender<Frame>, Arc<Notify>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        (tx, Arc::new(Notify::new()))
    }

    #[test]
    fn ids_fill_lowest_first_up_to_capacity() {
        let table = PlayerTable::new(3);
        for expected in 1..=3 {
            let (tx, shutdown) = plumbing();
            assert_eq!(table.admit(tx, shutdown).unwrap(), expected);
        }
        let (tx, shutdown) = plumbing();
        assert!(matches!(table.admit(tx, shutdown), Err(Error::Full)));
        assert_eq!(table.occupied_count(), 3);
    }

    #[test]
    fn released_id_is_reused_lowest_first() {
        let table = PlayerTable::new(3);
        for _ in 0..3 {
            let (tx, shutdown) = plumbing();
            table.admit(tx, shutdown).unwrap();
        }
        assert!(table.release(2));
        assert!(!table.release(2), "second release is a no-op");
        let (tx, shutdown) = plumbing();
        assert_eq!(table.admit(tx, shutdown).unwrap(), 2);
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let table = PlayerTable::new(2);
        assert!(!table.release(0));
        assert!(!table.release(3));
        assert!(table.sender(0).is_none());
        assert!(table.sender(7).is_none());
    }

    #[tokio::test]
    async fn occupancy_signal_wakes_on_admission() {
        let table = Arc::new(PlayerTable::new(1));
        let waiter = {
            let table = table.clone();
            tokio::spawn(async move { table.occupancy_changed().await })
        };
        tokio::task::yield_now().await;
        let (tx, shutdown) = plumbing();
        table.admit(tx, shutdown).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter wakes")
            .unwrap();
    }
}
