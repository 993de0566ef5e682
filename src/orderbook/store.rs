//! Holder of the last accepted order book.

use crate::models::OrderBookSnapshot;

/// In-memory authoritative order book state.
///
/// Empty until the first snapshot is accepted. Only [`replace`](Self::replace)
/// and the delta applier mutate it.
#[derive(Debug, Clone, Default)]
pub struct OrderBookStore {
    snapshot: Option<OrderBookSnapshot>,
}

impl OrderBookStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole state, period membership and sequence number
    /// included.
    pub fn replace(&mut self, snapshot: OrderBookSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Read-only view of the current state, if a snapshot was ever accepted.
    #[must_use]
    pub fn current_state(&self) -> Option<&OrderBookSnapshot> {
        self.snapshot.as_ref()
    }

    /// Sequence number of the last accepted snapshot or change.
    #[must_use]
    pub fn last_seq_no(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.seq_no)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }

    pub(crate) fn snapshot_mut(&mut self) -> Option<&mut OrderBookSnapshot> {
        self.snapshot.as_mut()
    }
}
