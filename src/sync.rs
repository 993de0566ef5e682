//! Snapshot/delta synchronization state machine.
//!
//! [`SyncMachine`] classifies every inbound message against its current
//! [`SyncState`], applies snapshots and in-sequence changes to the
//! [`OrderBookStore`], and tells the session what to do next through a
//! [`Step`]. It performs no I/O, so the whole protocol can be exercised
//! without a connection.

use tracing::{debug, info, warn};

use crate::models::{ChangeMessage, InboundMessage, OrderBookSnapshot, OutboundMessage};
use crate::orderbook::{self, OrderBookStore};

/// Synchronization state of the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No snapshot accepted in this session yet.
    #[default]
    Unsynced,
    /// Applying changes in sequence.
    Synced,
    /// A fresh snapshot was requested; changes are read and dropped until
    /// it arrives.
    AwaitingResync,
}

/// A change whose sequence number does not follow the last applied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// `None` when no snapshot had been accepted in this session.
    pub expected: Option<u64>,
    pub received: u64,
}

impl std::fmt::Display for SequenceGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.expected {
            Some(expected) => write!(f, "expected seqNo {expected}, received {}", self.received),
            None => write!(f, "received seqNo {} before any snapshot", self.received),
        }
    }
}

/// What the session must do after a message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Send this frame back to the server.
    Reply(OutboundMessage),
    /// Abandon the session and reconnect to obtain a fresh snapshot.
    Abandon(SequenceGap),
}

/// Per-session message counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots: u64,
    pub changes_applied: u64,
    pub changes_dropped: u64,
    pub pings: u64,
    pub unknown: u64,
}

/// Protocol state machine driving an [`OrderBookStore`].
#[derive(Debug, Default)]
pub struct SyncMachine {
    state: SyncState,
    store: OrderBookStore,
    stats: SyncStats,
}

impl SyncMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn store(&self) -> &OrderBookStore {
        &self.store
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Point-in-time copy of the book for persistence.
    #[must_use]
    pub fn snapshot_copy(&self) -> Option<OrderBookSnapshot> {
        self.store.current_state().cloned()
    }

    /// Prepares for a new transport session.
    ///
    /// The store keeps its last accepted state, but nothing is applied
    /// until the new session delivers a snapshot.
    pub fn begin_session(&mut self) {
        self.state = SyncState::Unsynced;
        self.stats = SyncStats::default();
    }

    /// Records that a fresh snapshot is being requested.
    ///
    /// Called before the request goes out so no change is applied against
    /// a state that is about to be superseded.
    pub fn request_resync(&mut self) {
        if self.state != SyncState::AwaitingResync {
            debug!(from = ?self.state, "Suspending change application until next snapshot");
        }
        self.state = SyncState::AwaitingResync;
    }

    /// Handles one inbound message.
    pub fn handle(&mut self, message: InboundMessage) -> Step {
        match message {
            InboundMessage::Ping => {
                self.stats.pings += 1;
                debug!("Ping received, replying with pong");
                Step::Reply(OutboundMessage::pong())
            }
            InboundMessage::Snapshot(snapshot) => {
                self.on_snapshot(snapshot);
                Step::Continue
            }
            InboundMessage::Change(change) => self.on_change(change),
            InboundMessage::Unknown(msg_type) => {
                self.stats.unknown += 1;
                info!(msg_type = ?msg_type, "Unrecognized message type, ignoring");
                Step::Continue
            }
        }
    }

    fn on_snapshot(&mut self, snapshot: OrderBookSnapshot) {
        debug!(
            seq_no = snapshot.seq_no,
            time_delta = ?snapshot.time_delta,
            periods = snapshot.data.len(),
            "Snapshot accepted"
        );
        self.store.replace(snapshot);
        self.state = SyncState::Synced;
        self.stats.snapshots += 1;
    }

    fn on_change(&mut self, change: ChangeMessage) -> Step {
        match self.state {
            SyncState::AwaitingResync => {
                debug!(seq_no = change.seq_no, "Change dropped while awaiting snapshot");
                self.stats.changes_dropped += 1;
                Step::Continue
            }
            SyncState::Unsynced => {
                let gap = SequenceGap {
                    expected: None,
                    received: change.seq_no,
                };
                warn!(%gap, "Change before snapshot, abandoning session");
                Step::Abandon(gap)
            }
            SyncState::Synced => {
                let expected = self.store.last_seq_no().and_then(|s| s.checked_add(1));
                if expected != Some(change.seq_no) {
                    let gap = SequenceGap {
                        expected,
                        received: change.seq_no,
                    };
                    warn!(%gap, "Sequence gap, abandoning session to resynchronize");
                    return Step::Abandon(gap);
                }

                let report = orderbook::apply(&mut self.store, &change);
                self.stats.changes_applied += 1;
                debug!(
                    seq_no = change.seq_no,
                    time_delta = ?change.time_delta,
                    ops = report.ops_applied,
                    out_of_range = report.ops_out_of_range,
                    "Change applied"
                );
                Step::Continue
            }
        }
    }
}
