//! Buffer ownership tracking
//!
//! A buffer is `Filling` while the client writes it, `Attached` once it has
//! been handed to the server, and `ReleasedPendingDestroy` between the
//! server's release and the client destroying the protocol object. Only
//! attached buffers may be released, and a buffer leaves the ledger exactly
//! once.

use std::collections::HashMap;

use log::{debug, warn};

pub type BufferId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Filling,
    Attached,
    ReleasedPendingDestroy,
}

/// What the caller should do with a buffer after a release notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Destroy the protocol object, then call [`BufferLedger::destroyed`]
    Destroy,
    /// Release for a buffer that was never attached; left untouched
    NotAttached,
    /// Release for an id the ledger does not know (already destroyed)
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub produced: u64,
    pub attached: u64,
    pub released: u64,
    pub destroyed: u64,
    pub discarded: u64,
}

#[derive(Debug, Default)]
pub struct BufferLedger {
    next_id: BufferId,
    buffers: HashMap<BufferId, BufferState>,
    stats: LedgerStats,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new buffer in the `Filling` state
    pub fn register(&mut self) -> BufferId {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, BufferState::Filling);
        self.stats.produced += 1;
        debug!("Buffer {} filling", id);
        id
    }

    /// Hands a filled buffer to the server; returns false if it was not filling
    pub fn mark_attached(&mut self, id: BufferId) -> bool {
        match self.buffers.get_mut(&id) {
            Some(state @ BufferState::Filling) => {
                *state = BufferState::Attached;
                self.stats.attached += 1;
                debug!("Buffer {} attached", id);
                true
            }
            Some(state) => {
                warn!("Buffer {} attached twice (state {:?})", id, state);
                false
            }
            None => {
                warn!("Attach of untracked buffer {}", id);
                false
            }
        }
    }

    /// Records the server's release of a buffer
    pub fn release(&mut self, id: BufferId) -> ReleaseOutcome {
        match self.buffers.get_mut(&id) {
            Some(state @ BufferState::Attached) => {
                *state = BufferState::ReleasedPendingDestroy;
                self.stats.released += 1;
                debug!("Buffer {} released by server", id);
                ReleaseOutcome::Destroy
            }
            Some(state) => {
                warn!("Release of buffer {} in state {:?} ignored", id, state);
                ReleaseOutcome::NotAttached
            }
            None => {
                warn!("Release of unknown buffer {} ignored", id);
                ReleaseOutcome::Unknown
            }
        }
    }

    /// Forgets a released buffer once its protocol object has been destroyed
    pub fn destroyed(&mut self, id: BufferId) {
        if self.buffers.get(&id) == Some(&BufferState::ReleasedPendingDestroy) {
            self.buffers.remove(&id);
            self.stats.destroyed += 1;
            debug!("Buffer {} destroyed", id);
        } else {
            warn!("Destroy of buffer {} before its release ignored", id);
        }
    }

    /// Drops a buffer that was produced but never attached
    pub fn discard(&mut self, id: BufferId) -> bool {
        if self.buffers.get(&id) == Some(&BufferState::Filling) {
            self.buffers.remove(&id);
            self.stats.discarded += 1;
            debug!("Buffer {} discarded before attach", id);
            true
        } else {
            false
        }
    }

    pub fn state(&self, id: BufferId) -> Option<BufferState> {
        self.buffers.get(&id).copied()
    }

    /// Buffers the server currently owns
    pub fn in_flight(&self) -> usize {
        self.buffers
            .values()
            .filter(|s| **s == BufferState::Attached)
            .count()
    }

    pub fn tracked(&self) -> usize {
        self.buffers.len()
    }

    pub fn stats(&self) -> LedgerStats {
        self.stats
    }
}
