// src/engine/vital.rs

//! Enqueue-order barrier for vital tasks.

use std::collections::BTreeSet;

/// Tracks unfinished vital tasks by enqueue sequence number.
///
/// A task at barrier position `p` may be admitted only when no vital task
/// with a sequence number below `p` is still unfinished. An ordinary
/// enqueue's position is its own sequence number, which gives both rules:
/// vital tasks run in enqueue order, and every task enqueued after a vital
/// task waits for it.
#[derive(Debug, Default)]
pub struct VitalBarrier {
    unfinished: BTreeSet<u64>,
}

impl VitalBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, seq: u64) {
        self.unfinished.insert(seq);
    }

    /// Returns `true` if `seq` was a registered vital task.
    pub fn finish(&mut self, seq: u64) -> bool {
        self.unfinished.remove(&seq)
    }

    pub fn is_clear_for(&self, position: u64) -> bool {
        self.blocker_for(position).is_none()
    }

    /// The earliest unfinished vital task holding back `position`, if any.
    pub fn blocker_for(&self, position: u64) -> Option<u64> {
        self.unfinished.range(..position).next().copied()
    }

    pub fn unfinished(&self) -> usize {
        self.unfinished.len()
    }
}
