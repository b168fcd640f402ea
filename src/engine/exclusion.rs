// src/engine/exclusion.rs

//! Mutual exclusion between tasks sharing a category.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::types::TaskId;

/// Place in a category's wait list: vital barrier position, then enqueue
/// sequence number.
pub type LineKey = (u64, u64);

/// One category's admission slot and its wait list, ordered by [`LineKey`].
///
/// A holder that finished its own work but still waits for produced tasks
/// lends the slot to them; `lenders` is that chain, innermost last.
#[derive(Debug, Default)]
struct Slot {
    holder: Option<TaskId>,
    lenders: Vec<TaskId>,
    waiting: VecDeque<(LineKey, TaskId)>,
}

impl Slot {
    fn next_in_line(&self) -> Option<TaskId> {
        self.waiting.front().map(|(_, task)| *task)
    }

    fn is_waiting(&self, task: TaskId) -> bool {
        self.waiting.iter().any(|(_, queued)| *queued == task)
    }

    fn grants(&self, task: TaskId, lineage: &[TaskId]) -> bool {
        if self.holder.is_some() {
            return false;
        }
        match self.lenders.last() {
            Some(lender) => lineage.contains(lender) && self.is_waiting(task),
            None => self.next_in_line() == Some(task),
        }
    }

    fn is_idle(&self) -> bool {
        self.holder.is_none() && self.lenders.is_empty() && self.waiting.is_empty()
    }
}

/// Serializes execution within each category.
///
/// Tasks join a category's wait list once their dependencies are finished and
/// are kept sorted by barrier position, then enqueue sequence number. Without
/// vital tasks involved that is plain enqueue order. A produced task, or a
/// dependency of a waiting vital task, lines up at the position it inherited,
/// so a task the barrier holds back never stands in front of one the barrier
/// is waiting for.
///
/// The slot stays taken until its holder is `Finished`. While the holder only
/// waits for tasks it produced, those tasks (and theirs) may borrow it; no
/// one else can.
///
/// A task with several categories is admitted only when it can take every
/// slot at once. Categories are walked in lexicographic order, and since every
/// wait list follows the same global order, no two tasks can each hold what
/// the other needs.
#[derive(Debug, Default)]
pub struct ExclusionCoordinator {
    slots: HashMap<String, Slot>,
}

impl ExclusionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `task` in line for each category, behind every waiting task with a
    /// lower key.
    pub fn register(&mut self, categories: &BTreeSet<String>, task: TaskId, key: LineKey) {
        for category in categories {
            let slot = self.slots.entry(category.clone()).or_default();
            if slot.is_waiting(task) {
                continue;
            }
            let at = slot.waiting.partition_point(|(other, _)| *other < key);
            slot.waiting.insert(at, (key, task));
        }
    }

    /// Take every slot for `task` if each is free and `task` is next in line,
    /// or the slot is lent to one of its producers in `lineage` (nearest
    /// first). Otherwise take nothing.
    pub fn try_acquire(
        &mut self,
        categories: &BTreeSet<String>,
        task: TaskId,
        lineage: &[TaskId],
    ) -> bool {
        let grantable = categories.iter().all(|category| {
            self.slots
                .get(category)
                .is_some_and(|slot| slot.grants(task, lineage))
        });

        if !grantable {
            return false;
        }

        for category in categories {
            if let Some(slot) = self.slots.get_mut(category) {
                slot.waiting.retain(|(_, queued)| *queued != task);
                slot.holder = Some(task);
                debug!(category = %category, task = %task, "exclusion slot acquired");
            }
        }
        true
    }

    /// Let the tasks `task` produced use the slots it holds until it is
    /// released.
    pub fn lend(&mut self, categories: &BTreeSet<String>, task: TaskId) {
        for category in categories {
            let Some(slot) = self.slots.get_mut(category) else {
                continue;
            };
            if slot.holder == Some(task) {
                slot.holder = None;
                slot.lenders.push(task);
                debug!(category = %category, task = %task, "exclusion slot lent to produced tasks");
            }
        }
    }

    /// Give up `task`'s slots (held or lent), or its place in line if it
    /// never acquired them. Returns the tasks now first in line for a free
    /// slot.
    pub fn release(&mut self, categories: &BTreeSet<String>, task: TaskId) -> Vec<TaskId> {
        let mut next_in_line = Vec::new();

        for category in categories {
            let Some(slot) = self.slots.get_mut(category) else {
                continue;
            };

            if slot.holder == Some(task) {
                slot.holder = None;
                debug!(category = %category, task = %task, "exclusion slot released");
            } else if slot.lenders.contains(&task) {
                slot.lenders.retain(|lender| *lender != task);
                debug!(category = %category, task = %task, "lent exclusion slot returned");
            } else {
                slot.waiting.retain(|(_, queued)| *queued != task);
            }

            if slot.holder.is_none() && slot.lenders.is_empty() {
                if let Some(next) = slot.next_in_line() {
                    next_in_line.push(next);
                }
            }

            if slot.is_idle() {
                self.slots.remove(category);
            }
        }

        next_in_line
    }

    pub fn holder_of(&self, category: &str) -> Option<TaskId> {
        self.slots.get(category).and_then(|slot| slot.holder)
    }

    /// Innermost task currently lending `category`'s slot.
    pub fn lent_by(&self, category: &str) -> Option<TaskId> {
        self.slots
            .get(category)
            .and_then(|slot| slot.lenders.last().copied())
    }

    pub fn is_waiting(&self, category: &str, task: TaskId) -> bool {
        self.slots
            .get(category)
            .is_some_and(|slot| slot.is_waiting(task))
    }

    pub fn waiting_in(&self, category: &str) -> usize {
        self.slots.get(category).map_or(0, |slot| slot.waiting.len())
    }
}
