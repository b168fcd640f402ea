// src/task/state.rs

//! Lifecycle states of a task and the transitions allowed between them.

/// Lifecycle state of a [`Task`](super::Task).
///
/// ```text
/// Initialized -> Pending -> EvaluatingConditions -> Ready -> Executing -> Finishing -> Finished
///                                  |                  |                      ^
///                                  +------------------+----------------------+
///                                  (cancelled or a condition failed: work is skipped)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Constructed; dependencies, conditions and flags may still change.
    Initialized,
    /// Enqueued on a scheduler; waiting for dependencies to finish.
    Pending,
    /// All dependencies finished (or the task was cancelled); conditions are
    /// being evaluated.
    EvaluatingConditions,
    /// Conditions passed; waiting for an exclusion slot, the vital barrier or
    /// worker capacity.
    Ready,
    /// Work has been dispatched to a worker.
    Executing,
    /// Work reported completion (or was skipped); waiting for produced tasks.
    Finishing,
    /// Terminal.
    Finished,
}

impl TaskState {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Initialized, Pending)
                | (Pending, EvaluatingConditions)
                | (EvaluatingConditions, Ready)
                | (EvaluatingConditions, Finishing)
                | (Ready, Executing)
                | (Ready, Finishing)
                | (Executing, Finishing)
                | (Finishing, Finished)
        )
    }

    /// Dependencies, conditions, categories and the vital flag may only be
    /// changed before the task is enqueued.
    pub fn is_mutable(self) -> bool {
        self == TaskState::Initialized
    }

    pub fn is_finished(self) -> bool {
        self == TaskState::Finished
    }
}
