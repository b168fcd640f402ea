// src/condition/mod.rs

//! Preconditions evaluated before a task may execute.
//!
//! A [`Condition`] is checked once every dependency of its task finished.
//! Evaluation is callback-based: the condition reports through a
//! [`ConditionCompletion`], synchronously or later from any thread.
//!
//! - [`evaluator`] runs all conditions of a task and aggregates failures.
//! - [`dependencies`] holds the conditions that inspect dependencies.
//! - [`silent`] wraps a condition to suppress its generated dependency.

pub mod dependencies;
pub mod evaluator;
pub mod silent;

pub use dependencies::{DependencySucceeded, NoCancelledDependencies, NoFailedDependencies};
pub use evaluator::ConditionCompletion;
pub use silent::SilentCondition;

use crate::errors::TaskError;
use crate::task::Task;

/// Result reported by a condition.
#[derive(Debug, Clone)]
pub enum ConditionResult {
    Satisfied,
    Failed(TaskError),
}

/// A gate a task must pass before its work runs.
pub trait Condition: Send + Sync + 'static {
    /// Name used in logs and in `ConditionFailed` errors.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// A task that must finish before this condition is evaluated, e.g. one
    /// that acquires a permission the condition then checks.
    ///
    /// Asked once, when the owning task is enqueued. The scheduler attaches
    /// the returned task as a dependency and enqueues it if needed.
    fn generated_dependency(&self, _task: &Task) -> Option<Task> {
        None
    }

    /// Evaluate the condition for `task` and report through `completion`.
    fn evaluate(&self, task: &Task, completion: ConditionCompletion);
}
