// src/condition/dependencies.rs

//! Conditions that look at the outcome of a task's dependencies.

use crate::condition::{Condition, ConditionCompletion, ConditionResult};
use crate::errors::TaskError;
use crate::task::Task;
use crate::types::TaskId;

/// Fails with [`TaskError::DependenciesCancelled`] if any dependency was
/// cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCancelledDependencies;

impl NoCancelledDependencies {
    pub fn new() -> Self {
        Self
    }
}

impl Condition for NoCancelledDependencies {
    fn evaluate(&self, task: &Task, completion: ConditionCompletion) {
        let cancelled: Vec<TaskId> = task
            .dependencies()
            .iter()
            .filter(|dependency| dependency.is_cancelled())
            .map(Task::id)
            .collect();

        if cancelled.is_empty() {
            completion.satisfied();
        } else {
            completion.fail(TaskError::DependenciesCancelled(cancelled));
        }
    }
}

/// Fails with [`TaskError::DependenciesFailed`] if any dependency finished
/// with errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFailedDependencies;

impl NoFailedDependencies {
    pub fn new() -> Self {
        Self
    }
}

impl Condition for NoFailedDependencies {
    fn evaluate(&self, task: &Task, completion: ConditionCompletion) {
        let failed: Vec<TaskId> = task
            .dependencies()
            .iter()
            .filter(|dependency| !dependency.errors().is_empty())
            .map(Task::id)
            .collect();

        if failed.is_empty() {
            completion.satisfied();
        } else {
            completion.fail(TaskError::DependenciesFailed(failed));
        }
    }
}

/// Scoped check behind
/// [`Task::add_dependency_expecting_success`](crate::task::Task::add_dependency_expecting_success).
///
/// A cancelled dependency reports [`TaskError::DependenciesCancelled`]; one
/// that finished with errors reports [`TaskError::DependenciesFailed`].
#[derive(Debug, Clone)]
pub struct DependencySucceeded {
    dependency: Task,
}

impl DependencySucceeded {
    pub fn new(dependency: Task) -> Self {
        Self { dependency }
    }

    pub fn dependency(&self) -> &Task {
        &self.dependency
    }
}

impl Condition for DependencySucceeded {
    fn name(&self) -> String {
        format!("DependencySucceeded<{}>", self.dependency.name())
    }

    fn evaluate(&self, _task: &Task, completion: ConditionCompletion) {
        let result = if self.dependency.is_cancelled() {
            ConditionResult::Failed(TaskError::DependenciesCancelled(vec![self.dependency.id()]))
        } else if !self.dependency.errors().is_empty() {
            ConditionResult::Failed(TaskError::DependenciesFailed(vec![self.dependency.id()]))
        } else {
            ConditionResult::Satisfied
        };
        completion.complete(result);
    }
}
