// src/errors.rs

//! Crate-wide error types.
//!
//! - [`TaskqueueError`] is what fallible crate APIs return (config loading,
//!   scheduler construction, the CLI entry point).
//! - [`UsageError`] reports a caller mistake against the task API, such as
//!   mutating a task after it was enqueued. It never corrupts scheduler state.
//! - [`TaskError`] is a failure recorded *on a task*: condition failures,
//!   dependency failures, cancellation markers and execution errors.

use std::sync::Arc;

use thiserror::Error;

use crate::task::TaskState;
use crate::types::{format_ids, TaskId};

#[derive(Error, Debug)]
pub enum TaskqueueError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Misuse of the task or scheduler API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("task {task} can no longer be modified (state: {state:?})")]
    NotMutable { task: TaskId, state: TaskState },

    #[error("task {task} has already been enqueued")]
    AlreadyEnqueued { task: TaskId },

    #[error("task {task} cannot depend on itself")]
    SelfDependency { task: TaskId },

    #[error("task {task} has already finished")]
    AlreadyFinishing { task: TaskId },

    #[error("task {task} can only produce tasks while executing (state: {state:?})")]
    ProduceOutsideExecution { task: TaskId, state: TaskState },

    #[error("scheduler has shut down")]
    SchedulerClosed,
}

/// A failure recorded in a task's error list.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("condition `{condition}` failed: {reason}")]
    ConditionFailed { condition: String, reason: String },

    #[error("dependencies failed: {}", format_ids(.0))]
    DependenciesFailed(Vec<TaskId>),

    #[error("dependencies were cancelled: {}", format_ids(.0))]
    DependenciesCancelled(Vec<TaskId>),

    #[error("task cancelled: {0}")]
    Cancelled(String),

    #[error("execution failed: {0}")]
    Execution(Arc<anyhow::Error>),

    #[error("work panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap an arbitrary error reported by task work.
    pub fn execution(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Execution(Arc::new(err.into()))
    }

    pub fn condition(condition: impl Into<String>, reason: impl Into<String>) -> Self {
        TaskError::ConditionFailed {
            condition: condition.into(),
            reason: reason.into(),
        }
    }

    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, TaskError::DependenciesFailed(_))
    }

    pub fn is_dependency_cancellation(&self) -> bool {
        matches!(self, TaskError::DependenciesCancelled(_))
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Execution(Arc::new(err))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskqueueError>;
