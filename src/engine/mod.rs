// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the pure scheduling core ([`core`] + [`event_handlers`]): dependency
//!   tracking, condition results, mutual exclusion, the vital barrier and
//!   worker capacity, driven by [`RuntimeEvent`]s and answering with
//!   [`CoreCommand`]s;
//! - the async shell ([`runtime`]) that owns the event channel, evaluates
//!   conditions, dispatches work and announces finished tasks;
//! - the public [`Scheduler`] handle ([`scheduler`]) and the [`Submitter`]
//!   ([`submit`]) that tasks and contexts use to reach the runtime.
//!
//! Readiness is re-evaluated only when an event arrives; nothing polls.

use serde::Deserialize;

use crate::errors::TaskError;
use crate::task::Task;
use crate::types::TaskId;

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerOptions {
    /// Name used in logs.
    #[serde(default = "default_scheduler_name")]
    pub name: String,

    /// Maximum number of tasks executing at once; `0` means unbounded.
    #[serde(default)]
    pub max_concurrent: usize,
}

pub(crate) fn default_scheduler_name() -> String {
    "taskqueue".to_string()
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            name: default_scheduler_name(),
            max_concurrent: 0,
        }
    }
}

impl SchedulerOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }
}

/// Events flowing into the runtime from callers, tasks, conditions and the
/// runtime itself.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A task was enqueued, either by a caller or produced by `producer`.
    Enqueued {
        task: Task,
        producer: Option<TaskId>,
    },
    /// One of `task`'s dependencies reached `Finished`.
    DependencyFinished { task: TaskId, dependency: TaskId },
    /// Every condition of `task` reported; `errors` holds the failures.
    ConditionsEvaluated { task: TaskId, errors: Vec<TaskError> },
    /// `task` was cancelled.
    Cancelled { task: TaskId },
    /// `task`'s work called `finish`.
    FinishRequested { task: TaskId },
    /// `task` reached `Finished` and was announced; release what it held.
    Finalized { task: TaskId },
    /// Cancel every task the scheduler still owns.
    CancelAll,
    /// Stop the runtime loop.
    Shutdown,
}

pub mod core;
pub mod event_handlers;
pub mod exclusion;
pub mod runtime;
pub mod scheduler;
pub mod submit;
pub mod vital;

pub use self::core::SchedulerCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use exclusion::ExclusionCoordinator;
pub use runtime::Runtime;
pub use scheduler::Scheduler;
pub use submit::Submitter;
pub use vital::VitalBarrier;
