// src/task/context.rs

//! Handle given to running work.

use tracing::debug;

use crate::engine::{RuntimeEvent, Submitter};
use crate::errors::{TaskError, UsageError};
use crate::observer::notify_all;
use crate::task::{Task, TaskState};

/// Passed to [`Work::execute`](super::Work::execute).
///
/// The work **must** eventually call one of the `finish*` methods, from any
/// thread; until then the task stays `Executing` and keeps its exclusion
/// slots. Clones refer to the same running task, so the context can be moved
/// into callbacks. Only the first `finish*` call takes effect; later calls
/// return [`UsageError::AlreadyFinishing`].
#[derive(Clone)]
pub struct TaskContext {
    task: Task,
    submitter: Submitter,
}

impl TaskContext {
    pub(crate) fn new(task: Task, submitter: Submitter) -> Self {
        Self { task, submitter }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Whether the task was cancelled after its work started.
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Resolve when the task gets cancelled.
    pub async fn cancelled(&self) {
        self.task.cancelled().await
    }

    pub fn finish(&self) -> Result<(), UsageError> {
        self.finish_with_errors(Vec::new())
    }

    pub fn finish_with_error(&self, error: impl Into<TaskError>) -> Result<(), UsageError> {
        self.finish_with_errors(vec![error.into()])
    }

    pub fn finish_with_errors(&self, errors: Vec<TaskError>) -> Result<(), UsageError> {
        let error_count = errors.len();
        self.task.begin_finishing(errors)?;

        debug!(
            task = %self.task.name(),
            task_id = %self.task.id(),
            errors = error_count,
            "work reported completion"
        );
        self.submitter.send(RuntimeEvent::FinishRequested {
            task: self.task.id(),
        });
        Ok(())
    }

    /// Enqueue `task` on the same scheduler. This task will not reach
    /// `Finished` before `task` does.
    pub fn produce(&self, task: Task) -> Result<(), UsageError> {
        let state = self.task.state();
        if state != TaskState::Executing {
            return Err(UsageError::ProduceOutsideExecution {
                task: self.task.id(),
                state,
            });
        }
        if task == self.task {
            return Err(UsageError::SelfDependency {
                task: self.task.id(),
            });
        }

        debug!(
            task = %self.task.name(),
            produced = %task.name(),
            "task produced a new task"
        );
        notify_all(&self.task, &self.task.observers(), "did_produce", |o| {
            o.did_produce(&self.task, &task)
        });

        self.submitter.submit(&task, Some(self.task.id()))
    }
}
