// src/observer/log.rs

use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::observer::Observer;
use crate::task::Task;

/// Reports task lifecycle events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogObserver {
    scope: String,
}

impl LogObserver {
    /// `scope` is added to every event, e.g. the scheduler or graph name.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl Observer for LogObserver {
    fn did_enqueue(&self, task: &Task) {
        debug!(scope = %self.scope, task = %task.name(), "task enqueued");
    }

    fn did_start(&self, task: &Task) {
        info!(scope = %self.scope, task = %task.name(), "task started");
    }

    fn did_produce(&self, task: &Task, produced: &Task) {
        debug!(
            scope = %self.scope,
            task = %task.name(),
            produced = %produced.name(),
            "task produced a new task"
        );
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        if errors.is_empty() {
            info!(scope = %self.scope, task = %task.name(), "task finished");
        } else {
            for error in errors {
                warn!(
                    scope = %self.scope,
                    task = %task.name(),
                    error = %error,
                    "task finished with error"
                );
            }
        }
    }
}
