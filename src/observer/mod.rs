// src/observer/mod.rs

//! Lifecycle observers.
//!
//! Observers are notified in registration order:
//! - `did_enqueue` on the thread that enqueued the task,
//! - `did_start` on the worker, right before the work runs,
//! - `did_produce` on the thread that produced a task,
//! - `did_finish` on the scheduler's runtime task, before dependents are
//!   released.
//!
//! [`BlockObserver`] adapts closures; [`LogObserver`] reports lifecycle
//! events through `tracing`.

pub mod block;
pub mod log;

pub use block::BlockObserver;
pub use log::LogObserver;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::errors::TaskError;
use crate::task::Task;

/// Listener for task lifecycle events. Every method defaults to a no-op.
pub trait Observer: Send + Sync + 'static {
    fn did_enqueue(&self, _task: &Task) {}

    fn did_start(&self, _task: &Task) {}

    fn did_produce(&self, _task: &Task, _produced: &Task) {}

    fn did_finish(&self, _task: &Task, _errors: &[TaskError]) {}
}

/// Call `f` on each observer; a panicking observer is logged and skipped so
/// it cannot take the scheduler down with it.
pub(crate) fn notify_all(
    task: &Task,
    observers: &[Arc<dyn Observer>],
    event: &'static str,
    f: impl Fn(&dyn Observer),
) {
    for observer in observers {
        if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
            error!(task = %task.name(), event, "observer panicked");
        }
    }
}
