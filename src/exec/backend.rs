// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning work itself.
//! This makes it easy to swap in a recording or deferred executor in tests
//! while keeping the production implementation in [`BlockingExecutor`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

use tracing::{debug, error};

use crate::errors::{Result, TaskError};
use crate::observer::notify_all;
use crate::task::{Task, TaskContext};

/// Trait abstracting how admitted tasks are executed.
///
/// Production code uses [`BlockingExecutor`]; tests can provide their own
/// implementation that, for example, records jobs and runs them later.
pub trait ExecutorBackend: Send {
    /// Start the given jobs. Each job must eventually be [`Job::run`] exactly
    /// once, or its task never finishes.
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// An admitted task together with the context its work will receive.
pub struct Job {
    task: Task,
    ctx: TaskContext,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("task", &self.task).finish()
    }
}

impl Job {
    pub(crate) fn new(task: Task, ctx: TaskContext) -> Self {
        Self { task, ctx }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Notify `did_start` and run the task's work on the current thread.
    ///
    /// A task cancelled after admission finishes without running its work.
    /// A panic in the work finishes the task with [`TaskError::Panicked`].
    pub fn run(self) {
        let Job { task, ctx } = self;

        notify_all(&task, &task.observers(), "did_start", |o| o.did_start(&task));

        if task.is_cancelled() {
            debug!(task = %task.name(), "task cancelled before its work started");
            finish_or_log(&ctx, Vec::new());
            return;
        }

        let Some(work) = task.take_work() else {
            finish_or_log(&ctx, Vec::new());
            return;
        };

        let work_ctx = ctx.clone();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(move || work.execute(work_ctx))) {
            let message = panic_message(panic.as_ref());
            error!(task = %task.name(), panic = %message, "task work panicked");
            finish_or_log(&ctx, vec![TaskError::Panicked(message)]);
        }
    }
}

fn finish_or_log(ctx: &TaskContext, errors: Vec<TaskError>) {
    if let Err(err) = ctx.finish_with_errors(errors) {
        debug!(task = %ctx.task().name(), error = %err, "task already finishing");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Default executor: each job runs on Tokio's blocking thread pool, so work
/// may block freely. Worker capacity is enforced by the scheduler, not here.
#[derive(Debug, Default)]
pub struct BlockingExecutor;

impl BlockingExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorBackend for BlockingExecutor {
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for job in jobs {
            tokio::task::spawn_blocking(move || job.run());
        }
        Box::pin(async { Ok(()) })
    }
}
