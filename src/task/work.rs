// src/task/work.rs

//! The user procedure a task runs.

use tracing::debug;

use crate::errors::TaskError;
use crate::task::TaskContext;

/// Work executed by a task once it is admitted.
///
/// `execute` runs on an executor worker. It consumes the work, so each task
/// runs its work at most once. Implementations must finish the task through
/// `ctx`, either before returning or later from another thread.
pub trait Work: Send + 'static {
    fn execute(self: Box<Self>, ctx: TaskContext);
}

type Block = Box<dyn FnOnce(TaskContext) + Send>;

/// Adapts a closure into [`Work`].
///
/// The closure receives the [`TaskContext`] and must finish the task, or the
/// task never finishes. A `BlockWork` without a closure finishes immediately.
pub struct BlockWork {
    block: Option<Block>,
}

impl BlockWork {
    pub fn new(block: impl FnOnce(TaskContext) + Send + 'static) -> Self {
        Self {
            block: Some(Box::new(block)),
        }
    }

    /// Work that does nothing and finishes immediately.
    pub fn empty() -> Self {
        Self { block: None }
    }

    /// Run `f`, then finish.
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Self::new(move |ctx| {
            f();
            finish_quietly(&ctx, Vec::new());
        })
    }

    /// Run `f`, then finish with its error, if any.
    pub fn from_fallible(f: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        Self::new(move |ctx| {
            let errors = match f() {
                Ok(()) => Vec::new(),
                Err(err) => vec![TaskError::execution(err)],
            };
            finish_quietly(&ctx, errors);
        })
    }
}

impl Work for BlockWork {
    fn execute(self: Box<Self>, ctx: TaskContext) {
        match self.block {
            Some(block) => block(ctx),
            None => finish_quietly(&ctx, Vec::new()),
        }
    }
}

fn finish_quietly(ctx: &TaskContext, errors: Vec<TaskError>) {
    if let Err(err) = ctx.finish_with_errors(errors) {
        debug!(task = %ctx.task().name(), error = %err, "block already finished the task");
    }
}
