// src/engine/scheduler.rs

//! Public scheduler handle.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::{Result, TaskqueueError, UsageError};
use crate::exec::{BlockingExecutor, ExecutorBackend};
use crate::task::Task;

use super::core::SchedulerCore;
use super::runtime::Runtime;
use super::submit::Submitter;
use super::{RuntimeEvent, SchedulerOptions};

/// A task queue: owns every task enqueued on it until the task finishes.
///
/// Cloning yields another handle to the same scheduler. The scheduler runs
/// on the Tokio runtime it was created in. When the last handle is dropped
/// the scheduler finishes the tasks it owns and then stops.
///
/// ```no_run
/// # use taskqueue::engine::{Scheduler, SchedulerOptions};
/// # use taskqueue::task::Task;
/// # async fn demo() -> taskqueue::errors::Result<()> {
/// let scheduler = Scheduler::new(SchedulerOptions::named("demo"))?;
///
/// let fetch = Task::from_fn(|| println!("fetch"));
/// let build = Task::from_fn(|| println!("build"));
/// build.add_dependency_expecting_success(&fetch)?;
///
/// scheduler.enqueue_all([&fetch, &build])?;
/// scheduler.wait_until_idle().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    submitter: Submitter,
    runtime: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.submitter.send(RuntimeEvent::Shutdown);
    }
}

impl Scheduler {
    /// Scheduler running work on Tokio's blocking thread pool.
    ///
    /// Fails with [`TaskqueueError::NoRuntime`] outside a Tokio runtime.
    pub fn new(options: SchedulerOptions) -> Result<Self> {
        Self::with_executor(options, BlockingExecutor::new())
    }

    pub fn with_executor<E>(options: SchedulerOptions, executor: E) -> Result<Self>
    where
        E: ExecutorBackend + 'static,
    {
        let handle =
            Handle::try_current().map_err(|err| TaskqueueError::NoRuntime(err.to_string()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        let submitter = Submitter::new(event_tx, Arc::new(outstanding));

        let name = options.name.clone();
        info!(
            scheduler = %name,
            max_concurrent = options.max_concurrent,
            "creating scheduler"
        );

        let core = SchedulerCore::new(options);
        let runtime = Runtime::new(core, event_rx, submitter.clone(), executor);
        let join = handle.spawn(runtime.run());

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                submitter,
                runtime: Mutex::new(Some(join)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Register `task`, notify its `did_enqueue` observers and start tracking
    /// its dependencies.
    ///
    /// Dependencies generated by the task's conditions are enqueued first.
    /// A task can be enqueued only once.
    pub fn enqueue(&self, task: &Task) -> std::result::Result<(), UsageError> {
        debug!(scheduler = %self.shared.name, task = %task.name(), "enqueue");
        self.shared.submitter.submit(task, None)
    }

    /// Enqueue each task in order.
    pub fn enqueue_all<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a Task>,
    ) -> std::result::Result<(), UsageError> {
        for task in tasks {
            self.enqueue(task)?;
        }
        Ok(())
    }

    /// Cancel every task the scheduler owns.
    pub fn cancel_all(&self) {
        self.shared.submitter.send(RuntimeEvent::CancelAll);
    }

    /// Number of enqueued tasks (produced ones included) that have not
    /// finished.
    pub fn pending_count(&self) -> usize {
        self.shared.submitter.outstanding()
    }

    /// Resolve once every enqueued task has finished.
    pub async fn wait_until_idle(&self) {
        let mut outstanding = self.shared.submitter.subscribe_outstanding();
        let _ = outstanding.wait_for(|n| *n == 0).await;
    }

    /// Wait for all tasks to finish, then stop the runtime loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.wait_until_idle().await;
        self.shared.submitter.send(RuntimeEvent::Shutdown);

        let join = self
            .shared
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(join) = join {
            join.await.map_err(anyhow::Error::from)??;
            info!(scheduler = %self.shared.name, "scheduler shut down");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.shared.name)
            .field("pending", &self.pending_count())
            .finish()
    }
}
