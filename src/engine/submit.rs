// src/engine/submit.rs

//! Path from callers, tasks and contexts into the runtime loop.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::engine::RuntimeEvent;
use crate::errors::UsageError;
use crate::observer::notify_all;
use crate::task::{Task, TaskState};

/// Cloneable sender into one scheduler's runtime.
///
/// Also tracks how many submitted tasks have not finished yet, which is what
/// [`Scheduler::wait_until_idle`](super::Scheduler::wait_until_idle) watches.
#[derive(Debug, Clone)]
pub struct Submitter {
    events: mpsc::UnboundedSender<RuntimeEvent>,
    outstanding: Arc<watch::Sender<usize>>,
}

impl Submitter {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<RuntimeEvent>,
        outstanding: Arc<watch::Sender<usize>>,
    ) -> Self {
        Self {
            events,
            outstanding,
        }
    }

    /// Send an event to the runtime. Returns `false` if the runtime is gone.
    pub fn send(&self, event: RuntimeEvent) -> bool {
        match self.events.send(event) {
            Ok(()) => true,
            Err(err) => {
                debug!(event = ?err.0, "runtime has shut down; dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    /// Number of submitted tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    pub(crate) fn subscribe_outstanding(&self) -> watch::Receiver<usize> {
        self.outstanding.subscribe()
    }

    pub(crate) fn task_retired(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Enqueue `task`: collect the dependencies its conditions generate,
    /// move it to `Pending`, enqueue generated dependencies ahead of it,
    /// notify `did_enqueue` and hand it to the runtime.
    pub fn submit(&self, task: &Task, producer: Option<crate::types::TaskId>) -> Result<(), UsageError> {
        if self.is_closed() {
            return Err(UsageError::SchedulerClosed);
        }

        let generated: Vec<Task> = task
            .conditions()
            .iter()
            .filter_map(|condition| condition.generated_dependency(task))
            .collect();

        task.mark_pending(&generated, self.clone())?;

        for dependency in generated
            .iter()
            .filter(|d| *d != task && d.state() == TaskState::Initialized)
        {
            debug!(
                task = %task.name(),
                dependency = %dependency.name(),
                "enqueueing dependency generated by a condition"
            );
            match self.submit(dependency, producer) {
                Ok(()) | Err(UsageError::AlreadyEnqueued { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        self.outstanding.send_modify(|n| *n += 1);
        notify_all(task, &task.observers(), "did_enqueue", |o| o.did_enqueue(task));

        let sent = self.send(RuntimeEvent::Enqueued {
            task: task.clone(),
            producer,
        });
        if !sent {
            self.task_retired();
            return Err(UsageError::SchedulerClosed);
        }
        Ok(())
    }
}
