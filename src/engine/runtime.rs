// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::condition::evaluator::evaluate_all;
use crate::errors::Result;
use crate::exec::{ExecutorBackend, Job};
use crate::observer::notify_all;
use crate::task::{Task, TaskContext};
use crate::types::TaskId;

use super::core::SchedulerCore;
use super::submit::Submitter;
use super::{CoreCommand, RuntimeEvent};

/// Drives the [`SchedulerCore`] in response to `RuntimeEvent`s and delegates
/// running work to an `ExecutorBackend`.
///
/// This is the IO shell around the core. It reads events, evaluates
/// conditions, dispatches admitted tasks and announces finished ones. Events
/// it generates itself go to a local backlog, which is drained before the
/// channel.
pub struct Runtime<E: ExecutorBackend> {
    core: SchedulerCore,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    submitter: Submitter,
    executor: E,
    backlog: VecDeque<RuntimeEvent>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("backlog", &self.backlog.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: SchedulerCore,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        submitter: Submitter,
        executor: E,
    ) -> Self {
        Self {
            core,
            event_rx,
            submitter,
            executor,
            backlog: VecDeque::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from the backlog, then from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes the commands returned by the core.
    pub async fn run(mut self) -> Result<()> {
        let name = self.core.options().name.clone();
        info!(scheduler = %name, "scheduler runtime started");

        loop {
            let event = match self.backlog.pop_front() {
                Some(event) => event,
                None => match self.event_rx.recv().await {
                    Some(event) => event,
                    None => {
                        info!(scheduler = %name, "runtime event channel closed; exiting");
                        break;
                    }
                },
            };

            trace!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!(scheduler = %name, "scheduler idle after shutdown; stopping runtime");
                break;
            }
        }

        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::WatchDependencies { task, dependencies } => {
                self.watch_dependencies(task, dependencies);
            }
            CoreCommand::EvaluateConditions(task) => {
                self.evaluate_conditions(&task);
            }
            CoreCommand::Dispatch(tasks) => {
                self.dispatch(tasks).await?;
            }
            CoreCommand::Finalize(task) => {
                self.finalize(&task);
            }
            CoreCommand::CancelTasks(tasks) => {
                for task in tasks {
                    task.cancel();
                }
            }
        }
        Ok(())
    }

    fn watch_dependencies(&mut self, task: TaskId, dependencies: Vec<Task>) {
        for dependency in dependencies {
            let dependency_id = dependency.id();
            let submitter = self.submitter.clone();
            let waiter = Box::new(move || {
                submitter.send(RuntimeEvent::DependencyFinished {
                    task,
                    dependency: dependency_id,
                });
            });

            // Finished between the core's check and now.
            if dependency.register_finish_waiter(waiter).is_some() {
                self.backlog.push_back(RuntimeEvent::DependencyFinished {
                    task,
                    dependency: dependency_id,
                });
            }
        }
    }

    fn evaluate_conditions(&mut self, task: &Task) {
        let id = task.id();
        let submitter = self.submitter.clone();
        evaluate_all(task, task.conditions(), move |errors| {
            submitter.send(RuntimeEvent::ConditionsEvaluated { task: id, errors });
        });
    }

    async fn dispatch(&mut self, tasks: Vec<Task>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name().to_string()).collect();
        debug!(?names, "dispatching admitted tasks");

        let jobs = tasks
            .into_iter()
            .map(|task| {
                let ctx = TaskContext::new(task.clone(), self.submitter.clone());
                Job::new(task, ctx)
            })
            .collect();

        self.executor.spawn_ready_tasks(jobs).await
    }

    fn finalize(&mut self, task: &Task) {
        let Some(completion) = task.finalize() else {
            return;
        };

        if completion.errors.is_empty() {
            info!(task = %task.name(), task_id = %task.id(), "task finished");
        } else {
            warn!(
                task = %task.name(),
                task_id = %task.id(),
                errors = completion.errors.len(),
                cancelled = task.is_cancelled(),
                "task finished with errors"
            );
        }

        notify_all(task, &completion.observers, "did_finish", |o| {
            o.did_finish(task, &completion.errors)
        });

        for waiter in completion.waiters {
            waiter();
        }

        task.announce_finished();
        self.submitter.task_retired();
        self.backlog
            .push_back(RuntimeEvent::Finalized { task: task.id() });
    }
}
