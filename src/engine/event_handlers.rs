// src/engine/event_handlers.rs

//! Event handling logic for the scheduling core.

use tracing::{debug, info, trace, warn};

use crate::engine::core::{Entry, Phase, SchedulerCore};
use crate::errors::TaskError;
use crate::task::{Task, TaskState};
use crate::types::TaskId;

/// Command produced by the pure core, to be executed by the async shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Report `task` once each of these dependencies has finished.
    WatchDependencies { task: TaskId, dependencies: Vec<Task> },
    /// Run the task's conditions and report the failures.
    EvaluateConditions(Task),
    /// Hand these admitted tasks to the executor.
    Dispatch(Vec<Task>),
    /// Move the task to `Finished` and announce it.
    Finalize(Task),
    /// Cancel each of these tasks.
    CancelTasks(Vec<Task>),
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Register a newly enqueued task.
///
/// - A produced task shares its producer's vital barrier position and keeps
///   the producer from finishing until it has finished itself.
/// - A task some waiting task depends on takes the lowest barrier position
///   among those dependents.
/// - A cancelled task does not wait for its dependencies.
pub fn handle_enqueued(
    core: &mut SchedulerCore,
    task: Task,
    producer: Option<TaskId>,
) -> CoreStep {
    let mut commands = Vec::new();
    let id = task.id();

    if core.entries.contains_key(&id) {
        warn!(task = %task.name(), task_id = %id, "task enqueued twice; ignoring");
        return CoreStep::continue_with(commands);
    }

    if task.state() == TaskState::Initialized {
        task.advance(TaskState::Pending);
    }

    let profile = task.admission_profile();
    let seq = core.next_seq;
    core.next_seq += 1;

    let mut position = seq;
    if let Some(parent) = producer.and_then(|p| core.entries.get_mut(&p)) {
        position = parent.position;
        if parent.phase != Phase::Finalizing {
            parent.children.insert(id);
        }
    }

    // A dependency enqueued after its dependent must not wait behind a
    // barrier the dependent sits ahead of.
    if let Some(dependent_position) = core
        .entries
        .values()
        .filter(|entry| {
            entry.phase == Phase::WaitingForDependencies
                && entry.unfinished_dependencies.contains(&id)
        })
        .map(|entry| entry.position)
        .min()
    {
        position = position.min(dependent_position);
    }

    if profile.vital {
        core.vital.register(seq);
    }

    let unfinished: Vec<Task> = if task.is_cancelled() {
        Vec::new()
    } else {
        profile
            .dependencies
            .into_iter()
            .filter(|dependency| !dependency.is_finished())
            .collect()
    };

    info!(
        task = %task.name(),
        task_id = %id,
        seq,
        position,
        vital = profile.vital,
        waiting_on = unfinished.len(),
        "task enqueued"
    );

    core.entries.insert(
        id,
        Entry {
            task: task.clone(),
            seq,
            position,
            vital: profile.vital,
            categories: profile.categories,
            unfinished_dependencies: unfinished.iter().map(Task::id).collect(),
            phase: Phase::WaitingForDependencies,
            producer,
            children: Default::default(),
            holds_worker: false,
        },
    );

    if unfinished.is_empty() {
        begin_evaluation(core, id, &mut commands);
    } else {
        commands.push(CoreCommand::WatchDependencies {
            task: id,
            dependencies: unfinished,
        });
    }

    CoreStep::continue_with(commands)
}

/// One dependency of `task` has finished.
pub fn handle_dependency_finished(
    core: &mut SchedulerCore,
    task: TaskId,
    dependency: TaskId,
) -> CoreStep {
    let mut commands = Vec::new();

    let Some(entry) = core.entries.get_mut(&task) else {
        return CoreStep::continue_with(commands);
    };
    if entry.phase != Phase::WaitingForDependencies {
        return CoreStep::continue_with(commands);
    }

    entry.unfinished_dependencies.remove(&dependency);
    trace!(
        task = %entry.task.name(),
        dependency = %dependency,
        remaining = entry.unfinished_dependencies.len(),
        "dependency finished"
    );

    if entry.unfinished_dependencies.is_empty() {
        begin_evaluation(core, task, &mut commands);
    }

    CoreStep::continue_with(commands)
}

/// All conditions of `task` reported.
pub fn handle_conditions_evaluated(
    core: &mut SchedulerCore,
    task: TaskId,
    errors: Vec<TaskError>,
) -> CoreStep {
    let mut commands = Vec::new();

    let Some(entry) = core.entries.get_mut(&task) else {
        return CoreStep::continue_with(commands);
    };
    if entry.phase != Phase::EvaluatingConditions {
        warn!(task = %entry.task.name(), phase = ?entry.phase, "unexpected condition results");
        return CoreStep::continue_with(commands);
    }

    if !errors.is_empty() {
        debug!(
            task = %entry.task.name(),
            failures = errors.len(),
            "conditions failed; task will not run"
        );
        entry.task.record_condition_failures(errors);
    }

    if entry.task.is_cancelled() {
        finish_unexecuted(core, task, &mut commands);
    } else {
        entry.task.advance(TaskState::Ready);
        entry.phase = Phase::AwaitingAdmission;
        core.awaiting_admission.insert(entry.seq, task);
    }

    admit_ready(core, &mut commands);
    CoreStep::continue_with(commands)
}

/// `task` was cancelled. Waiting tasks skip ahead to condition evaluation;
/// ready tasks finish without running. Evaluating and executing tasks notice
/// the flag themselves.
pub fn handle_cancelled(core: &mut SchedulerCore, task: TaskId) -> CoreStep {
    let mut commands = Vec::new();

    let Some(phase) = core.entries.get(&task).map(|entry| entry.phase) else {
        return CoreStep::continue_with(commands);
    };

    match phase {
        Phase::WaitingForDependencies => begin_evaluation(core, task, &mut commands),
        Phase::AwaitingAdmission => {
            finish_unexecuted(core, task, &mut commands);
            admit_ready(core, &mut commands);
        }
        _ => {}
    }

    CoreStep::continue_with(commands)
}

/// The work of `task` called `finish`. Its worker is free from here on and
/// its exclusion slots pass to the tasks it produced; it finalizes once those
/// have.
pub fn handle_finish_requested(core: &mut SchedulerCore, task: TaskId) -> CoreStep {
    let mut commands = Vec::new();

    let Some(entry) = core.entries.get_mut(&task) else {
        return CoreStep::continue_with(commands);
    };
    if entry.phase != Phase::Executing {
        warn!(task = %entry.task.name(), phase = ?entry.phase, "unexpected finish request");
        return CoreStep::continue_with(commands);
    }

    entry.phase = Phase::Finishing;
    if !entry.children.is_empty() {
        core.exclusion.lend(&entry.categories, task);
    }
    release_worker(core, task);
    maybe_finalize(core, task, &mut commands);
    admit_ready(core, &mut commands);

    CoreStep::continue_with(commands)
}

/// `task` is `Finished` and announced: forget it, free its exclusion slots,
/// clear its vital barrier entry and let its producer finish.
pub fn handle_finalized(core: &mut SchedulerCore, task: TaskId) -> CoreStep {
    let mut commands = Vec::new();

    let Some(entry) = core.entries.remove(&task) else {
        return CoreStep::continue_with(commands);
    };

    if entry.holds_worker {
        core.running = core.running.saturating_sub(1);
    }
    let next = core.exclusion.release(&entry.categories, task);
    if !next.is_empty() {
        trace!(task = %entry.task.name(), ?next, "exclusion slots handed on");
    }
    core.awaiting_admission.remove(&entry.seq);

    if entry.vital && core.vital.finish(entry.seq) {
        debug!(task = %entry.task.name(), seq = entry.seq, "vital task finished; barrier advanced");
    }

    if let Some(producer) = entry.producer {
        if let Some(parent) = core.entries.get_mut(&producer) {
            parent.children.remove(&task);
            maybe_finalize(core, producer, &mut commands);
        }
    }

    admit_ready(core, &mut commands);
    CoreStep::continue_with(commands)
}

/// Cancel every task the scheduler still owns, in enqueue order.
pub fn handle_cancel_all(core: &mut SchedulerCore) -> CoreStep {
    let mut owned: Vec<&Entry> = core
        .entries
        .values()
        .filter(|entry| entry.phase != Phase::Finalizing)
        .collect();
    owned.sort_by_key(|entry| entry.seq);

    let tasks: Vec<Task> = owned.into_iter().map(|entry| entry.task.clone()).collect();
    info!(tasks = tasks.len(), "cancelling all tasks");

    let commands = if tasks.is_empty() {
        Vec::new()
    } else {
        vec![CoreCommand::CancelTasks(tasks)]
    };
    CoreStep::continue_with(commands)
}

fn begin_evaluation(core: &mut SchedulerCore, task: TaskId, commands: &mut Vec<CoreCommand>) {
    let Some(entry) = core.entries.get_mut(&task) else {
        return;
    };

    entry.unfinished_dependencies.clear();
    entry.phase = Phase::EvaluatingConditions;
    entry.task.advance(TaskState::EvaluatingConditions);
    core.exclusion
        .register(&entry.categories, task, (entry.position, entry.seq));

    commands.push(CoreCommand::EvaluateConditions(entry.task.clone()));
}

/// Move a task that will not run straight to `Finishing`.
fn finish_unexecuted(core: &mut SchedulerCore, task: TaskId, commands: &mut Vec<CoreCommand>) {
    let Some(entry) = core.entries.get_mut(&task) else {
        return;
    };

    debug!(task = %entry.task.name(), task_id = %task, "skipping work");
    entry.task.advance(TaskState::Finishing);
    entry.phase = Phase::Finishing;
    core.awaiting_admission.remove(&entry.seq);
    core.exclusion.release(&entry.categories, task);

    maybe_finalize(core, task, commands);
}

fn release_worker(core: &mut SchedulerCore, task: TaskId) {
    let Some(entry) = core.entries.get_mut(&task) else {
        return;
    };
    if entry.holds_worker {
        entry.holds_worker = false;
        core.running = core.running.saturating_sub(1);
    }
}

/// Producers of `task`, nearest first.
fn lineage(core: &SchedulerCore, task: TaskId) -> Vec<TaskId> {
    let mut producers = Vec::new();
    let mut current = core.entries.get(&task).and_then(|entry| entry.producer);
    while let Some(producer) = current {
        producers.push(producer);
        current = core.entries.get(&producer).and_then(|entry| entry.producer);
    }
    producers
}

fn maybe_finalize(core: &mut SchedulerCore, task: TaskId, commands: &mut Vec<CoreCommand>) {
    let Some(entry) = core.entries.get_mut(&task) else {
        return;
    };
    if entry.phase != Phase::Finishing {
        return;
    }
    if !entry.children.is_empty() {
        debug!(
            task = %entry.task.name(),
            produced = entry.children.len(),
            "waiting for produced tasks before finishing"
        );
        return;
    }

    entry.phase = Phase::Finalizing;
    commands.push(CoreCommand::Finalize(entry.task.clone()));
}

/// Admit ready tasks in enqueue order while worker capacity lasts, skipping
/// those held back by the vital barrier or an exclusion slot.
fn admit_ready(core: &mut SchedulerCore, commands: &mut Vec<CoreCommand>) {
    let max = core.options.max_concurrent;
    let candidates: Vec<(u64, TaskId)> = core
        .awaiting_admission
        .iter()
        .map(|(seq, id)| (*seq, *id))
        .collect();

    let mut admitted = Vec::new();

    for (seq, id) in candidates {
        if max > 0 && core.running >= max {
            trace!(running = core.running, max, "worker capacity exhausted");
            break;
        }

        let producers = lineage(core, id);
        let Some(entry) = core.entries.get_mut(&id) else {
            core.awaiting_admission.remove(&seq);
            continue;
        };

        if let Some(blocker) = core.vital.blocker_for(entry.position) {
            trace!(task = %entry.task.name(), blocker, "held back by vital task");
            continue;
        }

        if !core.exclusion.try_acquire(&entry.categories, id, &producers) {
            trace!(task = %entry.task.name(), "waiting for exclusion slot");
            continue;
        }

        core.awaiting_admission.remove(&seq);
        entry.phase = Phase::Executing;
        entry.holds_worker = true;
        core.running += 1;
        entry.task.advance(TaskState::Executing);

        info!(
            task = %entry.task.name(),
            task_id = %id,
            running = core.running,
            "task admitted"
        );
        admitted.push(entry.task.clone());
    }

    if !admitted.is_empty() {
        commands.push(CoreCommand::Dispatch(admitted));
    }
}
