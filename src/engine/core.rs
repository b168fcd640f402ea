// src/engine/core.rs

//! Pure scheduling core.
//!
//! [`SchedulerCore`] is a synchronous, deterministic state machine that
//! consumes [`RuntimeEvent`]s and produces:
//! - updated bookkeeping (dependencies, exclusion slots, vital barrier,
//!   worker capacity)
//! - a list of [`CoreCommand`]s describing what the async shell should do
//!
//! The shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - watching dependencies and evaluating conditions
//! - dispatching admitted tasks to the executor
//! - running `did_finish` observers and finish waiters
//!
//! The core never calls user code and owns no channels, so it can be driven
//! step by step in tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::engine::event_handlers::{
    handle_cancel_all, handle_cancelled, handle_conditions_evaluated,
    handle_dependency_finished, handle_enqueued, handle_finalized,
    handle_finish_requested, CoreStep,
};
use crate::engine::exclusion::ExclusionCoordinator;
use crate::engine::vital::VitalBarrier;
use crate::engine::{RuntimeEvent, SchedulerOptions};
use crate::task::Task;
use crate::types::TaskId;

/// Where a task is in the scheduler's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    WaitingForDependencies,
    EvaluatingConditions,
    AwaitingAdmission,
    Executing,
    /// Work is done (or was skipped); waiting for produced tasks.
    Finishing,
    /// `Finalize` was emitted; waiting for the shell's `Finalized`.
    Finalizing,
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub task: Task,
    /// Enqueue sequence number.
    pub seq: u64,
    /// Vital barrier position; a produced task shares its producer's.
    pub position: u64,
    pub vital: bool,
    pub categories: BTreeSet<String>,
    pub unfinished_dependencies: HashSet<TaskId>,
    pub phase: Phase,
    pub producer: Option<TaskId>,
    /// Produced tasks that have not finished yet.
    pub children: HashSet<TaskId>,
    /// Whether the task counts against worker capacity.
    pub holds_worker: bool,
}

/// Pure scheduler state for one [`Scheduler`](super::Scheduler).
///
/// After `Shutdown` the core keeps serving the tasks it owns (and the tasks
/// they produce) and asks the loop to stop once it is idle.
#[derive(Debug)]
pub struct SchedulerCore {
    pub(crate) entries: HashMap<TaskId, Entry>,
    pub(crate) next_seq: u64,
    /// Ready tasks not yet admitted, keyed by sequence number.
    pub(crate) awaiting_admission: BTreeMap<u64, TaskId>,
    pub(crate) exclusion: ExclusionCoordinator,
    pub(crate) vital: VitalBarrier,
    pub(crate) running: usize,
    pub(crate) options: SchedulerOptions,
    /// Set by `Shutdown`; the loop stops once nothing is left.
    pub(crate) closing: bool,
}

impl SchedulerCore {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            awaiting_admission: BTreeMap::new(),
            exclusion: ExclusionCoordinator::new(),
            vital: VitalBarrier::new(),
            running: 0,
            options,
            closing: false,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Tasks owned by the scheduler that have not been finalized.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Tasks currently occupying worker capacity.
    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.contains_key(&task)
    }

    pub fn exclusion(&self) -> &ExclusionCoordinator {
        &self.exclusion
    }

    pub fn vital_barrier(&self) -> &VitalBarrier {
        &self.vital
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let mut step = match event {
            RuntimeEvent::Enqueued { task, producer } => handle_enqueued(self, task, producer),
            RuntimeEvent::DependencyFinished { task, dependency } => {
                handle_dependency_finished(self, task, dependency)
            }
            RuntimeEvent::ConditionsEvaluated { task, errors } => {
                handle_conditions_evaluated(self, task, errors)
            }
            RuntimeEvent::Cancelled { task } => handle_cancelled(self, task),
            RuntimeEvent::FinishRequested { task } => handle_finish_requested(self, task),
            RuntimeEvent::Finalized { task } => handle_finalized(self, task),
            RuntimeEvent::CancelAll => handle_cancel_all(self),
            RuntimeEvent::Shutdown => {
                self.closing = true;
                CoreStep {
                    commands: Vec::new(),
                    keep_running: true,
                }
            }
        };

        if self.closing && self.is_idle() {
            step.keep_running = false;
        }
        step
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}
