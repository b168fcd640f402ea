// src/task/mod.rs

//! A single unit of work and its lifecycle state machine.
//!
//! - [`Task`] is a cheap, cloneable handle; clones refer to the same task
//!   (reference identity).
//! - [`state`] defines [`TaskState`] and its transition table.
//! - [`work`] defines the [`Work`] a task runs, plus the [`BlockWork`] adapter.
//! - [`context`] is the handle work uses to finish or produce tasks.
//!
//! All mutation happens behind a per-task mutex. User code (conditions,
//! observers, work) is never invoked while that mutex is held.

pub mod context;
pub mod state;
pub mod work;

pub use context::TaskContext;
pub use state::TaskState;
pub use work::{BlockWork, Work};

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::condition::{Condition, DependencySucceeded};
use crate::engine::{RuntimeEvent, Submitter};
use crate::errors::{TaskError, UsageError};
use crate::observer::{BlockObserver, Observer};
use crate::types::{ExclusivityCategory, TaskId};

/// Callback run exactly once when a task reaches `Finished`.
pub(crate) type FinishWaiter = Box<dyn FnOnce() + Send>;

/// Handle to a unit of work scheduled on a [`Scheduler`](crate::engine::Scheduler).
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    name: String,
    core: Mutex<TaskCore>,
    finished: watch::Sender<bool>,
    cancelled: watch::Sender<bool>,
}

struct TaskCore {
    state: TaskState,
    cancelled: bool,
    vital: bool,
    categories: BTreeSet<String>,
    dependencies: Vec<Task>,
    conditions: Vec<Arc<dyn Condition>>,
    observers: Vec<Arc<dyn Observer>>,
    errors: Vec<TaskError>,
    work: Option<Box<dyn Work>>,
    finish_waiters: Vec<FinishWaiter>,
    /// Set once the task is enqueued; dropped when it finishes.
    submitter: Option<Submitter>,
}

/// What the scheduler needs to know to track and admit a task.
pub(crate) struct AdmissionProfile {
    pub vital: bool,
    pub categories: BTreeSet<String>,
    pub dependencies: Vec<Task>,
}

/// Everything needed to announce a finished task, taken under the lock.
pub(crate) struct Completion {
    pub observers: Vec<Arc<dyn Observer>>,
    pub errors: Vec<TaskError>,
    pub waiters: Vec<FinishWaiter>,
}

impl Task {
    /// Create a task running `work`, named after its id.
    pub fn new(work: impl Work) -> Self {
        let id = TaskId::next();
        Self::build(id, format!("task-{}", id.as_u64()), Box::new(work))
    }

    /// Create a task with a human-readable name used in logs.
    pub fn named(name: impl Into<String>, work: impl Work) -> Self {
        Self::build(TaskId::next(), name.into(), Box::new(work))
    }

    /// Task running a plain closure; finishes as soon as the closure returns.
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Self::new(BlockWork::from_fn(f))
    }

    /// Task running a closure that must finish the task through its context.
    pub fn from_block(f: impl FnOnce(TaskContext) + Send + 'static) -> Self {
        Self::new(BlockWork::new(f))
    }

    fn build(id: TaskId, name: String, work: Box<dyn Work>) -> Self {
        let (finished, _) = watch::channel(false);
        let (cancelled, _) = watch::channel(false);

        Self {
            inner: Arc::new(TaskInner {
                id,
                name,
                core: Mutex::new(TaskCore {
                    state: TaskState::Initialized,
                    cancelled: false,
                    vital: false,
                    categories: BTreeSet::new(),
                    dependencies: Vec::new(),
                    conditions: Vec::new(),
                    observers: Vec::new(),
                    errors: Vec::new(),
                    work: Some(work),
                    finish_waiters: Vec::new(),
                    submitter: None,
                }),
                finished,
                cancelled,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskCore> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.lock().state.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn is_vital(&self) -> bool {
        self.lock().vital
    }

    /// Errors accumulated so far, in the order they were recorded.
    pub fn errors(&self) -> Vec<TaskError> {
        self.lock().errors.clone()
    }

    pub fn dependencies(&self) -> Vec<Task> {
        self.lock().dependencies.clone()
    }

    /// Exclusivity categories in acquisition (lexicographic) order.
    pub fn exclusivity_categories(&self) -> Vec<String> {
        self.lock().categories.iter().cloned().collect()
    }

    fn ensure_mutable(&self, core: &TaskCore) -> Result<(), UsageError> {
        if core.state.is_mutable() {
            Ok(())
        } else {
            warn!(
                task = %self.name(),
                task_id = %self.id(),
                state = ?core.state,
                "attempt to modify a task after it was enqueued"
            );
            Err(UsageError::NotMutable {
                task: self.id(),
                state: core.state,
            })
        }
    }

    /// Make this task wait until `dependency` is finished.
    pub fn add_dependency(&self, dependency: &Task) -> Result<(), UsageError> {
        if dependency == self {
            return Err(UsageError::SelfDependency { task: self.id() });
        }

        let mut core = self.lock();
        self.ensure_mutable(&core)?;
        push_unique(&mut core.dependencies, dependency);
        Ok(())
    }

    /// Like [`add_dependency`](Self::add_dependency), and additionally fail
    /// this task (without running its work) unless `dependency` finished
    /// without errors and without being cancelled.
    pub fn add_dependency_expecting_success(&self, dependency: &Task) -> Result<(), UsageError> {
        if dependency == self {
            return Err(UsageError::SelfDependency { task: self.id() });
        }

        let mut core = self.lock();
        self.ensure_mutable(&core)?;
        push_unique(&mut core.dependencies, dependency);
        core.conditions
            .push(Arc::new(DependencySucceeded::new(dependency.clone())));
        Ok(())
    }

    pub fn add_dependencies<'a>(
        &self,
        dependencies: impl IntoIterator<Item = &'a Task>,
    ) -> Result<(), UsageError> {
        for dependency in dependencies {
            self.add_dependency(dependency)?;
        }
        Ok(())
    }

    /// Attach a precondition, evaluated after every dependency finished.
    pub fn add_condition(&self, condition: impl Condition) -> Result<(), UsageError> {
        self.add_shared_condition(Arc::new(condition))
    }

    /// Attach a condition that may also be shared with other tasks.
    pub fn add_shared_condition(&self, condition: Arc<dyn Condition>) -> Result<(), UsageError> {
        let mut core = self.lock();
        self.ensure_mutable(&core)?;
        core.conditions.push(condition);
        Ok(())
    }

    /// Vital tasks run in enqueue order and hold back every task enqueued
    /// after them until they finish.
    pub fn set_vital(&self, vital: bool) -> Result<(), UsageError> {
        let mut core = self.lock();
        self.ensure_mutable(&core)?;
        core.vital = vital;
        Ok(())
    }

    /// Never run concurrently with other tasks in `category`.
    pub fn set_mutually_exclusive<C>(&self, category: &C) -> Result<(), UsageError>
    where
        C: ExclusivityCategory + ?Sized,
    {
        let mut core = self.lock();
        self.ensure_mutable(&core)?;
        core.categories.insert(category.identifier().to_string());
        Ok(())
    }

    /// Register a lifecycle observer. Allowed until the task has finished.
    pub fn add_observer(&self, observer: impl Observer) -> Result<(), UsageError> {
        let mut core = self.lock();
        if core.state.is_finished() {
            return Err(UsageError::AlreadyFinishing { task: self.id() });
        }
        core.observers.push(Arc::new(observer));
        Ok(())
    }

    /// Attach lifecycle callbacks:
    ///
    /// ```no_run
    /// # use taskqueue::task::Task;
    /// let task = Task::from_fn(|| println!("working"));
    /// task.observe(|o| {
    ///     o.on_start(|t| println!("{} started", t.name()))
    ///         .on_fail(|t, errors| eprintln!("{} failed: {errors:?}", t.name()))
    /// })
    /// .unwrap();
    /// ```
    pub fn observe(
        &self,
        build: impl FnOnce(BlockObserver) -> BlockObserver,
    ) -> Result<(), UsageError> {
        self.add_observer(build(BlockObserver::new()))
    }

    /// Cancel the task. Work that has not started yet is skipped; conditions
    /// still run so dependents can observe the cancellation.
    pub fn cancel(&self) {
        self.cancel_inner(None);
    }

    /// Cancel the task and record `error` in its error list.
    pub fn cancel_with_error(&self, error: TaskError) {
        self.cancel_inner(Some(error));
    }

    fn cancel_inner(&self, error: Option<TaskError>) {
        let submitter = {
            let mut core = self.lock();
            if core.state.is_finished() {
                debug!(task = %self.name(), "cancel on a finished task; ignoring");
                return;
            }
            if let Some(error) = error {
                core.errors.push(error);
            }
            if core.cancelled {
                return;
            }
            core.cancelled = true;
            core.submitter.clone()
        };

        debug!(task = %self.name(), task_id = %self.id(), "task cancelled");
        self.inner.cancelled.send_replace(true);

        if let Some(submitter) = submitter {
            submitter.send(RuntimeEvent::Cancelled { task: self.id() });
        }
    }

    /// Resolve once the task reached [`TaskState::Finished`] and its
    /// `did_finish` observers ran.
    pub async fn finished(&self) {
        let mut rx = self.inner.finished.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }

    /// Resolve once the task has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancelled.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub(crate) fn conditions(&self) -> Vec<Arc<dyn Condition>> {
        self.lock().conditions.clone()
    }

    pub(crate) fn observers(&self) -> Vec<Arc<dyn Observer>> {
        self.lock().observers.clone()
    }

    pub(crate) fn admission_profile(&self) -> AdmissionProfile {
        let core = self.lock();
        AdmissionProfile {
            vital: core.vital,
            categories: core.categories.clone(),
            dependencies: core.dependencies.clone(),
        }
    }

    /// Initialized -> Pending, attaching dependencies generated by conditions.
    pub(crate) fn mark_pending(
        &self,
        generated: &[Task],
        submitter: Submitter,
    ) -> Result<(), UsageError> {
        let mut core = self.lock();
        if core.state != TaskState::Initialized {
            return Err(UsageError::AlreadyEnqueued { task: self.id() });
        }
        for dependency in generated.iter().filter(|d| *d != self) {
            push_unique(&mut core.dependencies, dependency);
        }
        core.state = TaskState::Pending;
        core.submitter = Some(submitter);
        Ok(())
    }

    /// Apply a scheduler-driven transition; invalid ones are logged and
    /// ignored.
    pub(crate) fn advance(&self, next: TaskState) -> bool {
        let mut core = self.lock();
        if core.state.can_transition_to(next) {
            debug!(
                task = %self.name(),
                from = ?core.state,
                to = ?next,
                "task state transition"
            );
            core.state = next;
            true
        } else {
            warn!(
                task = %self.name(),
                from = ?core.state,
                to = ?next,
                "rejected invalid task state transition"
            );
            false
        }
    }

    /// Record failed conditions. A task whose conditions failed counts as
    /// cancelled.
    pub(crate) fn record_condition_failures(&self, errors: Vec<TaskError>) {
        let newly_cancelled = {
            let mut core = self.lock();
            core.errors.extend(errors);
            !mem::replace(&mut core.cancelled, true)
        };
        if newly_cancelled {
            self.inner.cancelled.send_replace(true);
        }
    }

    /// Executing -> Finishing, appending errors reported by the work.
    pub(crate) fn begin_finishing(&self, errors: Vec<TaskError>) -> Result<(), UsageError> {
        let mut core = self.lock();
        if core.state != TaskState::Executing {
            warn!(
                task = %self.name(),
                state = ?core.state,
                "finish called on a task that is not executing"
            );
            return Err(UsageError::AlreadyFinishing { task: self.id() });
        }
        core.errors.extend(errors);
        core.state = TaskState::Finishing;
        Ok(())
    }

    pub(crate) fn take_work(&self) -> Option<Box<dyn Work>> {
        self.lock().work.take()
    }

    /// Register a callback for when this task finishes. If it already has,
    /// the callback is handed back for the caller to run.
    pub(crate) fn register_finish_waiter(&self, waiter: FinishWaiter) -> Option<FinishWaiter> {
        let mut core = self.lock();
        if core.state.is_finished() {
            return Some(waiter);
        }
        core.finish_waiters.push(waiter);
        None
    }

    /// Finishing -> Finished. Returns what must be announced, or `None` if
    /// the task was not finishing.
    pub(crate) fn finalize(&self) -> Option<Completion> {
        let mut core = self.lock();
        if !core.state.can_transition_to(TaskState::Finished) {
            warn!(
                task = %self.name(),
                state = ?core.state,
                "finalize called on a task that is not finishing"
            );
            return None;
        }
        core.state = TaskState::Finished;
        core.submitter = None;
        core.work = None;

        Some(Completion {
            observers: core.observers.clone(),
            errors: core.errors.clone(),
            waiters: mem::take(&mut core.finish_waiters),
        })
    }

    pub(crate) fn announce_finished(&self) {
        self.inner.finished.send_replace(true);
    }
}

fn push_unique(tasks: &mut Vec<Task>, task: &Task) {
    if !tasks.contains(task) {
        tasks.push(task.clone());
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Task");
        out.field("id", &self.inner.id).field("name", &self.inner.name);
        // try_lock: Debug may run while the task's own lock is held.
        if let Ok(core) = self.inner.core.try_lock() {
            out.field("state", &core.state);
        }
        out.finish_non_exhaustive()
    }
}
