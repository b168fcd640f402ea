// src/observer/block.rs

use std::fmt;

use crate::errors::TaskError;
use crate::observer::Observer;
use crate::task::Task;

type TaskHandler = Box<dyn Fn(&Task) + Send + Sync>;
type ProduceHandler = Box<dyn Fn(&Task, &Task) + Send + Sync>;
type FinishHandler = Box<dyn Fn(&Task, &[TaskError]) + Send + Sync>;

/// Adapts closures into an [`Observer`].
///
/// Several handlers may be attached for the same event; they run in the
/// order they were added.
#[derive(Default)]
pub struct BlockObserver {
    enqueue: Vec<TaskHandler>,
    start: Vec<TaskHandler>,
    produce: Vec<ProduceHandler>,
    finish: Vec<FinishHandler>,
}

impl BlockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enqueue(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.enqueue.push(Box::new(f));
        self
    }

    pub fn on_start(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.start.push(Box::new(f));
        self
    }

    pub fn on_produce(mut self, f: impl Fn(&Task, &Task) + Send + Sync + 'static) -> Self {
        self.produce.push(Box::new(f));
        self
    }

    /// Called on every finish, with the task's errors (possibly empty).
    pub fn on_finish(mut self, f: impl Fn(&Task, &[TaskError]) + Send + Sync + 'static) -> Self {
        self.finish.push(Box::new(f));
        self
    }

    /// Called when the task finishes without errors.
    pub fn on_success(self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.on_finish(move |task, errors| {
            if errors.is_empty() {
                f(task)
            }
        })
    }

    /// Called when the task finishes with at least one error.
    pub fn on_fail(self, f: impl Fn(&Task, &[TaskError]) + Send + Sync + 'static) -> Self {
        self.on_finish(move |task, errors| {
            if !errors.is_empty() {
                f(task, errors)
            }
        })
    }
}

impl Observer for BlockObserver {
    fn did_enqueue(&self, task: &Task) {
        self.enqueue.iter().for_each(|f| f(task));
    }

    fn did_start(&self, task: &Task) {
        self.start.iter().for_each(|f| f(task));
    }

    fn did_produce(&self, task: &Task, produced: &Task) {
        self.produce.iter().for_each(|f| f(task, produced));
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        self.finish.iter().for_each(|f| f(task, errors));
    }
}

impl fmt::Debug for BlockObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockObserver")
            .field("enqueue", &self.enqueue.len())
            .field("start", &self.start.len())
            .field("produce", &self.produce.len())
            .field("finish", &self.finish.len())
            .finish()
    }
}
