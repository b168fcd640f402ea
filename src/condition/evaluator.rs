// src/condition/evaluator.rs

//! Runs every condition of a task and aggregates the outcome.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, warn};

use crate::condition::{Condition, ConditionResult};
use crate::errors::TaskError;
use crate::task::Task;

type OnDone = Box<dyn FnOnce(Vec<TaskError>) + Send>;

/// Shared state of one task's condition evaluation.
struct Evaluation {
    task_name: String,
    names: Vec<String>,
    results: Mutex<Vec<Option<ConditionResult>>>,
    remaining: AtomicUsize,
    on_done: Mutex<Option<OnDone>>,
}

impl Evaluation {
    fn record(&self, index: usize, result: ConditionResult) {
        {
            let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
            results[index] = Some(result);
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete();
        }
    }

    fn complete(&self) {
        let errors: Vec<TaskError> = {
            let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
            results
                .drain(..)
                .flatten()
                .filter_map(|result| match result {
                    ConditionResult::Satisfied => None,
                    ConditionResult::Failed(err) => Some(err),
                })
                .collect()
        };

        debug!(
            task = %self.task_name,
            failed = errors.len(),
            "all conditions reported"
        );

        let on_done = self
            .on_done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_done) = on_done {
            on_done(errors);
        }
    }
}

/// One-shot reporter handed to [`Condition::evaluate`].
///
/// `complete` consumes the completion, so a condition reports at most once.
/// Dropping it without reporting counts as a failure, so the task never
/// waits forever on a condition that lost its completion.
pub struct ConditionCompletion {
    evaluation: Option<Arc<Evaluation>>,
    index: usize,
}

impl ConditionCompletion {
    pub fn complete(mut self, result: ConditionResult) {
        if let Some(evaluation) = self.evaluation.take() {
            evaluation.record(self.index, result);
        }
    }

    pub fn satisfied(self) {
        self.complete(ConditionResult::Satisfied);
    }

    pub fn fail(self, error: TaskError) {
        self.complete(ConditionResult::Failed(error));
    }
}

impl Drop for ConditionCompletion {
    fn drop(&mut self) {
        if let Some(evaluation) = self.evaluation.take() {
            let name = evaluation.names[self.index].clone();
            warn!(
                task = %evaluation.task_name,
                condition = %name,
                "condition dropped its completion without reporting"
            );
            evaluation.record(
                self.index,
                ConditionResult::Failed(TaskError::condition(
                    name,
                    "completion dropped without a result",
                )),
            );
        }
    }
}

/// Evaluate every condition of `task` (no short-circuit) and call `on_done`
/// exactly once with the failures in registration order.
pub(crate) fn evaluate_all(
    task: &Task,
    conditions: Vec<Arc<dyn Condition>>,
    on_done: impl FnOnce(Vec<TaskError>) + Send + 'static,
) {
    if conditions.is_empty() {
        on_done(Vec::new());
        return;
    }

    let names: Vec<String> = conditions.iter().map(|c| c.name()).collect();
    debug!(task = %task.name(), conditions = ?names, "evaluating conditions");

    let evaluation = Arc::new(Evaluation {
        task_name: task.name().to_string(),
        results: Mutex::new(vec![None; conditions.len()]),
        remaining: AtomicUsize::new(conditions.len()),
        on_done: Mutex::new(Some(Box::new(on_done))),
        names,
    });

    for (index, condition) in conditions.iter().enumerate() {
        let completion = ConditionCompletion {
            evaluation: Some(Arc::clone(&evaluation)),
            index,
        };

        // A panicking condition drops its completion, which records a failure.
        if catch_unwind(AssertUnwindSafe(|| condition.evaluate(task, completion))).is_err() {
            error!(
                task = %task.name(),
                condition = %condition.name(),
                "condition panicked during evaluation"
            );
        }
    }
}
