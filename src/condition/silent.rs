// src/condition/silent.rs

use crate::condition::{Condition, ConditionCompletion};
use crate::task::Task;

/// Evaluates the wrapped condition but never generates its dependency.
///
/// Useful when the inner condition's dependency has side effects (asking
/// for a permission, logging in) and only a silent check is wanted.
#[derive(Debug, Clone)]
pub struct SilentCondition<C> {
    condition: C,
}

impl<C: Condition> SilentCondition<C> {
    pub fn new(condition: C) -> Self {
        Self { condition }
    }

    pub fn inner(&self) -> &C {
        &self.condition
    }
}

impl<C: Condition> Condition for SilentCondition<C> {
    fn name(&self) -> String {
        format!("Silent<{}>", self.condition.name())
    }

    fn generated_dependency(&self, _task: &Task) -> Option<Task> {
        None
    }

    fn evaluate(&self, task: &Task, completion: ConditionCompletion) {
        self.condition.evaluate(task, completion);
    }
}
