use std::collections::BTreeMap;

use taskqueue::config::{ConditionKind, GraphFile, RawGraphFile, SchedulerSection, TaskConfig};

/// Builder for `GraphFile` to simplify test setup.
pub struct GraphFileBuilder {
    raw: RawGraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawGraphFile {
                scheduler: SchedulerSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.raw.scheduler.max_concurrent = max_concurrent;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.raw.scheduler.name = name.to_string();
        self
    }

    /// The unvalidated graph, for exercising validation failures.
    pub fn build_raw(self) -> RawGraphFile {
        self.raw
    }

    pub fn build(self) -> GraphFile {
        GraphFile::try_from(self.raw).expect("Failed to build valid graph from builder")
    }
}

impl Default for GraphFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: Vec::new(),
                expect_success: false,
                vital: false,
                exclusive: Vec::new(),
                conditions: Vec::new(),
                silent: false,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn expect_success(mut self) -> Self {
        self.task.expect_success = true;
        self
    }

    pub fn vital(mut self) -> Self {
        self.task.vital = true;
        self
    }

    pub fn exclusive(mut self, category: &str) -> Self {
        self.task.exclusive.push(category.to_string());
        self
    }

    pub fn condition(mut self, kind: ConditionKind) -> Self {
        self.task.conditions.push(kind);
        self
    }

    pub fn silent(mut self) -> Self {
        self.task.silent = true;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
