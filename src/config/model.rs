// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::engine::{default_scheduler_name, SchedulerOptions};

/// Task graph as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// name = "build"
/// max_concurrent = 4
///
/// [task.fetch]
/// cmd = "curl -sO https://example.com/src.tar.gz"
/// exclusive = ["network"]
///
/// [task.build]
/// cmd = "make"
/// after = ["fetch"]
/// expect_success = true
/// ```
///
/// All sections except `[task.<name>]` are optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGraphFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Keys are the task names.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated task graph.
///
/// Only obtainable through `TryFrom<RawGraphFile>` (see
/// [`validate`](super::validate)), so every `after` reference resolves and
/// the graph is acyclic.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub scheduler: SchedulerSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { scheduler, task }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    #[serde(default = "default_scheduler_name")]
    pub name: String,

    /// `0` means unbounded.
    #[serde(default)]
    pub max_concurrent: usize,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            name: default_scheduler_name(),
            max_concurrent: 0,
        }
    }
}

impl SchedulerSection {
    pub fn to_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            name: self.name.clone(),
            max_concurrent: self.max_concurrent,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Tasks that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// If true, every `after` edge also requires the dependency to succeed.
    #[serde(default)]
    pub expect_success: bool,

    #[serde(default)]
    pub vital: bool,

    /// Mutual exclusion categories.
    #[serde(default)]
    pub exclusive: Vec<String>,

    #[serde(default)]
    pub conditions: Vec<ConditionKind>,

    /// Wrap every listed condition in a `SilentCondition`.
    #[serde(default)]
    pub silent: bool,
}

/// Built-in conditions selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    NoCancelledDependencies,
    NoFailedDependencies,
}
