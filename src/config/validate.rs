// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{GraphFile, RawGraphFile, TaskConfig};
use crate::errors::{Result, TaskqueueError};

use std::collections::BTreeMap;

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = TaskqueueError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(GraphFile::new_unchecked(raw.scheduler, raw.task))
    }
}

fn validate_raw_config(cfg: &RawGraphFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_commands(cfg)?;
    validate_task_dependencies(cfg)?;
    topological_order(&cfg.task)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawGraphFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskqueueError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_commands(cfg: &RawGraphFile) -> Result<()> {
    for (name, task) in &cfg.task {
        if task.cmd.trim().is_empty() {
            return Err(TaskqueueError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawGraphFile) -> Result<()> {
    for (name, task) in &cfg.task {
        for dep in &task.after {
            if dep == name {
                return Err(TaskqueueError::ConfigError(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(TaskqueueError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

/// Task names ordered so that every task comes after its `after` entries.
///
/// Edge direction: dep -> task, so `[task.B] after = ["A"]` adds `A -> B`.
/// Fails with [`TaskqueueError::DagCycle`] if the graph has a cycle.
pub fn topological_order(tasks: &BTreeMap<String, TaskConfig>) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks {
        for dep in &task.after {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(TaskqueueError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
