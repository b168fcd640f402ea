// src/lib.rs

pub mod cli;
pub mod condition;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod observer;
pub mod task;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::condition::{Condition, NoCancelledDependencies, NoFailedDependencies, SilentCondition};
use crate::config::model::{ConditionKind, GraphFile};
use crate::config::validate::topological_order;
use crate::config::load_and_validate;
use crate::engine::Scheduler;
use crate::errors::TaskError;
use crate::exec::CommandWork;
use crate::observer::LogObserver;
use crate::task::Task;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph loading and validation
/// - task construction (one `CommandWork` task per `[task.<name>]`)
/// - the scheduler
/// - Ctrl-C handling (cancels every task)
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(RunSummary::default());
    }

    let mut options = cfg.scheduler.to_options();
    if let Some(max_concurrent) = args.max_concurrent {
        options.max_concurrent = max_concurrent;
    }

    let scheduler = Scheduler::new(options)?;
    let tasks = build_tasks(&cfg)?;

    // Ctrl-C → cancel everything; running commands are killed.
    {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            warn!("Ctrl+C received; cancelling all tasks");
            scheduler.cancel_all();
        });
    }

    info!(tasks = tasks.len(), scheduler = %scheduler.name(), "enqueueing task graph");
    scheduler.enqueue_all(tasks.iter().map(|(_, task)| task))?;
    scheduler.shutdown().await?;

    let summary = RunSummary::from_tasks(&tasks);
    summary.print();
    Ok(summary)
}

/// Build one task per graph entry, in topological order, wired with its
/// dependencies, conditions, exclusion categories and vital flag.
pub fn build_tasks(cfg: &GraphFile) -> Result<Vec<(String, Task)>> {
    let order = topological_order(&cfg.task)?;
    let mut built: Vec<(String, Task)> = Vec::with_capacity(order.len());

    for name in order {
        let Some(spec) = cfg.task.get(&name) else {
            continue;
        };

        let task = Task::named(name.clone(), CommandWork::new(name.clone(), spec.cmd.clone()));

        for dep in &spec.after {
            let Some((_, dependency)) = built.iter().find(|(n, _)| n == dep) else {
                continue;
            };
            if spec.expect_success {
                task.add_dependency_expecting_success(dependency)?;
            } else {
                task.add_dependency(dependency)?;
            }
        }

        for kind in &spec.conditions {
            let condition: Arc<dyn Condition> = match (kind, spec.silent) {
                (ConditionKind::NoCancelledDependencies, false) => {
                    Arc::new(NoCancelledDependencies::new())
                }
                (ConditionKind::NoCancelledDependencies, true) => {
                    Arc::new(SilentCondition::new(NoCancelledDependencies::new()))
                }
                (ConditionKind::NoFailedDependencies, false) => {
                    Arc::new(NoFailedDependencies::new())
                }
                (ConditionKind::NoFailedDependencies, true) => {
                    Arc::new(SilentCondition::new(NoFailedDependencies::new()))
                }
            };
            task.add_shared_condition(condition)?;
        }

        for category in &spec.exclusive {
            task.set_mutually_exclusive(category.as_str())?;
        }
        task.set_vital(spec.vital)?;
        task.add_observer(LogObserver::new(cfg.scheduler.name.clone()))?;

        debug!(task = %name, deps = spec.after.len(), "built task");
        built.push((name, task));
    }

    Ok(built)
}

/// Outcome of a CLI run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    /// Tasks that finished with errors, with the rendered errors.
    pub failed: Vec<(String, Vec<String>)>,
    pub cancelled: Vec<String>,
}

impl RunSummary {
    pub fn from_tasks(tasks: &[(String, Task)]) -> Self {
        let mut summary = Self::default();
        for (name, task) in tasks {
            let errors = task.errors();
            if task.is_cancelled() && errors.iter().all(is_cancellation_marker) {
                summary.cancelled.push(name.clone());
            } else if errors.is_empty() {
                summary.succeeded.push(name.clone());
            } else {
                let rendered = errors.iter().map(ToString::to_string).collect();
                summary.failed.push((name.clone(), rendered));
            }
        }
        summary
    }

    /// True when no task failed or was cancelled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    pub fn print(&self) {
        println!(
            "taskqueue: {} succeeded, {} failed, {} cancelled",
            self.succeeded.len(),
            self.failed.len(),
            self.cancelled.len()
        );
        for (name, errors) in &self.failed {
            println!("  failed: {name}");
            for error in errors {
                println!("      {error}");
            }
        }
        for name in &self.cancelled {
            println!("  cancelled: {name}");
        }
    }
}

fn is_cancellation_marker(error: &TaskError) -> bool {
    matches!(error, TaskError::Cancelled(_)) || error.is_dependency_cancellation()
}

/// Dry-run output: print the graph in execution order.
fn print_dry_run(cfg: &GraphFile) -> Result<()> {
    println!("taskqueue dry-run");
    println!("  scheduler.name = {:?}", cfg.scheduler.name);
    println!("  scheduler.max_concurrent = {}", cfg.scheduler.max_concurrent);
    println!();

    let order = topological_order(&cfg.task)?;
    println!("tasks ({}):", order.len());
    for name in order {
        let Some(task) = cfg.task.get(&name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if task.expect_success {
            println!("      expect_success: true");
        }
        if task.vital {
            println!("      vital: true");
        }
        if !task.exclusive.is_empty() {
            println!("      exclusive: {:?}", task.exclusive);
        }
        if !task.conditions.is_empty() {
            println!("      conditions: {:?} (silent: {})", task.conditions, task.silent);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
