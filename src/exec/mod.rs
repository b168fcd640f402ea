// src/exec/mod.rs

//! Work execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait the runtime hands
//!   admitted tasks to, the [`Job`] each admitted task becomes, and the
//!   default [`BlockingExecutor`]. Tests can swap in their own backend.
//! - [`command`] provides [`CommandWork`], work that runs a shell command
//!   with `tokio::process` and finishes the task when the process exits.

pub mod backend;
pub mod command;

pub use backend::{BlockingExecutor, ExecutorBackend, Job};
pub use command::CommandWork;
