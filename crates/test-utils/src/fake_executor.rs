use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use taskqueue::errors::Result;
use taskqueue::exec::{ExecutorBackend, Job};

/// Records the name of every dispatched task, then runs its job on the
/// blocking pool like the default executor.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    dispatched: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

impl ExecutorBackend for RecordingExecutor {
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for job in jobs {
            self.dispatched
                .lock()
                .unwrap()
                .push(job.task().name().to_string());
            tokio::task::spawn_blocking(move || job.run());
        }
        Box::pin(async { Ok(()) })
    }
}

/// Holds dispatched jobs until the test releases them, so tests can inspect
/// the scheduler while tasks are admitted but not yet running.
#[derive(Debug, Clone, Default)]
pub struct ManualExecutor {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of admitted jobs not yet released, in dispatch order.
    pub fn held(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.task().name().to_string())
            .collect()
    }

    /// Run the oldest held job on the current thread. Returns its task name.
    pub fn run_next(&self) -> Option<String> {
        let job = self.jobs.lock().unwrap().pop_front()?;
        let name = job.task().name().to_string();
        job.run();
        Some(name)
    }
}

impl ExecutorBackend for ManualExecutor {
    fn spawn_ready_tasks(
        &mut self,
        jobs: Vec<Job>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.jobs.lock().unwrap().extend(jobs);
        Box::pin(async { Ok(()) })
    }
}
