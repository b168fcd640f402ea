use std::sync::{Arc, Mutex};

use taskqueue::errors::TaskError;
use taskqueue::observer::Observer;
use taskqueue::task::Task;

/// One observed lifecycle event, by task name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Enqueued(String),
    Started(String),
    Produced { task: String, produced: String },
    Finished { task: String, errors: usize },
}

/// Shared, ordered record of lifecycle events across many tasks.
///
/// Clone it into as many tasks as needed; all clones append to the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this log to `task` as an observer.
    pub fn attach(&self, task: &Task) {
        task.add_observer(self.clone())
            .expect("attach observer before the task finishes");
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Names of started tasks, in start order.
    pub fn starts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Names of finished tasks, in finish order.
    pub fn finishes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished { task, .. } => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Observer for EventLog {
    fn did_enqueue(&self, task: &Task) {
        self.push(Event::Enqueued(task.name().to_string()));
    }

    fn did_start(&self, task: &Task) {
        self.push(Event::Started(task.name().to_string()));
    }

    fn did_produce(&self, task: &Task, produced: &Task) {
        self.push(Event::Produced {
            task: task.name().to_string(),
            produced: produced.name().to_string(),
        });
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        self.push(Event::Finished {
            task: task.name().to_string(),
            errors: errors.len(),
        });
    }
}

/// Finished event with no errors.
pub fn finished_ok(name: &str) -> Event {
    Event::Finished {
        task: name.to_string(),
        errors: 0,
    }
}

pub fn started(name: &str) -> Event {
    Event::Started(name.to_string())
}
