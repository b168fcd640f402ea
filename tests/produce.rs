// tests/produce.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskqueue::engine::{Scheduler, SchedulerOptions};
use taskqueue::errors::TaskError;
use taskqueue::task::{BlockWork, Task, TaskState};
use taskqueue_test_utils::event_log::finished_ok;
use taskqueue_test_utils::{init_tracing, with_timeout, Event, EventLog};

fn scheduler(name: &str) -> Scheduler {
    Scheduler::new(SchedulerOptions::named(name)).expect("scheduler")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn producer_finishes_after_everything_it_produced() {
    init_tracing();
    let scheduler = scheduler("produce");
    let log = EventLog::new();

    let producer = {
        let log = log.clone();
        Task::named(
            "producer",
            BlockWork::new(move |ctx| {
                for i in 0..3 {
                    let child = Task::named(
                        format!("child-{i}"),
                        BlockWork::from_fn(|| std::thread::sleep(Duration::from_millis(10))),
                    );
                    log.attach(&child);
                    ctx.produce(child).unwrap();
                }
                ctx.finish().unwrap();
            }),
        )
    };
    log.attach(&producer);

    scheduler.enqueue(&producer).unwrap();
    with_timeout(producer.finished()).await;

    let producer_finished = log.position(&finished_ok("producer")).unwrap();
    for i in 0..3 {
        let child = format!("child-{i}");
        let produced = log
            .position(&Event::Produced {
                task: "producer".to_string(),
                produced: child.clone(),
            })
            .unwrap();
        let child_finished = log.position(&finished_ok(&child)).unwrap();
        assert!(produced < child_finished);
        assert!(child_finished < producer_finished);
    }
    assert_eq!(scheduler.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_production_is_waited_for() {
    init_tracing();
    let scheduler = scheduler("nested");
    let leaves = Arc::new(AtomicUsize::new(0));

    let root = {
        let leaves = Arc::clone(&leaves);
        Task::named(
            "root",
            BlockWork::new(move |ctx| {
                let middle = Task::named(
                    "middle",
                    BlockWork::new(move |ctx| {
                        let leaf = Task::named(
                            "leaf",
                            BlockWork::from_fn(move || {
                                std::thread::sleep(Duration::from_millis(20));
                                leaves.fetch_add(1, Ordering::SeqCst);
                            }),
                        );
                        ctx.produce(leaf).unwrap();
                        ctx.finish().unwrap();
                    }),
                );
                ctx.produce(middle).unwrap();
                ctx.finish().unwrap();
            }),
        )
    };

    scheduler.enqueue(&root).unwrap();
    with_timeout(root.finished()).await;
    assert_eq!(leaves.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn producing_an_enqueued_task_is_rejected() {
    init_tracing();
    let scheduler = scheduler("produce-twice");
    let outcome = Arc::new(std::sync::Mutex::new(None));

    let existing = Task::named("existing", BlockWork::from_fn(|| {}));
    scheduler.enqueue(&existing).unwrap();

    let producer = {
        let existing = existing.clone();
        let outcome = Arc::clone(&outcome);
        Task::from_block(move |ctx| {
            *outcome.lock().unwrap() = Some(ctx.produce(existing));
            ctx.finish().unwrap();
        })
    };

    scheduler.enqueue(&producer).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    assert!(matches!(
        outcome.lock().unwrap().take(),
        Some(Err(taskqueue::errors::UsageError::AlreadyEnqueued { .. }))
    ));
    assert_eq!(producer.state(), TaskState::Finished);
}

#[tokio::test(flavor = "multi_thread")]
async fn produced_task_failure_stays_local() {
    init_tracing();
    let scheduler = scheduler("local-errors");

    let producer = Task::from_block(|ctx| {
        let child = Task::named(
            "failing-child",
            BlockWork::from_fallible(|| anyhow::bail!("child failed")),
        );
        ctx.produce(child).unwrap();
        ctx.finish().unwrap();
    });

    scheduler.enqueue(&producer).unwrap();
    with_timeout(producer.finished()).await;
    assert!(producer.errors().is_empty());
    assert!(!producer.errors().iter().any(TaskError::is_dependency_failure));
}
