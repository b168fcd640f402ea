// tests/vital.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskqueue::engine::{Scheduler, SchedulerOptions};
use taskqueue::task::{BlockWork, Task};
use taskqueue_test_utils::event_log::{finished_ok, started};
use taskqueue_test_utils::{init_tracing, settle, with_timeout, EventLog};

fn scheduler(name: &str) -> Scheduler {
    Scheduler::new(SchedulerOptions::named(name)).expect("scheduler")
}

fn logging_task(name: String, index: usize, order: &Arc<Mutex<Vec<usize>>>) -> Task {
    let order = Arc::clone(order);
    Task::named(
        name,
        BlockWork::from_fn(move || {
            // Later tasks finish faster, so any reordering would show.
            std::thread::sleep(Duration::from_millis(2 * (6 - index.min(5)) as u64));
            order.lock().unwrap().push(index);
        }),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn vital_tasks_run_in_enqueue_order_and_hold_back_later_tasks() {
    init_tracing();
    let scheduler = scheduler("vital-order");
    let log = EventLog::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let vitals: Vec<Task> = (0..6)
        .map(|i| {
            let task = logging_task(format!("v{i}"), i, &order);
            task.set_vital(true).unwrap();
            log.attach(&task);
            task
        })
        .collect();
    let normal = Task::named("n", BlockWork::from_fn(|| {}));
    log.attach(&normal);

    scheduler.enqueue_all(&vitals).unwrap();
    scheduler.enqueue(&normal).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    let v5_finished = log.position(&finished_ok("v5")).unwrap();
    let n_started = log.position(&started("n")).unwrap();
    assert!(v5_finished < n_started);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_enqueued_before_a_vital_task_are_not_held_back() {
    init_tracing();
    let scheduler = scheduler("vital-earlier");
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    // Enqueued first; blocks until the vital task is known to be running.
    let earlier = Task::named(
        "earlier",
        BlockWork::from_fn(move || {
            release_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("vital task should run while `earlier` is still running");
        }),
    );
    let vital = Task::named(
        "vital",
        BlockWork::from_fn(move || {
            release_tx.send(()).unwrap();
        }),
    );
    vital.set_vital(true).unwrap();

    scheduler.enqueue_all([&earlier, &vital]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    assert!(earlier.errors().is_empty());
    assert!(vital.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn vital_task_may_produce_work() {
    init_tracing();
    let scheduler = scheduler("vital-produce");
    let log = EventLog::new();

    let producer = {
        let log = log.clone();
        Task::named(
            "vital",
            BlockWork::new(move |ctx| {
                let child = Task::named("child", BlockWork::from_fn(|| {}));
                log.attach(&child);
                ctx.produce(child).unwrap();
                ctx.finish().unwrap();
            }),
        )
    };
    producer.set_vital(true).unwrap();
    log.attach(&producer);

    let later = Task::named("later", BlockWork::from_fn(|| {}));
    log.attach(&later);

    scheduler.enqueue_all([&producer, &later]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    let child_finished = log.position(&finished_ok("child")).unwrap();
    let vital_finished = log.position(&finished_ok("vital")).unwrap();
    let later_started = log.position(&started("later")).unwrap();
    assert!(child_finished < vital_finished);
    assert!(vital_finished < later_started);
}

#[tokio::test(flavor = "multi_thread")]
async fn vital_task_may_depend_on_a_later_enqueued_task() {
    init_tracing();
    let scheduler = scheduler("vital-late-dependency");

    let dependency = Task::named("dependency", BlockWork::from_fn(|| {}));
    let vital = Task::named("vital", BlockWork::from_fn(|| {}));
    vital.set_vital(true).unwrap();
    vital.add_dependency(&dependency).unwrap();

    scheduler.enqueue(&vital).unwrap();
    scheduler.enqueue(&dependency).unwrap();
    with_timeout(vital.finished()).await;

    assert!(dependency.is_finished());
    assert!(vital.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn schedulers_keep_separate_barriers() {
    init_tracing();
    let first = scheduler("first");
    let second = scheduler("second");
    let (ctx_tx, ctx_rx) = tokio::sync::oneshot::channel();

    let stuck = Task::named(
        "stuck-vital",
        BlockWork::new(move |ctx| {
            let _ = ctx_tx.send(ctx);
        }),
    );
    stuck.set_vital(true).unwrap();
    first.enqueue(&stuck).unwrap();
    let stuck_ctx = with_timeout(ctx_rx).await.unwrap();

    let other = Task::from_fn(|| {});
    second.enqueue(&other).unwrap();
    with_timeout(other.finished()).await;

    stuck_ctx.finish().unwrap();
    with_timeout(first.wait_until_idle()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn vital_child_goes_ahead_of_later_task_in_same_category() {
    init_tracing();
    let scheduler = scheduler("vital-child-category");
    let log = EventLog::new();
    let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

    let vital = {
        let log = log.clone();
        Task::named(
            "vital",
            BlockWork::new(move |ctx| {
                go_rx.recv_timeout(Duration::from_secs(5)).unwrap();
                let child = Task::named("child", BlockWork::from_fn(|| {}));
                child.set_mutually_exclusive("x").unwrap();
                log.attach(&child);
                ctx.produce(child).unwrap();
                ctx.finish().unwrap();
            }),
        )
    };
    vital.set_vital(true).unwrap();
    log.attach(&vital);

    let later = Task::named("later", BlockWork::from_fn(|| {}));
    later.set_mutually_exclusive("x").unwrap();
    log.attach(&later);

    scheduler.enqueue_all([&vital, &later]).unwrap();
    // `later` is already waiting for "x" when the child shows up.
    settle().await;
    go_tx.send(()).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    let child_finished = log.position(&finished_ok("child")).unwrap();
    let vital_finished = log.position(&finished_ok("vital")).unwrap();
    let later_started = log.position(&started("later")).unwrap();
    assert!(child_finished < vital_finished);
    assert!(vital_finished < later_started);
}

#[tokio::test(flavor = "multi_thread")]
async fn late_dependency_of_vital_task_goes_ahead_in_its_category() {
    init_tracing();
    let scheduler = scheduler("vital-dependency-category");
    let log = EventLog::new();

    let vital = Task::named("vital", BlockWork::from_fn(|| {}));
    let middle = Task::named("middle", BlockWork::from_fn(|| {}));
    let dependency = Task::named("dependency", BlockWork::from_fn(|| {}));
    vital.set_vital(true).unwrap();
    vital.add_dependency(&dependency).unwrap();
    middle.set_mutually_exclusive("x").unwrap();
    dependency.set_mutually_exclusive("x").unwrap();
    for task in [&vital, &middle, &dependency] {
        log.attach(task);
    }

    scheduler.enqueue_all([&vital, &middle, &dependency]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    let dependency_finished = log.position(&finished_ok("dependency")).unwrap();
    let vital_finished = log.position(&finished_ok("vital")).unwrap();
    let middle_started = log.position(&started("middle")).unwrap();
    assert!(dependency_finished < vital_finished);
    assert!(vital_finished < middle_started);
}
