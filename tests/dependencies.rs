// tests/dependencies.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskqueue::condition::{
    Condition, ConditionCompletion, NoCancelledDependencies, NoFailedDependencies,
    SilentCondition,
};
use taskqueue::engine::{Scheduler, SchedulerOptions};
use taskqueue::errors::TaskError;
use taskqueue::task::{BlockWork, Task, TaskState};
use taskqueue_test_utils::event_log::{finished_ok, started};
use taskqueue_test_utils::{init_tracing, with_timeout, EventLog};

fn scheduler(name: &str) -> Scheduler {
    Scheduler::new(SchedulerOptions::named(name)).expect("scheduler")
}

fn flag_task(name: &str, flag: &Arc<AtomicBool>) -> Task {
    let flag = Arc::clone(flag);
    Task::named(name, BlockWork::from_fn(move || flag.store(true, Ordering::SeqCst)))
}

fn failing_task(name: &str) -> Task {
    Task::named(name, BlockWork::from_fallible(|| anyhow::bail!("failed on purpose")))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependents_start_after_dependencies_finish() {
    init_tracing();
    let scheduler = scheduler("chain");
    let log = EventLog::new();

    let a = Task::named(
        "a",
        BlockWork::from_fn(|| std::thread::sleep(Duration::from_millis(30))),
    );
    let b = Task::named("b", BlockWork::from_fn(|| {}));
    let c = Task::named("c", BlockWork::from_fn(|| {}));
    b.add_dependency(&a).unwrap();
    c.add_dependencies([&a, &b]).unwrap();
    for task in [&a, &b, &c] {
        log.attach(task);
    }

    // Dependents first: order of enqueue must not matter.
    scheduler.enqueue_all([&c, &b, &a]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    let finished_a = log.position(&finished_ok("a")).unwrap();
    let started_b = log.position(&started("b")).unwrap();
    let finished_b = log.position(&finished_ok("b")).unwrap();
    let started_c = log.position(&started("c")).unwrap();
    assert!(finished_a < started_b);
    assert!(finished_b < started_c);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_dependency_does_not_block_by_default() {
    init_tracing();
    let scheduler = scheduler("default-propagation");
    let ran = Arc::new(AtomicBool::new(false));

    let failing = failing_task("failing");
    let dependent = flag_task("dependent", &ran);
    dependent.add_dependency(&failing).unwrap();

    scheduler.enqueue_all([&failing, &dependent]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    assert_eq!(failing.errors().len(), 1);
    assert!(ran.load(Ordering::SeqCst));
    assert!(dependent.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn expect_success_fails_dependent_without_running_it() {
    init_tracing();
    let scheduler = scheduler("expect-success");
    let ran = Arc::new(AtomicBool::new(false));

    let failing = failing_task("failing");
    let dependent = flag_task("dependent", &ran);
    dependent.add_dependency_expecting_success(&failing).unwrap();

    scheduler.enqueue_all([&failing, &dependent]).unwrap();
    with_timeout(dependent.finished()).await;

    assert!(!ran.load(Ordering::SeqCst));
    assert!(dependent.is_cancelled());
    let errors = dependent.errors();
    assert_eq!(errors.len(), 1);
    assert!(
        matches!(&errors[0], TaskError::DependenciesFailed(ids) if ids == &vec![failing.id()])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn expect_success_fails_fast_on_cancelled_dependency() {
    init_tracing();
    let scheduler = scheduler("expect-success-cancel");
    let ran = Arc::new(AtomicBool::new(false));

    let upstream = Task::named("upstream", BlockWork::from_fn(|| {}));
    let dependent = flag_task("dependent", &ran);
    dependent.add_dependency_expecting_success(&upstream).unwrap();

    upstream.cancel();
    scheduler.enqueue_all([&upstream, &dependent]).unwrap();
    with_timeout(dependent.finished()).await;

    assert!(!ran.load(Ordering::SeqCst));
    assert!(dependent
        .errors()
        .iter()
        .any(TaskError::is_dependency_cancellation));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_task_stops_waiting_for_dependencies() {
    init_tracing();
    let scheduler = scheduler("cancel-waiting");
    let (ctx_tx, ctx_rx) = tokio::sync::oneshot::channel();

    let blocker = Task::named(
        "blocker",
        BlockWork::new(move |ctx| {
            let _ = ctx_tx.send(ctx);
        }),
    );
    let ran = Arc::new(AtomicBool::new(false));
    let waiting = flag_task("waiting", &ran);
    waiting.add_dependency(&blocker).unwrap();

    scheduler.enqueue_all([&blocker, &waiting]).unwrap();
    let blocker_ctx = with_timeout(ctx_rx).await.unwrap();

    waiting.cancel();
    with_timeout(waiting.finished()).await;
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(blocker.state(), TaskState::Executing);

    blocker_ctx.finish().unwrap();
    with_timeout(scheduler.wait_until_idle()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dependency_conditions_report_each_failure() {
    init_tracing();
    let scheduler = scheduler("conditions");

    let cancelled = Task::named("cancelled", BlockWork::from_fn(|| {}));
    let failing = failing_task("failing");
    let ran = Arc::new(AtomicBool::new(false));
    let dependent = flag_task("dependent", &ran);
    dependent.add_dependencies([&cancelled, &failing]).unwrap();
    dependent.add_condition(NoCancelledDependencies::new()).unwrap();
    dependent.add_condition(NoFailedDependencies::new()).unwrap();

    cancelled.cancel();
    scheduler.enqueue_all([&cancelled, &failing, &dependent]).unwrap();
    with_timeout(scheduler.wait_until_idle()).await;

    assert!(!ran.load(Ordering::SeqCst));
    let errors = dependent.errors();
    assert_eq!(errors.len(), 2, "both conditions are evaluated: {errors:?}");
    assert!(errors[0].is_dependency_cancellation());
    assert!(errors[1].is_dependency_failure());
}

/// Requires `setup` to have run successfully; generates it as a dependency.
struct NeedsSetup {
    setup: Task,
}

impl Condition for NeedsSetup {
    fn generated_dependency(&self, _task: &Task) -> Option<Task> {
        Some(self.setup.clone())
    }

    fn evaluate(&self, _task: &Task, completion: ConditionCompletion) {
        if self.setup.is_finished() && self.setup.errors().is_empty() {
            completion.satisfied();
        } else {
            completion.fail(TaskError::condition("NeedsSetup", "setup has not run"));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn generated_dependency_is_enqueued_and_runs_first() {
    init_tracing();
    let scheduler = scheduler("generated");
    let log = EventLog::new();

    let setup = Task::named("setup", BlockWork::from_fn(|| {}));
    let main = Task::named("main", BlockWork::from_fn(|| {}));
    main.add_condition(NeedsSetup {
        setup: setup.clone(),
    })
    .unwrap();
    log.attach(&setup);
    log.attach(&main);

    scheduler.enqueue(&main).unwrap();
    with_timeout(main.finished()).await;

    assert!(main.errors().is_empty());
    assert!(main.dependencies().contains(&setup));
    assert!(log.position(&finished_ok("setup")).unwrap() < log.position(&started("main")).unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_condition_suppresses_generated_dependency() {
    init_tracing();
    let scheduler = scheduler("silent");
    let ran = Arc::new(AtomicBool::new(false));

    let setup = Task::named("setup", BlockWork::from_fn(|| {}));
    let main = flag_task("main", &ran);
    main.add_condition(SilentCondition::new(NeedsSetup {
        setup: setup.clone(),
    }))
    .unwrap();

    scheduler.enqueue(&main).unwrap();
    with_timeout(main.finished()).await;

    assert_eq!(setup.state(), TaskState::Initialized);
    assert!(!ran.load(Ordering::SeqCst));
    assert!(matches!(
        &main.errors()[..],
        [TaskError::ConditionFailed { condition, .. }] if condition == "NeedsSetup"
    ));
}

/// Reports from another thread after a delay.
struct SlowCondition;

impl Condition for SlowCondition {
    fn evaluate(&self, _task: &Task, completion: ConditionCompletion) {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            completion.satisfied();
        });
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn asynchronous_condition_gates_execution() {
    init_tracing();
    let scheduler = scheduler("async-condition");
    let ran = Arc::new(AtomicBool::new(false));

    let task = flag_task("gated", &ran);
    task.add_condition(SlowCondition).unwrap();

    scheduler.enqueue(&task).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(!ran.load(Ordering::SeqCst));

    with_timeout(task.finished()).await;
    assert!(ran.load(Ordering::SeqCst));
    assert!(task.errors().is_empty());
}

/// Forgets to report.
struct ForgetfulCondition;

impl Condition for ForgetfulCondition {
    fn evaluate(&self, _task: &Task, completion: ConditionCompletion) {
        drop(completion);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_completion_counts_as_failure() {
    init_tracing();
    let scheduler = scheduler("dropped-completion");
    let ran = Arc::new(AtomicBool::new(false));

    let task = flag_task("forgotten", &ran);
    task.add_condition(ForgetfulCondition).unwrap();

    scheduler.enqueue(&task).unwrap();
    with_timeout(task.finished()).await;

    assert!(!ran.load(Ordering::SeqCst));
    assert!(matches!(
        &task.errors()[..],
        [TaskError::ConditionFailed { condition, .. }] if condition == "ForgetfulCondition"
    ));
}
