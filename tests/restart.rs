//! Restart-loop behavior: budget counting and event ordering.

mod support;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use procvisor::Pool;
use support::{Kind, Recorder, shell_service};

#[tokio::test]
async fn restart_budget_yields_matched_event_pairs() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    let mut service = shell_service("clean", "exit 0");
    service.restart = 2;

    let root = CancellationToken::new();
    pool.add(Arc::new(service)).await;
    pool.start_all(&root).await;

    // Budget 2 allows two restarts after the first run: three runs total.
    assert_eq!(
        recorder.kinds_for("clean"),
        vec![
            Kind::Spawned,
            Kind::Started,
            Kind::Stopped,
            Kind::Started,
            Kind::Stopped,
            Kind::Started,
            Kind::Stopped,
            Kind::Finished,
        ]
    );
    for record in recorder.snapshot() {
        if record.kind == Kind::Stopped {
            assert!(record.error.is_none(), "clean exits carry no error");
        }
    }

    pool.terminate().await;
    assert!(pool.instances().await.is_empty());
}

#[tokio::test]
async fn zero_budget_runs_exactly_once() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    // A literal zero budget (no defaulting applied) exhausts after one run.
    let service = shell_service("oneshot", "exit 0");
    assert_eq!(service.restart, 0);

    let root = CancellationToken::new();
    pool.add(Arc::new(service)).await;
    pool.start_all(&root).await;

    assert_eq!(recorder.count(Kind::Started, "oneshot"), 1);
    assert_eq!(recorder.count(Kind::Stopped, "oneshot"), 1);
    assert_eq!(recorder.count(Kind::Finished, "oneshot"), 1);
}

#[tokio::test]
async fn failing_child_reports_errors_and_still_restarts() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    let mut service = shell_service("flaky", "exit 3");
    service.restart = 1;

    let root = CancellationToken::new();
    pool.add(Arc::new(service)).await;
    pool.start_all(&root).await;

    let stopped: Vec<_> = recorder
        .snapshot()
        .into_iter()
        .filter(|record| record.kind == Kind::Stopped)
        .collect();
    assert_eq!(stopped.len(), 2);
    for record in stopped {
        let error = record.error.expect("non-zero exit carries an error");
        assert!(error.contains("3"), "unexpected error: {error}");
    }
}

#[tokio::test]
async fn spawn_failure_counts_as_a_completed_run() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    let mut service = shell_service("ghost", "exit 0");
    service.command = "/definitely/not/a/binary".into();
    service.args.clear();
    service.restart = 1;

    let root = CancellationToken::new();
    pool.add(Arc::new(service)).await;
    pool.start_all(&root).await;

    // Two attempts, both failing to spawn, then the loop finishes.
    assert_eq!(recorder.count(Kind::Started, "ghost"), 2);
    assert_eq!(recorder.count(Kind::Stopped, "ghost"), 2);
    assert_eq!(recorder.count(Kind::Finished, "ghost"), 1);
    for record in recorder.snapshot() {
        if record.kind == Kind::Stopped {
            assert!(record.error.unwrap().contains("spawn"));
        }
    }
}

#[tokio::test]
async fn started_count_respects_the_budget_bound() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    for (name, budget) in [("b0", 0i64), ("b1", 1), ("b4", 4)] {
        let mut service = shell_service(name, "exit 0");
        service.restart = budget;
        pool.add(Arc::new(service)).await;
    }

    let root = CancellationToken::new();
    pool.start_all(&root).await;

    for (name, budget) in [("b0", 0i64), ("b1", 1), ("b4", 4)] {
        let bound = 1 + budget.max(0) as usize;
        assert_eq!(recorder.count(Kind::Started, name), bound);
        assert_eq!(recorder.count(Kind::Stopped, name), bound);
        assert_eq!(recorder.count(Kind::Spawned, name), 1);
        assert_eq!(recorder.count(Kind::Finished, name), 1);
    }
}
