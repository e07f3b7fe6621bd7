// tests/session_control.rs

use std::time::Duration;

use depbuild::dag::BuildStatus;
use depbuild::engine::{BuildScheduler, SessionOptions};
use depbuild::errors::DepbuildError;
use depbuild::types::Verdict;
use depbuild_test_utils::builders::sample_manifest;
use depbuild_test_utils::fake_builder::{FAKE_BUILDER, FakeBuilds};
use depbuild_test_utils::{init_tracing, with_timeout};

fn options() -> SessionOptions {
    SessionOptions {
        workers: 3,
        tick: Duration::from_millis(10),
        extra_args: String::new(),
    }
}

async fn wait_for_stops(fakes: &FakeBuilds, module: &str, n: usize) {
    while fakes.stops(module) < n {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn invalidation_mid_build_aborts_and_rebuilds_dependents() {
    init_tracing();

    let fakes = FakeBuilds::new();
    fakes.gate("A");
    let graph = sample_manifest(FAKE_BUILDER).graph("A", &fakes.registry());

    let session = BuildScheduler::new(options()).prepare(graph);
    let handle = session.handle();
    let run = tokio::spawn(session.run());

    with_timeout(fakes.wait_for_builds("A", 1)).await;
    assert_eq!(handle.status_of("A"), Some(BuildStatus::Building));

    handle.invalidate("D").unwrap();

    // The in-flight build of A is stopped once the demotion is observed.
    with_timeout(wait_for_stops(&fakes, "A", 1)).await;
    fakes.open("A").unwrap();

    let report = with_timeout(run).await.unwrap().unwrap();

    assert_eq!(report.verdict, Verdict::Success);
    assert_eq!(fakes.builds("D"), 2);
    assert_eq!(fakes.builds("B"), 2);
    assert_eq!(fakes.builds("A"), 2);
    assert_eq!(fakes.builds("C"), 1);
    assert_eq!(fakes.builds("E"), 1);
    assert_eq!(fakes.overlaps(), 0);
}

#[tokio::test]
async fn invalidating_a_waiting_module_is_a_no_op() {
    init_tracing();

    let fakes = FakeBuilds::new();
    fakes.gate("D");
    fakes.gate("E");
    let graph = sample_manifest(FAKE_BUILDER).graph("A", &fakes.registry());

    let session = BuildScheduler::new(options()).prepare(graph);
    let handle = session.handle();
    let run = tokio::spawn(session.run());

    with_timeout(fakes.wait_for_builds("D", 1)).await;
    handle.invalidate("A").unwrap();
    assert_eq!(handle.status_of("A"), Some(BuildStatus::Waiting));

    fakes.open("D").unwrap();
    fakes.open("E").unwrap();
    let report = with_timeout(run).await.unwrap().unwrap();
    assert_eq!(report.verdict, Verdict::Success);
    assert_eq!(fakes.builds("A"), 1);
}

#[tokio::test]
async fn invalidating_an_unknown_module_fails() {
    init_tracing();

    let fakes = FakeBuilds::new();
    let graph = sample_manifest(FAKE_BUILDER).graph("B", &fakes.registry());
    let session = BuildScheduler::new(options()).prepare(graph);

    let err = session.handle().invalidate("C").unwrap_err();
    assert!(matches!(err, DepbuildError::UnknownModule(m) if m == "C"));
}

#[tokio::test]
async fn shutdown_stops_builds_and_leaves_nodes_waiting() {
    init_tracing();

    let fakes = FakeBuilds::new();
    fakes.gate("D");
    fakes.gate("E");
    let graph = sample_manifest(FAKE_BUILDER).graph("A", &fakes.registry());

    let session = BuildScheduler::new(options()).prepare(graph);
    let handle = session.handle();
    let run = tokio::spawn(session.run());

    with_timeout(fakes.wait_for_builds("D", 1)).await;
    with_timeout(fakes.wait_for_builds("E", 1)).await;
    let building: Vec<_> = handle
        .snapshot()
        .into_iter()
        .filter(|n| n.status == BuildStatus::Building)
        .map(|n| n.module)
        .collect();
    assert_eq!(building.len(), 2);
    handle.shutdown();

    let report = with_timeout(run).await.unwrap().unwrap();

    assert_eq!(report.verdict, Verdict::Cancelled);
    assert_eq!(report.verdict.exit_code(), 1);
    for m in ["A", "B", "C", "D", "E"] {
        assert_eq!(report.status_of(m), Some(BuildStatus::Waiting), "module {m}");
    }
    assert_eq!(fakes.stops("D"), 1);
    assert_eq!(fakes.stops("E"), 1);
    assert!(!fakes.is_running("D"));
    assert!(!fakes.is_running("E"));
}

#[tokio::test]
async fn shutdown_before_start_cancels_immediately() {
    init_tracing();

    let fakes = FakeBuilds::new();
    let graph = sample_manifest(FAKE_BUILDER).graph("A", &fakes.registry());

    let session = BuildScheduler::new(options()).prepare(graph);
    session.handle().shutdown();
    let report = with_timeout(session.run()).await.unwrap();

    assert_eq!(report.verdict, Verdict::Cancelled);
    assert_eq!(fakes.order(), Vec::<String>::new());
}
