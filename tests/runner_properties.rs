//! End-to-end properties of the runner against the built-in workloads.

use warmbench::benches::builtin_registry;
use warmbench::{BenchConfig, BenchError, BenchmarkRunner, Isolation, Registry, RunState, Workload};

fn fast_config(forks: u32, iterations: u64) -> BenchConfig {
    BenchConfig {
        warmup_iterations: 2,
        warmup_seconds: 0.0,
        measurement_iterations: Some(iterations),
        measurement_seconds: 0.0,
        forks,
        isolation: Isolation::Thread,
        ..BenchConfig::default()
    }
}

#[test]
fn builtin_workloads_report_requested_sample_counts() {
    let registry = builtin_registry().unwrap();
    let mut runner = BenchmarkRunner::new(&registry, fast_config(2, 3)).unwrap();

    let results = runner.run_selected(&["sum", "quicksort"]).unwrap();
    assert_eq!(results.len(), 2);
    for r in &results {
        assert_eq!(r.samples.len(), 6);
        assert_eq!(r.summary.count, 6);
        assert!(r.summary.min <= r.summary.mean && r.summary.mean <= r.summary.max);
        assert!(r.summary.stddev >= 0.0);
    }
    assert_eq!(runner.state(), RunState::Reported);
}

#[test]
fn repeated_single_fork_runs_match_in_structure() {
    let registry = builtin_registry().unwrap();
    let run = || {
        let mut runner = BenchmarkRunner::new(&registry, fast_config(1, 4)).unwrap();
        runner.run("quicksort").unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a.samples.len(), b.samples.len());
    assert_eq!(a.warmup.invocations, b.warmup.invocations);
    assert_eq!(a.result_digest, b.result_digest);
}

#[test]
fn time_boxed_measurement_batches_invocations() {
    let mut registry = Registry::new();
    registry.add(Workload::from_fn("tiny", || 1)).unwrap();

    let cfg = BenchConfig {
        measurement_seconds: 0.002,
        ..fast_config(0, 3)
    };
    let mut runner = BenchmarkRunner::new(&registry, cfg).unwrap();
    let result = runner.run("tiny").unwrap();

    assert_eq!(result.samples.len(), 3);
    assert!(result.samples.iter().all(|m| m.ops >= 1 && m.total_ns >= 2_000_000));
}

#[test]
fn panicking_workload_fails_the_run() {
    let mut registry = Registry::new();
    registry
        .add(Workload::from_fn("panics", || panic!("workload bug")))
        .unwrap();

    let mut runner = BenchmarkRunner::new(&registry, fast_config(1, 3)).unwrap();
    let err = runner.run("panics").unwrap_err();
    match err {
        BenchError::WorkloadFailure { message, .. } => assert!(message.contains("workload bug")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.state(), RunState::Failed);
}
