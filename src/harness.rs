use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blackhole::Blackhole;
use crate::clock::{time_call, Clock};
use crate::error::{BenchError, Phase, Result};
use crate::fork::Isolation;
use crate::workload::{Instance, Workload};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }

    pub fn warmup_iters(&self) -> u64 {
        match self {
            Profile::Quick => 3,
            Profile::Full => 5,
        }
    }

    pub fn warmup_seconds(&self) -> f64 {
        match self {
            Profile::Quick => 0.1,
            Profile::Full => 1.0,
        }
    }

    pub fn iters(&self) -> u64 {
        match self {
            Profile::Quick => 5,
            Profile::Full => 10,
        }
    }

    pub fn forks(&self) -> u32 {
        match self {
            Profile::Quick => 1,
            Profile::Full => 3,
        }
    }
}

/// Unit the report expresses time-per-op in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Ns,
    #[default]
    Us,
    Ms,
    S,
}

impl TimeUnit {
    pub fn from_ns(&self, ns: f64) -> f64 {
        match self {
            TimeUnit::Ns => ns,
            TimeUnit::Us => ns / 1e3,
            TimeUnit::Ms => ns / 1e6,
            TimeUnit::S => ns / 1e9,
        }
    }

    pub fn per_op(&self) -> &'static str {
        match self {
            TimeUnit::Ns => "ns/op",
            TimeUnit::Us => "us/op",
            TimeUnit::Ms => "ms/op",
            TimeUnit::S => "s/op",
        }
    }
}

/// Everything that controls one benchmark execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    pub warmup_iterations: u64,
    /// Minimum timed duration of each warmup iteration.
    pub warmup_seconds: f64,
    /// `None` defers to the workload's iteration hint, then the profile.
    pub measurement_iterations: Option<u64>,
    /// Minimum timed duration of each measurement iteration. Zero (every
    /// profile's default) means one invocation per iteration; anything larger
    /// batches invocations into one averaged sample.
    pub measurement_seconds: f64,
    pub forks: u32,
    pub threads: usize,
    pub time_unit: TimeUnit,
    pub isolation: Isolation,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::from_profile(Profile::default())
    }
}

impl BenchConfig {
    pub fn from_profile(profile: Profile) -> Self {
        Self {
            profile,
            seed: 42,
            warmup_iterations: profile.warmup_iters(),
            warmup_seconds: profile.warmup_seconds(),
            measurement_iterations: None,
            measurement_seconds: 0.0,
            forks: profile.forks(),
            threads: 1,
            time_unit: TimeUnit::default(),
            isolation: Isolation::default(),
        }
    }

    pub fn measurement_iterations_for(&self, workload: &Workload) -> u64 {
        self.measurement_iterations
            .or(workload.iteration_hint())
            .unwrap_or_else(|| self.profile.iters())
    }

    pub fn warmup_time(&self) -> Result<Duration> {
        seconds("warmup_seconds", self.warmup_seconds)
    }

    pub fn measurement_time(&self) -> Result<Duration> {
        seconds("measurement_seconds", self.measurement_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(BenchError::InvalidConfig("threads must be at least 1".to_string()));
        }
        self.warmup_time()?;
        self.measurement_time()?;
        Ok(())
    }

    /// Overlay the fields present in a JSON object onto this configuration.
    ///
    /// Fields the object leaves out keep their current value, so a partial
    /// config file does not reset the profile presets.
    pub fn overlay_json(self, fields: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(fields) = fields else {
            return Err(BenchError::InvalidConfig(
                "config file must hold a JSON object".to_string(),
            ));
        };
        let mut merged = serde_json::to_value(self)?;
        if let serde_json::Value::Object(base) = &mut merged {
            base.extend(fields);
        }
        Ok(serde_json::from_value(merged)?)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| BenchError::InvalidConfig(format!("{field} = {value}: {e}")))
}

/// One recorded sample: the timed invocations of a single measurement iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub fork: u32,
    pub iteration: u64,
    pub ops: u64,
    pub total_ns: u64,
}

impl Measurement {
    pub fn ns_per_op(&self) -> f64 {
        self.total_ns as f64 / self.ops.max(1) as f64
    }
}

/// Timed invocations gathered by one time-boxed iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub ops: u64,
    pub total_ns: u64,
}

impl Batch {
    pub fn merge(self, other: Batch) -> Batch {
        Batch {
            ops: self.ops + other.ops,
            total_ns: self.total_ns.saturating_add(other.total_ns),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupSummary {
    pub iterations: u64,
    pub invocations: u64,
}

/// Invoke until the accumulated timed duration reaches `floor`, at least once.
///
/// Each invocation is timed on its own; the returned value is consumed after
/// the stop reading.
pub fn run_timeboxed<C: Clock + ?Sized>(
    clock: &C,
    workload: &str,
    phase: Phase,
    instance: &mut dyn Instance,
    sink: &mut Blackhole,
    floor: Duration,
) -> Result<Batch> {
    let floor_ns = u64::try_from(floor.as_nanos()).unwrap_or(u64::MAX);
    let mut batch = Batch::default();
    loop {
        let (out, ns) = time_call(clock, || instance.invoke())?;
        let value = out.map_err(|message| BenchError::WorkloadFailure {
            workload: workload.to_string(),
            phase,
            message,
        })?;
        sink.consume(value);
        batch.ops += 1;
        batch.total_ns = batch.total_ns.saturating_add(ns);
        if batch.total_ns >= floor_ns {
            return Ok(batch);
        }
    }
}

/// Drive an instance towards steady state without recording anything.
pub fn warmup<C: Clock + ?Sized>(
    clock: &C,
    workload: &str,
    instance: &mut dyn Instance,
    sink: &mut Blackhole,
    iterations: u64,
    min_duration_per_iteration: Duration,
) -> Result<WarmupSummary> {
    let mut summary = WarmupSummary::default();
    for _ in 0..iterations {
        let batch = run_timeboxed(
            clock,
            workload,
            Phase::Warmup,
            instance,
            sink,
            min_duration_per_iteration,
        )?;
        summary.iterations += 1;
        summary.invocations += batch.ops;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::StepClock;
    use crate::workload::{HookError, SetupContext};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn ctx() -> SetupContext {
        SetupContext {
            seed: 0,
            fork: 0,
            thread: 0,
        }
    }

    fn counting(calls: Arc<AtomicU64>) -> Workload {
        Workload::from_fn("count", move || calls.fetch_add(1, Ordering::SeqCst))
    }

    #[test]
    fn test_warmup_repeats_until_floor() {
        // Each invocation is observed as 10ns; a 35ns floor needs 4 per iteration.
        let clock = StepClock::new(10);
        let calls = Arc::new(AtomicU64::new(0));
        let mut inst = counting(calls.clone()).instantiate(&ctx()).unwrap();
        let mut sink = Blackhole::new();

        let s = warmup(&clock, "count", inst.as_mut(), &mut sink, 3, Duration::from_nanos(35)).unwrap();

        assert_eq!(s.iterations, 3);
        assert_eq!(s.invocations, 12);
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(sink.consumed(), 12);
    }

    #[test]
    fn test_slow_invocation_runs_once_per_slot() {
        let clock = StepClock::new(1_000);
        let calls = Arc::new(AtomicU64::new(0));
        let mut inst = counting(calls.clone()).instantiate(&ctx()).unwrap();
        let mut sink = Blackhole::new();

        let s = warmup(&clock, "count", inst.as_mut(), &mut sink, 4, Duration::from_nanos(500)).unwrap();

        assert_eq!(s.invocations, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_floor_is_count_boxed() {
        let clock = StepClock::new(0);
        let calls = Arc::new(AtomicU64::new(0));
        let mut inst = counting(calls.clone()).instantiate(&ctx()).unwrap();
        let mut sink = Blackhole::new();

        let s = warmup(&clock, "count", inst.as_mut(), &mut sink, 7, Duration::ZERO).unwrap();
        assert_eq!(s.invocations, 7);
    }

    #[test]
    fn test_workload_error_stops_warmup() {
        let clock = StepClock::new(1);
        let w = Workload::new(
            "fails",
            |_| Ok(0u32),
            |n: &mut u32| {
                *n += 1;
                if *n == 3 {
                    Err::<u64, HookError>("third call".into())
                } else {
                    Ok(1)
                }
            },
        );
        let mut inst = w.instantiate(&ctx()).unwrap();
        let mut sink = Blackhole::new();

        let err = warmup(&clock, "fails", inst.as_mut(), &mut sink, 10, Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            BenchError::WorkloadFailure { phase: Phase::Warmup, .. }
        ));
        assert_eq!(sink.consumed(), 2);
    }

    #[test]
    fn test_measurement_per_op() {
        let m = Measurement {
            fork: 0,
            iteration: 0,
            ops: 4,
            total_ns: 100,
        };
        assert_eq!(m.ns_per_op(), 25.0);
    }

    #[test]
    fn test_config_iteration_precedence() {
        let w = Workload::from_fn("w", || 0);
        let hinted = w.clone().with_iteration_hint(9);

        let mut cfg = BenchConfig::from_profile(Profile::Full);
        assert_eq!(cfg.measurement_iterations_for(&w), 10);
        assert_eq!(cfg.measurement_iterations_for(&hinted), 9);
        cfg.measurement_iterations = Some(2);
        assert_eq!(cfg.measurement_iterations_for(&hinted), 2);
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = BenchConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.threads = 0;
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));

        cfg.threads = 1;
        cfg.warmup_seconds = -1.0;
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));

        cfg.warmup_seconds = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_json_fills_defaults() {
        let cfg: BenchConfig = serde_json::from_str(r#"{"forks": 4, "time_unit": "ns"}"#).unwrap();
        assert_eq!(cfg.forks, 4);
        assert_eq!(cfg.time_unit, TimeUnit::Ns);
        assert_eq!(cfg.warmup_iterations, Profile::Quick.warmup_iters());
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn test_profiles_measure_single_invocations() {
        for profile in [Profile::Quick, Profile::Full] {
            let cfg = BenchConfig::from_profile(profile);
            assert_eq!(cfg.measurement_seconds, 0.0);
            assert_eq!(cfg.measurement_time().unwrap(), Duration::ZERO);
        }
        assert_eq!(BenchConfig::default().measurement_seconds, 0.0);
    }

    #[test]
    fn test_overlay_keeps_unlisted_fields() {
        let mut base = BenchConfig::from_profile(Profile::Full);
        base.isolation = Isolation::Process;

        let cfg = base
            .overlay_json(serde_json::json!({"warmup_iterations": 1, "isolation": "thread"}))
            .unwrap();
        assert_eq!(cfg.profile, Profile::Full);
        assert_eq!(cfg.forks, Profile::Full.forks());
        assert_eq!(cfg.warmup_seconds, Profile::Full.warmup_seconds());
        assert_eq!(cfg.warmup_iterations, 1);
        assert_eq!(cfg.isolation, Isolation::Thread);

        let not_object = BenchConfig::default().overlay_json(serde_json::json!([1, 2]));
        assert!(matches!(not_object, Err(BenchError::InvalidConfig(_))));
    }
}
