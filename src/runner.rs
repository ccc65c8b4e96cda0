//! Orchestration of one or more workloads through warmup, measurement and
//! aggregation.

use tracing::{info, warn};

use crate::blackhole::combine_digests;
use crate::clock::{Clock, MonotonicClock};
use crate::error::{BenchError, Result};
use crate::fork::{ForkContext, ForkExecutor, ForkReport, Isolation, ProcessForks, ThreadForks};
use crate::harness::{BenchConfig, WarmupSummary};
use crate::registry::Registry;
use crate::state::{RunState, StateMachine};
use crate::stats::RunResult;
use crate::workload::Workload;

pub struct BenchmarkRunner<'r, C: Clock = MonotonicClock> {
    registry: &'r Registry,
    config: BenchConfig,
    clock: C,
    launcher: Option<ProcessForks>,
    last_state: RunState,
}

impl<'r> BenchmarkRunner<'r, MonotonicClock> {
    pub fn new(registry: &'r Registry, config: BenchConfig) -> Result<Self> {
        Self::with_clock(registry, config, MonotonicClock::new())
    }
}

impl<'r, C: Clock> BenchmarkRunner<'r, C> {
    pub fn with_clock(registry: &'r Registry, config: BenchConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            clock,
            launcher: None,
            last_state: RunState::Idle,
        })
    }

    /// Launcher used when the config asks for process isolation.
    pub fn with_launcher(mut self, launcher: ProcessForks) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// State the most recent workload execution ended in.
    pub fn state(&self) -> RunState {
        self.last_state
    }

    /// Run one workload by exact name.
    pub fn run(&mut self, name: &str) -> Result<RunResult> {
        let workload = self.registry.resolve(name)?;
        self.run_workload(workload)
    }

    /// Run every workload matching `selectors`, in registration order.
    ///
    /// Selection errors surface before anything is timed. The first failing
    /// workload aborts the remaining ones.
    pub fn run_selected<S: AsRef<str>>(&mut self, selectors: &[S]) -> Result<Vec<RunResult>> {
        let registry = self.registry;
        let workloads = registry.select(selectors)?;
        if self.config.isolation == Isolation::Process && self.config.forks > 0 && self.launcher.is_none() {
            return Err(BenchError::InvalidConfig(
                "process isolation needs a fork launcher".to_string(),
            ));
        }

        workloads.into_iter().map(|w| self.run_workload(w)).collect()
    }

    pub fn run_workload(&mut self, workload: &Workload) -> Result<RunResult> {
        let mut sm = StateMachine::new();
        info!(
            workload = workload.name(),
            forks = self.config.forks,
            isolation = self.config.isolation.as_str(),
            "benchmark start"
        );

        let outcome = self.execute(workload, &mut sm);
        if let Err(e) = &outcome {
            warn!(workload = workload.name(), state = %sm.state(), error = %e, "benchmark failed");
            sm.fail();
        }
        self.last_state = sm.state();
        outcome
    }

    fn execute(&self, workload: &Workload, sm: &mut StateMachine) -> Result<RunResult> {
        let config = &self.config;
        let mut pooled = Vec::new();
        let mut warmup = WarmupSummary::default();
        let mut digests = Vec::new();

        if config.forks == 0 {
            // In-process: steady state carried over from anything run before.
            sm.advance(RunState::Warmup { fork: 0 })?;
            let mut cx = ForkContext::new(&self.clock, workload, config, 0)?;
            warmup = cx.warmup()?;
            sm.advance(RunState::Measuring { fork: 0 })?;
            pooled = cx.measure(config.measurement_iterations_for(workload))?;
            digests.push(cx.digest());
        } else {
            for fork in 0..config.forks {
                sm.advance(RunState::Warmup { fork })?;
                let report = self.run_fork(workload, fork)?;
                sm.advance(RunState::Measuring { fork })?;

                let ForkReport {
                    warmup: w,
                    samples,
                    digest,
                    ..
                } = report;
                warmup.iterations += w.iterations;
                warmup.invocations += w.invocations;
                pooled.extend(samples);
                digests.push(digest);
            }
        }

        sm.advance(RunState::Aggregating)?;
        let result = RunResult::aggregate(
            workload.name(),
            pooled,
            warmup,
            config.forks,
            config.threads,
            combine_digests(digests.iter().map(String::as_str)),
        )?;
        sm.advance(RunState::Reported)?;

        info!(
            workload = workload.name(),
            samples = result.summary.count,
            mean_ns = result.summary.mean,
            stddev_ns = result.summary.stddev,
            "benchmark done"
        );
        Ok(result)
    }

    fn run_fork(&self, workload: &Workload, fork: u32) -> Result<ForkReport> {
        match self.config.isolation {
            Isolation::Thread => ThreadForks::new(&self.clock).run_fork(workload, &self.config, fork),
            Isolation::Process => match &self.launcher {
                Some(launcher) => launcher.run_fork(workload, &self.config, fork),
                None => Err(BenchError::InvalidConfig(
                    "process isolation needs a fork launcher".to_string(),
                )),
            },
        }
    }
}
