//! Isolated execution contexts ("forks").
//!
//! A fork is one complete warmup + measurement sequence against a freshly set
//! up workload instance. Forks never share workload state; the only thing that
//! leaves a fork is its [`ForkReport`], handed back once the fork has finished.
//!
//! Two strategies are provided:
//!
//! - [`ThreadForks`]: each fork runs on a newly spawned OS thread.
//! - [`ProcessForks`]: each fork re-runs an executable in worker mode. The
//!   parent writes a bincode [`ForkRequest`] to the child's stdin and reads a
//!   bincode [`ForkReply`] from its stdout. The child resolves the workload by
//!   name in its own registry, see [`serve_fork`].

use std::ffi::OsString;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blackhole::{combine_digests, Blackhole};
use crate::clock::{Clock, MonotonicClock};
use crate::error::{BenchError, Phase, Result};
use crate::harness::{self, run_timeboxed, Batch, BenchConfig, Measurement, WarmupSummary};
use crate::registry::Registry;
use crate::workload::{panic_message, Instance, SetupContext, Workload};

/// Subcommand an executable must handle to act as a process fork.
pub const WORKER_SUBCOMMAND: &str = "fork-worker";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    #[default]
    Thread,
    Process,
}

impl Isolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Isolation::Thread => "thread",
            Isolation::Process => "process",
        }
    }
}

/// Everything one fork hands back to the runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForkReport {
    pub fork: u32,
    pub warmup: WarmupSummary,
    pub samples: Vec<Measurement>,
    /// Digest of the values returned while measuring.
    pub digest: String,
}

struct Worker {
    instance: Box<dyn Instance>,
    warmup_sink: Blackhole,
    sink: Blackhole,
}

/// Workload instances for one fork, one per configured thread.
pub struct ForkContext<'a, C: Clock + ?Sized> {
    clock: &'a C,
    workload: &'a Workload,
    config: &'a BenchConfig,
    fork: u32,
    workers: Vec<Worker>,
    pool: Option<ThreadPool>,
}

impl<'a, C: Clock + ?Sized> ForkContext<'a, C> {
    pub fn new(clock: &'a C, workload: &'a Workload, config: &'a BenchConfig, fork: u32) -> Result<Self> {
        let threads = config.threads.max(1);
        let workers = (0..threads)
            .map(|thread| -> Result<Worker> {
                let ctx = SetupContext {
                    seed: config.seed,
                    fork,
                    thread,
                };
                Ok(Worker {
                    instance: workload.instantiate(&ctx)?,
                    warmup_sink: Blackhole::new(),
                    sink: Blackhole::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pool = if threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(move |i| format!("fork{fork}-worker{i}"))
                .build()
                .map_err(|e| BenchError::Fork {
                    fork,
                    message: e.to_string(),
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            clock,
            workload,
            config,
            fork,
            workers,
            pool,
        })
    }

    fn each_worker<T, F>(&mut self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&mut Worker) -> Result<T> + Sync,
    {
        let workers = &mut self.workers;
        match &self.pool {
            Some(pool) => pool.install(|| workers.par_iter_mut().map(|w| f(w)).collect()),
            None => workers.iter_mut().map(f).collect(),
        }
    }

    /// Warm every worker's instance. Nothing is recorded.
    pub fn warmup(&mut self) -> Result<WarmupSummary> {
        let (clock, workload) = (self.clock, self.workload);
        let name = workload.name();
        let iterations = self.config.warmup_iterations;
        let floor = self.config.warmup_time()?;

        let per_worker = self.each_worker(|w| {
            harness::warmup(clock, name, &mut *w.instance, &mut w.warmup_sink, iterations, floor)
        })?;

        Ok(WarmupSummary {
            iterations,
            invocations: per_worker.iter().map(|s| s.invocations).sum(),
        })
    }

    /// Record one measurement per iteration.
    pub fn measure(&mut self, iterations: u64) -> Result<Vec<Measurement>> {
        let (clock, workload) = (self.clock, self.workload);
        let name = workload.name();
        let floor = self.config.measurement_time()?;

        let mut samples = Vec::new();
        for iteration in 0..iterations {
            let batch = self
                .each_worker(|w| {
                    run_timeboxed(clock, name, Phase::Measurement, &mut *w.instance, &mut w.sink, floor)
                })?
                .into_iter()
                .fold(Batch::default(), Batch::merge);
            samples.push(Measurement {
                fork: self.fork,
                iteration,
                ops: batch.ops,
                total_ns: batch.total_ns,
            });
        }
        Ok(samples)
    }

    pub fn digest(&self) -> String {
        let digests: Vec<String> = self.workers.iter().map(|w| w.sink.hex_digest()).collect();
        combine_digests(digests.iter().map(String::as_str))
    }
}

/// Run a full warmup + measurement sequence in the current thread.
pub fn run_sequence<C: Clock + ?Sized>(
    clock: &C,
    workload: &Workload,
    config: &BenchConfig,
    fork: u32,
) -> Result<ForkReport> {
    let iterations = config.measurement_iterations_for(workload);
    let mut cx = ForkContext::new(clock, workload, config, fork)?;

    let warmup = cx.warmup()?;
    debug!(
        workload = workload.name(),
        fork,
        invocations = warmup.invocations,
        "warmup done"
    );

    let samples = cx.measure(iterations)?;
    debug!(workload = workload.name(), fork, samples = samples.len(), "measurement done");

    Ok(ForkReport {
        fork,
        warmup,
        samples,
        digest: cx.digest(),
    })
}

pub trait ForkExecutor {
    fn run_fork(&self, workload: &Workload, config: &BenchConfig, fork: u32) -> Result<ForkReport>;
}

/// Each fork on a freshly spawned OS thread with freshly set up instances.
pub struct ThreadForks<'c, C: Clock + ?Sized> {
    clock: &'c C,
}

impl<'c, C: Clock + ?Sized> ThreadForks<'c, C> {
    pub fn new(clock: &'c C) -> Self {
        Self { clock }
    }
}

impl<C: Clock + ?Sized> ForkExecutor for ThreadForks<'_, C> {
    fn run_fork(&self, workload: &Workload, config: &BenchConfig, fork: u32) -> Result<ForkReport> {
        let clock = self.clock;
        std::thread::scope(|s| -> Result<ForkReport> {
            let handle = std::thread::Builder::new()
                .name(format!("fork-{fork}"))
                .spawn_scoped(s, move || run_sequence(clock, workload, config, fork))?;
            handle.join().map_err(|payload| BenchError::Fork {
                fork,
                message: panic_message(payload.as_ref()),
            })?
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForkRequest {
    pub workload: String,
    pub config: BenchConfig,
    pub fork: u32,
}

/// Serialisable form of the errors a child fork can report.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum ForkFailure {
    Workload {
        workload: String,
        phase: Phase,
        message: String,
    },
    Clock {
        start_ns: u64,
        stop_ns: u64,
    },
    NotFound(String),
    Other(String),
}

impl From<BenchError> for ForkFailure {
    fn from(e: BenchError) -> Self {
        match e {
            BenchError::WorkloadFailure {
                workload,
                phase,
                message,
            } => ForkFailure::Workload {
                workload,
                phase,
                message,
            },
            BenchError::Clock { start_ns, stop_ns } => ForkFailure::Clock { start_ns, stop_ns },
            BenchError::NotFound(name) => ForkFailure::NotFound(name),
            other => ForkFailure::Other(other.to_string()),
        }
    }
}

impl ForkFailure {
    pub fn into_error(self, fork: u32) -> BenchError {
        match self {
            ForkFailure::Workload {
                workload,
                phase,
                message,
            } => BenchError::WorkloadFailure {
                workload,
                phase,
                message,
            },
            ForkFailure::Clock { start_ns, stop_ns } => BenchError::Clock { start_ns, stop_ns },
            ForkFailure::NotFound(name) => BenchError::NotFound(name),
            ForkFailure::Other(message) => BenchError::Fork { fork, message },
        }
    }
}

pub type ForkReply = std::result::Result<ForkReport, ForkFailure>;

/// Each fork in a child process running [`WORKER_SUBCOMMAND`].
#[derive(Clone, Debug)]
pub struct ProcessForks {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessForks {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(WORKER_SUBCOMMAND)],
        }
    }

    /// Re-run the current executable; it must dispatch [`WORKER_SUBCOMMAND`] to [`serve_fork`].
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Replace the arguments that put the program into worker mode.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl ForkExecutor for ProcessForks {
    fn run_fork(&self, workload: &Workload, config: &BenchConfig, fork: u32) -> Result<ForkReport> {
        let fork_err = |message: String| BenchError::Fork { fork, message };

        let request = ForkRequest {
            workload: workload.name().to_string(),
            config: config.clone(),
            fork,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| fork_err(format!("failed to spawn {}: {e}", self.program.display())))?;

        let sent = child.stdin.take().map_or(Ok(()), |stdin| -> Result<()> {
            let mut w = BufWriter::new(stdin);
            bincode::serialize_into(&mut w, &request)?;
            w.flush()?;
            Ok(())
        });
        if let Err(e) = sent {
            // Reap the child before giving up on it.
            if let Err(kill) = child.kill() {
                debug!(fork, error = %kill, "fork child already gone");
            }
            let status = child.wait()?;
            return Err(fork_err(format!("failed to send request (status {status}): {e}")));
        }

        let output = child.wait_with_output()?;
        let reply: ForkReply = bincode::deserialize(&output.stdout)
            .map_err(|e| fork_err(format!("unreadable reply (status {}): {e}", output.status)))?;

        match reply {
            Ok(report) => {
                if !output.status.success() {
                    warn!(fork, status = %output.status, "fork reported samples but exited unsuccessfully");
                }
                Ok(report)
            }
            Err(failure) => Err(failure.into_error(fork)),
        }
    }
}

/// Child side of [`ProcessForks`]: read one request, run it, write one reply.
///
/// Returns whether the fork succeeded. Only I/O and encoding problems are
/// returned as errors; workload failures travel inside the reply.
pub fn serve_fork<R: Read, W: Write>(registry: &Registry, input: R, mut output: W) -> Result<bool> {
    let request: ForkRequest = bincode::deserialize_from(input)?;
    let clock = MonotonicClock::new();

    let reply: ForkReply = registry
        .resolve(&request.workload)
        .and_then(|workload| {
            request.config.validate()?;
            run_sequence(&clock, workload, &request.config, request.fork)
        })
        .map_err(ForkFailure::from);

    let ok = reply.is_ok();
    bincode::serialize_into(&mut output, &reply)?;
    output.flush()?;
    Ok(ok)
}
