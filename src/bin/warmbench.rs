use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use warmbench::benches;
use warmbench::fork::{self, ProcessForks};
use warmbench::schema::{BenchRecord, BenchReport, RunMeta};
use warmbench::{BenchConfig, BenchError, BenchmarkRunner, Isolation, Profile, Registry, TimeUnit};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimeUnitArg {
    Ns,
    Us,
    Ms,
    S,
}

impl From<TimeUnitArg> for TimeUnit {
    fn from(v: TimeUnitArg) -> Self {
        match v {
            TimeUnitArg::Ns => TimeUnit::Ns,
            TimeUnitArg::Us => TimeUnit::Us,
            TimeUnitArg::Ms => TimeUnit::Ms,
            TimeUnitArg::S => TimeUnit::S,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IsolationArg {
    Thread,
    Process,
}

impl From<IsolationArg> for Isolation {
    fn from(v: IsolationArg) -> Self {
        match v {
            IsolationArg::Thread => Isolation::Thread,
            IsolationArg::Process => Isolation::Process,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark workloads and print a JSON report.
    Run {
        /// Workload names or regular expressions; all workloads when omitted.
        #[arg(value_name = "PATTERN")]
        patterns: Vec<String>,

        #[arg(long)]
        warmup_iterations: Option<u64>,

        /// Minimum seconds per warmup iteration.
        #[arg(long)]
        warmup_time: Option<f64>,

        #[arg(long)]
        measurement_iterations: Option<u64>,

        /// Minimum seconds per measurement iteration (0 = one invocation).
        #[arg(long)]
        measurement_time: Option<f64>,

        /// Isolated forks per workload (0 = run in this process).
        #[arg(long)]
        forks: Option<u32>,

        /// Worker threads per fork, each with its own workload instance.
        #[arg(long)]
        threads: Option<usize>,

        #[arg(long, value_enum)]
        time_unit: Option<TimeUnitArg>,

        /// How forks are isolated (default: process).
        #[arg(long, value_enum)]
        isolation: Option<IsolationArg>,
    },

    /// List registered workloads.
    List,

    /// Run a single fork requested over stdin (internal).
    #[command(name = "fork-worker", hide = true)]
    ForkWorker,
}

#[derive(Parser, Debug)]
#[command(name = "warmbench")]
#[command(about = "Micro-benchmark runner with warmup, forks and sample statistics (JSON output)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Seed for workload setup RNGs.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// JSON file with a base configuration; flags override it.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

fn now_utc_rfc3339() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Profile presets, then the config file's fields, then `--seed`.
fn base_config(args: &Args) -> Result<BenchConfig, BenchError> {
    let mut cfg = BenchConfig::from_profile(args.profile.into());
    cfg.isolation = Isolation::Process;
    if let Some(path) = &args.config {
        cfg = cfg.overlay_json(serde_json::from_str(&fs::read_to_string(path)?)?)?;
    }
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    Ok(cfg)
}

fn run(args: &Args, registry: &Registry) -> Result<(), BenchError> {
    let Command::Run {
        patterns,
        warmup_iterations,
        warmup_time,
        measurement_iterations,
        measurement_time,
        forks,
        threads,
        time_unit,
        isolation,
    } = &args.cmd
    else {
        return Ok(());
    };

    let mut cfg = base_config(args)?;
    if let Some(v) = warmup_iterations {
        cfg.warmup_iterations = *v;
    }
    if let Some(v) = warmup_time {
        cfg.warmup_seconds = *v;
    }
    if let Some(v) = measurement_iterations {
        cfg.measurement_iterations = Some(*v);
    }
    if let Some(v) = measurement_time {
        cfg.measurement_seconds = *v;
    }
    if let Some(v) = forks {
        cfg.forks = *v;
    }
    if let Some(v) = threads {
        cfg.threads = *v;
    }
    if let Some(v) = time_unit {
        cfg.time_unit = (*v).into();
    }
    if let Some(v) = isolation {
        cfg.isolation = (*v).into();
    }

    let mut runner = BenchmarkRunner::new(registry, cfg.clone())?;
    if cfg.isolation == Isolation::Process {
        runner = runner.with_launcher(ProcessForks::current_exe()?);
    }

    let results = runner.run_selected(patterns.as_slice())?;

    let report = BenchReport {
        run: RunMeta {
            schema_version: 1,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.seed,
            timestamp_utc: now_utc_rfc3339(),
            git_sha: git_sha_short(),
            config: cfg.clone(),
        },
        results: results
            .iter()
            .map(|r| BenchRecord::from_result(r, cfg.time_unit))
            .collect(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(out) = &args.out {
        fs::write(out, json)?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let registry = match benches::builtin_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match &args.cmd {
        Command::List => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::ForkWorker => match fork::serve_fork(&registry, io::stdin().lock(), io::stdout().lock()) {
            Ok(true) => Ok(()),
            Ok(false) => return ExitCode::FAILURE,
            Err(e) => Err(e),
        },
        Command::Run { .. } => run(&args, &registry),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
