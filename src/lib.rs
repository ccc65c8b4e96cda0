//! Micro-benchmark runner with time-boxed warmup, isolated forks and sample
//! statistics.
//!
//! ```no_run
//! use warmbench::{BenchConfig, BenchmarkRunner, Registry};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register("vec_sum", |_| Ok((0..1024u64).collect::<Vec<_>>()), |v: &mut Vec<u64>| {
//!         Ok(v.iter().sum())
//!     })
//!     .unwrap();
//!
//! let mut runner = BenchmarkRunner::new(&registry, BenchConfig::default()).unwrap();
//! let result = runner.run("vec_sum").unwrap();
//! println!("{:.1} ns/op ± {:.1}", result.summary.mean, result.summary.stddev);
//! ```

pub mod benches;
pub mod blackhole;
pub mod clock;
pub mod error;
pub mod fork;
pub mod harness;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod state;
pub mod stats;
pub mod workload;

pub use error::{BenchError, Phase, Result};
pub use fork::{Isolation, ProcessForks};
pub use harness::{BenchConfig, Measurement, Profile, TimeUnit};
pub use registry::Registry;
pub use runner::BenchmarkRunner;
pub use state::RunState;
pub use stats::{RunResult, Summary};
pub use workload::{HookError, SetupContext, Workload};
