use serde::{Deserialize, Serialize};

use crate::harness::{BenchConfig, TimeUnit};
use crate::stats::RunResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub config: BenchConfig,
}

/// Per-workload record, values in `unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    pub name: String,
    pub unit: String,

    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: usize,

    pub warmup_invocations: u64,
    pub measured_invocations: u64,
    pub forks: u32,
    pub threads: usize,
    pub result_digest: String,

    pub samples: Vec<f64>,
}

impl BenchRecord {
    pub fn from_result(result: &RunResult, unit: TimeUnit) -> Self {
        let s = &result.summary;
        BenchRecord {
            name: result.name.clone(),
            unit: unit.per_op().to_string(),
            mean: unit.from_ns(s.mean),
            stddev: unit.from_ns(s.stddev),
            min: unit.from_ns(s.min),
            max: unit.from_ns(s.max),
            sample_count: s.count,
            warmup_invocations: result.warmup.invocations,
            measured_invocations: result.measured_invocations(),
            forks: result.forks,
            threads: result.threads,
            result_digest: result.result_digest.clone(),
            samples: result.samples.iter().map(|m| unit.from_ns(m.ns_per_op())).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub results: Vec<BenchRecord>,
}
