//! Aggregation of raw measurements into a run result.
//!
//! No outlier trimming is done: the raw spread is the signal a caller needs to
//! judge how noisy a run was.

use crate::error::{BenchError, Result};
use crate::harness::{Measurement, WarmupSummary};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn from_values(values: &[f64]) -> Result<Summary> {
        let count = values.len();
        if count < 2 {
            return Err(BenchError::InsufficientSamples { count });
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
        let stddev = (ss / (n - 1.0)).sqrt();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Summary {
            count,
            mean,
            stddev,
            min,
            max,
        })
    }
}

/// Samples and statistics for one workload's full execution.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub name: String,
    /// Pooled in collection order: fork by fork, iteration by iteration.
    pub samples: Vec<Measurement>,
    /// Nanoseconds per op.
    pub summary: Summary,
    pub warmup: WarmupSummary,
    pub forks: u32,
    pub threads: usize,
    pub result_digest: String,
}

impl RunResult {
    pub fn aggregate(
        name: &str,
        samples: Vec<Measurement>,
        warmup: WarmupSummary,
        forks: u32,
        threads: usize,
        result_digest: String,
    ) -> Result<RunResult> {
        let per_op: Vec<f64> = samples.iter().map(Measurement::ns_per_op).collect();
        let summary = Summary::from_values(&per_op)?;
        Ok(RunResult {
            name: name.to_string(),
            samples,
            summary,
            warmup,
            forks,
            threads,
            result_digest,
        })
    }

    /// Invocations made while measuring, across all forks and threads.
    pub fn measured_invocations(&self) -> u64 {
        self.samples.iter().map(|m| m.ops).sum()
    }
}
