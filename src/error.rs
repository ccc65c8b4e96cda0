//! Error taxonomy for the benchmark runner.

use thiserror::Error;

/// Phase in which a workload raised an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Setup,
    Warmup,
    Measurement,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Warmup => "warmup",
            Phase::Measurement => "measurement",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while registering, running or aggregating a benchmark.
#[derive(Error, Debug)]
pub enum BenchError {
    /// A workload with this name is already registered.
    #[error("workload already registered: {0}")]
    DuplicateName(String),

    /// No registered workload matches the name or pattern.
    #[error("no workload matches: {0}")]
    NotFound(String),

    /// The workload's setup or invoke hook failed or panicked.
    #[error("workload {workload} failed during {phase}: {message}")]
    WorkloadFailure {
        workload: String,
        phase: Phase,
        message: String,
    },

    /// The timer reported a stop reading earlier than its start reading.
    #[error("clock went backwards: start={start_ns}ns stop={stop_ns}ns")]
    Clock { start_ns: u64, stop_ns: u64 },

    /// Too few measurements to compute a sample standard deviation.
    #[error("insufficient samples: got {count}, need at least 2")]
    InsufficientSamples { count: usize },

    #[error("illegal run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid workload pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An isolated fork could not be started or returned an unreadable reply.
    #[error("fork {fork} failed: {message}")]
    Fork { fork: u32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wire encoding error: {0}")]
    Wire(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
