//! Lifecycle of a single benchmark execution.
//!
//! ```text
//! Idle -> Warmup(0) -> Measuring(0) [-> Warmup(1) -> Measuring(1) ...] -> Aggregating -> Reported
//!   \__________\______________\______________________________\____________-> Failed
//! ```

use std::fmt;

use crate::error::{BenchError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Warmup { fork: u32 },
    Measuring { fork: u32 },
    Aggregating,
    Reported,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Reported | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Warmup { fork } => write!(f, "warmup(fork {fork})"),
            RunState::Measuring { fork } => write!(f, "measuring(fork {fork})"),
            RunState::Aggregating => f.write_str("aggregating"),
            RunState::Reported => f.write_str("reported"),
            RunState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug)]
pub struct StateMachine {
    state: RunState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        use RunState::*;
        let ok = match (self.state, next) {
            (Idle, Warmup { fork: 0 }) => true,
            (Warmup { fork: a }, Measuring { fork: b }) => a == b,
            (Measuring { fork: a }, Warmup { fork: b }) => b == a + 1,
            (Measuring { .. }, Aggregating) => true,
            (Aggregating, Reported) => true,
            _ => false,
        };
        if !ok {
            return Err(BenchError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Failed`. A no-op once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = RunState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunState::*;
    use super::*;

    #[test]
    fn test_forked_lifecycle() {
        let mut sm = StateMachine::new();
        for step in [
            Warmup { fork: 0 },
            Measuring { fork: 0 },
            Warmup { fork: 1 },
            Measuring { fork: 1 },
            Aggregating,
            Reported,
        ] {
            sm.advance(step).unwrap();
        }
        assert_eq!(sm.state(), Reported);
        sm.fail();
        assert_eq!(sm.state(), Reported);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut sm = StateMachine::new();
        assert!(sm.advance(Measuring { fork: 0 }).is_err());
        assert!(sm.advance(Aggregating).is_err());
        sm.advance(Warmup { fork: 0 }).unwrap();
        assert!(sm.advance(Aggregating).is_err());
        assert!(sm.advance(Measuring { fork: 1 }).is_err());
        sm.advance(Measuring { fork: 0 }).unwrap();
        assert!(sm.advance(Warmup { fork: 0 }).is_err());
        assert!(sm.advance(Warmup { fork: 2 }).is_err());
    }

    #[test]
    fn test_fail_from_any_non_terminal() {
        let mut sm = StateMachine::new();
        sm.advance(Warmup { fork: 0 }).unwrap();
        sm.fail();
        assert_eq!(sm.state(), Failed);
        assert!(sm.advance(Measuring { fork: 0 }).is_err());
    }
}
