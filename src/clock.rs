//! Monotonic clock abstraction used by the schedulers.

use std::time::Instant;

use crate::error::{BenchError, Result};

/// Source of nanosecond timestamps.
///
/// Readings are only meaningful relative to each other. Implementations must be
/// cheap to read since they sit directly around every timed invocation.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// `Instant`-backed clock. Readings are nanoseconds since construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ns(&self) -> u64 {
        // u64 nanoseconds covers ~584 years of uptime.
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Elapsed nanoseconds between two readings, rejecting a clock that went backwards.
#[inline]
pub fn elapsed_ns(start_ns: u64, stop_ns: u64) -> Result<u64> {
    stop_ns
        .checked_sub(start_ns)
        .ok_or(BenchError::Clock { start_ns, stop_ns })
}

/// Time one call of `f`, returning its value and the elapsed nanoseconds.
///
/// The timer brackets only the call; anything done with the value happens
/// after the stop reading.
#[inline]
pub fn time_call<C, T, E>(clock: &C, f: impl FnOnce() -> std::result::Result<T, E>) -> Result<(std::result::Result<T, E>, u64)>
where
    C: Clock + ?Sized,
{
    let start = clock.now_ns();
    let out = f();
    let stop = clock.now_ns();
    Ok((out, elapsed_ns(start, stop)?))
}
