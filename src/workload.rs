//! Type-erased workload definitions.
//!
//! A [`Workload`] pairs a setup hook, which builds a state blob, with an invoke
//! hook that runs the measured computation against that state. Each isolated
//! execution context calls [`Workload::instantiate`] to get its own
//! [`Instance`], so no state crosses fork or thread boundaries. Teardown is the
//! state's `Drop`, run when the instance goes out of scope at the end of a fork.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{BenchError, Phase, Result};

/// Error type workload hooks may return.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Inputs available to a workload's setup hook.
#[derive(Clone, Copy, Debug)]
pub struct SetupContext {
    pub seed: u64,
    pub fork: u32,
    pub thread: usize,
}

impl SetupContext {
    /// Deterministic RNG for this workload's own setup.
    ///
    /// Independent of fork and thread so every context builds identical state.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

/// One isolated copy of a workload, ready to be invoked repeatedly.
pub trait Instance: Send {
    /// Run the measured computation once.
    ///
    /// Errors and panics raised by the hook are reported as a message.
    fn invoke(&mut self) -> std::result::Result<u64, String>;
}

type Factory = dyn Fn(&SetupContext) -> std::result::Result<Box<dyn Instance>, String> + Send + Sync;

/// A named, registrable workload.
#[derive(Clone)]
pub struct Workload {
    name: Arc<str>,
    iteration_hint: Option<u64>,
    factory: Arc<Factory>,
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload")
            .field("name", &self.name)
            .field("iteration_hint", &self.iteration_hint)
            .finish_non_exhaustive()
    }
}

struct Bound<S, I> {
    state: S,
    invoke: Arc<I>,
}

impl<S, I> Instance for Bound<S, I>
where
    S: Send,
    I: Fn(&mut S) -> std::result::Result<u64, HookError> + Send + Sync,
{
    #[inline]
    fn invoke(&mut self) -> std::result::Result<u64, String> {
        let state = &mut self.state;
        let invoke = &self.invoke;
        match catch_unwind(AssertUnwindSafe(|| invoke(state))) {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl Workload {
    pub fn new<S, Setup, Invoke>(name: impl Into<String>, setup: Setup, invoke: Invoke) -> Self
    where
        S: Send + 'static,
        Setup: Fn(&SetupContext) -> std::result::Result<S, HookError> + Send + Sync + 'static,
        Invoke: Fn(&mut S) -> std::result::Result<u64, HookError> + Send + Sync + 'static,
    {
        let invoke = Arc::new(invoke);
        let factory = move |ctx: &SetupContext| -> std::result::Result<Box<dyn Instance>, String> {
            match catch_unwind(AssertUnwindSafe(|| setup(ctx))) {
                Ok(Ok(state)) => Ok(Box::new(Bound {
                    state,
                    invoke: Arc::clone(&invoke),
                })),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(panic_message(payload.as_ref())),
            }
        };
        Self {
            name: Arc::from(name.into()),
            iteration_hint: None,
            factory: Arc::new(factory),
        }
    }

    /// Stateless workload: no setup, just the invoke hook.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self::new(name, |_| Ok(()), move |_: &mut ()| Ok(f()))
    }

    /// Preferred measurement iteration count, used when the config leaves it unset.
    pub fn with_iteration_hint(mut self, iterations: u64) -> Self {
        self.iteration_hint = Some(iterations);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iteration_hint(&self) -> Option<u64> {
        self.iteration_hint
    }

    /// Run the setup hook for a fresh, exclusively owned instance.
    pub fn instantiate(&self, ctx: &SetupContext) -> Result<Box<dyn Instance>> {
        (self.factory)(ctx).map_err(|message| BenchError::WorkloadFailure {
            workload: self.name().to_string(),
            phase: Phase::Setup,
            message,
        })
    }
}
