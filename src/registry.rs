//! Name → workload mapping, populated once before any timing starts.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{BenchError, Result};
use crate::workload::{HookError, SetupContext, Workload};

#[derive(Debug, Default)]
pub struct Registry {
    workloads: Vec<Workload>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workload built from a setup and an invoke hook.
    pub fn register<S, Setup, Invoke>(&mut self, name: &str, setup: Setup, invoke: Invoke) -> Result<()>
    where
        S: Send + 'static,
        Setup: Fn(&SetupContext) -> std::result::Result<S, HookError> + Send + Sync + 'static,
        Invoke: Fn(&mut S) -> std::result::Result<u64, HookError> + Send + Sync + 'static,
    {
        self.add(Workload::new(name, setup, invoke))
    }

    /// Register an already-built workload.
    pub fn add(&mut self, workload: Workload) -> Result<()> {
        let name = workload.name().to_string();
        if self.index.contains_key(&name) {
            return Err(BenchError::DuplicateName(name));
        }
        self.index.insert(name, self.workloads.len());
        self.workloads.push(workload);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Workload> {
        self.index
            .get(name)
            .map(|&i| &self.workloads[i])
            .ok_or_else(|| BenchError::NotFound(name.to_string()))
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workloads.iter().map(Workload::name)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Select workloads by exact name or regular expression.
    ///
    /// An exact name match wins over pattern interpretation. Results follow
    /// registration order without duplicates. An empty selector list picks
    /// every workload; a selector matching nothing is `NotFound`.
    pub fn select<S: AsRef<str>>(&self, selectors: &[S]) -> Result<Vec<&Workload>> {
        if selectors.is_empty() {
            return Ok(self.workloads.iter().collect());
        }

        let mut picked = vec![false; self.workloads.len()];
        for selector in selectors {
            let selector = selector.as_ref();
            if let Some(&i) = self.index.get(selector) {
                picked[i] = true;
                continue;
            }

            let re = Regex::new(selector).map_err(|source| BenchError::InvalidPattern {
                pattern: selector.to_string(),
                source,
            })?;
            let mut hit = false;
            for (i, w) in self.workloads.iter().enumerate() {
                if re.is_match(w.name()) {
                    picked[i] = true;
                    hit = true;
                }
            }
            if !hit {
                return Err(BenchError::NotFound(selector.to_string()));
            }
        }

        Ok(self
            .workloads
            .iter()
            .zip(picked)
            .filter_map(|(w, p)| p.then_some(w))
            .collect())
    }
}
