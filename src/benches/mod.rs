//! Built-in workloads.
//!
//! The payloads themselves are arbitrary; they exist to give the harness
//! something with a non-trivial, optimiser-resistant cost to time.

pub mod arith;

use crate::error::Result;
use crate::registry::Registry;

/// Register every built-in workload, in a stable order.
pub fn register_builtin(registry: &mut Registry) -> Result<()> {
    arith::register(registry)?;
    sort::register(registry)?;
    Ok(())
}

/// Fresh registry holding only the built-ins.
pub fn builtin_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let r = builtin_registry().unwrap();
        let names: Vec<&str> = r.names().collect();
        assert_eq!(names, vec!["sum", "fibonacci", "quicksort"]);
    }
}
