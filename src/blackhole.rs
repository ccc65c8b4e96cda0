//! Sink for workload return values.
//!
//! Every value returned by a timed invocation is passed through
//! [`std::hint::black_box`] and folded into a SHA-256 digest, so the optimiser
//! cannot prove the computation dead. The digest doubles as a cheap check that
//! a seeded workload produced the same results across forks.

use sha2::{Digest, Sha256};
use std::hint::black_box;

#[derive(Clone, Debug, Default)]
pub struct Blackhole {
    hasher: Sha256,
    consumed: u64,
}

impl Blackhole {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn consume(&mut self, value: u64) {
        let value = black_box(value);
        self.hasher.update(value.to_le_bytes());
        self.consumed += 1;
    }

    /// Number of values consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Hex digest of everything consumed, in order.
    pub fn hex_digest(&self) -> String {
        format!("{:x}", self.hasher.clone().finalize())
    }
}

/// Digest over per-fork digests, in fork order.
pub fn combine_digests<'a>(digests: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for d in digests {
        hasher.update(d.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_digest_is_order_sensitive() {
        let ab = combine_digests(["a", "b"]);
        assert_eq!(ab, combine_digests(["a", "b"]));
        assert_ne!(ab, combine_digests(["b", "a"]));
    }

    #[test]
    fn test_digest_depends_on_values_and_order() {
        let mut a = Blackhole::new();
        a.consume(1);
        a.consume(2);
        let mut b = Blackhole::new();
        b.consume(1);
        b.consume(2);
        let mut c = Blackhole::new();
        c.consume(2);
        c.consume(1);

        assert_eq!(a.hex_digest(), b.hex_digest());
        assert_ne!(a.hex_digest(), c.hex_digest());
        assert_eq!(a.consumed(), 2);
        assert_eq!(a.hex_digest().len(), 64);
    }
}
