use std::hint::black_box;

use crate::error::Result;
use crate::registry::Registry;
use crate::workload::Workload;

pub const SUM_UPPER: u64 = 1_000_000;
pub const FIB_N: u32 = 30;

/// Sum of `0..=n`.
pub fn sum_numbers(n: u64) -> u64 {
    let mut sum = 0u64;
    for i in 0..=n {
        sum = sum.wrapping_add(i);
    }
    sum
}

/// Naive doubly-recursive Fibonacci.
pub fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}

pub fn register(registry: &mut Registry) -> Result<()> {
    // black_box on the input keeps the loop from being folded at compile time.
    registry.add(Workload::from_fn("sum", || sum_numbers(black_box(SUM_UPPER))))?;
    registry.add(Workload::from_fn("fibonacci", || fibonacci(black_box(FIB_N))))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_numbers() {
        assert_eq!(sum_numbers(0), 0);
        assert_eq!(sum_numbers(10), 55);
        assert_eq!(sum_numbers(SUM_UPPER), 500_000_500_000);
    }

    #[test]
    fn test_fibonacci() {
        let first: Vec<u64> = (0..10).map(fibonacci).collect();
        assert_eq!(first, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
        assert_eq!(fibonacci(20), 6765);
    }
}
