// guardsim/core/selection/src/allocator.rs

use crate::error::SelectionError;
use tracing::debug;

/// Tolerance when comparing an inclusion probability against 1.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Capped proportional allocation (Tillé-style inclusion probabilities).
///
/// Scales raw weights so they sum to `k`, pins every value above 1 at
/// exactly 1, and rescales the remaining values to the leftover mass until
/// nothing exceeds the cap. The result is divided by `k`, giving a
/// distribution that sums to 1 with no entry above `1/k`.
#[derive(Debug, Clone, Copy)]
pub struct CappedAllocator {
    epsilon: f64,
}

impl CappedAllocator {
    pub fn new() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.abs(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Allocate `values` against an expected sample sum `k`.
    ///
    /// All-zero input is rejected; callers substitute a uniform
    /// distribution themselves. A `k` larger than the number of positive
    /// values is clamped to that count, which makes every positive entry
    /// resolve to the cap.
    pub fn allocate(&self, values: &[f64], k: f64) -> Result<Vec<f64>, SelectionError> {
        if !k.is_finite() || k <= 0.0 {
            return Err(SelectionError::InvalidSampleSize(k));
        }
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectionError::InvalidWeight { index, value });
            }
        }

        let sum: f64 = values.iter().sum();
        if sum <= 0.0 {
            return Err(SelectionError::DegenerateWeights);
        }

        let positive = values.iter().filter(|v| **v > 0.0).count() as f64;
        let k = if k > positive {
            debug!("Clamping sample size {} to {} positive entries", k, positive);
            positive
        } else {
            k
        };

        let mut adjusted: Vec<f64> = values.iter().map(|v| v * k / sum).collect();
        let mut resolved = vec![false; values.len()];
        let mut resolved_count = 0usize;
        let mut passes = 0usize;

        loop {
            let over: Vec<usize> = (0..adjusted.len())
                .filter(|&i| !resolved[i] && adjusted[i] > 1.0 + self.epsilon)
                .collect();
            if over.is_empty() {
                break;
            }
            passes += 1;

            for i in over {
                adjusted[i] = 1.0;
                resolved[i] = true;
                resolved_count += 1;
            }

            let remaining: f64 = adjusted
                .iter()
                .zip(&resolved)
                .filter(|(_, done)| !**done)
                .map(|(v, _)| *v)
                .sum();
            if remaining <= 0.0 {
                break;
            }

            let target = (k - resolved_count as f64).max(0.0);
            for (value, done) in adjusted.iter_mut().zip(&resolved) {
                if !*done {
                    *value = *value * target / remaining;
                }
            }
        }

        debug!(
            "Allocated {} values with k={} ({} capped in {} passes)",
            values.len(),
            k,
            resolved_count,
            passes
        );

        Ok(adjusted.into_iter().map(|a| a / k).collect())
    }
}

impl Default for CappedAllocator {
    fn default() -> Self {
        Self::new()
    }
}
