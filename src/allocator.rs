use std::ops::Range;

use crate::{Gaussian, Gaussians};

/// Get the sampling weight of a Gaussian, its opacity times its ellipsoid volume.
pub fn sample_weight(gaussian: &Gaussian) -> f64 {
    gaussian.opacity as f64 * gaussian.volume()
}

/// The number of points to sample from each Gaussian.
///
/// The counts sum to exactly the requested total, unless there are no Gaussians.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleAllocation {
    counts: Vec<u64>,
    offsets: Vec<u64>,
    total: u64,
}

impl SampleAllocation {
    /// Allocate `num_points` over the Gaussians by [`sample_weight`].
    pub fn new(gaussians: &Gaussians, num_points: u64) -> Self {
        let weights = gaussians.iter().map(sample_weight).collect::<Vec<_>>();
        let allocation = Self::from_weights(&weights, num_points);

        log::info!(
            "Allocated {} points over {} Gaussians ({} get none)",
            allocation.total,
            allocation.len(),
            allocation.counts.iter().filter(|&&c| c == 0).count(),
        );

        allocation
    }

    /// Allocate `num_points` proportionally to `weights` by the largest remainder method.
    ///
    /// Ties between equal remainders go to the lower index. If the weights do not have a positive
    /// finite sum, every weight is taken as equal.
    pub fn from_weights(weights: &[f64], num_points: u64) -> Self {
        if weights.is_empty() {
            return Self::default();
        }

        let sanitized = |w: f64| match w.is_finite() && w > 0.0 {
            true => w,
            false => 0.0,
        };
        let sum = weights.iter().copied().map(sanitized).sum::<f64>();
        let weight = |i: usize| match sum.is_finite() && sum > 0.0 {
            true => sanitized(weights[i]) / sum,
            false => 1.0 / weights.len() as f64,
        };

        let quotas = (0..weights.len())
            .map(|i| weight(i) * num_points as f64)
            .collect::<Vec<_>>();
        let mut counts = quotas.iter().map(|q| q.floor() as u64).collect::<Vec<_>>();
        let remainders = quotas
            .iter()
            .zip(&counts)
            .map(|(q, &c)| q - c as f64)
            .collect::<Vec<_>>();

        let assigned = counts.iter().sum::<u64>();
        let mut order = (0..counts.len()).collect::<Vec<_>>();
        let by_remainder = |a: &usize, b: &usize| {
            remainders[*b]
                .total_cmp(&remainders[*a])
                .then_with(|| a.cmp(b))
        };

        if assigned < num_points {
            let residual = (num_points - assigned) as usize;
            match residual < order.len() {
                true => {
                    order.select_nth_unstable_by(residual, by_remainder);
                }
                false => order.sort_unstable_by(by_remainder),
            }
            for &i in order.iter().cycle().take(residual) {
                counts[i] += 1;
            }
        } else if assigned > num_points {
            // Only reachable through rounding of the quotas, take back from the smallest remainders.
            order.sort_unstable_by(by_remainder);
            let mut excess = assigned - num_points;
            for &i in order.iter().rev().cycle() {
                if excess == 0 {
                    break;
                }
                if counts[i] > 0 {
                    counts[i] -= 1;
                    excess -= 1;
                }
            }
        }

        let offsets = counts
            .iter()
            .scan(0u64, |offset, &count| {
                let start = *offset;
                *offset += count;
                Some(start)
            })
            .collect();

        Self {
            counts,
            offsets,
            total: num_points,
        }
    }

    /// Get the number of points of each Gaussian.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get the index of the first point of each Gaussian in the output.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Get the output index range of the Gaussian at `index`.
    pub fn range(&self, index: usize) -> Range<u64> {
        self.offsets[index]..self.offsets[index] + self.counts[index]
    }

    /// Get the total number of points.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Get the number of Gaussians.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if there are no Gaussians.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
