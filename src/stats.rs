//! Small statistical helpers shared by the population and the generators.
//!
//! Nothing here is problem-specific: a Gaussian pdf for rank weighting,
//! Box–Muller sampling for mutation and kernel spread, and cumulative-weight
//! index sampling for front selection.

use core::f64::consts::PI;

/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Probability density of a normal distribution at `x`.
///
/// A non-positive `std_dev` collapses the kernel: returns 1.0 at the mean
/// and 0.0 elsewhere, so degenerate configurations still select something.
pub(crate) fn normal_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return if x == mean { 1.0 } else { 0.0 };
    }
    let z = (x - mean) / std_dev;
    (-0.5 * z * z).exp() / (std_dev * (2.0 * PI).sqrt())
}

/// Sample from a normal distribution via the Box–Muller transform.
pub(crate) fn sample_normal(rng: &mut fastrand::Rng, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return mean;
    }
    // u1 in (0, 1] so the logarithm stays finite.
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    mean + z * std_dev
}

/// Sample an index proportionally to the given non-negative weights.
///
/// Returns `None` if the slice is empty or the total weight is not a
/// positive finite number; callers fall back to uniform selection.
pub(crate) fn weighted_index(rng: &mut fastrand::Rng, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().copied().filter(|w| w.is_finite()).sum();
    if weights.is_empty() || !(total > 0.0) || !total.is_finite() {
        return None;
    }
    let mut target = rng.f64() * total;
    for (i, &w) in weights.iter().enumerate() {
        if !w.is_finite() {
            continue;
        }
        target -= w;
        if target <= 0.0 {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

/// Sample standard deviation of a series of values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = n as f64;
    let mean = values.iter().sum::<f64>() / len;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (len - 1.0);
    variance.sqrt()
}
